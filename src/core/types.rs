use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashMap};

/// Simulated time, in whatever unit the training loop counts in.
pub type Timestamp = i64;

/// Primitive metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Number(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Integer(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Boolean(value)
    }
}

pub type Metadata = BTreeMap<String, MetaValue>;

/// Stored document. `tokens`, `length` and `term_freqs` are derived from `text`
/// and only ever set together with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub tokens: Vec<String>,
    pub length: usize,
    pub event_ts: Timestamp,
    pub visible_after_ts: Timestamp,
    pub namespace: String,
    pub metadata: Metadata,
    pub(crate) term_freqs: HashMap<String, u32>,
}

impl Document {
    pub(crate) fn new(
        text: String,
        tokens: Vec<String>,
        event_ts: Timestamp,
        visible_after_ts: Timestamp,
        namespace: String,
        metadata: Metadata,
    ) -> Self {
        let mut term_freqs = HashMap::new();
        for token in &tokens {
            *term_freqs.entry(token.clone()).or_insert(0) += 1;
        }

        Document {
            text,
            length: tokens.len(),
            tokens,
            event_ts,
            visible_after_ts,
            namespace,
            metadata,
            term_freqs,
        }
    }

    pub fn term_freq(&self, token: &str) -> u32 {
        self.term_freqs.get(token).copied().unwrap_or(0)
    }

    /// Distinct tokens of the document.
    pub fn unique_tokens(&self) -> impl Iterator<Item = &String> {
        self.term_freqs.keys()
    }

    pub fn is_visible_at(&self, cutoff_ts: Timestamp) -> bool {
        self.event_ts <= cutoff_ts && self.visible_after_ts <= cutoff_ts
    }
}

/// A revision candidate produced by one worker for bulk insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub text: String,
    pub now_ts: Timestamp,
    pub utility: f64,
    pub bucket_key: Option<String>,
}

impl CandidateRow {
    pub fn new(text: impl Into<String>, now_ts: Timestamp, utility: f64) -> Self {
        CandidateRow {
            text: text.into(),
            now_ts,
            utility,
            bucket_key: None,
        }
    }

    pub fn with_bucket(mut self, bucket_key: impl Into<String>) -> Self {
        self.bucket_key = Some(bucket_key.into());
        self
    }
}
