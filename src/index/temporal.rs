use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::analysis::similarity::Similarity;
use crate::analysis::tokenizer::{Tokenizer, WordTokenizer};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{CorpusStats, IndexStats};
use crate::core::types::{Document, MetaValue, Metadata, Timestamp};
use crate::scoring::scorer::{time_decay, BM25Scorer, Scorer};
use crate::search::results::{Hit, ScoredPosition, TopKCollector};

pub const DEFAULT_NAMESPACE: &str = "train";

/// Document to be added to the index.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub text: String,
    pub event_ts: Timestamp,
    pub visible_after_ts: Option<Timestamp>, // Defaults to event_ts
    pub namespace: String,
    pub metadata: Metadata,
}

impl NewDocument {
    pub fn new(text: impl Into<String>, event_ts: Timestamp) -> Self {
        NewDocument {
            text: text.into(),
            event_ts,
            visible_after_ts: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            metadata: Metadata::new(),
        }
    }

    pub fn visible_after(mut self, ts: Timestamp) -> Self {
        self.visible_after_ts = Some(ts);
        self
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Ranked lookup against the index at a visibility horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalQuery {
    pub text: String,
    pub k: usize,
    pub cutoff_ts: Timestamp,
    pub namespaces: Option<Vec<String>>,
    pub time_decay_lambda: Option<f64>,
}

impl TemporalQuery {
    pub fn new(text: impl Into<String>, k: usize, cutoff_ts: Timestamp) -> Self {
        TemporalQuery {
            text: text.into(),
            k,
            cutoff_ts,
            namespaces: None,
            time_decay_lambda: None,
        }
    }

    pub fn in_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = Some(namespaces.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_decay(mut self, lambda: f64) -> Self {
        self.time_decay_lambda = Some(lambda);
        self
    }
}

/// What `add` did with the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Appended at this position.
    Inserted(usize),
    /// Replaced a near-duplicate at this position.
    Replaced(usize),
    /// A newer near-duplicate at this position was kept; nothing changed.
    Kept(usize),
}

impl AddOutcome {
    pub fn position(&self) -> usize {
        match *self {
            AddOutcome::Inserted(p) | AddOutcome::Replaced(p) | AddOutcome::Kept(p) => p,
        }
    }
}

/// In-memory BM25 index with time-based visibility and recency-wins dedup.
pub struct TemporalIndex {
    config: Config,
    tokenizer: Box<dyn Tokenizer>,
    scorer: BM25Scorer,
    similarity: Option<Arc<dyn Similarity>>,
    documents: Vec<Document>,
    stats: CorpusStats,
}

impl TemporalIndex {
    pub fn new(config: Config) -> Self {
        TemporalIndex {
            scorer: BM25Scorer::from_config(&config),
            config,
            tokenizer: Box::new(WordTokenizer::new()),
            similarity: None,
            documents: Vec::new(),
            stats: CorpusStats::new(),
        }
    }

    /// Enable dedup: a new document at least `dedup_threshold` similar to an
    /// existing one in its namespace is treated as the same fact.
    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn add(&mut self, new_doc: NewDocument) -> AddOutcome {
        let NewDocument { text, event_ts, visible_after_ts, namespace, metadata } = new_doc;

        if let Some(position) = self.find_duplicate(&text, &namespace) {
            let existing_ts = self.documents[position].event_ts;
            if event_ts < existing_ts {
                debug!(
                    target: "tempusdex::index",
                    position, event_ts, existing_ts,
                    "Keeping newer near-duplicate"
                );
                return AddOutcome::Kept(position);
            }

            let doc = self.build_document(text, event_ts, visible_after_ts, namespace, metadata);
            self.stats.forget(&self.documents[position]);
            self.stats.record(&doc);
            self.documents[position] = doc;
            debug!(
                target: "tempusdex::index",
                position, event_ts, existing_ts,
                "Replaced near-duplicate in place"
            );
            return AddOutcome::Replaced(position);
        }

        let doc = self.build_document(text, event_ts, visible_after_ts, namespace, metadata);
        self.stats.record(&doc);
        self.documents.push(doc);
        let position = self.documents.len() - 1;
        trace!(target: "tempusdex::index", position, event_ts, "Inserted document");
        AddOutcome::Inserted(position)
    }

    /// First document in storage order, within `namespace`, that is similar
    /// enough to `text`. First match wins, not best match.
    fn find_duplicate(&self, text: &str, namespace: &str) -> Option<usize> {
        let similarity = self.similarity.as_ref()?;
        self.documents.iter().position(|doc| {
            doc.namespace == namespace
                && similarity.similarity(text, &doc.text) >= self.config.dedup_threshold
        })
    }

    fn build_document(
        &self,
        text: String,
        event_ts: Timestamp,
        visible_after_ts: Option<Timestamp>,
        namespace: String,
        metadata: Metadata,
    ) -> Document {
        let tokens = self.tokenizer.tokenize(&text);
        Document::new(
            text,
            tokens,
            event_ts,
            visible_after_ts.unwrap_or(event_ts),
            namespace,
            metadata,
        )
    }

    pub fn query(&self, query: &TemporalQuery) -> Vec<Hit> {
        if query.k == 0 {
            return Vec::new();
        }

        let query_tokens = self.tokenizer.tokenize(&query.text);
        // An empty namespace list filters nothing
        let namespaces: Option<HashSet<&str>> = query
            .namespaces
            .as_ref()
            .filter(|ns| !ns.is_empty())
            .map(|ns| ns.iter().map(String::as_str).collect());

        let mut collector = TopKCollector::new(query.k);
        for (position, doc) in self.documents.iter().enumerate() {
            if !doc.is_visible_at(query.cutoff_ts) {
                continue;
            }
            if let Some(allowed) = &namespaces {
                if !allowed.contains(doc.namespace.as_str()) {
                    continue;
                }
            }

            let mut score = self.scorer.score(&query_tokens, doc, &self.stats);
            score *= time_decay(query.time_decay_lambda, query.cutoff_ts, doc.event_ts);
            if score > 0.0 {
                collector.collect(ScoredPosition { score, position });
            }
        }

        collector
            .into_sorted()
            .into_iter()
            .map(|scored| {
                let doc = &self.documents[scored.position];
                Hit {
                    text: doc.text.clone(),
                    metadata: doc.metadata.clone(),
                    score: scored.score,
                    event_ts: doc.event_ts,
                }
            })
            .collect()
    }

    /// Delete the document at `position`; later documents shift down by one.
    pub fn remove(&mut self, position: usize) -> Result<Document> {
        if position >= self.documents.len() {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("No document at position {} (index holds {})", position, self.documents.len()),
            ));
        }
        let doc = self.documents.remove(position);
        self.stats.forget(&doc);
        Ok(doc)
    }

    pub fn reset(&mut self) {
        self.documents.clear();
        self.stats.clear();
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Document> {
        self.documents.get(position)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn corpus_stats(&self) -> &CorpusStats {
        &self.stats
    }

    pub fn stats(&self) -> IndexStats {
        let mut documents_per_namespace = BTreeMap::new();
        for doc in &self.documents {
            *documents_per_namespace.entry(doc.namespace.clone()).or_insert(0) += 1;
        }
        IndexStats {
            total_documents: self.stats.doc_count(),
            distinct_terms: self.stats.distinct_terms(),
            total_tokens: self.stats.total_length(),
            avg_doc_length: self.stats.avgdl(),
            documents_per_namespace,
        }
    }
}

impl Default for TemporalIndex {
    fn default() -> Self {
        TemporalIndex::new(Config::default())
    }
}
