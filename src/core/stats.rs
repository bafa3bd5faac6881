use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashMap};

use crate::core::types::Document;

/// Inverted statistics over the live document set.
///
/// Only `record` and `forget` mutate it, and the index calls them in the same
/// step that stores or drops the document, so `df`, `N` and `avgdl` never
/// describe a different set than the one stored.
#[derive(Debug, Clone, Default)]
pub struct CorpusStats {
    pub(crate) df: HashMap<String, usize>,
    pub(crate) doc_count: usize,
    pub(crate) total_length: usize,
}

impl CorpusStats {
    pub fn new() -> Self {
        CorpusStats::default()
    }

    pub fn record(&mut self, doc: &Document) {
        for token in doc.unique_tokens() {
            *self.df.entry(token.clone()).or_insert(0) += 1;
        }
        self.doc_count += 1;
        self.total_length += doc.length;
    }

    pub fn forget(&mut self, doc: &Document) {
        for token in doc.unique_tokens() {
            if let Some(count) = self.df.get_mut(token) {
                *count -= 1;
                if *count == 0 {
                    self.df.remove(token);
                }
            }
        }
        self.doc_count -= 1;
        self.total_length -= doc.length;
    }

    pub fn clear(&mut self) {
        self.df.clear();
        self.doc_count = 0;
        self.total_length = 0;
    }

    pub fn doc_freq(&self, token: &str) -> usize {
        self.df.get(token).copied().unwrap_or(0)
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn distinct_terms(&self) -> usize {
        self.df.len()
    }

    /// Average document length; an empty corpus counts as one document.
    pub fn avgdl(&self) -> f64 {
        self.total_length as f64 / self.doc_count.max(1) as f64
    }
}

/// Index statistics for monitoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub distinct_terms: usize,
    pub total_tokens: usize,
    pub avg_doc_length: f64,
    pub documents_per_namespace: BTreeMap<String, usize>,
}
