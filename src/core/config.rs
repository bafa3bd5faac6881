use serde::{Deserialize, Serialize};

use crate::core::types::Timestamp;

/// Index and coordinator settings shared by every worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // BM25
    pub k1: f64,                        // Term frequency saturation
    pub b: f64,                         // Length normalization strength
    pub min_denominator: f64,           // Floor for the BM25 denominator

    // Dedup
    pub dedup_threshold: f64,           // Similarity at or above this is the same fact

    // Coordinator
    pub visible_delay: Timestamp,       // Added to now_ts for revised candidates
    pub namespace: String,              // Default namespace for inserts and queries
}

impl Default for Config {
    fn default() -> Self {
        Config {
            k1: 1.5,
            b: 0.75,
            min_denominator: 1e-6,
            dedup_threshold: 0.8,
            visible_delay: 1,
            namespace: "train".to_string(),
        }
    }
}

impl Config {
    pub fn with_bm25(mut self, k1: f64, b: f64) -> Self {
        self.k1 = k1;
        self.b = b;
        self
    }

    pub fn with_dedup_threshold(mut self, threshold: f64) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    pub fn with_visible_delay(mut self, delay: Timestamp) -> Self {
        self.visible_delay = delay;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

/// Maximal-marginal-relevance selection parameters, supplied per call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MmrConfig {
    pub alpha: f64,   // Weight of utility against redundancy
    pub top_m: usize, // Selection cap
}

impl Default for MmrConfig {
    fn default() -> Self {
        MmrConfig {
            alpha: 0.7,
            top_m: 4,
        }
    }
}

impl MmrConfig {
    pub fn new(top_m: usize, alpha: f64) -> Self {
        MmrConfig { alpha, top_m }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_top_m(mut self, top_m: usize) -> Self {
        self.top_m = top_m;
        self
    }
}
