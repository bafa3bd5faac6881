use crate::core::config::Config;
use crate::core::stats::CorpusStats;
use crate::core::types::{Document, Timestamp};

/// Scorer trait
pub trait Scorer: Send + Sync {
    /// Score `doc` for a query token multiset against the live corpus statistics.
    fn score(&self, query_tokens: &[String], doc: &Document, stats: &CorpusStats) -> f64;

    fn name(&self) -> &str;
}

/// BM25 Scorer
#[derive(Debug, Clone)]
pub struct BM25Scorer {
    pub k1: f64,               // Term frequency saturation (default: 1.5)
    pub b: f64,                // Length normalization strength (default: 0.75)
    pub min_denominator: f64,
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer {
            k1: 1.5,
            b: 0.75,
            min_denominator: 1e-6,
        }
    }
}

impl BM25Scorer {
    pub fn from_config(config: &Config) -> Self {
        BM25Scorer {
            k1: config.k1,
            b: config.b,
            min_denominator: config.min_denominator,
        }
    }

    pub fn idf(&self, doc_freq: usize, total_docs: usize) -> f64 {
        let n = total_docs as f64;
        let df = doc_freq as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

impl Scorer for BM25Scorer {
    fn score(&self, query_tokens: &[String], doc: &Document, stats: &CorpusStats) -> f64 {
        let avg_doc_len = stats.avgdl().max(1.0);
        let length_norm = 1.0 - self.b + self.b * (doc.length as f64 / avg_doc_len);

        let mut score = 0.0;
        // Repeated query tokens count once per occurrence
        for token in query_tokens {
            let doc_freq = stats.doc_freq(token);
            if doc_freq == 0 {
                continue;
            }
            let tf = doc.term_freq(token) as f64;
            let numerator = tf * (self.k1 + 1.0);
            let denominator = (tf + self.k1 * length_norm).max(self.min_denominator);
            score += self.idf(doc_freq, stats.doc_count()) * numerator / denominator;
        }
        score
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

/// Exponential recency weight `exp(-lambda * age)`, where age is clamped at zero.
/// No lambda, or a zero lambda, leaves scores untouched.
pub fn time_decay(lambda: Option<f64>, cutoff_ts: Timestamp, event_ts: Timestamp) -> f64 {
    match lambda {
        Some(lambda) if lambda != 0.0 => {
            let age = cutoff_ts.saturating_sub(event_ts).max(0) as f64;
            (-lambda * age).exp()
        }
        _ => 1.0,
    }
}
