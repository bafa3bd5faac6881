use std::collections::HashSet;

use crate::analysis::tokenizer::{Tokenizer, WordTokenizer};

/// Symmetric text similarity in `[0, 1]`, used for dedup and diversity selection.
pub trait Similarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

impl<F> Similarity for F
where
    F: Fn(&str, &str) -> f64 + Send + Sync,
{
    fn similarity(&self, a: &str, b: &str) -> f64 {
        self(a, b)
    }
}

/// 1.0 for identical text, 0.0 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl Similarity for ExactMatch {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b { 1.0 } else { 0.0 }
    }
}

/// Jaccard overlap of word n-gram sets.
#[derive(Clone)]
pub struct JaccardNgrams {
    n: usize,
    tokenizer: WordTokenizer,
}

impl JaccardNgrams {
    pub fn new(n: usize) -> Self {
        JaccardNgrams {
            n: n.max(1),
            tokenizer: WordTokenizer::new(),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    fn ngrams(&self, text: &str) -> HashSet<Vec<String>> {
        let tokens = self.tokenizer.tokenize(text);
        if tokens.len() < self.n {
            return HashSet::new();
        }
        tokens.windows(self.n).map(|w| w.to_vec()).collect()
    }
}

impl Default for JaccardNgrams {
    fn default() -> Self {
        JaccardNgrams::new(3)
    }
}

impl Similarity for JaccardNgrams {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let left = self.ngrams(a);
        let right = self.ngrams(b);
        // Two texts too short to form any n-gram are treated as identical
        if left.is_empty() && right.is_empty() {
            return 1.0;
        }
        let shared = left.intersection(&right).count();
        let union = left.union(&right).count();
        shared as f64 / union.max(1) as f64
    }
}
