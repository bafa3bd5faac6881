use serde::{Serialize, Deserialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::core::types::{Metadata, Timestamp};

/// One ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub text: String,
    pub metadata: Metadata,
    pub score: f64,
    pub event_ts: Timestamp,
}

/// Score of the document stored at `position`.
///
/// Orders by score, then by position, so that on equal scores the document
/// appended later ranks higher.
#[derive(Debug, Clone, Copy)]
pub struct ScoredPosition {
    pub score: f64,
    pub position: usize,
}

impl PartialEq for ScoredPosition {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredPosition {}

impl PartialOrd for ScoredPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.position.cmp(&other.position))
    }
}

/// Top-K collector keeping the best `k` scored positions.
pub struct TopKCollector {
    heap: BinaryHeap<Reverse<ScoredPosition>>,
    k: usize,
    pub total_collected: usize,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        TopKCollector {
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
            k,
            total_collected: 0,
        }
    }

    pub fn collect(&mut self, scored: ScoredPosition) {
        self.total_collected += 1;
        if self.k == 0 {
            return;
        }

        if self.heap.len() < self.k {
            self.heap.push(Reverse(scored));
        } else if let Some(Reverse(min)) = self.heap.peek() {
            if scored > *min {
                self.heap.pop();
                self.heap.push(Reverse(scored));
            }
        }
    }

    /// Best first.
    pub fn into_sorted(self) -> Vec<ScoredPosition> {
        let mut results: Vec<_> = self.heap.into_iter().map(|Reverse(s)| s).collect();
        results.sort_by(|a, b| b.cmp(a));
        results
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
