//! Greedy maximal-marginal-relevance selection.
//!
//! Picks the highest-utility item first, then repeatedly the item maximizing
//! `alpha * utility - (1 - alpha) * max_sim(item, selected)`, where the
//! similarity term is against the closest already-selected item.

use std::cmp::Ordering;

use crate::analysis::similarity::Similarity;
use crate::core::config::MmrConfig;
use crate::core::error::{Error, Result};

/// A scored candidate carrying an arbitrary payload through selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionItem<P> {
    pub text: String,
    pub utility: f64,
    pub payload: P,
}

impl<P> SelectionItem<P> {
    pub fn new(text: impl Into<String>, utility: f64, payload: P) -> Self {
        SelectionItem {
            text: text.into(),
            utility,
            payload,
        }
    }
}

/// Bounds a pool of candidates to at most `config.top_m` items.
pub trait CandidateSelector: Send + Sync {
    fn select<P>(
        &self,
        items: Vec<SelectionItem<P>>,
        similarity: &dyn Similarity,
        config: &MmrConfig,
    ) -> Result<Vec<SelectionItem<P>>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MmrSelector;

impl CandidateSelector for MmrSelector {
    fn select<P>(
        &self,
        items: Vec<SelectionItem<P>>,
        similarity: &dyn Similarity,
        config: &MmrConfig,
    ) -> Result<Vec<SelectionItem<P>>> {
        select(items, similarity, config)
    }
}

pub fn select<P>(
    mut items: Vec<SelectionItem<P>>,
    similarity: &dyn Similarity,
    config: &MmrConfig,
) -> Result<Vec<SelectionItem<P>>> {
    let alpha = config.alpha;
    if !alpha.is_finite() {
        return Err(Error::invalid_argument(format!("MMR alpha must be finite, got {}", alpha)));
    }
    if config.top_m == 0 || items.is_empty() {
        return Ok(Vec::new());
    }

    // Stable: equal utilities (0.0 and -0.0 included) keep their input order
    items.sort_by(|a, b| b.utility.partial_cmp(&a.utility).unwrap_or(Ordering::Equal));

    let mut pool = items.into_iter();
    let mut selected = Vec::with_capacity(config.top_m);
    if let Some(first) = pool.next() {
        selected.push(first);
    }
    let mut pool: Vec<SelectionItem<P>> = pool.collect();

    // closest[i]: max similarity of pool[i] to anything selected so far
    let mut closest: Vec<f64> = pool
        .iter()
        .map(|item| similarity.similarity(&item.text, &selected[0].text))
        .collect();

    while !pool.is_empty() && selected.len() < config.top_m {
        let mut best: Option<(usize, f64)> = None;
        for (i, item) in pool.iter().enumerate() {
            let score = alpha * item.utility - (1.0 - alpha) * closest[i];
            // Strict comparison: the first item reaching the best score wins
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        let Some((index, _)) = best else { break };
        let chosen = pool.remove(index);
        closest.remove(index);
        for (i, item) in pool.iter().enumerate() {
            let sim = similarity.similarity(&item.text, &chosen.text);
            if sim > closest[i] {
                closest[i] = sim;
            }
        }
        selected.push(chosen);
    }

    Ok(selected)
}
