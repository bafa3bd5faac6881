//! Routes queries and insertions from every worker to the single index held
//! by the authority worker.
//!
//! Every public operation issues the same sequence of collectives on every
//! worker, whether or not the worker has local work. Callers must invoke the
//! operations in the same order on all workers; a worker that diverges or
//! stalls blocks the group indefinitely.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::analysis::similarity::Similarity;
use crate::core::config::{Config, MmrConfig};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{CandidateRow, Timestamp};
use crate::distributed::collective::{Collective, CollectiveExt};
use crate::index::retriever::Retriever;
use crate::index::temporal::{AddOutcome, NewDocument, TemporalQuery};
use crate::search::results::Hit;
use crate::selection::mmr::{CandidateSelector, SelectionItem};

pub const ORIGIN_REVISE: &str = "revise";

/// Per-round tally of what the authority did with gathered candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub gathered: usize,
    pub admitted: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub kept: usize,
}

impl InsertSummary {
    fn record(&mut self, outcome: AddOutcome) {
        self.admitted += 1;
        match outcome {
            AddOutcome::Inserted(_) => self.inserted += 1,
            AddOutcome::Replaced(_) => self.replaced += 1,
            AddOutcome::Kept(_) => self.kept += 1,
        }
    }
}

pub struct Coordinator<C: Collective, R: Retriever> {
    collective: C,
    retriever: Option<R>, // Only ever Some on the authority
    config: Config,
}

impl<C: Collective, R: Retriever> Coordinator<C, R> {
    /// The authority must pass its index. Any other worker's index is dropped.
    pub fn new(collective: C, retriever: Option<R>, config: Config) -> Result<Self> {
        let retriever = if collective.is_authority() {
            if retriever.is_none() {
                return Err(Error::invalid_argument("The authority worker requires an index"));
            }
            retriever
        } else {
            if retriever.is_some() {
                debug!(
                    target: "tempusdex::coordinator",
                    rank = collective.rank(),
                    "Dropping index passed to a non-authority worker"
                );
            }
            None
        };

        Ok(Coordinator {
            collective,
            retriever,
            config,
        })
    }

    pub fn rank(&self) -> usize {
        self.collective.rank()
    }

    pub fn world_size(&self) -> usize {
        self.collective.world_size()
    }

    pub fn is_authority(&self) -> bool {
        self.collective.is_authority()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The index, on the authority only.
    pub fn index(&self) -> Option<&R> {
        self.retriever.as_ref()
    }

    /// Run this worker's queries against the shared index.
    ///
    /// Result `i` answers `queries[i]` at `cutoff_ts_list[i]`. A worker with no
    /// queries still takes part in every collective and gets an empty list.
    /// Without `namespaces` (or with an empty list) the configured namespace
    /// is searched.
    pub fn query_batch<S: AsRef<str>>(
        &self,
        queries: &[S],
        cutoff_ts_list: &[Timestamp],
        top_k: usize,
        time_decay_lambda: Option<f64>,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<Vec<Hit>>> {
        if queries.len() != cutoff_ts_list.len() {
            return Err(Error::invalid_argument(format!(
                "{} queries but {} cutoffs",
                queries.len(),
                cutoff_ts_list.len()
            )));
        }

        let local_n = queries.len();
        let counts = self.collective.gather_counts(local_n)?;
        let mut starts = Vec::with_capacity(counts.len() + 1);
        starts.push(0);
        for count in &counts {
            starts.push(starts[starts.len() - 1] + count);
        }

        let local_queries: Vec<String> = queries.iter().map(|q| q.as_ref().to_string()).collect();
        let all_queries = self.collective.gather_objects(&local_queries)?;
        let all_cutoffs = self.collective.gather_objects(cutoff_ts_list)?;
        debug!(
            target: "tempusdex::coordinator",
            rank = self.rank(),
            local = local_n,
            total = all_queries.len(),
            "Gathered query batch"
        );

        let all_hits = match &self.retriever {
            Some(retriever) => {
                let outcome = self.run_queries(retriever, &all_queries, &all_cutoffs, top_k, time_decay_lambda, namespaces);
                if let Err(err) = &outcome {
                    warn!(target: "tempusdex::coordinator", error = %err, "Query batch failed on authority");
                }
                let payload: std::result::Result<Vec<Vec<Hit>>, String> = outcome.map_err(|e| e.to_string());
                self.collective.broadcast_object(Some(&payload))?
            }
            None => self.collective.broadcast_object::<std::result::Result<Vec<Vec<Hit>>, String>>(None)?,
        };
        let mut all_hits = all_hits.map_err(|context| {
            Error::new(ErrorKind::Internal, format!("Authority failed to answer queries: {}", context))
        })?;

        let total = starts[starts.len() - 1];
        if all_hits.len() != total {
            return Err(Error::new(
                ErrorKind::Internal,
                format!("Expected {} result lists, received {}", total, all_hits.len()),
            ));
        }

        let rank = self.rank();
        let (start, end) = (starts[rank], starts[rank + 1]);
        all_hits.truncate(end);
        Ok(all_hits.split_off(start))
    }

    fn run_queries(
        &self,
        retriever: &R,
        all_queries: &[String],
        all_cutoffs: &[Timestamp],
        top_k: usize,
        time_decay_lambda: Option<f64>,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<Vec<Hit>>> {
        let namespaces = match namespaces {
            Some(ns) if !ns.is_empty() => ns.to_vec(),
            _ => vec![self.config.namespace.clone()],
        };

        all_queries
            .iter()
            .zip(all_cutoffs)
            .map(|(text, &cutoff_ts)| {
                let query = TemporalQuery {
                    text: text.clone(),
                    k: top_k,
                    cutoff_ts,
                    namespaces: Some(namespaces.clone()),
                    time_decay_lambda,
                };
                retriever.query(&query)
            })
            .collect()
    }

    pub fn query_single(
        &self,
        query: &str,
        cutoff_ts: Timestamp,
        top_k: usize,
        time_decay_lambda: Option<f64>,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<Hit>> {
        self.query_batch(&[query], &[cutoff_ts], top_k, time_decay_lambda, namespaces)?
            .pop()
            .ok_or_else(|| Error::new(ErrorKind::Internal, "Missing result for single query".to_string()))
    }

    /// Clear the shared index. Returns once every worker has passed the barrier.
    pub fn reset(&mut self) -> Result<()> {
        if let Some(retriever) = self.retriever.as_mut() {
            if retriever.reset() {
                info!(target: "tempusdex::coordinator", "Index reset");
            } else {
                debug!(target: "tempusdex::coordinator", "Index does not support reset");
            }
        }
        self.collective.barrier()
    }

    /// Insert every worker's candidates, visible `visible_delay` time units
    /// after their `now_ts` (the configured delay when `None`).
    pub fn add_candidates(
        &mut self,
        local_rows: &[CandidateRow],
        visible_delay: Option<Timestamp>,
    ) -> Result<()> {
        let visible_delay = visible_delay.unwrap_or(self.config.visible_delay);
        let all_rows = self.collective.gather_objects(local_rows)?;

        let outcome = match self.retriever.as_mut() {
            Some(retriever) => {
                let mut summary = InsertSummary { gathered: all_rows.len(), ..Default::default() };
                insert_rows(retriever, all_rows, visible_delay, &self.config.namespace, &mut summary)
                    .map(|_| Some(summary))
            }
            None => Ok(None),
        };
        self.finish_insert_round(outcome)
    }

    /// Like [`add_candidates`](Self::add_candidates), but each `bucket_key`
    /// group is first cut down to `mmr.top_m` rows by `selector`.
    ///
    /// Buckets are processed in order of first appearance; rows without a
    /// bucket key form one bucket of their own.
    pub fn add_candidates_parsimonious<S: CandidateSelector>(
        &mut self,
        local_rows: &[CandidateRow],
        similarity: &dyn Similarity,
        selector: &S,
        mmr: &MmrConfig,
        visible_delay: Option<Timestamp>,
    ) -> Result<()> {
        if !mmr.alpha.is_finite() {
            return Err(Error::invalid_argument(format!("MMR alpha must be finite, got {}", mmr.alpha)));
        }
        let visible_delay = visible_delay.unwrap_or(self.config.visible_delay);
        let all_rows = self.collective.gather_objects(local_rows)?;

        let outcome = match self.retriever.as_mut() {
            Some(retriever) => {
                let mut summary = InsertSummary { gathered: all_rows.len(), ..Default::default() };
                let namespace = &self.config.namespace;
                group_by_bucket(all_rows)
                    .into_iter()
                    .try_for_each(|rows| {
                        let items = rows
                            .into_iter()
                            .map(|row| SelectionItem::new(row.text.clone(), row.utility, row))
                            .collect();
                        let selected = selector.select(items, similarity, mmr)?;
                        insert_rows(
                            retriever,
                            selected.into_iter().map(|item| item.payload),
                            visible_delay,
                            namespace,
                            &mut summary,
                        )
                    })
                    .map(|_| Some(summary))
            }
            None => Ok(None),
        };
        self.finish_insert_round(outcome)
    }

    /// Barrier after an insertion round, whatever happened on the authority,
    /// so that no worker runs ahead of the applied insertions.
    fn finish_insert_round(&self, outcome: Result<Option<InsertSummary>>) -> Result<()> {
        match &outcome {
            Ok(Some(summary)) => info!(
                target: "tempusdex::coordinator",
                gathered = summary.gathered,
                admitted = summary.admitted,
                inserted = summary.inserted,
                replaced = summary.replaced,
                kept = summary.kept,
                "Applied candidate round"
            ),
            Ok(None) => {}
            Err(err) => warn!(target: "tempusdex::coordinator", error = %err, "Candidate round failed on authority"),
        }
        self.collective.barrier()?;
        outcome.map(|_| ())
    }
}

fn insert_rows<R, I>(
    retriever: &mut R,
    rows: I,
    visible_delay: Timestamp,
    namespace: &str,
    summary: &mut InsertSummary,
) -> Result<()>
where
    R: Retriever,
    I: IntoIterator<Item = CandidateRow>,
{
    for row in rows {
        let doc = NewDocument::new(row.text, row.now_ts)
            .visible_after(row.now_ts.saturating_add(visible_delay))
            .in_namespace(namespace)
            .with_field("origin", ORIGIN_REVISE)
            .with_field("utility", row.utility);
        summary.record(retriever.add(doc)?);
    }
    Ok(())
}

fn group_by_bucket(rows: Vec<CandidateRow>) -> Vec<Vec<CandidateRow>> {
    let mut slots: HashMap<Option<String>, usize> = HashMap::new();
    let mut buckets: Vec<Vec<CandidateRow>> = Vec::new();
    for row in rows {
        let slot = *slots.entry(row.bucket_key.clone()).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(row);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::similarity::ExactMatch;
    use crate::core::types::MetaValue;
    use crate::distributed::local::{LocalCollective, LocalGroup};
    use crate::index::temporal::TemporalIndex;
    use crate::selection::mmr::MmrSelector;

    fn solo() -> Coordinator<LocalCollective, TemporalIndex> {
        let collective = LocalGroup::new(1).pop().unwrap();
        Coordinator::new(collective, Some(TemporalIndex::default()), Config::default()).unwrap()
    }

    #[test]
    fn authority_requires_an_index() {
        let collective = LocalGroup::new(1).pop().unwrap();
        let err = Coordinator::<_, TemporalIndex>::new(collective, None, Config::default())
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn mismatched_lengths_fail_before_any_collective() {
        let coordinator = solo();
        let err = coordinator.query_batch(&["a", "b"], &[1], 5, None, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn candidates_become_visible_after_delay() {
        let mut coordinator = solo();
        coordinator
            .add_candidates(&[CandidateRow::new("cat sat", 10, 0.5)], None)
            .unwrap();

        assert!(coordinator.query_single("cat", 10, 5, None, None).unwrap().is_empty());
        let hits = coordinator.query_single("cat", 11, 5, None, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].event_ts, 10);
        assert_eq!(hits[0].metadata.get("origin"), Some(&MetaValue::Text("revise".into())));
        assert_eq!(hits[0].metadata.get("utility"), Some(&MetaValue::Number(0.5)));
    }

    #[test]
    fn default_namespace_scopes_queries() {
        let mut coordinator = solo();
        coordinator.add_candidates(&[CandidateRow::new("cat", 0, 1.0)], Some(0)).unwrap();
        let other = vec!["eval".to_string()];
        assert!(coordinator.query_single("cat", 5, 5, None, Some(other.as_slice())).unwrap().is_empty());
        assert_eq!(coordinator.query_single("cat", 5, 5, None, Some(&[][..])).unwrap().len(), 1);
    }

    #[test]
    fn parsimonious_caps_each_bucket() {
        let mut coordinator = solo();
        let rows = vec![
            CandidateRow::new("alpha fact", 1, 0.9).with_bucket("q1"),
            CandidateRow::new("beta fact", 1, 0.8).with_bucket("q1"),
            CandidateRow::new("gamma fact", 1, 0.7).with_bucket("q1"),
            CandidateRow::new("delta fact", 1, 0.1).with_bucket("q2"),
            CandidateRow::new("loose fact", 1, 0.1),
        ];
        coordinator
            .add_candidates_parsimonious(&rows, &ExactMatch, &MmrSelector, &MmrConfig::new(2, 0.7), Some(0))
            .unwrap();

        let index = coordinator.index().unwrap();
        let texts: Vec<_> = index.documents().iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha fact", "beta fact", "delta fact", "loose fact"]);
        let keys: Vec<_> = index.get(0).unwrap().metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["origin", "utility"]);
    }

    #[test]
    fn visibility_saturates_at_the_end_of_time() {
        let mut coordinator = solo();
        coordinator
            .add_candidates(&[CandidateRow::new("last fact", i64::MAX, 1.0)], None)
            .unwrap();
        let doc = coordinator.index().unwrap().get(0).unwrap();
        assert_eq!(doc.event_ts, i64::MAX);
        assert_eq!(doc.visible_after_ts, i64::MAX);
        assert_eq!(coordinator.query_single("fact", i64::MAX, 5, None, None).unwrap().len(), 1);
    }

    #[test]
    fn reset_empties_the_index() {
        let mut coordinator = solo();
        coordinator.add_candidates(&[CandidateRow::new("cat", 0, 1.0)], None).unwrap();
        assert_eq!(coordinator.index().unwrap().len(), 1);
        coordinator.reset().unwrap();
        assert!(coordinator.index().unwrap().is_empty());
    }

    #[test]
    fn grouping_keeps_first_appearance_order() {
        let rows = vec![
            CandidateRow::new("a", 0, 0.0).with_bucket("y"),
            CandidateRow::new("b", 0, 0.0),
            CandidateRow::new("c", 0, 0.0).with_bucket("x"),
            CandidateRow::new("d", 0, 0.0).with_bucket("y"),
        ];
        let groups: Vec<Vec<String>> = group_by_bucket(rows)
            .into_iter()
            .map(|g| g.into_iter().map(|r| r.text).collect())
            .collect();
        assert_eq!(groups, vec![vec!["a", "d"], vec!["b"], vec!["c"]]);
    }
}
