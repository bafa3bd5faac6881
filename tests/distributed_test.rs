//! Multi-worker protocol tests over the in-process collective group.

use std::sync::Arc;
use std::thread;
use tempusdex::analysis::similarity::{ExactMatch, JaccardNgrams};
use tempusdex::core::config::{Config, MmrConfig};
use tempusdex::core::types::CandidateRow;
use tempusdex::distributed::coordinator::Coordinator;
use tempusdex::distributed::local::{LocalCollective, LocalGroup};
use tempusdex::index::temporal::TemporalIndex;
use tempusdex::selection::mmr::MmrSelector;

// ============================================================================
// Test Helpers
// ============================================================================

type Worker = Coordinator<LocalCollective, TemporalIndex>;

/// Run `f` on `world_size` worker threads; results come back in rank order.
fn run_workers<T, F>(world_size: usize, index: fn() -> TemporalIndex, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(Worker) -> T + Sync,
{
    let f = &f;
    thread::scope(|scope| {
        let handles: Vec<_> = LocalGroup::new(world_size)
            .into_iter()
            .map(|collective| {
                scope.spawn(move || {
                    // Every worker offers an index; only the authority keeps it
                    let worker = Coordinator::new(collective, Some(index()), Config::default())
                        .expect("Failed to create coordinator");
                    f(worker)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

fn plain_index() -> TemporalIndex {
    TemporalIndex::default()
}

fn dedup_index() -> TemporalIndex {
    TemporalIndex::default().with_similarity(Arc::new(ExactMatch))
}

fn seed_rows(rank: usize) -> Vec<CandidateRow> {
    if rank != 0 {
        return Vec::new();
    }
    ["alpha", "beta", "gamma", "delta", "epsilon"]
        .iter()
        .map(|word| CandidateRow::new(format!("{} fact", word), 0, 1.0))
        .collect()
}

// ============================================================================
// Query Slicing
// ============================================================================

#[test]
fn test_each_worker_gets_its_own_slice() {
    let local_queries = vec![vec!["alpha", "beta"], vec![], vec!["gamma", "delta", "epsilon"]];

    let results = run_workers(3, plain_index, |mut worker| {
        worker.add_candidates(&seed_rows(worker.rank()), Some(0)).unwrap();

        let queries = &local_queries[worker.rank()];
        let cutoffs = vec![10; queries.len()];
        worker.query_batch(queries, &cutoffs, 1, None, None).unwrap()
    });

    for (rank, hits) in results.iter().enumerate() {
        let queries = &local_queries[rank];
        assert_eq!(hits.len(), queries.len(), "rank {}", rank);
        for (query, result) in queries.iter().zip(hits) {
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].text, format!("{} fact", query));
        }
    }
}

#[test]
fn test_per_query_cutoffs_are_respected() {
    let results = run_workers(2, plain_index, |mut worker| {
        let rows = if worker.is_authority() {
            vec![CandidateRow::new("cat early", 5, 1.0), CandidateRow::new("cat late", 50, 1.0)]
        } else {
            Vec::new()
        };
        worker.add_candidates(&rows, Some(0)).unwrap();

        if worker.rank() == 1 {
            worker.query_batch(&["cat", "cat"], &[10, 100], 5, None, None).unwrap()
        } else {
            worker.query_batch::<&str>(&[], &[], 5, None, None).unwrap()
        }
    });

    assert!(results[0].is_empty());
    assert_eq!(results[1][0].len(), 1);
    assert_eq!(results[1][1].len(), 2);
    assert_eq!(results[1][1][0].text, "cat late");
}

// ============================================================================
// Insertion
// ============================================================================

#[test]
fn test_candidates_from_all_workers_are_visible_everywhere() {
    let results = run_workers(4, plain_index, |mut worker| {
        let rank = worker.rank();
        let rows = vec![CandidateRow::new(format!("shared note from worker{}", rank), 3, 0.5)];
        worker.add_candidates(&rows, None).unwrap();

        let hidden = worker.query_single("shared note", 3, 10, None, None).unwrap();
        let visible = worker.query_single("shared note", 4, 10, None, None).unwrap();
        (hidden.len(), visible.len(), worker.index().map(|i| i.len()))
    });

    for (rank, (hidden, visible, held)) in results.into_iter().enumerate() {
        assert_eq!(hidden, 0);
        assert_eq!(visible, 4);
        if rank == 0 {
            assert_eq!(held, Some(4));
        } else {
            assert_eq!(held, None);
        }
    }
}

#[test]
fn test_duplicate_candidates_collapse_to_latest() {
    let results = run_workers(3, dedup_index, |mut worker| {
        let rank = worker.rank() as i64;
        let rows = vec![CandidateRow::new("the same fact", 10 + rank, 1.0)];
        worker.add_candidates(&rows, Some(0)).unwrap();
        worker.query_single("same fact", 100, 10, None, None).unwrap()
    });

    for hits in results {
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].event_ts, 12);
    }
}

#[test]
fn test_parsimonious_insertion_bounds_each_bucket() {
    let results = run_workers(3, plain_index, |mut worker| {
        let rank = worker.rank();
        let rows = vec![
            CandidateRow::new(format!("answer draft {} for question one", rank), 1, 0.5 + rank as f64 / 10.0)
                .with_bucket("q1"),
            CandidateRow::new(format!("solution {} to question two", rank), 1, 0.2).with_bucket("q2"),
        ];
        worker
            .add_candidates_parsimonious(
                &rows,
                &JaccardNgrams::default(),
                &MmrSelector,
                &MmrConfig::new(2, 0.7),
                Some(0),
            )
            .unwrap();

        let q1 = worker.query_single("question one", 5, 10, None, None).unwrap();
        let q2 = worker.query_single("question two", 5, 10, None, None).unwrap();
        (q1, q2)
    });

    for (q1, q2) in results {
        let one: Vec<_> = q1.iter().filter(|h| h.text.starts_with("answer")).collect();
        let two: Vec<_> = q2.iter().filter(|h| h.text.starts_with("solution")).collect();
        assert_eq!(one.len(), 2);
        assert_eq!(two.len(), 2);
        // Highest utility in the bucket is always admitted
        assert!(one.iter().any(|h| h.text.starts_with("answer draft 2")));
    }
}

// ============================================================================
// Reset
// ============================================================================

#[test]
fn test_reset_is_seen_by_every_worker() {
    let results = run_workers(3, plain_index, |mut worker| {
        worker.add_candidates(&seed_rows(worker.rank()), Some(0)).unwrap();
        let before = worker.query_single("alpha", 10, 5, None, None).unwrap().len();
        worker.reset().unwrap();
        let after = worker.query_single("alpha", 10, 5, None, None).unwrap().len();
        (before, after)
    });

    assert!(results.iter().all(|&(before, after)| before == 1 && after == 0));
}
