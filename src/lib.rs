pub mod core;
pub mod analysis;
pub mod scoring;
pub mod search;
pub mod index;
pub mod selection;
pub mod distributed;

/*
┌──────────────────────────────────────────────────────────────────────────────────────┐
│                              TEMPUSDEX ARCHITECTURE                                    │
└──────────────────────────────────────────────────────────────────────────────────────┘

   worker 0 (authority)            worker 1                      worker N-1
  ┌─────────────────────────┐    ┌─────────────────────────┐    ┌─────────────────────────┐
  │ Coordinator             │    │ Coordinator             │    │ Coordinator             │
  │ • collective: C         │    │ • collective: C         │    │ • collective: C         │
  │ • retriever: Some(R) ───┼─┐  │ • retriever: None       │    │ • retriever: None       │
  └───────────┬─────────────┘ │  └───────────┬─────────────┘    └───────────┬─────────────┘
              │               │              │                              │
              └──── gather_counts / gather_objects / broadcast / barrier ───┘
                              │
                              ▼
  ┌─────────────────────────────────────────────────────────────────────────────────────┐
  │ struct TemporalIndex                                                                 │
  │ • documents: Vec<Document>     // storage order = tie-break order                    │
  │ • stats: CorpusStats           // df, N, total length; moves with every mutation     │
  │ • scorer: BM25Scorer           // k1, b, denominator floor                           │
  │ • similarity: Option<Arc<dyn Similarity>>   // recency-wins dedup per namespace      │
  └─────────────────────────────────────────────────────────────────────────────────────┘

  add_candidates_parsimonious: gather ─► group by bucket_key ─► MmrSelector (top_m) ─► add
*/
