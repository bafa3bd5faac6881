use crate::core::error::Result;
use crate::index::temporal::{AddOutcome, NewDocument, TemporalIndex, TemporalQuery};
use crate::search::results::Hit;

/// The index capabilities the coordinator drives on the authority worker.
pub trait Retriever: Send {
    fn add(&mut self, doc: NewDocument) -> Result<AddOutcome>;

    fn query(&self, query: &TemporalQuery) -> Result<Vec<Hit>>;

    /// Clear the index. Returns `false` when the retriever cannot be reset,
    /// in which case nothing happens.
    fn reset(&mut self) -> bool {
        false
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Retriever for TemporalIndex {
    fn add(&mut self, doc: NewDocument) -> Result<AddOutcome> {
        Ok(TemporalIndex::add(self, doc))
    }

    fn query(&self, query: &TemporalQuery) -> Result<Vec<Hit>> {
        Ok(TemporalIndex::query(self, query))
    }

    fn reset(&mut self) -> bool {
        TemporalIndex::reset(self);
        true
    }

    fn len(&self) -> usize {
        TemporalIndex::len(self)
    }
}
