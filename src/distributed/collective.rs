//! Collective operations a worker group issues in lockstep.
//!
//! Every worker must call the same collectives in the same order, including
//! workers with no local work. A worker that skips or reorders a call blocks
//! the whole group; nothing here detects that in general.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::error::Result;

/// Rank of the worker that owns the index.
pub const AUTHORITY_RANK: usize = 0;

/// Byte-level collective substrate.
pub trait Collective: Send {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    fn is_authority(&self) -> bool {
        self.rank() == AUTHORITY_RANK
    }

    /// Every worker's payload, indexed by rank.
    fn all_gather_bytes(&self, local: Vec<u8>) -> Result<Vec<Vec<u8>>>;

    /// The authority passes `Some(payload)`; every worker gets that payload back.
    /// Payloads from other workers are ignored.
    fn broadcast_bytes(&self, payload: Option<Vec<u8>>) -> Result<Vec<u8>>;

    fn barrier(&self) -> Result<()>;
}

/// Typed collectives on top of [`Collective`], encoded with bincode.
pub trait CollectiveExt: Collective {
    /// Each worker's count, in rank order.
    fn gather_counts(&self, local: usize) -> Result<Vec<usize>> {
        let payload = bincode::serialize(&(local as u64))?;
        self.all_gather_bytes(payload)?
            .iter()
            .map(|bytes| Ok(bincode::deserialize::<u64>(bytes)? as usize))
            .collect()
    }

    /// All workers' lists concatenated in rank order.
    fn gather_objects<T>(&self, local: &[T]) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let payload = bincode::serialize(local)?;
        let mut all = Vec::new();
        for bytes in self.all_gather_bytes(payload)? {
            let part: Vec<T> = bincode::deserialize(&bytes)?;
            all.extend(part);
        }
        Ok(all)
    }

    fn broadcast_object<T>(&self, value: Option<&T>) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let payload = match value {
            Some(value) if self.is_authority() => Some(bincode::serialize(value)?),
            _ => None,
        };
        let bytes = self.broadcast_bytes(payload)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

impl<C: Collective + ?Sized> CollectiveExt for C {}
