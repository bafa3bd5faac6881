//! In-process worker group: one `LocalCollective` per thread, connected by a
//! dedicated channel for every ordered pair of ranks.
//!
//! Channels are FIFO per pair, so the n-th message a worker reads from a peer
//! always belongs to the n-th collective that peer issued.

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::trace;

use crate::core::error::{Error, ErrorKind, Result};
use crate::distributed::collective::{Collective, AUTHORITY_RANK};

#[derive(Debug)]
enum Message {
    Gather(Vec<u8>),
    Broadcast(Vec<u8>),
    Barrier,
}

impl Message {
    fn kind(&self) -> &'static str {
        match self {
            Message::Gather(_) => "gather",
            Message::Broadcast(_) => "broadcast",
            Message::Barrier => "barrier",
        }
    }
}

pub struct LocalGroup;

impl LocalGroup {
    /// Create `world_size` connected workers; element `i` has rank `i`.
    pub fn new(world_size: usize) -> Vec<LocalCollective> {
        let mut outboxes: Vec<Vec<Sender<Message>>> = (0..world_size).map(|_| Vec::new()).collect();
        let mut inboxes: Vec<Vec<Receiver<Message>>> = (0..world_size).map(|_| Vec::new()).collect();

        for from in 0..world_size {
            for to in 0..world_size {
                let (tx, rx) = unbounded();
                outboxes[from].push(tx); // outboxes[from][to]
                inboxes[to].push(rx);    // inboxes[to][from]
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outbox, inbox))| LocalCollective {
                rank,
                world_size,
                outbox,
                inbox,
            })
            .collect()
    }
}

pub struct LocalCollective {
    rank: usize,
    world_size: usize,
    outbox: Vec<Sender<Message>>,
    inbox: Vec<Receiver<Message>>,
}

impl LocalCollective {
    fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.world_size).filter(move |&peer| peer != self.rank)
    }

    fn send(&self, to: usize, message: Message) -> Result<()> {
        self.outbox[to].send(message).map_err(|_| {
            Error::new(ErrorKind::Disconnected, format!("Worker {} hung up (sending from {})", to, self.rank))
        })
    }

    fn recv(&self, from: usize) -> Result<Message> {
        self.inbox[from].recv().map_err(|_| {
            Error::new(ErrorKind::Disconnected, format!("Worker {} hung up (receiving on {})", from, self.rank))
        })
    }

    fn mismatch(&self, from: usize, expected: &str, got: &Message) -> Error {
        Error::new(
            ErrorKind::ProtocolMismatch,
            format!(
                "Worker {} expected {} from worker {} but received {}",
                self.rank, expected, from, got.kind()
            ),
        )
    }
}

impl Collective for LocalCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn all_gather_bytes(&self, local: Vec<u8>) -> Result<Vec<Vec<u8>>> {
        trace!(target: "tempusdex::collective", rank = self.rank, bytes = local.len(), "all_gather");
        for peer in self.peers() {
            self.send(peer, Message::Gather(local.clone()))?;
        }

        let mut gathered = Vec::with_capacity(self.world_size);
        for from in 0..self.world_size {
            if from == self.rank {
                gathered.push(local.clone());
                continue;
            }
            match self.recv(from)? {
                Message::Gather(bytes) => gathered.push(bytes),
                other => return Err(self.mismatch(from, "gather", &other)),
            }
        }
        Ok(gathered)
    }

    fn broadcast_bytes(&self, payload: Option<Vec<u8>>) -> Result<Vec<u8>> {
        trace!(target: "tempusdex::collective", rank = self.rank, "broadcast");
        if self.rank == AUTHORITY_RANK {
            let payload = payload.ok_or_else(|| {
                Error::invalid_argument("The authority must supply the broadcast payload")
            })?;
            for peer in self.peers() {
                self.send(peer, Message::Broadcast(payload.clone()))?;
            }
            return Ok(payload);
        }

        match self.recv(AUTHORITY_RANK)? {
            Message::Broadcast(bytes) => Ok(bytes),
            other => Err(self.mismatch(AUTHORITY_RANK, "broadcast", &other)),
        }
    }

    fn barrier(&self) -> Result<()> {
        trace!(target: "tempusdex::collective", rank = self.rank, "barrier");
        for peer in self.peers() {
            self.send(peer, Message::Barrier)?;
        }
        for from in self.peers() {
            match self.recv(from)? {
                Message::Barrier => {}
                other => return Err(self.mismatch(from, "barrier", &other)),
            }
        }
        Ok(())
    }
}
