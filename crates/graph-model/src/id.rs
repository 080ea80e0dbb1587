//! Conflict-free identifiers
//!
//! Every vertex and edge is named by the client that created it plus a
//! sequence number that only that client increments. No coordination between
//! clients is needed: the client id namespaces the counter.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Identifier of a client attached to a graph (issued by the remote authority)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl ClientId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique id of a vertex or an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FullId {
    /// Client that created the entity
    pub client: ClientId,
    /// Sequence number within the creating client
    pub seq: u64,
}

impl FullId {
    pub fn new(client: ClientId, seq: u64) -> Self {
        Self { client, seq }
    }
}

impl fmt::Display for FullId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.client.0, self.seq)
    }
}

/// Error returned when a `"<client>-<seq>"` string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid full id: {input:?}")]
pub struct ParseFullIdError {
    pub input: String,
}

impl FromStr for FullId {
    type Err = ParseFullIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseFullIdError { input: s.to_string() };
        let (client, seq) = s.split_once('-').ok_or_else(err)?;
        let client = client.parse::<u64>().map_err(|_| err())?;
        let seq = seq.parse::<u64>().map_err(|_| err())?;
        Ok(Self::new(ClientId(client), seq))
    }
}

/// Trait for anything addressed by a [`FullId`]
pub trait HasFullId {
    fn full_id(&self) -> FullId;
}

/// Per-client sequence allocator
///
/// Allocation is a local counter increment, so creating an entity never waits
/// on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdAllocator {
    client: ClientId,
    last: u64,
}

impl IdAllocator {
    pub fn new(client: ClientId) -> Self {
        Self { client, last: 0 }
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Last sequence handed out (or observed)
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Allocate the next id for this client
    pub fn next(&mut self) -> FullId {
        self.last += 1;
        FullId::new(self.client, self.last)
    }

    /// Record a sequence this client is known to have used already.
    /// The counter never moves backwards.
    pub fn observe(&mut self, seq: u64) {
        self.last = self.last.max(seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_full_id_round_trips(client in any::<u64>(), seq in any::<u64>()) {
            let id = FullId::new(ClientId(client), seq);
            let parsed: FullId = id.to_string().parse().unwrap();
            prop_assert_eq!(parsed, id);
        }

        #[test]
        fn prop_allocator_passes_everything_observed(
            observed in prop::collection::vec(any::<u32>(), 0..16),
        ) {
            let mut alloc = IdAllocator::new(ClientId(5));
            for seq in &observed {
                alloc.observe(u64::from(*seq));
            }
            let next = alloc.next();
            prop_assert!(observed.iter().all(|seq| next.seq > u64::from(*seq)));
            prop_assert_eq!(next.client, ClientId(5));
        }
    }

    #[test]
    fn test_format() {
        assert_eq!(FullId::new(ClientId(10), 32).to_string(), "10-32");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "1", "1-", "-1", "a-1", "1-b", "1-2-3", "-1-2"] {
            assert!(input.parse::<FullId>().is_err(), "{input:?} should not parse");
        }
    }

    #[test]
    fn test_clients_do_not_collide() {
        let mut first = IdAllocator::new(ClientId(1));
        let mut second = IdAllocator::new(ClientId(2));

        let a = first.next();
        let b = second.next();

        assert_eq!(a.to_string(), "1-1");
        assert_eq!(b.to_string(), "2-1");
        assert_ne!(a, b);
    }

    #[test]
    fn test_observe_never_rewinds() {
        let mut alloc = IdAllocator::new(ClientId(3));
        alloc.observe(7);
        alloc.observe(4);
        assert_eq!(alloc.next(), FullId::new(ClientId(3), 8));
    }
}
