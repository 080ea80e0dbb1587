//! # Graph Sync
//!
//! Keeps a local [`Graph`](graph_model::Graph) replica consistent with a
//! remote authority that owns the total order of commands:
//! - local mutations apply immediately and are queued for submission
//! - an inbound loop pulls the command log and replays it through the
//!   interpreter, first as a full history load, then incrementally
//! - a single replica actor serializes both paths
//!
//! Most callers only need [`GraphSession`].

pub mod actor;
pub mod authority;
pub mod command;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod events;
pub mod mutation;
pub mod processor;
pub mod session;
pub mod stats;

pub use actor::ReplicaHandle;
pub use authority::{CommandBatch, MemoryAuthority, RemoteAuthority};
pub use command::{Command, CommandKind, PARAMETER_COUNT};
pub use config::SyncConfig;
pub use encoder::CommandEncoder;
pub use engine::{LoadState, OutgoingQueue};
pub use error::{CommandError, SyncError, TransportError};
pub use events::{EventCategory, GraphEvent, GraphObservers, NetworkStatus, SubscriptionId};
pub use mutation::Mutation;
pub use processor::CommandProcessor;
pub use session::GraphSession;
pub use stats::{SyncStats, SyncStatsSnapshot};
