//! Remote authority boundary
//!
//! The authority owns the single total order of commands. The engine only
//! needs two calls: pull everything after a sequence number, and submit one
//! command.

use std::collections::HashSet;

use async_trait::async_trait;
use graph_model::ClientId;
use parking_lot::Mutex;
use tracing::trace;

use crate::command::Command;
use crate::error::TransportError;

/// Result of one fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBatch {
    /// Commands with sequence greater than the requested one, in order
    pub commands: Vec<Command>,
    /// Highest sequence the authority has assigned so far
    pub latest_sequence: u64,
}

impl CommandBatch {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[async_trait]
pub trait RemoteAuthority: Send + Sync + 'static {
    /// Commands with sequence strictly greater than `after`. An empty batch
    /// means the caller is caught up.
    async fn fetch_commands(&self, client: ClientId, after: u64) -> Result<CommandBatch, TransportError>;

    /// Append a command to the log. The authority assigns its sequence.
    async fn submit_command(&self, command: Command) -> Result<(), TransportError>;
}

#[derive(Debug, Default)]
struct Inner {
    log: Vec<Command>,
    next_client: u64,
    clients: HashSet<ClientId>,
    failing_submits: usize,
    failing_fetches: usize,
}

/// In-process authority
#[derive(Debug)]
pub struct MemoryAuthority {
    inner: Mutex<Inner>,
    batch_limit: usize,
}

impl MemoryAuthority {
    pub fn new() -> Self {
        Self::with_batch_limit(usize::MAX)
    }

    /// Return at most `limit` commands per fetch
    pub fn with_batch_limit(limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            batch_limit: limit.max(1),
        }
    }

    /// Issue a fresh client id (stand-in for session bootstrap)
    pub fn register_client(&self) -> ClientId {
        let mut inner = self.inner.lock();
        inner.next_client += 1;
        let client = ClientId(inner.next_client);
        inner.clients.insert(client);
        client
    }

    /// Re-admit a known client id, e.g. a client rejoining with its old identity
    pub fn admit(&self, client: ClientId) {
        let mut inner = self.inner.lock();
        inner.next_client = inner.next_client.max(client.0);
        inner.clients.insert(client);
    }

    pub fn revoke(&self, client: ClientId) {
        self.inner.lock().clients.remove(&client);
    }

    /// Make the next `count` submits fail with a network error
    pub fn fail_next_submits(&self, count: usize) {
        self.inner.lock().failing_submits = count;
    }

    /// Make the next `count` fetches fail with a network error
    pub fn fail_next_fetches(&self, count: usize) {
        self.inner.lock().failing_fetches = count;
    }

    /// Sequenced history
    pub fn history(&self) -> Vec<Command> {
        self.inner.lock().log.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a command directly, bypassing client checks
    pub fn seed(&self, command: Command) -> u64 {
        let mut inner = self.inner.lock();
        let sequence = inner.log.len() as u64 + 1;
        inner.log.push(command.with_sequence(sequence));
        sequence
    }
}

impl Default for MemoryAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteAuthority for MemoryAuthority {
    async fn fetch_commands(&self, client: ClientId, after: u64) -> Result<CommandBatch, TransportError> {
        let mut inner = self.inner.lock();
        if !inner.clients.contains(&client) {
            return Err(TransportError::Unauthorized);
        }
        if inner.failing_fetches > 0 {
            inner.failing_fetches -= 1;
            return Err(TransportError::Network("injected fetch failure".into()));
        }

        let start = usize::try_from(after).unwrap_or(usize::MAX).min(inner.log.len());
        let commands: Vec<Command> = inner.log[start..]
            .iter()
            .take(self.batch_limit)
            .cloned()
            .collect();
        Ok(CommandBatch {
            commands,
            latest_sequence: inner.log.len() as u64,
        })
    }

    async fn submit_command(&self, command: Command) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if !inner.clients.contains(&command.origin) {
            return Err(TransportError::Unauthorized);
        }
        if command.name.is_empty() {
            return Err(TransportError::Rejected("command has no name".into()));
        }
        if inner.failing_submits > 0 {
            inner.failing_submits -= 1;
            return Err(TransportError::Network("injected submit failure".into()));
        }

        let sequence = inner.log.len() as u64 + 1;
        trace!(%sequence, name = %command.name, origin = %command.origin, "command sequenced");
        inner.log.push(command.with_sequence(sequence));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequences_are_assigned_in_order() {
        let authority = MemoryAuthority::new();
        let a = authority.register_client();
        let b = authority.register_client();
        assert_ne!(a, b);

        authority.submit_command(Command::new("RemoveVertex", a, ["1-1"])).await.unwrap();
        authority.submit_command(Command::new("RemoveVertex", b, ["1-2"])).await.unwrap();

        let batch = authority.fetch_commands(a, 0).await.unwrap();
        let sequences: Vec<u64> = batch.commands.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, [1, 2]);
        assert_eq!(batch.latest_sequence, 2);

        let batch = authority.fetch_commands(a, 2).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_batch_limit() {
        let authority = MemoryAuthority::with_batch_limit(2);
        let client = authority.register_client();
        for _ in 0..5 {
            authority.seed(Command::new("RemoveVertex", client, ["1-1"]));
        }
        let batch = authority.fetch_commands(client, 1).await.unwrap();
        let sequences: Vec<u64> = batch.commands.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, [2, 3]);
    }

    #[tokio::test]
    async fn test_unknown_client_is_unauthorized() {
        let authority = MemoryAuthority::new();
        let client = authority.register_client();
        authority.revoke(client);
        assert_eq!(
            authority.fetch_commands(client, 0).await,
            Err(TransportError::Unauthorized)
        );
        assert_eq!(
            authority.submit_command(Command::new("RemoveVertex", ClientId(42), [""])).await,
            Err(TransportError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let authority = MemoryAuthority::new();
        let client = authority.register_client();
        authority.fail_next_submits(1);
        let command = Command::new("RemoveVertex", client, ["1-1"]);
        assert!(matches!(
            authority.submit_command(command.clone()).await,
            Err(TransportError::Network(_))
        ));
        authority.submit_command(command).await.unwrap();
        assert_eq!(authority.len(), 1);
    }

    #[tokio::test]
    async fn test_nameless_command_is_rejected() {
        let authority = MemoryAuthority::new();
        let client = authority.register_client();
        assert!(matches!(
            authority.submit_command(Command::new("", client, ["1-1"])).await,
            Err(TransportError::Rejected(_))
        ));
        assert!(authority.is_empty());
    }

    #[tokio::test]
    async fn test_admit_restores_a_revoked_client() {
        let authority = MemoryAuthority::new();
        let client = authority.register_client();
        authority.revoke(client);
        authority.admit(client);
        assert!(authority.fetch_commands(client, 0).await.unwrap().is_empty());
        assert_ne!(authority.register_client(), client);
    }
}
