//! Synchronization loops
//!
//! The inbound loop pulls the authority's log and hands batches to the
//! replica actor. The outbound loop drains the outgoing queue into the
//! authority. Both stop as soon as the session's cancellation token fires,
//! including while a request is in flight.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use graph_model::ClientId;
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::actor::ReplicaHandle;
use crate::authority::RemoteAuthority;
use crate::command::Command;
use crate::config::SyncConfig;
use crate::error::TransportError;
use crate::events::{GraphEvent, NetworkStatus};
use crate::stats::SyncStats;

/// Replica bootstrap state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// History is being replayed
    Loading,
    Loaded,
    /// The authority refused this client before history finished loading
    Unauthorized,
}

/// FIFO of locally issued commands awaiting transmission
///
/// A command stays at the front until its submission has been attempted, so
/// an empty queue means everything has been handed to the authority.
#[derive(Debug, Default)]
pub struct OutgoingQueue {
    commands: Mutex<VecDeque<Command>>,
    wake: Notify,
}

impl OutgoingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: Command) {
        self.commands.lock().push_back(command);
        self.wake.notify_one();
    }

    pub fn front(&self) -> Option<Command> {
        self.commands.lock().front().cloned()
    }

    fn pop_front(&self) -> Option<Command> {
        self.commands.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    /// Wait for a push, or at most `timeout`
    async fn wait(&self, timeout: Duration) {
        // elapsing is the normal idle wake-up, not an error
        let _ = tokio::time::timeout(timeout, self.wake.notified()).await;
    }
}

pub(crate) async fn run_outbound(
    authority: Arc<dyn RemoteAuthority>,
    queue: Arc<OutgoingQueue>,
    replica: ReplicaHandle,
    stats: Arc<SyncStats>,
    config: SyncConfig,
    cancel: CancellationToken,
) {
    debug!("outbound loop started");
    loop {
        while let Some(command) = queue.front() {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("outbound loop cancelled mid-submit");
                    return;
                }
                outcome = submit(authority.as_ref(), &command, &config) => outcome,
            };
            match outcome {
                Ok(()) => stats.record_submitted(),
                Err(err) => {
                    warn!(name = %command.name, %err, "command was not submitted");
                    stats.record_failed();
                    if replica.abandon(command).await.is_err() {
                        debug!("replica gone, outbound loop stopping");
                        return;
                    }
                }
            }
            queue.pop_front();
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = queue.wait(config.outbound_wake_timeout()) => {}
        }
    }
    debug!("outbound loop stopped");
}

/// Submit once, plus up to `submit_retries` more attempts on network errors
async fn submit(
    authority: &dyn RemoteAuthority,
    command: &Command,
    config: &SyncConfig,
) -> Result<(), TransportError> {
    let mut attempt = 0;
    loop {
        match authority.submit_command(command.clone()).await {
            Ok(()) => return Ok(()),
            Err(TransportError::Network(reason)) if attempt < config.submit_retries => {
                attempt += 1;
                debug!(name = %command.name, attempt, %reason, "retrying submit");
                tokio::time::sleep(config.retry_backoff() * attempt).await;
            }
            Err(err) => return Err(err),
        }
    }
}

pub(crate) async fn run_inbound(
    authority: Arc<dyn RemoteAuthority>,
    client: ClientId,
    replica: ReplicaHandle,
    status: watch::Sender<NetworkStatus>,
    config: SyncConfig,
    cancel: CancellationToken,
) {
    debug!("inbound loop started");
    let mut last_seen = 0u64;
    let mut loading = true;

    loop {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => break,
            fetched = authority.fetch_commands(client, last_seen) => fetched,
        };

        match fetched {
            Ok(batch) => {
                publish_status(&status, &replica, NetworkStatus::Connected).await;
                let latest = batch.latest_sequence;
                let mut commands = batch.commands;
                commands.retain(|c| c.sequence > last_seen);

                if commands.is_empty() {
                    if loading {
                        loading = false;
                        if replica.loaded().await.is_err() {
                            break;
                        }
                    }
                } else {
                    last_seen = commands.iter().map(|c| c.sequence).fold(last_seen, u64::max);
                    debug!(
                        count = commands.len(),
                        last_seen,
                        behind = latest.saturating_sub(last_seen),
                        "received commands"
                    );
                    if replica.remote(commands).await.is_err() {
                        break;
                    }
                }
            }
            Err(TransportError::Unauthorized) => {
                error!(%client, "authority rejected client, inbound loop stopping");
                publish_status(&status, &replica, NetworkStatus::Unauthorized).await;
                let _ = replica.unauthorized().await;
                break;
            }
            Err(err) => {
                warn!(%err, "fetch failed");
                publish_status(&status, &replica, NetworkStatus::Disconnected).await;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.poll_interval()) => {}
        }
    }
    debug!("inbound loop stopped");
}

async fn publish_status(
    status: &watch::Sender<NetworkStatus>,
    replica: &ReplicaHandle,
    next: NetworkStatus,
) {
    let changed = status.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
    if changed {
        info!(status = ?next, "network status changed");
        let _ = replica.notify(GraphEvent::NetworkStatusChanged(next)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::MemoryAuthority;

    #[test]
    fn test_queue_is_fifo() {
        let queue = OutgoingQueue::new();
        assert!(queue.is_empty());
        for seq in 1..=3 {
            queue.push(Command::new("RemoveVertex", ClientId(1), [format!("1-{seq}")]));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front().unwrap().parameters[0], "1-1");
        assert_eq!(queue.front().unwrap().parameters[0], "1-1");
        queue.pop_front();
        assert_eq!(queue.pop_front().unwrap().parameters[0], "1-2");
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_wait_returns_after_timeout() {
        let queue = OutgoingQueue::new();
        let started = tokio::time::Instant::now();
        queue.wait(Duration::from_millis(5)).await;
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_submit_retries_network_errors_only() {
        let authority = MemoryAuthority::new();
        let client = authority.register_client();
        let command = Command::new("RemoveVertex", client, ["1-1"]);
        let config = SyncConfig {
            submit_retries: 2,
            retry_backoff_ms: 1,
            ..SyncConfig::default()
        };

        authority.fail_next_submits(2);
        submit(&authority, &command, &config).await.unwrap();
        assert_eq!(authority.len(), 1);

        authority.fail_next_submits(3);
        assert!(submit(&authority, &command, &config).await.is_err());
        assert_eq!(authority.len(), 1);

        authority.revoke(client);
        assert_eq!(
            submit(&authority, &command, &config).await,
            Err(TransportError::Unauthorized)
        );
    }
}
