//! Replica actor
//!
//! A single tokio task owns the [`Graph`]. Local calls from the session and
//! remote batches from the inbound loop are both posted to it as [`Action`]s,
//! so every mutation is applied in one place and in one order.

use std::sync::Arc;

use graph_model::{FullId, Graph, Point3};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::command::Command;
use crate::engine::{LoadState, OutgoingQueue};
use crate::error::{Result, SyncError};
use crate::events::GraphEvent;
use crate::mutation::Mutation;
use crate::processor::CommandProcessor;

const ACTION_CAP: usize = 1024;

type ReadFn = Box<dyn FnOnce(&Graph) + Send>;

enum Action {
    AddVertex {
        position: Point3,
        reply: oneshot::Sender<Result<FullId>>,
    },
    Connect {
        start: FullId,
        end: FullId,
        reply: oneshot::Sender<Result<FullId>>,
    },
    Apply {
        mutation: Mutation,
        reply: oneshot::Sender<Result<()>>,
    },
    Remote {
        commands: Vec<Command>,
    },
    Abandon {
        command: Command,
    },
    Loaded,
    Unauthorized,
    Notify(GraphEvent),
    Read(ReadFn),
    Shutdown {
        reply: oneshot::Sender<Graph>,
    },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Self::AddVertex { .. } => "AddVertex",
            Self::Connect { .. } => "Connect",
            Self::Apply { .. } => "Apply",
            Self::Remote { .. } => "Remote",
            Self::Abandon { .. } => "Abandon",
            Self::Loaded => "Loaded",
            Self::Unauthorized => "Unauthorized",
            Self::Notify(_) => "Notify",
            Self::Read(_) => "Read",
            Self::Shutdown { .. } => "Shutdown",
        }
    }
}

/// Cloneable handle for posting work to the replica actor
#[derive(Debug, Clone)]
pub struct ReplicaHandle {
    tx: mpsc::Sender<Action>,
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl ReplicaHandle {
    /// Spawn the actor on the current runtime
    pub(crate) fn spawn(
        processor: CommandProcessor,
        queue: Arc<OutgoingQueue>,
        load_state: watch::Sender<LoadState>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(ACTION_CAP);
        let actor = ReplicaActor {
            processor,
            queue,
            load_state,
            rx,
        };
        (Self { tx }, tokio::spawn(actor.run()))
    }

    pub async fn add_vertex(&self, position: Point3) -> Result<FullId> {
        let (reply, rx) = oneshot::channel();
        self.send(Action::AddVertex { position, reply }).await?;
        rx.await.map_err(|_| SyncError::ActorClosed)?
    }

    pub async fn connect(&self, start: FullId, end: FullId) -> Result<FullId> {
        let (reply, rx) = oneshot::channel();
        self.send(Action::Connect { start, end, reply }).await?;
        rx.await.map_err(|_| SyncError::ActorClosed)?
    }

    /// Apply a local mutation and queue it for submission
    pub async fn apply(&self, mutation: Mutation) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Action::Apply { mutation, reply }).await?;
        rx.await.map_err(|_| SyncError::ActorClosed)?
    }

    /// Run `f` against the current graph
    pub async fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Graph) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let read: ReadFn = Box::new(move |graph| {
            let _ = reply.send(f(graph));
        });
        self.send(Action::Read(read)).await?;
        rx.await.map_err(|_| SyncError::ActorClosed)
    }

    pub(crate) async fn remote(&self, commands: Vec<Command>) -> Result<()> {
        self.send(Action::Remote { commands }).await
    }

    /// Tell the replica a local command was never accepted
    pub(crate) async fn abandon(&self, command: Command) -> Result<()> {
        self.send(Action::Abandon { command }).await
    }

    pub(crate) async fn loaded(&self) -> Result<()> {
        self.send(Action::Loaded).await
    }

    pub(crate) async fn unauthorized(&self) -> Result<()> {
        self.send(Action::Unauthorized).await
    }

    pub(crate) async fn notify(&self, event: GraphEvent) -> Result<()> {
        self.send(Action::Notify(event)).await
    }

    /// Stop the actor and take back the graph
    pub(crate) async fn shutdown(&self) -> Result<Graph> {
        let (reply, rx) = oneshot::channel();
        self.send(Action::Shutdown { reply }).await?;
        rx.await.map_err(|_| SyncError::ActorClosed)
    }

    async fn send(&self, action: Action) -> Result<()> {
        self.tx.send(action).await.map_err(|_| SyncError::ActorClosed)
    }
}

struct ReplicaActor {
    processor: CommandProcessor,
    queue: Arc<OutgoingQueue>,
    load_state: watch::Sender<LoadState>,
    rx: mpsc::Receiver<Action>,
}

impl ReplicaActor {
    async fn run(mut self) {
        debug!(client = %self.processor.graph().client_id(), "replica actor started");
        while let Some(action) = self.rx.recv().await {
            trace!(action = action.name(), "tick");
            if let Some(reply) = self.handle(action) {
                debug!("replica actor shutting down");
                let _ = reply.send(self.processor.into_graph());
                return;
            }
        }
        debug!("replica actor closed");
    }

    /// Returns the reply channel when asked to shut down
    fn handle(&mut self, action: Action) -> Option<oneshot::Sender<Graph>> {
        match action {
            Action::AddVertex { position, reply } => {
                let id = self.processor.graph_mut().allocate_vertex_id();
                let result = self.local(Mutation::InsertVertex { id, position }).map(|()| id);
                let _ = reply.send(result);
            }
            Action::Connect { start, end, reply } => {
                let id = self.processor.graph_mut().allocate_edge_id();
                let result = self.local(Mutation::InsertEdge { id, start, end }).map(|()| id);
                let _ = reply.send(result);
            }
            Action::Apply { mutation, reply } => {
                let _ = reply.send(self.local(mutation));
            }
            Action::Remote { commands } => {
                self.processor.process_batch(&commands);
            }
            Action::Abandon { command } => self.processor.abandon(&command),
            Action::Loaded => {
                if self.processor.finish_loading() {
                    debug!(
                        vertices = self.processor.graph().vertex_count(),
                        edges = self.processor.graph().edge_count(),
                        "history loaded"
                    );
                    self.load_state.send_replace(LoadState::Loaded);
                }
            }
            Action::Unauthorized => {
                if self.processor.graph().is_loading() {
                    self.load_state.send_replace(LoadState::Unauthorized);
                }
            }
            Action::Notify(event) => self.processor.observers().emit(event),
            Action::Read(read) => read(self.processor.graph()),
            Action::Shutdown { reply } => return Some(reply),
        }
        None
    }

    /// Apply locally, then queue the encoded command. Rejected mutations are
    /// not queued.
    fn local(&mut self, mutation: Mutation) -> Result<()> {
        let command = self.processor.apply_local(&mutation)?;
        self.queue.push(command);
        Ok(())
    }
}
