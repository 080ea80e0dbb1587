//! Graph session
//!
//! [`GraphSession`] is what callers hold: it owns the replica actor and the
//! two sync loops for one client attached to one remote graph.
//!
//! Mutations apply to the local replica before the call returns and are sent
//! to the authority in the background. Reads go through the actor and always
//! see every mutation issued before them.

use std::sync::Arc;

use graph_model::{
    BendRef, Camera, ClientId, Edge, FullId, Graph, Point3, PropertyList, Quaternion, Vertex,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::actor::ReplicaHandle;
use crate::authority::RemoteAuthority;
use crate::config::SyncConfig;
use crate::engine::{LoadState, OutgoingQueue, run_inbound, run_outbound};
use crate::error::{Result, SyncError};
use crate::events::{GraphEvent, GraphObservers, NetworkStatus};
use crate::mutation::Mutation;
use crate::processor::CommandProcessor;
use crate::stats::{SyncStats, SyncStatsSnapshot};

pub struct GraphSession {
    client: ClientId,
    config: SyncConfig,
    replica: ReplicaHandle,
    queue: Arc<OutgoingQueue>,
    observers: Arc<GraphObservers>,
    stats: Arc<SyncStats>,
    load_state: watch::Receiver<LoadState>,
    network_status: watch::Receiver<NetworkStatus>,
    cancel: CancellationToken,
    loops: Vec<JoinHandle<()>>,
    actor: Option<JoinHandle<()>>,
}

impl GraphSession {
    /// Attach `client` to the graph served by `authority` and start syncing.
    /// Must be called from within a tokio runtime.
    pub fn attach(
        authority: Arc<dyn RemoteAuthority>,
        client: ClientId,
        config: SyncConfig,
    ) -> Result<Self> {
        Self::attach_with_observers(authority, client, config, Arc::new(GraphObservers::new()))
    }

    /// Like [`attach`](Self::attach), with observers registered up front so
    /// that no event of the initial load is missed
    pub fn attach_with_observers(
        authority: Arc<dyn RemoteAuthority>,
        client: ClientId,
        config: SyncConfig,
        observers: Arc<GraphObservers>,
    ) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(SyncStats::new());
        let queue = Arc::new(OutgoingQueue::new());
        let mut graph = Graph::new(client);

        // write-only sessions have no history to replay
        let initial = if config.receive_commands {
            LoadState::Loading
        } else {
            graph.finish_loading();
            LoadState::Loaded
        };
        let (load_tx, load_state) = watch::channel(initial);
        let (status_tx, network_status) = watch::channel(NetworkStatus::Connected);

        let mut processor = CommandProcessor::new(graph, Arc::clone(&observers), Arc::clone(&stats));
        if !config.receive_commands {
            processor = processor.without_echo_tracking();
        }
        let (replica, actor) = ReplicaHandle::spawn(processor, Arc::clone(&queue), load_tx);

        let cancel = CancellationToken::new();
        let mut loops = vec![tokio::spawn(run_outbound(
            Arc::clone(&authority),
            Arc::clone(&queue),
            replica.clone(),
            Arc::clone(&stats),
            config.clone(),
            cancel.child_token(),
        ))];
        if config.receive_commands {
            loops.push(tokio::spawn(run_inbound(
                authority,
                client,
                replica.clone(),
                status_tx,
                config.clone(),
                cancel.child_token(),
            )));
        }

        info!(%client, receive = config.receive_commands, "attached to graph");
        Ok(Self {
            client,
            config,
            replica,
            queue,
            observers,
            stats,
            load_state,
            network_status,
            cancel,
            loops,
            actor: Some(actor),
        })
    }

    pub fn client_id(&self) -> ClientId {
        self.client
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub async fn add_vertex(&self, position: Point3) -> Result<FullId> {
        self.replica.add_vertex(position).await
    }

    /// Connect two vertices with a new edge
    pub async fn connect(&self, start: FullId, end: FullId) -> Result<FullId> {
        self.replica.connect(start, end).await
    }

    /// Remove a vertex and its edges. Removing an absent vertex is a no-op.
    pub async fn remove_vertex(&self, id: FullId) -> Result<()> {
        self.replica.apply(Mutation::RemoveVertex { id }).await
    }

    pub async fn remove_edge(&self, id: FullId) -> Result<()> {
        self.replica.apply(Mutation::RemoveEdge { id }).await
    }

    /// Split edge line `line` of `edge` with a new bend
    pub async fn insert_bend(&self, edge: FullId, line: usize, position: Point3) -> Result<BendRef> {
        self.replica
            .apply(Mutation::BreakEdgeLine { edge, line, position })
            .await?;
        Ok(BendRef { edge, index: line })
    }

    pub async fn remove_bend(&self, edge: FullId, index: usize) -> Result<()> {
        self.replica.apply(Mutation::RemoveBend { edge, index }).await
    }

    pub async fn move_vertex(&self, id: FullId, position: Point3) -> Result<()> {
        self.replica.apply(Mutation::MoveVertex { id, position }).await
    }

    pub async fn move_bend(&self, edge: FullId, index: usize, position: Point3) -> Result<()> {
        self.replica
            .apply(Mutation::MoveBend { edge, index, position })
            .await
    }

    pub async fn set_vertex_rotation(&self, id: FullId, rotation: Quaternion) -> Result<()> {
        self.replica
            .apply(Mutation::ChangeVertexRotation { id, rotation })
            .await
    }

    pub async fn set_vertex_scale(&self, id: FullId, scale: f64) -> Result<()> {
        self.replica
            .apply(Mutation::ChangeVertexScale { id, scale })
            .await
    }

    /// Set a vertex property; an empty `value` deletes the key
    pub async fn set_vertex_property(
        &self,
        id: FullId,
        list: &str,
        key: &str,
        value: &str,
        render_update: bool,
    ) -> Result<()> {
        self.replica
            .apply(Mutation::SetVertexProperty {
                id,
                list: list.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                render_update,
            })
            .await
    }

    /// Set an edge property; an empty `value` deletes the key
    pub async fn set_edge_property(
        &self,
        id: FullId,
        list: &str,
        key: &str,
        value: &str,
        render_update: bool,
    ) -> Result<()> {
        self.replica
            .apply(Mutation::SetEdgeProperty {
                id,
                list: list.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                render_update,
            })
            .await
    }

    pub async fn move_camera(&self, position: Point3) -> Result<()> {
        self.replica
            .apply(Mutation::ChangeCameraPosition { position })
            .await
    }

    pub async fn rotate_camera(&self, rotation: Quaternion) -> Result<()> {
        self.replica
            .apply(Mutation::ChangeCameraRotation { rotation })
            .await
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Run `f` against the replica
    pub async fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Graph) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.replica.read(f).await
    }

    /// Copy of the whole replica
    pub async fn snapshot(&self) -> Result<Graph> {
        self.read(Graph::clone).await
    }

    pub async fn vertices(&self) -> Result<Vec<Vertex>> {
        self.read(|graph| graph.vertices().cloned().collect()).await
    }

    pub async fn edges(&self) -> Result<Vec<Edge>> {
        self.read(|graph| graph.edges().cloned().collect()).await
    }

    pub async fn vertex(&self, id: FullId) -> Result<Option<Vertex>> {
        self.read(move |graph| graph.vertex(id).cloned()).await
    }

    pub async fn edge(&self, id: FullId) -> Result<Option<Edge>> {
        self.read(move |graph| graph.edge(id).cloned()).await
    }

    pub async fn adjacent_vertices(&self, id: FullId, directed: bool) -> Result<Vec<FullId>> {
        self.read(move |graph| graph.adjacent_vertices(id, directed)).await
    }

    pub async fn vertex_property(&self, id: FullId, list: &str, key: &str) -> Result<Option<String>> {
        let (list, key) = (list.to_string(), key.to_string());
        self.read(move |graph| {
            graph
                .vertex(id)
                .and_then(|v| v.property(&list, &key))
                .map(str::to_string)
        })
        .await
    }

    pub async fn vertex_properties(&self, id: FullId, list: &str) -> Result<Option<PropertyList>> {
        let list = list.to_string();
        self.read(move |graph| {
            graph
                .vertex(id)
                .and_then(|v| v.properties().list(&list))
                .cloned()
        })
        .await
    }

    pub async fn edge_property(&self, id: FullId, list: &str, key: &str) -> Result<Option<String>> {
        let (list, key) = (list.to_string(), key.to_string());
        self.read(move |graph| {
            graph
                .edge(id)
                .and_then(|e| e.property(&list, &key))
                .map(str::to_string)
        })
        .await
    }

    pub async fn edge_properties(&self, id: FullId, list: &str) -> Result<Option<PropertyList>> {
        let list = list.to_string();
        self.read(move |graph| {
            graph
                .edge(id)
                .and_then(|e| e.properties().list(&list))
                .cloned()
        })
        .await
    }

    pub async fn camera(&self) -> Result<Camera> {
        self.read(|graph| *graph.camera()).await
    }

    // ------------------------------------------------------------------
    // Sync state
    // ------------------------------------------------------------------

    /// Whether the replica is not yet ready: history is still being
    /// replayed, or the authority refused it before replay finished
    pub fn is_loading(&self) -> bool {
        *self.load_state.borrow() != LoadState::Loaded
    }

    /// Resolve once history replay has finished
    pub async fn wait_until_loaded(&self) -> Result<()> {
        let mut load_state = self.load_state.clone();
        let state = *load_state
            .wait_for(|state| *state != LoadState::Loading)
            .await
            .map_err(|_| SyncError::ActorClosed)?;
        if state == LoadState::Unauthorized {
            Err(SyncError::Unauthorized)
        } else {
            Ok(())
        }
    }

    /// Whether every local mutation has been handed to the authority
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    pub fn network_status(&self) -> NetworkStatus {
        *self.network_status.borrow()
    }

    pub fn observers(&self) -> &Arc<GraphObservers> {
        &self.observers
    }

    /// Receive every graph event on a channel
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.observers.subscribe()
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.stats.snapshot()
    }

    /// Tear the session down and return the final replica.
    ///
    /// With `wait_for_drain`, first waits until every queued command has been
    /// handed to the authority.
    pub async fn finish(mut self, wait_for_drain: bool) -> Result<Graph> {
        if wait_for_drain {
            while !self.queue.is_empty() {
                tokio::time::sleep(self.config.drain_poll_interval()).await;
            }
        }

        self.cancel.cancel();
        for task in self.loops.drain(..) {
            if let Err(err) = task.await {
                warn!(%err, "sync loop ended abnormally");
            }
        }

        let graph = self.replica.shutdown().await?;
        if let Some(actor) = self.actor.take() {
            if let Err(err) = actor.await {
                warn!(%err, "replica actor ended abnormally");
            }
        }

        let stats = self.stats.snapshot();
        info!(
            client = %self.client,
            applied = stats.applied,
            submitted = stats.submitted,
            failed = stats.failed,
            "session finished"
        );
        Ok(graph)
    }
}

impl Drop for GraphSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for GraphSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSession")
            .field("client", &self.client)
            .field("load_state", &*self.load_state.borrow())
            .field("pending", &self.queue.len())
            .finish()
    }
}
