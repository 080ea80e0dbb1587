//! Graph replica - demo entry point
//!
//! Runs two clients against an in-process authority, lets them edit the same
//! graph concurrently, then attaches a late joiner and checks that all three
//! replicas agree.
//!
//! Usage: `graph-replica [CONFIG.toml]`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use graph_model::{Graph, Point3, Quaternion};
use graph_sync::{EventCategory, GraphSession, MemoryAuthority, RemoteAuthority, SyncConfig};
use telemetry::TelemetryConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => SyncConfig::load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SyncConfig::load_or_default()?,
    };
    telemetry::init_logging(&TelemetryConfig::with_level(config.log_level))?;
    info!(?config, "starting graph replica demo");

    let memory = Arc::new(MemoryAuthority::new());
    let authority: Arc<dyn RemoteAuthority> = memory.clone();

    let alice = GraphSession::attach(authority.clone(), memory.register_client(), config.clone())?;
    let bob = GraphSession::attach(authority.clone(), memory.register_client(), config.clone())?;
    bob.observers().on(EventCategory::EdgeAdded, |event| {
        info!(?event, "bob saw a new edge");
    });
    alice.wait_until_loaded().await?;
    bob.wait_until_loaded().await?;

    let hub = alice.add_vertex(Point3::new(0.0, 0.0, 0.0)).await?;
    alice.set_vertex_property(hub, "labels", "name", "hub", true).await?;
    // bob builds on alice's vertex once it has arrived
    wait_for(&bob, move |graph| graph.vertex(hub).is_some()).await?;
    let spoke = bob.add_vertex(Point3::new(2.0, 0.0, 0.0)).await?;
    bob.set_vertex_scale(spoke, 0.5).await?;
    let edge = bob.connect(spoke, hub).await?;
    bob.insert_bend(edge, 0, Point3::new(1.0, 1.0, 0.0)).await?;
    alice.rotate_camera(Quaternion::new(0.0, 0.0, 0.0, 1.0)).await?;
    alice.move_camera(Point3::new(0.0, 0.0, 10.0)).await?;

    wait_for(&alice, move |graph| graph.edge(edge).is_some_and(|e| !e.bends().is_empty())).await?;
    alice.move_bend(edge, 0, Point3::new(1.0, 2.0, 0.0)).await?;

    let carol = GraphSession::attach(authority, memory.register_client(), config)?;
    carol.wait_until_loaded().await?;

    let alice_graph = alice.finish(true).await?;
    let bob_graph = bob.finish(true).await?;
    wait_for(&carol, |graph| graph.edges().any(|e| e.bend(0).is_some_and(|b| b.position().y == 2.0)))
        .await?;
    let carol_graph = carol.finish(false).await?;

    if !alice_graph.content_eq(&carol_graph) {
        bail!("late joiner diverged from alice");
    }
    info!(
        commands = memory.len(),
        vertices = carol_graph.vertex_count(),
        edges = carol_graph.edge_count(),
        bob_vertices = bob_graph.vertex_count(),
        "replicas converged"
    );
    Ok(())
}

/// Poll `session` until `predicate` holds, giving up after five seconds
async fn wait_for<F>(session: &GraphSession, predicate: F) -> Result<()>
where
    F: Fn(&Graph) -> bool + Send + Sync + Clone + 'static,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let check = predicate.clone();
            if session.read(move |graph| check(graph)).await? {
                return Ok::<_, anyhow::Error>(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .context("timed out waiting for replica")?
}
