//! The replicated graph
//!
//! `Graph` is plain data: it enforces structural invariants but knows nothing
//! about commands, networking or observers. Callers that need change
//! notifications or replication wrap it (see the `graph-sync` crate).

use crate::camera::Camera;
use crate::edge::{Bend, BendRef, Edge};
use crate::error::GraphError;
use crate::geometry::{Point3, Quaternion};
use crate::id::{ClientId, FullId, IdAllocator};
use crate::index::FullIdIndex;
use crate::vertex::Vertex;

/// A vertex removed from the graph together with the edges removed with it
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedVertex {
    pub vertex: Vertex,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone)]
pub struct Graph {
    client: ClientId,
    vertices: FullIdIndex<Vertex>,
    edges: FullIdIndex<Edge>,
    camera: Camera,
    vertex_ids: IdAllocator,
    edge_ids: IdAllocator,
    loading: bool,
}

impl Graph {
    /// Create an empty graph for `client`. The graph starts out loading.
    pub fn new(client: ClientId) -> Self {
        Self {
            client,
            vertices: FullIdIndex::new(),
            edges: FullIdIndex::new(),
            camera: Camera::new(),
            vertex_ids: IdAllocator::new(client),
            edge_ids: IdAllocator::new(client),
            loading: true,
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Leave the loading phase. Returns `true` only on the transition.
    pub fn finish_loading(&mut self) -> bool {
        std::mem::replace(&mut self.loading, false)
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn allocate_vertex_id(&mut self) -> FullId {
        self.vertex_ids.next()
    }

    pub fn allocate_edge_id(&mut self) -> FullId {
        self.edge_ids.next()
    }

    pub fn last_vertex_seq(&self) -> u64 {
        self.vertex_ids.last()
    }

    pub fn last_edge_seq(&self) -> u64 {
        self.edge_ids.last()
    }

    /// Record that this client already created vertex `seq`
    pub fn observe_vertex_seq(&mut self, seq: u64) {
        self.vertex_ids.observe(seq);
    }

    /// Record that this client already created edge `seq`
    pub fn observe_edge_seq(&mut self, seq: u64) {
        self.edge_ids.observe(seq);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn vertex(&self, id: FullId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn edge(&self, id: FullId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Vertices in insertion order (which is also `index` order)
    pub fn vertices(&self) -> impl ExactSizeIterator<Item = &Vertex> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> impl ExactSizeIterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Whether an edge joins `a` and `b` in either direction
    pub fn is_connected(&self, a: FullId, b: FullId) -> bool {
        self.vertices.get(a).is_some_and(|vertex| {
            vertex.edges().iter().filter_map(|e| self.edges.get(*e)).any(|edge| {
                (edge.start() == a && edge.end() == b) || (edge.start() == b && edge.end() == a)
            })
        })
    }

    /// Neighbours of `id`. When `directed`, only edges starting at `id` count.
    pub fn adjacent_vertices(&self, id: FullId, directed: bool) -> Vec<FullId> {
        let Some(vertex) = self.vertices.get(id) else {
            return Vec::new();
        };
        vertex
            .edges()
            .iter()
            .filter_map(|e| self.edges.get(*e))
            .filter_map(|edge| {
                if edge.start() == id {
                    Some(edge.end())
                } else if !directed {
                    edge.other_end(id)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Compare replicated content (vertices, edges and camera), ignoring the
    /// local client id, counters and loading state.
    pub fn content_eq(&self, other: &Graph) -> bool {
        self.camera == other.camera
            && self.vertices().eq(other.vertices())
            && self.edges().eq(other.edges())
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    pub fn insert_vertex(&mut self, id: FullId, position: Point3) -> Result<&Vertex, GraphError> {
        let vertex = Vertex::new(id, position, self.vertices.len());
        self.vertices
            .insert(vertex)
            .map_err(|_| GraphError::DuplicateVertex(id))?;
        self.vertices.get(id).ok_or(GraphError::VertexNotFound(id))
    }

    /// Connect `start` to `end` with a new edge `id`.
    /// Endpoints that are already joined (either direction) are rejected.
    pub fn connect(&mut self, start: FullId, end: FullId, id: FullId) -> Result<&Edge, GraphError> {
        if !self.vertices.contains(start) {
            return Err(GraphError::VertexNotFound(start));
        }
        if !self.vertices.contains(end) {
            return Err(GraphError::VertexNotFound(end));
        }
        if self.edges.contains(id) {
            return Err(GraphError::DuplicateEdge(id));
        }
        if self.is_connected(start, end) {
            return Err(GraphError::AlreadyConnected { start, end });
        }

        self.edges
            .insert(Edge::new(id, start, end))
            .map_err(|_| GraphError::DuplicateEdge(id))?;
        for endpoint in [start, end] {
            if let Some(vertex) = self.vertices.get_mut(endpoint) {
                vertex.attach_edge(id);
            }
        }
        self.edges.get(id).ok_or(GraphError::EdgeNotFound(id))
    }

    /// Remove a vertex and every incident edge. Absent ids are a no-op.
    ///
    /// Vertices after the removed one move down one place so that `index`
    /// stays a dense `0..n` sequence.
    pub fn remove_vertex(&mut self, id: FullId) -> Option<RemovedVertex> {
        let vertex = self.vertices.remove(id)?;
        let removed_index = vertex.index();
        for other in self.vertices.values_mut() {
            if other.index() > removed_index {
                other.set_index(other.index() - 1);
            }
        }

        let edges = vertex
            .edges()
            .iter()
            .filter_map(|edge| self.remove_edge(*edge))
            .collect();
        Some(RemovedVertex { vertex, edges })
    }

    /// Remove an edge and detach it from both endpoints. Absent ids are a no-op.
    pub fn remove_edge(&mut self, id: FullId) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        for endpoint in [edge.start(), edge.end()] {
            if let Some(vertex) = self.vertices.get_mut(endpoint) {
                vertex.detach_edge(id);
            }
        }
        Some(edge)
    }

    /// Split edge line `line` of `edge` with a new bend at `position`
    pub fn break_edge_line(
        &mut self,
        edge: FullId,
        line: usize,
        position: Point3,
    ) -> Result<BendRef, GraphError> {
        let index = self.edge_mut(edge)?.break_line(line, position)?;
        Ok(BendRef { edge, index })
    }

    /// Remove the bend at `index`, merging the two edge lines around it
    pub fn remove_bend(&mut self, edge: FullId, index: usize) -> Result<Bend, GraphError> {
        self.edge_mut(edge)?.remove_bend(index)
    }

    pub fn move_bend(&mut self, edge: FullId, index: usize, position: Point3) -> Result<(), GraphError> {
        self.edge_mut(edge)?.move_bend(index, position)
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    pub fn move_vertex(&mut self, id: FullId, position: Point3) -> Result<(), GraphError> {
        self.vertex_mut(id)?.set_position(position);
        Ok(())
    }

    pub fn rotate_vertex(&mut self, id: FullId, rotation: Quaternion) -> Result<(), GraphError> {
        self.vertex_mut(id)?.set_rotation(rotation);
        Ok(())
    }

    pub fn scale_vertex(&mut self, id: FullId, scale: f64) -> Result<(), GraphError> {
        self.vertex_mut(id)?.set_scale(scale);
        Ok(())
    }

    /// Upsert a vertex property; an empty value deletes the key
    pub fn set_vertex_property(
        &mut self,
        id: FullId,
        list: &str,
        key: &str,
        value: &str,
    ) -> Result<(), GraphError> {
        self.vertex_mut(id)?.properties_mut().set(list, key, value);
        Ok(())
    }

    /// Upsert an edge property; an empty value deletes the key
    pub fn set_edge_property(
        &mut self,
        id: FullId,
        list: &str,
        key: &str,
        value: &str,
    ) -> Result<(), GraphError> {
        self.edge_mut(id)?.properties_mut().set(list, key, value);
        Ok(())
    }

    pub fn move_camera(&mut self, position: Point3) {
        self.camera.set_position(position);
    }

    pub fn rotate_camera(&mut self, rotation: Quaternion) {
        self.camera.set_rotation(rotation);
    }

    fn vertex_mut(&mut self, id: FullId) -> Result<&mut Vertex, GraphError> {
        self.vertices.get_mut(id).ok_or(GraphError::VertexNotFound(id))
    }

    fn edge_mut(&mut self, id: FullId) -> Result<&mut Edge, GraphError> {
        self.edges.get_mut(id).ok_or(GraphError::EdgeNotFound(id))
    }
}
