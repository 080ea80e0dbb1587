//! Vertices

use serde::{Deserialize, Serialize};

use crate::geometry::{Point3, Quaternion};
use crate::id::{FullId, HasFullId};
use crate::properties::Properties;

/// Rotation given to freshly inserted vertices
pub const DEFAULT_VERTEX_ROTATION: Quaternion = Quaternion::new(0.0, 0.0, 1.0, 1.0);

/// A vertex of the replicated graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    id: FullId,
    position: Point3,
    rotation: Quaternion,
    scale: f64,
    /// Dense ordinal in the global vertex ordering
    index: usize,
    /// Incident edges, in connection order
    edges: Vec<FullId>,
    properties: Properties,
}

impl Vertex {
    pub(crate) fn new(id: FullId, position: Point3, index: usize) -> Self {
        Self {
            id,
            position,
            rotation: DEFAULT_VERTEX_ROTATION,
            scale: 1.0,
            index,
            edges: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn id(&self) -> FullId {
        self.id
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn rotation(&self) -> Quaternion {
        self.rotation
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Ids of incident edges
    pub fn edges(&self) -> &[FullId] {
        &self.edges
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, list: &str, key: &str) -> Option<&str> {
        self.properties.get(list, key)
    }

    pub(crate) fn set_position(&mut self, position: Point3) {
        self.position = position;
    }

    pub(crate) fn set_rotation(&mut self, rotation: Quaternion) {
        self.rotation = rotation;
    }

    pub(crate) fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub(crate) fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    pub(crate) fn attach_edge(&mut self, edge: FullId) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub(crate) fn detach_edge(&mut self, edge: FullId) {
        self.edges.retain(|e| *e != edge);
    }
}

impl HasFullId for Vertex {
    fn full_id(&self) -> FullId {
        self.id
    }
}
