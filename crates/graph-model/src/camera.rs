//! The shared camera (one per graph, last writer wins)

use serde::{Deserialize, Serialize};

use crate::geometry::{Point3, Quaternion};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Camera {
    position: Point3,
    rotation: Quaternion,
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn rotation(&self) -> Quaternion {
        self.rotation
    }

    pub(crate) fn set_position(&mut self, position: Point3) {
        self.position = position;
    }

    pub(crate) fn set_rotation(&mut self, rotation: Quaternion) {
        self.rotation = rotation;
    }
}
