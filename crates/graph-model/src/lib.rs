//! # Graph Model
//!
//! The data side of a collaboratively edited 3D graph:
//! - `FullId`: globally unique `(client, seq)` identities
//! - `FullIdIndex`: insertion-ordered lookup keyed by `FullId`
//! - `Graph`: vertices, edges with bends, properties and the shared camera
//!
//! Nothing here is async or networked; replication lives in `graph-sync`.

pub mod camera;
pub mod edge;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod id;
pub mod index;
pub mod properties;
pub mod vertex;

pub use camera::Camera;
pub use edge::{Bend, BendRef, Edge, EdgeLine};
pub use error::GraphError;
pub use geometry::{Point3, Quaternion};
pub use graph::{Graph, RemovedVertex};
pub use id::{ClientId, FullId, HasFullId, IdAllocator, ParseFullIdError};
pub use index::FullIdIndex;
pub use properties::{Properties, PropertyList};
pub use vertex::{DEFAULT_VERTEX_ROTATION, Vertex};
