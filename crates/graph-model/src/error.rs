//! Graph errors

use crate::id::FullId;

/// Errors raised by structural graph operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("vertex not found: {0}")]
    VertexNotFound(FullId),
    #[error("edge not found: {0}")]
    EdgeNotFound(FullId),
    #[error("vertex already exists: {0}")]
    DuplicateVertex(FullId),
    #[error("edge already exists: {0}")]
    DuplicateEdge(FullId),
    #[error("vertices {start} and {end} are already connected")]
    AlreadyConnected { start: FullId, end: FullId },
    #[error("edge {edge} has {lines} edge lines, no line at index {index}")]
    EdgeLineOutOfRange { edge: FullId, index: usize, lines: usize },
    #[error("edge {edge} has {bends} bends, no bend at index {index}")]
    BendOutOfRange { edge: FullId, index: usize, bends: usize },
}
