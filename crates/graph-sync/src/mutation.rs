//! Typed graph mutations
//!
//! [`Mutation`] is the decoded form of a [`Command`]. Local calls build one
//! directly; remote commands are decoded into one before being applied.

use graph_model::{FullId, Point3, Quaternion};

use crate::command::{Command, CommandKind};
use crate::error::CommandError;

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    InsertVertex { id: FullId, position: Point3 },
    InsertEdge { id: FullId, start: FullId, end: FullId },
    BreakEdgeLine { edge: FullId, line: usize, position: Point3 },
    RemoveVertex { id: FullId },
    RemoveEdge { id: FullId },
    RemoveBend { edge: FullId, index: usize },
    MoveVertex { id: FullId, position: Point3 },
    ChangeVertexScale { id: FullId, scale: f64 },
    ChangeVertexRotation { id: FullId, rotation: Quaternion },
    MoveBend { edge: FullId, index: usize, position: Point3 },
    ChangeCameraPosition { position: Point3 },
    ChangeCameraRotation { rotation: Quaternion },
    SetVertexProperty {
        id: FullId,
        list: String,
        key: String,
        value: String,
        render_update: bool,
    },
    SetEdgeProperty {
        id: FullId,
        list: String,
        key: String,
        value: String,
        render_update: bool,
    },
}

impl Mutation {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::InsertVertex { .. } => CommandKind::InsertVertex,
            Self::InsertEdge { .. } => CommandKind::InsertEdge,
            Self::BreakEdgeLine { .. } => CommandKind::BreakEdgeLine,
            Self::RemoveVertex { .. } => CommandKind::RemoveVertex,
            Self::RemoveEdge { .. } => CommandKind::RemoveEdge,
            Self::RemoveBend { .. } => CommandKind::RemoveBend,
            Self::MoveVertex { .. } => CommandKind::MoveVertex,
            Self::ChangeVertexScale { .. } => CommandKind::ChangeVertexScale,
            Self::ChangeVertexRotation { .. } => CommandKind::ChangeVertexRotation,
            Self::MoveBend { .. } => CommandKind::MoveBend,
            Self::ChangeCameraPosition { .. } => CommandKind::ChangeCameraPosition,
            Self::ChangeCameraRotation { .. } => CommandKind::ChangeCameraRotation,
            Self::SetVertexProperty { .. } => CommandKind::SetVertexProperty,
            Self::SetEdgeProperty { .. } => CommandKind::SetEdgeProperty,
        }
    }

    /// Decode a wire command. Inserted entities take their client from the
    /// command's origin and their sequence from the parameters.
    pub fn decode(command: &Command) -> Result<Self, CommandError> {
        let kind = command.kind()?;
        let origin_id = |index| -> Result<FullId, CommandError> {
            Ok(FullId::new(command.origin, command.parse_param(kind, index)?))
        };

        let mutation = match kind {
            CommandKind::InsertVertex => Self::InsertVertex {
                id: origin_id(0)?,
                position: command.point(kind, 1)?,
            },
            CommandKind::InsertEdge => Self::InsertEdge {
                start: command.full_id(kind, 0)?,
                end: command.full_id(kind, 1)?,
                id: origin_id(2)?,
            },
            CommandKind::BreakEdgeLine => Self::BreakEdgeLine {
                edge: command.full_id(kind, 0)?,
                line: command.parse_param(kind, 1)?,
                position: command.point(kind, 2)?,
            },
            CommandKind::RemoveVertex => Self::RemoveVertex {
                id: command.full_id(kind, 0)?,
            },
            CommandKind::RemoveEdge => Self::RemoveEdge {
                id: command.full_id(kind, 0)?,
            },
            CommandKind::RemoveBend => Self::RemoveBend {
                edge: command.full_id(kind, 0)?,
                index: command.parse_param(kind, 1)?,
            },
            CommandKind::MoveVertex => Self::MoveVertex {
                id: command.full_id(kind, 0)?,
                position: command.point(kind, 1)?,
            },
            CommandKind::ChangeVertexScale => Self::ChangeVertexScale {
                id: command.full_id(kind, 0)?,
                scale: command.parse_param(kind, 1)?,
            },
            CommandKind::ChangeVertexRotation => Self::ChangeVertexRotation {
                id: command.full_id(kind, 0)?,
                rotation: command.quaternion(kind, 1)?,
            },
            CommandKind::MoveBend => Self::MoveBend {
                edge: command.full_id(kind, 0)?,
                index: command.parse_param(kind, 1)?,
                position: command.point(kind, 2)?,
            },
            CommandKind::ChangeCameraPosition => Self::ChangeCameraPosition {
                position: command.point(kind, 0)?,
            },
            CommandKind::ChangeCameraRotation => Self::ChangeCameraRotation {
                rotation: command.quaternion(kind, 0)?,
            },
            CommandKind::SetVertexProperty => Self::SetVertexProperty {
                id: command.full_id(kind, 0)?,
                list: command.param(1).to_string(),
                key: command.param(2).to_string(),
                value: command.param(3).to_string(),
                render_update: command.flag(4),
            },
            CommandKind::SetEdgeProperty => Self::SetEdgeProperty {
                id: command.full_id(kind, 0)?,
                list: command.param(1).to_string(),
                key: command.param(2).to_string(),
                value: command.param(3).to_string(),
                render_update: command.flag(4),
            },
        };
        Ok(mutation)
    }

    /// Whether applying this mutation again only rewrites the same field.
    ///
    /// Echoes of these are re-applied in the authority's order. Echoes of
    /// anything else were already applied when issued and are skipped.
    pub fn is_field_write(&self) -> bool {
        matches!(
            self,
            Self::MoveVertex { .. }
                | Self::ChangeVertexScale { .. }
                | Self::ChangeVertexRotation { .. }
                | Self::MoveBend { .. }
                | Self::ChangeCameraPosition { .. }
                | Self::ChangeCameraRotation { .. }
                | Self::SetVertexProperty { .. }
                | Self::SetEdgeProperty { .. }
        )
    }
}
