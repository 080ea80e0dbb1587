//! Wire commands
//!
//! A command is a name plus exactly five string parameters. Parameters are
//! untyped on the wire; [`Command`] offers typed accessors that the decoder
//! uses per command kind.

use std::fmt;
use std::str::FromStr;

use graph_model::{ClientId, FullId, Point3, Quaternion};
use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// Number of parameter slots carried by every command
pub const PARAMETER_COUNT: usize = 5;

/// The recognised command kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    InsertVertex,
    InsertEdge,
    BreakEdgeLine,
    RemoveVertex,
    RemoveEdge,
    RemoveBend,
    MoveVertex,
    ChangeVertexScale,
    ChangeVertexRotation,
    MoveBend,
    ChangeCameraPosition,
    ChangeCameraRotation,
    SetVertexProperty,
    SetEdgeProperty,
}

impl CommandKind {
    pub const ALL: [CommandKind; 14] = [
        Self::InsertVertex,
        Self::InsertEdge,
        Self::BreakEdgeLine,
        Self::RemoveVertex,
        Self::RemoveEdge,
        Self::RemoveBend,
        Self::MoveVertex,
        Self::ChangeVertexScale,
        Self::ChangeVertexRotation,
        Self::MoveBend,
        Self::ChangeCameraPosition,
        Self::ChangeCameraRotation,
        Self::SetVertexProperty,
        Self::SetEdgeProperty,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsertVertex => "InsertVertex",
            Self::InsertEdge => "InsertEdge",
            Self::BreakEdgeLine => "BreakEdgeLine",
            Self::RemoveVertex => "RemoveVertex",
            Self::RemoveEdge => "RemoveEdge",
            Self::RemoveBend => "RemoveBend",
            Self::MoveVertex => "MoveVertex",
            Self::ChangeVertexScale => "ChangeVertexScale",
            Self::ChangeVertexRotation => "ChangeVertexRotation",
            Self::MoveBend => "MoveBend",
            Self::ChangeCameraPosition => "ChangeCameraPosition",
            Self::ChangeCameraRotation => "ChangeCameraRotation",
            Self::SetVertexProperty => "SetVertexProperty",
            Self::SetEdgeProperty => "SetEdgeProperty",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CommandError::UnknownCommand(s.to_string()))
    }
}

/// A mutation record as exchanged with the remote authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub parameters: [String; PARAMETER_COUNT],
    /// Client that issued the command
    pub origin: ClientId,
    /// Position in the authority's total order; 0 until assigned
    pub sequence: u64,
}

impl Command {
    /// Build an unsequenced command. Missing parameters are padded with
    /// empty strings and extra ones are dropped.
    pub fn new<I, S>(name: impl Into<String>, origin: ClientId, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut slots: [String; PARAMETER_COUNT] = Default::default();
        for (slot, value) in slots.iter_mut().zip(parameters) {
            *slot = value.into();
        }
        Self {
            name: name.into(),
            parameters: slots,
            origin,
            sequence: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn kind(&self) -> Result<CommandKind, CommandError> {
        self.name.parse()
    }

    /// Raw parameter text; out-of-range slots read as empty
    pub fn param(&self, index: usize) -> &str {
        self.parameters.get(index).map(String::as_str).unwrap_or("")
    }

    pub(crate) fn parse_param<T: FromStr>(
        &self,
        kind: CommandKind,
        index: usize,
    ) -> Result<T, CommandError> {
        let raw = self.param(index);
        if raw.is_empty() {
            return Err(CommandError::MissingParameter {
                command: kind.as_str(),
                index,
            });
        }
        raw.parse().map_err(|_| CommandError::MalformedParameter {
            command: kind.as_str(),
            index,
            value: raw.to_string(),
        })
    }

    pub(crate) fn full_id(&self, kind: CommandKind, index: usize) -> Result<FullId, CommandError> {
        self.parse_param(kind, index)
    }

    /// Three consecutive parameters starting at `index`
    pub(crate) fn point(&self, kind: CommandKind, index: usize) -> Result<Point3, CommandError> {
        Ok(Point3::new(
            self.parse_param(kind, index)?,
            self.parse_param(kind, index + 1)?,
            self.parse_param(kind, index + 2)?,
        ))
    }

    /// Four consecutive parameters starting at `index`
    pub(crate) fn quaternion(
        &self,
        kind: CommandKind,
        index: usize,
    ) -> Result<Quaternion, CommandError> {
        Ok(Quaternion::new(
            self.parse_param(kind, index)?,
            self.parse_param(kind, index + 1)?,
            self.parse_param(kind, index + 2)?,
            self.parse_param(kind, index + 3)?,
        ))
    }

    /// `"1"` is true, anything else (including empty) is false
    pub(crate) fn flag(&self, index: usize) -> bool {
        self.param(index) == "1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        for kind in CommandKind::ALL {
            assert_eq!(kind.as_str().parse::<CommandKind>().unwrap(), kind);
        }
        assert_eq!(
            "ExplodeVertex".parse::<CommandKind>(),
            Err(CommandError::UnknownCommand("ExplodeVertex".into()))
        );
    }

    #[test]
    fn test_parameters_are_padded() {
        let command = Command::new("RemoveVertex", ClientId(3), ["3-7"]);
        assert_eq!(command.parameters, ["3-7", "", "", "", ""]);
        assert_eq!(command.sequence, 0);

        let command = Command::new("X", ClientId(3), ["a", "b", "c", "d", "e", "f"]);
        assert_eq!(command.parameters, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_typed_parameters() {
        let kind = CommandKind::MoveVertex;
        let command = Command::new(kind.as_str(), ClientId(1), ["1-4", "0.5", "-2", "1e3"]);
        assert_eq!(command.full_id(kind, 0).unwrap(), FullId::new(ClientId(1), 4));
        assert_eq!(command.point(kind, 1).unwrap(), Point3::new(0.5, -2.0, 1000.0));
        assert_eq!(
            command.quaternion(kind, 1),
            Err(CommandError::MissingParameter { command: "MoveVertex", index: 4 })
        );
        assert!(matches!(
            command.parse_param::<u64>(kind, 1),
            Err(CommandError::MalformedParameter { index: 1, .. })
        ));
        assert!(!command.flag(4));
    }
}
