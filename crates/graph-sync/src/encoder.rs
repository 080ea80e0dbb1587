//! Command encoder
//!
//! One function per command kind, each producing an unsequenced [`Command`]
//! stamped with the local client as origin.

use graph_model::{ClientId, FullId, Point3, Quaternion};

use crate::command::{Command, CommandKind};
use crate::mutation::Mutation;

fn point(p: Point3) -> [String; 3] {
    [p.x.to_string(), p.y.to_string(), p.z.to_string()]
}

fn quaternion(q: Quaternion) -> [String; 4] {
    [q.x.to_string(), q.y.to_string(), q.z.to_string(), q.w.to_string()]
}

fn flag(value: bool) -> String {
    String::from(if value { "1" } else { "0" })
}

#[derive(Debug, Clone, Copy)]
pub struct CommandEncoder {
    origin: ClientId,
}

impl CommandEncoder {
    pub fn new(origin: ClientId) -> Self {
        Self { origin }
    }

    fn command<I, S>(&self, kind: CommandKind, parameters: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::new(kind.as_str(), self.origin, parameters)
    }

    pub fn encode(&self, mutation: &Mutation) -> Command {
        match mutation {
            Mutation::InsertVertex { id, position } => self.insert_vertex(*id, *position),
            Mutation::InsertEdge { id, start, end } => self.insert_edge(*id, *start, *end),
            Mutation::BreakEdgeLine { edge, line, position } => {
                self.break_edge_line(*edge, *line, *position)
            }
            Mutation::RemoveVertex { id } => self.remove_vertex(*id),
            Mutation::RemoveEdge { id } => self.remove_edge(*id),
            Mutation::RemoveBend { edge, index } => self.remove_bend(*edge, *index),
            Mutation::MoveVertex { id, position } => self.move_vertex(*id, *position),
            Mutation::ChangeVertexScale { id, scale } => self.change_vertex_scale(*id, *scale),
            Mutation::ChangeVertexRotation { id, rotation } => {
                self.change_vertex_rotation(*id, *rotation)
            }
            Mutation::MoveBend { edge, index, position } => {
                self.move_bend(*edge, *index, *position)
            }
            Mutation::ChangeCameraPosition { position } => self.change_camera_position(*position),
            Mutation::ChangeCameraRotation { rotation } => self.change_camera_rotation(*rotation),
            Mutation::SetVertexProperty { id, list, key, value, render_update } => {
                self.set_vertex_property(*id, list, key, value, *render_update)
            }
            Mutation::SetEdgeProperty { id, list, key, value, render_update } => {
                self.set_edge_property(*id, list, key, value, *render_update)
            }
        }
    }

    /// Only the sequence is sent; receivers rebuild the id from the origin.
    pub fn insert_vertex(&self, id: FullId, position: Point3) -> Command {
        let [x, y, z] = point(position);
        self.command(CommandKind::InsertVertex, [id.seq.to_string(), x, y, z])
    }

    pub fn insert_edge(&self, id: FullId, start: FullId, end: FullId) -> Command {
        self.command(
            CommandKind::InsertEdge,
            [start.to_string(), end.to_string(), id.seq.to_string()],
        )
    }

    pub fn break_edge_line(&self, edge: FullId, line: usize, position: Point3) -> Command {
        let [x, y, z] = point(position);
        self.command(
            CommandKind::BreakEdgeLine,
            [edge.to_string(), line.to_string(), x, y, z],
        )
    }

    pub fn remove_vertex(&self, id: FullId) -> Command {
        self.command(CommandKind::RemoveVertex, [id.to_string()])
    }

    pub fn remove_edge(&self, id: FullId) -> Command {
        self.command(CommandKind::RemoveEdge, [id.to_string()])
    }

    pub fn remove_bend(&self, edge: FullId, index: usize) -> Command {
        self.command(CommandKind::RemoveBend, [edge.to_string(), index.to_string()])
    }

    pub fn move_vertex(&self, id: FullId, position: Point3) -> Command {
        let [x, y, z] = point(position);
        self.command(CommandKind::MoveVertex, [id.to_string(), x, y, z])
    }

    pub fn change_vertex_scale(&self, id: FullId, scale: f64) -> Command {
        self.command(CommandKind::ChangeVertexScale, [id.to_string(), scale.to_string()])
    }

    pub fn change_vertex_rotation(&self, id: FullId, rotation: Quaternion) -> Command {
        let [x, y, z, w] = quaternion(rotation);
        self.command(CommandKind::ChangeVertexRotation, [id.to_string(), x, y, z, w])
    }

    pub fn move_bend(&self, edge: FullId, index: usize, position: Point3) -> Command {
        let [x, y, z] = point(position);
        self.command(
            CommandKind::MoveBend,
            [edge.to_string(), index.to_string(), x, y, z],
        )
    }

    pub fn change_camera_position(&self, position: Point3) -> Command {
        self.command(CommandKind::ChangeCameraPosition, point(position))
    }

    pub fn change_camera_rotation(&self, rotation: Quaternion) -> Command {
        self.command(CommandKind::ChangeCameraRotation, quaternion(rotation))
    }

    pub fn set_vertex_property(
        &self,
        id: FullId,
        list: &str,
        key: &str,
        value: &str,
        render_update: bool,
    ) -> Command {
        self.command(
            CommandKind::SetVertexProperty,
            [id.to_string(), list.into(), key.into(), value.into(), flag(render_update)],
        )
    }

    pub fn set_edge_property(
        &self,
        id: FullId,
        list: &str,
        key: &str,
        value: &str,
        render_update: bool,
    ) -> Command {
        self.command(
            CommandKind::SetEdgeProperty,
            [id.to_string(), list.into(), key.into(), value.into(), flag(render_update)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: CommandKind, client: ClientId) -> Mutation {
        let id = FullId::new(client, 7);
        let other = FullId::new(ClientId(99), 3);
        let position = Point3::new(0.25, -1.5, 3.0);
        let rotation = Quaternion::new(0.0, 0.5, 0.5, 1.0);
        match kind {
            CommandKind::InsertVertex => Mutation::InsertVertex { id, position },
            CommandKind::InsertEdge => Mutation::InsertEdge { id, start: other, end: id },
            CommandKind::BreakEdgeLine => Mutation::BreakEdgeLine { edge: id, line: 2, position },
            CommandKind::RemoveVertex => Mutation::RemoveVertex { id: other },
            CommandKind::RemoveEdge => Mutation::RemoveEdge { id },
            CommandKind::RemoveBend => Mutation::RemoveBend { edge: other, index: 1 },
            CommandKind::MoveVertex => Mutation::MoveVertex { id, position },
            CommandKind::ChangeVertexScale => Mutation::ChangeVertexScale { id, scale: 2.5 },
            CommandKind::ChangeVertexRotation => Mutation::ChangeVertexRotation { id, rotation },
            CommandKind::MoveBend => Mutation::MoveBend { edge: id, index: 0, position },
            CommandKind::ChangeCameraPosition => Mutation::ChangeCameraPosition { position },
            CommandKind::ChangeCameraRotation => Mutation::ChangeCameraRotation { rotation },
            CommandKind::SetVertexProperty => Mutation::SetVertexProperty {
                id,
                list: "labels".into(),
                key: "name".into(),
                value: "hub".into(),
                render_update: true,
            },
            CommandKind::SetEdgeProperty => Mutation::SetEdgeProperty {
                id,
                list: "style".into(),
                key: "weight".into(),
                value: String::new(),
                render_update: false,
            },
        }
    }

    #[test]
    fn test_every_kind_is_understood_by_the_decoder() {
        let client = ClientId(5);
        let encoder = CommandEncoder::new(client);
        for kind in CommandKind::ALL {
            let mutation = sample(kind, client);
            let command = encoder.encode(&mutation);
            assert_eq!(command.name, kind.as_str());
            assert_eq!(command.origin, client);
            assert_eq!(Mutation::decode(&command).unwrap(), mutation, "{kind}");
        }
    }

    #[test]
    fn test_wire_layout() {
        let encoder = CommandEncoder::new(ClientId(1));
        let command = encoder.insert_vertex(FullId::new(ClientId(1), 12), Point3::new(0.5, 0.0, 2.0));
        assert_eq!(command.parameters, ["12", "0.5", "0", "2", ""]);

        let command = encoder.set_vertex_property(FullId::new(ClientId(1), 2), "l", "k", "v", false);
        assert_eq!(command.parameters, ["1-2", "l", "k", "v", "0"]);
    }
}
