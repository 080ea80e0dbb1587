//! Command interpreter
//!
//! Applies mutations to the owned [`Graph`] and raises the matching
//! notifications. Remote commands go through [`CommandProcessor::process_batch`],
//! which never fails: anything that cannot be applied is logged and dropped.
//!
//! Local mutations are applied immediately and remembered until the
//! authority echoes them back. An echo of a field write is applied again, so
//! the field ends up with whatever the authority ordered last. An echo of a
//! structural change (insert, bend split or removal, remove) was already
//! applied and is skipped. Own commands that match nothing pending are
//! history from an earlier session and are applied like any other.

use std::collections::VecDeque;
use std::sync::Arc;

use graph_model::{BendRef, Graph, GraphError};
use tracing::{debug, trace};

use crate::command::Command;
use crate::encoder::CommandEncoder;
use crate::events::{GraphEvent, GraphObservers};
use crate::mutation::Mutation;
use crate::stats::SyncStats;

pub struct CommandProcessor {
    graph: Graph,
    encoder: CommandEncoder,
    /// Local mutations not yet seen coming back from the authority
    unacknowledged: VecDeque<Command>,
    track_echoes: bool,
    observers: Arc<GraphObservers>,
    stats: Arc<SyncStats>,
}

impl CommandProcessor {
    pub fn new(graph: Graph, observers: Arc<GraphObservers>, stats: Arc<SyncStats>) -> Self {
        Self {
            encoder: CommandEncoder::new(graph.client_id()),
            graph,
            unacknowledged: VecDeque::new(),
            track_echoes: true,
            observers,
            stats,
        }
    }

    /// For replicas that never receive commands: nothing will come back
    pub fn without_echo_tracking(mut self) -> Self {
        self.track_echoes = false;
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn observers(&self) -> &Arc<GraphObservers> {
        &self.observers
    }

    /// Local commands still waiting for their echo
    pub fn unacknowledged(&self) -> usize {
        self.unacknowledged.len()
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Leave the loading phase, firing `GraphLoaded` on the transition
    pub fn finish_loading(&mut self) -> bool {
        let transitioned = self.graph.finish_loading();
        if transitioned {
            self.observers.emit(GraphEvent::GraphLoaded);
        }
        transitioned
    }

    /// Apply a locally issued mutation and return the command to submit.
    /// Errors leave the graph untouched and produce no command.
    pub fn apply_local(&mut self, mutation: &Mutation) -> Result<Command, GraphError> {
        self.apply(mutation)?;
        self.observers.emit(GraphEvent::GraphChanged);
        let command = self.encoder.encode(mutation);
        if self.track_echoes {
            self.unacknowledged.push_back(command.clone());
        }
        Ok(command)
    }

    /// Forget a local command the authority will never see
    pub(crate) fn abandon(&mut self, command: &Command) {
        if let Some(pos) = self.unacknowledged.iter().position(|c| c == command) {
            self.unacknowledged.remove(pos);
        }
    }

    /// Apply commands from the authority in the order given. Returns how many
    /// were applied.
    pub fn process_batch(&mut self, commands: &[Command]) -> usize {
        if commands.is_empty() {
            return 0;
        }
        let applied = commands.iter().filter(|c| self.process(c)).count();
        self.observers.emit(GraphEvent::GraphChanged);
        applied
    }

    fn process(&mut self, command: &Command) -> bool {
        let own = command.origin == self.graph.client_id();
        let echo = own && self.acknowledge(command);

        let mutation = match Mutation::decode(command) {
            Ok(mutation) => mutation,
            Err(err) => {
                debug!(sequence = command.sequence, %err, "ignoring command");
                self.stats.record_ignored();
                return false;
            }
        };

        if echo {
            if !mutation.is_field_write() {
                trace!(sequence = command.sequence, kind = %mutation.kind(), "own command acknowledged");
                self.stats.record_acknowledged();
                return false;
            }
        } else if own && self.graph.is_loading() {
            // own history being replayed: never hand these ids out again
            match &mutation {
                Mutation::InsertVertex { id, .. } => self.graph.observe_vertex_seq(id.seq),
                Mutation::InsertEdge { id, .. } => self.graph.observe_edge_seq(id.seq),
                _ => {}
            }
        }

        match self.apply(&mutation) {
            Ok(()) => {
                trace!(sequence = command.sequence, kind = %mutation.kind(), "applied");
                self.stats.record_applied();
                true
            }
            Err(err) => {
                debug!(sequence = command.sequence, kind = %mutation.kind(), %err, "dropping command");
                self.stats.record_ignored();
                false
            }
        }
    }

    /// Match an own command against the pending local ones. Commands are
    /// sequenced in the order they were issued, so anything pending ahead of
    /// the match was lost in transit and is dropped.
    fn acknowledge(&mut self, command: &Command) -> bool {
        let Some(pos) = self
            .unacknowledged
            .iter()
            .position(|pending| pending.name == command.name && pending.parameters == command.parameters)
        else {
            return false;
        };
        if pos > 0 {
            debug!(lost = pos, "local commands never reached the authority");
        }
        self.unacknowledged.drain(..=pos);
        true
    }

    fn apply(&mut self, mutation: &Mutation) -> Result<(), GraphError> {
        let events = self.mutate(mutation)?;
        for event in events {
            self.observers.emit(event);
        }
        Ok(())
    }

    fn mutate(&mut self, mutation: &Mutation) -> Result<Vec<GraphEvent>, GraphError> {
        let graph = &mut self.graph;
        let event = match mutation.clone() {
            Mutation::InsertVertex { id, position } => {
                graph.insert_vertex(id, position)?;
                GraphEvent::VertexAdded { id, position }
            }
            Mutation::InsertEdge { id, start, end } => {
                graph.connect(start, end, id)?;
                GraphEvent::EdgeAdded { id, start, end }
            }
            Mutation::BreakEdgeLine { edge, line, position } => {
                let bend = graph.break_edge_line(edge, line, position)?;
                GraphEvent::BendAdded { bend, position }
            }
            Mutation::RemoveVertex { id } => {
                let Some(removed) = graph.remove_vertex(id) else {
                    return Ok(Vec::new());
                };
                let mut events: Vec<GraphEvent> = removed
                    .edges
                    .iter()
                    .map(|edge| GraphEvent::EdgeRemoved { id: edge.id() })
                    .collect();
                events.push(GraphEvent::VertexRemoved { id });
                return Ok(events);
            }
            Mutation::RemoveEdge { id } => match graph.remove_edge(id) {
                Some(_) => GraphEvent::EdgeRemoved { id },
                None => return Ok(Vec::new()),
            },
            Mutation::RemoveBend { edge, index } => {
                graph.remove_bend(edge, index)?;
                GraphEvent::BendRemoved {
                    bend: BendRef { edge, index },
                }
            }
            Mutation::MoveVertex { id, position } => {
                graph.move_vertex(id, position)?;
                GraphEvent::VertexMoved { id, position }
            }
            Mutation::ChangeVertexScale { id, scale } => {
                graph.scale_vertex(id, scale)?;
                GraphEvent::VertexRescaled { id, scale }
            }
            Mutation::ChangeVertexRotation { id, rotation } => {
                graph.rotate_vertex(id, rotation)?;
                GraphEvent::VertexRotated { id, rotation }
            }
            Mutation::MoveBend { edge, index, position } => {
                graph.move_bend(edge, index, position)?;
                GraphEvent::BendMoved {
                    bend: BendRef { edge, index },
                    position,
                }
            }
            Mutation::ChangeCameraPosition { position } => {
                graph.move_camera(position);
                camera_changed(graph)
            }
            Mutation::ChangeCameraRotation { rotation } => {
                graph.rotate_camera(rotation);
                camera_changed(graph)
            }
            Mutation::SetVertexProperty { id, list, key, value, render_update } => {
                graph.set_vertex_property(id, &list, &key, &value)?;
                GraphEvent::VertexPropertyChanged { id, list, key, value, render_update }
            }
            Mutation::SetEdgeProperty { id, list, key, value, render_update } => {
                graph.set_edge_property(id, &list, &key, &value)?;
                GraphEvent::EdgePropertyChanged { id, list, key, value, render_update }
            }
        };
        Ok(vec![event])
    }
}

fn camera_changed(graph: &Graph) -> GraphEvent {
    GraphEvent::CameraChanged {
        position: graph.camera().position(),
        rotation: graph.camera().rotation(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCategory;
    use graph_model::{ClientId, FullId, Point3};
    use parking_lot::Mutex;

    fn processor(client: u64) -> CommandProcessor {
        CommandProcessor::new(
            Graph::new(ClientId(client)),
            Arc::new(GraphObservers::new()),
            Arc::new(SyncStats::new()),
        )
    }

    fn sequenced(commands: Vec<Command>) -> Vec<Command> {
        commands
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_sequence(i as u64 + 1))
            .collect()
    }

    fn id(client: u64, seq: u64) -> FullId {
        FullId::new(ClientId(client), seq)
    }

    /// A short history written by clients 1 and 2
    fn history() -> Vec<Command> {
        let one = CommandEncoder::new(ClientId(1));
        let two = CommandEncoder::new(ClientId(2));
        sequenced(vec![
            one.insert_vertex(id(1, 1), Point3::new(0.0, 0.0, 0.0)),
            two.insert_vertex(id(2, 1), Point3::new(1.0, 0.0, 0.0)),
            one.insert_vertex(id(1, 2), Point3::new(2.0, 0.0, 0.0)),
            two.insert_edge(id(2, 1), id(1, 1), id(2, 1)),
            one.break_edge_line(id(2, 1), 0, Point3::new(0.5, 0.0, 0.0)),
            two.move_bend(id(2, 1), 0, Point3::new(0.5, 1.0, 0.0)),
            one.set_vertex_property(id(1, 2), "labels", "name", "tail", true),
            two.remove_vertex(id(1, 1)),
            one.change_camera_position(Point3::new(0.0, 0.0, 10.0)),
        ])
    }

    #[test]
    fn test_replay_matches_direct_application() {
        let mut replica = processor(3);
        assert_eq!(replica.process_batch(&history()), 9);

        let mut reference = Graph::new(ClientId(9));
        reference.insert_vertex(id(1, 1), Point3::new(0.0, 0.0, 0.0)).unwrap();
        reference.insert_vertex(id(2, 1), Point3::new(1.0, 0.0, 0.0)).unwrap();
        reference.insert_vertex(id(1, 2), Point3::new(2.0, 0.0, 0.0)).unwrap();
        reference.connect(id(1, 1), id(2, 1), id(2, 1)).unwrap();
        reference.break_edge_line(id(2, 1), 0, Point3::new(0.5, 0.0, 0.0)).unwrap();
        reference.move_bend(id(2, 1), 0, Point3::new(0.5, 1.0, 0.0)).unwrap();
        reference.set_vertex_property(id(1, 2), "labels", "name", "tail").unwrap();
        reference.remove_vertex(id(1, 1));
        reference.move_camera(Point3::new(0.0, 0.0, 10.0));

        assert!(replica.graph().content_eq(&reference));
        assert_eq!(replica.graph().edge_count(), 0);
        assert_eq!(replica.graph().vertex(id(1, 2)).unwrap().index(), 1);
    }

    #[test]
    fn test_unknown_and_dangling_commands_are_dropped() {
        let mut replica = processor(3);
        let two = CommandEncoder::new(ClientId(2));
        let batch = sequenced(vec![
            Command::new("ExplodeVertex", ClientId(2), ["2-1"]),
            two.move_vertex(id(2, 1), Point3::ORIGIN),
            two.insert_vertex(id(2, 1), Point3::ORIGIN),
            two.remove_bend(id(2, 5), 0),
            two.set_edge_property(id(2, 5), "l", "k", "v", false),
            Command::new("MoveVertex", ClientId(2), ["2-1", "x", "0", "0"]),
        ]);

        assert_eq!(replica.process_batch(&batch), 1);
        assert_eq!(replica.graph().vertex_count(), 1);
        assert_eq!(replica.stats.snapshot().ignored, 5);
    }

    fn position_x(replica: &CommandProcessor, id: FullId) -> f64 {
        replica.graph().vertex(id).unwrap().position().x
    }

    #[test]
    fn test_own_field_writes_follow_authority_order() {
        let mut replica = processor(1);
        replica.finish_loading();
        let two = CommandEncoder::new(ClientId(2));
        let v = id(2, 1);
        replica.process_batch(&[two.insert_vertex(v, Point3::ORIGIN).with_sequence(1)]);

        // the other client's write was sequenced first, ours lands last
        let ours = replica
            .apply_local(&Mutation::MoveVertex { id: v, position: Point3::new(1.0, 0.0, 0.0) })
            .unwrap();
        replica.process_batch(&[
            two.move_vertex(v, Point3::new(2.0, 0.0, 0.0)).with_sequence(2),
            ours.with_sequence(3),
        ]);
        assert_eq!(position_x(&replica, v), 1.0);

        // ours sequenced first, theirs lands last
        let ours = replica
            .apply_local(&Mutation::MoveVertex { id: v, position: Point3::new(3.0, 0.0, 0.0) })
            .unwrap();
        replica.process_batch(&[
            ours.with_sequence(4),
            two.move_vertex(v, Point3::new(4.0, 0.0, 0.0)).with_sequence(5),
        ]);
        assert_eq!(position_x(&replica, v), 4.0);
        assert_eq!(replica.unacknowledged(), 0);
    }

    #[test]
    fn test_own_structural_echo_is_not_applied_twice() {
        let mut replica = processor(1);
        let two = CommandEncoder::new(ClientId(2));
        let edge = id(2, 1);
        replica.process_batch(&sequenced(vec![
            two.insert_vertex(id(2, 1), Point3::ORIGIN),
            two.insert_vertex(id(2, 2), Point3::new(1.0, 0.0, 0.0)),
            two.insert_edge(edge, id(2, 1), id(2, 2)),
        ]));

        // issued while history is still replaying
        assert!(replica.graph().is_loading());
        let ours = replica
            .apply_local(&Mutation::BreakEdgeLine { edge, line: 0, position: Point3::new(0.5, 0.0, 0.0) })
            .unwrap();
        assert_eq!(replica.process_batch(&[ours.with_sequence(4)]), 0);
        assert_eq!(replica.graph().edge(edge).unwrap().bends().len(), 1);

        replica.finish_loading();
        let v = replica.graph_mut().allocate_vertex_id();
        let insert = replica.apply_local(&Mutation::InsertVertex { id: v, position: Point3::ORIGIN }).unwrap();
        let split = replica
            .apply_local(&Mutation::BreakEdgeLine { edge, line: 1, position: Point3::new(0.8, 0.0, 0.0) })
            .unwrap();
        let unbend = replica.apply_local(&Mutation::RemoveBend { edge, index: 0 }).unwrap();
        replica.process_batch(&[insert.with_sequence(5), split.with_sequence(6), unbend.with_sequence(7)]);

        assert_eq!(replica.graph().vertex_count(), 3);
        assert_eq!(replica.graph().edge(edge).unwrap().bends().len(), 1);
        assert_eq!(replica.stats.snapshot().acknowledged, 4);
        assert_eq!(replica.unacknowledged(), 0);
    }

    #[test]
    fn test_lost_local_commands_are_forgotten() {
        let mut replica = processor(1);
        replica.finish_loading();
        let first = replica.graph_mut().allocate_vertex_id();
        replica.apply_local(&Mutation::InsertVertex { id: first, position: Point3::ORIGIN }).unwrap();
        let second = replica.graph_mut().allocate_vertex_id();
        let kept = replica.apply_local(&Mutation::InsertVertex { id: second, position: Point3::ORIGIN }).unwrap();
        let third = replica.graph_mut().allocate_vertex_id();
        let abandoned = replica.apply_local(&Mutation::InsertVertex { id: third, position: Point3::ORIGIN }).unwrap();
        assert_eq!(replica.unacknowledged(), 3);

        replica.abandon(&abandoned);
        assert_eq!(replica.unacknowledged(), 2);

        // the echo of `kept` also retires the first insert, which never arrived
        replica.process_batch(&[kept.with_sequence(1)]);
        assert_eq!(replica.unacknowledged(), 0);
        assert_eq!(replica.graph().vertex_count(), 3);
    }

    #[test]
    fn test_unmatched_own_command_is_applied() {
        let mut replica = processor(1);
        let one = CommandEncoder::new(ClientId(1));
        replica.process_batch(&[one.insert_vertex(id(1, 4), Point3::ORIGIN).with_sequence(1)]);
        assert_eq!(replica.graph().last_vertex_seq(), 4);

        replica.finish_loading();
        let moved = one.move_vertex(id(1, 4), Point3::new(9.0, 9.0, 9.0)).with_sequence(2);
        assert_eq!(replica.process_batch(&[moved]), 1);
        assert_eq!(position_x(&replica, id(1, 4)), 9.0);
        assert_eq!(replica.stats.snapshot().acknowledged, 0);
    }

    #[test]
    fn test_write_only_replica_keeps_nothing_pending() {
        let mut replica = processor(1).without_echo_tracking();
        replica.finish_loading();
        let v = replica.graph_mut().allocate_vertex_id();
        replica.apply_local(&Mutation::InsertVertex { id: v, position: Point3::ORIGIN }).unwrap();
        assert_eq!(replica.unacknowledged(), 0);
    }

    #[test]
    fn test_counters_only_follow_own_history() {
        let mut replica = processor(1);
        let one = CommandEncoder::new(ClientId(1));
        let two = CommandEncoder::new(ClientId(2));

        // a local allocation made while history is still replaying
        let local = replica.graph_mut().allocate_vertex_id();
        assert_eq!(local, id(1, 1));
        replica.apply_local(&Mutation::InsertVertex { id: local, position: Point3::ORIGIN }).unwrap();

        replica.process_batch(&sequenced(vec![
            two.insert_vertex(id(2, 30), Point3::ORIGIN),
            one.insert_vertex(id(1, 1), Point3::ORIGIN),
            one.insert_edge(id(1, 6), id(1, 1), id(2, 30)),
        ]));

        assert_eq!(replica.graph().last_vertex_seq(), 1);
        assert_eq!(replica.graph().last_edge_seq(), 6);
        assert_eq!(replica.graph().vertex_count(), 2);
        assert_eq!(replica.graph_mut().allocate_edge_id(), id(1, 7));
    }

    #[test]
    fn test_notifications() {
        let mut replica = processor(3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        replica.observers().on_any(move |e| sink.lock().push(e.category()));

        replica.process_batch(&history()[..5]);
        replica.process_batch(&[]);

        assert_eq!(
            *seen.lock(),
            [
                EventCategory::VertexAdded,
                EventCategory::VertexAdded,
                EventCategory::VertexAdded,
                EventCategory::EdgeAdded,
                EventCategory::BendAdded,
                EventCategory::GraphChanged,
            ]
        );

        seen.lock().clear();
        replica.process_batch(&history()[7..8]);
        assert_eq!(
            *seen.lock(),
            [EventCategory::EdgeRemoved, EventCategory::VertexRemoved, EventCategory::GraphChanged]
        );
    }

    #[test]
    fn test_local_errors_leave_graph_untouched() {
        let mut replica = processor(1);
        let missing = id(1, 1);
        assert_eq!(
            replica.apply_local(&Mutation::MoveVertex { id: missing, position: Point3::ORIGIN }),
            Err(GraphError::VertexNotFound(missing))
        );
        assert!(replica.graph().content_eq(&Graph::new(ClientId(1))));
        assert_eq!(replica.unacknowledged(), 0);
    }
}
