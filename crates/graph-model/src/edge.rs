//! Edges, bends and edge lines
//!
//! An edge's polyline is stored as an ordered list of bends owned by the
//! edge. Edge lines are derived from it: with `B` bends there are `B + 1`
//! lines, line `i` running from bend `i - 1` (or the start vertex) to bend `i`
//! (or the end vertex). A bend's ordinal is therefore its position in the
//! list, and also the index of the edge line it terminates.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::geometry::Point3;
use crate::id::{FullId, HasFullId};
use crate::properties::Properties;

/// A polyline subdivision point of an edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bend {
    position: Point3,
}

impl Bend {
    pub fn new(position: Point3) -> Self {
        Self { position }
    }

    pub fn position(&self) -> Point3 {
        self.position
    }
}

/// Address of a bend: owning edge plus ordinal along it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BendRef {
    pub edge: FullId,
    pub index: usize,
}

/// One straight segment of an edge's polyline.
/// `None` on either end means the segment is anchored at the vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeLine {
    pub start_bend: Option<usize>,
    pub end_bend: Option<usize>,
}

/// An edge between two vertices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    id: FullId,
    start: FullId,
    end: FullId,
    bends: Vec<Bend>,
    properties: Properties,
}

impl Edge {
    pub(crate) fn new(id: FullId, start: FullId, end: FullId) -> Self {
        Self {
            id,
            start,
            end,
            bends: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn id(&self) -> FullId {
        self.id
    }

    pub fn start(&self) -> FullId {
        self.start
    }

    pub fn end(&self) -> FullId {
        self.end
    }

    /// The endpoint opposite `vertex`, if `vertex` is an endpoint
    pub fn other_end(&self, vertex: FullId) -> Option<FullId> {
        if self.start == vertex {
            Some(self.end)
        } else if self.end == vertex {
            Some(self.start)
        } else {
            None
        }
    }

    pub fn bends(&self) -> &[Bend] {
        &self.bends
    }

    pub fn bend(&self, index: usize) -> Option<&Bend> {
        self.bends.get(index)
    }

    pub fn edge_line_count(&self) -> usize {
        self.bends.len() + 1
    }

    pub fn edge_lines(&self) -> impl Iterator<Item = EdgeLine> + '_ {
        let bends = self.bends.len();
        (0..=bends).map(move |i| EdgeLine {
            start_bend: i.checked_sub(1),
            end_bend: (i < bends).then_some(i),
        })
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, list: &str, key: &str) -> Option<&str> {
        self.properties.get(list, key)
    }

    pub(crate) fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Split edge line `line` in two with a new bend. Returns the new bend's index.
    pub(crate) fn break_line(&mut self, line: usize, position: Point3) -> Result<usize, GraphError> {
        if line >= self.edge_line_count() {
            return Err(GraphError::EdgeLineOutOfRange {
                edge: self.id,
                index: line,
                lines: self.edge_line_count(),
            });
        }
        self.bends.insert(line, Bend::new(position));
        Ok(line)
    }

    /// Merge edge line `index` with its successor, dropping the bend between them
    pub(crate) fn remove_bend(&mut self, index: usize) -> Result<Bend, GraphError> {
        self.check_bend(index)?;
        Ok(self.bends.remove(index))
    }

    pub(crate) fn move_bend(&mut self, index: usize, position: Point3) -> Result<(), GraphError> {
        self.check_bend(index)?;
        self.bends[index].position = position;
        Ok(())
    }

    fn check_bend(&self, index: usize) -> Result<(), GraphError> {
        if index < self.bends.len() {
            Ok(())
        } else {
            Err(GraphError::BendOutOfRange {
                edge: self.id,
                index,
                bends: self.bends.len(),
            })
        }
    }
}

impl HasFullId for Edge {
    fn full_id(&self) -> FullId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ClientId;
    use proptest::prelude::*;

    fn edge() -> Edge {
        let id = |seq| FullId::new(ClientId(1), seq);
        Edge::new(id(10), id(1), id(2))
    }

    fn assert_line_invariant(edge: &Edge) {
        let lines: Vec<EdgeLine> = edge.edge_lines().collect();
        assert_eq!(lines.len(), edge.bends().len() + 1);
        assert_eq!(lines.first().unwrap().start_bend, None);
        assert_eq!(lines.last().unwrap().end_bend, None);
        for pair in lines.windows(2) {
            assert_eq!(pair[0].end_bend, pair[1].start_bend);
        }
    }

    #[test]
    fn test_fresh_edge_has_one_line() {
        let edge = edge();
        assert_eq!(
            edge.edge_lines().collect::<Vec<_>>(),
            vec![EdgeLine { start_bend: None, end_bend: None }]
        );
    }

    #[derive(Debug, Clone)]
    enum BendOp {
        Break { line: usize, x: f64 },
        Remove { index: usize },
    }

    fn bend_op() -> impl Strategy<Value = BendOp> {
        prop_oneof![
            (0usize..8, -10.0f64..10.0).prop_map(|(line, x)| BendOp::Break { line, x }),
            (0usize..8).prop_map(|index| BendOp::Remove { index }),
        ]
    }

    proptest! {
        #[test]
        fn prop_lines_follow_bends(ops in prop::collection::vec(bend_op(), 0..64)) {
            let mut edge = edge();
            let mut expected: Vec<f64> = Vec::new();

            for op in ops {
                match op {
                    BendOp::Break { line, x } => {
                        let ok = edge.break_line(line, Point3::new(x, 0.0, 0.0)).is_ok();
                        prop_assert_eq!(ok, line <= expected.len());
                        if ok {
                            expected.insert(line, x);
                        }
                    }
                    BendOp::Remove { index } => {
                        let ok = edge.remove_bend(index).is_ok();
                        prop_assert_eq!(ok, index < expected.len());
                        if ok {
                            expected.remove(index);
                        }
                    }
                }

                assert_line_invariant(&edge);
                let xs: Vec<f64> = edge.bends().iter().map(|b| b.position().x).collect();
                prop_assert_eq!(&xs, &expected);
            }
        }
    }

    #[test]
    fn test_bend_ordinal_follows_line() {
        let mut edge = edge();
        edge.break_line(0, Point3::new(1.0, 0.0, 0.0)).unwrap();
        edge.break_line(0, Point3::new(0.5, 0.0, 0.0)).unwrap();
        let xs: Vec<f64> = edge.bends().iter().map(|b| b.position().x).collect();
        assert_eq!(xs, [0.5, 1.0]);
    }

    #[test]
    fn test_out_of_range() {
        let mut edge = edge();
        assert!(matches!(
            edge.break_line(1, Point3::ORIGIN),
            Err(GraphError::EdgeLineOutOfRange { index: 1, lines: 1, .. })
        ));
        assert!(matches!(
            edge.remove_bend(0),
            Err(GraphError::BendOutOfRange { index: 0, bends: 0, .. })
        ));
        assert!(edge.move_bend(0, Point3::ORIGIN).is_err());
    }
}
