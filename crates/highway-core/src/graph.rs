use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::instance::InstanceId;

/// Kind of path between two instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Written by reciting and writing text; walkable both ways at retrieval.
    Sequential,
    /// Base → crystallized index path; walkable forward only.
    Hierarchical,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Hierarchical => "hierarchical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sequential" | "horizontal" => Some(Self::Sequential),
            "hierarchical" | "vertical" => Some(Self::Hierarchical),
            _ => None,
        }
    }
}

/// Flat edge row, the persisted form of one path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub src: InstanceId,
    pub dst: InstanceId,
    pub kind: EdgeKind,
    pub walk_count: u32,
}

/// Directed multigraph over instance ids.
///
/// At most one edge per (src, dst, kind). Out-edges carry the counts;
/// the in-edge index mirrors them for reverse traversal.
#[derive(Clone, Debug, Default)]
pub struct PathGraph {
    out_edges: BTreeMap<InstanceId, BTreeMap<(InstanceId, EdgeKind), u32>>,
    in_edges: BTreeMap<InstanceId, BTreeSet<(InstanceId, EdgeKind)>>,
}

impl PathGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = EdgeRecord>) -> Self {
        let mut graph = Self::new();
        for r in records {
            graph.set_edge(r.src, r.dst, r.kind, r.walk_count);
        }
        graph
    }

    /// Every edge, ordered by (src, dst, kind).
    pub fn records(&self) -> Vec<EdgeRecord> {
        self.out_edges
            .iter()
            .flat_map(|(&src, targets)| {
                targets.iter().map(move |(&(dst, kind), &walk_count)| EdgeRecord {
                    src,
                    dst,
                    kind,
                    walk_count,
                })
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.out_edges.values().map(|t| t.len()).sum()
    }

    /// Create the edge if needed and walk it once. Returns the new count.
    pub fn add_edge(&mut self, src: InstanceId, dst: InstanceId, kind: EdgeKind) -> u32 {
        self.in_edges.entry(dst).or_default().insert((src, kind));
        let count = self
            .out_edges
            .entry(src)
            .or_default()
            .entry((dst, kind))
            .or_insert(0);
        *count += 1;
        *count
    }

    /// Insert or overwrite an edge with an explicit count.
    pub fn set_edge(&mut self, src: InstanceId, dst: InstanceId, kind: EdgeKind, walk_count: u32) {
        self.in_edges.entry(dst).or_default().insert((src, kind));
        self.out_edges
            .entry(src)
            .or_default()
            .insert((dst, kind), walk_count);
    }

    pub fn walk_count(&self, src: InstanceId, dst: InstanceId, kind: EdgeKind) -> Option<u32> {
        self.out_edges.get(&src)?.get(&(dst, kind)).copied()
    }

    /// Subtract `decrement` from an edge's count, stopping at zero.
    pub fn demote_edge(&mut self, src: InstanceId, dst: InstanceId, kind: EdgeKind, decrement: u32) {
        if let Some(count) = self.count_mut(src, dst, kind) {
            *count = count.saturating_sub(decrement);
        }
    }

    /// Overwrite an existing edge's count.
    pub fn reset_edge(&mut self, src: InstanceId, dst: InstanceId, kind: EdgeKind, walk_count: u32) {
        if let Some(count) = self.count_mut(src, dst, kind) {
            *count = walk_count;
        }
    }

    fn count_mut(&mut self, src: InstanceId, dst: InstanceId, kind: EdgeKind) -> Option<&mut u32> {
        self.out_edges.get_mut(&src)?.get_mut(&(dst, kind))
    }

    /// Nodes reachable in one retrieval step, ascending by id.
    ///
    /// Every out-edge is followed; in-edges only when sequential.
    pub fn neighbors(&self, node: InstanceId) -> Vec<InstanceId> {
        let mut out: BTreeSet<InstanceId> = self
            .out_edges
            .get(&node)
            .map(|t| t.keys().map(|&(dst, _)| dst).collect())
            .unwrap_or_default();
        if let Some(sources) = self.in_edges.get(&node) {
            out.extend(
                sources
                    .iter()
                    .filter(|(_, kind)| *kind == EdgeKind::Sequential)
                    .map(|&(src, _)| src),
            );
        }
        out.into_iter().collect()
    }
}
