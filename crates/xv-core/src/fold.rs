//! Graph folding engine.
//!
//! `fold(n)` contracts everything reachable from `n` through outgoing edges
//! into `n`: the subtree moves into a lazily created side buffer graph and
//! `n` stays in place as a stand-in with a distinguishing shape. `unfold(n)`
//! moves the subtree back. A node is folded exactly when the side buffer
//! holds a node with its name.
//!
//! Every fold also keeps a [`FoldRecord`] of what it took out of the main
//! graph, as it was at fold time. Unfold restores from that record, so an
//! inner fold absorbed by an outer one comes back still folded, and edges
//! that entered the subtree from outside are reconnected.

use crate::error::Error;
use crate::id::NodeId;
use crate::model::{Attrs, Graph, GraphKind};
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Which graph a node is copied *from*. `copy` always writes into the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Main,
    Buffer,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Main => Side::Buffer,
            Side::Buffer => Side::Main,
        }
    }
}

/// Result of a successful `fold`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldOutcome {
    /// The listed nodes moved into the side buffer.
    Folded { absorbed: Vec<NodeId> },
    /// The node has no outgoing edges; nothing changed.
    NoOp,
}

#[derive(Debug, Clone, PartialEq)]
struct StoredEdge {
    tail: NodeId,
    head: NodeId,
    key: Option<String>,
    attrs: Attrs,
}

impl StoredEdge {
    fn capture(g: &Graph, e: EdgeIndex) -> Option<Self> {
        let (tail, head) = g.endpoints(e)?;
        let data = g.edge(e);
        Some(Self {
            tail,
            head,
            key: data.key.clone(),
            attrs: data.attrs.clone(),
        })
    }

    fn restore(&self, g: &mut Graph) {
        let e = g.add_edge(self.tail, self.head, self.key.as_deref());
        g.edge_mut(e).attrs = self.attrs.clone();
    }
}

/// What one fold removed from the main graph.
#[derive(Debug, Clone, Default, PartialEq)]
struct FoldRecord {
    /// Stand-in attributes before it was marked.
    stand_in: Attrs,
    /// Absorbed nodes in visit order.
    nodes: Vec<(NodeId, Attrs)>,
    /// Edges between the stand-in and absorbed nodes.
    edges: Vec<StoredEdge>,
    /// Edges from the rest of the graph into absorbed nodes.
    severed: Vec<StoredEdge>,
    memberships: HashMap<NodeId, Vec<String>>,
}

impl FoldRecord {
    fn owns(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|(v, _)| *v == id)
    }
}

/// The side buffer graph plus the bookkeeping needed to undo folds.
#[derive(Debug, Clone)]
pub struct SideBuffer {
    buffer: Option<Graph>,
    folded_shape: String,
    /// One record per folded stand-in.
    records: HashMap<NodeId, FoldRecord>,
}

impl Default for SideBuffer {
    fn default() -> Self {
        Self::new("folder")
    }
}

impl SideBuffer {
    pub fn new(folded_shape: impl Into<String>) -> Self {
        Self {
            buffer: None,
            folded_shape: folded_shape.into(),
            records: HashMap::new(),
        }
    }

    /// The side buffer graph, if any fold has happened yet.
    pub fn graph(&self) -> Option<&Graph> {
        self.buffer.as_ref()
    }

    pub fn folded_shape(&self) -> &str {
        &self.folded_shape
    }

    pub fn is_folded(&self, id: NodeId) -> bool {
        self.buffer.as_ref().is_some_and(|b| b.contains(id))
    }

    /// Stand-ins currently folded, in fold order.
    pub fn folded_nodes(&self, main: &Graph) -> Vec<NodeId> {
        main.node_ids()
            .into_iter()
            .filter(|id| self.is_folded(*id))
            .collect()
    }

    /// Create the buffer on first use and (re)declare the main graph's
    /// attribute defaults on it.
    fn prepare(&mut self, main: &Graph) -> &mut Graph {
        let buffer = self.buffer.get_or_insert_with(|| {
            Graph::new(
                format!("{}_folded", main.name),
                GraphKind {
                    directed: main.kind.directed,
                    strict: main.kind.strict,
                },
            )
        });
        buffer.node_defaults = main.node_defaults.clone();
        buffer.edge_defaults = main.edge_defaults.clone();
        buffer
    }

    /// Copy node `id` out of `from` into the other graph.
    ///
    /// A node that already exists in the destination is returned as is;
    /// only freshly created nodes receive the source attributes.
    pub fn copy(&mut self, main: &mut Graph, from: Side, id: NodeId) -> Option<NodeIndex> {
        self.prepare(main);
        let buffer = self.buffer.as_mut()?;
        let (src, dst) = match from {
            Side::Main => (&*main, buffer),
            Side::Buffer => (&*buffer, main),
        };
        copy_node(src, dst, id)
    }

    /// Fold the subtree reachable from `id` into `id`.
    pub fn fold(&mut self, main: &mut Graph, id: NodeId) -> Result<FoldOutcome, Error> {
        let root = main
            .index_of(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        if self.is_folded(id) {
            return Err(Error::AlreadyFolded(id.to_string()));
        }
        if !main.has_out_edges(root) {
            log::debug!("fold {id}: no outgoing edges, nothing to do");
            return Ok(FoldOutcome::NoOp);
        }

        self.prepare(main);
        let Some(buffer) = self.buffer.as_mut() else {
            return Ok(FoldOutcome::NoOp);
        };
        let (visited, edges) = transfer_reachable(main, buffer, id);
        let absorbed: Vec<NodeId> = visited.into_iter().filter(|v| *v != id).collect();

        let inside: HashSet<NodeId> = absorbed.iter().copied().chain([id]).collect();
        let severed: Vec<EdgeIndex> = main
            .edge_indices()
            .into_iter()
            .filter(|e| {
                main.endpoints(*e)
                    .is_some_and(|(t, h)| !inside.contains(&t) && h != id && inside.contains(&h))
            })
            .collect();

        let mut record = FoldRecord {
            stand_in: main.node(root).attrs.clone(),
            ..FoldRecord::default()
        };
        for v in &absorbed {
            if let Some(node) = main.get_by_id(*v) {
                record.nodes.push((*v, node.attrs.clone()));
            }
            let groups = main.memberships(*v);
            if !groups.is_empty() {
                record.memberships.insert(*v, groups);
            }
        }
        record.edges = edges.iter().filter_map(|e| StoredEdge::capture(main, *e)).collect();
        record.severed = severed.iter().filter_map(|e| StoredEdge::capture(main, *e)).collect();

        for e in edges.iter().chain(&severed) {
            main.remove_edge(*e);
        }
        for v in &absorbed {
            main.remove_node(*v);
        }

        if let Some(stand_in) = main.get_by_id_mut(id) {
            stand_in.attrs.set("shape", self.folded_shape.clone());
        }
        log::debug!(
            "fold {id}: moved {} nodes and {} edges to the side buffer, {} incoming edges held back",
            absorbed.len(),
            record.edges.len(),
            record.severed.len()
        );
        self.records.insert(id, record);
        Ok(FoldOutcome::Folded { absorbed })
    }

    /// Restore the subtree folded into `id`. Returns the restored node names.
    ///
    /// Stand-ins of earlier folds inside the subtree come back folded, with
    /// their own subtrees left in the buffer.
    pub fn unfold(&mut self, main: &mut Graph, id: NodeId) -> Result<Vec<NodeId>, Error> {
        if !self.is_folded(id) {
            return Err(Error::NotFolded(id.to_string()));
        }
        let target = main
            .index_of(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        let record = self
            .records
            .remove(&id)
            .ok_or_else(|| Error::NotFolded(id.to_string()))?;

        main.node_mut(target).attrs = record.stand_in.clone();
        for (v, attrs) in &record.nodes {
            let idx = main.add_node(*v);
            main.node_mut(idx).attrs = attrs.clone();
        }
        for edge in &record.edges {
            edge.restore(main);
        }
        for edge in record.severed {
            if main.contains(edge.tail) {
                edge.restore(main);
            } else if let Some(owner) = self.records.values_mut().find(|r| r.owns(edge.tail)) {
                // The tail was folded away meanwhile; reconnect when it is back.
                owner.severed.push(edge);
            } else {
                log::debug!("unfold {id}: dropping edge {} -> {}, tail is gone", edge.tail, edge.head);
            }
        }

        let restored: Vec<NodeId> = record.nodes.iter().map(|(v, _)| *v).collect();
        for (v, groups) in &record.memberships {
            for name in groups {
                if let Some(sg) = main.subgraph_mut(name) {
                    sg.add_member(*v);
                }
            }
        }

        self.prepare(main);
        if let Some(buffer) = self.buffer.as_mut() {
            for v in restored.iter().filter(|v| !self.records.contains_key(v)).chain([&id]) {
                buffer.remove_node(*v);
            }
        }
        log::debug!(
            "unfold {id}: restored {} nodes and {} edges",
            restored.len(),
            record.edges.len()
        );
        Ok(restored)
    }
}

/// Depth-first walk from `start` in `src` over outgoing edges, copying every
/// visited node and edge into `dst`. Returns the visited nodes (including
/// `start`) and the visited edges of `src`.
fn transfer_reachable(src: &Graph, dst: &mut Graph, start: NodeId) -> (Vec<NodeId>, Vec<EdgeIndex>) {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut order = Vec::new();
    let mut edges = Vec::new();
    let mut stack = vec![start];

    while let Some(v) = stack.pop() {
        if !visited.insert(v) {
            continue;
        }
        order.push(v);
        copy_node(src, dst, v);
        let Some(idx) = src.index_of(v) else {
            continue;
        };
        for e in src.out_edges(idx) {
            let Some((tail, head)) = src.endpoints(e) else {
                continue;
            };
            copy_node(src, dst, tail);
            copy_node(src, dst, head);
            let data = src.edge(e);
            let copied = dst.add_edge(tail, head, data.key.as_deref());
            dst.edge_mut(copied).attrs = data.attrs.clone();
            edges.push(e);
            if !visited.contains(&head) {
                stack.push(head);
            }
        }
    }
    (order, edges)
}

fn copy_node(src: &Graph, dst: &mut Graph, id: NodeId) -> Option<NodeIndex> {
    if let Some(idx) = dst.index_of(id) {
        return Some(idx);
    }
    let attrs = src.get_by_id(id)?.attrs.clone();
    let idx = dst.add_node(id);
    dst.node_mut(idx).attrs = attrs;
    Some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_dot;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    #[test]
    fn fold_moves_reachable_subtree() {
        let mut g = parse_dot("digraph { f_a -> f_b -> f_c; f_x -> f_a }").unwrap();
        let mut side = SideBuffer::default();
        let outcome = side.fold(&mut g, id("f_a")).unwrap();
        assert_eq!(
            outcome,
            FoldOutcome::Folded {
                absorbed: vec![id("f_b"), id("f_c")]
            }
        );
        assert_eq!(g.node_ids(), vec![id("f_a"), id("f_x")]);
        assert_eq!(g.edge_count(), 1);
        let a = g.index_of(id("f_a")).unwrap();
        assert_eq!(g.node_attr(a, "shape"), "folder");

        let buffer = side.graph().unwrap();
        assert_eq!(buffer.node_count(), 3);
        assert_eq!(buffer.edge_count(), 2);
        assert!(side.is_folded(id("f_a")));
        assert!(!side.is_folded(id("f_x")));
    }

    #[test]
    fn fold_leaf_is_noop() {
        let mut g = parse_dot("digraph { l_a -> l_b }").unwrap();
        let before = crate::emitter::emit_dot(&g);
        let mut side = SideBuffer::default();
        assert_eq!(side.fold(&mut g, id("l_b")).unwrap(), FoldOutcome::NoOp);
        assert_eq!(crate::emitter::emit_dot(&g), before);
        assert!(side.graph().is_none());
        assert!(!side.is_folded(id("l_b")));
    }

    #[test]
    fn precondition_violations_are_typed() {
        let mut g = parse_dot("digraph { p_a -> p_b }").unwrap();
        let mut side = SideBuffer::default();
        assert_eq!(
            side.unfold(&mut g, id("p_a")),
            Err(Error::NotFolded("p_a".into()))
        );
        side.fold(&mut g, id("p_a")).unwrap();
        assert_eq!(
            side.fold(&mut g, id("p_a")),
            Err(Error::AlreadyFolded("p_a".into()))
        );
        assert_eq!(
            side.fold(&mut g, id("p_missing")),
            Err(Error::NodeNotFound("p_missing".into()))
        );
    }

    #[test]
    fn copy_writes_into_the_other_graph() {
        let mut g = parse_dot("digraph { c_a [color=red] }").unwrap();
        let mut side = SideBuffer::new("box3d");
        side.copy(&mut g, Side::Main, id("c_a")).unwrap();
        let buffer = side.graph().unwrap();
        let idx = buffer.index_of(id("c_a")).unwrap();
        assert_eq!(buffer.node_attr(idx, "color"), "red");
        assert_eq!(Side::Main.other(), Side::Buffer);
    }

    #[test]
    fn unfold_restores_memberships() {
        let mut g = parse_dot("digraph { m_a -> m_b; subgraph cluster_0 { m_b } }").unwrap();
        let mut side = SideBuffer::default();
        side.fold(&mut g, id("m_a")).unwrap();
        assert!(g.subgraphs[0].nodes.is_empty());
        let restored = side.unfold(&mut g, id("m_a")).unwrap();
        assert_eq!(restored, vec![id("m_b")]);
        assert_eq!(g.subgraphs[0].nodes, vec![id("m_b")]);
    }
}
