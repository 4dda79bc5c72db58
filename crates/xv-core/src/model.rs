//! Attributed graph store.
//!
//! A `Graph` is a directed (optionally strict) graph whose nodes, edges and
//! nested subgraphs each carry a string-keyed attribute map. Nodes and
//! edges live in a `petgraph` arena; edges hold only endpoint indices into
//! the owning graph's node arena. Names map to indices through `id_index`.
//!
//! Iteration order is declaration order (tracked with a sequence number)
//! rather than arena order, because the arena reuses vacated slots after
//! removals and the folding engine removes and re-inserts nodes all the time.

use crate::id::NodeId;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ─── Attributes ──────────────────────────────────────────────────────────

/// Ordered string → string attribute map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attrs(BTreeMap<String, String>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite every key of `other` into `self`.
    pub fn merge(&mut self, other: &Attrs) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Attrs(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ─── Graph objects ───────────────────────────────────────────────────────

/// Directed / strict flags of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphKind {
    pub directed: bool,
    pub strict: bool,
}

impl Default for GraphKind {
    fn default() -> Self {
        Self {
            directed: true,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: NodeId,
    pub attrs: Attrs,
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Edge name (`key` in DOT). Anonymous edges have none.
    pub key: Option<String>,
    pub attrs: Attrs,
    seq: u64,
}

/// A nested subgraph. Clusters (`cluster*` names) get a frame when drawn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub name: String,
    pub attrs: Attrs,
    /// Nodes declared inside this subgraph (they live in the root arena).
    pub nodes: Vec<NodeId>,
    pub subgraphs: Vec<Subgraph>,
}

impl Subgraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_cluster(&self) -> bool {
        self.name.starts_with("cluster")
    }

    pub fn add_member(&mut self, id: NodeId) {
        if !self.nodes.contains(&id) {
            self.nodes.push(id);
        }
    }

    /// Drop `id` from this subgraph and all nested ones.
    fn remove_member(&mut self, id: NodeId) {
        self.nodes.retain(|n| *n != id);
        for sg in &mut self.subgraphs {
            sg.remove_member(id);
        }
    }

    fn collect_memberships(&self, id: NodeId, out: &mut Vec<String>) {
        if self.nodes.contains(&id) {
            out.push(self.name.clone());
        }
        for sg in &self.subgraphs {
            sg.collect_memberships(id, out);
        }
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Subgraph> {
        if self.name == name {
            return Some(self);
        }
        self.subgraphs.iter_mut().find_map(|sg| sg.find_mut(name))
    }

    fn visit<'a>(&'a self, depth: usize, f: &mut impl FnMut(&'a Subgraph, usize)) {
        f(self, depth);
        for sg in &self.subgraphs {
            sg.visit(depth + 1, f);
        }
    }

    fn visit_attrs_mut(&mut self, f: &mut impl FnMut(&mut Attrs)) {
        f(&mut self.attrs);
        for sg in &mut self.subgraphs {
            sg.visit_attrs_mut(f);
        }
    }
}

// ─── Graph ───────────────────────────────────────────────────────────────

/// The attributed graph: root attributes, default declarations, node/edge
/// arena and nested subgraphs.
#[derive(Debug, Clone)]
pub struct Graph {
    pub name: String,
    pub kind: GraphKind,

    /// Attributes of the root graph (`bb`, `truecolor`, `_draw_`, ...).
    pub attrs: Attrs,

    /// `node [..]` declarations: defaults for unset node attributes.
    pub node_defaults: Attrs,

    /// `edge [..]` declarations: defaults for unset edge attributes.
    pub edge_defaults: Attrs,

    pub subgraphs: Vec<Subgraph>,

    graph: StableDiGraph<NodeData, EdgeData>,
    id_index: HashMap<NodeId, NodeIndex>,
    next_seq: u64,
}

impl Graph {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: GraphKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attrs: Attrs::new(),
            node_defaults: Attrs::new(),
            edge_defaults: Attrs::new(),
            subgraphs: Vec::new(),
            graph: StableDiGraph::new(),
            id_index: HashMap::new(),
            next_seq: 0,
        }
    }

    fn bump_seq(&mut self) -> u64 {
        let s = self.next_seq;
        self.next_seq += 1;
        s
    }

    // ─── Nodes ───────────────────────────────────────────────────────────

    /// Return the node named `id`, creating it with no attributes if absent.
    pub fn add_node(&mut self, id: NodeId) -> NodeIndex {
        if let Some(idx) = self.id_index.get(&id) {
            return *idx;
        }
        let seq = self.bump_seq();
        let idx = self.graph.add_node(NodeData {
            id,
            attrs: Attrs::new(),
            seq,
        });
        self.id_index.insert(id, idx);
        idx
    }

    /// Remove a node, its incident edges and its subgraph memberships.
    pub fn remove_node(&mut self, id: NodeId) -> Option<NodeData> {
        let idx = self.id_index.remove(&id)?;
        for sg in &mut self.subgraphs {
            sg.remove_member(id);
        }
        self.graph.remove_node(idx)
    }

    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    /// Look up a node by name without interning the name.
    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        NodeId::get(name).and_then(|id| self.index_of(id))
    }

    pub fn node(&self, idx: NodeIndex) -> &NodeData {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut NodeData {
        &mut self.graph[idx]
    }

    pub fn get_by_id(&self, id: NodeId) -> Option<&NodeData> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn get_by_id_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.index_of(id).map(|idx| &mut self.graph[idx])
    }

    /// Node indices in declaration order.
    pub fn node_indices(&self) -> Vec<NodeIndex> {
        let mut v: Vec<NodeIndex> = self.graph.node_indices().collect();
        v.sort_by_key(|i| self.graph[*i].seq);
        v
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.node_indices()
            .into_iter()
            .map(|i| self.graph[i].id)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Node attribute, falling back to the `node [..]` default, then `""`.
    pub fn node_attr(&self, idx: NodeIndex, key: &str) -> &str {
        self.graph[idx]
            .attrs
            .get(key)
            .or_else(|| self.node_defaults.get(key))
            .unwrap_or("")
    }

    /// Subgraph names (at any depth) that declare `id` as a member.
    pub fn memberships(&self, id: NodeId) -> Vec<String> {
        let mut out = Vec::new();
        for sg in &self.subgraphs {
            sg.collect_memberships(id, &mut out);
        }
        out
    }

    // ─── Edges ───────────────────────────────────────────────────────────

    /// Create an edge `tail -> head`, creating missing endpoints.
    ///
    /// Mirrors DOT semantics: an edge with the same key between the same
    /// endpoints is reused, and in a strict graph any parallel edge is.
    pub fn add_edge(&mut self, tail: NodeId, head: NodeId, key: Option<&str>) -> EdgeIndex {
        let t = self.add_node(tail);
        let h = self.add_node(head);
        let existing = self
            .graph
            .edges_connecting(t, h)
            .find(|e| self.kind.strict || (key.is_some() && e.weight().key.as_deref() == key))
            .map(|e| e.id());
        if let Some(e) = existing {
            return e;
        }
        let seq = self.bump_seq();
        self.graph.add_edge(
            t,
            h,
            EdgeData {
                key: key.map(str::to_string),
                attrs: Attrs::new(),
                seq,
            },
        )
    }

    pub fn remove_edge(&mut self, e: EdgeIndex) -> Option<EdgeData> {
        self.graph.remove_edge(e)
    }

    pub fn edge(&self, e: EdgeIndex) -> &EdgeData {
        &self.graph[e]
    }

    pub fn edge_mut(&mut self, e: EdgeIndex) -> &mut EdgeData {
        &mut self.graph[e]
    }

    /// `(tail, head)` names of an edge.
    pub fn endpoints(&self, e: EdgeIndex) -> Option<(NodeId, NodeId)> {
        self.graph
            .edge_endpoints(e)
            .map(|(t, h)| (self.graph[t].id, self.graph[h].id))
    }

    /// Outgoing edges of a node in declaration order.
    pub fn out_edges(&self, idx: NodeIndex) -> Vec<EdgeIndex> {
        let mut v: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        v.sort_by_key(|e| self.graph[*e].seq);
        v
    }

    pub fn has_out_edges(&self, idx: NodeIndex) -> bool {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .next()
            .is_some()
    }

    /// All edges in declaration order.
    pub fn edge_indices(&self) -> Vec<EdgeIndex> {
        let mut v: Vec<EdgeIndex> = self.graph.edge_indices().collect();
        v.sort_by_key(|e| self.graph[*e].seq);
        v
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edge attribute, falling back to the `edge [..]` default, then `""`.
    pub fn edge_attr(&self, e: EdgeIndex, key: &str) -> &str {
        self.graph[e]
            .attrs
            .get(key)
            .or_else(|| self.edge_defaults.get(key))
            .unwrap_or("")
    }

    // ─── Graph-level ─────────────────────────────────────────────────────

    pub fn graph_attr(&self, key: &str) -> &str {
        self.attrs.get(key).unwrap_or("")
    }

    /// Find a subgraph by name at any depth.
    pub fn subgraph_mut(&mut self, name: &str) -> Option<&mut Subgraph> {
        self.subgraphs.iter_mut().find_map(|sg| sg.find_mut(name))
    }

    /// Visit every subgraph depth-first with its nesting depth (top level = 1).
    pub fn visit_subgraphs<'a>(&'a self, mut f: impl FnMut(&'a Subgraph, usize)) {
        for sg in &self.subgraphs {
            sg.visit(1, &mut f);
        }
    }

    /// Apply `f` to the attribute map of every object: root, subgraphs,
    /// nodes and edges.
    pub fn for_each_attrs_mut(&mut self, mut f: impl FnMut(&mut Attrs)) {
        f(&mut self.attrs);
        for sg in &mut self.subgraphs {
            sg.visit_attrs_mut(&mut f);
        }
        for n in self.graph.node_weights_mut() {
            f(&mut n.attrs);
        }
        for e in self.graph.edge_weights_mut() {
            f(&mut e.attrs);
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("", GraphKind::default())
    }
}

// ─── Spatial helpers ─────────────────────────────────────────────────────

/// Axis-aligned box in layout coordinates (Y-up), as stored in `bb`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl BoundingBox {
    /// Parse a `"llx,lly,urx,ury"` attribute value.
    pub fn parse(s: &str) -> Option<Self> {
        let mut it = s.split(',').map(|p| p.trim().parse::<f64>());
        let bb = BoundingBox {
            llx: it.next()?.ok()?,
            lly: it.next()?.ok()?,
            urx: it.next()?.ok()?,
            ury: it.next()?.ok()?,
        };
        if it.next().is_some() {
            return None;
        }
        Some(bb)
    }

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    pub fn to_attr(&self) -> String {
        format!("{},{},{},{}", fmt_num(self.llx), fmt_num(self.lly), fmt_num(self.urx), fmt_num(self.ury))
    }
}

/// Format a coordinate the way Graphviz does: at most two decimals, no
/// trailing zeros.
pub fn fmt_num(v: f64) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    #[test]
    fn nodes_keep_declaration_order_after_removal() {
        let mut g = Graph::default();
        g.add_node(id("m_a"));
        g.add_node(id("m_b"));
        g.remove_node(id("m_a"));
        g.add_node(id("m_c"));
        // m_c reuses m_a's arena slot but must still come last.
        assert_eq!(g.node_ids(), vec![id("m_b"), id("m_c")]);
    }

    #[test]
    fn remove_node_drops_incident_edges_and_memberships() {
        let mut g = Graph::default();
        g.add_edge(id("r_a"), id("r_b"), None);
        g.add_edge(id("r_b"), id("r_c"), None);
        let mut sg = Subgraph::new("cluster_0");
        sg.add_member(id("r_b"));
        g.subgraphs.push(sg);

        assert_eq!(g.memberships(id("r_b")), vec!["cluster_0".to_string()]);
        g.remove_node(id("r_b"));
        assert_eq!(g.edge_count(), 0);
        assert!(g.subgraphs[0].nodes.is_empty());
    }

    #[test]
    fn strict_graph_reuses_parallel_edge() {
        let mut g = Graph::new(
            "s",
            GraphKind {
                directed: true,
                strict: true,
            },
        );
        let e1 = g.add_edge(id("s_a"), id("s_b"), None);
        let e2 = g.add_edge(id("s_a"), id("s_b"), None);
        assert_eq!(e1, e2);

        let mut g = Graph::default();
        let e1 = g.add_edge(id("s_a"), id("s_b"), None);
        let e2 = g.add_edge(id("s_a"), id("s_b"), None);
        assert_ne!(e1, e2);
        let k1 = g.add_edge(id("s_a"), id("s_b"), Some("k"));
        let k2 = g.add_edge(id("s_a"), id("s_b"), Some("k"));
        assert_eq!(k1, k2);
    }

    #[test]
    fn attribute_defaults() {
        let mut g = Graph::default();
        g.node_defaults.set("shape", "box");
        let a = g.add_node(id("d_a"));
        assert_eq!(g.node_attr(a, "shape"), "box");
        assert_eq!(g.node_attr(a, "tooltip"), "");
        g.node_mut(a).attrs.set("shape", "folder");
        assert_eq!(g.node_attr(a, "shape"), "folder");
    }

    #[test]
    fn bounding_box_parse() {
        let bb = BoundingBox::parse("0,0,62,116").unwrap();
        assert_eq!(bb.width(), 62.0);
        assert_eq!(bb.height(), 116.0);
        assert!(BoundingBox::parse("0,0,62").is_none());
        assert!(BoundingBox::parse("a,b,c,d").is_none());
        assert_eq!(bb.to_attr(), "0,0,62,116");
        assert_eq!(fmt_num(27.004), "27");
        assert_eq!(fmt_num(-0.001), "0");
        assert_eq!(fmt_num(13.5), "13.5");
    }
}
