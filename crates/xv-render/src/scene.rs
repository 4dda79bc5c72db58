//! Scene builder: laid-out graph → immutable scene snapshot.
//!
//! Every graph object with a drawing program becomes one [`Composite`]
//! holding the items its channels produced. Node composites are indexed by
//! node name; that index is the only way back from a name to its visual
//! and is rebuilt with every scene.

use crate::interp::{Channels, Interpretation, Interpreter, InterpreterConfig};
use crate::item::Item;
use kurbo::{Point, Rect, Vec2};
use std::collections::HashMap;
use std::path::PathBuf;
use xv_core::{BoundingBox, Graph, GraphSession, NodeId};

/// Z bands. Graph frames sit under edges, edges under nodes, fold toggles
/// above everything.
pub const Z_GRAPH: f64 = 0.0;
pub const Z_EDGE: f64 = 1.0;
pub const Z_NODE: f64 = 2.0;
pub const Z_FOLD: f64 = 3.0;
/// Step between objects of one band.
pub const DZ: f64 = 0.0001;

/// Margin of the dashed frame around the root bounding box.
pub const FRAME_MARGIN: f64 = 5.0;
/// Side of the fold toggle square.
pub const TOGGLE_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    Graph,
    Node,
    Edge,
}

/// Checkable affordance shown at the top-left corner of a folded node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldToggle {
    pub rect: Rect,
    pub checked: bool,
}

/// The items of one graph object, drawn and animated as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub kind: CompositeKind,
    /// Set for nodes only.
    pub node: Option<NodeId>,
    pub z: f64,
    pub items: Vec<Item>,
    pub tooltip: Option<String>,
    pub toggle: Option<FoldToggle>,
    /// Animated translation on top of the items' own geometry.
    pub offset: Vec2,
    pub opacity: f64,
    pub visible: bool,
}

impl Composite {
    fn new(kind: CompositeKind, z: f64, items: Vec<Item>) -> Self {
        Self {
            kind,
            node: None,
            z,
            items,
            tooltip: None,
            toggle: None,
            offset: Vec2::ZERO,
            opacity: 1.0,
            visible: true,
        }
    }

    /// Union of the items' extents, before `offset`.
    pub fn bounds(&self) -> Rect {
        self.items
            .iter()
            .filter_map(Item::bounds)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO)
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Where the composite currently is on screen.
    pub fn scene_bounds(&self) -> Rect {
        self.bounds() + self.offset
    }

    pub fn is_shown(&self) -> bool {
        self.visible && self.opacity > 0.0
    }
}

/// One immutable snapshot of a laid-out graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    composites: Vec<Composite>,
    index: HashMap<NodeId, usize>,
    frame: Option<Rect>,
    height: f64,
    warnings: Vec<String>,
}

impl Scene {
    pub fn composites(&self) -> &[Composite] {
        &self.composites
    }

    /// Composites ordered bottom to top; ties keep build order.
    pub fn paint_order(&self) -> Vec<&Composite> {
        let mut ordered: Vec<&Composite> = self.composites.iter().collect();
        ordered.sort_by(|a, b| a.z.total_cmp(&b.z));
        ordered
    }

    pub fn node(&self, name: &str) -> Option<&Composite> {
        let id = NodeId::get(name)?;
        self.node_by_id(id)
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&Composite> {
        self.index.get(&id).map(|&i| &self.composites[i])
    }

    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Registered node names, in build order.
    pub fn node_names(&self) -> Vec<NodeId> {
        self.composites.iter().filter_map(|c| c.node).collect()
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    pub fn composite_mut(&mut self, index: usize) -> Option<&mut Composite> {
        self.composites.get_mut(index)
    }

    /// Dashed frame drawn around the root bounding box.
    pub fn frame(&self) -> Option<Rect> {
        self.frame
    }

    /// Height of the root bounding box, the Y-flip pivot.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Everything the scene draws, frame included.
    pub fn bounds(&self) -> Rect {
        self.composites
            .iter()
            .map(Composite::scene_bounds)
            .chain(self.frame)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO)
    }

    /// Unsupported ops met while building.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Builder settings. `None` fields fall back to the root graph attributes.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub truecolor: Option<bool>,
    pub image_path: Option<Vec<PathBuf>>,
    /// Attach toggles to folded nodes.
    pub fold_toggles: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            truecolor: None,
            image_path: None,
            fold_toggles: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneBuilder {
    config: SceneConfig,
}

impl SceneBuilder {
    pub fn new(config: SceneConfig) -> Self {
        Self { config }
    }

    /// Build the scene of a session's current graph and fold state.
    #[must_use]
    pub fn build_session(&self, session: &GraphSession) -> Scene {
        self.build(session.graph(), |id| session.is_folded(id))
    }

    /// Build a scene from a laid-out graph. `is_folded` decides which nodes
    /// get a fold toggle.
    #[must_use]
    pub fn build(&self, graph: &Graph, is_folded: impl Fn(NodeId) -> bool) -> Scene {
        let root_bb = BoundingBox::parse(graph.graph_attr("bb"));
        let height = root_bb.map_or(0.0, |bb| bb.height());
        let mut config = InterpreterConfig::from_graph_attrs(
            graph.graph_attr("truecolor"),
            graph.graph_attr("imagepath"),
            height,
        );
        if let Some(truecolor) = self.config.truecolor {
            config.truecolor = truecolor;
        }
        if let Some(paths) = &self.config.image_path {
            config.image_path = paths.clone();
        }
        let interp = Interpreter::new(&config);
        let mut scene = Scene {
            height,
            ..Scene::default()
        };

        // Graphs, root first.
        match root_bb {
            Some(bb) => {
                let frame = Rect::new(bb.llx, interp.cy(bb.ury), bb.urx, interp.cy(bb.lly));
                scene.frame = Some(frame.inflate(FRAME_MARGIN, FRAME_MARGIN));
            }
            None => log::warn!("graph `{}` has no bounding box; build it after layout", graph.name),
        }
        let root = interp.build_graphic(&graph.attrs, Channels::NODE);
        scene.push_graph(&graph.name, root, Z_GRAPH + DZ);
        graph.visit_subgraphs(|sg, depth| {
            let drawn = interp.build_graphic(&sg.attrs, Channels::NODE);
            scene.push_graph(&sg.name, drawn, Z_GRAPH + (depth as f64 + 1.0) * DZ);
        });

        // Nodes.
        let mut z_node = Z_NODE;
        for idx in graph.node_indices() {
            let node = graph.node(idx);
            let drawn = interp.build_graphic(&node.attrs, Channels::NODE);
            scene.note_rejected(node.id.as_str(), &drawn);
            if drawn.is_empty() {
                log::debug!("node `{}` draws nothing", node.id);
                continue;
            }
            z_node += DZ;
            let mut composite = Composite::new(CompositeKind::Node, z_node, drawn.items);
            composite.node = Some(node.id);
            let tooltip = graph.node_attr(idx, "tooltip");
            if !tooltip.is_empty() {
                composite.tooltip = Some(tooltip.replace("\\n", "\n"));
            }
            if self.config.fold_toggles && is_folded(node.id) {
                let corner = composite.bounds().origin();
                composite.toggle = Some(FoldToggle {
                    rect: Rect::from_origin_size(corner, (TOGGLE_SIZE, TOGGLE_SIZE)),
                    checked: true,
                });
            }
            scene.index.insert(node.id, scene.composites.len());
            scene.composites.push(composite);
        }

        // Edges, per tail node in node order.
        let mut z_edge = Z_EDGE;
        for idx in graph.node_indices() {
            for e in graph.out_edges(idx) {
                let drawn = interp.build_graphic(&graph.edge(e).attrs, Channels::EDGE);
                if let Some((tail, head)) = graph.endpoints(e) {
                    scene.note_rejected(&format!("{tail} -> {head}"), &drawn);
                }
                if drawn.is_empty() {
                    continue;
                }
                z_edge += DZ;
                scene
                    .composites
                    .push(Composite::new(CompositeKind::Edge, z_edge, drawn.items));
            }
        }

        log::debug!(
            "built scene: {} composites, {} nodes",
            scene.composites.len(),
            scene.index.len()
        );
        scene
    }
}

impl Scene {
    fn push_graph(&mut self, name: &str, drawn: Interpretation, z: f64) {
        self.note_rejected(name, &drawn);
        if !drawn.is_empty() {
            self.composites
                .push(Composite::new(CompositeKind::Graph, z, drawn.items));
        }
    }

    fn note_rejected(&mut self, object: &str, drawn: &Interpretation) {
        for message in &drawn.rejected {
            log::warn!("{object}: {message}");
            self.warnings.push(format!("{object}: {message}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Primitive;
    use pretty_assertions::assert_eq;
    use xv_core::{LayeredLayout, LayoutConfig, FoldConfig, parse_dot};

    const LAID_OUT: &str = r#"digraph {
        graph [bb="0,0,100,200", _draw_="c 5 -black p 4 0 0 100 0 100 200 0 200 "];
        subgraph cluster_x { graph [_draw_="c 5 -black p 4 5 5 60 5 60 60 5 60 "]; sb_a }
        sb_a [tooltip="first\nline", _draw_="c 5 -black e 27 18 27 18 ", _ldraw_="F 14 11 -Times-Roman c 5 -black T 27 13.8 0 7 1 -a "];
        sb_b [_draw_="c 5 -black e 27 90 27 18 "];
        sb_c;
        sb_a -> sb_b [_draw_="c 5 -black B 4 27 36 27 50 27 60 27 72 ", _hdraw_="S 5 -solid c 5 -black C 5 -black P 3 30 71 27 81 24 71 "];
    }"#;

    fn built() -> Scene {
        let g = parse_dot(LAID_OUT).unwrap();
        SceneBuilder::default().build(&g, |id| id.as_str() == "sb_a")
    }

    #[test]
    fn composites_per_object() {
        let scene = built();
        let kinds: Vec<_> = scene.composites().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CompositeKind::Graph,
                CompositeKind::Graph,
                CompositeKind::Node,
                CompositeKind::Node,
                CompositeKind::Edge,
            ]
        );
        // sb_c has no drawing program and is not registered.
        assert_eq!(
            scene.node_names().iter().map(|n| n.as_str()).collect::<Vec<_>>(),
            vec!["sb_a", "sb_b"]
        );
        assert!(scene.node("sb_c").is_none());
        let edge = &scene.composites()[4];
        assert_eq!(edge.items.len(), 2);
        assert_eq!(edge.node, None);
    }

    #[test]
    fn z_bands_stack_graphs_edges_nodes() {
        let scene = built();
        let order: Vec<_> = scene.paint_order().iter().map(|c| c.kind).collect();
        assert_eq!(order.last(), Some(&CompositeKind::Node));
        assert_eq!(order[2], CompositeKind::Edge);
        let a = scene.node("sb_a").unwrap();
        let b = scene.node("sb_b").unwrap();
        assert!(a.z < b.z && b.z < Z_FOLD);
        assert!(scene.composites()[1].z > scene.composites()[0].z);
    }

    #[test]
    fn frame_tooltip_and_toggle() {
        let scene = built();
        assert_eq!(scene.height(), 200.0);
        assert_eq!(scene.frame(), Some(Rect::new(-5.0, -5.0, 105.0, 205.0)));
        let a = scene.node("sb_a").unwrap();
        assert_eq!(a.tooltip.as_deref(), Some("first\nline"));
        assert_eq!(a.bounds().origin(), Point::new(0.0, 164.0));
        assert_eq!(
            a.toggle,
            Some(FoldToggle {
                rect: Rect::new(0.0, 164.0, 10.0, 174.0),
                checked: true
            })
        );
        assert!(scene.node("sb_b").unwrap().toggle.is_none());
    }

    #[test]
    fn rejected_ops_become_warnings() {
        let g = parse_dot(r#"digraph { bb="0,0,10,10"; rw [_ldraw_="T 1 1 1 5 1 -r "] }"#).unwrap();
        let scene = SceneBuilder::default().build(&g, |_| false);
        assert_eq!(scene.warnings().len(), 1);
        assert!(scene.warnings()[0].starts_with("rw: "));
        assert_eq!(scene.node_count(), 0);
    }

    #[test]
    fn truecolor_override() {
        let g = parse_dot(
            r##"digraph { bb="0,0,10,10"; tco [_draw_="C 9 -#11223344 E 5 5 5 5 "] }"##,
        )
        .unwrap();
        let off = SceneBuilder::default().build(&g, |_| false);
        assert_eq!(off.node("tco").unwrap().items[0].brush, None);
        let on = SceneBuilder::new(SceneConfig {
            truecolor: Some(true),
            ..Default::default()
        })
        .build(&g, |_| false);
        assert!(on.node("tco").unwrap().items[0].brush.is_some());
    }

    #[test]
    fn rebuild_is_deterministic() {
        let g = parse_dot(LAID_OUT).unwrap();
        let builder = SceneBuilder::default();
        assert_eq!(builder.build(&g, |_| false), builder.build(&g, |_| false));
    }

    #[test]
    fn session_build_marks_folded_nodes() {
        let mut session = GraphSession::from_source(
            "digraph { sf_a -> sf_b -> sf_c; sf_x }",
            Box::new(LayeredLayout::default()),
            LayoutConfig::default(),
            &FoldConfig::default(),
        )
        .unwrap();
        session.layout_and_render().unwrap();
        session.fold("sf_a").unwrap();
        let scene = SceneBuilder::default().build_session(&session);
        assert_eq!(scene.node_count(), 2);
        assert!(scene.node("sf_a").unwrap().toggle.is_some());
        assert!(scene.node("sf_x").unwrap().toggle.is_none());
        let a = scene.node("sf_a").unwrap();
        assert!(a.items.iter().any(|i| matches!(&i.primitive, Primitive::Polygon { points, .. } if points.len() == 6)));
    }
}
