//! Integration tests: laid-out Graphviz output → scene.

use pretty_assertions::assert_eq;
use xv_core::{BoundingBox, Graph, parse_dot};
use xv_render::{
    Channels, CompositeKind, Interpreter, InterpreterConfig, Point, Primitive, Rect, SceneBuilder, hit_test,
    parse_xdot, render_svg,
};

fn chain() -> Graph {
    parse_dot(include_str!("fixtures/chain_laid_out.xdot")).expect("fixture parses")
}

fn config(g: &Graph) -> InterpreterConfig {
    let h = BoundingBox::parse(g.graph_attr("bb")).map_or(0.0, |bb| bb.height());
    InterpreterConfig::from_graph_attrs(g.graph_attr("truecolor"), g.graph_attr("imagepath"), h)
}

fn close(a: Rect, b: Rect) -> bool {
    [(a.x0, b.x0), (a.y0, b.y0), (a.x1, b.x1), (a.y1, b.y1)]
        .iter()
        .all(|(x, y)| (x - y).abs() < 1e-9)
}

#[test]
fn one_item_per_drawing_op() {
    let g = chain();
    let cfg = config(&g);
    let interp = Interpreter::new(&cfg);

    let mut objects: Vec<(_, Channels)> = g
        .node_indices()
        .into_iter()
        .map(|n| (&g.node(n).attrs, Channels::NODE))
        .collect();
    objects.extend(g.edge_indices().into_iter().map(|e| (&g.edge(e).attrs, Channels::EDGE)));
    objects.push((&g.attrs, Channels::NODE));

    for (attrs, channels) in objects {
        let expected: usize = channels
            .attr_names()
            .filter_map(|name| attrs.get(name))
            .map(|program| parse_xdot(program).unwrap().iter().filter(|op| op.draws()).count())
            .sum();
        let drawn = interp.build_graphic(attrs, channels);
        assert_eq!(drawn.items.len(), expected);
        assert!(drawn.rejected.is_empty());
    }
}

#[test]
fn bounding_rect_matches_built_items() {
    let g = chain();
    let cfg = config(&g);
    let interp = Interpreter::new(&cfg);

    for n in g.node_indices() {
        let attrs = &g.node(n).attrs;
        let bbox = interp.bounding_rect(attrs, Channels::NODE).unwrap().unwrap();
        let built = interp.build_graphic(attrs, Channels::NODE).bounds().unwrap();
        assert!(close(bbox, built), "{}: {bbox:?} != {built:?}", g.node(n).id);
    }
    for e in g.edge_indices() {
        let attrs = &g.edge(e).attrs;
        let bbox = interp.bounding_rect(attrs, Channels::EDGE).unwrap().unwrap();
        let built = interp.build_graphic(attrs, Channels::EDGE).bounds().unwrap();
        assert!(close(bbox, built));
    }
}

#[test]
fn layout_y_is_flipped() {
    let scene = SceneBuilder::default().build(&chain(), |_| false);
    assert_eq!(scene.height(), 180.0);
    // A sits at layout y=162, the top of the drawing.
    assert_eq!(scene.node("A").unwrap().bounds(), Rect::new(0.0, 0.0, 54.0, 36.0));
    assert_eq!(scene.node("B").unwrap().bounds().y0, 72.0);
    assert_eq!(scene.node("C").unwrap().bounds(), Rect::new(0.0, 144.0, 54.0, 180.0));
    assert_eq!(hit_test(&scene, Point::new(27.0, 170.0)).map(|n| n.as_str()), Some("C"));
}

#[test]
fn chain_scene_structure() {
    let scene = SceneBuilder::default().build(&chain(), |_| false);
    let count = |kind| scene.composites().iter().filter(|c| c.kind == kind).count();
    assert_eq!(count(CompositeKind::Graph), 1);
    assert_eq!(count(CompositeKind::Node), 3);
    assert_eq!(count(CompositeKind::Edge), 2);
    assert_eq!(scene.node("A").unwrap().tooltip.as_deref(), Some("root\nnode"));

    // The root background is filled but its transparent pen is undecodable
    // without truecolor, so it is not stroked.
    let root = &scene.composites()[0];
    assert!(root.items[0].pen.is_none());
    assert!(root.items[0].brush.is_some());

    let b = scene.node("B").unwrap();
    assert!(matches!(&b.items[0].primitive, Primitive::Polygon { closed: true, points } if points.len() == 4));
    assert!(matches!(&b.items[1].primitive, Primitive::Text { text, .. } if text == "B"));
}

#[test]
fn rebuilds_are_identical() {
    let g = chain();
    let builder = SceneBuilder::default();
    let first = builder.build(&g, |_| false);
    let second = builder.build(&g, |_| false);
    for name in first.node_names() {
        assert_eq!(
            first.node_by_id(name).map(|c| c.bounds()),
            second.node_by_id(name).map(|c| c.bounds())
        );
    }
    assert_eq!(render_svg(&first), render_svg(&second));
}

#[test]
fn svg_export_of_chain() {
    let svg = render_svg(&SceneBuilder::default().build(&chain(), |_| false));
    assert_eq!(svg.matches("<g class=\"node\"").count(), 3);
    assert_eq!(svg.matches("<g class=\"edge\"").count(), 2);
    assert!(svg.contains("<title>root\nnode</title>"));
    assert!(svg.contains("stroke=\"#0000ff\""));
}
