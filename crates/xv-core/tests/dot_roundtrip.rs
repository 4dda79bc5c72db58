//! Integration tests: parse → emit → re-parse, and merging engine output.

use pretty_assertions::assert_eq;
use xv_core::emitter::emit_dot;
use xv_core::model::BoundingBox;
use xv_core::parser::parse_dot;
use xv_core::process::merge_attrs;

fn assert_roundtrip_preserves(input: &str) {
    let g1 = parse_dot(input).expect("first parse failed");
    let emitted = emit_dot(&g1);
    let g2 = parse_dot(&emitted).expect("re-parse failed");

    assert_eq!(g1.node_ids(), g2.node_ids(), "node order changed.\nEmitted:\n{emitted}");
    assert_eq!(g1.edge_count(), g2.edge_count());
    assert_eq!(g1.attrs, g2.attrs);
    assert_eq!(g1.node_defaults, g2.node_defaults);
    assert_eq!(g1.edge_defaults, g2.edge_defaults);
    assert_eq!(g1.subgraphs, g2.subgraphs);
    for (a, b) in g1.node_indices().into_iter().zip(g2.node_indices()) {
        assert_eq!(g1.node(a).attrs, g2.node(b).attrs);
    }
    for (a, b) in g1.edge_indices().into_iter().zip(g2.edge_indices()) {
        assert_eq!(g1.endpoints(a), g2.endpoints(b));
        assert_eq!(g1.edge(a).attrs, g2.edge(b).attrs);
        assert_eq!(g1.edge(a).key, g2.edge(b).key);
    }
}

#[test]
fn roundtrip_chain() {
    assert_roundtrip_preserves(include_str!("fixtures/chain.gv"));
}

#[test]
fn roundtrip_process_tree() {
    assert_roundtrip_preserves(include_str!("fixtures/process_tree.gv"));
}

#[test]
fn roundtrip_graphviz_output() {
    assert_roundtrip_preserves(include_str!("fixtures/chain_laid_out.xdot"));
}

#[test]
fn graphviz_output_parses_with_drawing_programs() {
    let g = parse_dot(include_str!("fixtures/chain_laid_out.xdot")).unwrap();
    assert_eq!(g.node_count(), 3);
    let bb = BoundingBox::parse(g.graph_attr("bb")).unwrap();
    assert_eq!((bb.width(), bb.height()), (54.0, 180.0));
    let a = g.find("A").unwrap();
    assert_eq!(g.node_attr(a, "_draw_"), "c 7 -#000000 e 27 162 27 18 ");
    assert_eq!(g.node_attr(a, "label"), "\\N");
    assert_eq!(g.node_attr(a, "tooltip"), "root\\nnode");
}

#[test]
fn merge_engine_output_into_source_graph() {
    let mut g = parse_dot(include_str!("fixtures/chain.gv")).unwrap();
    let out = parse_dot(include_str!("fixtures/chain_laid_out.xdot")).unwrap();
    merge_attrs(&mut g, &out);

    assert_eq!(g.graph_attr("bb"), "0,0,54,180");
    let b = g.find("B").unwrap();
    assert_eq!(g.node_attr(b, "pos"), "27,90");
    assert_eq!(g.node_attr(b, "color"), "blue");
    for e in g.edge_indices() {
        assert!(g.edge_attr(e, "_hdraw_").starts_with("S 5 -solid"));
    }
}
