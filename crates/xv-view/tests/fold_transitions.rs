//! Integration tests: fold → relayout → rebuild → animate → swap.

use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;
use xv_core::{GraphSession, LayeredLayout, NodeId};
use xv_render::{SceneBuilder, render_svg};
use xv_view::{GraphView, ViewConfig, ViewEvent};

const TREE: &str = include_str!("fixtures/tree.gv");

fn loaded() -> GraphView {
    let config = ViewConfig::default();
    let session = GraphSession::from_source(
        TREE,
        Box::new(LayeredLayout::default()),
        config.layout.clone(),
        &config.fold,
    )
    .expect("fixture parses");
    let mut view = GraphView::new(session, config);
    view.load(TREE).expect("fixture lays out");
    view
}

#[test]
fn absorbed_nodes_fade_out_during_fold() {
    let mut view = loaded();
    let before: Vec<NodeId> = view.active_scene().unwrap().node_names();
    let pending = view.fold("right").unwrap().unwrap();
    let gone: Vec<NodeId> = before
        .iter()
        .copied()
        .filter(|n| pending.node_by_id(*n).is_none())
        .collect();
    assert!(!gone.is_empty());

    // Halfway through, absorbed nodes are half faded.
    let duration = f64::from(view.config().animation.duration_ms);
    assert!(view.tick(duration / 2.0));
    let active = view.active_scene().unwrap();
    for name in &gone {
        let c = active.node_by_id(*name).unwrap();
        assert!(c.opacity > 0.0 && c.opacity < 1.0, "{name}: {}", c.opacity);
    }

    // The second half ends the transition and swaps in the folded scene.
    assert!(!view.tick(duration / 2.0));
    let active = view.active_scene().unwrap();
    assert!(active.node("right").unwrap().toggle.is_some());
    for name in &gone {
        assert!(active.node_by_id(*name).is_none());
    }
}

#[test]
fn swapped_scene_matches_a_fresh_build() {
    let mut view = loaded();
    view.fold("left").unwrap();
    view.finish_transition();
    let fresh = SceneBuilder::new(view.config().scene_config()).build_session(view.session());
    assert_eq!(render_svg(view.active_scene().unwrap()), render_svg(&fresh));
}

#[test]
fn fold_unfold_restores_the_node_set() {
    let mut view = loaded();
    let events = Rc::new(RefCell::new(Vec::new()));
    let log = events.clone();
    view.subscribe(move |e| log.borrow_mut().push(e.clone()));

    let names = |v: &GraphView| {
        let mut n: Vec<String> = v
            .active_scene()
            .unwrap()
            .node_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        n.sort();
        n
    };
    let before = names(&view);
    view.fold("root").unwrap();
    view.finish_transition();
    assert_eq!(names(&view), vec!["lonely".to_string(), "root".to_string()]);

    view.unfold("root").unwrap();
    while view.tick(16.0) {}
    assert_eq!(names(&view), before);
    assert_eq!(
        *events.borrow(),
        vec![
            ViewEvent::BuildCompleted,
            ViewEvent::TransitionFinished,
            ViewEvent::BuildCompleted,
            ViewEvent::TransitionFinished,
        ]
    );
}
