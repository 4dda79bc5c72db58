//! Hit testing: scene point → node lookup.
//!
//! Walks node composites top to bottom (highest Z first) and returns the
//! first visible one whose current bounds contain the point.

use crate::scene::{CompositeKind, Scene};
use kurbo::Point;
use xv_core::NodeId;

/// Find the topmost node at `p`. Returns `None` on background, edges and
/// cluster frames.
pub fn hit_test(scene: &Scene, p: Point) -> Option<NodeId> {
    scene
        .paint_order()
        .into_iter()
        .rev()
        .filter(|c| c.kind == CompositeKind::Node && c.is_shown())
        .find(|c| c.scene_bounds().contains(p))
        .and_then(|c| c.node)
}

/// Find the folded node whose toggle is at `p`.
pub fn hit_fold_toggle(scene: &Scene, p: Point) -> Option<NodeId> {
    scene
        .paint_order()
        .into_iter()
        .rev()
        .filter(|c| c.is_shown())
        .find(|c| c.toggle.is_some_and(|t| (t.rect + c.offset).contains(p)))
        .and_then(|c| c.node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneBuilder;
    use kurbo::Vec2;
    use xv_core::parse_dot;

    fn overlapping() -> Scene {
        let g = parse_dot(
            r#"digraph {
                bb="0,0,100,100";
                ht_under [_draw_="p 4 0 0 60 0 60 60 0 60 "];
                ht_over [_draw_="p 4 40 40 100 40 100 100 40 100 "];
            }"#,
        )
        .unwrap();
        SceneBuilder::default().build(&g, |id| id.as_str() == "ht_over")
    }

    #[test]
    fn topmost_node_wins() {
        let scene = overlapping();
        // Scene Y is flipped: layout (50, 50) is scene (50, 50).
        assert_eq!(hit_test(&scene, Point::new(50.0, 50.0)).map(|n| n.as_str()), Some("ht_over"));
        assert_eq!(hit_test(&scene, Point::new(10.0, 90.0)).map(|n| n.as_str()), Some("ht_under"));
        assert_eq!(hit_test(&scene, Point::new(90.0, 90.0)), None);
    }

    #[test]
    fn hidden_nodes_and_offsets() {
        let mut scene = overlapping();
        let over = scene.node_index(NodeId::intern("ht_over")).unwrap();
        scene.composite_mut(over).unwrap().opacity = 0.0;
        assert_eq!(hit_test(&scene, Point::new(50.0, 50.0)).map(|n| n.as_str()), Some("ht_under"));

        let c = scene.composite_mut(over).unwrap();
        c.opacity = 1.0;
        c.offset = Vec2::new(200.0, 0.0);
        assert_eq!(hit_test(&scene, Point::new(250.0, 30.0)).map(|n| n.as_str()), Some("ht_over"));
    }

    #[test]
    fn toggle_hits_only_folded_nodes() {
        let scene = overlapping();
        // ht_over's top-left corner in scene space is (40, 0).
        assert_eq!(
            hit_fold_toggle(&scene, Point::new(45.0, 5.0)).map(|n| n.as_str()),
            Some("ht_over")
        );
        assert_eq!(hit_fold_toggle(&scene, Point::new(5.0, 45.0)), None);
    }
}
