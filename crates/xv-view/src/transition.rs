//! Fold/unfold transitions between two scenes.
//!
//! The old scene is animated in place toward the new layout: edges vanish,
//! surviving nodes slide to their new centers and, when folding, absorbed
//! nodes fade out while sliding into the stand-in. Once the group finishes
//! the host replaces the old scene with the new one.

use crate::anim::{AnimationGroup, Property, PropertyAnimation};
use crate::config::AnimationConfig;
use kurbo::Vec2;
use xv_core::NodeId;
use xv_render::{CompositeKind, Scene};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Fold,
    Unfold,
}

/// Translation of one old-scene composite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
    pub target: usize,
    pub delta: Vec2,
}

/// What to animate in the old scene. All indices point into its composites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionPlan {
    pub hidden_edges: Vec<usize>,
    pub moves: Vec<Move>,
    /// Faded to zero opacity.
    pub fades: Vec<usize>,
}

fn is_still(delta: Vec2) -> bool {
    delta.hypot2() < 1e-12
}

/// Plan the transition from `old` to `new` after `stand_in` was folded or
/// unfolded.
#[must_use]
pub fn plan_transition(old: &Scene, new: &Scene, stand_in: NodeId, direction: Direction) -> TransitionPlan {
    let mut plan = TransitionPlan {
        hidden_edges: old
            .composites()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == CompositeKind::Edge)
            .map(|(i, _)| i)
            .collect(),
        ..TransitionPlan::default()
    };

    let mut push_move = |target: usize, delta: Vec2| {
        if !is_still(delta) {
            plan.moves.push(Move { target, delta });
        }
    };

    match direction {
        Direction::Fold => {
            let sink = new.node_by_id(stand_in).map(|c| c.center());
            let mut fades = Vec::new();
            for name in old.node_names() {
                let Some(i) = old.node_index(name) else { continue };
                let from = old.composites()[i].center();
                match new.node_by_id(name) {
                    Some(survivor) => push_move(i, survivor.center() - from),
                    None => {
                        fades.push(i);
                        if let Some(to) = sink {
                            push_move(i, to - from);
                        }
                    }
                }
            }
            plan.fades = fades;
        }
        Direction::Unfold => {
            // Nodes that only exist in the new scene appear when it is
            // swapped in.
            for name in new.node_names() {
                let (Some(i), Some(now)) = (old.node_index(name), new.node_by_id(name)) else {
                    continue;
                };
                push_move(i, now.center() - old.composites()[i].center());
            }
        }
    }

    log::debug!(
        "{direction:?} `{stand_in}`: {} moves, {} fades, {} edges hidden",
        plan.moves.len(),
        plan.fades.len(),
        plan.hidden_edges.len()
    );
    plan
}

impl TransitionPlan {
    /// Hide the planned edges in `old` and build the animation group that
    /// drives the rest.
    pub fn into_group(self, old: &mut Scene, config: &AnimationConfig) -> AnimationGroup {
        for &i in &self.hidden_edges {
            if let Some(edge) = old.composite_mut(i) {
                edge.visible = false;
            }
        }
        let duration = f64::from(config.duration_ms);
        let mut group = AnimationGroup::new();
        for Move { target, delta } in self.moves {
            let Some(from) = old.composites().get(target).map(|c| c.offset) else {
                continue;
            };
            group.add(PropertyAnimation::new(
                target,
                Property::Pos { from, to: from + delta },
                duration,
                config.easing,
            ));
        }
        for target in self.fades {
            let Some(from) = old.composites().get(target).map(|c| c.opacity) else {
                continue;
            };
            group.add(PropertyAnimation::new(
                target,
                Property::Opacity { from, to: 0.0 },
                duration,
                config.easing,
            ));
        }
        group
    }
}
