//! Hosting view: owns the session, the active scene and any running
//! fold transition.
//!
//! - **Build**: the session's laid-out graph becomes a fresh [`Scene`];
//!   observers get [`ViewEvent::BuildCompleted`].
//! - **Fold/unfold**: the session folds and relays out, the new scene is
//!   built and held as *pending* while the active (old) scene animates
//!   toward it. The host drives the animation with [`GraphView::tick`];
//!   when it finishes the pending scene becomes active.
//! - **Errors** are returned and also broadcast as
//!   [`ViewEvent::ErrorMessage`].

use crate::anim::AnimationGroup;
use crate::config::ViewConfig;
use crate::error::ViewError;
use crate::transition::{Direction, plan_transition};
use kurbo::Point;
use xv_core::{Error, GraphSession, NodeId, Toggle};
use xv_render::{Scene, SceneBuilder, hit_fold_toggle, hit_test};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    BuildCompleted,
    /// The layout algorithm changed to the given one.
    ReloadLayout(String),
    ErrorMessage(String),
    TransitionFinished,
}

type Observer = Box<dyn FnMut(&ViewEvent)>;

struct Transition {
    pending: Scene,
    group: AnimationGroup,
}

pub struct GraphView {
    session: GraphSession,
    config: ViewConfig,
    builder: SceneBuilder,
    scene: Option<Scene>,
    transition: Option<Transition>,
    observers: Vec<Observer>,
}

impl GraphView {
    pub fn new(session: GraphSession, config: ViewConfig) -> Self {
        let builder = SceneBuilder::new(config.scene_config());
        Self {
            session,
            config,
            builder,
            scene: None,
            transition: None,
            observers: Vec::new(),
        }
    }

    pub fn session(&self) -> &GraphSession {
        &self.session
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ViewEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self, event: ViewEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    /// Broadcast `error` and return it.
    fn fail<T>(&mut self, error: impl Into<ViewError>) -> Result<T, ViewError> {
        let error = error.into();
        log::warn!("{error}");
        self.notify(ViewEvent::ErrorMessage(error.to_string()));
        Err(error)
    }

    /// The scene on screen. While a transition runs this is the old scene
    /// being animated.
    pub fn active_scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// The scene that becomes active when the running transition ends.
    pub fn pending_scene(&self) -> Option<&Scene> {
        self.transition.as_ref().map(|t| &t.pending)
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    // ─── Building ────────────────────────────────────────────────────────

    /// Replace the graph with `source`, lay it out and build its scene.
    pub fn load(&mut self, source: &str) -> Result<&Scene, ViewError> {
        self.transition = None;
        if let Err(e) = self.session.reload(source) {
            return self.fail(e);
        }
        self.scene = None;
        if let Err(e) = self.session.layout_and_render() {
            return self.fail(e);
        }
        Ok(self.build())
    }

    /// Rebuild the active scene from the session's current graph.
    pub fn build(&mut self) -> &Scene {
        self.transition = None;
        let scene = self.builder.build_session(&self.session);
        self.notify(ViewEvent::BuildCompleted);
        self.scene.insert(scene)
    }

    /// Lay the graph out again with `algorithm` and rebuild.
    pub fn set_layout_kind(&mut self, algorithm: &str) -> Result<&Scene, ViewError> {
        self.finish_transition();
        if let Err(e) = self.session.relayout_with(algorithm) {
            return self.fail(e);
        }
        self.notify(ViewEvent::ReloadLayout(algorithm.to_string()));
        Ok(self.build())
    }

    // ─── Folding ─────────────────────────────────────────────────────────

    /// Fold `name`. Returns the scene the view is transitioning to, or
    /// `None` when `name` has nothing to fold.
    pub fn fold(&mut self, name: &str) -> Result<Option<&Scene>, ViewError> {
        self.change(name, GraphSession::fold)
    }

    pub fn unfold(&mut self, name: &str) -> Result<Option<&Scene>, ViewError> {
        self.change(name, GraphSession::unfold)
    }

    pub fn toggle(&mut self, name: &str) -> Result<Option<&Scene>, ViewError> {
        self.change(name, GraphSession::toggle_fold)
    }

    /// Toggle the fold of whatever is under `p`: a fold toggle, or else
    /// the topmost node. Does nothing when folding is disabled.
    pub fn toggle_at(&mut self, p: Point) -> Result<Option<&Scene>, ViewError> {
        if !self.config.fold.enabled {
            return Ok(None);
        }
        let Some(scene) = self.scene.as_ref() else {
            return self.fail(ViewError::NoScene);
        };
        let Some(id) = hit_fold_toggle(scene, p).or_else(|| hit_test(scene, p)) else {
            return Ok(None);
        };
        self.toggle(id.as_str())
    }

    fn change(
        &mut self,
        name: &str,
        op: impl FnOnce(&mut GraphSession, &str) -> Result<Toggle, Error>,
    ) -> Result<Option<&Scene>, ViewError> {
        self.finish_transition();
        if self.scene.is_none() {
            return self.fail(ViewError::NoScene);
        }
        let direction = match op(&mut self.session, name) {
            Ok(Toggle::Folded { absorbed }) => {
                log::debug!("folded `{name}`: {} nodes absorbed", absorbed.len());
                Direction::Fold
            }
            Ok(Toggle::Unfolded { restored }) => {
                log::debug!("unfolded `{name}`: {} nodes restored", restored.len());
                Direction::Unfold
            }
            Ok(Toggle::NoOp) => return Ok(None),
            Err(e) => return self.fail(e),
        };
        let new = self.builder.build_session(&self.session);
        self.notify(ViewEvent::BuildCompleted);

        let old = self.scene.take();
        match old {
            Some(mut old) if self.config.animation.enabled => {
                let stand_in = NodeId::intern(name);
                let group =
                    plan_transition(&old, &new, stand_in, direction).into_group(&mut old, &self.config.animation);
                self.scene = Some(old);
                self.transition = Some(Transition { pending: new, group });
                Ok(self.pending_scene())
            }
            _ => {
                self.scene = Some(new);
                Ok(self.scene.as_ref())
            }
        }
    }

    // ─── Animation ───────────────────────────────────────────────────────

    /// Advance the running transition by `dt_ms`. Returns true while it is
    /// still running.
    pub fn tick(&mut self, dt_ms: f64) -> bool {
        let (Some(transition), Some(scene)) = (self.transition.as_mut(), self.scene.as_mut()) else {
            return false;
        };
        if transition.group.tick(dt_ms, scene) {
            self.complete_transition();
            return false;
        }
        true
    }

    /// Jump a running transition to its end.
    pub fn finish_transition(&mut self) {
        if let (Some(transition), Some(scene)) = (self.transition.as_mut(), self.scene.as_mut()) {
            transition.group.finish(scene);
            self.complete_transition();
        }
    }

    /// Swap in the pending scene and drop the animated one.
    fn complete_transition(&mut self) {
        if let Some(transition) = self.transition.take() {
            self.scene = Some(transition.pending);
            self.notify(ViewEvent::TransitionFinished);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnimationConfig;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use xv_core::LayeredLayout;

    fn view(src: &str, config: ViewConfig) -> (GraphView, Rc<RefCell<Vec<ViewEvent>>>) {
        let session = GraphSession::from_source(
            src,
            Box::new(LayeredLayout::default()),
            config.layout.clone(),
            &config.fold,
        )
        .unwrap();
        let mut view = GraphView::new(session, config);
        let events = Rc::new(RefCell::new(Vec::new()));
        let log = events.clone();
        view.subscribe(move |e| log.borrow_mut().push(e.clone()));
        (view, events)
    }

    #[test]
    fn load_builds_and_notifies() {
        let (mut view, events) = view("digraph {}", ViewConfig::default());
        let scene = view.load("digraph { vl_a -> vl_b }").unwrap();
        assert_eq!(scene.node_count(), 2);
        assert_eq!(*events.borrow(), vec![ViewEvent::BuildCompleted]);
        assert!(!view.is_animating());
    }

    #[test]
    fn fold_animates_then_swaps_scenes() {
        let (mut view, events) = view("digraph { vf_a -> vf_b -> vf_c }", ViewConfig::default());
        view.load("digraph { vf_a -> vf_b -> vf_c }").unwrap();
        events.borrow_mut().clear();

        let pending = view.fold("vf_a").unwrap().unwrap();
        assert_eq!(pending.node_count(), 1);
        assert!(view.is_animating());
        // Edges of the animated scene are hidden right away.
        let active = view.active_scene().unwrap();
        assert_eq!(active.node_count(), 3);
        assert!(
            active
                .composites()
                .iter()
                .filter(|c| c.kind == xv_render::CompositeKind::Edge)
                .all(|c| !c.visible)
        );

        assert!(view.tick(100.0));
        assert!(view.tick(100.0));
        assert!(!view.tick(250.0));
        assert!(!view.is_animating());
        assert_eq!(view.active_scene().unwrap().node_count(), 1);
        assert!(view.pending_scene().is_none());
        assert_eq!(
            *events.borrow(),
            vec![ViewEvent::BuildCompleted, ViewEvent::TransitionFinished]
        );
    }

    #[test]
    fn fold_without_animation_swaps_at_once() {
        let config = ViewConfig {
            animation: AnimationConfig {
                enabled: false,
                ..AnimationConfig::default()
            },
            ..ViewConfig::default()
        };
        let (mut view, _) = view("digraph { vn_a -> vn_b }", config);
        view.load("digraph { vn_a -> vn_b }").unwrap();
        assert_eq!(view.fold("vn_a").unwrap().unwrap().node_count(), 1);
        assert!(!view.is_animating());
        assert_eq!(view.unfold("vn_a").unwrap().unwrap().node_count(), 2);
    }

    #[test]
    fn leaf_fold_is_a_noop_and_errors_are_broadcast() {
        let (mut view, events) = view("digraph { ve_a -> ve_b }", ViewConfig::default());
        assert!(matches!(view.fold("ve_a"), Err(ViewError::NoScene)));
        view.load("digraph { ve_a -> ve_b }").unwrap();
        events.borrow_mut().clear();

        assert!(view.fold("ve_b").unwrap().is_none());
        assert!(matches!(view.fold("ve_nope"), Err(ViewError::Core(Error::NodeNotFound(_)))));
        assert_eq!(
            *events.borrow(),
            vec![ViewEvent::ErrorMessage("node `ve_nope` not found".into())]
        );
    }

    #[test]
    fn toggle_at_hits_nodes_and_toggles() {
        let (mut view, _) = view("digraph { vt_a -> vt_b }", ViewConfig::default());
        view.load("digraph { vt_a -> vt_b }").unwrap();
        let center = view.active_scene().unwrap().node("vt_a").unwrap().center();

        assert!(view.toggle_at(Point::new(-100.0, -100.0)).unwrap().is_none());
        assert!(view.toggle_at(center).unwrap().is_some());
        view.finish_transition();
        assert!(view.session().is_folded(NodeId::intern("vt_a")));

        let toggle = view.active_scene().unwrap().node("vt_a").unwrap().toggle.unwrap();
        view.toggle_at(toggle.rect.center()).unwrap();
        view.finish_transition();
        assert!(!view.session().is_folded(NodeId::intern("vt_a")));
    }

    #[test]
    fn toggle_at_respects_disabled_folding() {
        let mut config = ViewConfig::default();
        config.fold.enabled = false;
        let (mut view, _) = view("digraph { vd_a -> vd_b }", config);
        view.load("digraph { vd_a -> vd_b }").unwrap();
        let center = view.active_scene().unwrap().node("vd_a").unwrap().center();
        assert!(view.toggle_at(center).unwrap().is_none());
        assert!(!view.session().is_folded(NodeId::intern("vd_a")));
    }

    #[test]
    fn set_layout_kind_reports_the_algorithm() {
        let (mut view, events) = view("digraph { vk_a -> vk_b }", ViewConfig::default());
        view.load("digraph { vk_a -> vk_b }").unwrap();
        events.borrow_mut().clear();
        view.set_layout_kind("neato").unwrap();
        assert_eq!(view.session().layout_config().algorithm, "neato");
        assert_eq!(
            *events.borrow(),
            vec![ViewEvent::ReloadLayout("neato".into()), ViewEvent::BuildCompleted]
        );
    }

    #[test]
    fn bad_source_is_reported() {
        let (mut view, events) = view("digraph {}", ViewConfig::default());
        assert!(view.load("digraph {").is_err());
        assert!(matches!(events.borrow().as_slice(), [ViewEvent::ErrorMessage(_)]));
    }
}
