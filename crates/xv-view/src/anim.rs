//! Property animations driven by a cooperative tick loop.
//!
//! An [`AnimationGroup`] runs its [`PropertyAnimation`]s in parallel against
//! the composites of one [`Scene`]. The host calls [`AnimationGroup::tick`]
//! with the elapsed milliseconds until it reports completion.

use kurbo::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use xv_render::Scene;

// ─── Easing ──────────────────────────────────────────────────────────────

/// Easing function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
    /// CSS-style `cubic-bezier(x1, y1, x2, y2)`.
    CubicBezier(f64, f64, f64, f64),
}

impl Easing {
    /// Map linear progress `t` in `[0, 1]` to eased progress.
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t * t,
            Easing::EaseOut => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier(x1, y1, x2, y2, t),
        }
    }
}

/// One coordinate of a cubic Bézier with endpoints 0 and 1.
fn bezier_coord(a: f64, b: f64, s: f64) -> f64 {
    let u = 1.0 - s;
    3.0 * u * u * s * a + 3.0 * u * s * s * b + s * s * s
}

/// Solve x(s) = t by bisection, then evaluate y(s).
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, t: f64) -> f64 {
    let (mut lo, mut hi) = (0.0, 1.0);
    let mut s = t;
    for _ in 0..48 {
        let x = bezier_coord(x1, x2, s);
        if (x - t).abs() < 1e-7 {
            break;
        }
        if x < t {
            lo = s;
        } else {
            hi = s;
        }
        s = (lo + hi) / 2.0;
    }
    bezier_coord(y1, y2, s)
}

// ─── Property animation ──────────────────────────────────────────────────

/// The animatable properties of a composite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Property {
    /// Translation on top of the composite's geometry.
    Pos { from: Vec2, to: Vec2 },
    Opacity { from: f64, to: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAnimation {
    /// Index into [`Scene::composites`].
    pub target: usize,
    pub property: Property,
    pub duration_ms: f64,
    pub easing: Easing,
    elapsed_ms: f64,
    finished: bool,
}

impl PropertyAnimation {
    pub fn new(target: usize, property: Property, duration_ms: f64, easing: Easing) -> Self {
        Self {
            target,
            property,
            duration_ms,
            easing,
            elapsed_ms: 0.0,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.duration_ms <= 0.0 {
            1.0
        } else {
            (self.elapsed_ms / self.duration_ms).min(1.0)
        }
    }

    fn advance(&mut self, dt_ms: f64, scene: &mut Scene) {
        self.elapsed_ms += dt_ms.max(0.0);
        let t = self.progress();
        self.write(scene, self.easing.apply(t));
        self.finished = t >= 1.0;
    }

    fn write(&self, scene: &mut Scene, k: f64) {
        let Some(composite) = scene.composite_mut(self.target) else {
            log::debug!("animation target {} is not in the scene", self.target);
            return;
        };
        match self.property {
            Property::Pos { from, to } => composite.offset = from.lerp(to, k),
            Property::Opacity { from, to } => composite.opacity = from + (to - from) * k,
        }
    }
}

// ─── Group ───────────────────────────────────────────────────────────────

type PropertyCallback = Box<dyn FnMut(&PropertyAnimation)>;
type FinishedCallback = Box<dyn FnMut()>;

/// Parallel property animations with completion callbacks: one per property
/// as it finishes, one when the whole group has.
#[derive(Default)]
pub struct AnimationGroup {
    animations: Vec<PropertyAnimation>,
    on_property_finished: Option<PropertyCallback>,
    on_finished: Option<FinishedCallback>,
    done: bool,
}

impl fmt::Debug for AnimationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationGroup")
            .field("animations", &self.animations)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl AnimationGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, animation: PropertyAnimation) {
        self.animations.push(animation);
    }

    pub fn animations(&self) -> &[PropertyAnimation] {
        &self.animations
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn on_property_finished(&mut self, callback: impl FnMut(&PropertyAnimation) + 'static) {
        self.on_property_finished = Some(Box::new(callback));
    }

    pub fn on_finished(&mut self, callback: impl FnMut() + 'static) {
        self.on_finished = Some(Box::new(callback));
    }

    pub fn is_finished(&self) -> bool {
        self.done
    }

    /// Advance every running animation by `dt_ms` and write the new values
    /// into `scene`. Returns true once the group has finished; an empty
    /// group finishes on its first tick.
    pub fn tick(&mut self, dt_ms: f64, scene: &mut Scene) -> bool {
        if self.done {
            return true;
        }
        let Self {
            animations,
            on_property_finished,
            ..
        } = self;
        for anim in animations.iter_mut().filter(|a| !a.finished) {
            anim.advance(dt_ms, scene);
            if anim.finished {
                if let Some(callback) = on_property_finished.as_mut() {
                    callback(anim);
                }
            }
        }
        if self.animations.iter().all(PropertyAnimation::is_finished) {
            self.done = true;
            if let Some(callback) = self.on_finished.as_mut() {
                callback();
            }
        }
        self.done
    }

    /// Jump every animation to its end value.
    pub fn finish(&mut self, scene: &mut Scene) {
        self.tick(f64::INFINITY, scene);
    }
}
