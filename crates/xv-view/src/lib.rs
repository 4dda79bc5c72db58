pub mod anim;
pub mod config;
pub mod error;
pub mod transition;
pub mod view;

pub use anim::{AnimationGroup, Easing, Property, PropertyAnimation};
pub use config::{AnimationConfig, ViewConfig};
pub use error::ViewError;
pub use transition::{Direction, Move, TransitionPlan, plan_transition};
pub use view::{GraphView, ViewEvent};
