pub mod color;
pub mod error;
pub mod hit;
pub mod interp;
pub mod item;
pub mod paint;
pub mod scene;
pub mod svg;
pub mod xdot;

pub use color::{Rgba, parse_color};
pub use error::RenderError;
pub use hit::{hit_fold_toggle, hit_test};
pub use interp::{Channels, Interpretation, Interpreter, InterpreterConfig};
pub use item::{DashStyle, FontSpec, Item, Paint, Pen, Primitive};
pub use paint::paint_scene;
pub use scene::{Composite, CompositeKind, FoldToggle, Scene, SceneBuilder, SceneConfig};
pub use svg::render_svg;
pub use xdot::{DrawOp, parse_xdot};

// Re-export kurbo geometry so downstream crates share one version
pub use kurbo::{Point, Rect, Vec2};
