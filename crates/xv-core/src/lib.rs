pub mod config;
pub mod emitter;
pub mod error;
pub mod fold;
pub mod id;
pub mod layered;
pub mod layout;
pub mod model;
pub mod parser;
pub mod process;
pub mod session;

pub use config::{FoldConfig, LayoutConfig};
pub use emitter::emit_dot;
pub use error::{Error, ErrorReport, MAX_ERRORS};
pub use fold::{FoldOutcome, Side, SideBuffer};
pub use id::NodeId;
pub use layered::LayeredLayout;
pub use layout::{DRAW_CHANNELS, LayoutEngine, LayoutSession, clear_layout};
pub use model::*;
pub use parser::parse_dot;
pub use process::DotProcess;
pub use session::{GraphSession, Toggle};

// Re-export petgraph index types so downstream crates don't need a direct dependency
pub use petgraph::stable_graph::{EdgeIndex, NodeIndex};
