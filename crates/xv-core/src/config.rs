//! Core configuration: which layout algorithm/format to run and how folded
//! stand-ins are marked.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Layout algorithm name passed to the engine (`dot`, `neato`, ...).
    pub algorithm: String,
    /// Render format; only `xdot*` formats produce drawing programs.
    pub format: String,
    /// Graphviz executable used by [`crate::process::DotProcess`].
    pub dot_binary: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            algorithm: "dot".into(),
            format: "xdot".into(),
            dot_binary: "dot".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldConfig {
    /// `shape` given to a folded stand-in.
    pub folded_shape: String,
    /// When false, fold toggles are not offered.
    pub enabled: bool,
}

impl Default for FoldConfig {
    fn default() -> Self {
        Self {
            folded_shape: "folder".into(),
            enabled: true,
        }
    }
}
