//! View configuration, read from JSON.
//!
//! ```json
//! {
//!   "layout": { "algorithm": "dot", "format": "xdot" },
//!   "fold": { "folded_shape": "folder" },
//!   "animation": { "duration_ms": 400, "easing": "ease_in_out" },
//!   "truecolor": true,
//!   "image_path": "/usr/share/icons:/srv/icons"
//! }
//! ```
//!
//! Every section and field is optional.

use crate::anim::Easing;
use crate::error::ViewError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use xv_core::{FoldConfig, LayoutConfig};
use xv_render::SceneConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// When false, fold results replace the scene at once.
    pub enabled: bool,
    pub duration_ms: u32,
    pub easing: Easing,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: 400,
            easing: Easing::EaseInOut,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub layout: LayoutConfig,
    pub fold: FoldConfig,
    pub animation: AnimationConfig,
    /// Overrides the root graph's `truecolor`.
    pub truecolor: Option<bool>,
    /// Overrides the root graph's `imagepath`; same list syntax as `PATH`.
    pub image_path: Option<String>,
}

impl ViewConfig {
    pub fn from_json(json: &str) -> Result<Self, ViewError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ViewError> {
        let json = std::fs::read_to_string(path).map_err(|source| ViewError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Settings for the scene builder.
    pub fn scene_config(&self) -> SceneConfig {
        SceneConfig {
            truecolor: self.truecolor,
            image_path: self
                .image_path
                .as_deref()
                .map(|list| std::env::split_paths(list).filter(|p| !p.as_os_str().is_empty()).collect()),
            fold_toggles: self.fold.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn empty_json_is_default() {
        let cfg = ViewConfig::from_json("{}").unwrap();
        assert_eq!(cfg, ViewConfig::default());
        assert_eq!(cfg.animation.duration_ms, 400);
        assert_eq!(cfg.scene_config().image_path, None);
    }

    #[test]
    fn partial_sections() {
        let cfg = ViewConfig::from_json(
            r#"{
                "layout": { "algorithm": "neato" },
                "fold": { "enabled": false },
                "animation": { "duration_ms": 120, "easing": { "cubic_bezier": [0.4, 0.0, 0.2, 1.0] } },
                "truecolor": true,
                "image_path": "/srv/icons"
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.layout.algorithm, "neato");
        assert_eq!(cfg.layout.format, "xdot");
        assert_eq!(cfg.animation.duration_ms, 120);
        assert_eq!(cfg.animation.easing, Easing::CubicBezier(0.4, 0.0, 0.2, 1.0));
        let scene = cfg.scene_config();
        assert_eq!(scene.truecolor, Some(true));
        assert!(!scene.fold_toggles);
        assert_eq!(scene.image_path, Some(vec![PathBuf::from("/srv/icons")]));
    }

    #[test]
    fn bad_json_is_a_config_error() {
        assert!(matches!(ViewConfig::from_json("{ nope"), Err(ViewError::Config(_))));
        assert!(matches!(
            ViewConfig::load(Path::new("/no/such/xv-view.json")),
            Err(ViewError::Io { .. })
        ));
    }
}
