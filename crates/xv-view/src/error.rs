use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Core(#[from] xv_core::Error),

    #[error("invalid view configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("cannot read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// `fold` or `toggle_at` before anything was built.
    #[error("no scene has been built yet")]
    NoScene,
}
