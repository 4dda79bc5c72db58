use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A drawing program that does not follow the xdot grammar.
    #[error("malformed drawing program at byte {offset}: {message}")]
    Malformed { offset: usize, message: String },

    /// An operation the scene cannot represent faithfully.
    #[error("unsupported: {0}")]
    Unsupported(String),
}
