//! Error taxonomy and the per-operation error-accumulation buffer.

use thiserror::Error;

/// Errors surfaced by the graph store, the folding engine and the layout
/// adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed DOT source.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("node `{0}` not found")]
    NodeNotFound(String),

    /// `fold` called on a node whose subtree is already in the side buffer.
    #[error("node `{0}` is already folded")]
    AlreadyFolded(String),

    /// `unfold` called on a node that is currently expanded.
    #[error("node `{0}` is not folded")]
    NotFolded(String),

    #[error("layout `{algorithm}` failed: {message}")]
    Layout { algorithm: String, message: String },

    #[error("render `{format}` failed: {message}")]
    Render { format: String, message: String },

    #[error("free layout failed: {0}")]
    FreeLayout(String),

    /// `repeat_operations` called before any layout was run.
    #[error("no layout has been run yet")]
    NoLayout,

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// Maximum number of messages kept by an [`ErrorReport`].
pub const MAX_ERRORS: usize = 10;

/// Collects engine diagnostics raised during one operation and surfaces
/// them to the user as a single aggregated message.
#[derive(Debug, Clone, Default)]
pub struct ErrorReport {
    messages: Vec<String>,
    dropped: usize,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message. Beyond [`MAX_ERRORS`] messages are only counted.
    pub fn push(&mut self, message: impl Into<String>) {
        if self.messages.len() < MAX_ERRORS {
            self.messages.push(message.into());
        } else {
            self.dropped += 1;
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.dropped = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Number of messages that did not fit in the buffer.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Join `headline` and the collected messages into one user-facing text.
    pub fn aggregate(&self, headline: &str) -> String {
        let mut out = String::from(headline);
        for m in &self.messages {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(m);
        }
        if self.dropped > 0 {
            out.push_str(&format!("\n(+{} more)", self.dropped));
        }
        out
    }

    /// Run `worker` with a cleared buffer.
    ///
    /// Returns `Ok` only when the worker succeeded *and* nothing was
    /// collected; otherwise one aggregated message.
    pub fn run_with_error_report<T>(
        &mut self,
        worker: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, String> {
        self.clear();
        match worker(self) {
            Ok(value) if self.is_empty() => Ok(value),
            Ok(_) => Err(self.aggregate("")),
            Err(e) => Err(self.aggregate(&e.to_string())),
        }
    }
}
