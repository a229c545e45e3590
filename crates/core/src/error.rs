//! Error types shared by every u-layout crate.

use thiserror::Error;

/// Errors produced by extraction, graph loading and layout sessions.
#[derive(Debug, Error)]
pub enum Error {
    /// A dump record is internally inconsistent (duplicate ids, dangling references).
    #[error("Invalid dump: {0}")]
    InvalidDump(String),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced item id does not exist.
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// Items left without constraints after every extraction pass.
    #[error("Unanchored items: {}", .0.join(", "))]
    Unanchored(Vec<String>),

    /// The external search service failed.
    #[error("Search service failed: {0}")]
    Search(String),

    /// The external solver failed.
    #[error("Solver failed: {0}")]
    Solver(String),

    /// A layout index outside the current search results.
    #[error("Layout index {index} out of range ({len} results)")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of available results.
        len: usize,
    },

    /// An operation needs search results but none are stored.
    #[error("No search results available")]
    NoSearchResults,

    /// An operation needs a target room but the session has none.
    #[error("No target room set")]
    NoTargetRoom,

    /// The session was disposed.
    #[error("Session has been disposed")]
    SessionDisposed,

    /// Another top-level session operation is still running.
    #[error("Operation '{0}' is already in flight")]
    OperationInFlight(&'static str),

    /// The session was cleared or disposed while the operation was running.
    #[error("Operation superseded by a newer session generation")]
    Superseded,

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true for failures of external collaborators (search, solver),
    /// which callers may retry without touching session state.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Search(_) | Self::Solver(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unanchored_message_lists_ids() {
        let err = Error::Unanchored(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Unanchored items: a, b");
    }

    #[test]
    fn test_is_external() {
        assert!(Error::Search("timeout".into()).is_external());
        assert!(Error::Solver("diverged".into()).is_external());
        assert!(!Error::SessionDisposed.is_external());
    }

    #[test]
    fn test_from_serde_error() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
