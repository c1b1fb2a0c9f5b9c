use std::error::Error as StdError;
use std::path::PathBuf;

/// Common error type for `contrib_core` and the source adapters.
///
/// Transport failures should preserve the underlying error chain via `Error::backend`;
/// adapters decide per page whether a `Backend` error is swallowed or propagated.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid config for {section}: {field} {reason}")]
    Config {
        section: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("{section}: {message}")]
    Precondition {
        section: &'static str,
        message: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("backend error: {0}")]
    BackendMessage(String),

    #[error("malformed upstream payload: {context}")]
    Decode {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("snapshot {}: {reason}", path.display())]
    Snapshot {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },
}

impl Error {
    #[tracing::instrument(level = "debug", name = "contrib.error.backend", skip(source))]
    pub fn backend(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Convenience: wrap any error into `Backend` with "reqwest" context.
    pub fn backend_reqwest(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Backend {
            context: "reqwest".into(),
            source: Box::new(source),
        }
    }

    pub fn decode(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Decode {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn missing(section: &'static str, field: &'static str) -> Self {
        Self::Config {
            section,
            field,
            reason: "is required".to_string(),
        }
    }

    pub fn snapshot(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Snapshot {
            path: path.into(),
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether a page-level fetch may swallow this error and continue with an empty page.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::BackendMessage(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
