//! Error types for pkgtree-core.

use miette::Diagnostic;
use pkgtree_config::error::ConfigError;
use pkgtree_utils::error::{FileSystemError, PathError};
use thiserror::Error;

/// Core error type for repository construction and mutation.
///
/// Queries about absent data never produce one of these; they answer with
/// `false`, an empty iterator or `None`.
#[derive(Error, Diagnostic, Debug)]
pub enum RepositoryError {
    #[error("Malformed {kind} '{value}': {reason}")]
    #[diagnostic(
        code(pkgtree::malformed_name),
        help("Names may contain letters, digits and `+_.-`, and must not start with `-` or `.`")
    )]
    MalformedName {
        kind: &'static str,
        value: String,
        reason: String,
    },

    #[error("Malformed version '{value}': {reason}")]
    #[diagnostic(
        code(pkgtree::malformed_version),
        help("Versions look like 1.2.3b_alpha4_p5-r6")
    )]
    MalformedVersion { value: String, reason: String },

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(pkgtree::invalid_argument))]
    InvalidArgument(String),

    #[error("Duplicate repository name: {0}")]
    #[diagnostic(
        code(pkgtree::duplicate_repo),
        help("Each repository in a database must have a unique name")
    )]
    DuplicateRepositoryName(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(pkgtree::filesystem))]
    FileSystemError(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(pkgtree::path))]
    PathError(#[from] PathError),

    #[error("Error while {action}")]
    #[diagnostic(code(pkgtree::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(pkgtree::regex))]
    RegexError(#[from] regex::Error),

    #[error("Sync of {repository} failed")]
    #[diagnostic(
        code(pkgtree::sync),
        help("Check the repository's sync_uri and your network connection")
    )]
    Sync {
        repository: String,
        #[source]
        source: Box<RepositoryError>,
    },

    #[error("Merge failed: {0}")]
    #[diagnostic(code(pkgtree::merge))]
    Merge(String),
}

impl RepositoryError {
    pub(crate) fn malformed_name(
        kind: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedName {
            kind,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_version(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedVersion {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Converts parse failures into [`RepositoryError::InvalidArgument`],
    /// keeping every other error as is.
    pub fn into_invalid_argument(self) -> Self {
        match self {
            Self::MalformedName { .. } | Self::MalformedVersion { .. } => {
                Self::InvalidArgument(self.to_string())
            }
            other => other,
        }
    }
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, RepositoryError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, RepositoryError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            RepositoryError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
