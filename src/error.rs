use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = BumpError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BumpError {
    #[error("Malformed version '{version}': expected MAJOR.MINOR.PATCH")]
    MalformedVersion { version: String },

    #[error("Failed to parse '{}'", path.display())]
    DocumentParse {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },

    #[error("I/O error on '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Git query failed: {context}")]
    Git {
        context: String,
        #[source]
        source: git2::Error,
    },

    #[error("Invalid ignore pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to walk repository tree")]
    Walk(#[from] walkdir::Error),
}

impl BumpError {
    pub(crate) fn git(context: impl Into<String>, source: git2::Error) -> Self {
        BumpError::Git { context: context.into(), source }
    }

    /// Errors that invalidate every downstream decision abort the whole run.
    /// Everything else only skips the package it happened on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BumpError::Git { .. } | BumpError::InvalidPattern { .. } | BumpError::Walk(_)
        )
    }
}
