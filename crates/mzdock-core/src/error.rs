use std::path::{Path, PathBuf};

use crate::Bucket;

pub type Result<T> = std::result::Result<T, DockError>;

#[derive(Debug, thiserror::Error)]
pub enum DockError {
    #[error("added files are not in pair, so not parsed: {}", .unparsed.join(", "))]
    PairingMismatch { unparsed: Vec<String> },

    #[error("{missing} mzML file is not added yet")]
    MissingBucket { missing: Bucket },

    #[error("failed to parse experiment {experiment}: {source}")]
    ParseFailure {
        experiment: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to read configuration {}: {message}", .path.display())]
    ConfigRead { path: PathBuf, message: String },

    #[error("{kind} does not exist: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("workspace access requires verification")]
    AccessDenied,

    #[error("invalid workspace name: {0:?}")]
    InvalidName(String),

    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DockError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        DockError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        DockError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn config_read(path: &Path, message: impl ToString) -> Self {
        DockError::ConfigRead {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Soft errors are reported to the user and leave state consistent;
    /// everything else aborts the interaction.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            DockError::PairingMismatch { .. }
                | DockError::MissingBucket { .. }
                | DockError::ParseFailure { .. }
                | DockError::NotFound { .. }
                | DockError::InvalidName(_)
        )
    }

    /// Stable machine-readable code used in JSON envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            DockError::PairingMismatch { .. } => "pairing_mismatch",
            DockError::MissingBucket { .. } => "missing_bucket",
            DockError::ParseFailure { .. } => "parse_failure",
            DockError::ConfigRead { .. } => "config_read",
            DockError::NotFound { .. } => "not_found",
            DockError::AccessDenied => "access_denied",
            DockError::InvalidName(_) => "invalid_name",
            DockError::Io { .. } => "io",
        }
    }
}
