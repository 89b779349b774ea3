//! Error types for relcast-state

use thiserror::Error;

/// Errors surfaced by the external collaborators (tag namespace, release host).
#[derive(Error, Debug)]
pub enum StorageError {
    /// A tag with this name is already present in the remote namespace
    #[error("tag already exists: {tag}")]
    TagAlreadyExists { tag: String },

    /// The referenced tag is absent from the remote namespace
    #[error("tag not found: {tag}")]
    TagNotFound { tag: String },

    /// A release is already registered for this tag
    #[error("release already exists for tag {tag}")]
    ReleaseAlreadyExists { tag: String },

    /// An asset with this name is already attached to the release
    #[error("asset {name} already attached to release {tag}")]
    AssetAlreadyExists { tag: String, name: String },

    /// Network-level failure talking to the host (connect, reset, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// The host answered with a non-success status
    #[error("request rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Version-control command failure
    #[error("vcs error: {0}")]
    Vcs(String),

    /// Digest string is not 64 hex characters
    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    /// Collaborator misconfiguration (missing repository, bad URL)
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether retrying the same call may succeed.
    ///
    /// Transport failures, throttling (429) and server errors (5xx) are transient.
    /// Everything else (auth failures, conflicts, missing objects) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Transport(_) => true,
            StorageError::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => StorageError::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => StorageError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_server_errors_are_transient() {
        assert!(StorageError::Transport("connection reset".to_string()).is_transient());
        assert!(StorageError::Rejected {
            status: 502,
            message: "bad gateway".to_string()
        }
        .is_transient());
        assert!(StorageError::Rejected {
            status: 429,
            message: "slow down".to_string()
        }
        .is_transient());
    }

    #[test]
    fn auth_and_conflicts_are_not_transient() {
        assert!(!StorageError::Rejected {
            status: 401,
            message: "bad credentials".to_string()
        }
        .is_transient());
        assert!(!StorageError::TagAlreadyExists {
            tag: "nightly-20240305".to_string()
        }
        .is_transient());
        assert!(!StorageError::ReleaseAlreadyExists {
            tag: "v1.0.0".to_string()
        }
        .is_transient());
    }
}
