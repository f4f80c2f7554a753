//! Error types for rule dispatch and remediation actions.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while dispatching an alert to its actions.
#[derive(Debug, Error)]
pub enum Error {
    /// A required rule option was not supplied
    #[error("missing {0} option")]
    MissingOption(&'static str),

    /// A rule option was supplied with an unusable value
    #[error("invalid {option} option: {value}")]
    InvalidOption {
        /// Option key
        option: &'static str,
        /// Offending value
        value: String,
    },

    /// A matched rule names an action that is not registered
    #[error("action not found: {0}")]
    ActionNotFound(String),

    /// Ambient Kubernetes credentials could not be resolved
    #[error("failed to resolve cluster credentials: {0}")]
    ClusterCredentials(String),

    /// The trust database text is malformed
    #[error("invalid host key database entry on line {line}: {reason}")]
    HostKeyFormat {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// The private key file could not be read
    #[error("error reading key file {}: {source}", path.display())]
    KeyRead {
        /// Path from the `key` option
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The private key file could not be used
    #[error("error parsing key: {0}")]
    KeyParse(String),

    /// The remote host presented a key we do not trust
    #[error("host key verification failed for {host}: {reason}")]
    Untrusted {
        /// Host as dialed
        host: String,
        /// Why the key was rejected
        reason: String,
    },

    /// Dialing, handshaking or talking to a remote peer failed
    #[error("{stage}: {message}")]
    Transport {
        /// Which step failed (e.g. "error dialing")
        stage: &'static str,
        /// Underlying error text
        message: String,
    },

    /// An outbound operation did not finish in time
    #[error("{operation} timed out after {}s", timeout.as_secs())]
    Timeout {
        /// Operation that expired
        operation: &'static str,
        /// Configured bound
        timeout: Duration,
    },

    /// The Kubernetes client could not be built
    #[error("kubernetes client error: {0}")]
    Kube(#[source] kube::Error),

    /// The Kubernetes API refused the restart patch
    #[error("patch rejected: {0}")]
    PatchRejected(#[source] kube::Error),

    /// The remote command exited unsuccessfully
    #[error("error running command: remote command exited with status {status}")]
    RemoteCommandFailed {
        /// Exit status reported by the remote side
        status: i32,
    },
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid rule options
    Configuration,
    /// Unknown action names, unresolved credentials
    Resolution,
    /// Malformed trust database or private key
    Parse,
    /// Host key or certificate rejected
    Trust,
    /// Dial, handshake, session or timeout failures
    Transport,
    /// Remote side ran the operation and reported failure
    RemoteExecution,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingOption(_) | Self::InvalidOption { .. } => ErrorKind::Configuration,
            Self::ActionNotFound(_) | Self::ClusterCredentials(_) => ErrorKind::Resolution,
            Self::HostKeyFormat { .. } | Self::KeyRead { .. } | Self::KeyParse(_) => {
                ErrorKind::Parse
            }
            Self::Untrusted { .. } => ErrorKind::Trust,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Kube(_) => ErrorKind::Transport,
            Self::RemoteCommandFailed { .. } | Self::PatchRejected(_) => {
                ErrorKind::RemoteExecution
            }
        }
    }

    pub(crate) fn transport(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            stage,
            message: err.to_string(),
        }
    }
}
