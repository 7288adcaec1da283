#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the sideload workspace
//!
//! Errors are grouped by domain and aggregated by [`Error`]. Every type is
//! `Clone` so one failure can be handed to every dependent pipeline stage
//! and every app of a batch.

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

pub mod auth;
pub mod config;
pub mod connection;
pub mod network;
pub mod ops;
pub mod signing;
pub mod state;

pub use auth::AuthError;
pub use config::ConfigError;
pub use connection::ConnectionError;
pub use network::NetworkError;
pub use ops::OpsError;
pub use signing::SigningError;
pub use state::StateError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("operation error: {0}")]
    Ops(#[from] OpsError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{stage} stage timed out after {seconds}s")]
    StageTimeout { stage: String, seconds: u64 },

    #[error("I/O error: {message}")]
    Io {
        #[cfg_attr(feature = "serde", serde(with = "io_kind_as_str"))]
        kind: std::io::ErrorKind,
        message: String,
        #[cfg_attr(feature = "serde", serde(with = "opt_path_buf"))]
        path: Option<std::path::PathBuf>,
    },
}

/// Coarse classification of a failure as reported in per-app results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorKind {
    Cancelled,
    AuthenticationFailed,
    ServerNotFound,
    DownloadFailed,
    SigningFailed,
    TransferFailed,
    InstallRejected,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cancelled => "cancelled",
            Self::AuthenticationFailed => "authentication failed",
            Self::ServerNotFound => "server not found",
            Self::DownloadFailed => "download failed",
            Self::SigningFailed => "signing failed",
            Self::TransferFailed => "transfer failed",
            Self::InstallRejected => "install rejected",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// Classify this error for per-app result reporting.
    ///
    /// Config, state, I/O, internal and timeout failures are `Unknown`.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled | Self::Auth(AuthError::UserCancelled) => ErrorKind::Cancelled,
            Self::Auth(_) => ErrorKind::AuthenticationFailed,
            Self::Network(_) => ErrorKind::DownloadFailed,
            Self::Signing(_) => ErrorKind::SigningFailed,
            Self::Connection(err) => match err {
                ConnectionError::ServerNotFound => ErrorKind::ServerNotFound,
                ConnectionError::InstallRejected { .. } | ConnectionError::ConnectionDropped { .. } => {
                    ErrorKind::InstallRejected
                }
                ConnectionError::Unreachable { .. }
                | ConnectionError::TransferFailed { .. }
                | ConnectionError::MissingResignedFile { .. }
                | ConnectionError::MissingConnection { .. }
                | ConnectionError::Protocol { .. } => ErrorKind::TransferFailed,
            },
            Self::Config(_)
            | Self::State(_)
            | Self::Ops(_)
            | Self::Internal(_)
            | Self::StageTimeout { .. }
            | Self::Io { .. } => ErrorKind::Unknown,
        }
    }

    /// True when this error came from cancellation rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::State(StateError::DatabaseError {
            message: err.to_string(),
        })
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::State(StateError::MigrationFailed {
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

/// Result type alias for sideload operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information.
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Auth(err) => err.user_message(),
            Error::Network(err) => err.user_message(),
            Error::Signing(err) => err.user_message(),
            Error::Connection(err) => err.user_message(),
            Error::Config(err) => err.user_message(),
            Error::State(err) => err.user_message(),
            Error::Ops(err) => err.user_message(),
            Error::Io { message, .. } => Cow::Owned(message.clone()),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Auth(err) => err.user_hint(),
            Error::Network(err) => err.user_hint(),
            Error::Signing(err) => err.user_hint(),
            Error::Connection(err) => err.user_hint(),
            Error::Config(err) => err.user_hint(),
            Error::State(err) => err.user_hint(),
            Error::Ops(err) => err.user_hint(),
            Error::StageTimeout { .. } => {
                Some("Increase `pipeline.stage_timeout_secs` if the helper is slow.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Error::Auth(err) => err.is_retryable(),
            Error::Network(err) => err.is_retryable(),
            Error::Connection(err) => err.is_retryable(),
            Error::State(err) => err.is_retryable(),
            Error::StageTimeout { .. } | Error::Io { .. } => true,
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Auth(err) => err.user_code(),
            Error::Network(err) => err.user_code(),
            Error::Signing(err) => err.user_code(),
            Error::Connection(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::State(err) => err.user_code(),
            Error::Ops(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Cancelled => Some("error.cancelled"),
            Error::StageTimeout { .. } => Some("error.stage_timeout"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}

// Serde helper modules for optional path and io::ErrorKind as string
#[cfg(feature = "serde")]
mod io_kind_as_str {
    use serde::{Deserialize, Deserializer, Serializer};
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(kind: &std::io::ErrorKind, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&format!("{kind:?}"))
    }
    pub fn deserialize<'de, D>(deserializer: D) -> Result<std::io::ErrorKind, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "NotFound" => std::io::ErrorKind::NotFound,
            "PermissionDenied" => std::io::ErrorKind::PermissionDenied,
            "ConnectionRefused" => std::io::ErrorKind::ConnectionRefused,
            "ConnectionReset" => std::io::ErrorKind::ConnectionReset,
            "BrokenPipe" => std::io::ErrorKind::BrokenPipe,
            "AlreadyExists" => std::io::ErrorKind::AlreadyExists,
            "InvalidInput" => std::io::ErrorKind::InvalidInput,
            "InvalidData" => std::io::ErrorKind::InvalidData,
            "TimedOut" => std::io::ErrorKind::TimedOut,
            "UnexpectedEof" => std::io::ErrorKind::UnexpectedEof,
            _ => std::io::ErrorKind::Other,
        })
    }
}

#[cfg(feature = "serde")]
mod opt_path_buf {
    use serde::{Deserialize, Deserializer, Serializer};
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(path: &Option<std::path::PathBuf>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match path {
            Some(pb) => s.serialize_some(&pb.display().to_string()),
            None => s.serialize_none(),
        }
    }
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<std::path::PathBuf>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<String>::deserialize(deserializer)?;
        Ok(opt.map(std::path::PathBuf::from))
    }
}
