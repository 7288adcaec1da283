//! Helper connection and on-device installation error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionError {
    #[error("no helper server found")]
    ServerNotFound,

    #[error("helper at {endpoint} is unreachable: {message}")]
    Unreachable { endpoint: String, message: String },

    #[error("transfer failed: {message}")]
    TransferFailed { message: String },

    #[error("connection to {endpoint} dropped")]
    ConnectionDropped { endpoint: String },

    #[error("no resigned package available for {app}")]
    MissingResignedFile { app: String },

    #[error("no open connection for {app}")]
    MissingConnection { app: String },

    #[error("installation rejected: {reason}")]
    InstallRejected { reason: String },

    #[error("malformed response from helper: {message}")]
    Protocol { message: String },
}

impl UserFacingError for ConnectionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ServerNotFound => {
                Some("Make sure the helper is running and listed under `discovery.endpoints`.")
            }
            Self::Unreachable { .. } | Self::ConnectionDropped { .. } => {
                Some("Check that the device and the helper are on the same network.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::ConnectionDropped { .. } | Self::TransferFailed { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ServerNotFound => "connection.server_not_found",
            Self::Unreachable { .. } => "connection.unreachable",
            Self::TransferFailed { .. } => "connection.transfer_failed",
            Self::ConnectionDropped { .. } => "connection.dropped",
            Self::MissingResignedFile { .. } => "connection.missing_resigned_file",
            Self::MissingConnection { .. } => "connection.missing_connection",
            Self::InstallRejected { .. } => "connection.install_rejected",
            Self::Protocol { .. } => "connection.protocol",
        };
        Some(code)
    }
}
