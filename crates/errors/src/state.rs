//! Persistence error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateError {
    #[error("database error: {message}")]
    DatabaseError { message: String },

    #[error("migration failed: {message}")]
    MigrationFailed { message: String },

    #[error("installed app not found: {identifier}")]
    AppNotFound { identifier: String },

    #[error("stored record corrupted: {message}")]
    Corrupted { message: String },
}

impl UserFacingError for StateError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MigrationFailed { .. } | Self::Corrupted { .. } => {
                Some("Remove the state database to start from a clean slate.")
            }
            Self::AppNotFound { .. } => Some("Run `sideload installed` to list known apps."),
            Self::DatabaseError { .. } => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseError { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DatabaseError { .. } => "state.database_error",
            Self::MigrationFailed { .. } => "state.migration_failed",
            Self::AppNotFound { .. } => "state.app_not_found",
            Self::Corrupted { .. } => "state.corrupted",
        };
        Some(code)
    }
}
