//! Authentication error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuthError {
    #[error("sign-in was cancelled")]
    UserCancelled,

    #[error("no account is signed in")]
    NoAccount,

    #[error("failed to fetch signing credential: {message}")]
    CredentialFetchFailed { message: String },

    #[error("stored signing credential is invalid: {reason}")]
    InvalidCredential { reason: String },
}

impl UserFacingError for AuthError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoAccount => Some("Run `sideload sign-in` before installing or refreshing apps."),
            Self::InvalidCredential { .. } => {
                Some("Sign in again to replace the stored signing certificate.")
            }
            Self::CredentialFetchFailed { .. } => Some("Check your connection and retry."),
            Self::UserCancelled => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::CredentialFetchFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UserCancelled => "auth.user_cancelled",
            Self::NoAccount => "auth.no_account",
            Self::CredentialFetchFailed { .. } => "auth.credential_fetch_failed",
            Self::InvalidCredential { .. } => "auth.invalid_credential",
        };
        Some(code)
    }
}
