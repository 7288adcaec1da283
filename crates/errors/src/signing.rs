//! Signing error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SigningError {
    #[error("no signing credential available")]
    MissingCredential,

    #[error("no package artifact available for {app}")]
    MissingArtifact { app: String },

    #[error("resign command failed for {app}: {message}")]
    SignerFailed { app: String, message: String },

    #[error("resign command not configured")]
    SignerNotConfigured,
}

impl UserFacingError for SigningError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingCredential => Some("Sign in before installing or refreshing apps."),
            Self::SignerNotConfigured => {
                Some("Set `signing.command` in the configuration file.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::MissingCredential => "signing.missing_credential",
            Self::MissingArtifact { .. } => "signing.missing_artifact",
            Self::SignerFailed { .. } => "signing.signer_failed",
            Self::SignerNotConfigured => "signing.not_configured",
        };
        Some(code)
    }
}
