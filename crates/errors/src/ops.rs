//! Orchestration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpsError {
    #[error("missing component: {component}")]
    MissingComponent { component: String },

    #[error("app not found in catalog: {identifier}")]
    AppNotInCatalog { identifier: String },

    #[error("app is not installed: {identifier}")]
    AppNotInstalled { identifier: String },
}

impl UserFacingError for OpsError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::AppNotInCatalog { .. } => Some("Run `sideload apps` to list available apps."),
            Self::AppNotInstalled { .. } => Some("Run `sideload installed` to list known apps."),
            Self::MissingComponent { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::MissingComponent { .. } => "ops.missing_component",
            Self::AppNotInCatalog { .. } => "ops.app_not_in_catalog",
            Self::AppNotInstalled { .. } => "ops.app_not_installed",
        };
        Some(code)
    }
}
