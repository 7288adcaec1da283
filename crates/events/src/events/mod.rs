use serde::{Deserialize, Serialize};

use crate::EventSource;
use sideload_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod catalog;
pub mod general;
pub mod pipeline;
pub mod progress;
pub mod state;

pub use catalog::*;
pub use general::*;
pub use pipeline::*;
pub use progress::*;
pub use state::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    General(GeneralEvent),

    /// Batch, stage and per-app lifecycle
    Pipeline(PipelineEvent),

    Catalog(CatalogEvent),

    Progress(ProgressEvent),

    /// Installed-app records and account store
    State(StateEvent),
}

impl AppEvent {
    /// Identify the source domain for this event.
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Pipeline(_) => EventSource::PIPELINE,
            Self::Catalog(_) => EventSource::CATALOG,
            Self::Progress(_) => EventSource::PROGRESS,
            Self::State(_) => EventSource::STATE,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. } | GeneralEvent::OperationFailed { .. })
            | Self::Pipeline(
                PipelineEvent::BatchFailed { .. } | PipelineEvent::StageFailed { .. },
            )
            | Self::Catalog(CatalogEvent::FetchFailed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Pipeline(PipelineEvent::AppFinished { success: false, .. })
            | Self::Progress(ProgressEvent::Cancelled { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Pipeline(
                PipelineEvent::StageStarted { .. } | PipelineEvent::StageSkipped { .. },
            )
            | Self::Progress(_) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "sideload::events::general",
            Self::Pipeline(_) => "sideload::events::pipeline",
            Self::Catalog(_) => "sideload::events::catalog",
            Self::Progress(_) => "sideload::events::progress",
            Self::State(_) => "sideload::events::state",
        }
    }
}
