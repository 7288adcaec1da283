use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Stage kinds as they appear in pipeline events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Authenticate,
    Download,
    Resign,
    Send,
    Install,
}

impl StageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::Download => "download",
            Self::Resign => "resign",
            Self::Send => "send",
            Self::Install => "install",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch and stage lifecycle of the install/refresh pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    BatchStarted {
        batch_id: String,
        apps: Vec<String>,
        endpoint: String,
    },

    /// Apps joined a batch that was already running
    BatchExtended {
        batch_id: String,
        apps: Vec<String>,
    },

    /// The whole batch failed before any per-app work was scheduled
    BatchFailed {
        batch_id: String,
        failure: FailureContext,
    },

    StageStarted {
        batch_id: String,
        app: Option<String>,
        stage: StageKind,
    },

    StageCompleted {
        batch_id: String,
        app: Option<String>,
        stage: StageKind,
    },

    StageFailed {
        batch_id: String,
        app: Option<String>,
        stage: StageKind,
        failure: FailureContext,
    },

    /// Skipped because a dependency failed
    StageSkipped {
        batch_id: String,
        app: Option<String>,
        stage: StageKind,
    },

    AppFinished {
        batch_id: String,
        app: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        failure: Option<FailureContext>,
    },

    BatchCompleted {
        batch_id: String,
        succeeded: usize,
        failed: usize,
    },
}
