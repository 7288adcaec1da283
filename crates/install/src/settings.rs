use sideload_config::{calculate_stage_concurrency, Config};
use std::time::Duration;

/// Scheduling knobs shared by every batch of one manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub max_concurrent_stages: usize,
    pub stage_timeout: Duration,
    /// How long a freshly signed app stays valid
    pub profile_validity: chrono::Duration,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_stages: calculate_stage_concurrency(
                config.pipeline.max_concurrent_stages,
            ),
            stage_timeout: config.stage_timeout(),
            profile_validity: chrono::Duration::days(i64::from(
                config.pipeline.profile_validity_days,
            )),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
