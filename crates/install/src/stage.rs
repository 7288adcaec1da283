use async_trait::async_trait;
use sideload_errors::Error;
use sideload_events::{ProgressTracker, StageKind};
use std::time::Duration;

/// One asynchronous unit of pipeline work
///
/// Implementations report their own units on `progress`. The graph owns
/// dependency waiting, cancellation and the timeout, so `execute` only
/// runs once every dependency has succeeded.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    type Output: Send + 'static;

    fn kind(&self) -> StageKind;

    async fn execute(&self, progress: &ProgressTracker) -> Result<Self::Output, Error>;

    /// Error the stage resolves with when it outlives `timeout`
    fn timeout_error(&self, timeout: Duration) -> Error {
        Error::StageTimeout {
            stage: self.kind().to_string(),
            seconds: timeout.as_secs(),
        }
    }
}
