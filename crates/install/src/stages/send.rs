use crate::context::AppOperationContext;
use crate::stage::Stage;
use async_trait::async_trait;
use sideload_errors::{ConnectionError, Error};
use sideload_events::{ProgressTracker, StageKind};
use sideload_platform::{DeviceTransport, TransferConnection};
use std::sync::Arc;

/// Transfers the resigned package to the batch's helper
pub struct SendStage {
    context: Arc<AppOperationContext>,
    transport: Arc<dyn DeviceTransport>,
}

impl SendStage {
    pub fn new(context: Arc<AppOperationContext>, transport: Arc<dyn DeviceTransport>) -> Self {
        Self { context, transport }
    }
}

#[async_trait]
impl Stage for SendStage {
    type Output = Box<dyn TransferConnection>;

    fn kind(&self) -> StageKind {
        StageKind::Send
    }

    async fn execute(&self, progress: &ProgressTracker) -> Result<Self::Output, Error> {
        let endpoint = self
            .context
            .group()
            .endpoint()
            .ok_or(ConnectionError::ServerNotFound)?;
        let resigned =
            self.context
                .resigned()
                .ok_or_else(|| ConnectionError::MissingResignedFile {
                    app: self.context.identifier().to_string(),
                })?;
        self.transport
            .send(endpoint, self.context.app(), &resigned.path, progress)
            .await
    }
}
