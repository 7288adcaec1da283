use crate::context::AppOperationContext;
use crate::stage::Stage;
use async_trait::async_trait;
use sideload_errors::{Error, SigningError};
use sideload_events::{ProgressTracker, StageKind};
use sideload_platform::{AppSigner, ResignedApp};
use std::sync::Arc;

/// Resigns the local package with the batch's credential
pub struct ResignStage {
    context: Arc<AppOperationContext>,
    signer: Arc<dyn AppSigner>,
}

impl ResignStage {
    pub fn new(context: Arc<AppOperationContext>, signer: Arc<dyn AppSigner>) -> Self {
        Self { context, signer }
    }
}

#[async_trait]
impl Stage for ResignStage {
    type Output = ResignedApp;

    fn kind(&self) -> StageKind {
        StageKind::Resign
    }

    async fn execute(&self, progress: &ProgressTracker) -> Result<ResignedApp, Error> {
        let credential = self.context.group().credential()?;
        let package = self
            .context
            .package()
            .ok_or_else(|| SigningError::MissingArtifact {
                app: self.context.identifier().to_string(),
            })?;
        self.signer
            .resign(self.context.app(), &package, &credential, progress)
            .await
    }
}
