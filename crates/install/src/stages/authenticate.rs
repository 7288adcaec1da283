use crate::stage::Stage;
use async_trait::async_trait;
use sideload_errors::{AuthError, Error};
use sideload_events::{ProgressTracker, StageKind};
use sideload_platform::{CredentialProvider, Presenter};
use sideload_types::SigningCredential;
use std::sync::Arc;
use std::time::Duration;

/// Resolves the signing credential shared by a whole batch
pub struct AuthenticateStage {
    provider: Arc<dyn CredentialProvider>,
    presenter: Option<Arc<dyn Presenter>>,
}

impl AuthenticateStage {
    pub fn new(provider: Arc<dyn CredentialProvider>, presenter: Option<Arc<dyn Presenter>>) -> Self {
        Self {
            provider,
            presenter,
        }
    }
}

#[async_trait]
impl Stage for AuthenticateStage {
    type Output = SigningCredential;

    fn kind(&self) -> StageKind {
        StageKind::Authenticate
    }

    async fn execute(&self, _progress: &ProgressTracker) -> Result<SigningCredential, Error> {
        match self.provider.credential(self.presenter.as_deref()).await {
            Ok(credential) => Ok(credential),
            Err(err @ (Error::Auth(_) | Error::Cancelled)) => Err(err),
            // Everything else is still a failure to obtain the credential
            Err(other) => Err(AuthError::CredentialFetchFailed {
                message: other.to_string(),
            }
            .into()),
        }
    }

    fn timeout_error(&self, timeout: Duration) -> Error {
        AuthError::CredentialFetchFailed {
            message: format!("sign-in did not finish within {}s", timeout.as_secs()),
        }
        .into()
    }
}
