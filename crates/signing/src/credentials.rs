use async_trait::async_trait;
use sideload_errors::{AuthError, Error};
use sideload_platform::{CredentialProvider, Presenter};
use sideload_state::StateManager;
use sideload_types::SigningCredential;

/// Credential provider backed by the account stored in [`StateManager`]
#[derive(Clone)]
pub struct AccountCredentialProvider {
    state: StateManager,
}

impl AccountCredentialProvider {
    #[must_use]
    pub fn new(state: StateManager) -> Self {
        Self { state }
    }
}

fn validate(credential: &SigningCredential) -> Result<(), Error> {
    let reason = if credential.private_key.is_empty() {
        "private key is empty"
    } else if credential.certificate_identifier.trim().is_empty() {
        "certificate identifier is empty"
    } else if credential.account.team_identifier.trim().is_empty() {
        "team identifier is empty"
    } else {
        return Ok(());
    };
    Err(AuthError::InvalidCredential {
        reason: reason.to_string(),
    }
    .into())
}

#[async_trait]
impl CredentialProvider for AccountCredentialProvider {
    async fn credential(
        &self,
        presenter: Option<&dyn Presenter>,
    ) -> Result<SigningCredential, Error> {
        let stored = self.state.credential().await.map_err(|e| AuthError::CredentialFetchFailed {
            message: e.to_string(),
        })?;
        if let Some(credential) = stored {
            validate(&credential)?;
            return Ok(credential);
        }

        let Some(presenter) = presenter else {
            return Err(AuthError::NoAccount.into());
        };
        let Some(credential) = presenter.sign_in().await? else {
            return Err(AuthError::UserCancelled.into());
        };
        validate(&credential)?;
        self.state.save_credential(&credential).await?;
        Ok(credential)
    }
}
