//! Credential resolution

use async_trait::async_trait;
use sideload_errors::Error;
use sideload_types::SigningCredential;

/// Interactive surface used when no account is stored
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Ask the user to sign in. `None` means the prompt was declined.
    async fn sign_in(&self) -> Result<Option<SigningCredential>, Error>;
}

/// Source of the signing credential used by the authenticate stage
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolve the credential, prompting through `presenter` when allowed.
    async fn credential(
        &self,
        presenter: Option<&dyn Presenter>,
    ) -> Result<SigningCredential, Error>;
}
