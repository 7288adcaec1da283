//! Interactive sign-in on the terminal

use async_trait::async_trait;
use console::Term;
use sideload_errors::{AuthError, Error};
use sideload_platform::Presenter;
use sideload_types::{Account, SigningCredential};
use std::path::PathBuf;

/// Prompts for the developer account when none is stored
pub struct ConsolePresenter;

struct Answers {
    email: String,
    team_identifier: String,
    certificate_identifier: String,
    key_path: PathBuf,
}

fn prompt(term: &Term, label: &str) -> std::io::Result<String> {
    term.write_str(&format!("{label}: "))?;
    Ok(term.read_line()?.trim().to_string())
}

/// Empty email means the user declined
fn ask(term: &Term) -> std::io::Result<Option<Answers>> {
    if !term.is_term() {
        return Ok(None);
    }
    term.write_line("No account is signed in. Leave the email empty to cancel.")?;
    let email = prompt(term, "Apple ID email")?;
    if email.is_empty() {
        return Ok(None);
    }
    Ok(Some(Answers {
        email,
        team_identifier: prompt(term, "Team identifier")?,
        certificate_identifier: prompt(term, "Signing certificate identifier")?,
        key_path: PathBuf::from(prompt(term, "Path to the certificate private key")?),
    }))
}

#[async_trait]
impl Presenter for ConsolePresenter {
    async fn sign_in(&self) -> Result<Option<SigningCredential>, Error> {
        let answers = tokio::task::spawn_blocking(|| ask(&Term::stderr()))
            .await
            .map_err(|e| Error::internal(format!("sign-in prompt panicked: {e}")))?
            .map_err(|e| AuthError::CredentialFetchFailed {
                message: e.to_string(),
            })?;
        let Some(answers) = answers else {
            return Ok(None);
        };

        let private_key = tokio::fs::read(&answers.key_path)
            .await
            .map_err(|e| Error::io_with_path(&e, &answers.key_path))?;
        Ok(Some(SigningCredential {
            account: Account {
                email: answers.email,
                team_identifier: answers.team_identifier,
            },
            certificate_identifier: answers.certificate_identifier,
            private_key,
        }))
    }
}
