use async_trait::async_trait;
use sideload_errors::{Error, SigningError};
use sideload_events::ProgressTracker;
use sideload_platform::{AppSigner, PlatformCommand, ProcessOperations, ResignedApp};
use sideload_types::{App, SigningCredential};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

const RESIGNED_FILE_NAME: &str = "Resigned.ipa";
const KEY_FILE_NAME: &str = "signing.key";

/// Bundle identifier an app is installed under for a given team
#[must_use]
pub fn resigned_identifier(app: &App, credential: &SigningCredential) -> String {
    format!("{}.{}", app.identifier, credential.account.team_identifier)
}

/// Resigns by invoking an external tool
///
/// The tool receives the configured arguments followed by
/// `--input`, `--output`, `--certificate`, `--key`, `--team` and `--bundle-id`.
/// The key is written next to the package for the duration of the call.
pub struct CommandSigner {
    command: Option<PathBuf>,
    args: Vec<String>,
    process: Arc<dyn ProcessOperations>,
}

impl CommandSigner {
    pub fn new(
        command: Option<PathBuf>,
        args: Vec<String>,
        process: Arc<dyn ProcessOperations>,
    ) -> Self {
        Self {
            command,
            args,
            process,
        }
    }

    fn build_command(
        &self,
        program: &Path,
        package: &Path,
        output: &Path,
        key: &Path,
        credential: &SigningCredential,
        bundle_id: &str,
    ) -> PlatformCommand {
        let mut cmd = PlatformCommand::new(program);
        cmd.args(&self.args)
            .arg("--input")
            .arg(package.display().to_string())
            .arg("--output")
            .arg(output.display().to_string())
            .arg("--certificate")
            .arg(&credential.certificate_identifier)
            .arg("--key")
            .arg(key.display().to_string())
            .arg("--team")
            .arg(&credential.account.team_identifier)
            .arg("--bundle-id")
            .arg(bundle_id);
        if let Some(dir) = package.parent() {
            cmd.current_dir(dir);
        }
        cmd
    }
}

async fn write_key(path: &Path, key: &[u8]) -> Result<(), Error> {
    let io_err = |e: std::io::Error| Error::io_with_path(&e, path);

    // create_new only applies the mode to a fresh file
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(io_err(e)),
        _ => {}
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(io_err)?;
    file.write_all(key).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)?;
    Ok(())
}

#[async_trait]
impl AppSigner for CommandSigner {
    async fn resign(
        &self,
        app: &App,
        package: &Path,
        credential: &SigningCredential,
        progress: &ProgressTracker,
    ) -> Result<ResignedApp, Error> {
        let program = self
            .command
            .as_deref()
            .ok_or(SigningError::SignerNotConfigured)?;
        if !tokio::fs::try_exists(package).await.unwrap_or(false) {
            return Err(SigningError::MissingArtifact {
                app: app.identifier.clone(),
            }
            .into());
        }

        let dir = package.parent().unwrap_or_else(|| Path::new("."));
        let output = dir.join(RESIGNED_FILE_NAME);
        let key = dir.join(KEY_FILE_NAME);
        let bundle_id = resigned_identifier(app, credential);

        let _ = tokio::fs::remove_file(&output).await;
        write_key(&key, &credential.private_key).await?;
        let cmd = self.build_command(program, package, &output, &key, credential, &bundle_id);
        let result = self.process.execute_command(&cmd).await;
        let _ = tokio::fs::remove_file(&key).await;

        let failed = |message: String| -> Error {
            SigningError::SignerFailed {
                app: app.identifier.clone(),
                message,
            }
            .into()
        };
        let output_status = result.map_err(|e| failed(e.to_string()))?;
        if !output_status.status.success() {
            let stderr = output_status.stderr_lossy();
            return Err(failed(if stderr.is_empty() {
                format!("{} exited with {}", cmd.display(), output_status.status)
            } else {
                stderr
            }));
        }
        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(failed(format!("no output written to {}", output.display())));
        }

        progress.finish();
        Ok(ResignedApp {
            path: output,
            resigned_identifier: bundle_id,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn key_is_only_readable_by_the_owner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(KEY_FILE_NAME);
        std::fs::write(&path, b"stale").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_key(&path, b"secret").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read(&path).unwrap(), b"secret");
    }
}
