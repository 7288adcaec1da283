//! Streaming package downloads

use crate::client::NetClient;
use async_trait::async_trait;
use futures::StreamExt;
use sideload_errors::{Error, NetworkError};
use sideload_events::ProgressTracker;
use sideload_platform::AppDownloader;
use sideload_types::App;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Packages are zip archives
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Downloads into `<destination>.part` and renames once verified
pub struct HttpDownloader {
    client: NetClient,
}

impl HttpDownloader {
    #[must_use]
    pub fn new(client: NetClient) -> Self {
        Self { client }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn invalid(app: &App, reason: impl Into<String>) -> Error {
    NetworkError::InvalidPackage {
        app: app.identifier.clone(),
        reason: reason.into(),
    }
    .into()
}

#[async_trait]
impl AppDownloader for HttpDownloader {
    async fn download(
        &self,
        app: &App,
        destination: &Path,
        progress: &ProgressTracker,
    ) -> Result<(), Error> {
        crate::parse_url(&app.download_url)?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        let response = self.client.get(&app.download_url).await?;
        if let Some(total) = response.content_length().or(app.size) {
            progress.set_total(total);
        }

        let partial = partial_path(destination);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| Error::io_with_path(&e, &partial))?;
        let mut hasher = blake3::Hasher::new();
        let mut head = Vec::with_capacity(ZIP_MAGIC.len());
        let mut written = 0u64;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| NetworkError::DownloadFailed(e.to_string()))?;
            if head.len() < ZIP_MAGIC.len() {
                let take = (ZIP_MAGIC.len() - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.advance(chunk.len() as u64);
        }
        file.flush().await?;
        drop(file);

        let verdict = if written == 0 {
            Err(invalid(app, "empty response body"))
        } else if head != ZIP_MAGIC {
            Err(invalid(app, "not a zip archive"))
        } else {
            match &app.blake3 {
                Some(expected) => {
                    let actual = hasher.finalize().to_hex().to_string();
                    if actual.eq_ignore_ascii_case(expected) {
                        Ok(())
                    } else {
                        Err(NetworkError::ChecksumMismatch {
                            expected: expected.clone(),
                            actual,
                        }
                        .into())
                    }
                }
                None => Ok(()),
            }
        };

        if let Err(err) = verdict {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err);
        }

        tokio::fs::rename(&partial, destination)
            .await
            .map_err(|e| Error::io_with_path(&e, destination))?;
        progress.finish();
        Ok(())
    }
}
