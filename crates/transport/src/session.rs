use crate::protocol::{read_message, write_message, Request, Response};
use async_trait::async_trait;
use sideload_errors::{ConnectionError, Error};
use sideload_events::ProgressTracker;
use sideload_platform::{DeviceTransport, InstallVerifier, TransferConnection};
use sideload_types::{App, Endpoint};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

const CHUNK_SIZE: usize = 64 * 1024;

async fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<TcpStream, Error> {
    let unreachable = |message: String| -> Error {
        ConnectionError::Unreachable {
            endpoint: endpoint.address(),
            message,
        }
        .into()
    };
    match tokio::time::timeout(timeout, TcpStream::connect(endpoint.address())).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(unreachable(e.to_string())),
        Err(_) => Err(unreachable(format!("no answer within {}ms", timeout.as_millis()))),
    }
}

/// Sends packages to a helper over TCP
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl DeviceTransport for TcpTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        app: &App,
        package: &Path,
        progress: &ProgressTracker,
    ) -> Result<Box<dyn TransferConnection>, Error> {
        let mut file = tokio::fs::File::open(package).await.map_err(|_| {
            ConnectionError::MissingResignedFile {
                app: app.identifier.clone(),
            }
        })?;
        let size = file.metadata().await?.len();
        progress.set_total(size.max(1));

        let (read_half, mut write_half) = connect(endpoint, self.connect_timeout)
            .await?
            .into_split();
        let mut reader = BufReader::new(read_half);

        let transfer_failed = |message: String| -> Error {
            ConnectionError::TransferFailed { message }.into()
        };

        write_message(
            &mut write_half,
            &Request::Begin {
                identifier: app.identifier.clone(),
                size,
            },
        )
        .await
        .map_err(|e| transfer_failed(e.to_string()))?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let read = file.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            write_half
                .write_all(&buf[..read])
                .await
                .map_err(|e| transfer_failed(e.to_string()))?;
            progress.advance(read as u64);
        }
        write_half
            .flush()
            .await
            .map_err(|e| transfer_failed(e.to_string()))?;

        match read_message::<_, Response>(&mut reader).await? {
            Some(Response::Received) => {}
            Some(Response::Error { message }) => return Err(transfer_failed(message)),
            Some(other) => {
                return Err(ConnectionError::Protocol {
                    message: format!("unexpected response to transfer: {other:?}"),
                }
                .into())
            }
            None => return Err(transfer_failed("helper closed the connection".into())),
        }

        progress.finish();
        Ok(Box::new(TcpConnection {
            endpoint: endpoint.clone(),
            reader,
            writer: write_half,
        }))
    }
}

/// Session left open after a completed transfer
pub struct TcpConnection {
    endpoint: Endpoint,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpConnection {
    fn dropped(&self) -> Error {
        ConnectionError::ConnectionDropped {
            endpoint: self.endpoint.address(),
        }
        .into()
    }
}

#[async_trait]
impl TransferConnection for TcpConnection {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn install(&mut self, progress: &ProgressTracker) -> Result<(), Error> {
        const UNITS: u64 = 100;
        progress.set_total(UNITS);

        if write_message(&mut self.writer, &Request::Install).await.is_err() {
            return Err(self.dropped());
        }

        loop {
            let message = match read_message::<_, Response>(&mut self.reader).await {
                Ok(message) => message,
                Err(Error::Io { .. }) => return Err(self.dropped()),
                Err(e) => return Err(e),
            };
            match message {
                Some(Response::Progress { fraction }) => {
                    #[allow(
                        clippy::cast_possible_truncation,
                        clippy::cast_sign_loss,
                        clippy::cast_precision_loss
                    )]
                    let units = (fraction.clamp(0.0, 1.0) * UNITS as f64).round() as u64;
                    progress.set_completed(units);
                }
                Some(Response::Installed) => {
                    progress.finish();
                    return Ok(());
                }
                Some(Response::Error { message }) => {
                    return Err(ConnectionError::InstallRejected { reason: message }.into())
                }
                Some(other) => {
                    return Err(ConnectionError::Protocol {
                        message: format!("unexpected response to install: {other:?}"),
                    }
                    .into())
                }
                None => return Err(self.dropped()),
            }
        }
    }
}

/// Asks a helper whether an app is still installed
pub struct HelperVerifier {
    endpoint: Endpoint,
    connect_timeout: Duration,
}

impl HelperVerifier {
    #[must_use]
    pub fn new(endpoint: Endpoint, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
        }
    }
}

#[async_trait]
impl InstallVerifier for HelperVerifier {
    async fn is_installed(&self, resigned_identifier: &str) -> Result<bool, Error> {
        let (read_half, mut write_half) = connect(&self.endpoint, self.connect_timeout)
            .await?
            .into_split();
        let mut reader = BufReader::new(read_half);

        write_message(
            &mut write_half,
            &Request::QueryInstalled {
                resigned_identifier: resigned_identifier.to_string(),
            },
        )
        .await?;

        match read_message::<_, Response>(&mut reader).await? {
            Some(Response::InstalledStatus { installed }) => Ok(installed),
            Some(Response::Error { message }) => {
                Err(ConnectionError::Protocol { message }.into())
            }
            other => Err(ConnectionError::Protocol {
                message: format!("unexpected response to query: {other:?}"),
            }
            .into()),
        }
    }
}
