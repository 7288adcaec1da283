//! Integration tests for the helper transport

use sideload_errors::{ConnectionError, Error, ErrorKind};
use sideload_events::ProgressTracker;
use sideload_platform::{DeviceTransport, EndpointDiscovery, InstallVerifier};
use sideload_transport::protocol::{read_message, write_message, Request, Response};
use sideload_transport::{HelperVerifier, StaticDiscovery, TcpTransport};
use sideload_types::{App, Endpoint};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(2);

/// How the fake helper answers an install request
#[derive(Clone, Copy)]
enum InstallOutcome {
    Succeed,
    Reject,
    Hangup,
}

async fn spawn_helper(outcome: InstallOutcome) -> (Endpoint, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let Some(Request::Begin { size, .. }) = read_message(&mut reader).await.unwrap() else {
            panic!("expected begin");
        };
        let mut body = vec![0u8; usize::try_from(size).unwrap()];
        reader.read_exact(&mut body).await.unwrap();
        write_message(&mut write_half, &Response::Received).await.unwrap();

        let Some(Request::Install) = read_message(&mut reader).await.unwrap() else {
            panic!("expected install");
        };
        match outcome {
            InstallOutcome::Succeed => {
                for fraction in [0.25, 0.5, 1.0] {
                    write_message(&mut write_half, &Response::Progress { fraction })
                        .await
                        .unwrap();
                }
                write_message(&mut write_half, &Response::Installed).await.unwrap();
            }
            InstallOutcome::Reject => {
                write_message(
                    &mut write_half,
                    &Response::Error {
                        message: "maximum number of apps reached".into(),
                    },
                )
                .await
                .unwrap();
            }
            InstallOutcome::Hangup => {}
        }
        body
    });
    (Endpoint::new("test-helper", "127.0.0.1", port), handle)
}

async fn package(dir: &TempDir, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join("Resigned.ipa");
    tokio::fs::write(&path, bytes).await.unwrap();
    path
}

fn app() -> App {
    App::new("com.example.app", "Example", "1.0", "https://example.com/app.ipa")
}

#[tokio::test]
async fn send_then_install_succeeds() {
    let dir = TempDir::new().unwrap();
    let bytes = vec![7u8; 200_000];
    let path = package(&dir, &bytes).await;
    let (endpoint, helper) = spawn_helper(InstallOutcome::Succeed).await;

    let transport = TcpTransport::new(TIMEOUT);
    let send_progress = ProgressTracker::new("send", 1);
    let mut connection = transport
        .send(&endpoint, &app(), &path, &send_progress)
        .await
        .unwrap();
    assert!(send_progress.is_finished());
    assert_eq!(send_progress.total_unit_count(), bytes.len() as u64);
    assert_eq!(connection.endpoint(), &endpoint);

    let install_progress = ProgressTracker::new("install", 1);
    connection.install(&install_progress).await.unwrap();
    assert!(install_progress.is_finished());

    let received = helper.await.unwrap();
    assert_eq!(received, bytes);
}

#[tokio::test]
async fn rejected_install_maps_to_install_rejected() {
    let dir = TempDir::new().unwrap();
    let path = package(&dir, b"PK\x03\x04payload").await;
    let (endpoint, _helper) = spawn_helper(InstallOutcome::Reject).await;

    let transport = TcpTransport::new(TIMEOUT);
    let mut connection = transport
        .send(&endpoint, &app(), &path, &ProgressTracker::new("send", 1))
        .await
        .unwrap();
    let err = connection
        .install(&ProgressTracker::new("install", 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::InstallRejected { ref reason }) if reason.contains("maximum")
    ));
    assert_eq!(err.kind(), ErrorKind::InstallRejected);
}

#[tokio::test]
async fn helper_hangup_during_install_is_dropped_connection() {
    let dir = TempDir::new().unwrap();
    let path = package(&dir, b"PK\x03\x04payload").await;
    let (endpoint, helper) = spawn_helper(InstallOutcome::Hangup).await;

    let transport = TcpTransport::new(TIMEOUT);
    let mut connection = transport
        .send(&endpoint, &app(), &path, &ProgressTracker::new("send", 1))
        .await
        .unwrap();
    let err = connection
        .install(&ProgressTracker::new("install", 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::ConnectionDropped { .. })
    ));
    helper.await.unwrap();
}

#[tokio::test]
async fn missing_package_fails_before_connecting() {
    let dir = TempDir::new().unwrap();
    let transport = TcpTransport::new(TIMEOUT);
    let endpoint = Endpoint::new("nowhere", "127.0.0.1", 1);
    let err = transport
        .send(
            &endpoint,
            &app(),
            &dir.path().join("missing.ipa"),
            &ProgressTracker::new("send", 1),
        )
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::MissingResignedFile { .. })
    ));
}

#[tokio::test]
async fn unreachable_helper_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = package(&dir, b"PK\x03\x04payload").await;
    // Bind then drop to get a port with nothing listening
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let endpoint = Endpoint::new("gone", "127.0.0.1", port);
    let err = TcpTransport::new(TIMEOUT)
        .send(&endpoint, &app(), &path, &ProgressTracker::new("send", 1))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::Unreachable { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::TransferFailed);
}

#[tokio::test]
async fn discovery_keeps_only_reachable_endpoints_in_order() {
    let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let second = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let endpoints = vec![
        Endpoint::new("dead", "127.0.0.1", dead_port),
        Endpoint::new("first", "127.0.0.1", first.local_addr().unwrap().port()),
        Endpoint::new("second", "127.0.0.1", second.local_addr().unwrap().port()),
    ];

    let discovery = StaticDiscovery::new(endpoints, Duration::from_millis(500));
    let found = discovery.discovered_endpoints().await;
    let names: Vec<_> = found.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[tokio::test]
async fn verifier_queries_installed_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let helper = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let Some(Request::QueryInstalled {
            resigned_identifier,
        }) = read_message(&mut reader).await.unwrap()
        else {
            panic!("expected query");
        };
        let installed = resigned_identifier == "com.example.app.TEAM";
        write_message(&mut write_half, &Response::InstalledStatus { installed })
            .await
            .unwrap();
    });

    let verifier = HelperVerifier::new(Endpoint::new("helper", "127.0.0.1", port), TIMEOUT);
    assert!(verifier.is_installed("com.example.app.TEAM").await.unwrap());
    helper.await.unwrap();
}
