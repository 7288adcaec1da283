//! Integration tests for net crate

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use sideload_errors::{Error, NetworkError};
    use sideload_events::ProgressTracker;
    use sideload_net::*;
    use sideload_platform::{AppCatalog, AppDownloader};
    use sideload_types::App;
    use std::time::Duration;
    use tempfile::tempdir;

    fn client() -> NetClient {
        NetClient::new(NetConfig {
            retry_count: 1,
            retry_delay: Duration::from_millis(10),
            ..NetConfig::default()
        })
        .unwrap()
    }

    fn package_bytes() -> Vec<u8> {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice(b"payload of a test package");
        bytes
    }

    #[tokio::test]
    async fn test_catalog_accepts_wrapped_document() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/apps.json");
            then.status(200).body(
                r#"{"apps": [{"identifier": "com.example.delta", "name": "Delta",
                    "version": "1.5", "download_url": "https://example.com/delta.ipa"}]}"#,
            );
        });

        let catalog = HttpCatalog::new(client(), server.url("/apps.json")).unwrap();
        let apps = catalog.list_apps().await.unwrap();

        mock.assert();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].identifier, "com.example.delta");
        assert_eq!(catalog.source(), server.url("/apps.json"));
    }

    #[tokio::test]
    async fn test_catalog_rejects_garbage() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/apps.json");
            then.status(200).body("<html>not json</html>");
        });

        let catalog = HttpCatalog::new(client(), server.url("/apps.json")).unwrap();
        let err = catalog.list_apps().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Network(NetworkError::InvalidCatalog(_))
        ));
    }

    #[tokio::test]
    async fn test_catalog_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/apps.json");
            then.status(404);
        });

        let catalog = HttpCatalog::new(client(), server.url("/apps.json")).unwrap();
        let err = catalog.list_apps().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Network(NetworkError::HttpError { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_download_reports_progress_and_verifies_hash() {
        let server = MockServer::start();
        let content = package_bytes();
        let hash = blake3::hash(&content).to_hex().to_string();
        server.mock(|when, then| {
            when.method(GET).path("/delta.ipa");
            then.status(200).body(content.clone());
        });

        let temp = tempdir().unwrap();
        let dest = temp.path().join("com.example.delta").join("App.ipa");
        let mut app = App::new("com.example.delta", "Delta", "1.5", server.url("/delta.ipa"));
        app.blake3 = Some(hash);

        let progress = ProgressTracker::new("download", 1);
        HttpDownloader::new(client())
            .download(&app, &dest, &progress)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);
        assert!(progress.is_finished());
        assert_eq!(progress.total_unit_count(), content.len() as u64);
    }

    #[tokio::test]
    async fn test_download_checksum_mismatch_leaves_nothing_behind() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/delta.ipa");
            then.status(200).body(package_bytes());
        });

        let temp = tempdir().unwrap();
        let dest = temp.path().join("App.ipa");
        let mut app = App::new("com.example.delta", "Delta", "1.5", server.url("/delta.ipa"));
        app.blake3 = Some("00".repeat(32));

        let err = HttpDownloader::new(client())
            .download(&app, &dest, &ProgressTracker::new("download", 1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Network(NetworkError::ChecksumMismatch { .. })
        ));
        assert!(!dest.exists());
        assert!(!temp.path().join("App.ipa.part").exists());
    }

    #[tokio::test]
    async fn test_download_rejects_non_archive() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/delta.ipa");
            then.status(200).body("definitely not a zip");
        });

        let temp = tempdir().unwrap();
        let dest = temp.path().join("App.ipa");
        let app = App::new("com.example.delta", "Delta", "1.5", server.url("/delta.ipa"));

        let err = HttpDownloader::new(client())
            .download(&app, &dest, &ProgressTracker::new("download", 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Network(NetworkError::InvalidPackage { .. })
        ));
        assert_eq!(err.kind(), sideload_errors::ErrorKind::DownloadFailed);
    }
}
