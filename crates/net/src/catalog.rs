//! JSON app catalog served over HTTP

use crate::client::NetClient;
use async_trait::async_trait;
use serde::Deserialize;
use sideload_errors::{Error, NetworkError};
use sideload_platform::AppCatalog;
use sideload_types::App;

/// Accepts either a bare array of apps or `{ "apps": [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Bare(Vec<App>),
    Wrapped { apps: Vec<App> },
}

pub struct HttpCatalog {
    client: NetClient,
    url: String,
}

impl HttpCatalog {
    /// # Errors
    ///
    /// Returns an error if `url` is not a valid absolute URL.
    pub fn new(client: NetClient, url: impl Into<String>) -> Result<Self, Error> {
        let url = url.into();
        crate::parse_url(&url)?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AppCatalog for HttpCatalog {
    fn source(&self) -> String {
        self.url.clone()
    }

    async fn list_apps(&self) -> Result<Vec<App>, Error> {
        let body = self
            .client
            .get(&self.url)
            .await?
            .text()
            .await
            .map_err(|e| NetworkError::DownloadFailed(e.to_string()))?;

        let document: CatalogDocument = serde_json::from_str(&body)
            .map_err(|e| NetworkError::InvalidCatalog(e.to_string()))?;
        let apps = match document {
            CatalogDocument::Bare(apps) | CatalogDocument::Wrapped { apps } => apps,
        };

        if let Some(app) = apps.iter().find(|app| app.identifier.is_empty()) {
            return Err(NetworkError::InvalidCatalog(format!(
                "app '{}' has an empty identifier",
                app.name
            ))
            .into());
        }
        Ok(apps)
    }
}
