//! Catalog and installed-app definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An app as published by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub developer: String,
    pub version: String,
    pub download_url: String,
    #[serde(default)]
    pub size: Option<u64>,
    /// Hex encoded BLAKE3 digest of the package
    #[serde(default)]
    pub blake3: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl App {
    /// Minimal app with only the fields needed to run a pipeline
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        download_url: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            developer: String::new(),
            version: version.into(),
            download_url: download_url.into(),
            size: None,
            blake3: None,
            description: None,
        }
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.identifier)
    }
}

/// Record of an app installed on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
    pub identifier: String,
    pub name: String,
    pub version: String,
    /// Bundle identifier after resigning with the account's team
    pub resigned_identifier: String,
    pub installed_date: DateTime<Utc>,
    pub refreshed_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    /// Catalog location, absent for apps installed from a local file
    pub download_url: Option<String>,
}

impl InstalledApp {
    /// Catalog app this record was installed from, if it is still known
    #[must_use]
    pub fn app(&self) -> Option<App> {
        self.download_url
            .as_ref()
            .map(|url| App::new(&self.identifier, &self.name, &self.version, url))
    }

    /// Whether the provisioning profile has lapsed at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(url: Option<&str>) -> InstalledApp {
        let now = Utc::now();
        InstalledApp {
            identifier: "com.example.delta".into(),
            name: "Delta".into(),
            version: "1.2".into(),
            resigned_identifier: "com.example.delta.ABCDE12345".into(),
            installed_date: now,
            refreshed_date: now,
            expiration_date: now + Duration::days(7),
            download_url: url.map(str::to_string),
        }
    }

    #[test]
    fn installed_app_resolves_catalog_app() {
        let app = record(Some("https://example.com/delta.ipa")).app().unwrap();
        assert_eq!(app.identifier, "com.example.delta");
        assert_eq!(app.download_url, "https://example.com/delta.ipa");
    }

    #[test]
    fn installed_app_without_source_has_no_app() {
        assert!(record(None).app().is_none());
    }

    #[test]
    fn expiry_is_inclusive() {
        let rec = record(None);
        assert!(!rec.is_expired(rec.refreshed_date));
        assert!(rec.is_expired(rec.expiration_date));
    }
}
