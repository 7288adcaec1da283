#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for sideload
//!
//! HTTP catalog fetching and package downloads with connection pooling and
//! retry logic.

mod catalog;
mod client;
mod download;

pub use catalog::HttpCatalog;
pub use client::{NetClient, NetConfig};
pub use download::HttpDownloader;

use sideload_errors::{Error, NetworkError};
use url::Url;

/// Parse and validate a URL
///
/// # Errors
///
/// Returns an error if the URL string is malformed.
pub fn parse_url(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()).into())
}
