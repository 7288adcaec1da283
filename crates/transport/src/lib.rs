#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Helper discovery and the transfer/installation session
//!
//! The helper speaks newline-delimited JSON. A transfer is a `begin`
//! header followed by exactly `size` raw package bytes; the session then
//! stays open for the `install` request.

mod discovery;
pub mod protocol;
mod session;

pub use discovery::StaticDiscovery;
pub use session::{HelperVerifier, TcpConnection, TcpTransport};
