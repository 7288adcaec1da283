#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Signing credentials and package resigning
//!
//! [`AccountCredentialProvider`] resolves the signing credential from the
//! stored account, falling back to an interactive sign-in. [`CommandSigner`]
//! resigns packages by running an external tool.

mod credentials;
mod resign;

pub use credentials::AccountCredentialProvider;
pub use resign::{resigned_identifier, CommandSigner};
