#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Contracts for the collaborators the pipeline talks to
//!
//! Every external interface (account store, catalog, downloader, signer,
//! helper discovery and transfer, installed-app persistence) is an async
//! trait here. Concrete implementations live in their own crates and tests
//! substitute in-memory fakes.

pub mod auth;
pub mod catalog;
pub mod process;
pub mod signing;
pub mod store;
pub mod transport;

pub use auth::{CredentialProvider, Presenter};
pub use catalog::{AppCatalog, AppDownloader};
pub use process::{CommandOutput, PlatformCommand, ProcessOperations, TokioProcess};
pub use signing::{AppSigner, ResignedApp};
pub use store::InstalledAppStore;
pub use transport::{DeviceTransport, EndpointDiscovery, InstallVerifier, TransferConnection};
