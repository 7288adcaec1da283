//! Concrete pipeline stages

mod authenticate;
mod download;
mod install;
mod resign;
mod send;

pub use authenticate::AuthenticateStage;
pub use download::DownloadStage;
pub use install::InstallStage;
pub use resign::ResignStage;
pub use send::SendStage;
