//! Account and signing credential types

use serde::{Deserialize, Serialize};
use std::fmt;

/// The signed-in developer account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub team_identifier: String,
}

/// Everything the resign stage needs to sign a package
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningCredential {
    pub account: Account,
    pub certificate_identifier: String,
    pub private_key: Vec<u8>,
}

// Key material stays out of logs
impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("account", &self.account)
            .field("certificate_identifier", &self.certificate_identifier)
            .field("private_key", &format_args!("<{} bytes>", self.private_key.len()))
            .finish()
    }
}
