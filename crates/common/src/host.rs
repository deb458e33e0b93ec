//! Upstream Git host records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An upstream Git host as registered with the proxy.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GitHost {
    pub id: i64,
    /// Base URL, e.g. `https://git.example.com`
    pub href: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub token: String,
}

impl GitHost {
    /// Absolute URL of `path` below the host's base URL
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.href.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// The token never reaches log output.
impl fmt::Debug for GitHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHost")
            .field("id", &self.id)
            .field("href", &self.href)
            .field("user_name", &self.user_name)
            .field("token", &"<redacted>")
            .finish()
    }
}
