use std::fmt::{Debug, Formatter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ClientError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_ENDPOINT_PATH: &str = "/services/uup_game.php";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the game backend.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameClientConfig {
    pub base_url: String,
    pub endpoint_path: String,
    pub timeout_secs: u64,
    /// Sent verbatim as the `Cookie` header; the backend authenticates by session.
    pub session_cookie: Option<String>,
}

impl Default for GameClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            session_cookie: None,
        }
    }
}

impl Debug for GameClientConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClientConfig")
            .field("base_url", &self.base_url)
            .field("endpoint_path", &self.endpoint_path)
            .field("timeout_secs", &self.timeout_secs)
            .field("session_cookie", &self.session_cookie.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GameClientConfig {
    /// Parse a YAML document; absent keys keep their defaults.
    ///
    /// # Errors
    /// Returns [`ClientError::Config`] when the document is not valid YAML for this shape.
    pub fn from_yaml_str(input: &str) -> Result<Self, ClientError> {
        serde_yaml::from_str(input).map_err(|err| ClientError::Config(err.to_string()))
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns [`ClientError::Config`] when the file cannot be read or parsed.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ClientError> {
        let body = std::fs::read_to_string(path).map_err(|err| {
            ClientError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_yaml_str(&body)
    }

    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint_path.trim_start_matches('/')
        )
    }
}
