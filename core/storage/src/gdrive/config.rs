//! Google Drive connection settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use drivekit_common::{Error, Result};

/// Google Drive API base URL.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Where credentials live and which endpoints to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Application-secret descriptor downloaded from the cloud console.
    pub client_secret_path: PathBuf,
    /// Token cache, created on first authorization.
    pub token_cache_path: PathBuf,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_upload_base")]
    pub upload_base: String,
}

fn default_api_base() -> String {
    DRIVE_API_BASE.to_string()
}

fn default_upload_base() -> String {
    DRIVE_UPLOAD_BASE.to_string()
}

impl DriveConfig {
    /// Settings for the given credential files and the public endpoints.
    pub fn new(client_secret_path: impl Into<PathBuf>, token_cache_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            token_cache_path: token_cache_path.into(),
            api_base: default_api_base(),
            upload_base: default_upload_base(),
        }
    }

    /// Point both API bases at `base` (used with mock servers).
    pub fn with_endpoint(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.api_base = format!("{}/drive/v3", base);
        self.upload_base = format!("{}/upload/drive/v3", base);
        self
    }

    /// Directory holding the default credential files.
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drivekit")
    }

    /// Check that both credential paths end in `.json`.
    pub fn validate(&self) -> Result<()> {
        if !has_json_extension(&self.client_secret_path) || !has_json_extension(&self.token_cache_path) {
            return Err(Error::InvalidInput(
                "clientSecretPath or tokenFilePath is not end with json".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        let dir = Self::default_dir();
        Self::new(dir.join("client_secret.json"), dir.join("token.json"))
    }
}

/// The text after the last dot of the file name must be `json`.
///
/// Unlike `Path::extension`, a bare `.json` file name counts.
fn has_json_extension(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(_, ext)| ext == "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = DriveConfig::default();
        assert!(config.client_secret_path.ends_with("drivekit/client_secret.json"));
        assert!(config.token_cache_path.ends_with("drivekit/token.json"));
        assert_eq!(config.api_base, DRIVE_API_BASE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_json_suffix() {
        for (secret, token) in [
            ("secret.txt", "token.json"),
            ("secret.json", "token"),
            ("secret.json", "token.json.bak"),
            ("json", "token.json"),
        ] {
            let err = DriveConfig::new(secret, token).validate().unwrap_err();
            assert!(err.is_invalid_input(), "{} / {}", secret, token);
        }
        assert!(DriveConfig::new("a/b.json", "c.json").validate().is_ok());
        assert!(DriveConfig::new("creds/.json", "cache/.json").validate().is_ok());
        assert!(DriveConfig::new("secret.JSON", "token.json").validate().is_err());
    }

    #[test]
    fn test_with_endpoint() {
        let config = DriveConfig::new("s.json", "t.json").with_endpoint("http://127.0.0.1:1234/");
        assert_eq!(config.api_base, "http://127.0.0.1:1234/drive/v3");
        assert_eq!(config.upload_base, "http://127.0.0.1:1234/upload/drive/v3");
    }

    #[test]
    fn test_deserialize_fills_endpoints() {
        let json = r#"{"client_secret_path":"s.json","token_cache_path":"t.json"}"#;
        let config: DriveConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.upload_base, DRIVE_UPLOAD_BASE);
    }
}
