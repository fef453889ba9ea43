//! OAuth2 authentication and token management for Google Drive.

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    reqwest, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

use drivekit_common::{Error, Result};

use super::token_cache;

/// Full Drive access. Changing it invalidates previously cached tokens.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Remaining lifetime below which an access token counts as expired.
const EXPIRY_BUFFER_MINUTES: i64 = 5;

type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth2 client credentials from an application-secret descriptor.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// On-disk layout of a downloaded `client_secret.json`.
#[derive(Deserialize)]
struct SecretFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Build credentials for the default Google endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
            redirect_uris: vec![redirect_uri.into()],
        }
    }

    /// Override the token endpoint.
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Parse a descriptor in either the "installed" or "web" layout.
    ///
    /// # Errors
    /// - Malformed JSON or neither layout present
    /// - No redirect URL listed
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let file: SecretFile = serde_json::from_slice(data)?;
        let secrets = file.installed.or(file.web).ok_or_else(|| {
            Error::Serialization("client secret has neither 'installed' nor 'web' section".to_string())
        })?;

        if secrets.redirect_uris.is_empty() {
            return Err(Error::Serialization(
                "missing redirect URL in the client secret".to_string(),
            ));
        }

        Ok(secrets)
    }

    /// Read and parse a descriptor from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Unable to read client secret file {}: {}", path.display(), e),
            ))
        })?;
        Self::from_json(&data)
    }

    fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or("http://localhost")
    }
}

impl fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .field("redirect_uris", &self.redirect_uris)
            .finish()
    }
}

/// OAuth2 credential as persisted in the token cache.
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    /// Access token for API requests.
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Refresh token for obtaining new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires; `None` means it never does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[zeroize(skip)]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    /// Check if the access token is expired or about to expire.
    ///
    /// Timestamps before the Unix epoch are treated as "no expiry"; other
    /// tools write the zero time that way.
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) if expiry.timestamp() > 0 => {
                expiry < Utc::now() + Duration::minutes(EXPIRY_BUFFER_MINUTES)
            }
            _ => false,
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    fn from_response<R: TokenResponse>(response: &R, previous_refresh: Option<&str>) -> Self {
        let expires_in = response
            .expires_in()
            .unwrap_or_else(|| std::time::Duration::from_secs(3600));

        let expiry = Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1));

        // Refresh responses usually omit the refresh token; keep the old one.
        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().clone())
            .or_else(|| previous_refresh.map(str::to_string));

        Self {
            access_token: response.access_token().secret().clone(),
            token_type: default_token_type(),
            refresh_token,
            expiry: Some(expiry),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// OAuth2 authentication manager for Google Drive.
pub struct AuthManager {
    client: OAuthClient,
    http: reqwest::Client,
}

impl AuthManager {
    /// Create a new authentication manager.
    pub fn new(secrets: &ClientSecrets) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(secrets.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(secrets.auth_uri.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(secrets.token_uri.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(secrets.redirect_uri().to_string())
                    .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
            );

        // Following redirects on the token endpoint opens the client up to SSRF.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, http })
    }

    /// Generate the authorization URL for the user to visit.
    ///
    /// Returns the URL and the CSRF state embedded in it.
    pub fn authorization_url(&self) -> (String, String) {
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(DRIVE_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .url();

        (auth_url.to_string(), csrf_token.secret().clone())
    }

    /// Exchange an authorization code for a credential.
    ///
    /// # Errors
    /// - Invalid authorization code
    /// - Network errors
    pub async fn exchange_code(&self, code: &str) -> Result<Credential> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Unable to retrieve token from web: {}", e)))?;

        Ok(Credential::from_response(&response, None))
    }

    /// Obtain a fresh access token using `refresh_token`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Token refresh failed: {}", e)))?;

        Ok(Credential::from_response(&response, Some(refresh_token)))
    }
}

/// Source of the authorization code during the interactive flow.
pub trait CodePrompt {
    /// Show `auth_url` to the user and return the code they paste back.
    fn prompt(&mut self, auth_url: &str) -> Result<String>;
}

/// Prints the URL to stdout and reads the code from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

impl CodePrompt for ConsolePrompt {
    fn prompt(&mut self, auth_url: &str) -> Result<String> {
        println!(
            "Go to the following link in your browser then type the authorization code: \n{}",
            auth_url
        );

        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| Error::Authentication(format!("Unable to read authorization code: {}", e)))?;

        first_token(&line)
    }
}

/// Extract the authorization code from a line of user input.
pub(crate) fn first_token(line: &str) -> Result<String> {
    line.split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| Error::Authentication("Unable to read authorization code: empty input".to_string()))
}

/// Hands out access tokens, refreshing them when they expire.
pub struct TokenManager {
    auth_manager: AuthManager,
    credential: tokio::sync::RwLock<Credential>,
    cache_path: Option<PathBuf>,
}

impl TokenManager {
    /// Create a new token manager with an initial credential.
    pub fn new(auth_manager: AuthManager, credential: Credential) -> Self {
        Self {
            auth_manager,
            credential: tokio::sync::RwLock::new(credential),
            cache_path: None,
        }
    }

    /// Write refreshed credentials back to `path`.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Get an `Authorization` header value, refreshing the token if needed.
    ///
    /// An expired credential without a refresh token is returned unchanged;
    /// the remote service will reject it.
    pub async fn authorization(&self) -> Result<String> {
        let credential = self.credential.read().await;

        if !credential.is_expired() || credential.refresh_token.is_none() {
            return Ok(credential.authorization());
        }

        drop(credential);

        let mut credential = self.credential.write().await;

        // Double-check after acquiring write lock
        if !credential.is_expired() {
            return Ok(credential.authorization());
        }

        let refresh_token = match credential.refresh_token.as_deref() {
            Some(token) => token.to_string(),
            None => return Ok(credential.authorization()),
        };

        tracing::info!("Refreshing expired access token");
        let fresh = self.auth_manager.refresh(&refresh_token).await?;

        if let Some(path) = &self.cache_path {
            if let Err(e) = token_cache::save(path, &fresh) {
                tracing::warn!(path = %path.display(), error = %e, "Unable to cache refreshed token");
            }
        }

        *credential = fresh;
        Ok(credential.authorization())
    }

    /// Get the current credential.
    pub async fn credential(&self) -> Credential {
        self.credential.read().await.clone()
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("credential", &"[REDACTED]")
            .field("cache_path", &self.cache_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTALLED: &str = r#"{
        "installed": {
            "client_id": "id.apps.googleusercontent.com",
            "project_id": "demo",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_secret": "shh",
            "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob", "http://localhost"]
        }
    }"#;

    fn credential(expiry: Option<DateTime<Utc>>, refresh: Option<&str>) -> Credential {
        Credential {
            access_token: "access".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: refresh.map(str::to_string),
            expiry,
        }
    }

    #[test]
    fn test_parse_installed_secret() {
        let secrets = ClientSecrets::from_json(INSTALLED.as_bytes()).unwrap();
        assert_eq!(secrets.client_id, "id.apps.googleusercontent.com");
        assert_eq!(secrets.redirect_uri(), "urn:ietf:wg:oauth:2.0:oob");
    }

    #[test]
    fn test_parse_web_secret_with_default_endpoints() {
        let json = r#"{"web":{"client_id":"w","client_secret":"s","redirect_uris":["http://localhost:8080"]}}"#;
        let secrets = ClientSecrets::from_json(json.as_bytes()).unwrap();
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(secrets.auth_uri, DEFAULT_AUTH_URI);
    }

    #[test]
    fn test_parse_secret_errors() {
        assert!(matches!(
            ClientSecrets::from_json(b"not json"),
            Err(Error::Serialization(_))
        ));
        assert!(matches!(
            ClientSecrets::from_json(br#"{"other":{}}"#),
            Err(Error::Serialization(_))
        ));
        let no_redirect = br#"{"installed":{"client_id":"a","client_secret":"b"}}"#;
        assert!(matches!(
            ClientSecrets::from_json(no_redirect),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_secret_debug_redacts() {
        let secrets = ClientSecrets::from_json(INSTALLED.as_bytes()).unwrap();
        let debug = format!("{:?}", secrets);
        assert!(!debug.contains("shh"));
    }

    #[test]
    fn test_credential_expiration() {
        assert!(credential(Some(Utc::now() - Duration::hours(1)), None).is_expired());
        assert!(!credential(Some(Utc::now() + Duration::hours(1)), None).is_expired());
        // Inside the 5 minute buffer
        assert!(credential(Some(Utc::now() + Duration::minutes(4)), None).is_expired());
        assert!(!credential(None, None).is_expired());
    }

    #[test]
    fn test_zero_time_expiry_never_expires() {
        let json = r#"{"access_token":"a","token_type":"Bearer","expiry":"0001-01-01T00:00:00Z"}"#;
        let cred: Credential = serde_json::from_str(json).unwrap();
        assert!(!cred.is_expired());
    }

    #[test]
    fn test_credential_cache_format() {
        let json = r#"{
            "access_token": "ya29.abc",
            "token_type": "Bearer",
            "refresh_token": "1//refresh",
            "expiry": "2030-01-02T15:04:05.123456+08:00"
        }"#;
        let cred: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(cred.authorization(), "Bearer ya29.abc");

        let back: Credential = serde_json::from_str(&serde_json::to_string(&cred).unwrap()).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn test_credential_debug_redacts() {
        let debug = format!("{:?}", credential(None, Some("refresh")));
        assert!(!debug.contains("access\""));
        assert!(!debug.contains("refresh\""));
    }

    #[test]
    fn test_authorization_url_generation() {
        let secrets = ClientSecrets::from_json(INSTALLED.as_bytes()).unwrap();
        let manager = AuthManager::new(&secrets).unwrap();
        let (url, state) = manager.authorization_url();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth"));
        assert!(url.contains("client_id=id.apps.googleusercontent.com"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive"));
        assert!(!state.is_empty());
    }

    #[test]
    fn test_invalid_token_url() {
        let secrets = ClientSecrets::new("id", "secret", "http://localhost").with_token_uri("not a url");
        assert!(matches!(AuthManager::new(&secrets), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_first_token() {
        assert_eq!(first_token("  4/abc-def \n").unwrap(), "4/abc-def");
        assert_eq!(first_token("code trailing").unwrap(), "code");
        assert!(matches!(first_token("   \n"), Err(Error::Authentication(_))));
    }

    #[test]
    fn test_token_manager_debug_redacts() {
        let secrets = ClientSecrets::new("id", "secret", "http://localhost");
        let manager = TokenManager::new(
            AuthManager::new(&secrets).unwrap(),
            credential(None, Some("refresh-secret")),
        )
        .with_cache_path("/tmp/token.json");

        let debug = format!("{:?}", manager);
        assert!(debug.contains("TokenManager"));
        assert!(debug.contains("/tmp/token.json"));
        assert!(!debug.contains("access"));
        assert!(!debug.contains("refresh-secret"));
    }

    #[tokio::test]
    async fn test_valid_token_is_not_refreshed() {
        // Token endpoint is unreachable; a refresh attempt would fail.
        let secrets = ClientSecrets::new("id", "secret", "http://localhost")
            .with_token_uri("http://127.0.0.1:9/token");
        let manager = TokenManager::new(
            AuthManager::new(&secrets).unwrap(),
            credential(Some(Utc::now() + Duration::hours(1)), Some("refresh")),
        );

        assert_eq!(manager.authorization().await.unwrap(), "Bearer access");
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_is_returned_as_is() {
        let secrets = ClientSecrets::new("id", "secret", "http://localhost")
            .with_token_uri("http://127.0.0.1:9/token");
        let manager = TokenManager::new(
            AuthManager::new(&secrets).unwrap(),
            credential(Some(Utc::now() - Duration::hours(1)), None),
        );

        assert_eq!(manager.authorization().await.unwrap(), "Bearer access");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::Regex("grant_type=refresh_token".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"fresh","token_type":"Bearer","expires_in":3600}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("token.json");

        let secrets = ClientSecrets::new("id", "secret", "http://localhost")
            .with_token_uri(format!("{}/token", server.url()));
        let manager = TokenManager::new(
            AuthManager::new(&secrets).unwrap(),
            credential(Some(Utc::now() - Duration::hours(1)), Some("keep-me")),
        )
        .with_cache_path(&cache);

        assert_eq!(manager.authorization().await.unwrap(), "Bearer fresh");
        mock.assert_async().await;

        let current = manager.credential().await;
        assert_eq!(current.refresh_token.as_deref(), Some("keep-me"));
        assert!(!current.is_expired());

        let cached = token_cache::load(&cache).unwrap();
        assert_eq!(cached.access_token, "fresh");
    }
}
