//! Google Drive backend.
//!
//! - OAuth2 credential acquisition with a JSON token cache
//! - Automatic access token refresh during use
//! - `RemoteStore` implementation over the Drive v3 REST API

pub mod auth;
pub mod client;
pub mod config;
pub mod token_cache;

use std::sync::Arc;
use tracing::{debug, info, warn};

use drivekit_common::Result;

pub use auth::{AuthManager, ClientSecrets, CodePrompt, ConsolePrompt, Credential, TokenManager};
pub use client::DriveClient;
pub use config::DriveConfig;

use crate::files::DriveFiles;

/// Produce a token manager for the files named in `config`.
///
/// A parseable token cache is reused as-is, without checking expiry and
/// without prompting. Otherwise `prompt` is asked for an authorization code,
/// which is exchanged for a credential and written to the cache. A failed
/// cache write is logged and does not fail the call.
///
/// # Errors
/// - Either path lacks a `.json` extension
/// - Client secret unreadable or malformed
/// - Prompt or code exchange failed
pub async fn authorize(
    config: &DriveConfig,
    prompt: &mut (dyn CodePrompt + Send),
) -> Result<TokenManager> {
    config.validate()?;

    let secrets = ClientSecrets::from_file(&config.client_secret_path)?;
    let auth_manager = AuthManager::new(&secrets)?;
    let cache_path = &config.token_cache_path;

    let credential = match token_cache::load(cache_path) {
        Ok(credential) => {
            info!(path = %cache_path.display(), "Using cached credential");
            credential
        }
        Err(e) => {
            debug!(path = %cache_path.display(), error = %e, "No usable token cache");

            let (auth_url, _state) = auth_manager.authorization_url();
            let code = prompt.prompt(&auth_url)?;
            let credential = auth_manager.exchange_code(&code).await?;

            if let Err(e) = token_cache::save(cache_path, &credential) {
                warn!(path = %cache_path.display(), error = %e, "Unable to cache oauth token");
            }
            credential
        }
    };

    Ok(TokenManager::new(auth_manager, credential).with_cache_path(cache_path))
}

/// Authorize and build a Drive client.
pub async fn connect(
    config: &DriveConfig,
    prompt: &mut (dyn CodePrompt + Send),
) -> Result<DriveClient> {
    let tokens = authorize(config, prompt).await?;
    DriveClient::new(Arc::new(tokens), config)
}

impl DriveFiles<DriveClient> {
    /// Authorize with the console prompt and wrap the resulting client.
    pub async fn connect(config: &DriveConfig) -> Result<Self> {
        let client = connect(config, &mut ConsolePrompt).await?;
        Ok(Self::new(client))
    }
}
