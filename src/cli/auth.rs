//! Keyring-based storage for the Spotify access token

use anyhow::{Context, Result};
use dialoguer::Password;
use keyring::Entry;
use tracing::{debug, info, warn};

use crate::spotify::{CurrentUser, SpotifyClient};

const KEYRING_SERVICE: &str = "albumsync";
const TOKEN_KEY: &str = "spotify:access_token";

/// Manages the stored access token
pub struct TokenStore;

impl TokenStore {
    /// Verify and store a token
    ///
    /// Without `force`, a stored token that still works is kept as-is.
    /// Otherwise `token` (or a prompted value) is verified before storing.
    pub async fn authenticate(token: Option<String>, force: bool) -> Result<CurrentUser> {
        if !force && token.is_none() {
            if let Ok(stored) = Self::load() {
                info!("Found existing token in keyring");
                match Self::verify(&stored).await {
                    Ok(user) => return Ok(user),
                    Err(e) => warn!("Stored token no longer works: {:#}", e),
                }
            }
        } else {
            debug!("Replacing any stored token");
        }

        let token = match token {
            Some(token) => token,
            None => Password::new()
                .with_prompt("Spotify access token")
                .interact()
                .context("Failed to read access token")?,
        };
        let token = token.trim().to_string();

        let user = Self::verify(&token).await?;
        Self::store(&token)?;
        info!("Token stored in keyring");

        Ok(user)
    }

    /// Token from the command line or environment, falling back to the keyring
    pub fn resolve(token: Option<String>) -> Result<String> {
        if let Some(token) = token {
            debug!("Using token from command line or environment");
            return Ok(token);
        }
        Self::load().context("No Spotify token found. Run `albumsync auth` or set SPOTIFY_TOKEN")
    }

    /// Load the token from the keyring
    pub fn load() -> Result<String> {
        Self::entry()?
            .get_password()
            .context("No Spotify token in keyring")
    }

    /// Store the token in the keyring
    pub fn store(token: &str) -> Result<()> {
        Self::entry()?
            .set_password(token)
            .context("Failed to store token in keyring")?;
        debug!("Token stored in keyring");
        Ok(())
    }

    /// Clear the stored token
    pub fn clear() -> Result<()> {
        let _ = Self::entry()?.delete_credential();
        info!("Token cleared from keyring");
        Ok(())
    }

    /// Check if a token exists in the keyring
    pub fn exists() -> bool {
        Self::load().is_ok()
    }

    /// Verify a token by fetching the profile it belongs to
    pub async fn verify(token: &str) -> Result<CurrentUser> {
        debug!("Verifying access token");

        let client = SpotifyClient::new(token)?;
        let user = client
            .current_user()
            .await
            .context("Failed to verify access token")?;

        info!("Token verified for {}", user.label());
        Ok(user)
    }

    fn entry() -> Result<Entry> {
        Entry::new(KEYRING_SERVICE, TOKEN_KEY).context("Failed to access keyring")
    }
}
