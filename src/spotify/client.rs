//! Spotify Web API HTTP client

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::models::*;
use super::{DEFAULT_API_URL, MAX_IDS_PER_REQUEST, PAGE_LIMIT};
use crate::library::Album;
use crate::sync::RemoteLibraryStore;

/// Rate-limited requests are retried this many times before giving up
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Used when a 429 response carries no usable Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// HTTP client for the saved-albums part of the Spotify Web API
#[derive(Clone)]
pub struct SpotifyClient {
    base_url: Url,
    token: String,
    batch_size: usize,
    http_client: Client,
}

impl SpotifyClient {
    /// Create a client authenticated with a bearer `token`
    pub fn new(token: &str) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("albumsync/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: Url::parse(DEFAULT_API_URL).context("Invalid Spotify API URL")?,
            token: token.to_string(),
            batch_size: MAX_IDS_PER_REQUEST,
            http_client,
        })
    }

    /// Point the client at another API root (e.g. a local proxy)
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let mut url = Url::parse(base_url)
            .with_context(|| format!("Invalid API URL: {}", base_url))?;
        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }
        self.base_url = url;
        Ok(self)
    }

    /// Ids sent per add/remove request, clamped to what the API accepts
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_IDS_PER_REQUEST);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid endpoint: {}", path))
    }

    /// Fetch the profile the token belongs to
    pub async fn current_user(&self) -> Result<CurrentUser> {
        let url = self.endpoint("me")?;
        debug!("Fetching current user: {}", url);
        self.get_json(url)
            .await
            .context("Failed to fetch Spotify profile")
    }

    /// Fetch every saved album, following `next` links until exhausted
    pub async fn saved_albums(&self) -> Result<Vec<Album>> {
        let mut url = self.endpoint("me/albums")?;
        url.query_pairs_mut()
            .append_pair("limit", &PAGE_LIMIT.to_string());

        let mut albums = Vec::new();
        loop {
            debug!("Fetching saved albums page: {}", url);
            let page: Paging<SavedAlbum> = self
                .get_json(url.clone())
                .await
                .context("Failed to fetch saved albums")?;

            albums.extend(page.items.into_iter().map(Album::from));

            match page.next {
                Some(next) => {
                    url = Url::parse(&next)
                        .with_context(|| format!("Invalid next page URL: {}", next))?;
                }
                None => break,
            }
        }

        debug!("Found {} saved albums", albums.len());
        Ok(albums)
    }

    /// Save albums to the user's library, one request per batch
    pub async fn save_albums(&self, ids: &[&str]) -> Result<()> {
        let url = self.endpoint("me/albums")?;
        for chunk in ids.chunks(self.batch_size) {
            debug!("Saving {} albums", chunk.len());
            let body = AlbumIds { ids: chunk.to_vec() };
            let request = self.http_client.put(url.clone()).json(&body);
            self.send(request).await.context("Failed to save albums")?;
        }
        Ok(())
    }

    /// Remove albums from the user's library, one request per batch
    pub async fn remove_albums(&self, ids: &[&str]) -> Result<()> {
        let url = self.endpoint("me/albums")?;
        for chunk in ids.chunks(self.batch_size) {
            debug!("Removing {} albums", chunk.len());
            let body = AlbumIds { ids: chunk.to_vec() };
            let request = self.http_client.delete(url.clone()).json(&body);
            self.send(request).await.context("Failed to remove albums")?;
        }
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.send(self.http_client.get(url)).await?;
        response
            .json()
            .await
            .context("Failed to parse Spotify response")
    }

    /// Authenticate and send `request`, waiting out rate limits
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.bearer_auth(&self.token);
        let mut attempt = 0;

        loop {
            let Some(this_attempt) = request.try_clone() else {
                bail!("Request body cannot be retried");
            };
            let response = this_attempt
                .send()
                .await
                .context("Failed to connect to Spotify")?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS
                && attempt < MAX_RATE_LIMIT_RETRIES
            {
                attempt += 1;
                let wait = retry_after(&response);
                warn!(
                    "Rate limited by Spotify, retrying in {}s ({}/{})",
                    wait.as_secs(),
                    attempt,
                    MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            return check_response(response).await;
        }
    }
}

fn retry_after(response: &Response) -> Duration {
    let secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}

/// Turn non-2xx responses into errors carrying the API's message
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => bail!(
            "Spotify error {}: {}",
            parsed.error.status,
            parsed.error.message
        ),
        Err(_) => bail!("Spotify request failed with status {}", status),
    }
}

#[async_trait]
impl RemoteLibraryStore for SpotifyClient {
    async fn fetch_saved_albums(&self) -> Result<Vec<Album>> {
        self.saved_albums().await
    }

    async fn add_albums_to_remote_library(&self, albums: &[Album]) -> Result<()> {
        let ids: Vec<&str> = albums.iter().map(|a| a.id.as_str()).collect();
        self.save_albums(&ids).await
    }

    async fn remove_albums_from_remote_library(&self, albums: &[Album]) -> Result<()> {
        let ids: Vec<&str> = albums.iter().map(|a| a.id.as_str()).collect();
        self.remove_albums(&ids).await
    }
}
