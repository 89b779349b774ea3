//! GitHub Releases client
//!
//! Implements [`ReleaseHost`] against the GitHub REST API: releases are
//! created through `POST /repos/{owner}/{repo}/releases` and assets are
//! streamed to the uploads endpoint.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::StorageError;
use crate::storage_traits::{
    AssetRecord, HostedRelease, ReleaseDraft, ReleaseHost, StorageResult,
};

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_UPLOAD_URL: &str = "https://uploads.github.com";

/// GitHub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API base URL
    pub api_url: String,
    /// Asset upload base URL
    pub upload_url: String,
    /// `owner/repo`
    pub repository: String,
    /// Token with `contents: write` permission
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            upload_url: std::env::var("GITHUB_UPLOAD_URL")
                .unwrap_or_else(|_| DEFAULT_UPLOAD_URL.to_string()),
            repository: std::env::var("GITHUB_REPOSITORY").unwrap_or_default(),
            token: std::env::var("GITHUB_TOKEN").ok(),
        }
    }
}

impl GithubConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific repository on github.com
    pub fn new(repository: &str) -> Self {
        GithubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            repository: repository.to_string(),
            token: None,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Point both endpoints at a different server (GitHub Enterprise, test servers)
    pub fn with_base_urls(mut self, api_url: &str, upload_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self.upload_url = upload_url.trim_end_matches('/').to_string();
        self
    }

    fn releases_url(&self) -> String {
        format!("{}/repos/{}/releases", self.api_url, self.repository)
    }

    fn release_by_tag_url(&self, tag: &str) -> String {
        format!("{}/tags/{}", self.releases_url(), tag)
    }

    fn release_url(&self, release_id: u64) -> String {
        format!("{}/{}", self.releases_url(), release_id)
    }

    fn asset_list_url(&self, release_id: u64) -> String {
        format!("{}/assets", self.release_url(release_id))
    }

    fn asset_upload_url(&self, release_id: u64) -> String {
        format!(
            "{}/repos/{}/releases/{}/assets",
            self.upload_url, self.repository, release_id
        )
    }

    fn validate(&self) -> StorageResult<()> {
        match self.repository.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok(()),
            _ => Err(StorageError::Config(format!(
                "repository must be 'owner/repo', got '{}'",
                self.repository
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    tag_name: String,
    name: Option<String>,
    prerelease: bool,
    draft: bool,
    html_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl From<ReleaseResponse> for HostedRelease {
    fn from(r: ReleaseResponse) -> Self {
        HostedRelease {
            id: r.id,
            name: r.name.unwrap_or_else(|| r.tag_name.clone()),
            tag_name: r.tag_name,
            prerelease: r.prerelease,
            draft: r.draft,
            html_url: r.html_url,
            created_at: r.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    name: String,
    size: u64,
    browser_download_url: Option<String>,
}

impl From<AssetResponse> for AssetRecord {
    fn from(a: AssetResponse) -> Self {
        AssetRecord {
            name: a.name,
            size: a.size,
            download_url: a.browser_download_url,
        }
    }
}

/// GitHub-backed release host
pub struct GithubReleaseHost {
    config: GithubConfig,
    http_client: reqwest::Client,
}

impl GithubReleaseHost {
    /// Create a new GitHub client
    pub fn new(config: GithubConfig) -> StorageResult<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("relcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StorageError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(GithubReleaseHost {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> StorageResult<Self> {
        Self::new(GithubConfig::from_env())
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http_client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Turn a non-success response into a `StorageError::Rejected` carrying the body.
async fn check_status(response: reqwest::Response) -> StorageResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ReleaseHost for GithubReleaseHost {
    #[instrument(skip(self), fields(repository = %self.config.repository))]
    async fn find_release(&self, tag: &str) -> StorageResult<Option<HostedRelease>> {
        let response = self
            .request(reqwest::Method::GET, &self.config.release_by_tag_url(tag))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("No release registered for tag {}", tag);
            return Ok(None);
        }

        let release: ReleaseResponse = check_status(response).await?.json().await?;
        Ok(Some(release.into()))
    }

    #[instrument(skip(self, draft), fields(repository = %self.config.repository, tag = %draft.tag_name))]
    async fn create_release(&self, draft: &ReleaseDraft) -> StorageResult<HostedRelease> {
        if self.find_release(&draft.tag_name).await?.is_some() {
            return Err(StorageError::ReleaseAlreadyExists {
                tag: draft.tag_name.clone(),
            });
        }

        let response = self
            .request(reqwest::Method::POST, &self.config.releases_url())
            .json(draft)
            .send()
            .await?;

        // GitHub answers 422 `already_exists` when a concurrent create won the race.
        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            if body.contains("already_exists") {
                return Err(StorageError::ReleaseAlreadyExists {
                    tag: draft.tag_name.clone(),
                });
            }
            return Err(StorageError::Rejected {
                status: 422,
                message: body,
            });
        }

        let release: ReleaseResponse = check_status(response).await?.json().await?;
        info!("Created release {} (id {})", release.tag_name, release.id);
        Ok(release.into())
    }

    #[instrument(skip(self, release, path), fields(release_id = release.id))]
    async fn upload_asset(
        &self,
        release: &HostedRelease,
        name: &str,
        path: &Path,
    ) -> StorageResult<AssetRecord> {
        let bytes = tokio::fs::read(path).await?;
        debug!("Uploading {} ({} bytes)", name, bytes.len());

        let response = self
            .request(
                reqwest::Method::POST,
                &self.config.asset_upload_url(release.id),
            )
            .query(&[("name", name)])
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(StorageError::AssetAlreadyExists {
                tag: release.tag_name.clone(),
                name: name.to_string(),
            });
        }

        let asset: AssetResponse = check_status(response).await?.json().await?;
        Ok(asset.into())
    }

    #[instrument(skip(self, release), fields(release_id = release.id))]
    async fn find_asset(
        &self,
        release: &HostedRelease,
        name: &str,
    ) -> StorageResult<Option<AssetRecord>> {
        let response = self
            .request(
                reqwest::Method::GET,
                &self.config.asset_list_url(release.id),
            )
            .query(&[("per_page", "100")])
            .send()
            .await?;

        let assets: Vec<AssetResponse> = check_status(response).await?.json().await?;
        Ok(assets
            .into_iter()
            .find(|asset| asset.name == name)
            .map(AssetRecord::from))
    }

    #[instrument(skip(self, release), fields(release_id = release.id, tag = %release.tag_name))]
    async fn delete_release(&self, release: &HostedRelease) -> StorageResult<()> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &self.config.release_url(release.id),
            )
            .send()
            .await?;
        check_status(response).await?;
        info!("Deleted release {} (id {})", release.tag_name, release.id);
        Ok(())
    }
}
