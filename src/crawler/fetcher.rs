//! Archive fetcher implementation
//!
//! This module downloads one source archive per repository, including:
//! - Resolving the branch and the archive URL
//! - Deterministic file naming from full name and branch
//! - Waiting out an exhausted API quota before retrying the same archive
//! - Streaming the body to a `.part` file that is renamed on completion
//! - Turning every failure into a recorded outcome

use crate::config::Config;
use crate::github::{normalize_base_url, quota_reset_wait, RepoItem, Sleeper, TokioSleeper};
use crate::state::DownloadOutcome;
use crate::HarvestError;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Builds the archive file name for a repository and branch
///
/// Slashes in either part become `#`, so `octo/shop` on `release/v1` is stored
/// as `octo#shop@release#v1.zip`.
pub fn archive_file_name(full_name: &str, branch: &str) -> String {
    format!("{}@{}.zip", full_name.replace('/', "#"), branch.replace('/', "#"))
}

/// Downloads repository archives into the output directory
pub struct ArchiveFetcher {
    http: Client,
    base_url: Url,
    output_dir: PathBuf,
    default_branch: String,
    skip_existing: bool,
    timeout: Duration,
    sleeper: Arc<dyn Sleeper>,
    reset_margin: Duration,
}

impl ArchiveFetcher {
    pub fn new(
        http: Client,
        base_url: &str,
        output_dir: impl Into<PathBuf>,
        default_branch: impl Into<String>,
        skip_existing: bool,
        timeout: Duration,
    ) -> Result<Self, HarvestError> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            output_dir: output_dir.into(),
            default_branch: default_branch.into(),
            skip_existing,
            timeout,
            sleeper: Arc::new(TokioSleeper),
            reset_margin: Duration::from_secs(5),
        })
    }

    /// Replaces the waiting strategy and the margin added to quota resets
    pub fn with_rate_limit(mut self, sleeper: Arc<dyn Sleeper>, reset_margin: Duration) -> Self {
        self.sleeper = sleeper;
        self.reset_margin = reset_margin;
        self
    }

    pub fn from_config(config: &Config, http: Client, sleeper: Arc<dyn Sleeper>) -> Result<Self, HarvestError> {
        let archive = &config.archive;
        let fetcher = Self::new(
            http,
            &archive.base_url,
            &archive.output_dir,
            archive.default_branch.clone(),
            archive.skip_existing,
            Duration::from_secs(archive.timeout_secs),
        )?;
        Ok(fetcher.with_rate_limit(
            sleeper,
            Duration::from_secs(config.rate_limit.reset_margin_secs),
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Branch to download: the reported default branch or the configured fallback
    pub fn resolve_branch(&self, item: &RepoItem) -> String {
        item.default_branch
            .clone()
            .unwrap_or_else(|| self.default_branch.clone())
    }

    /// `<base>/repos/<full_name>/zipball/<branch>`
    ///
    /// Each segment is percent-encoded, so `#`, `?` and `%` in a branch name
    /// stay part of the path. Slashes still separate segments.
    pub fn archive_url(&self, full_name: &str, branch: &str) -> Result<Url, url::ParseError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push("repos")
            .extend(full_name.split('/'))
            .push("zipball")
            .extend(branch.split('/'));
        Ok(url)
    }

    /// Location of the finished archive on disk
    pub fn archive_path(&self, full_name: &str, branch: &str) -> PathBuf {
        self.output_dir.join(archive_file_name(full_name, branch))
    }

    /// Fetches the archive of one repository
    ///
    /// Never fails: network, HTTP and IO errors come back as a `Failed`
    /// outcome carrying the error message.
    pub async fn fetch(&self, item: &RepoItem) -> DownloadOutcome {
        let branch = self.resolve_branch(item);
        let path = self.archive_path(&item.full_name, &branch);

        if self.skip_existing && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!("Archive for {} already present, skipping", item.full_name);
            return DownloadOutcome::downloaded(item.clone(), branch, path, "already present");
        }

        match self.download(&item.full_name, &branch, &path).await {
            Ok(bytes) => {
                tracing::info!("Downloaded {} ({} bytes)", item.full_name, bytes);
                DownloadOutcome::downloaded(item.clone(), branch, path, "downloaded")
            }
            Err(message) => {
                tracing::warn!("Failed to download {}: {}", item.full_name, message);
                DownloadOutcome::failed(item.clone(), branch, message).with_archive_path(path)
            }
        }
    }

    async fn download(&self, full_name: &str, branch: &str, path: &Path) -> Result<u64, String> {
        let url = self
            .archive_url(full_name, branch)
            .map_err(|e| format!("invalid archive URL: {}", e))?;

        let mut response = loop {
            tracing::debug!("GET {}", url);
            let response = self
                .http
                .get(url.clone())
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| e.to_string())?;

            let status = response.status();
            if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
                let now = chrono::Utc::now().timestamp();
                if let Some(wait) = quota_reset_wait(response.headers(), now, self.reset_margin) {
                    tracing::warn!(
                        "Rate limit exhausted while fetching {} (HTTP {}), sleeping {}s until reset",
                        full_name,
                        status.as_u16(),
                        wait.as_secs()
                    );
                    self.sleeper.sleep(wait).await;
                    continue;
                }
            }
            break response;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
            .trim_end()
            .to_string());
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| e.to_string())?;

        let part = part_path(path);
        let written = match stream_to_file(&mut response, &part).await {
            Ok(written) => written,
            Err(message) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(message);
            }
        };

        if let Err(e) = tokio::fs::rename(&part, path).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e.to_string());
        }

        Ok(written)
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

async fn stream_to_file(response: &mut reqwest::Response, part: &Path) -> Result<u64, String> {
    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(|e| e.to_string())?;
    let mut written: u64 = 0;

    while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| e.to_string())?;
    Ok(written)
}
