//! GitHub release lookups and version comparison

use crate::models::config::NetworkSettings;
use semver::Version;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Invalid repository '{0}', expected owner/name")]
    InvalidRepo(String),

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Release endpoint {url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("Malformed release JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Release has no tag")]
    MissingTag,

    #[error("'{0}' is not a valid version")]
    InvalidVersion(String),
}

/// Release information
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRelease {
    /// Release tag (e.g. "v1.3.0")
    #[serde(default)]
    pub tag_name: String,

    /// Release notes
    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// Release asset
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

impl RemoteRelease {
    pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn notes(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

/// A newer switcher build that can be installed automatically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOffer {
    pub version: String,
    pub download_url: String,
    pub notes: String,
}

/// Result of comparing the running version against the latest release
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    UpToDate { latest: String },
    Available(UpdateOffer),
    /// A newer release exists but has no matching executable
    AssetMissing { version: String, asset: String },
}

/// Parse a release tag or version string.
///
/// A leading `v` is ignored and short forms such as `1.3` are padded to `1.3.0`.
pub fn parse_version(tag: &str) -> Result<Version, ReleaseError> {
    let trimmed = tag.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if let Ok(version) = Version::parse(bare) {
        return Ok(version);
    }

    let parts: Vec<&str> = bare.split('.').collect();
    let numeric = !parts.is_empty()
        && parts.len() < 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if numeric {
        let padded = format!("{}{}", bare, ".0".repeat(3 - parts.len()));
        if let Ok(version) = Version::parse(&padded) {
            return Ok(version);
        }
    }

    Err(ReleaseError::InvalidVersion(tag.to_string()))
}

/// Compare a fetched release with the running version.
///
/// # Arguments
/// * `release` - Latest release of the switcher repository
/// * `current_version` - Version of the running binary
/// * `asset_name` - Executable name expected among the release assets
pub fn evaluate_release(
    release: &RemoteRelease,
    current_version: &str,
    asset_name: &str,
) -> Result<UpdateCheck, ReleaseError> {
    if release.tag_name.trim().is_empty() {
        return Err(ReleaseError::MissingTag);
    }

    let current = parse_version(current_version)?;
    let latest = parse_version(&release.tag_name)?;

    if latest <= current {
        debug!("Already on latest version: {} (remote {})", current, latest);
        return Ok(UpdateCheck::UpToDate {
            latest: latest.to_string(),
        });
    }

    match release.find_asset(asset_name) {
        Some(asset) => {
            info!("Update available: {} -> {}", current, latest);
            Ok(UpdateCheck::Available(UpdateOffer {
                version: latest.to_string(),
                download_url: asset.browser_download_url.clone(),
                notes: release.notes().to_string(),
            }))
        }
        None => {
            warn!(
                "Release {} has no '{}' asset, cannot update automatically",
                release.tag_name, asset_name
            );
            Ok(UpdateCheck::AssetMissing {
                version: latest.to_string(),
                asset: asset_name.to_string(),
            })
        }
    }
}

fn validate_repo(repo: &str) -> Result<(), ReleaseError> {
    match repo.split_once('/') {
        Some((owner, name))
            if !owner.is_empty()
                && !name.is_empty()
                && !name.contains('/')
                && !repo.chars().any(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err(ReleaseError::InvalidRepo(repo.to_string())),
    }
}

/// Queries the latest release of GitHub repositories
#[derive(Debug, Clone)]
pub struct ReleaseChecker {
    client: reqwest::Client,
    api_base_url: String,
}

impl ReleaseChecker {
    pub fn new(settings: &NetworkSettings) -> Result<Self, ReleaseError> {
        let client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            client,
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the latest published release of `repo` (`owner/name`)
    pub async fn latest_release(&self, repo: &str) -> Result<RemoteRelease, ReleaseError> {
        validate_repo(repo)?;
        let url = format!("{}/repos/{}/releases/latest", self.api_base_url, repo);
        debug!("Fetching latest release from: {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReleaseError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let release: RemoteRelease = serde_json::from_str(&body)?;
        Ok(release)
    }

    /// Tag of the latest release, or `None` when it cannot be determined
    pub async fn latest_tag(&self, repo: &str) -> Option<String> {
        match self.latest_release(repo).await {
            Ok(release) if !release.tag_name.trim().is_empty() => {
                info!("Latest release of {} is {}", repo, release.tag_name);
                Some(release.tag_name)
            }
            Ok(_) => {
                warn!("Latest release of {} has no tag", repo);
                None
            }
            Err(e) => {
                warn!("Could not fetch latest release of {}: {}", repo, e);
                None
            }
        }
    }

    /// Check `repo` for a release newer than `current_version`.
    pub async fn check_for_update(
        &self,
        repo: &str,
        current_version: &str,
        asset_name: &str,
    ) -> Result<UpdateCheck, ReleaseError> {
        let release = self.latest_release(repo).await?;
        evaluate_release(&release, current_version, asset_name)
    }

    /// Like [`check_for_update`](Self::check_for_update), degrading every failure to `None`.
    pub async fn check_self_update(
        &self,
        repo: &str,
        current_version: &str,
        asset_name: &str,
    ) -> Option<UpdateOffer> {
        match self.check_for_update(repo, current_version, asset_name).await {
            Ok(UpdateCheck::Available(offer)) => Some(offer),
            Ok(_) => None,
            Err(e) => {
                warn!("Update check failed: {}", e);
                None
            }
        }
    }
}
