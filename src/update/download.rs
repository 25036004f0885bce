//! Streaming download of a new switcher executable

use super::releases::UpdateOffer;
use crate::models::config::NetworkSettings;
use camino::{Utf8Path, Utf8PathBuf};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Download failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Download from {url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("Downloaded file {0} is empty")]
    Empty(Utf8PathBuf),

    #[error("Downloaded file {0} is missing after writing")]
    Missing(Utf8PathBuf),

    #[error("Download incomplete: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Temporary directory is not valid UTF-8: {0}")]
    NonUtf8TempDir(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A verified executable ready for the handoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePackage {
    pub binary_path: Utf8PathBuf,
    pub version: String,
    pub notes: String,
    pub size: u64,
}

/// Downloads update binaries into the system temp directory
#[derive(Debug, Clone)]
pub struct UpdateDownloader {
    client: reqwest::Client,
    temp_dir: Utf8PathBuf,
    file_name: String,
    show_progress: bool,
}

impl UpdateDownloader {
    pub fn new(settings: &NetworkSettings) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .connect_timeout(settings.request_timeout())
            .timeout(settings.download_timeout())
            .build()?;

        let temp_dir = Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .map_err(|p| DownloadError::NonUtf8TempDir(p.display().to_string()))?;

        Ok(Self {
            client,
            temp_dir,
            file_name: format!("{}_update_{}.exe", crate::APP_NAME, std::process::id()),
            show_progress: false,
        })
    }

    /// Download into `dir` instead of the system temp directory
    pub fn with_temp_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Enable or disable the console progress bar
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Where the downloaded executable is written
    pub fn target_path(&self) -> Utf8PathBuf {
        self.temp_dir.join(&self.file_name)
    }

    /// Download the offered executable and verify it.
    ///
    /// Any failure removes the partial file.
    pub async fn download(&self, offer: &UpdateOffer) -> Result<UpdatePackage, DownloadError> {
        let target = self.target_path();

        if target.exists() {
            debug!("Removing leftover download {}", target);
            fs::remove_file(&target)?;
        }

        info!("Downloading {} to {}", offer.download_url, target);

        let result = match self.fetch_to(&offer.download_url, &target).await {
            Ok(written) => verify(&target, written),
            Err(e) => Err(e),
        };

        match result {
            Ok(size) => {
                info!("Downloaded version {} ({} bytes)", offer.version, size);
                Ok(UpdatePackage {
                    binary_path: target,
                    version: offer.version.clone(),
                    notes: offer.notes.clone(),
                    size,
                })
            }
            Err(e) => {
                warn!("Download failed, removing {}: {}", target, e);
                remove_quietly(&target);
                Err(e)
            }
        }
    }

    async fn fetch_to(&self, url: &str, target: &Utf8Path) -> Result<u64, DownloadError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let expected = response.content_length();
        let progress = self.progress_bar(expected);

        let mut file = tokio::fs::File::create(target).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(pb) = &progress {
                pb.set_position(written);
            }
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(pb) = progress {
            pb.finish_with_message("Download complete");
        }

        if let Some(expected) = expected {
            if expected != written {
                return Err(DownloadError::SizeMismatch {
                    expected,
                    actual: written,
                });
            }
        }

        Ok(written)
    }

    fn progress_bar(&self, total: Option<u64>) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = match total {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }
}

/// The file must exist and hold at least one byte.
fn verify(target: &Utf8Path, written: u64) -> Result<u64, DownloadError> {
    let metadata = match fs::metadata(target) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DownloadError::Missing(target.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    if written == 0 || metadata.len() == 0 {
        return Err(DownloadError::Empty(target.to_path_buf()));
    }
    Ok(metadata.len())
}

pub(crate) fn remove_quietly(path: &Utf8Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path, e);
        }
    }
}
