// Install the latest published mod release straight from GitHub.

use super::orchestrator::{BuildOrchestrator, BuildReport};
use crate::models::config::NetworkSettings;
use crate::update::releases::ReleaseChecker;
use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use futures_util::StreamExt;
use std::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Downloads a tagged source archive of the mod and builds it.
pub struct ModRetriever {
    client: reqwest::Client,
    checker: ReleaseChecker,
    github_base_url: String,
    orchestrator: BuildOrchestrator,
}

impl ModRetriever {
    pub fn new(settings: &NetworkSettings, orchestrator: BuildOrchestrator) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .connect_timeout(settings.request_timeout())
            .timeout(settings.download_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            checker: ReleaseChecker::new(settings)?,
            github_base_url: settings.github_base_url.trim_end_matches('/').to_string(),
            orchestrator,
        })
    }

    /// Source archive URL of `tag`
    pub fn archive_url(&self, repo: &str, tag: &str) -> String {
        format!(
            "{}/{}/archive/refs/tags/{}.zip",
            self.github_base_url, repo, tag
        )
    }

    /// Build the latest release of `repo` into `install_dir`.
    ///
    /// # Returns
    /// The build report; the marker records the release tag on success
    pub async fn install_latest(&self, repo: &str, install_dir: &Utf8Path) -> Result<BuildReport> {
        let tag = self
            .checker
            .latest_tag(repo)
            .await
            .ok_or_else(|| anyhow!("Could not determine the latest release of {}", repo))?;

        let workspace = tempfile::Builder::new()
            .prefix("gh_download_")
            .tempdir()
            .context("Failed to create download directory")?;
        let workspace_root = Utf8PathBuf::from_path_buf(workspace.path().to_path_buf())
            .map_err(|p| anyhow!("Temporary path is not UTF-8: {}", p.display()))?;

        let zip_path = workspace_root.join(format!("{}.zip", tag.replace('/', "_")));
        let url = self.archive_url(repo, &tag);
        self.download(&url, &zip_path).await?;

        let extract_root = workspace_root.join("src");
        extract_zip(&zip_path, &extract_root)?;

        let repo_name = repo.rsplit('/').next().unwrap_or(repo);
        let content = find_content_dir(&extract_root, repo_name)?;
        tracing::info!("Building mod {} from {}", tag, content);

        let report = self
            .orchestrator
            .build_all(&content, install_dir, &tag)
            .await?;
        Ok(report)
    }

    async fn download(&self, url: &str, target: &Utf8Path) -> Result<()> {
        tracing::info!("Downloading {} to {}", url, target);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("Download of {} returned HTTP {}", url, status);
        }

        let mut file = tokio::fs::File::create(target)
            .await
            .with_context(|| format!("Failed to create {}", target))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Download of {} interrupted", url))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Unpack `zip_path` into `dest`, skipping entries that would escape it.
pub fn extract_zip(zip_path: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    let file = File::open(zip_path).with_context(|| format!("Failed to open {}", zip_path))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("{} is not a valid zip archive", zip_path))?;

    fs::create_dir_all(dest).with_context(|| format!("Failed to create {}", dest))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe zip entry: {}", entry.name());
            continue;
        };
        let out_path = dest.as_std_path().join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&out_path)
                .with_context(|| format!("Failed to create {}", out_path.display()))?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }

    tracing::info!("Extracted {} entries to {}", archive.len(), dest);
    Ok(())
}

/// The single top-level folder of an extracted archive, or the one named after the repository.
pub fn find_content_dir(root: &Utf8Path, repo_name: &str) -> Result<Utf8PathBuf> {
    let mut dirs = Vec::new();
    for entry in root
        .read_dir_utf8()
        .with_context(|| format!("Failed to list {}", root))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path().to_path_buf());
        }
    }

    match dirs.len() {
        0 => bail!("No directory found after extraction in {}", root),
        1 => Ok(dirs.remove(0)),
        _ => {
            let matching: Vec<_> = dirs
                .into_iter()
                .filter(|d| d.file_name().is_some_and(|n| n.starts_with(repo_name)))
                .collect();
            match matching.as_slice() {
                [only] => {
                    tracing::warn!("Multiple directories found, selected {}", only);
                    Ok(only.clone())
                }
                _ => bail!(
                    "Could not determine the mod directory among the contents of {}",
                    root
                ),
            }
        }
    }
}
