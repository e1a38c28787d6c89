//! Per-folder upload pipeline: discover → stage → attempt → route.
//!
//! One watcher task runs per configured folder. Each wakeup it lists the
//! watch subtree, stages unseen files, and processes whatever has cleared
//! the grace period: a successful upload moves the file to the done folder
//! (mirroring its watch-relative path), a failed one burns a retry, and an
//! exhausted retry budget routes the file to the fail folder. An empty
//! done/fail folder deletes instead of moving. A bad file or a bad cycle is
//! logged and never stops the loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::ConfigEntry;
use crate::error::UploadError;
use crate::s3::Uploader;
use crate::staging::StagingSet;

pub struct FolderWatcher {
    entry: ConfigEntry,
    uploader: Arc<dyn Uploader>,
    staging: StagingSet,
}

impl FolderWatcher {
    pub fn new(entry: ConfigEntry, uploader: Arc<dyn Uploader>) -> Self {
        Self {
            entry,
            uploader,
            staging: StagingSet::new(),
        }
    }

    /// Poll until cancelled. Sleeps first, so a fresh start doesn't hammer
    /// the folder before anything can arrive.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            tracing::trace!(
                folder = %self.entry.name,
                "waiting for {} seconds",
                self.entry.wakeup_seconds
            );
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(self.entry.wakeup_seconds)) => {}
            }
            if token.is_cancelled() {
                return;
            }

            if let Err(e) = self.run_cycle().await {
                tracing::error!(folder = %self.entry.name, error = %e, "watch cycle failed");
            }
        }
    }

    /// One discover + process pass. Public so tests can drive cycles
    /// without the timing loop.
    pub async fn run_cycle(&mut self) -> anyhow::Result<()> {
        self.discover().await?;
        self.process().await?;
        Ok(())
    }

    pub fn staged_count(&self) -> usize {
        self.staging.len()
    }

    async fn discover(&mut self) -> anyhow::Result<()> {
        let entry = self.entry.clone();
        let found = tokio::task::spawn_blocking(move || discover_files(&entry)).await??;
        for path in found {
            if self.staging.stage(path.clone()) {
                tracing::debug!(folder = %self.entry.name, file = %path.display(), "staging file");
            }
        }
        Ok(())
    }

    async fn process(&mut self) -> anyhow::Result<()> {
        let now = Utc::now();
        for path in self.staging.snapshot() {
            let (eligible, retries) = match self.staging.get_mut(&path) {
                Some(staged) => (
                    staged.eligible_at(now, self.entry.grace_seconds),
                    staged.retries,
                ),
                None => continue,
            };
            if !eligible {
                continue;
            }

            tracing::debug!(file = %path.display(), retry = retries, "uploading file");
            match self.attempt(&path).await {
                Ok(()) => {
                    tracing::debug!(file = %path.display(), "upload complete");
                    route_file(&self.entry, &path, &self.entry.done_folder).await?;
                    self.staging.remove(&path);
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "upload failed");
                    let exhausted = match self.staging.get_mut(&path) {
                        Some(staged) => {
                            staged.retries += 1;
                            self.entry.max_retries > 0 && staged.retries >= self.entry.max_retries
                        }
                        None => false,
                    };
                    if exhausted {
                        tracing::warn!(
                            file = %path.display(),
                            "retries exhausted, moving to fail folder"
                        );
                        route_file(&self.entry, &path, &self.entry.fail_folder).await?;
                        self.staging.remove(&path);
                    }
                }
            }
        }
        Ok(())
    }

    async fn attempt(&self, path: &Path) -> Result<(), UploadError> {
        // One correlation id per logical unit; the series policy reuses it
        // for companions and the manifest.
        let correlation_id = Uuid::new_v4();
        self.uploader
            .upload(&self.entry, path, None, correlation_id)
            .await
    }
}

fn discover_files(entry: &ConfigEntry) -> anyhow::Result<Vec<PathBuf>> {
    let mask = glob::Pattern::new(&entry.file_mask)?;
    let mut found = Vec::new();
    for dirent in WalkDir::new(&entry.watch_folder) {
        let dirent = match dirent {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(folder = %entry.name, error = %e, "walk error");
                continue;
            }
        };
        if !dirent.file_type().is_file() {
            continue;
        }
        if mask.matches(&dirent.file_name().to_string_lossy()) {
            found.push(dirent.into_path());
        }
    }
    Ok(found)
}

/// Move `source` out of the watch subtree, re-rooted under `target_folder`
/// at its watch-relative path. An empty target folder deletes the source.
/// The move replaces any existing file at the destination.
pub(crate) async fn route_file(
    entry: &ConfigEntry,
    source: &Path,
    target_folder: &str,
) -> std::io::Result<()> {
    if target_folder.is_empty() {
        tracing::debug!(file = %source.display(), "deleting file");
        return tokio::fs::remove_file(source).await;
    }

    let relative = source
        .strip_prefix(&entry.watch_folder)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(source.file_name().unwrap_or_default()));
    let target = Path::new(target_folder).join(relative);

    tracing::debug!(file = %source.display(), target = %target.display(), "moving file");
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::rename(source, &target).await {
        Ok(()) => Ok(()),
        // rename can't cross filesystems; fall back to copy + remove
        Err(_) => {
            tokio::fs::copy(source, &target).await?;
            tokio::fs::remove_file(source).await
        }
    }
}
