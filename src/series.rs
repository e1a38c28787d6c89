//! Series companion policy.
//!
//! Some folders receive rendered documents that must be uploaded together
//! with two companion text files dropped next to them (suffixed `_a.txt` and
//! `_b.txt`). This policy wraps the base uploader for exactly those folders:
//! it parses the series key out of the primary file's name, waits for (or
//! fakes) the companions, uploads the whole unit under one correlation id,
//! and finishes with an `index.json` manifest describing the trio. Folders
//! without series configuration never go through this path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::ConfigEntry;
use crate::error::UploadError;
use crate::s3::Uploader;
use crate::watcher::route_file;

/// Body written into synthesized companion files.
const PLACEHOLDER_BODY: &str = "placeholder";

/// The series key is everything after the first `_` in the file name, with a
/// trailing `.pdf` stripped case-insensitively. A name without a usable key
/// is not eligible for series processing.
pub fn series_key(file_name: &str) -> Result<String, UploadError> {
    let key = match file_name.split_once('_') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => return Err(UploadError::InvalidSeriesName(file_name.to_string())),
    };
    let key = if key.to_ascii_lowercase().ends_with(".pdf") {
        &key[..key.len() - 4]
    } else {
        key
    };
    Ok(key.to_string())
}

/// Pattern sets are empty (never matches), the wildcard `*` (always), or a
/// comma-separated list of series-key prefixes.
pub fn pattern_matches(set: &str, series_key: &str) -> bool {
    let set = set.trim();
    if set.is_empty() {
        return false;
    }
    if set == "*" {
        return true;
    }
    set.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| series_key.starts_with(p))
}

/// Find the `_a.txt` / `_b.txt` companions among the primary file's siblings
/// (non-recursive, case-insensitive suffix match).
fn find_companions(dir: &Path) -> std::io::Result<(Option<PathBuf>, Option<PathBuf>)> {
    let mut a = None;
    let mut b = None;
    for dirent in std::fs::read_dir(dir)? {
        let dirent = dirent?;
        if !dirent.file_type()?.is_file() {
            continue;
        }
        let name = dirent.file_name().to_string_lossy().to_ascii_lowercase();
        if name.ends_with("_a.txt") {
            a = Some(dirent.path());
        } else if name.ends_with("_b.txt") {
            b = Some(dirent.path());
        }
    }
    Ok((a, b))
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Decorator over the base uploader implementing the companion policy.
pub struct SeriesUploader {
    inner: Arc<dyn Uploader>,
}

impl SeriesUploader {
    pub fn new(inner: Arc<dyn Uploader>) -> Self {
        Self { inner }
    }

    /// Write placeholder companions for a series that is allowed to proceed
    /// without the real ones. They are routed to the done folder like any
    /// companion afterwards.
    async fn fake_missing(
        &self,
        primary: &Path,
        dir: &Path,
        a: &mut Option<PathBuf>,
        b: &mut Option<PathBuf>,
    ) -> Result<(), UploadError> {
        let stem = primary
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if a.is_none() {
            let path = dir.join(format!("{stem}_a.txt"));
            tokio::fs::write(&path, PLACEHOLDER_BODY).await?;
            tracing::debug!(file = %path.display(), "synthesized companion");
            *a = Some(path);
        }
        if b.is_none() {
            let path = dir.join(format!("{stem}_b.txt"));
            tokio::fs::write(&path, PLACEHOLDER_BODY).await?;
            tracing::debug!(file = %path.display(), "synthesized companion");
            *b = Some(path);
        }
        Ok(())
    }
}

#[async_trait]
impl Uploader for SeriesUploader {
    async fn upload(
        &self,
        entry: &ConfigEntry,
        path: &Path,
        contents: Option<&str>,
        correlation_id: Uuid,
    ) -> Result<(), UploadError> {
        let file_name = base_name(path);
        let key = series_key(&file_name)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let (mut a, mut b) = find_companions(dir)?;
        if a.is_none() || b.is_none() {
            if !pattern_matches(&entry.wait_for_series, &key) {
                // Series not required for this key; proceed with whatever
                // companions happen to be present.
            } else if pattern_matches(&entry.fake_series, &key) {
                self.fake_missing(path, dir, &mut a, &mut b).await?;
            } else {
                // Companions may still arrive; fail the attempt and let the
                // normal retry accounting bring us back.
                return Err(UploadError::MissingCompanions(path.to_path_buf()));
            }
        }

        for companion in [&a, &b].into_iter().flatten() {
            self.inner
                .upload(entry, companion, None, correlation_id)
                .await?;
        }
        self.inner.upload(entry, path, contents, correlation_id).await?;

        let manifest = serde_json::json!({
            "pdf": file_name,
            "a": a.as_deref().map(base_name),
            "b": b.as_deref().map(base_name),
        })
        .to_string();
        self.inner
            .upload(entry, &dir.join("index.json"), Some(&manifest), correlation_id)
            .await?;

        // The primary file's routing stays with the watcher loop.
        for companion in [a, b].into_iter().flatten() {
            route_file(entry, &companion, &entry.done_folder).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_key_is_after_first_underscore() {
        assert_eq!(series_key("doc_SERIES1-part2.pdf").unwrap(), "SERIES1-part2");
        assert_eq!(series_key("a_b_c.PDF").unwrap(), "b_c");
        assert_eq!(series_key("doc_SERIES1.txt").unwrap(), "SERIES1.txt");
    }

    #[test]
    fn names_without_a_key_are_invalid() {
        assert!(matches!(
            series_key("nodashes.pdf"),
            Err(UploadError::InvalidSeriesName(_))
        ));
        assert!(matches!(
            series_key("trailing_"),
            Err(UploadError::InvalidSeriesName(_))
        ));
    }

    #[test]
    fn pattern_set_semantics() {
        assert!(!pattern_matches("", "SERIES1"));
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("SERIES1,SERIES2", "SERIES2-part9"));
        assert!(!pattern_matches("SERIES1,SERIES2", "SERIES3"));
        assert!(pattern_matches(" SERIES1 , SERIES2 ", "SERIES1"));
    }

    #[test]
    fn companions_found_by_suffix_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc_S1_A.TXT"), b"a").unwrap();
        std::fs::write(dir.path().join("doc_S1_b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("doc_S1.pdf"), b"p").unwrap();

        let (a, b) = find_companions(dir.path()).unwrap();
        assert_eq!(base_name(&a.unwrap()), "doc_S1_A.TXT");
        assert_eq!(base_name(&b.unwrap()), "doc_S1_b.txt");
    }

    #[test]
    fn companion_lookup_is_not_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/doc_S1_a.txt"), b"a").unwrap();

        let (a, b) = find_companions(dir.path()).unwrap();
        assert!(a.is_none());
        assert!(b.is_none());
    }
}
