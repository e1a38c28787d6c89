use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

/// A discovered file waiting to be uploaded.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    /// Set once, on first sighting. The grace period counts from here.
    pub discovered_at: DateTime<Utc>,
    pub retries: i32,
}

impl StagedFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            discovered_at: Utc::now(),
            retries: 0,
        }
    }

    /// A file still inside its grace period may be mid-write; don't touch it.
    pub fn eligible_at(&self, now: DateTime<Utc>, grace_seconds: u64) -> bool {
        self.discovered_at + Duration::seconds(grace_seconds as i64) <= now
    }
}

/// Files discovered but not yet routed out of the watch folder. Keyed by
/// absolute path, so a path is never staged twice concurrently.
#[derive(Debug, Default)]
pub struct StagingSet {
    files: HashMap<PathBuf, StagedFile>,
}

impl StagingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly discovered path. Returns true if it was not already
    /// staged; re-discovery of a known path is a no-op.
    pub fn stage(&mut self, path: PathBuf) -> bool {
        if self.files.contains_key(&path) {
            return false;
        }
        self.files.insert(path.clone(), StagedFile::new(path));
        true
    }

    pub fn remove(&mut self, path: &Path) {
        self.files.remove(path);
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut StagedFile> {
        self.files.get_mut(path)
    }

    /// Snapshot of currently staged paths. The processing pass iterates this
    /// copy, so entries inserted mid-pass wait until the next cycle.
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_the_same_path_twice_is_a_noop() {
        let mut set = StagingSet::new();
        assert!(set.stage(PathBuf::from("/w/a.pdf")));
        assert!(!set.stage(PathBuf::from("/w/a.pdf")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn grace_period_gates_eligibility() {
        let file = StagedFile::new(PathBuf::from("/w/a.pdf"));
        let now = Utc::now();
        assert!(!file.eligible_at(now, 60));
        assert!(file.eligible_at(now + Duration::seconds(61), 60));
    }

    #[test]
    fn zero_grace_is_immediately_eligible() {
        let file = StagedFile::new(PathBuf::from("/w/a.pdf"));
        assert!(file.eligible_at(Utc::now(), 0));
    }

    #[test]
    fn removal_allows_restaging() {
        let mut set = StagingSet::new();
        let path = PathBuf::from("/w/a.pdf");
        set.stage(path.clone());
        set.remove(&path);
        assert!(set.is_empty());
        assert!(set.stage(path));
    }
}
