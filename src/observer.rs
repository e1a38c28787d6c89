use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Shared record of upload activity: the last successful upload time plus a
/// cumulative per-folder counter. Written by every uploader, read by the
/// inactivity monitor; the one mutex protects both fields together so a
/// reader never sees a count bump without its timestamp.
#[derive(Debug)]
pub struct UploadObserver {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    last_upload: DateTime<Utc>,
    counts: HashMap<String, u64>,
}

impl UploadObserver {
    /// Starts with `last_upload = now` so a freshly booted service is not
    /// immediately considered inactive.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                last_upload: Utc::now(),
                counts: HashMap::new(),
            }),
        }
    }

    pub fn record_upload(&self, folder_name: &str) {
        let mut inner = self.inner.lock().expect("observer lock poisoned");
        inner.last_upload = Utc::now();
        *inner.counts.entry(folder_name.to_string()).or_insert(0) += 1;
    }

    pub fn last_upload(&self) -> DateTime<Utc> {
        self.inner.lock().expect("observer lock poisoned").last_upload
    }

    /// Point-in-time snapshot, safe to iterate without holding the lock.
    pub fn upload_counts(&self) -> HashMap<String, u64> {
        self.inner
            .lock()
            .expect("observer lock poisoned")
            .counts
            .clone()
    }
}

impl Default for UploadObserver {
    fn default() -> Self {
        Self::new()
    }
}
