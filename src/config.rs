use std::env;
use std::path::Path;

use serde::Deserialize;

#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the JSON settings file carrying folder entries + alerting.
    pub settings_file: String,
    // Local object storage fallback (used when an entry's s3_bucket is empty)
    pub local_store_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        let settings_file =
            env::var("SETTINGS_FILE").unwrap_or_else(|_| "./settings.json".to_string());
        let local_store_dir =
            env::var("LOCAL_STORE_DIR").unwrap_or_else(|_| "./data/object_store".to_string());

        Self {
            settings_file,
            local_store_dir,
        }
    }
}

/// One watched folder. Immutable after load.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigEntry {
    pub name: String,
    pub watch_folder: String,
    /// Empty means "delete after successful upload" instead of moving.
    #[serde(default)]
    pub done_folder: String,
    /// Empty means "delete after retries are exhausted" instead of moving.
    #[serde(default)]
    pub fail_folder: String,
    /// 0 or negative keeps retrying forever; such files are never routed to
    /// the fail folder.
    #[serde(default)]
    pub max_retries: i32,
    #[serde(default = "default_wakeup_seconds")]
    pub wakeup_seconds: u64,
    #[serde(default)]
    pub grace_seconds: u64,
    /// Glob applied to file names during the recursive walk, e.g. "*.pdf".
    pub file_mask: String,
    #[serde(default)]
    pub add_random_id_to_files: bool,
    #[serde(default)]
    pub add_random_id_to_leaf_dir: bool,
    #[serde(default)]
    pub prepend_date: bool,
    /// Series pattern sets: empty = never matches, "*" = always, otherwise a
    /// comma-separated list of series-key prefixes.
    #[serde(default)]
    pub wait_for_series: String,
    #[serde(default)]
    pub fake_series: String,
    #[serde(default)]
    pub s3_access_key: String,
    #[serde(default)]
    pub s3_secret_key: String,
    #[serde(default)]
    pub s3_region: String,
    // Empty bucket means "use the local store dir" (handy for local dev + tests).
    #[serde(default)]
    pub s3_bucket: String,
    #[serde(default)]
    pub s3_endpoint: Option<String>, // For MinIO / Supabase Storage / R2 / etc.
    /// Object key prefix for everything this folder uploads.
    pub start_key: String,
}

fn default_wakeup_seconds() -> u64 {
    30
}

impl ConfigEntry {
    /// Whether uploads from this folder go through the series companion policy.
    pub fn has_series_policy(&self) -> bool {
        !self.wait_for_series.trim().is_empty() || !self.fake_series.trim().is_empty()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppSettings {
    pub entries: Vec<ConfigEntry>,
    #[serde(default = "default_inactivity_alert_seconds")]
    pub inactivity_alert_seconds: u64,
    /// Empty disables the inactivity monitor entirely.
    #[serde(default)]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default)]
    pub smtp_from: String,
    #[serde(default)]
    pub smtp_to: String,
    /// Daily alert silence window, "HH:mm" UTC. Either side empty disables
    /// the window.
    #[serde(default)]
    pub silence_start_time: String,
    #[serde(default)]
    pub silence_end_time: String,
    /// Metrics sink base URL. Empty disables metric reporting.
    #[serde(default)]
    pub monitoring_url: String,
}

fn default_inactivity_alert_seconds() -> u64 {
    600
}

fn default_smtp_port() -> u16 {
    587
}

impl AppSettings {
    /// Load and validate the settings file. Any failure here is fatal to
    /// startup; the service never runs on a partial configuration.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read settings file {}: {}", path.display(), e))?;
        let settings: AppSettings = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("cannot parse settings file {}: {}", path.display(), e))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for entry in &self.entries {
            if entry.name.trim().is_empty() {
                anyhow::bail!("folder entry with empty name");
            }
            if entry.watch_folder.trim().is_empty() {
                anyhow::bail!("folder entry '{}' has no watch_folder", entry.name);
            }
            if entry.file_mask.trim().is_empty() {
                anyhow::bail!("folder entry '{}' has no file_mask", entry.name);
            }
            // The watcher moves processed files out of the watch subtree; a
            // done/fail folder equal to the watch folder would re-stage them.
            for (label, folder) in [
                ("done_folder", &entry.done_folder),
                ("fail_folder", &entry.fail_folder),
            ] {
                if !folder.is_empty() && folder == &entry.watch_folder {
                    anyhow::bail!(
                        "folder entry '{}': {} must differ from watch_folder",
                        entry.name,
                        label
                    );
                }
            }
            if !entry.done_folder.is_empty() && entry.done_folder == entry.fail_folder {
                anyhow::bail!(
                    "folder entry '{}': done_folder and fail_folder must be distinct",
                    entry.name
                );
            }
        }
        Ok(())
    }
}
