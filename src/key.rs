//! Object key construction.
//!
//! Keys are laid out as:
//!   {start_key}/[{yyyy}/{MM}/{dd}/]{path relative to the watch folder}
//!
//! with two optional twists driven by the folder entry:
//! - a fresh random 32-hex id prepended (dot-separated) to the file's base
//!   name, so repeated uploads of the same path can never overwrite each
//!   other by coincidence;
//! - the unit's correlation id injected as an extra leaf directory segment,
//!   grouping a primary file with its companions in the key space.

use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use crate::config::ConfigEntry;

/// Build the object key for one file. Deterministic for given inputs and
/// current UTC date unless `add_random_id_to_files` is set, in which case
/// every call yields a distinct key.
pub fn build_key(entry: &ConfigEntry, path: &Path, correlation_id: Uuid) -> String {
    let mut prefix = format!("{}/", entry.start_key);
    if entry.prepend_date {
        prefix.push_str(&Utc::now().format("%Y/%m/%d/").to_string());
    }

    let relative = path
        .strip_prefix(&entry.watch_folder)
        .unwrap_or(path);
    let mut relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    if entry.add_random_id_to_files {
        let id = Uuid::new_v4().simple().to_string();
        relative = match relative.rfind('/') {
            Some(idx) => format!("{}/{}.{}", &relative[..idx], id, &relative[idx + 1..]),
            None => format!("{}.{}", id, relative),
        };
    }

    if entry.add_random_id_to_leaf_dir {
        if let Some(idx) = relative.rfind('/') {
            if idx > 0 {
                relative.insert_str(idx, &format!("/{}", correlation_id.simple()));
            }
        }
    }

    format!("{}{}", prefix, relative)
}
