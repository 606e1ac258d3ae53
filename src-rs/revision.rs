//! Deployed revision lookup.

use std::fs;
use std::path::Path;

use tracing::debug;

pub const UNKNOWN_REVISION: &str = "unknown";

/// Read the deployed revision identifier, `"unknown"` when the file is
/// missing, unreadable or empty.
pub fn read_revision(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(raw) => {
            let rev = raw.trim_end_matches(['\r', '\n']);
            if rev.is_empty() {
                UNKNOWN_REVISION.to_string()
            } else {
                rev.to_string()
            }
        }
        Err(err) => {
            debug!(path = %path.display(), %err, "no revision file");
            UNKNOWN_REVISION.to_string()
        }
    }
}

pub fn revision_link(repository: &str, revision: &str) -> Option<String> {
    if revision == UNKNOWN_REVISION {
        return None;
    }
    Some(format!(
        "{}/commit/{}",
        repository.trim_end_matches('/'),
        revision
    ))
}
