//! Image request resolution
//!
//! Turns a requested id (or a random pick) into a single decision:
//! serve the file, answer "not modified", or report a failure.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Instant;

use rand::Rng;
use tracing::{debug, error, warn};

use super::{hash_file, hash_file_until, scan_max_id, ImageError, IMAGE_EXTENSION};

/// Outcome of resolving one image request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Stream `path` to the client
    ServeFile {
        path: PathBuf,
        file_name: String,
        etag: String,
    },
    /// Client copy is current
    NotModified { etag: String },
    NotFound,
    InternalError,
}

/// Read-only view over a directory of `<id>.jpg` files
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File name for an id, used verbatim as text
    pub fn file_name(id: &str) -> String {
        format!("{}.{}", id, IMAGE_EXTENSION)
    }

    /// Path for an id, or `None` if the id would leave the root directory
    pub fn image_path(&self, id: &str) -> Option<PathBuf> {
        if id.contains(['/', '\\', '\0']) {
            return None;
        }
        Some(self.root.join(Self::file_name(id)))
    }

    /// Pick a uniformly random id in `[1, max_id]`
    pub fn random_id(&self) -> u64 {
        let max_id = scan_max_id(&self.root).max(1);
        rand::rng().random_range(1..=max_id)
    }

    /// Resolve a random image
    pub fn resolve_random(
        &self,
        if_none_match: Option<&str>,
        deadline: Option<Instant>,
    ) -> Resolution {
        let id = self.random_id();
        debug!("Random image pick: {}", id);
        self.resolve_by_id(&id.to_string(), if_none_match, deadline)
    }

    /// Resolve the image with the given id text
    ///
    /// `if_none_match` is the raw `If-None-Match` header value, if any.
    /// Hashing stops early once `deadline` passes.
    pub fn resolve_by_id(
        &self,
        id: &str,
        if_none_match: Option<&str>,
        deadline: Option<Instant>,
    ) -> Resolution {
        let Some(path) = self.image_path(id) else {
            debug!("Rejected image id {:?}", id);
            return Resolution::NotFound;
        };

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Resolution::NotFound,
            Err(e) if e.kind() == ErrorKind::NotFound => return Resolution::NotFound,
            Err(e) => {
                error!("Failed to stat {}: {}", path.display(), e);
                return Resolution::InternalError;
            }
        }

        let hashed = match deadline {
            Some(deadline) => hash_file_until(&path, deadline),
            None => hash_file(&path),
        };
        let etag = match hashed {
            Ok(etag) => etag,
            Err(e @ ImageError::TimedOut { .. }) => {
                warn!("Gave up generating ETag: {}", e);
                return Resolution::InternalError;
            }
            Err(e) => {
                error!("Failed to generate ETag: {}", e);
                return Resolution::InternalError;
            }
        };

        if if_none_match.is_some_and(|header| etag_matches(header, &etag)) {
            return Resolution::NotModified { etag };
        }

        Resolution::ServeFile {
            path,
            file_name: Self::file_name(id),
            etag,
        }
    }
}

/// Check an `If-None-Match` header value against a bare hex validator
///
/// Accepts bare or quoted tags, weak tags, comma-separated lists and `*`.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        if candidate == "*" {
            return true;
        }
        let tag = candidate.strip_prefix("W/").unwrap_or(candidate);
        let tag = tag
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(tag);
        !tag.is_empty() && tag == etag
    })
}
