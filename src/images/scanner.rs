//! Max-id discovery
//!
//! Random selection draws from `[1, max_id]`, where `max_id` is the largest
//! numeric file stem among `*.jpg` files under the image root.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::IMAGE_EXTENSION;

/// Returned when the store holds no numbered image (may not exist on disk)
pub const FALLBACK_ID: u64 = 1;

/// Find the highest numbered image under `root`
///
/// Files whose stem is not a number are logged and skipped. A traversal
/// error aborts the walk and yields [`FALLBACK_ID`]. Never fails.
pub fn scan_max_id(root: &Path) -> u64 {
    let mut max_id = 0;

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to walk image directory {}: {}", root.display(), e);
                return FALLBACK_ID;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(IMAGE_EXTENSION) {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        match stem.parse::<u64>() {
            Ok(id) => max_id = max_id.max(id),
            Err(e) => warn!("Skipping image with non-numeric name {}: {}", path.display(), e),
        }
    }

    debug!("Max image id under {}: {}", root.display(), max_id);

    if max_id == 0 {
        FALLBACK_ID
    } else {
        max_id
    }
}
