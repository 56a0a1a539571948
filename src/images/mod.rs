//! Numbered JPEG image store
//!
//! Provides:
//! - Max-id discovery by walking the image directory
//! - Content hashing for ETag validation
//! - Request resolution (by id or random) into a serve decision

mod hasher;
mod resolver;
mod scanner;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use hasher::{hash_file, hash_file_until};
pub use resolver::{etag_matches, ImageStore, Resolution};
pub use scanner::{scan_max_id, FALLBACK_ID};

/// Extension of every servable image file
pub const IMAGE_EXTENSION: &str = "jpg";

/// Image store errors
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("deadline passed while reading {}", path.display())]
    TimedOut { path: PathBuf },
}

impl ImageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
