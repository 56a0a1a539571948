//! Content hashing for cache validation

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::Instant;

use sha2::{Digest, Sha256};

use super::ImageError;

/// Bytes read between deadline checks
const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the lowercase hex SHA-256 of a file's content
///
/// The file is streamed through the digest, never read whole into memory.
pub fn hash_file(path: &Path) -> Result<String, ImageError> {
    hash_chunks(path, None)
}

/// Like [`hash_file`], but gives up with [`ImageError::TimedOut`] once
/// `deadline` passes. The deadline is checked between chunks.
pub fn hash_file_until(path: &Path, deadline: Instant) -> Result<String, ImageError> {
    hash_chunks(path, Some(deadline))
}

fn hash_chunks(path: &Path, deadline: Option<Instant>) -> Result<String, ImageError> {
    let mut file = File::open(path).map_err(|e| ImageError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(ImageError::TimedOut {
                path: path.to_path_buf(),
            });
        }

        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ImageError::io(path, e)),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
