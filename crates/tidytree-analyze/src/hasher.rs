//! BLAKE3 content fingerprints.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use blake3::Hasher;

use tidytree_core::{Fingerprint, TidyError};

/// Read buffer size for streaming hashes.
const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the fingerprint of a file by streaming its content.
pub fn hash_file(path: &Path) -> Result<Fingerprint, TidyError> {
    let mut file = File::open(path).map_err(|e| TidyError::io(path, e))?;
    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TidyError::io(path, e)),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Fingerprint::new(*hasher.finalize().as_bytes()))
}

/// Compute the fingerprint of in-memory content.
pub fn hash_bytes(bytes: &[u8]) -> Fingerprint {
    Fingerprint::new(*blake3::hash(bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_hash_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::write(&a, "same content").unwrap();
        fs::write(&b, "same content").unwrap();

        assert_eq!(hash_file(&a).unwrap(), hash_file(&a).unwrap());
        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
        assert_eq!(hash_file(&a).unwrap(), hash_bytes(b"same content"));
    }

    #[test]
    fn test_large_file_spans_chunks() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big");
        let content: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &content).unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_bytes(&content));
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = hash_file(&temp.path().join("missing")).unwrap_err();
        assert!(err.is_not_found());
    }
}
