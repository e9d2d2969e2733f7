//! Content fingerprints.
//!
//! A fingerprint is the lowercase hex MD5 digest of a file's bytes. MD5 is
//! used as a 128-bit identity signal, not as a security property. Content is
//! streamed through a fixed-size buffer so large files are never held in
//! memory.

use std::path::Path;

use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{IndexError, Result};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 32;

/// Compute the fingerprint of the file at `path`.
///
/// Fails with [`IndexError::Io`] if the file cannot be opened or a read
/// fails mid-stream.
pub async fn fingerprint(path: &Path) -> Result<String> {
    let to_io = |source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = tokio::fs::File::open(path).await.map_err(to_io)?;
    let hash = fingerprint_reader(file).await.map_err(to_io)?;

    tracing::debug!(path = %path.display(), %hash, "fingerprinted");
    Ok(hash)
}

/// Stream `reader` to EOF and return its hex digest.
pub async fn fingerprint_reader<R>(mut reader: R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_digests() {
        let hi = fingerprint_reader(&b"hi"[..]).await.unwrap();
        assert_eq!(hi, "49f68a5c8493ec2c0bf489821c21fc3b");

        let empty = fingerprint_reader(&b""[..]).await.unwrap();
        assert_eq!(empty, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn digest_is_lowercase_fixed_length() {
        let hash = fingerprint_reader(&b"Hello, World!"[..]).await.unwrap();
        assert_eq!(hash.len(), FINGERPRINT_LEN);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[tokio::test]
    async fn content_spanning_many_buffers() {
        // Three and a half buffers, so the tail read is partial
        let data = vec![0xABu8; READ_BUFFER_SIZE * 3 + READ_BUFFER_SIZE / 2];
        let streamed = fingerprint_reader(&data[..]).await.unwrap();
        let whole = hex::encode(Md5::digest(&data));
        assert_eq!(streamed, whole);
    }

    #[tokio::test]
    async fn file_and_reader_agree() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.bin");
        std::fs::write(&path, b"some bytes").unwrap();

        let from_file = fingerprint(&path).await.unwrap();
        let from_reader = fingerprint_reader(&b"some bytes"[..]).await.unwrap();
        assert_eq!(from_file, from_reader);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nope");

        let err = fingerprint(&path).await.unwrap_err();
        match err {
            IndexError::Io { path: p, source } => {
                assert_eq!(p, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
