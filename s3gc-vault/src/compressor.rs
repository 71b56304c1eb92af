//! Stateless streaming compressor.
//!
//! The content hash is SHA-256 of the *pre-compression* bytes; restore
//! uses it for integrity verification, so it must never be computed from
//! the stored form.

use std::io::{Read, Write};

use sha2::{Digest, Sha256};

use s3gc_core::errors::VaultError;
use s3gc_core::models::Codec;

/// What `compress` reports about one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressStats {
    pub original_size: u64,
    pub stored_size: u64,
    /// SHA-256 (hex) of the input bytes.
    pub content_hash: String,
}

/// Counts and hashes everything pulled through it.
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes: u64,
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}

/// Counts everything pushed through it.
struct CountingWriter<W> {
    inner: W,
    bytes: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Compress `reader` into `writer` under the given codec tag.
pub fn compress<R: Read, W: Write>(
    reader: R,
    writer: W,
    codec: Codec,
) -> Result<CompressStats, VaultError> {
    let mut hashing = HashingReader {
        inner: reader,
        hasher: Sha256::new(),
        bytes: 0,
    };
    let mut counting = CountingWriter {
        inner: writer,
        bytes: 0,
    };

    match codec {
        Codec::Zstd => {
            zstd::stream::copy_encode(&mut hashing, &mut counting, 0).map_err(codec_err)?;
        }
    }
    counting.flush().map_err(codec_err)?;

    Ok(CompressStats {
        original_size: hashing.bytes,
        stored_size: counting.bytes,
        content_hash: hex::encode(hashing.hasher.finalize()),
    })
}

/// Inverse of [`compress`].
pub fn decompress<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    codec: Codec,
) -> Result<(), VaultError> {
    match codec {
        Codec::Zstd => zstd::stream::copy_decode(reader, &mut writer).map_err(codec_err)?,
    }
    writer.flush().map_err(codec_err)?;
    Ok(())
}

/// Convenience form over byte slices.
pub fn compress_bytes(data: &[u8], codec: Codec) -> Result<(Vec<u8>, CompressStats), VaultError> {
    let mut out = Vec::new();
    let stats = compress(data, &mut out, codec)?;
    Ok((out, stats))
}

pub fn decompress_bytes(data: &[u8], codec: Codec) -> Result<Vec<u8>, VaultError> {
    let mut out = Vec::new();
    decompress(data, &mut out, codec)?;
    Ok(out)
}

/// SHA-256 (hex) of a byte slice, the same digest `compress` reports.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn codec_err(e: std::io::Error) -> VaultError {
    VaultError::Codec {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_bytes_and_hash() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let (compressed, stats) = compress_bytes(&data, Codec::Zstd).unwrap();

        assert_eq!(stats.original_size, data.len() as u64);
        assert_eq!(stats.stored_size, compressed.len() as u64);
        assert_eq!(stats.content_hash, content_hash(&data));
        // Repetitive input must actually shrink.
        assert!(stats.stored_size < stats.original_size);

        let restored = decompress_bytes(&compressed, Codec::Zstd).unwrap();
        assert_eq!(restored, data);
        assert_eq!(content_hash(&restored), stats.content_hash);
    }

    #[test]
    fn empty_input_is_valid() {
        let (compressed, stats) = compress_bytes(b"", Codec::Zstd).unwrap();
        assert_eq!(stats.original_size, 0);
        assert_eq!(decompress_bytes(&compressed, Codec::Zstd).unwrap(), b"");
    }

    #[test]
    fn garbage_input_fails_decompress() {
        assert!(decompress_bytes(b"not a zstd frame", Codec::Zstd).is_err());
    }
}
