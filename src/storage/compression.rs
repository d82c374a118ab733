//! Gzip value compression for `SET <key> <value> COMPRESS`

use crate::CacheError;
use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

/// Gzip-compress a value
pub fn compress(data: &[u8]) -> Result<Bytes, CacheError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CacheError::compression_failure(format!("failed to compress value: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CacheError::compression_failure(format!("failed to compress value: {e}")))?;
    Ok(Bytes::from(compressed))
}

/// Decompress a gzip value
pub fn decompress(data: &[u8]) -> Result<Bytes, CacheError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::compression_failure(format!("failed to decompress value: {e}")))?;
    Ok(Bytes::from(out))
}
