use std::io::Read;

use crate::error::{PalisadeError, Result};

/// Maximum decompressed output size (64 MiB = 16x the default chunk size).
/// Prevents decompression bombs from consuming unbounded memory.
const MAX_DECOMPRESS_SIZE: u64 = 64 * 1024 * 1024;

/// Compress with zstd at the default level. Empty input is permitted.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::bulk::compress(data, zstd::DEFAULT_COMPRESSION_LEVEL)
        .map_err(|e| PalisadeError::Other(format!("zstd compress: {e}")))
}

/// Decompress a zstd frame, rejecting outputs over [`MAX_DECOMPRESS_SIZE`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = zstd::stream::Decoder::new(std::io::Cursor::new(data))
        .map_err(|e| PalisadeError::Decompression(format!("zstd init: {e}")))?;
    let mut output = Vec::new();
    decoder
        .by_ref()
        .take(MAX_DECOMPRESS_SIZE + 1)
        .read_to_end(&mut output)
        .map_err(|e| PalisadeError::Decompression(format!("zstd: {e}")))?;
    if output.len() as u64 > MAX_DECOMPRESS_SIZE {
        return Err(PalisadeError::Decompression(format!(
            "decompressed size exceeds limit of {MAX_DECOMPRESS_SIZE} bytes"
        )));
    }
    Ok(output)
}
