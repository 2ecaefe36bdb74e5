use std::io::Read;

use crate::error::Result;
use crate::hash::ContentHash;

/// Default chunk size: 4 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// A contiguous piece of a source file together with its content hash.
pub struct Chunk {
    pub data: Vec<u8>,
    pub hash: ContentHash,
}

/// Splits a byte source into fixed-size chunks. The final chunk may be
/// shorter; an empty source yields no chunks at all.
pub struct FixedChunker<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: Read> FixedChunker<R> {
    /// `size == 0` falls back to [`DEFAULT_CHUNK_SIZE`].
    pub fn new(reader: R, size: usize) -> Self {
        let size = if size == 0 { DEFAULT_CHUNK_SIZE } else { size };
        FixedChunker {
            reader,
            buf: vec![0u8; size],
        }
    }

    pub fn with_default_size(reader: R) -> Self {
        Self::new(reader, DEFAULT_CHUNK_SIZE)
    }

    /// Read the next chunk. Returns `Ok(None)` when the source ended
    /// exactly at a chunk boundary; a short read mid-buffer is the normal
    /// final chunk, not an error. The hash covers the chunk's actual bytes,
    /// never the stale tail of the reused buffer.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            return Ok(None);
        }

        let data = self.buf[..filled].to_vec();
        let hash = ContentHash::of(&data);
        Ok(Some(Chunk { data, hash }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(source: &[u8], size: usize) -> Vec<Chunk> {
        let mut chunker = FixedChunker::new(Cursor::new(source.to_vec()), size);
        let mut chunks = Vec::new();
        while let Some(chunk) = chunker.next_chunk().unwrap() {
            chunks.push(chunk);
        }
        chunks
    }

    #[test]
    fn empty_source_yields_no_chunks() {
        assert!(collect(b"", 8).is_empty());
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let chunks = collect(&[0xCD; 32], 8);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.data.len() == 8));
    }

    #[test]
    fn one_extra_byte_yields_short_final_chunk() {
        let chunks = collect(&[0xCD; 33], 8);
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks.last().unwrap().data.len(), 1);
    }

    #[test]
    fn short_source_is_one_short_chunk() {
        let chunks = collect(b"abc", 8);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].data, b"abc");
    }

    #[test]
    fn hash_covers_actual_bytes_not_buffer_tail() {
        // First chunk fills the buffer; the short second chunk must hash
        // only its own three bytes.
        let mut source = vec![0xAA; 8];
        source.extend_from_slice(b"xyz");
        let chunks = collect(&source, 8);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].hash, ContentHash::of(b"xyz"));
    }

    #[test]
    fn zero_size_falls_back_to_default() {
        let chunker = FixedChunker::new(Cursor::new(vec![]), 0);
        assert_eq!(chunker.buf.len(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn reassembly_matches_source() {
        let source: Vec<u8> = (0..1000u32).flat_map(|i| i.to_le_bytes()).collect();
        let chunks = collect(&source, 256);
        let rebuilt: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
        assert_eq!(rebuilt, source);
    }

    #[test]
    fn io_error_propagates() {
        struct FailingReader;
        impl std::io::Read for FailingReader {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk fell off"))
            }
        }

        let mut chunker = FixedChunker::new(FailingReader, 8);
        assert!(chunker.next_chunk().is_err());
    }
}
