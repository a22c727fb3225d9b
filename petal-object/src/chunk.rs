use bytes::{Bytes, BytesMut};

/// Staging chunk size. Large enough that per-chunk object-store overhead is
/// negligible for hundreds-of-MB uploads, small enough to bound the per-
/// upload memory footprint. Also the S3 minimum part size for multipart
/// copy, so every staged chunk except the last is a valid part.
pub(crate) const CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Re-cuts an arbitrarily-sized incoming byte stream into fixed-size chunks.
///
/// Incoming HTTP body frames rarely align with the staging chunk size; this
/// accumulates them and hands back exactly `target`-sized chunks, with
/// whatever remains released by [`finish`](Self::finish).
pub(crate) struct ChunkAssembler {
    target: usize,
    buf: BytesMut,
}

impl ChunkAssembler {
    pub(crate) fn new(target: usize) -> Self {
        Self {
            target,
            buf: BytesMut::new(),
        }
    }

    /// Feed incoming bytes; returns every complete chunk now available.
    pub(crate) fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(data);
        let mut full = Vec::new();
        while self.buf.len() >= self.target {
            full.push(self.buf.split_to(self.target).freeze());
        }
        full
    }

    /// Release the final partial chunk, if any bytes remain.
    pub(crate) fn finish(mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.split().freeze())
        }
    }
}
