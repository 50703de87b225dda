//! Defines the [`Arena`] chunk pool.

use tracing::{debug, error};

use crate::error::AllocError;
use crate::header::{BlockHeader, BlockRef, ALIGNMENT, HEADER_SIZE};
use crate::source::{Chunk, ChunkSource};

/// A pool of fixed-capacity chunks reserved from a [`ChunkSource`].
///
/// Chunks are reserved one at a time and held until the arena is dropped;
/// there is no way to release an individual chunk. Blocks inside the chunks
/// are addressed by [`BlockRef`] and read and written through the accessors
/// below, never through raw pointers.
pub struct Arena<S: ChunkSource> {
    source: S,
    chunks: Vec<Chunk>,
    chunk_capacity: usize,
}

impl<S: ChunkSource> Arena<S> {
    /// Creates an empty arena reserving `chunk_capacity`-byte chunks from `source`.
    ///
    /// # Panics
    /// Panics if `chunk_capacity` cannot hold a header plus one aligned payload,
    /// is not a multiple of [`ALIGNMENT`], or does not fit in a `u32`.
    pub fn new(source: S, chunk_capacity: usize) -> Self {
        assert!(
            chunk_capacity >= HEADER_SIZE + ALIGNMENT,
            "Chunk capacity should hold at least one block."
        );
        assert_eq!(
            chunk_capacity % ALIGNMENT,
            0,
            "Chunk capacity should be a multiple of the payload alignment."
        );
        assert!(
            chunk_capacity <= u32::MAX as usize,
            "Block offsets are stored as u32."
        );
        Arena { source, chunks: Vec::new(), chunk_capacity }
    }

    /// Reserves one more chunk from the source and returns its index.
    pub fn acquire(&mut self) -> Result<u32, AllocError> {
        let Ok(chunk) = self.source.reserve(self.chunk_capacity) else {
            error!("Chunk reservation failed.");
            return Err(AllocError::OutOfMemory { capacity: self.chunk_capacity });
        };
        debug_assert_eq!(chunk.capacity(), self.chunk_capacity);
        debug_assert!(self.chunks.len() < u32::MAX as usize);

        let index = self.chunks.len() as u32;
        self.chunks.push(chunk);
        debug!(index, "Reserved chunk.");
        Ok(index)
    }

    /// Returns the number of chunks reserved so far.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the capacity of each chunk in bytes.
    #[inline]
    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Decodes the block header stored at `at`.
    pub fn header(&self, at: BlockRef) -> BlockHeader {
        let offset = at.offset as usize;
        let bytes = self.chunks[at.chunk as usize].bytes();
        BlockHeader::read_from(&bytes[offset..offset + HEADER_SIZE])
    }

    /// Encodes `header` into the chunk bytes at `at`.
    pub fn write_header(&mut self, at: BlockRef, header: BlockHeader) {
        let offset = at.offset as usize;
        let bytes = self.chunks[at.chunk as usize].bytes_mut();
        header.write_to(&mut bytes[offset..offset + HEADER_SIZE]);
    }

    /// Returns `len` payload bytes of the block whose header is at `at`.
    pub fn payload(&self, at: BlockRef, len: usize) -> &[u8] {
        let start = at.offset as usize + HEADER_SIZE;
        &self.chunks[at.chunk as usize].bytes()[start..start + len]
    }

    /// Returns `len` payload bytes of the block whose header is at `at` for writing.
    pub fn payload_mut(&mut self, at: BlockRef, len: usize) -> &mut [u8] {
        let start = at.offset as usize + HEADER_SIZE;
        &mut self.chunks[at.chunk as usize].bytes_mut()[start..start + len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_sources::FailingSource;
    use crate::source::HeapSource;

    #[test]
    fn test_1() {
        let mut arena = Arena::new(HeapSource::new(), 4096);
        assert_eq!(arena.chunk_count(), 0);
        assert_eq!(arena.chunk_capacity(), 4096);

        assert_eq!(arena.acquire().unwrap(), 0);
        assert_eq!(arena.acquire().unwrap(), 1);
        assert_eq!(arena.acquire().unwrap(), 2);
        assert_eq!(arena.chunk_count(), 3);
    }

    #[test]
    fn test_2() {
        let mut arena = Arena::new(HeapSource::new(), 4096);
        arena.acquire().unwrap();
        arena.acquire().unwrap();

        let header = BlockHeader {
            payload_size: 128,
            free: true,
            next: Some(BlockRef { chunk: 0, offset: 512 }),
        };
        let at = BlockRef { chunk: 1, offset: 1024 };
        arena.write_header(at, header);
        assert_eq!(arena.header(at), header);

        // A fresh chunk decodes as an all-zero header.
        let zero = arena.header(BlockRef { chunk: 0, offset: 0 });
        assert_eq!(zero.payload_size, 0);
        assert!(!zero.free);
    }

    #[test]
    fn test_3() {
        let mut arena = Arena::new(HeapSource::new(), 4096);
        arena.acquire().unwrap();

        let at = BlockRef { chunk: 0, offset: 256 };
        arena.payload_mut(at, 64).fill(0xAA);
        assert!(arena.payload(at, 64).iter().all(|&b| b == 0xAA));

        // The payload starts exactly HEADER_SIZE bytes after the header offset.
        let whole = arena.payload(BlockRef { chunk: 0, offset: 0 }, 4096 - HEADER_SIZE);
        assert!(whole[256..320].iter().all(|&b| b == 0xAA));
        assert_eq!(whole[320..384], [0_u8; 64]);
    }

    #[test]
    fn test_4() {
        let mut arena = Arena::new(FailingSource::new(1), 4096);
        assert_eq!(arena.acquire().unwrap(), 0);
        assert_eq!(
            arena.acquire().unwrap_err(),
            AllocError::OutOfMemory { capacity: 4096 }
        );
        // The failed acquire must not change the chunk count.
        assert_eq!(arena.chunk_count(), 1);
    }

    #[test]
    #[should_panic]
    fn test_5() {
        let _ = Arena::new(HeapSource::new(), HEADER_SIZE);
    }

    #[test]
    #[should_panic]
    fn test_6() {
        let _ = Arena::new(HeapSource::new(), 4096 + 1);
    }

    #[test]
    #[should_panic]
    fn test_7() {
        let _ = Arena::new(HeapSource::new(), u32::MAX as usize + 1);
    }
}
