//! The [`FirstFit`] allocator.

use std::fmt::Debug;

use static_assertions::const_assert;
use tracing::{debug, instrument, Level};

use crate::arena::Arena;
use crate::error::AllocError;
use crate::header::{BlockHeader, BlockRef, ALIGNMENT, HEADER_SIZE};
use crate::source::{ChunkSource, HeapSource};
use crate::util::align_up;

/// Chunk capacity in bytes used by [`FirstFit::new`] and [`FirstFit::with_source`].
pub const DEFAULT_CHUNK_CAPACITY: usize = 4096;

const_assert!(DEFAULT_CHUNK_CAPACITY >= HEADER_SIZE + ALIGNMENT);
const_assert!(DEFAULT_CHUNK_CAPACITY % ALIGNMENT == 0);

/// A first-fit freelist allocator.
///
/// The allocator reserves fixed-capacity chunks from a [`ChunkSource`] and
/// serves requests by walking a freelist threaded through the chunks:
/// the first free block large enough wins and is split in place when enough
/// of its payload is left over to host another block. When no block fits,
/// the arena grows by exactly one chunk and the search runs once more.
///
/// There is no way to free a single allocation. Dropping the allocator
/// releases every chunk at once, and with them all payloads; the borrow
/// checker keeps payload access ([`payload`](FirstFit::payload),
/// [`payload_mut`](FirstFit::payload_mut)) from outliving the allocator.
pub struct FirstFit<S: ChunkSource = HeapSource> {
    arena: Arena<S>,
    head: Option<BlockRef>,
}

impl<S: ChunkSource> Debug for FirstFit<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirstFit")
            .field("chunk_count", &self.arena.chunk_count())
            .field("chunk_capacity", &self.arena.chunk_capacity())
            .field("head", &self.head)
            .finish()
    }
}

/// A handle to one allocation.
///
/// Handles are plain `(chunk, offset, size)` coordinates; the payload bytes
/// they refer to are reached through [`FirstFit::payload`] and
/// [`FirstFit::payload_mut`] on the allocator that produced the handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    block: BlockRef,
    size: usize,
}

impl Allocation {
    /// Returns the index of the chunk holding the payload.
    #[inline]
    pub fn chunk(&self) -> u32 {
        self.block.chunk
    }

    /// Returns the byte offset of the payload within its chunk.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.block.offset + HEADER_SIZE as u32
    }

    /// Returns the granted payload size in bytes.
    ///
    /// This is the requested size rounded up to a multiple of [`ALIGNMENT`],
    /// or more when splitting the host block was not worthwhile.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
}

/// A block as reported by [`FirstFit::blocks`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Index of the chunk holding the block.
    pub chunk: u32,
    /// Byte offset of the block header within its chunk.
    pub offset: u32,
    /// Payload size of the block in bytes.
    pub size: usize,
    /// Whether the block is still available to `allocate`.
    pub free: bool,
}

/// Iterator over the block chain of a [`FirstFit`], newest chunk first.
/// Created by [`FirstFit::blocks`].
pub struct Blocks<'a, S: ChunkSource> {
    arena: &'a Arena<S>,
    cursor: Option<BlockRef>,
}

impl<S: ChunkSource> FirstFit<S> {
    /// Creates an allocator reserving [`DEFAULT_CHUNK_CAPACITY`]-byte chunks
    /// from `source`.
    pub fn with_source(source: S) -> Self {
        FirstFit::with_source_and_capacity(source, DEFAULT_CHUNK_CAPACITY)
    }

    /// Creates an allocator reserving `chunk_capacity`-byte chunks from `source`.
    ///
    /// # Panics
    /// Panics if `chunk_capacity` cannot hold a header plus one aligned payload,
    /// is not a multiple of [`ALIGNMENT`], or does not fit in a `u32`.
    pub fn with_source_and_capacity(source: S, chunk_capacity: usize) -> Self {
        FirstFit { arena: Arena::new(source, chunk_capacity), head: None }
    }

    /// Allocates a block with a payload of at least `size` bytes
    /// and returns a handle to it.
    ///
    /// The payload is aligned to [`ALIGNMENT`]. Requests for zero bytes are
    /// rejected with [`AllocError::ZeroSize`]; requests that can never fit a
    /// chunk are rejected with [`AllocError::RequestTooLarge`] before any
    /// chunk is reserved.
    #[instrument(level = "info", ret(level = Level::INFO), err(Debug, level = Level::ERROR))]
    pub fn allocate(&mut self, size: usize) -> Result<Allocation, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let max = self.max_request();
        let aligned = match align_up(size, ALIGNMENT) {
            Some(aligned) if aligned <= max => aligned,
            _ => return Err(AllocError::RequestTooLarge { requested: size, max }),
        };
        debug!(aligned, "Aligned request size.");

        if self.head.is_none() {
            debug!("Initializing first chunk.");
            self.grow_arena()?;
        }

        if let Some(at) = self.first_fit(aligned) {
            return Ok(self.commit(at, aligned));
        }

        debug!("No suitable block found, growing arena.");
        self.grow_arena()?;

        // A fresh chunk fits any admissible request, so a second miss means
        // the request could never be served.
        match self.first_fit(aligned) {
            Some(at) => Ok(self.commit(at, aligned)),
            None => Err(AllocError::RequestTooLarge { requested: size, max }),
        }
    }

    /// Returns the payload bytes of `allocation`.
    ///
    /// Handles are only meaningful on the allocator that produced them;
    /// a handle from another allocator panics or indexes unrelated bytes.
    pub fn payload(&self, allocation: Allocation) -> &[u8] {
        self.arena.payload(allocation.block, allocation.size)
    }

    /// Returns the payload bytes of `allocation` for writing.
    pub fn payload_mut(&mut self, allocation: Allocation) -> &mut [u8] {
        self.arena.payload_mut(allocation.block, allocation.size)
    }

    /// Returns the number of chunks reserved so far.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.arena.chunk_count()
    }

    /// Returns the capacity of each chunk in bytes.
    #[inline]
    pub fn chunk_capacity(&self) -> usize {
        self.arena.chunk_capacity()
    }

    /// Returns the largest size [`allocate`](FirstFit::allocate) can serve:
    /// the chunk capacity minus one header.
    #[inline]
    pub fn max_request(&self) -> usize {
        self.arena.chunk_capacity() - HEADER_SIZE
    }

    /// Returns an iterator over every block in the chain, used blocks included.
    pub fn blocks(&self) -> Blocks<'_, S> {
        Blocks { arena: &self.arena, cursor: self.head }
    }

    /// Walks the freelist from the head and returns the first free block
    /// whose payload can hold `aligned` bytes.
    #[instrument(level = "debug", ret(level = Level::DEBUG))]
    fn first_fit(&self, aligned: usize) -> Option<BlockRef> {
        let mut cursor = self.head;
        while let Some(at) = cursor {
            let header = self.arena.header(at);
            if header.free && header.payload_size >= aligned {
                return Some(at);
            }
            cursor = header.next;
        }
        None
    }

    /// Marks the block at `at` used for an `aligned`-byte payload, splitting
    /// the tail of its payload into a new free block when enough remains to
    /// host one.
    #[instrument(level = "debug", ret(level = Level::DEBUG))]
    fn commit(&mut self, at: BlockRef, aligned: usize) -> Allocation {
        let mut header = self.arena.header(at);
        debug_assert!(header.free, "Committed blocks should be free.");
        debug_assert!(header.payload_size >= aligned);
        debug_assert_eq!(aligned % ALIGNMENT, 0);
        debug!(?at, payload_size = header.payload_size, "Found suitable block.");

        if header.payload_size > aligned + HEADER_SIZE {
            let remainder = BlockRef {
                chunk: at.chunk,
                offset: at.offset + (HEADER_SIZE + aligned) as u32,
            };
            self.arena.write_header(
                remainder,
                BlockHeader {
                    payload_size: header.payload_size - aligned - HEADER_SIZE,
                    free: true,
                    next: header.next,
                },
            );
            debug!(?remainder, "Splitting block.");
            header.payload_size = aligned;
            header.next = Some(remainder);
        }

        header.free = false;
        self.arena.write_header(at, header);
        Allocation { block: at, size: header.payload_size }
    }

    /// Reserves a fresh chunk, formats it as a single free block spanning the
    /// whole chunk, and prepends that block to the freelist.
    #[instrument(level = "debug", err(Debug, level = Level::ERROR))]
    fn grow_arena(&mut self) -> Result<(), AllocError> {
        let chunk = self.arena.acquire()?;
        let at = BlockRef { chunk, offset: 0 };
        self.arena.write_header(
            at,
            BlockHeader {
                payload_size: self.arena.chunk_capacity() - HEADER_SIZE,
                free: true,
                next: self.head,
            },
        );
        self.head = Some(at);
        Ok(())
    }
}

impl FirstFit<HeapSource> {
    /// Creates an allocator with heap-backed chunks of
    /// [`DEFAULT_CHUNK_CAPACITY`] bytes.
    pub fn new() -> Self {
        FirstFit::with_source(HeapSource::new())
    }

    /// Creates an allocator with heap-backed chunks of `chunk_capacity` bytes.
    ///
    /// # Panics
    /// Same conditions as [`FirstFit::with_source_and_capacity`].
    pub fn with_chunk_capacity(chunk_capacity: usize) -> Self {
        FirstFit::with_source_and_capacity(HeapSource::new(), chunk_capacity)
    }
}

//---------------impl Default for FirstFit---------------//

impl Default for FirstFit<HeapSource> {
    fn default() -> Self {
        FirstFit::new()
    }
}

//---------------impl Iterator for Blocks---------------//

impl<S: ChunkSource> Iterator for Blocks<'_, S> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let at = self.cursor?;
        let header = self.arena.header(at);
        self.cursor = header.next;
        Some(BlockInfo {
            chunk: at.chunk,
            offset: at.offset,
            size: header.payload_size,
            free: header.free,
        })
    }
}
