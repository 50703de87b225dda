//! Defines the [`BlockHeader`] and [`BlockRef`] structs and associated constants.

use std::mem::size_of;

use static_assertions::const_assert;

/// Alignment of every payload handed out by the allocator.
/// Payload sizes are always rounded up to a multiple of this.
pub const ALIGNMENT: usize = size_of::<usize>();

/// Size in bytes of an encoded block header.
pub const HEADER_SIZE: usize = WORD + 2 * size_of::<u32>();

const WORD: usize = size_of::<usize>();

/// Sentinel chunk index marking the end of the freelist chain.
const NO_CHUNK: u32 = u32::MAX;

// Header-tagging requires payload sizes to be even.
const_assert!(ALIGNMENT >= 2);
// Blocks are laid out back to back, so the header itself must not break payload alignment.
const_assert!(HEADER_SIZE % ALIGNMENT == 0);

/// Locates a block header inside an arena: `offset` bytes into chunk number `chunk`.
///
/// The payload of the block starts [`HEADER_SIZE`] bytes after `offset`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockRef {
    pub chunk: u32,
    pub offset: u32,
}

/// Stores information about a block: the payload size in bytes,
/// whether the block is free or used, and a link to the next block in the chain.
///
/// Headers live in the chunk memory itself, encoded into the [`HEADER_SIZE`]
/// bytes right before the block payload. The layout is a native-endian size
/// word followed by the chunk index and offset of the next block
/// (chunk index [`u32::MAX`] meaning no next block).
///
/// # Tagging
/// To fit the free flag into the size word, the flag is kept in the word's
/// least significant bit. This is safe since payload sizes are always
/// multiples of [`ALIGNMENT`], which is statically asserted to be at least 2.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub payload_size: usize,
    pub free: bool,
    pub next: Option<BlockRef>,
}

impl BlockHeader {
    /// Encodes the header into the first [`HEADER_SIZE`] bytes of `buf`.
    pub fn write_to(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        debug_assert_eq!(self.payload_size % 2, 0, "Payload size should be even.");

        let word = match self.free {
            true => self.payload_size | 1,
            false => self.payload_size,
        };
        let (chunk, offset) = match self.next {
            Some(at) => (at.chunk, at.offset),
            None => (NO_CHUNK, 0),
        };
        buf[..WORD].copy_from_slice(&word.to_ne_bytes());
        buf[WORD..WORD + 4].copy_from_slice(&chunk.to_ne_bytes());
        buf[WORD + 4..WORD + 8].copy_from_slice(&offset.to_ne_bytes());
    }

    /// Decodes the header stored in the first [`HEADER_SIZE`] bytes of `buf`.
    pub fn read_from(buf: &[u8]) -> BlockHeader {
        debug_assert!(buf.len() >= HEADER_SIZE);

        let word = usize_at(buf, 0);
        let chunk = u32_at(buf, WORD);
        let offset = u32_at(buf, WORD + 4);
        BlockHeader {
            payload_size: word & !1,
            free: word & 1 != 0,
            next: (chunk != NO_CHUNK).then_some(BlockRef { chunk, offset }),
        }
    }
}

#[inline(always)]
fn usize_at(buf: &[u8], at: usize) -> usize {
    let mut raw = [0_u8; WORD];
    raw.copy_from_slice(&buf[at..at + WORD]);
    usize::from_ne_bytes(raw)
}

#[inline(always)]
fn u32_at(buf: &[u8], at: usize) -> u32 {
    let mut raw = [0_u8; 4];
    raw.copy_from_slice(&buf[at..at + 4]);
    u32::from_ne_bytes(raw)
}
