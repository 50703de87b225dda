//! A simple first-fit arena allocator written in Rust.
//!
//! This crate serves many small, pointer-aligned allocations out of a few
//! large fixed-capacity chunks. It is the classic "arena + freelist +
//! first-fit" building block found inside language runtimes and game
//! engines, where the point is to amortize allocation traffic into rare
//! system-level reservations. Individual allocations are never freed;
//! everything is released at once when the allocator is dropped.
//!
//! # Usage
//! To use this crate you can add `chunkfit` as a dependency in your project's
//! `Cargo.toml`.
//! ```toml
//! [dependencies]
//! chunkfit = "0.1"
//! ```
//!
//! ```
//! use chunkfit::FirstFit;
//!
//! let mut heap = FirstFit::new();
//!
//! let answer = heap.allocate(8).unwrap();
//! heap.payload_mut(answer)[..8].copy_from_slice(&42_u64.to_ne_bytes());
//! assert_eq!(heap.payload(answer)[..8], 42_u64.to_ne_bytes());
//! ```
//!
//! Allocations are handles, not pointers: an [`Allocation`] names a chunk and
//! an offset, and the payload bytes are borrowed from the allocator on
//! demand. That keeps every access checked and makes it impossible to touch
//! a payload after the allocator (and with it every chunk) is gone.
//!
//! # Mode of operation
//! The allocator uses a straightforward [freelist](#freelist) algorithm:
//! - When an allocation is requested, the freelist is walked from its head
//!   and the first free block large enough is taken. The search is greedy:
//!   the chosen block is the first found, not the best fit.
//! - If the taken block has noticeably more payload than requested, it is
//!   split in place and the tail becomes a new free block.
//! - If no block fits, one more chunk is reserved from the allocator's
//!   [chunk source](#chunk-sources), formatted as a single free block,
//!   prepended to the freelist, and the search runs exactly once more.
//!
//! There is no `deallocate`: a used block never returns to the freelist.
//! This is an intentional property of the design, not an omission; the
//! allocator targets workloads that build up state and throw it away
//! wholesale.
//!
//! Below is a list of the abstractions used for operating on memory:
//!
//! ## Chunks
//! A chunk is a fixed-capacity byte region reserved as one unit and held
//! until the allocator is dropped. All chunks of an allocator share one
//! capacity, 4096 bytes by default.
//!
//! ## Blocks
//! At a purely conceptual level each chunk is divided into blocks laid out
//! back to back: a [header](#headers) followed by payload bytes. A block is
//! either free or used, nothing else; splitting a free block yields two
//! blocks that again tile the chunk exactly.
//!
//! ## Headers
//! At the beginning of each block sits a [`HEADER_SIZE`]-byte header holding
//! the payload size, the free flag, and the chain link. Headers are encoded
//! into the chunk bytes themselves, addressed by chunk index and byte offset
//! rather than by raw pointers.
//!
//! ## Freelist
//! The freelist is a singly linked chain threaded through the headers. It
//! reaches every block ever formatted; used blocks simply stay on the chain
//! and are skipped by the search. New chunks enter at the head, so the
//! newest chunk is searched first.
//!
//! ## Chunk sources
//! A [`ChunkSource`] is where chunks come from. [`FirstFit`] is generic over
//! its source: [`HeapSource`] reserves from the process heap,
//! [`MmapSource`] maps anonymous pages, and a `&mut` to a source works
//! wherever the source itself does.
//!
//! [`ChunkSource`]: source::ChunkSource
//! [`HeapSource`]: source::HeapSource
//! [`MmapSource`]: source::MmapSource

pub use crate::error::AllocError;
pub use crate::first_fit::{Allocation, BlockInfo, Blocks, FirstFit, DEFAULT_CHUNK_CAPACITY};
pub use crate::header::{ALIGNMENT, HEADER_SIZE};

mod arena;
mod error;
mod first_fit;
mod header;
pub mod source;
mod util;
