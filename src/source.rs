//! [`ChunkSource`] trait and structures that implement it.
//!
//! The [`ChunkSource`] trait lets users change the backing store from which
//! a [`FirstFit`](crate::FirstFit) allocator reserves its chunks.
//!
//! This is the only module that touches raw memory; everything above it
//! works on the byte slices a [`Chunk`] hands out.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use std::slice;

use libc::{mmap, munmap, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};

use crate::header::ALIGNMENT;

/// A trait for types that hand out fixed-capacity memory chunks.
///
/// Sources act as the backing store of a [`FirstFit`](crate::FirstFit)
/// allocator. Every reserved [`Chunk`] is zero-filled, aligned to
/// [`ALIGNMENT`], and owned exclusively by the caller until it is dropped.
/// Chunks cannot be built from arbitrary raw memory outside this module,
/// so custom sources are written by composing the built-in ones.
pub trait ChunkSource {
    /// Reserves a chunk of exactly `capacity` bytes
    /// or returns `Err(())` if the reservation failed.
    ///
    /// Reserving a zero-capacity chunk always fails.
    fn reserve(&mut self, capacity: usize) -> Result<Chunk, ()>;
}

/// An exclusively owned region of bytes reserved from a [`ChunkSource`].
///
/// The region is zero-filled on reservation and released when the chunk
/// is dropped.
#[derive(Debug)]
pub struct Chunk {
    mem: NonNull<u8>,
    capacity: usize,
    backing: Backing,
}

#[derive(Copy, Clone, Debug)]
enum Backing {
    Heap,
    Mmap,
}

impl Chunk {
    /// Creates a chunk owning the region starting at `mem`.
    ///
    /// # Safety
    /// `mem` must point to `capacity` zero-initialized bytes, aligned to
    /// [`ALIGNMENT`], exclusively owned by the new chunk, and obtained from
    /// the allocator matching `backing` so that [`Drop`] releases it correctly.
    unsafe fn new(mem: NonNull<u8>, capacity: usize, backing: Backing) -> Chunk {
        debug_assert_ne!(capacity, 0);
        debug_assert_eq!(mem.as_ptr() as usize % ALIGNMENT, 0);
        Chunk { mem, capacity, backing }
    }

    /// Returns the capacity of the chunk in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the chunk contents.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.mem.as_ptr(), self.capacity) }
    }

    /// Returns the chunk contents for writing.
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.mem.as_ptr(), self.capacity) }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        match self.backing {
            Backing::Heap => unsafe {
                let layout = Layout::from_size_align_unchecked(self.capacity, ALIGNMENT);
                dealloc(self.mem.as_ptr(), layout);
            },
            Backing::Mmap => unsafe {
                let rc = munmap(self.mem.as_ptr().cast(), self.capacity);
                debug_assert_eq!(rc, 0, "munmap() of an owned mapping should never fail.");
            },
        }
    }
}

/// A source that reserves chunks from the process heap
/// via [`alloc_zeroed`].
#[derive(Copy, Clone, Debug, Default)]
pub struct HeapSource;

impl HeapSource {
    #[inline(always)]
    pub const fn new() -> Self {
        HeapSource
    }
}

impl ChunkSource for HeapSource {
    fn reserve(&mut self, capacity: usize) -> Result<Chunk, ()> {
        if capacity == 0 {
            return Err(());
        }
        let layout = Layout::from_size_align(capacity, ALIGNMENT).map_err(|_| ())?;
        let mem = NonNull::new(unsafe { alloc_zeroed(layout) }).ok_or(())?;
        Ok(unsafe { Chunk::new(mem, capacity, Backing::Heap) })
    }
}

/// A source that reserves chunks as anonymous private memory mappings
/// via [`libc::mmap`].
#[derive(Copy, Clone, Debug, Default)]
pub struct MmapSource;

impl MmapSource {
    #[inline(always)]
    pub const fn new() -> Self {
        MmapSource
    }
}

impl ChunkSource for MmapSource {
    fn reserve(&mut self, capacity: usize) -> Result<Chunk, ()> {
        if capacity == 0 {
            return Err(());
        }
        let mem = unsafe {
            mmap(
                std::ptr::null_mut(),
                capacity,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if mem == MAP_FAILED {
            return Err(());
        }
        // Anonymous mappings are page-aligned and zero-filled.
        let mem = NonNull::new(mem.cast::<u8>()).ok_or(())?;
        Ok(unsafe { Chunk::new(mem, capacity, Backing::Mmap) })
    }
}

//---------------impl ChunkSource for &mut S---------------//

impl<S: ChunkSource + ?Sized> ChunkSource for &mut S {
    fn reserve(&mut self, capacity: usize) -> Result<Chunk, ()> {
        (*self).reserve(capacity)
    }
}


#[cfg(test)]
mod tests {
    use super::test_sources::FailingSource;
    use super::*;

    #[test]
    fn test_1() {
        let mut source = HeapSource::new();
        let mut chunk = source.reserve(4096).unwrap();

        assert_eq!(chunk.capacity(), 4096);
        assert_eq!(chunk.bytes().len(), 4096);
        assert_eq!(chunk.bytes().as_ptr() as usize % ALIGNMENT, 0);
        assert!(chunk.bytes().iter().all(|&b| b == 0));

        chunk.bytes_mut()[42] = 0xFF;
        assert_eq!(chunk.bytes()[42], 0xFF);
        assert_eq!(chunk.bytes()[41], 0);
    }

    #[test]
    fn test_2() {
        assert!(HeapSource::new().reserve(0).is_err());
        assert!(MmapSource::new().reserve(0).is_err());
    }

    #[test]
    fn test_3() {
        let mut source = MmapSource::new();
        let mut chunk = source.reserve(4096).unwrap();

        assert_eq!(chunk.capacity(), 4096);
        assert_eq!(chunk.bytes().as_ptr() as usize % ALIGNMENT, 0);
        assert!(chunk.bytes().iter().all(|&b| b == 0));

        chunk.bytes_mut()[0] = 1;
        chunk.bytes_mut()[4095] = 2;
        assert_eq!(chunk.bytes()[0], 1);
        assert_eq!(chunk.bytes()[4095], 2);
    }

    #[test]
    fn test_4() {
        // Sources can be borrowed instead of moved.
        fn reserve_two<S: ChunkSource>(mut source: S) -> (Chunk, Chunk) {
            (source.reserve(64).unwrap(), source.reserve(64).unwrap())
        }

        let mut source = HeapSource::new();
        let (a, b) = reserve_two(&mut source);
        assert_ne!(a.bytes().as_ptr(), b.bytes().as_ptr());
    }

    #[test]
    fn test_5() {
        let mut source = FailingSource::new(2);
        assert_eq!(source.remaining(), 2);
        assert!(source.reserve(64).is_ok());
        assert!(source.reserve(64).is_ok());
        assert_eq!(source.remaining(), 0);
        assert!(source.reserve(64).is_err());
        assert!(source.reserve(64).is_err());
    }

    #[test]
    fn test_6() {
        // Chunks from one source never alias.
        let mut source = HeapSource::new();
        let mut a = source.reserve(128).unwrap();
        let mut b = source.reserve(128).unwrap();

        a.bytes_mut().fill(0x11);
        b.bytes_mut().fill(0x22);
        assert!(a.bytes().iter().all(|&x| x == 0x11));
        assert!(b.bytes().iter().all(|&x| x == 0x22));
    }
}
