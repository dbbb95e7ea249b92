//! Growable, word-aligned region buffer.
//!
//! A bump allocator over one contiguous block. Growth doubles the capacity
//! and rebases the block; callers only ever hold offsets, so no fixups leak
//! outside this module. The tail can be truncated to discard the most
//! recent allocation (structural-sharing rewind).

use crate::align_up;
use basalt_runtime::object::WORD_SIZE;
use std::alloc::{alloc, dealloc, realloc, Layout};
use std::ptr::NonNull;

/// Contiguous byte buffer with word-aligned bump allocation.
pub(crate) struct RegionBuffer {
    /// Base of the block.
    ptr: NonNull<u8>,
    /// Bytes in use.
    len: usize,
    /// Bytes allocated.
    cap: usize,
}

impl RegionBuffer {
    /// Allocate a buffer with `cap` bytes of capacity.
    ///
    /// Panics on allocation failure; compaction has no recovery path.
    pub fn with_capacity(cap: usize) -> Self {
        assert!(cap > 0, "region buffer capacity must be nonzero");
        let layout = Layout::from_size_align(cap, WORD_SIZE).expect("invalid buffer layout");
        let ptr = unsafe { alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            panic!("failed to allocate region buffer of {} bytes", cap);
        };
        Self { ptr, len: 0, cap }
    }

    /// Bump-allocate `size` bytes (rounded up to a word multiple), zeroed.
    ///
    /// Returns the offset of the allocation. Grows (and rebases) the block
    /// as needed.
    pub fn alloc(&mut self, size: usize) -> usize {
        let size = align_up(size);
        if self.len + size > self.cap {
            self.grow(self.len + size);
        }
        let offset = self.len;
        unsafe { std::ptr::write_bytes(self.ptr.as_ptr().add(offset), 0, size) };
        self.len += size;
        offset
    }

    /// Double the capacity until `needed` bytes fit, rebasing the block.
    fn grow(&mut self, needed: usize) {
        let mut new_cap = self.cap;
        while new_cap < needed {
            new_cap *= 2;
        }
        let old_layout = unsafe { Layout::from_size_align_unchecked(self.cap, WORD_SIZE) };
        let ptr = unsafe { realloc(self.ptr.as_ptr(), old_layout, new_cap) };
        let Some(ptr) = NonNull::new(ptr) else {
            panic!("failed to grow region buffer to {} bytes", new_cap);
        };
        self.ptr = ptr;
        self.cap = new_cap;
    }

    /// Discard everything at and past `len` (most recent allocation only).
    pub fn truncate(&mut self, len: usize) {
        debug_assert!(len <= self.len);
        self.len = len;
    }

    /// Bytes in use.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Base pointer of the block. Invalidated by [`RegionBuffer::alloc`].
    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Borrow the in-use bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Borrow the byte window `[offset, offset + size)`.
    #[inline]
    pub fn window(&self, offset: usize, size: usize) -> &[u8] {
        debug_assert!(offset + size <= self.len);
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(offset), size) }
    }
}

impl Drop for RegionBuffer {
    fn drop(&mut self) {
        let layout = unsafe { Layout::from_size_align_unchecked(self.cap, WORD_SIZE) };
        unsafe { dealloc(self.ptr.as_ptr(), layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_are_word_aligned() {
        let mut buf = RegionBuffer::with_capacity(64);
        let a = buf.alloc(1);
        let b = buf.alloc(13);
        let c = buf.alloc(8);
        assert_eq!(a, 0);
        assert_eq!(b, WORD_SIZE);
        assert_eq!(c, WORD_SIZE + 2 * WORD_SIZE);
        assert_eq!(buf.len() % WORD_SIZE, 0);
    }

    #[test]
    fn test_growth_preserves_contents() {
        let mut buf = RegionBuffer::with_capacity(16);
        let a = buf.alloc(16);
        assert_eq!(buf.window(a, 16), &[0u8; 16]);
        unsafe { buf.base().add(a).write_bytes(0xAB, 16) };

        // force several doublings
        for _ in 0..8 {
            buf.alloc(32);
        }
        assert_eq!(buf.window(a, 16), &[0xAB; 16]);
        assert!(buf.len() >= 16 + 8 * 32);
    }

    #[test]
    fn test_alloc_zeroes_memory() {
        let mut buf = RegionBuffer::with_capacity(16);
        let a = buf.alloc(16);
        unsafe { buf.base().add(a).write_bytes(0xFF, 16) };
        buf.truncate(a);
        let b = buf.alloc(16);
        assert_eq!(a, b);
        assert_eq!(buf.window(b, 16), &[0u8; 16]);
    }

    #[test]
    fn test_truncate_rewinds_tail() {
        let mut buf = RegionBuffer::with_capacity(64);
        let a = buf.alloc(24);
        let b = buf.alloc(24);
        assert_eq!(buf.len(), 48);
        buf.truncate(b);
        assert_eq!(buf.len(), 24);
        let c = buf.alloc(8);
        assert_eq!(c, b);
        let _ = a;
    }
}
