//! Structural-sharing table.
//!
//! Deduplicates byte-identical objects already written to the region
//! buffer. Keys are `(offset, size)` windows; hashing and equality read the
//! bytes through the current buffer base at call time, so buffer regrowth
//! never invalidates the table. Because equality is byte equality and child
//! slots already hold canonical offsets, sharing composes bottom-up across
//! the graph.

use crate::buffer::RegionBuffer;
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;
use std::hash::Hasher;

/// A byte window of the region buffer holding one canonical object.
#[derive(Debug, Clone, Copy)]
struct Window {
    offset: usize,
    size: usize,
}

/// Hash set over buffer byte windows.
///
/// Collisions are resolved by byte comparison within per-hash buckets; a
/// bucket almost always holds a single window.
pub(crate) struct SharingTable {
    buckets: FxHashMap<u64, SmallVec<[Window; 1]>>,
}

impl SharingTable {
    pub fn new() -> Self {
        Self {
            buckets: FxHashMap::default(),
        }
    }

    /// Intern the candidate window `[offset, offset + size)`.
    ///
    /// Returns the offset of an earlier byte-identical window, if any;
    /// otherwise records the candidate as canonical and returns `None`.
    pub fn intern(&mut self, buf: &RegionBuffer, offset: usize, size: usize) -> Option<usize> {
        let hash = hash_window(buf.window(offset, size));
        let bucket = self.buckets.entry(hash).or_default();
        for w in bucket.iter() {
            if w.size == size && buf.window(w.offset, w.size) == buf.window(offset, size) {
                return Some(w.offset);
            }
        }
        bucket.push(Window { offset, size });
        None
    }
}

fn hash_window(bytes: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_windows_share() {
        let mut buf = RegionBuffer::with_capacity(64);
        let mut table = SharingTable::new();

        let a = buf.alloc(16);
        unsafe { buf.base().add(a).write_bytes(0x11, 16) };
        assert_eq!(table.intern(&buf, a, 16), None);

        let b = buf.alloc(16);
        unsafe { buf.base().add(b).write_bytes(0x11, 16) };
        assert_eq!(table.intern(&buf, b, 16), Some(a));
    }

    #[test]
    fn test_distinct_windows_do_not_share() {
        let mut buf = RegionBuffer::with_capacity(64);
        let mut table = SharingTable::new();

        let a = buf.alloc(16);
        unsafe { buf.base().add(a).write_bytes(0x11, 16) };
        let b = buf.alloc(16);
        unsafe { buf.base().add(b).write_bytes(0x22, 16) };

        assert_eq!(table.intern(&buf, a, 16), None);
        assert_eq!(table.intern(&buf, b, 16), None);
    }

    #[test]
    fn test_same_bytes_different_sizes() {
        let mut buf = RegionBuffer::with_capacity(64);
        let mut table = SharingTable::new();

        let a = buf.alloc(16);
        let b = buf.alloc(8);
        assert_eq!(table.intern(&buf, a, 16), None);
        // first 8 bytes of `a` match `b`, but the sizes differ
        assert_eq!(table.intern(&buf, b, 8), None);
    }

    #[test]
    fn test_survives_regrowth() {
        let mut buf = RegionBuffer::with_capacity(16);
        let mut table = SharingTable::new();

        let a = buf.alloc(16);
        unsafe { buf.base().add(a).write_bytes(0x33, 16) };
        assert_eq!(table.intern(&buf, a, 16), None);

        for _ in 0..8 {
            buf.alloc(64); // rebases the block
        }
        let b = buf.alloc(16);
        unsafe { buf.base().add(b).write_bytes(0x33, 16) };
        assert_eq!(table.intern(&buf, b, 16), Some(a));
    }
}
