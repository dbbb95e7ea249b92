//! Object graph compactor and compacted-region loader.
//!
//! Given a live object graph on the Basalt heap, the [`Compactor`] walks it
//! and serializes every reachable object into one contiguous,
//! position-independent byte block: inter-object pointers become
//! intra-region offsets, byte-identical sub-objects are shared, and a
//! terminator record holding the root's offset closes the block. The block
//! is the on-disk form of a compiled module's exported data.
//!
//! A [`Region`] wraps such a block (copied from a compactor, or adopted
//! from storage) and turns it back into a live graph in a single linear
//! sweep: offsets are rewritten to absolute pointers in place, and
//! big-number payloads are resurrected from their serialized decimal form.
//! No sub-object is ever re-allocated.
//!
//! ```text
//! root ──▶ Compactor ──▶ [obj][obj]...[terminator] ──▶ Region ──▶ root
//! ```
//!
//! # Contract
//!
//! - The serializable subgraph is acyclic; cycles only arise through
//!   closures or external objects, which are rejected outright.
//! - One thread per compactor, one thread per region sweep.
//! - Regions are trusted input: they are only ever produced by this
//!   compactor, and the loader performs no validation.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

mod buffer;
mod sharing;

pub mod compactor;
pub mod region;
pub mod stats;

pub use compactor::Compactor;
pub use region::Region;
pub use stats::CompactStats;

use basalt_runtime::object::{ObjPtr, ObjectHeader, WORD_SIZE};

/// Offset stand-in for a pointer that has not been emitted yet.
///
/// Must not collide with a scalar immediate (scalars are odd, this is even)
/// nor with a real offset (offsets are bounded by the buffer size). It only
/// exists while a parent waits for its children; finished regions never
/// contain it.
pub const NULL_OFFSET: usize = usize::MAX - 1;

/// Terminator record closing one compacted root.
///
/// The header carries the Reserved tag; `root` holds the offset of the
/// region's root object. The record size is a word multiple so the root
/// slot, and anything appended after the record, stays word-aligned.
#[repr(C)]
pub struct TerminatorObject {
    /// Reserved-tagged header.
    pub header: ObjectHeader,
    /// Offset of the compacted root (or a scalar immediate).
    pub root: ObjPtr,
}

/// Round `n` up to the next word-size multiple.
#[inline]
pub(crate) fn align_up(n: usize) -> usize {
    (n + WORD_SIZE - 1) & !(WORD_SIZE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminator_is_word_multiple() {
        assert_eq!(std::mem::size_of::<TerminatorObject>() % WORD_SIZE, 0);
    }

    #[test]
    fn test_null_offset_is_not_a_scalar() {
        assert_eq!(NULL_OFFSET & 1, 0);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), WORD_SIZE);
        assert_eq!(align_up(WORD_SIZE), WORD_SIZE);
        assert_eq!(align_up(WORD_SIZE + 1), 2 * WORD_SIZE);
    }
}
