//! Compacted regions: loading a region back into a live object graph.
//!
//! A region owns the raw bytes a compactor produced. [`Region::read`]
//! performs one linear sweep: at each object the tag dictates how many
//! pointer slots to rewrite from offsets to absolute addresses and how far
//! to advance. The sweep visits each byte exactly once: re-reading a
//! region would corrupt the already-fixed pointers, so the cursor is
//! strictly monotonic and `read()` past exhaustion only reports `None`.
//!
//! Big numbers cannot live as raw bytes: their decimal-string tails are
//! parsed back into values in place, and the tail bytes are then reused to
//! thread a linked list through every resurrected big number so the
//! region's destructor can drop each value exactly once.

use crate::TerminatorObject;
use basalt_runtime::object::{ObjPtr, ObjectHeader, ObjectKind, WORD_SIZE};
use basalt_runtime::types::{ArrayObject, BigNumObject, CtorObject, RefObject, ThunkObject};
use num_bigint::BigInt;
use std::alloc::{alloc, dealloc, Layout};
use std::mem::size_of;
use std::ptr::{addr_of_mut, NonNull};

use crate::compactor::Compactor;

/// A loaded (or loadable) compacted region.
///
/// Owns its buffer; dropping the region drops every resurrected big-number
/// value, then releases the buffer. The object graphs handed out by
/// [`Region::read`] point into the buffer and must not outlive the region.
pub struct Region {
    /// Base of the owned buffer.
    base: NonNull<u8>,
    /// Total buffer size in bytes.
    size: usize,
    /// Sweep cursor: offset of the next unfixed object.
    next: usize,
    /// Head of the resurrected big-number list.
    bignums: Option<NonNull<BigNumObject>>,
}

impl Region {
    /// Create a region by copying a compactor's buffer.
    pub fn from_compactor(compactor: &Compactor) -> Self {
        let size = compactor.size();
        if size == 0 {
            return Self {
                base: NonNull::dangling(),
                size: 0,
                next: 0,
                bignums: None,
            };
        }
        let layout = Layout::from_size_align(size, WORD_SIZE).expect("invalid region layout");
        let ptr = unsafe { alloc(layout) };
        let Some(base) = NonNull::new(ptr) else {
            panic!("failed to allocate region of {} bytes", size);
        };
        unsafe { std::ptr::copy_nonoverlapping(compactor.data(), base.as_ptr(), size) };
        Self {
            base,
            size,
            next: 0,
            bignums: None,
        }
    }

    /// Adopt an externally provided buffer (typical for file-backed
    /// regions).
    ///
    /// # Safety
    ///
    /// The buffer must hold exactly `size` bytes of well-formed region data
    /// as produced by a [`Compactor`], and must have been allocated through
    /// the global allocator with word alignment; the region takes ownership
    /// and deallocates it on drop.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, size: usize) -> Self {
        debug_assert_eq!(size % WORD_SIZE, 0);
        Self {
            base: ptr,
            size,
            next: 0,
            bignums: None,
        }
    }

    /// Total buffer size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fix up and return the next compacted root.
    ///
    /// Sweeps forward to the next terminator, rewriting every offset slot
    /// on the way, and returns the terminator's root pointer. Returns
    /// `None` once the buffer is exhausted.
    pub fn read(&mut self) -> Option<ObjPtr> {
        if self.next == self.size {
            return None;
        }
        loop {
            debug_assert!(self.next + size_of::<ObjectHeader>() <= self.size);
            let curr = unsafe { self.base.as_ptr().add(self.next) };
            let header = unsafe { curr.cast::<ObjectHeader>().read() };
            match header.kind() {
                ObjectKind::Ctor => unsafe { self.fix_ctor(curr, &header) },
                ObjectKind::Array => unsafe { self.fix_array(curr, &header) },
                ObjectKind::ScalarArray | ObjectKind::String => self.advance(header.byte_size()),
                ObjectKind::BigNum => unsafe { self.fix_bignum(curr) },
                ObjectKind::Thunk => unsafe { self.fix_thunk(curr) },
                ObjectKind::Ref => unsafe { self.fix_ref(curr) },
                ObjectKind::Reserved => {
                    let root = unsafe {
                        let term = curr.cast::<TerminatorObject>();
                        addr_of_mut!((*term).root).cast::<usize>().read()
                    };
                    self.advance(size_of::<TerminatorObject>());
                    return Some(self.fix_value(root));
                }
                ObjectKind::Closure | ObjectKind::Task | ObjectKind::External => {
                    unreachable!("tag never stored in a region")
                }
            }
        }
    }

    // =========================================================================
    // Fix-Up Sweep
    // =========================================================================

    /// Advance the cursor by `bytes`, rounded up to a word multiple.
    #[inline]
    fn advance(&mut self, bytes: usize) {
        debug_assert!(self.next < self.size);
        self.next += crate::align_up(bytes);
    }

    /// Turn a stored slot value into an absolute pointer.
    ///
    /// A slot holds either a scalar immediate (returned unchanged) or an
    /// intra-region offset (rebased onto the buffer).
    #[inline]
    fn fix_value(&self, raw: usize) -> ObjPtr {
        if raw & 1 == 1 {
            unsafe { ObjPtr::from_addr(raw) }
        } else {
            ObjPtr::from_ptr(unsafe { self.base.as_ptr().add(raw).cast::<ObjectHeader>() })
        }
    }

    /// Rewrite one pointer slot in place.
    unsafe fn fix_slot(&self, slot: *mut usize) {
        let raw = unsafe { slot.read() };
        let fixed = self.fix_value(raw);
        unsafe { slot.write(fixed.addr()) };
    }

    unsafe fn fix_ctor(&mut self, curr: *mut u8, header: &ObjectHeader) {
        debug_assert_eq!(header.rc, 0);
        let num_fields = header.other as usize;
        unsafe {
            let slots = curr.add(size_of::<CtorObject>()).cast::<usize>();
            for i in 0..num_fields {
                self.fix_slot(slots.add(i));
            }
        }
        self.advance(header.byte_size());
    }

    unsafe fn fix_array(&mut self, curr: *mut u8, header: &ObjectHeader) {
        unsafe {
            let len = (*curr.cast::<ArrayObject>()).size;
            let slots = curr.add(size_of::<ArrayObject>()).cast::<usize>();
            for i in 0..len {
                self.fix_slot(slots.add(i));
            }
        }
        self.advance(header.byte_size());
    }

    unsafe fn fix_thunk(&mut self, curr: *mut u8) {
        unsafe {
            let t = curr.cast::<ThunkObject>();
            self.fix_slot(addr_of_mut!((*t).value).cast::<usize>());
        }
        self.advance(size_of::<ThunkObject>());
    }

    unsafe fn fix_ref(&mut self, curr: *mut u8) {
        unsafe {
            let r = curr.cast::<RefObject>();
            self.fix_slot(addr_of_mut!((*r).value).cast::<usize>());
        }
        self.advance(size_of::<RefObject>());
    }

    /// Resurrect a big number from its decimal tail.
    ///
    /// The tail's bytes are dead once parsed; their first word becomes the
    /// link threading this object into the resurrected list.
    unsafe fn fix_bignum(&mut self, curr: *mut u8) {
        let obj = curr.cast::<BigNumObject>();
        self.advance(size_of::<BigNumObject>());
        let tail = unsafe { self.base.as_ptr().add(self.next) };
        let mut len = 0;
        while unsafe { tail.add(len).read() } != 0 {
            len += 1;
        }
        let digits =
            unsafe { std::str::from_utf8_unchecked(std::slice::from_raw_parts(tail, len)) };
        let value: BigInt = digits.parse().expect("malformed big-number payload");
        unsafe {
            addr_of_mut!((*obj).value).write(value);
            tail.cast::<Option<NonNull<BigNumObject>>>().write(self.bignums);
            self.bignums = Some(NonNull::new_unchecked(obj));
        }
        self.advance((len + 1).max(size_of::<*mut BigNumObject>()));
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // Run each resurrected big-number destructor exactly once.
        let mut cursor = self.bignums;
        while let Some(obj) = cursor {
            unsafe {
                let obj = obj.as_ptr();
                let link = obj
                    .cast::<u8>()
                    .add(size_of::<BigNumObject>())
                    .cast::<Option<NonNull<BigNumObject>>>();
                cursor = link.read();
                std::ptr::drop_in_place(addr_of_mut!((*obj).value));
            }
        }
        if self.size != 0 {
            let layout = unsafe { Layout::from_size_align_unchecked(self.size, WORD_SIZE) };
            unsafe { dealloc(self.base.as_ptr(), layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_runtime::types::bignum_value;
    use basalt_runtime::{dec_ref, mk_bignum, mk_ctor};

    #[test]
    fn test_empty_region_reads_nothing() {
        let compactor = Compactor::new();
        let mut region = Region::from_compactor(&compactor);
        assert_eq!(region.size(), 0);
        assert!(region.read().is_none());
        assert!(region.read().is_none());
    }

    #[test]
    fn test_read_past_exhaustion_is_none() {
        let mut compactor = Compactor::new();
        unsafe { compactor.compact(ObjPtr::from_scalar(11)) };
        let mut region = Region::from_compactor(&compactor);
        assert_eq!(region.read(), Some(ObjPtr::from_scalar(11)));
        assert!(region.read().is_none());
        assert!(region.read().is_none());
    }

    #[test]
    fn test_resurrected_list_threads_every_bignum() {
        let root = mk_ctor(
            0,
            &[
                mk_bignum(BigInt::from(1) << 70),
                mk_bignum(BigInt::from(-7)),
                mk_bignum(BigInt::from(1) << 70), // equal value, still not shared
            ],
        );
        let mut compactor = Compactor::new();
        unsafe { compactor.compact(root) };
        assert_eq!(compactor.stats().bignums, 3);

        let mut region = Region::from_compactor(&compactor);
        let loaded = region.read().expect("region holds one root");

        let mut count = 0;
        let mut cursor = region.bignums;
        while let Some(obj) = cursor {
            count += 1;
            unsafe {
                let link = obj
                    .as_ptr()
                    .cast::<u8>()
                    .add(size_of::<BigNumObject>())
                    .cast::<Option<NonNull<BigNumObject>>>();
                cursor = link.read();
            }
        }
        assert_eq!(count, 3);

        unsafe {
            let first = basalt_runtime::types::ctor_get(loaded, 0);
            assert_eq!(bignum_value(first), &(BigInt::from(1) << 70));
        }

        drop(region);
        unsafe { dec_ref(root) };
    }
}
