//! The object graph compactor.
//!
//! Serializes the transitive closure of a root object into the region
//! buffer. Traversal is iterative: a work stack holds objects pending
//! emission, and emission of a compound object succeeds only once every
//! child already resolves to an offset. On a missing child, the child is
//! pushed and the parent stays put for a later retry. Children therefore
//! always land before their parents, recursion is never used, and the scheme
//! terminates on any acyclic graph.
//!
//! Every emitted object is a non-heap copy whose pointer slots hold
//! intra-region offsets (scalar immediates pass through unchanged), interned
//! through the structural-sharing table so byte-identical objects are stored
//! once. Big numbers are the exception: their destructor must run exactly
//! once per source object, so they are never shared.

use crate::buffer::RegionBuffer;
use crate::sharing::SharingTable;
use crate::stats::CompactStats;
use crate::{align_up, TerminatorObject, NULL_OFFSET};
use basalt_runtime::object::{
    ObjPtr, ObjectHeader, ObjectKind, TAG_ARRAY, TAG_BIGNUM, TAG_RESERVED, TAG_SCALAR_ARRAY,
    TAG_STRING, TAG_THUNK,
};
use basalt_runtime::types::{
    array_byte_size, array_get, array_size, bignum_value, ctor_get, ctor_num_fields, ref_value,
    sarray_byte_size, sarray_data_ptr, sarray_elem_size, sarray_size, string_byte_size,
    string_data_ptr, task_value, thunk_value, ArrayObject, BigNumObject, CtorObject, RefObject,
    ScalarArrayObject, StringObject, ThunkObject,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::mem::size_of;

/// Initial buffer capacity of [`Compactor::new`].
const INITIAL_CAPACITY: usize = 1024 * 1024;

/// Serializes object graphs into a contiguous, position-independent region.
///
/// One compactor may compact several roots; each [`Compactor::compact`] call
/// appends the new root's closure and a terminator, sharing everything
/// already emitted for earlier roots.
pub struct Compactor {
    /// The region bytes built so far.
    buf: RegionBuffer,
    /// Source pointer → offset of its compacted copy.
    visited: FxHashMap<ObjPtr, usize>,
    /// Structural-sharing table over emitted byte windows.
    sharing: SharingTable,
    /// Objects pending emission (LIFO).
    todo: Vec<ObjPtr>,
    /// Emission counters.
    stats: CompactStats,
}

impl Compactor {
    /// Create a compactor with the default (megabyte-scale) buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// Create a compactor with a caller-chosen initial buffer capacity.
    ///
    /// Smaller capacities exercise growth earlier; the buffer still doubles
    /// on demand.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: RegionBuffer::with_capacity(capacity),
            visited: FxHashMap::default(),
            sharing: SharingTable::new(),
            todo: Vec::new(),
            stats: CompactStats::default(),
        }
    }

    /// Append the closure of `root`, followed by a terminator record.
    ///
    /// Panics when the graph reaches a closure or external object; neither
    /// can be rehydrated from bytes.
    ///
    /// # Safety
    ///
    /// `root` must be a scalar immediate or point into a live, acyclic
    /// (over serializable tags) object graph that stays unmodified for the
    /// duration of the call.
    pub unsafe fn compact(&mut self, root: ObjPtr) {
        debug_assert!(self.todo.is_empty());
        if !root.is_scalar() {
            self.todo.push(root);
            while let Some(curr) = self.todo.last().copied() {
                if self.visited.contains_key(&curr) {
                    self.todo.pop();
                    continue;
                }
                let emitted = match unsafe { curr.kind() } {
                    ObjectKind::Ctor => unsafe { self.emit_ctor(curr) },
                    ObjectKind::Array => unsafe { self.emit_array(curr) },
                    ObjectKind::ScalarArray => {
                        unsafe { self.emit_sarray(curr) };
                        true
                    }
                    ObjectKind::String => {
                        unsafe { self.emit_string(curr) };
                        true
                    }
                    ObjectKind::BigNum => {
                        unsafe { self.emit_bignum(curr) };
                        true
                    }
                    ObjectKind::Thunk => unsafe { self.emit_thunk(curr) },
                    ObjectKind::Task => unsafe { self.emit_task(curr) },
                    ObjectKind::Ref => unsafe { self.emit_ref(curr) },
                    ObjectKind::Closure => panic!("closure objects cannot be compacted"),
                    ObjectKind::External => panic!("external objects cannot be compacted"),
                    ObjectKind::Reserved => unreachable!("reserved tag on a live object"),
                };
                if emitted {
                    self.todo.pop();
                }
            }
        }
        self.insert_terminator(root);
    }

    /// Pointer to the start of the region bytes.
    #[inline]
    pub fn data(&self) -> *const u8 {
        self.buf.base()
    }

    /// Current fill of the region buffer.
    #[inline]
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the region bytes built so far.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    /// Emission statistics.
    #[inline]
    pub fn stats(&self) -> &CompactStats {
        &self.stats
    }

    // =========================================================================
    // Offset Resolution
    // =========================================================================

    /// Resolve a child pointer to its region offset.
    ///
    /// Scalars pass through unchanged. An unvisited child is pushed onto the
    /// work stack and [`NULL_OFFSET`] is returned, signalling the parent to
    /// retry after the child has been emitted.
    fn to_offset(&mut self, o: ObjPtr) -> usize {
        if o.is_scalar() {
            return o.addr();
        }
        match self.visited.get(&o) {
            Some(&offset) => offset,
            None => {
                self.todo.push(o);
                NULL_OFFSET
            }
        }
    }

    /// Record the compacted offset of a source pointer.
    fn save(&mut self, o: ObjPtr, offset: usize) {
        self.visited.insert(o, offset);
    }

    /// Intern the freshly emitted object at the buffer tail.
    ///
    /// On a sharing hit, the candidate is rewound off the tail and the
    /// source pointer resolves to the earlier byte-identical copy.
    fn save_shared(&mut self, o: ObjPtr, offset: usize, size: usize) {
        debug_assert_eq!(offset + align_up(size), self.buf.len());
        match self.sharing.intern(&self.buf, offset, size) {
            Some(canonical) => {
                self.buf.truncate(offset);
                self.stats.dedup_hits += 1;
                self.stats.dedup_bytes_saved += align_up(size);
                self.save(o, canonical);
            }
            None => self.save(o, offset),
        }
    }

    /// Append a bitwise copy of `o` with a fresh non-heap header.
    ///
    /// # Safety
    ///
    /// `o` must point to a live object.
    unsafe fn copy_object(&mut self, o: ObjPtr) -> usize {
        let hdr = unsafe { o.header() };
        let (size, tag, other) = (hdr.byte_size(), hdr.tag, hdr.other);
        let offset = self.buf.alloc(size);
        unsafe {
            let dst = self.buf.base().add(offset);
            std::ptr::copy_nonoverlapping(o.as_ptr().cast::<u8>(), dst, size);
            dst.cast::<ObjectHeader>()
                .write(ObjectHeader::non_heap(size, tag, other));
        }
        offset
    }

    // =========================================================================
    // Per-Tag Emission
    // =========================================================================

    /// Emit a constructor once all fields resolve.
    unsafe fn emit_ctor(&mut self, o: ObjPtr) -> bool {
        let num_fields = unsafe { ctor_num_fields(o) };
        let mut offsets: SmallVec<[usize; 8]> = SmallVec::new();
        let mut missing = false;
        for i in 0..num_fields {
            let c = self.to_offset(unsafe { ctor_get(o, i) });
            if c == NULL_OFFSET {
                missing = true;
            }
            offsets.push(c);
        }
        if missing {
            return false;
        }
        let size = unsafe { o.byte_size() };
        let offset = unsafe { self.copy_object(o) };
        unsafe {
            let slots = self
                .buf
                .base()
                .add(offset + size_of::<CtorObject>())
                .cast::<usize>();
            for (i, &c) in offsets.iter().enumerate() {
                slots.add(i).write(c);
            }
        }
        self.stats.ctors += 1;
        self.save_shared(o, offset, size);
        true
    }

    /// Emit an array once all elements resolve. Capacity is normalized to
    /// the element count; regions are immutable.
    unsafe fn emit_array(&mut self, o: ObjPtr) -> bool {
        let len = unsafe { array_size(o) };
        let mut offsets: SmallVec<[usize; 8]> = SmallVec::new();
        let mut missing = false;
        for i in 0..len {
            let c = self.to_offset(unsafe { array_get(o, i) });
            if c == NULL_OFFSET {
                missing = true;
            }
            offsets.push(c);
        }
        if missing {
            return false;
        }
        let size = array_byte_size(len);
        let offset = self.buf.alloc(size);
        unsafe {
            let dst = self.buf.base().add(offset);
            dst.cast::<ObjectHeader>()
                .write(ObjectHeader::non_heap(size, TAG_ARRAY, 0));
            let arr = dst.cast::<ArrayObject>();
            (*arr).size = len;
            (*arr).capacity = len;
            let slots = dst.add(size_of::<ArrayObject>()).cast::<usize>();
            for (i, &c) in offsets.iter().enumerate() {
                slots.add(i).write(c);
            }
        }
        self.stats.arrays += 1;
        self.save_shared(o, offset, size);
        true
    }

    /// Emit a scalar array: fresh header plus raw payload bytes, capacity
    /// normalized.
    unsafe fn emit_sarray(&mut self, o: ObjPtr) {
        let (len, elem_size) = unsafe { (sarray_size(o), sarray_elem_size(o)) };
        let size = sarray_byte_size(elem_size, len);
        let offset = self.buf.alloc(size);
        unsafe {
            let dst = self.buf.base().add(offset);
            dst.cast::<ObjectHeader>()
                .write(ObjectHeader::non_heap(size, TAG_SCALAR_ARRAY, elem_size));
            let arr = dst.cast::<ScalarArrayObject>();
            (*arr).size = len;
            (*arr).capacity = len;
            std::ptr::copy_nonoverlapping(
                sarray_data_ptr(o),
                dst.add(size_of::<ScalarArrayObject>()),
                len * elem_size as usize,
            );
        }
        self.stats.scalar_arrays += 1;
        self.save_shared(o, offset, size);
    }

    /// Emit a string: fresh header plus UTF-8 payload, capacity normalized.
    unsafe fn emit_string(&mut self, o: ObjPtr) {
        let src = o.as_ptr().cast::<StringObject>();
        let (payload, length) = unsafe { ((*src).size, (*src).length) };
        let size = string_byte_size(payload);
        let offset = self.buf.alloc(size);
        unsafe {
            let dst = self.buf.base().add(offset);
            dst.cast::<ObjectHeader>()
                .write(ObjectHeader::non_heap(size, TAG_STRING, 0));
            let s = dst.cast::<StringObject>();
            (*s).size = payload;
            (*s).capacity = payload;
            (*s).length = length;
            std::ptr::copy_nonoverlapping(
                string_data_ptr(o),
                dst.add(size_of::<StringObject>()),
                payload,
            );
        }
        self.stats.strings += 1;
        self.save_shared(o, offset, size);
    }

    /// Emit a thunk once its value resolves.
    unsafe fn emit_thunk(&mut self, o: ObjPtr) -> bool {
        let c = self.to_offset(unsafe { thunk_value(o) });
        if c == NULL_OFFSET {
            return false;
        }
        let size = unsafe { o.byte_size() };
        let offset = unsafe { self.copy_object(o) };
        unsafe {
            let t = self.buf.base().add(offset).cast::<ThunkObject>();
            std::ptr::addr_of_mut!((*t).value).cast::<usize>().write(c);
        }
        self.stats.thunks += 1;
        self.save_shared(o, offset, size);
        true
    }

    /// Emit a reference cell once its value resolves.
    unsafe fn emit_ref(&mut self, o: ObjPtr) -> bool {
        let c = self.to_offset(unsafe { ref_value(o) });
        if c == NULL_OFFSET {
            return false;
        }
        let size = unsafe { o.byte_size() };
        let offset = unsafe { self.copy_object(o) };
        unsafe {
            let r = self.buf.base().add(offset).cast::<RefObject>();
            std::ptr::addr_of_mut!((*r).value).cast::<usize>().write(c);
        }
        self.stats.refs += 1;
        self.save_shared(o, offset, size);
        true
    }

    /// Emit a task as a closure-free thunk.
    ///
    /// Regions must round-trip identically whether or not the loading
    /// runtime schedules tasks, and every task consumer accepts thunks, so
    /// the thunk shape is the portable one.
    unsafe fn emit_task(&mut self, o: ObjPtr) -> bool {
        let c = self.to_offset(unsafe { task_value(o) });
        if c == NULL_OFFSET {
            return false;
        }
        let size = size_of::<ThunkObject>();
        let offset = self.buf.alloc(size);
        unsafe {
            let dst = self.buf.base().add(offset);
            dst.cast::<ObjectHeader>()
                .write(ObjectHeader::non_heap(size, TAG_THUNK, 0));
            let t = dst.cast::<ThunkObject>();
            std::ptr::addr_of_mut!((*t).value).cast::<usize>().write(c);
            // closure slot stays null (zeroed)
        }
        self.stats.tasks += 1;
        self.save_shared(o, offset, size);
        true
    }

    /// Emit a big number as its decimal string.
    ///
    /// The tail reserves at least a pointer's worth of bytes: after the
    /// loader has consumed the string, the same bytes hold the resurrected
    /// list link. Never interned: each source big number must be
    /// resurrected (and destroyed) exactly once.
    unsafe fn emit_bignum(&mut self, o: ObjPtr) {
        let s = unsafe { bignum_value(o) }.to_string();
        let tail = (s.len() + 1).max(size_of::<*mut u8>());
        let size = size_of::<BigNumObject>() + tail;
        let offset = self.buf.alloc(size);
        unsafe {
            let dst = self.buf.base().add(offset);
            dst.cast::<ObjectHeader>()
                .write(ObjectHeader::non_heap(size, TAG_BIGNUM, 0));
            std::ptr::copy_nonoverlapping(
                s.as_ptr(),
                dst.add(size_of::<BigNumObject>()),
                s.len(),
            );
            // NUL terminator already zero
        }
        self.stats.bignums += 1;
        self.save(o, offset);
    }

    /// Append the terminator record holding the root's offset.
    fn insert_terminator(&mut self, root: ObjPtr) {
        let size = size_of::<TerminatorObject>();
        let offset = self.buf.alloc(size);
        let root_offset = if root.is_scalar() {
            root.addr()
        } else {
            self.visited[&root]
        };
        unsafe {
            let dst = self.buf.base().add(offset);
            dst.cast::<ObjectHeader>()
                .write(ObjectHeader::non_heap(size, TAG_RESERVED, 0));
            dst.add(size_of::<ObjectHeader>())
                .cast::<usize>()
                .write(root_offset);
        }
        self.stats.terminators += 1;
    }
}

impl Default for Compactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_runtime::{dec_ref, inc_ref, mk_closure, mk_ctor, mk_external, mk_string};

    #[test]
    fn test_children_precede_parents() {
        let s = mk_string("child");
        unsafe { inc_ref(s) };
        let parent = mk_ctor(0, &[s]);

        let mut c = Compactor::new();
        unsafe { c.compact(parent) };

        let child_off = c.visited[&s];
        let parent_off = c.visited[&parent];
        assert!(child_off < parent_off);

        unsafe {
            dec_ref(parent);
            dec_ref(s);
        }
    }

    #[test]
    fn test_output_is_word_aligned() {
        let mut c = Compactor::new();
        let root = mk_ctor(2, &[mk_string("uneven"), ObjPtr::from_scalar(3)]);
        unsafe { c.compact(root) };
        assert_eq!(c.size() % basalt_runtime::WORD_SIZE, 0);
        for &offset in c.visited.values() {
            assert_eq!(offset % basalt_runtime::WORD_SIZE, 0);
        }
        unsafe { dec_ref(root) };
    }

    #[test]
    fn test_identical_strings_share() {
        let a = mk_string("abc");
        let b = mk_string("abc");
        let root = mk_ctor(0, &[a, b]);

        let mut c = Compactor::new();
        unsafe { c.compact(root) };

        assert_eq!(c.stats().dedup_hits, 1);
        assert_eq!(c.visited[&a], c.visited[&b]);

        unsafe { dec_ref(root) };
    }

    #[test]
    fn test_deterministic_bytes() {
        let build = || {
            mk_ctor(
                5,
                &[mk_string("left"), mk_ctor(1, &[ObjPtr::from_scalar(9)])],
            )
        };
        let (r1, r2) = (build(), build());

        let mut c1 = Compactor::new();
        let mut c2 = Compactor::new();
        unsafe {
            c1.compact(r1);
            c2.compact(r2);
        }
        assert_eq!(c1.as_bytes(), c2.as_bytes());

        unsafe {
            dec_ref(r1);
            dec_ref(r2);
        }
    }

    #[test]
    fn test_multiple_roots_append() {
        let mut c = Compactor::new();
        unsafe {
            c.compact(ObjPtr::from_scalar(1));
            let after_first = c.size();
            c.compact(ObjPtr::from_scalar(2));
            assert!(c.size() > after_first);
        }
        assert_eq!(c.stats().terminators, 2);
    }

    #[test]
    #[should_panic(expected = "closure objects cannot be compacted")]
    fn test_closure_is_fatal() {
        let root = mk_ctor(0, &[mk_closure(0xDEAD, 1)]);
        let mut c = Compactor::new();
        unsafe { c.compact(root) };
    }

    #[test]
    #[should_panic(expected = "external objects cannot be compacted")]
    fn test_external_is_fatal() {
        let root = mk_external(7);
        let mut c = Compactor::new();
        unsafe { c.compact(root) };
    }
}
