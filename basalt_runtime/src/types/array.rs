//! Arrays of object slots.

use crate::object::{ObjPtr, ObjectHeader, WORD_SIZE};
use std::mem::size_of;

/// Array object. `size` object slots follow the struct.
#[repr(C)]
pub struct ArrayObject {
    /// Uniform object header.
    pub header: ObjectHeader,
    /// Number of live element slots.
    pub size: usize,
    /// Number of allocated element slots (equals `size` in regions).
    pub capacity: usize,
}

/// Byte size of an array with `capacity` element slots.
#[inline]
pub fn array_byte_size(capacity: usize) -> usize {
    size_of::<ArrayObject>() + capacity * WORD_SIZE
}

/// Number of elements.
///
/// # Safety
///
/// `o` must point to a live array object.
#[inline]
pub unsafe fn array_size(o: ObjPtr) -> usize {
    unsafe { (*o.as_ptr().cast::<ArrayObject>()).size }
}

/// Pointer to the first element slot.
///
/// # Safety
///
/// `o` must point to a live array object.
#[inline]
pub unsafe fn array_data_ptr(o: ObjPtr) -> *mut ObjPtr {
    unsafe { o.as_ptr().cast::<u8>().add(size_of::<ArrayObject>()).cast::<ObjPtr>() }
}

/// Read element `i`.
///
/// # Safety
///
/// `o` must point to a live array object and `i` must be in bounds.
#[inline]
pub unsafe fn array_get(o: ObjPtr, i: usize) -> ObjPtr {
    debug_assert!(i < unsafe { array_size(o) });
    unsafe { array_data_ptr(o).add(i).read() }
}

/// Write element `i`.
///
/// # Safety
///
/// `o` must point to a live array object and `i` must be in bounds.
#[inline]
pub unsafe fn array_set(o: ObjPtr, i: usize, v: ObjPtr) {
    debug_assert!(i < unsafe { array_size(o) });
    unsafe { array_data_ptr(o).add(i).write(v) }
}
