//! Arrays of raw scalar elements (byte payloads, no object slots).

use crate::object::{ObjPtr, ObjectHeader};
use std::mem::size_of;

/// Scalar array object. The element size lives in the header's `other` byte;
/// `size * elem_size` raw payload bytes follow the struct.
#[repr(C)]
pub struct ScalarArrayObject {
    /// Uniform object header; `other` is the element size in bytes.
    pub header: ObjectHeader,
    /// Number of live elements.
    pub size: usize,
    /// Number of allocated elements (equals `size` in regions).
    pub capacity: usize,
}

/// Byte size of a scalar array holding `capacity` elements of `elem_size`
/// bytes each.
#[inline]
pub fn sarray_byte_size(elem_size: u8, capacity: usize) -> usize {
    size_of::<ScalarArrayObject>() + capacity * elem_size as usize
}

/// Element size in bytes.
///
/// # Safety
///
/// `o` must point to a live scalar array object.
#[inline]
pub unsafe fn sarray_elem_size(o: ObjPtr) -> u8 {
    unsafe { o.header() }.other
}

/// Number of elements.
///
/// # Safety
///
/// `o` must point to a live scalar array object.
#[inline]
pub unsafe fn sarray_size(o: ObjPtr) -> usize {
    unsafe { (*o.as_ptr().cast::<ScalarArrayObject>()).size }
}

/// Pointer to the first payload byte.
///
/// # Safety
///
/// `o` must point to a live scalar array object.
#[inline]
pub unsafe fn sarray_data_ptr(o: ObjPtr) -> *mut u8 {
    unsafe { o.as_ptr().cast::<u8>().add(size_of::<ScalarArrayObject>()) }
}

/// The raw payload bytes.
///
/// # Safety
///
/// `o` must point to a live scalar array object.
#[inline]
pub unsafe fn sarray_bytes<'a>(o: ObjPtr) -> &'a [u8] {
    unsafe {
        let len = sarray_size(o) * sarray_elem_size(o) as usize;
        std::slice::from_raw_parts(sarray_data_ptr(o), len)
    }
}
