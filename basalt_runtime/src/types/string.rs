//! UTF-8 string objects.
//!
//! The payload is the UTF-8 byte sequence followed by a NUL terminator;
//! `size` counts the terminator, `length` counts characters.

use crate::object::{ObjPtr, ObjectHeader};
use std::mem::size_of;

/// String object. `size` payload bytes (UTF-8 + NUL) follow the struct.
#[repr(C)]
pub struct StringObject {
    /// Uniform object header.
    pub header: ObjectHeader,
    /// Payload byte count, NUL terminator included.
    pub size: usize,
    /// Allocated payload bytes (equals `size` in regions).
    pub capacity: usize,
    /// Character (code point) count.
    pub length: usize,
}

/// Byte size of a string object with `size` payload bytes.
#[inline]
pub fn string_byte_size(size: usize) -> usize {
    size_of::<StringObject>() + size
}

/// Pointer to the first payload byte.
///
/// # Safety
///
/// `o` must point to a live string object.
#[inline]
pub unsafe fn string_data_ptr(o: ObjPtr) -> *mut u8 {
    unsafe { o.as_ptr().cast::<u8>().add(size_of::<StringObject>()) }
}

/// The UTF-8 payload bytes, NUL terminator excluded.
///
/// # Safety
///
/// `o` must point to a live string object.
#[inline]
pub unsafe fn string_bytes<'a>(o: ObjPtr) -> &'a [u8] {
    unsafe {
        let len = (*o.as_ptr().cast::<StringObject>()).size - 1;
        std::slice::from_raw_parts(string_data_ptr(o), len)
    }
}

/// The string contents as `&str`.
///
/// # Safety
///
/// `o` must point to a live string object holding valid UTF-8.
#[inline]
pub unsafe fn string_as_str<'a>(o: ObjPtr) -> &'a str {
    unsafe { std::str::from_utf8_unchecked(string_bytes(o)) }
}
