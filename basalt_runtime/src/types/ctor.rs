//! Constructor objects: a tag plus N object field slots.
//!
//! The field count lives in the header's `other` byte, so a constructor's
//! byte size is fully determined by its header.

use crate::object::{ObjPtr, ObjectHeader, WORD_SIZE};
use std::mem::size_of;

/// Constructor object. `other` field slots follow the header.
#[repr(C)]
pub struct CtorObject {
    /// Uniform object header; `tag` is the constructor index, `other` the
    /// field count.
    pub header: ObjectHeader,
}

/// Byte size of a constructor with `num_fields` object slots.
#[inline]
pub fn ctor_byte_size(num_fields: usize) -> usize {
    size_of::<CtorObject>() + num_fields * WORD_SIZE
}

/// Number of object field slots.
///
/// # Safety
///
/// `o` must point to a live constructor object.
#[inline]
pub unsafe fn ctor_num_fields(o: ObjPtr) -> usize {
    unsafe { o.header() }.other as usize
}

/// Pointer to the first field slot.
///
/// # Safety
///
/// `o` must point to a live constructor object.
#[inline]
pub unsafe fn ctor_fields_ptr(o: ObjPtr) -> *mut ObjPtr {
    unsafe { o.as_ptr().cast::<u8>().add(size_of::<CtorObject>()).cast::<ObjPtr>() }
}

/// Read field `i`.
///
/// # Safety
///
/// `o` must point to a live constructor object and `i` must be in bounds.
#[inline]
pub unsafe fn ctor_get(o: ObjPtr, i: usize) -> ObjPtr {
    debug_assert!(i < unsafe { ctor_num_fields(o) });
    unsafe { ctor_fields_ptr(o).add(i).read() }
}

/// Write field `i`.
///
/// # Safety
///
/// `o` must point to a live constructor object and `i` must be in bounds.
#[inline]
pub unsafe fn ctor_set(o: ObjPtr, i: usize, v: ObjPtr) {
    debug_assert!(i < unsafe { ctor_num_fields(o) });
    unsafe { ctor_fields_ptr(o).add(i).write(v) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctor_byte_size() {
        assert_eq!(ctor_byte_size(0), 16);
        assert_eq!(ctor_byte_size(2), 16 + 2 * WORD_SIZE);
    }
}
