//! Mutable reference cells.

use crate::object::{ObjPtr, ObjectHeader};

/// Reference cell object.
#[repr(C)]
pub struct RefObject {
    /// Uniform object header.
    pub header: ObjectHeader,
    /// The referenced value.
    pub value: ObjPtr,
}

/// The referenced value.
///
/// # Safety
///
/// `o` must point to a live reference cell.
#[inline]
pub unsafe fn ref_value(o: ObjPtr) -> ObjPtr {
    unsafe { (*o.as_ptr().cast::<RefObject>()).value }
}
