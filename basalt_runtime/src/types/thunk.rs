//! Thunk objects: a possibly-evaluated suspension.

use crate::object::{ObjPtr, ObjectHeader};

/// Thunk object. A fully evaluated thunk holds its result in `value` and a
/// null `closure`.
#[repr(C)]
pub struct ThunkObject {
    /// Uniform object header.
    pub header: ObjectHeader,
    /// The evaluated value.
    pub value: ObjPtr,
    /// Suspended computation; null once evaluated.
    pub closure: ObjPtr,
}

/// The thunk's evaluated value.
///
/// # Safety
///
/// `o` must point to a live, evaluated thunk object.
#[inline]
pub unsafe fn thunk_value(o: ObjPtr) -> ObjPtr {
    unsafe { (*o.as_ptr().cast::<ThunkObject>()).value }
}
