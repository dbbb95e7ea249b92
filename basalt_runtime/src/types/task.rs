//! Task objects: runtime-scheduled computations.

use crate::object::{ObjPtr, ObjectHeader, ObjectKind};
use crate::types::thunk::ThunkObject;

/// Task object. Shares the thunk layout so the two kinds are
/// interchangeable to consumers.
#[repr(C)]
pub struct TaskObject {
    /// Uniform object header.
    pub header: ObjectHeader,
    /// The computed value.
    pub value: ObjPtr,
    /// Suspended computation; null once computed.
    pub closure: ObjPtr,
}

/// The task's computed value.
///
/// Accepts thunks as well as tasks: compacted regions rewrite tasks into
/// thunks, and every task consumer must handle both shapes. Returns the
/// stored value slot without reduction, so a task chain unwraps one level
/// per call.
///
/// # Safety
///
/// `o` must point to a live task or evaluated thunk object.
#[inline]
pub unsafe fn task_value(o: ObjPtr) -> ObjPtr {
    match unsafe { o.kind() } {
        ObjectKind::Task => unsafe { (*o.as_ptr().cast::<TaskObject>()).value },
        ObjectKind::Thunk => unsafe { (*o.as_ptr().cast::<ThunkObject>()).value },
        kind => panic!("task_value: expected task or thunk, found {:?}", kind),
    }
}
