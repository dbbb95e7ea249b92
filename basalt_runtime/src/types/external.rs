//! Foreign objects owned by native code.
//!
//! Externals wrap resources the runtime cannot inspect; like closures they
//! are rejected by the compactor.

use crate::object::ObjectHeader;

/// External object wrapping an opaque native resource.
#[repr(C)]
pub struct ExternalObject {
    /// Uniform object header.
    pub header: ObjectHeader,
    /// Opaque payload owned by native code.
    pub data: usize,
}
