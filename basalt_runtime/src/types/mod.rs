//! Per-tag object layouts and accessors.
//!
//! Each object kind is a `#[repr(C)]` struct beginning with the uniform
//! [`crate::object::ObjectHeader`], optionally followed by a variable-size
//! payload (field slots, element slots, raw bytes). Accessors are free
//! `unsafe fn`s over [`crate::object::ObjPtr`]; callers guarantee the pointer
//! refers to a live object of the expected kind.

pub mod array;
pub mod bignum;
pub mod closure;
pub mod ctor;
pub mod external;
pub mod reference;
pub mod sarray;
pub mod string;
pub mod task;
pub mod thunk;

pub use array::{array_byte_size, array_data_ptr, array_get, array_set, array_size, ArrayObject};
pub use bignum::{bignum_value, BigNumObject};
pub use closure::ClosureObject;
pub use ctor::{ctor_byte_size, ctor_fields_ptr, ctor_get, ctor_num_fields, ctor_set, CtorObject};
pub use external::ExternalObject;
pub use reference::{ref_value, RefObject};
pub use sarray::{sarray_byte_size, sarray_bytes, sarray_data_ptr, sarray_elem_size, sarray_size, ScalarArrayObject};
pub use string::{string_byte_size, string_bytes, string_data_ptr, StringObject, string_as_str};
pub use task::{task_value, TaskObject};
pub use thunk::{thunk_value, ThunkObject};
