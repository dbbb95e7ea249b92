//! Tagged, reference-counted heap object model for the Basalt runtime.
//!
//! This crate provides:
//! - The uniform 16-byte object header shared by every heap object
//! - The tag space (constructor tags plus the built-in object kinds)
//! - `ObjPtr`, a pointer-shaped value that encodes small integers inline
//! - Per-tag object layouts and their accessors
//! - Heap allocation and reference counting with iterative free
//! - A structural-equality walker over object graphs
//!
//! The object model is deliberately C-shaped: objects are raw, word-aligned
//! byte blocks beginning with an [`object::ObjectHeader`], so downstream
//! layers (most importantly the region compactor) can copy, relocate, and
//! fix them up bitwise.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod heap;
pub mod object;
pub mod structural;
pub mod types;

// Re-export commonly used items
pub use heap::{
    dec_ref, inc_ref, mk_array, mk_bignum, mk_closure, mk_ctor, mk_external, mk_ref,
    mk_scalar_array, mk_string, mk_task, mk_thunk,
};
pub use object::{ObjPtr, ObjectHeader, ObjectKind, MAX_CTOR_TAG, WORD_SIZE};
pub use structural::structural_eq;
