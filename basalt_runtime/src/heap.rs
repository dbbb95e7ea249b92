//! Heap allocation and reference counting.
//!
//! Objects are allocated zeroed and word-aligned from the global allocator.
//! Constructors take ownership of the references passed to them; callers
//! that keep a child alive elsewhere must [`inc_ref`] it first.
//!
//! [`dec_ref`] frees with an explicit work stack rather than recursion, so
//! dropping an arbitrarily deep graph cannot overflow the call stack.

use crate::object::{
    ObjPtr, ObjectHeader, ObjectKind, MAX_CTOR_TAG, TAG_ARRAY, TAG_BIGNUM, TAG_CLOSURE,
    TAG_EXTERNAL, TAG_REF, TAG_SCALAR_ARRAY, TAG_STRING, TAG_TASK, TAG_THUNK, WORD_SIZE,
};
use crate::types::{
    array_byte_size, array_data_ptr, array_get, array_size, ctor_byte_size, ctor_fields_ptr,
    ctor_get, ctor_num_fields, sarray_byte_size, sarray_data_ptr, string_byte_size,
    string_data_ptr, ArrayObject, BigNumObject, ClosureObject, ExternalObject, RefObject,
    ScalarArrayObject, StringObject, TaskObject, ThunkObject,
};
use num_bigint::BigInt;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::mem::size_of;
use std::ptr::addr_of_mut;

// =============================================================================
// Raw Allocation
// =============================================================================

/// Allocate a zeroed heap object of `size` bytes and write its header.
///
/// Panics on allocation failure; the runtime has no recovery path for OOM.
fn alloc_object(size: usize, tag: u8, other: u8) -> ObjPtr {
    let layout = Layout::from_size_align(size, WORD_SIZE).expect("invalid object layout");
    let ptr = unsafe { alloc_zeroed(layout) };
    if ptr.is_null() {
        panic!("failed to allocate object of {} bytes", size);
    }
    let header = ptr.cast::<ObjectHeader>();
    unsafe { header.write(ObjectHeader::heap(size, tag, other)) };
    ObjPtr::from_ptr(header)
}

// =============================================================================
// Object Constructors
// =============================================================================

/// Allocate a constructor object. Takes ownership of `fields`.
pub fn mk_ctor(tag: u8, fields: &[ObjPtr]) -> ObjPtr {
    assert!(tag <= MAX_CTOR_TAG, "constructor tag out of range: {}", tag);
    assert!(fields.len() <= u8::MAX as usize, "too many constructor fields");
    let o = alloc_object(ctor_byte_size(fields.len()), tag, fields.len() as u8);
    unsafe {
        let slots = ctor_fields_ptr(o);
        for (i, &f) in fields.iter().enumerate() {
            slots.add(i).write(f);
        }
    }
    o
}

/// Allocate an array object. Takes ownership of `elems`.
pub fn mk_array(elems: &[ObjPtr]) -> ObjPtr {
    let o = alloc_object(array_byte_size(elems.len()), TAG_ARRAY, 0);
    unsafe {
        let arr = o.as_ptr().cast::<ArrayObject>();
        (*arr).size = elems.len();
        (*arr).capacity = elems.len();
        let slots = array_data_ptr(o);
        for (i, &e) in elems.iter().enumerate() {
            slots.add(i).write(e);
        }
    }
    o
}

/// Allocate a scalar array from raw element bytes.
pub fn mk_scalar_array(elem_size: u8, data: &[u8]) -> ObjPtr {
    assert!(elem_size > 0, "scalar array element size must be nonzero");
    assert!(
        data.len() % elem_size as usize == 0,
        "scalar array payload is not a whole number of elements"
    );
    let size = data.len() / elem_size as usize;
    let o = alloc_object(sarray_byte_size(elem_size, size), TAG_SCALAR_ARRAY, elem_size);
    unsafe {
        let arr = o.as_ptr().cast::<ScalarArrayObject>();
        (*arr).size = size;
        (*arr).capacity = size;
        std::ptr::copy_nonoverlapping(data.as_ptr(), sarray_data_ptr(o), data.len());
    }
    o
}

/// Allocate a string object.
pub fn mk_string(s: &str) -> ObjPtr {
    let size = s.len() + 1; // NUL terminator included
    let o = alloc_object(string_byte_size(size), TAG_STRING, 0);
    unsafe {
        let str_obj = o.as_ptr().cast::<StringObject>();
        (*str_obj).size = size;
        (*str_obj).capacity = size;
        (*str_obj).length = s.chars().count();
        std::ptr::copy_nonoverlapping(s.as_ptr(), string_data_ptr(o), s.len());
        // terminator byte is already zero
    }
    o
}

/// Allocate an evaluated thunk holding `value`. Takes ownership of `value`.
pub fn mk_thunk(value: ObjPtr) -> ObjPtr {
    let o = alloc_object(size_of::<ThunkObject>(), TAG_THUNK, 0);
    unsafe {
        let t = o.as_ptr().cast::<ThunkObject>();
        (*t).value = value;
        (*t).closure = ObjPtr::null();
    }
    o
}

/// Allocate a completed task holding `value`. Takes ownership of `value`.
pub fn mk_task(value: ObjPtr) -> ObjPtr {
    let o = alloc_object(size_of::<TaskObject>(), TAG_TASK, 0);
    unsafe {
        let t = o.as_ptr().cast::<TaskObject>();
        (*t).value = value;
        (*t).closure = ObjPtr::null();
    }
    o
}

/// Allocate a reference cell holding `value`. Takes ownership of `value`.
pub fn mk_ref(value: ObjPtr) -> ObjPtr {
    let o = alloc_object(size_of::<RefObject>(), TAG_REF, 0);
    unsafe { (*o.as_ptr().cast::<RefObject>()).value = value };
    o
}

/// Allocate a big-number object, moving `value` into place.
pub fn mk_bignum(value: BigInt) -> ObjPtr {
    let o = alloc_object(size_of::<BigNumObject>(), TAG_BIGNUM, 0);
    unsafe {
        let b = o.as_ptr().cast::<BigNumObject>();
        addr_of_mut!((*b).value).write(value);
    }
    o
}

/// Allocate a closure stub with no captured arguments.
pub fn mk_closure(fun: usize, arity: u16) -> ObjPtr {
    let o = alloc_object(size_of::<ClosureObject>(), TAG_CLOSURE, 0);
    unsafe {
        let c = o.as_ptr().cast::<ClosureObject>();
        (*c).fun = fun;
        (*c).arity = arity;
    }
    o
}

/// Allocate an external object wrapping `data`.
pub fn mk_external(data: usize) -> ObjPtr {
    let o = alloc_object(size_of::<ExternalObject>(), TAG_EXTERNAL, 0);
    unsafe { (*o.as_ptr().cast::<ExternalObject>()).data = data };
    o
}

// =============================================================================
// Reference Counting
// =============================================================================

/// Increment the reference count. Scalars, nulls, and non-heap objects are
/// pass-through.
///
/// # Safety
///
/// Non-scalar, non-null `o` must point to a live object.
pub unsafe fn inc_ref(o: ObjPtr) {
    if o.is_scalar() || o.is_null() {
        return;
    }
    let hdr = unsafe { &mut *o.as_ptr() };
    if hdr.is_heap() {
        hdr.rc += 1;
    }
}

/// Decrement the reference count, freeing the object (and, transitively,
/// its children) when it reaches zero.
///
/// Uses an explicit work stack so deep graphs cannot overflow the call
/// stack. Scalars, nulls, and non-heap objects are pass-through.
///
/// # Safety
///
/// Non-scalar, non-null `o` must point to a live object, and the caller
/// must hold one reference to it.
pub unsafe fn dec_ref(o: ObjPtr) {
    let mut pending = vec![o];
    while let Some(cur) = pending.pop() {
        if cur.is_scalar() || cur.is_null() {
            continue;
        }
        let hdr = unsafe { &mut *cur.as_ptr() };
        if !hdr.is_heap() {
            continue;
        }
        debug_assert!(hdr.rc > 0, "dec_ref on a dead object");
        hdr.rc -= 1;
        if hdr.rc == 0 {
            unsafe { free_object(cur, &mut pending) };
        }
    }
}

/// Release one object's children onto the pending stack and free its memory.
unsafe fn free_object(o: ObjPtr, pending: &mut Vec<ObjPtr>) {
    let hdr = unsafe { o.header() };
    let size = hdr.byte_size();
    match hdr.kind() {
        ObjectKind::Ctor => unsafe {
            for i in 0..ctor_num_fields(o) {
                pending.push(ctor_get(o, i));
            }
        },
        ObjectKind::Array => unsafe {
            for i in 0..array_size(o) {
                pending.push(array_get(o, i));
            }
        },
        ObjectKind::Thunk => unsafe {
            let t = o.as_ptr().cast::<ThunkObject>();
            pending.push((*t).value);
            pending.push((*t).closure);
        },
        ObjectKind::Task => unsafe {
            let t = o.as_ptr().cast::<TaskObject>();
            pending.push((*t).value);
            pending.push((*t).closure);
        },
        ObjectKind::Ref => unsafe {
            pending.push((*o.as_ptr().cast::<RefObject>()).value);
        },
        ObjectKind::BigNum => unsafe {
            std::ptr::drop_in_place(addr_of_mut!((*o.as_ptr().cast::<BigNumObject>()).value));
        },
        ObjectKind::String
        | ObjectKind::ScalarArray
        | ObjectKind::Closure
        | ObjectKind::External => {}
        ObjectKind::Reserved => unreachable!("reserved tag on a heap object"),
    }
    unsafe {
        let layout = Layout::from_size_align_unchecked(size, WORD_SIZE);
        dealloc(o.as_ptr().cast::<u8>(), layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{bignum_value, ref_value, sarray_bytes, string_as_str, thunk_value};

    #[test]
    fn test_mk_string_roundtrip() {
        let s = mk_string("hello");
        unsafe {
            assert_eq!(string_as_str(s), "hello");
            let obj = s.as_ptr().cast::<StringObject>();
            assert_eq!((*obj).size, 6);
            assert_eq!((*obj).length, 5);
            dec_ref(s);
        }
    }

    #[test]
    fn test_mk_ctor_fields() {
        let a = ObjPtr::from_scalar(1);
        let b = mk_string("b");
        let c = mk_ctor(7, &[a, b]);
        unsafe {
            assert_eq!(ctor_num_fields(c), 2);
            assert_eq!(ctor_get(c, 0), a);
            assert_eq!(ctor_get(c, 1), b);
            assert_eq!(c.header().tag, 7);
            dec_ref(c);
        }
    }

    #[test]
    fn test_mk_array_elements() {
        let arr = mk_array(&[ObjPtr::from_scalar(1), ObjPtr::from_scalar(2)]);
        unsafe {
            assert_eq!(array_size(arr), 2);
            assert_eq!(array_get(arr, 1), ObjPtr::from_scalar(2));
            dec_ref(arr);
        }
    }

    #[test]
    fn test_mk_scalar_array_bytes() {
        let arr = mk_scalar_array(2, &[1, 0, 2, 0]);
        unsafe {
            assert_eq!(sarray_bytes(arr), &[1, 0, 2, 0]);
            dec_ref(arr);
        }
    }

    #[test]
    fn test_mk_bignum_value() {
        let big: BigInt = BigInt::from(1u8) << 100;
        let o = mk_bignum(big.clone());
        unsafe {
            assert_eq!(bignum_value(o), &big);
            dec_ref(o);
        }
    }

    #[test]
    fn test_thunk_and_ref_slots() {
        let t = mk_thunk(ObjPtr::from_scalar(5));
        let r = mk_ref(ObjPtr::from_scalar(9));
        unsafe {
            assert_eq!(thunk_value(t).scalar_value(), 5);
            assert_eq!(ref_value(r).scalar_value(), 9);
            dec_ref(t);
            dec_ref(r);
        }
    }

    #[test]
    fn test_shared_child_rc() {
        let shared = mk_string("shared");
        unsafe {
            inc_ref(shared);
            let pair = mk_ctor(0, &[shared, shared]);
            assert_eq!(shared.header().rc, 2);
            dec_ref(pair);
        }
    }

    #[test]
    fn test_deep_chain_free_is_iterative() {
        // A 100k-deep constructor chain must free without recursion.
        let mut tail = ObjPtr::from_scalar(0);
        for i in 0..100_000usize {
            tail = mk_ctor(1, &[ObjPtr::from_scalar(i), tail]);
        }
        unsafe { dec_ref(tail) };
    }
}
