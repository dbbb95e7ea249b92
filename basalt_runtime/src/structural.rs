//! Structural equality over object graphs.
//!
//! Two graphs are structurally equal when they have the same shape and the
//! same payloads, independent of where their objects live (heap or region)
//! and of any sharing introduced by compaction.

use crate::object::{ObjPtr, ObjectKind};
use crate::types::{
    array_get, array_size, bignum_value, ctor_get, ctor_num_fields, ref_value, sarray_bytes,
    sarray_elem_size, string_bytes, TaskObject, ThunkObject,
};

/// Compare two object graphs structurally.
///
/// Scalars compare by value; heap objects by tag and kind-specific payload,
/// descending through child slots with an explicit work stack (deep graphs
/// cannot overflow the call stack).
///
/// # Safety
///
/// Both roots must reference live, well-formed object graphs.
pub unsafe fn structural_eq(a: ObjPtr, b: ObjPtr) -> bool {
    let mut pending = vec![(a, b)];
    while let Some((a, b)) = pending.pop() {
        if a == b {
            // same scalar, same pointer, or both null
            continue;
        }
        if a.is_scalar() || b.is_scalar() || a.is_null() || b.is_null() {
            return false;
        }
        let (ha, hb) = unsafe { (a.header(), b.header()) };
        if ha.tag != hb.tag {
            return false;
        }
        match ha.kind() {
            ObjectKind::Ctor => unsafe {
                if ctor_num_fields(a) != ctor_num_fields(b) {
                    return false;
                }
                for i in 0..ctor_num_fields(a) {
                    pending.push((ctor_get(a, i), ctor_get(b, i)));
                }
            },
            ObjectKind::Array => unsafe {
                if array_size(a) != array_size(b) {
                    return false;
                }
                for i in 0..array_size(a) {
                    pending.push((array_get(a, i), array_get(b, i)));
                }
            },
            ObjectKind::ScalarArray => unsafe {
                if sarray_elem_size(a) != sarray_elem_size(b) || sarray_bytes(a) != sarray_bytes(b)
                {
                    return false;
                }
            },
            ObjectKind::String => unsafe {
                if string_bytes(a) != string_bytes(b) {
                    return false;
                }
            },
            ObjectKind::BigNum => unsafe {
                if bignum_value(a) != bignum_value(b) {
                    return false;
                }
            },
            ObjectKind::Thunk => unsafe {
                let (ta, tb) = (a.as_ptr().cast::<ThunkObject>(), b.as_ptr().cast::<ThunkObject>());
                pending.push(((*ta).value, (*tb).value));
                pending.push(((*ta).closure, (*tb).closure));
            },
            ObjectKind::Task => unsafe {
                let (ta, tb) = (a.as_ptr().cast::<TaskObject>(), b.as_ptr().cast::<TaskObject>());
                pending.push(((*ta).value, (*tb).value));
                pending.push(((*ta).closure, (*tb).closure));
            },
            ObjectKind::Ref => unsafe {
                pending.push((ref_value(a), ref_value(b)));
            },
            ObjectKind::Closure | ObjectKind::External | ObjectKind::Reserved => {
                // opaque kinds compare by identity only, which already failed
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{dec_ref, mk_array, mk_ctor, mk_string};

    #[test]
    fn test_equal_trees() {
        let a = mk_ctor(3, &[ObjPtr::from_scalar(1), mk_string("x")]);
        let b = mk_ctor(3, &[ObjPtr::from_scalar(1), mk_string("x")]);
        unsafe {
            assert!(structural_eq(a, b));
            dec_ref(a);
            dec_ref(b);
        }
    }

    #[test]
    fn test_unequal_payloads() {
        let a = mk_string("x");
        let b = mk_string("y");
        unsafe {
            assert!(!structural_eq(a, b));
            dec_ref(a);
            dec_ref(b);
        }
    }

    #[test]
    fn test_unequal_shapes() {
        let a = mk_ctor(3, &[ObjPtr::from_scalar(1)]);
        let b = mk_array(&[ObjPtr::from_scalar(1)]);
        unsafe {
            assert!(!structural_eq(a, b));
            dec_ref(a);
            dec_ref(b);
        }
    }

    #[test]
    fn test_scalar_mismatch() {
        unsafe {
            assert!(structural_eq(ObjPtr::from_scalar(4), ObjPtr::from_scalar(4)));
            assert!(!structural_eq(ObjPtr::from_scalar(4), ObjPtr::from_scalar(5)));
        }
    }
}
