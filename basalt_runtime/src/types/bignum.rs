//! Arbitrary-precision integer objects.
//!
//! The numeric value is stored in place as a [`num_bigint::BigInt`]. Inside
//! a compacted region the value slot is instead backed by a decimal-string
//! payload until the loader resurrects it; see the region crate.

use crate::object::{ObjPtr, ObjectHeader};
use num_bigint::BigInt;

/// Arbitrary-precision integer object.
#[repr(C)]
pub struct BigNumObject {
    /// Uniform object header.
    pub header: ObjectHeader,
    /// The numeric value, constructed in place.
    pub value: BigInt,
}

/// Borrow the numeric value.
///
/// # Safety
///
/// `o` must point to a live big-number object whose value slot has been
/// initialized.
#[inline]
pub unsafe fn bignum_value<'a>(o: ObjPtr) -> &'a BigInt {
    unsafe { &(*o.as_ptr().cast::<BigNumObject>()).value }
}
