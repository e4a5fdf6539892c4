//! The element type that parameterizes a compressed array.
//!
//! The codec quantizes every scalar type through a common `f64` projection rather than
//! special-casing each representation — the design treats the compression transform
//! itself as opaque, and lossless integer pass-through is explicitly out of scope, so there is
//! no accuracy contract for integers beyond "round-trips through the same lossy scheme floats
//! do". `Scalar` is sealed so the codec's quantization assumptions (a finite `f64` projection,
//! a native bit width used as the rate's natural ceiling) can't be broken by a downstream impl.

mod private {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
}

/// A scalar element type usable in a compressed array: `f32`, `f64`, `i32`, or `i64`.
pub trait Scalar: private::Sealed + Copy + Default + PartialEq + std::fmt::Debug + Send + Sync {
    /// native width in bits; the rate can never usefully exceed this.
    const BITS: u32;

    /// project this value onto `f64` for range-finding and quantization.
    fn to_f64(self) -> f64;

    /// recover a value from the `f64` projection used by [`Scalar::to_f64`].
    fn from_f64(value: f64) -> Self;
}

impl Scalar for f32 {
    const BITS: u32 = 32;
    fn to_f64(self) -> f64 { self as f64 }
    fn from_f64(value: f64) -> Self { value as f32 }
}

impl Scalar for f64 {
    const BITS: u32 = 64;
    fn to_f64(self) -> f64 { self }
    fn from_f64(value: f64) -> Self { value }
}

impl Scalar for i32 {
    const BITS: u32 = 32;
    fn to_f64(self) -> f64 { self as f64 }
    fn from_f64(value: f64) -> Self { value.round() as i32 }
}

impl Scalar for i64 {
    const BITS: u32 = 64;
    fn to_f64(self) -> f64 { self as f64 }
    fn from_f64(value: f64) -> Self { value.round() as i64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_round_trip_is_exact_for_representable_values() {
        for value in [0.0_f64, 1.5, -42.25, 1e10] {
            assert_eq!(f64::from_f64(value.to_f64()), value);
        }
    }

    #[test]
    fn integer_round_trip_is_exact_for_values_within_f64_precision() {
        for value in [0_i32, 1, -1, i16::MAX as i32, i16::MIN as i32] {
            assert_eq!(i32::from_f64(value.to_f64()), value);
        }
    }
}
