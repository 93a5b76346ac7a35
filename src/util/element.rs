//! Plain-old-data element types that can live in an [`Array`](crate::core::Array) buffer.

use std::fmt;

use half::f16;

use super::Type;

/// A POD scalar with a registered [`Type`].
///
/// Conversions between elements follow C cast semantics: integer to
/// integer wraps, float to integer truncates toward zero (saturating),
/// anything to float rounds to nearest.
pub trait Element:
    bytemuck::Pod + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Registered type of this element.
    const TYPE: Type;

    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
    fn to_i128(self) -> i128;
    fn from_i128(v: i128) -> Self;

    /// Convert into another element type.
    #[inline]
    fn cast<D: Element>(self) -> D {
        if Self::TYPE.is_integer() && D::TYPE.is_integer() {
            D::from_i128(self.to_i128())
        } else {
            D::from_f64(self.to_f64())
        }
    }
}

macro_rules! impl_int_element {
    ($($t:ty => $ty:expr),* $(,)?) => {$(
        impl Element for $t {
            const TYPE: Type = $ty;
            #[inline] fn to_f64(self) -> f64 { self as f64 }
            #[inline] fn from_f64(v: f64) -> Self { v as $t }
            #[inline] fn to_i128(self) -> i128 { self as i128 }
            #[inline] fn from_i128(v: i128) -> Self { v as $t }
        }
    )*};
}

impl_int_element! {
    i8 => Type::INT8,
    u8 => Type::UINT8,
    i16 => Type::INT16,
    u16 => Type::UINT16,
    i32 => Type::INT32,
    u32 => Type::UINT32,
    i64 => Type::INT64,
    u64 => Type::UINT64,
}

impl Element for f32 {
    const TYPE: Type = Type::FLOAT;
    #[inline] fn to_f64(self) -> f64 { self as f64 }
    #[inline] fn from_f64(v: f64) -> Self { v as f32 }
    #[inline] fn to_i128(self) -> i128 { self as i128 }
    #[inline] fn from_i128(v: i128) -> Self { v as f32 }
}

impl Element for f64 {
    const TYPE: Type = Type::DOUBLE;
    #[inline] fn to_f64(self) -> f64 { self }
    #[inline] fn from_f64(v: f64) -> Self { v }
    #[inline] fn to_i128(self) -> i128 { self as i128 }
    #[inline] fn from_i128(v: i128) -> Self { v as f64 }
}

impl Element for f16 {
    const TYPE: Type = Type::HALF;
    #[inline] fn to_f64(self) -> f64 { f16::to_f64(self) }
    #[inline] fn from_f64(v: f64) -> Self { f16::from_f64(v) }
    #[inline] fn to_i128(self) -> i128 { f16::to_f64(self) as i128 }
    #[inline] fn from_i128(v: i128) -> Self { f16::from_f64(v as f64) }
}

/// Expand `$body` once per POD element type, with `$T` bound to the Rust
/// type matching `$ty`. Non-POD kinds take the `_` arm.
macro_rules! dispatch_element {
    ($ty:expr, $T:ident => $body:expr, _ => $fallback:expr) => {
        match $ty.kind() {
            $crate::util::TypeKind::Int8 => { type $T = i8; $body }
            $crate::util::TypeKind::UInt8 => { type $T = u8; $body }
            $crate::util::TypeKind::Int16 => { type $T = i16; $body }
            $crate::util::TypeKind::UInt16 => { type $T = u16; $body }
            $crate::util::TypeKind::Int32 => { type $T = i32; $body }
            $crate::util::TypeKind::UInt32 => { type $T = u32; $body }
            $crate::util::TypeKind::Int64 => { type $T = i64; $body }
            $crate::util::TypeKind::UInt64 => { type $T = u64; $body }
            $crate::util::TypeKind::Float16 => { type $T = ::half::f16; $body }
            $crate::util::TypeKind::Float32 => { type $T = f32; $body }
            $crate::util::TypeKind::Float64 => { type $T = f64; $body }
            _ => $fallback,
        }
    };
}
pub(crate) use dispatch_element;

/// Reverse the byte order of every `width`-byte element in `buf`.
pub fn swap_bytes(buf: &mut [u8], width: usize) {
    if width <= 1 {
        return;
    }
    for chunk in buf.chunks_exact_mut(width) {
        chunk.reverse();
    }
}
