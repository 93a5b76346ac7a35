//! Typed multi-dimensional buffers.
//!
//! An [`Array`] owns one contiguous buffer of POD elements described by an
//! [`ArrayDim`] and a [`Type`]. Typed access goes through slices or the
//! borrowing [`ArrayView`] / [`ArrayViewMut`] wrappers, so the borrow
//! checker guarantees no view survives a resize or drop of its array.

use std::fmt;
use std::ops::{Index, IndexMut};

use super::dimensions::ArrayDim;
use super::value::{FromValue, Value};
use crate::util::{dispatch_element, Element, Error, Result, Type};

/// Owned, 8-byte aligned typed buffer.
#[derive(Clone, Default)]
pub struct Array {
    dim: ArrayDim,
    ty: Type,
    // u64 storage keeps every element type aligned for bytemuck casts.
    buf: Vec<u64>,
    len: usize,
}

/// Right-hand side of element-wise arithmetic.
#[derive(Clone, Debug)]
pub enum Operand<'a> {
    Array(&'a Array),
    Scalar(Value),
}

#[derive(Clone, Copy, Debug)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

fn aligned_buffer(len: usize) -> Vec<u64> {
    vec![0u64; len.div_ceil(8)]
}

fn check_pod(ty: Type, context: &str) -> Result<()> {
    if ty.is_pod() {
        Ok(())
    } else {
        Err(Error::UnsupportedType {
            ty: ty.name().to_string(),
            context: context.to_string(),
        })
    }
}

impl Array {
    /// Empty array: Null type, default dimensions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-filled array of `dim` elements of `ty`.
    pub fn zeros(dim: ArrayDim, ty: Type) -> Result<Self> {
        check_pod(ty, "array element")?;
        let len = dim.size() * ty.size();
        Ok(Self {
            dim,
            ty,
            buf: aligned_buffer(len),
            len,
        })
    }

    /// Array taking its elements from `data`.
    pub fn from_vec<T: Element>(dim: ArrayDim, data: Vec<T>) -> Result<Self> {
        if data.len() != dim.size() {
            return Err(Error::DimensionMismatch {
                expected: format!("{} elements", dim.size()),
                actual: format!("{} elements", data.len()),
            });
        }
        let mut array = Self::zeros(dim, T::TYPE)?;
        array
            .as_bytes_mut()
            .copy_from_slice(bytemuck::cast_slice(&data));
        Ok(array)
    }

    #[inline]
    pub fn dim(&self) -> ArrayDim {
        self.dim
    }

    #[inline]
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.dim.size()
    }

    /// Length of the buffer in bytes.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.buf)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.buf)[..self.len]
    }

    fn check_type<T: Element>(&self) -> Result<()> {
        if T::TYPE == self.ty {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: self.ty.name().to_string(),
                actual: T::TYPE.name().to_string(),
            })
        }
    }

    /// Elements as a typed slice; `T` must match the array type.
    pub fn data<T: Element>(&self) -> Result<&[T]> {
        self.check_type::<T>()?;
        bytemuck::try_cast_slice(self.as_bytes()).map_err(|e| Error::invalid(e.to_string()))
    }

    /// Mutable typed slice; `T` must match the array type.
    pub fn data_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        self.check_type::<T>()?;
        bytemuck::try_cast_slice_mut(self.as_bytes_mut())
            .map_err(|e| Error::invalid(e.to_string()))
    }

    pub fn view<T: Element>(&self) -> Result<ArrayView<'_, T>> {
        Ok(ArrayView {
            dim: self.dim,
            data: self.data()?,
        })
    }

    pub fn view_mut<T: Element>(&mut self) -> Result<ArrayViewMut<'_, T>> {
        let dim = self.dim;
        Ok(ArrayViewMut {
            dim,
            data: self.data_mut()?,
        })
    }

    /// Copy of the `index`-th item of the stack (1-based).
    pub fn item(&self, index: usize) -> Result<Array> {
        if index == 0 || index > self.dim.n {
            return Err(Error::IndexOutOfRange {
                index,
                count: self.dim.n,
            });
        }
        let mut out = Array::zeros(self.dim.item_dim(), self.ty)?;
        let item_bytes = out.byte_size();
        let start = (index - 1) * item_bytes;
        out.as_bytes_mut()
            .copy_from_slice(&self.as_bytes()[start..start + item_bytes]);
        Ok(out)
    }

    /// Change shape and optionally type. The buffer is kept when the byte
    /// length does not change, otherwise it is reallocated and zeroed.
    pub fn resize(&mut self, dim: ArrayDim, ty: Option<Type>) -> Result<()> {
        let ty = ty.unwrap_or(self.ty);
        if ty.is_null() {
            return Err(Error::invalid("resize requires a type"));
        }
        check_pod(ty, "array element")?;
        let len = dim.size() * ty.size();
        if len != self.len {
            self.buf = aligned_buffer(len);
            self.len = len;
        }
        self.dim = dim;
        self.ty = ty;
        Ok(())
    }

    /// Replace the contents with `src` converted element-wise to `ty`
    /// (defaults to `src`'s type). Narrowing conversions truncate.
    pub fn copy_from(&mut self, src: &Array, ty: Option<Type>) -> Result<()> {
        let target = ty.unwrap_or(src.ty);
        if src.ty.is_null() {
            *self = Array::new();
            return Ok(());
        }
        let mut out = Array::zeros(src.dim, target)?;
        if target == src.ty {
            out.as_bytes_mut().copy_from_slice(src.as_bytes());
        } else {
            convert_elements(src, &mut out)?;
        }
        *self = out;
        Ok(())
    }

    /// Set every element to `value`, cast to the array type.
    pub fn fill(&mut self, value: impl Into<Value>) -> Result<()> {
        let ty = self.ty;
        let value = value.into().cast(ty)?;
        dispatch_element!(ty, T => {
            let v = T::from_value(&value)?;
            self.data_mut::<T>()?.fill(v);
            Ok(())
        }, _ => Err(Error::invalid("fill on an empty array")))
    }

    pub fn add<'b>(&mut self, rhs: impl Into<Operand<'b>>) -> Result<()> {
        self.apply(rhs.into(), ArithOp::Add)
    }

    pub fn sub<'b>(&mut self, rhs: impl Into<Operand<'b>>) -> Result<()> {
        self.apply(rhs.into(), ArithOp::Sub)
    }

    pub fn mul<'b>(&mut self, rhs: impl Into<Operand<'b>>) -> Result<()> {
        self.apply(rhs.into(), ArithOp::Mul)
    }

    pub fn div<'b>(&mut self, rhs: impl Into<Operand<'b>>) -> Result<()> {
        self.apply(rhs.into(), ArithOp::Div)
    }

    fn apply(&mut self, rhs: Operand<'_>, op: ArithOp) -> Result<()> {
        let ty = self.ty;
        match rhs {
            Operand::Scalar(value) => {
                let value = value.cast(ty)?;
                dispatch_element!(ty, T => {
                    let b = T::from_value(&value)?;
                    for a in self.data_mut::<T>()? {
                        *a = arith(*a, b, op)?;
                    }
                    Ok(())
                }, _ => Err(Error::invalid("arithmetic on an empty array")))
            }
            Operand::Array(other) => {
                if other.dim != self.dim {
                    return Err(Error::DimensionMismatch {
                        expected: self.dim.to_string(),
                        actual: other.dim.to_string(),
                    });
                }
                let converted;
                let other = if other.ty == ty {
                    other
                } else {
                    let mut tmp = Array::new();
                    tmp.copy_from(other, Some(ty))?;
                    converted = tmp;
                    &converted
                };
                dispatch_element!(ty, T => {
                    let rhs = other.data::<T>()?;
                    for (a, b) in self.data_mut::<T>()?.iter_mut().zip(rhs) {
                        *a = arith(*a, *b, op)?;
                    }
                    Ok(())
                }, _ => Err(Error::invalid("arithmetic on an empty array")))
            }
        }
    }

    /// Minimum, maximum, mean and standard deviation of all elements.
    pub fn stats(&self) -> Result<Stats> {
        if self.is_empty() {
            return Err(Error::invalid("statistics of an empty array"));
        }
        dispatch_element!(self.ty, T => {
            Ok(Stats::from_values(self.data::<T>()?.iter().map(|v| v.to_f64())))
        }, _ => Err(Error::invalid("statistics of an empty array")))
    }
}

/// Summary statistics of an array, computed in double precision.
///
/// `std` is the sample standard deviation (divided by `n - 1`), zero for a
/// single element.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl Stats {
    fn from_values(values: impl Iterator<Item = f64> + Clone) -> Self {
        let mut s = Stats {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            ..Stats::default()
        };
        let mut count = 0usize;
        let mut sum = 0.0;
        for v in values.clone() {
            s.min = s.min.min(v);
            s.max = s.max.max(v);
            sum += v;
            count += 1;
        }
        s.mean = sum / count as f64;
        if count > 1 {
            let sq: f64 = values.map(|v| (v - s.mean) * (v - s.mean)).sum();
            s.std = (sq / (count - 1) as f64).sqrt();
        }
        s
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "min: {} max: {} mean: {} std: {}", self.min, self.max, self.mean, self.std)
    }
}

fn convert_elements(src: &Array, out: &mut Array) -> Result<()> {
    let target = out.ty;
    dispatch_element!(src.ty, S => {
        let input = src.data::<S>()?;
        dispatch_element!(target, D => {
            for (o, i) in out.data_mut::<D>()?.iter_mut().zip(input) {
                *o = i.cast::<D>();
            }
            Ok(())
        }, _ => Err(Error::UnsupportedType {
            ty: target.name().to_string(),
            context: "array element".to_string(),
        }))
    }, _ => Err(Error::UnsupportedType {
        ty: src.ty.name().to_string(),
        context: "array element".to_string(),
    }))
}

/// Integers wrap and reject division by zero; floats follow IEEE rules.
fn arith<T: Element>(a: T, b: T, op: ArithOp) -> Result<T> {
    if T::TYPE.is_integer() {
        let (x, y) = (a.to_i128(), b.to_i128());
        let r = match op {
            ArithOp::Add => x.wrapping_add(y),
            ArithOp::Sub => x.wrapping_sub(y),
            ArithOp::Mul => x.wrapping_mul(y),
            ArithOp::Div => x
                .checked_div(y)
                .ok_or_else(|| Error::invalid("integer division by zero"))?,
        };
        Ok(T::from_i128(r))
    } else {
        let (x, y) = (a.to_f64(), b.to_f64());
        let r = match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => x / y,
        };
        Ok(T::from_f64(r))
    }
}

impl<'a> From<&'a Array> for Operand<'a> {
    fn from(a: &'a Array) -> Self {
        Operand::Array(a)
    }
}

impl From<Value> for Operand<'_> {
    fn from(v: Value) -> Self {
        Operand::Scalar(v)
    }
}

macro_rules! impl_scalar_operand {
    ($($t:ty),*) => {$(
        impl From<$t> for Operand<'_> {
            fn from(v: $t) -> Self {
                Operand::Scalar(Value::from(v))
            }
        }
    )*};
}

impl_scalar_operand!(i8, u8, i16, u16, i32, u32, i64, u64, half::f16, f32, f64);

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.dim == other.dim && self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("dim", &self.dim)
            .field("ty", &self.ty)
            .field("bytes", &self.len)
            .finish()
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch_element!(self.ty, T => {
            match self.view::<T>() {
                Ok(view) => fmt::Display::fmt(&view, f),
                Err(_) => Err(fmt::Error),
            }
        }, _ => write!(f, "[]"))
    }
}

/// Read-only typed view over array memory.
///
/// Either borrowed from an [`Array`] or wrapped around external memory
/// with [`ArrayView::from_slice`]; it never owns the elements.
#[derive(Clone, Copy, Debug)]
pub struct ArrayView<'a, T> {
    dim: ArrayDim,
    data: &'a [T],
}

impl<'a, T: Element> ArrayView<'a, T> {
    /// Wrap external memory; `data` must hold exactly `dim.size()` elements.
    pub fn from_slice(dim: ArrayDim, data: &'a [T]) -> Result<Self> {
        if data.len() != dim.size() {
            return Err(Error::DimensionMismatch {
                expected: format!("{} elements", dim.size()),
                actual: format!("{} elements", data.len()),
            });
        }
        Ok(Self { dim, data })
    }

    #[inline]
    pub fn dim(&self) -> ArrayDim {
        self.dim
    }

    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Element at `(x, y, z)` of item `n` (1-based).
    pub fn get(&self, x: usize, y: usize, z: usize, n: usize) -> Option<&'a T> {
        if !self.dim.is_valid_index(x, y, z, n) {
            return None;
        }
        self.data.get(self.dim.offset(x, y, z, n - 1))
    }

    /// Owned copy of the viewed elements.
    pub fn to_array(&self) -> Result<Array> {
        Array::from_vec(self.dim, self.data.to_vec())
    }
}

/// Element `(x, y)` of the first slice of the first item.
impl<T: Element> Index<(usize, usize)> for ArrayView<'_, T> {
    type Output = T;

    fn index(&self, (x, y): (usize, usize)) -> &T {
        assert!(x < self.dim.x && y < self.dim.y, "index ({x}, {y}) out of bounds {}", self.dim);
        &self.data[self.dim.offset(x, y, 0, 0)]
    }
}

impl<T: Element> fmt::Display for ArrayView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = self.dim.x.max(1);
        let slice = self.dim.slice_size().max(1);
        for (i, line) in self.data.chunks(row).enumerate() {
            if i > 0 {
                writeln!(f)?;
                if (i * row) % slice == 0 {
                    writeln!(f)?;
                }
            }
            for (j, v) in line.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", v)?;
            }
        }
        Ok(())
    }
}

/// Mutable typed view over array memory.
#[derive(Debug)]
pub struct ArrayViewMut<'a, T> {
    dim: ArrayDim,
    data: &'a mut [T],
}

impl<'a, T: Element> ArrayViewMut<'a, T> {
    /// Wrap external mutable memory.
    pub fn from_slice(dim: ArrayDim, data: &'a mut [T]) -> Result<Self> {
        if data.len() != dim.size() {
            return Err(Error::DimensionMismatch {
                expected: format!("{} elements", dim.size()),
                actual: format!("{} elements", data.len()),
            });
        }
        Ok(Self { dim, data })
    }

    #[inline]
    pub fn dim(&self) -> ArrayDim {
        self.dim
    }

    pub fn as_slice(&self) -> &[T] {
        self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data
    }

    pub fn get(&self, x: usize, y: usize, z: usize, n: usize) -> Option<&T> {
        if !self.dim.is_valid_index(x, y, z, n) {
            return None;
        }
        self.data.get(self.dim.offset(x, y, z, n - 1))
    }

    pub fn get_mut(&mut self, x: usize, y: usize, z: usize, n: usize) -> Option<&mut T> {
        if !self.dim.is_valid_index(x, y, z, n) {
            return None;
        }
        self.data.get_mut(self.dim.offset(x, y, z, n - 1))
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T: Element> Index<(usize, usize)> for ArrayViewMut<'_, T> {
    type Output = T;

    fn index(&self, (x, y): (usize, usize)) -> &T {
        assert!(x < self.dim.x && y < self.dim.y, "index ({x}, {y}) out of bounds {}", self.dim);
        &self.data[self.dim.offset(x, y, 0, 0)]
    }
}

impl<T: Element> IndexMut<(usize, usize)> for ArrayViewMut<'_, T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        assert!(x < self.dim.x && y < self.dim.y, "index ({x}, {y}) out of bounds {}", self.dim);
        let offset = self.dim.offset(x, y, 0, 0);
        &mut self.data[offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;

    #[test]
    fn test_empty_array() {
        let a = Array::new();
        assert_eq!(a.ty(), Type::NULL);
        assert_eq!(a.dim(), ArrayDim::default());
        assert_eq!(a.byte_size(), 0);
        assert!(a.is_empty());
    }

    #[test]
    fn test_zeros() {
        let a = Array::zeros(ArrayDim::new(10, 10, 1, 1), Type::FLOAT).unwrap();
        assert_eq!(a.size(), 100);
        assert_eq!(a.byte_size(), 400);
        assert!(a.data::<f32>().unwrap().iter().all(|&v| v == 0.0));

        assert!(matches!(
            Array::zeros(ArrayDim::new(2, 2, 1, 1), Type::STRING),
            Err(Error::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_typed_access() {
        let mut a = Array::zeros(ArrayDim::new(3, 2, 1, 1), Type::INT16).unwrap();
        assert!(matches!(a.data::<f32>(), Err(Error::TypeMismatch { .. })));

        {
            let mut v = a.view_mut::<i16>().unwrap();
            v[(2, 1)] = 7;
            *v.get_mut(0, 1, 0, 1).unwrap() = -3;
        }
        let v = a.view::<i16>().unwrap();
        assert_eq!(v[(2, 1)], 7);
        assert_eq!(*v.get(0, 1, 0, 1).unwrap(), -3);
        assert!(v.get(0, 0, 0, 2).is_none());
        assert_eq!(a.data::<i16>().unwrap(), &[0, 0, 0, -3, 0, 7]);
    }

    #[test]
    fn test_external_view() {
        let mut raw = vec![1.0f64, 2.0, 3.0, 4.0];
        {
            let mut v = ArrayViewMut::from_slice(ArrayDim::new(2, 2, 1, 1), &mut raw).unwrap();
            v.fill(5.0);
        }
        assert_eq!(raw, vec![5.0; 4]);

        let v = ArrayView::from_slice(ArrayDim::new(2, 2, 1, 1), &raw).unwrap();
        let owned = v.to_array().unwrap();
        assert_eq!(owned.ty(), Type::DOUBLE);
        assert!(ArrayView::from_slice(ArrayDim::new(3, 2, 1, 1), &raw).is_err());
    }

    #[test]
    fn test_copy_with_conversion() {
        let src = Array::from_vec(ArrayDim::new(4, 1, 1, 1), vec![1.7f32, -2.5, 300.0, 0.0]).unwrap();
        let mut dst = Array::new();
        dst.copy_from(&src, Some(Type::INT16)).unwrap();
        assert_eq!(dst.ty(), Type::INT16);
        assert_eq!(dst.dim(), src.dim());
        assert_eq!(dst.data::<i16>().unwrap(), &[1, -2, 300, 0]);

        dst.copy_from(&src, Some(Type::UINT8)).unwrap();
        assert_eq!(dst.data::<u8>().unwrap(), &[1, 0, 255, 0]);

        dst.copy_from(&src, Some(Type::HALF)).unwrap();
        assert_eq!(dst.data::<f16>().unwrap()[1], f16::from_f32(-2.5));

        let mut same = Array::new();
        same.copy_from(&src, None).unwrap();
        assert_eq!(same, src);
    }

    #[test]
    fn test_deep_copy() {
        let a = Array::from_vec(ArrayDim::new(2, 1, 1, 1), vec![1u8, 2]).unwrap();
        let mut b = a.clone();
        b.data_mut::<u8>().unwrap()[0] = 9;
        assert_eq!(a.data::<u8>().unwrap(), &[1, 2]);
    }

    #[test]
    fn test_resize() {
        let mut a = Array::from_vec(ArrayDim::new(4, 1, 1, 1), vec![1i32, 2, 3, 4]).unwrap();
        a.resize(ArrayDim::new(2, 2, 1, 1), None).unwrap();
        assert_eq!(a.data::<i32>().unwrap(), &[1, 2, 3, 4]);

        a.resize(ArrayDim::new(8, 1, 1, 1), Some(Type::DOUBLE)).unwrap();
        assert_eq!(a.byte_size(), 64);
        assert!(a.data::<f64>().unwrap().iter().all(|&v| v == 0.0));

        assert!(Array::new().resize(ArrayDim::new(2, 2, 1, 1), None).is_err());
    }

    #[test]
    fn test_item() {
        let a = Array::from_vec(ArrayDim::new(2, 1, 1, 3), vec![1u16, 2, 3, 4, 5, 6]).unwrap();
        let item = a.item(2).unwrap();
        assert_eq!(item.dim(), ArrayDim::new(2, 1, 1, 1));
        assert_eq!(item.data::<u16>().unwrap(), &[3, 4]);
        assert!(matches!(a.item(4), Err(Error::IndexOutOfRange { index: 4, count: 3 })));
        assert!(a.item(0).is_err());
    }

    #[test]
    fn test_fill_and_arithmetic() {
        let dim = ArrayDim::new(3, 1, 1, 1);
        let mut a = Array::zeros(dim, Type::FLOAT).unwrap();
        a.fill(2).unwrap();
        assert_eq!(a.data::<f32>().unwrap(), &[2.0, 2.0, 2.0]);

        let b = Array::from_vec(dim, vec![1i32, 2, 3]).unwrap();
        a.add(&b).unwrap();
        assert_eq!(a.data::<f32>().unwrap(), &[3.0, 4.0, 5.0]);
        a.mul(2.0f64).unwrap();
        assert_eq!(a.data::<f32>().unwrap(), &[6.0, 8.0, 10.0]);
        a.sub(1).unwrap();
        a.div(0.5f32).unwrap();
        assert_eq!(a.data::<f32>().unwrap(), &[10.0, 14.0, 18.0]);

        let other = Array::zeros(ArrayDim::new(2, 1, 1, 1), Type::FLOAT).unwrap();
        assert!(matches!(a.add(&other), Err(Error::DimensionMismatch { .. })));

        let mut ints = b.clone();
        assert!(ints.div(0).is_err());
        ints.div(2).unwrap();
        assert_eq!(ints.data::<i32>().unwrap(), &[0, 1, 1]);
    }

    #[test]
    fn test_stats() {
        let a = Array::from_vec(ArrayDim::new(4, 1, 1, 1), vec![2i16, 4, 4, 6]).unwrap();
        let s = a.stats().unwrap();
        assert_eq!((s.min, s.max, s.mean), (2.0, 6.0, 4.0));
        assert!((s.std - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);

        let one = Array::from_vec(ArrayDim::new(1, 1, 1, 1), vec![-1.5f32]).unwrap();
        assert_eq!(
            one.stats().unwrap(),
            Stats { min: -1.5, max: -1.5, mean: -1.5, std: 0.0 }
        );

        let bytes = Array::from_vec(ArrayDim::new(3, 1, 1, 1), vec![255u8, 0, 9]).unwrap();
        let s = bytes.stats().unwrap();
        assert_eq!((s.min, s.max, s.mean), (0.0, 255.0, 88.0));
        assert!(matches!(Array::new().stats(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_display() {
        let a = Array::from_vec(ArrayDim::new(2, 2, 1, 1), vec![1u8, 2, 3, 4]).unwrap();
        assert_eq!(a.to_string(), "1 2\n3 4");
        assert_eq!(Array::new().to_string(), "[]");
    }
}
