//! Tagged scalar values and the conversion table between kinds.

use std::cmp::Ordering;
use std::fmt;

use half::f16;

use crate::util::{Error, Result, Type, TypeKind};

/// A scalar of one of the registered kinds.
///
/// Variant names mirror [`TypeKind`], so `Value::ty` is a plain lookup.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float16(f16),
    Float32(f32),
    Float64(f64),
    String(String),
}

impl Value {
    /// Zero (or empty) value of a type.
    pub fn zero(ty: Type) -> Self {
        match ty.kind() {
            TypeKind::Null => Value::Null,
            TypeKind::String => Value::String(String::new()),
            _ => Value::from_i128(ty, 0),
        }
    }

    /// Type of the stored value.
    pub fn ty(&self) -> Type {
        let kind = match self {
            Value::Null => TypeKind::Null,
            Value::Bool(_) => TypeKind::Bool,
            Value::Int8(_) => TypeKind::Int8,
            Value::UInt8(_) => TypeKind::UInt8,
            Value::Int16(_) => TypeKind::Int16,
            Value::UInt16(_) => TypeKind::UInt16,
            Value::Int32(_) => TypeKind::Int32,
            Value::UInt32(_) => TypeKind::UInt32,
            Value::Int64(_) => TypeKind::Int64,
            Value::UInt64(_) => TypeKind::UInt64,
            Value::Float16(_) => TypeKind::Float16,
            Value::Float32(_) => TypeKind::Float32,
            Value::Float64(_) => TypeKind::Float64,
            Value::String(_) => TypeKind::String,
        };
        Type::of(kind)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of integer and boolean values.
    fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Value::Bool(v) => v as i128,
            Value::Int8(v) => v as i128,
            Value::UInt8(v) => v as i128,
            Value::Int16(v) => v as i128,
            Value::UInt16(v) => v as i128,
            Value::Int32(v) => v as i128,
            Value::UInt32(v) => v as i128,
            Value::Int64(v) => v as i128,
            Value::UInt64(v) => v as i128,
            _ => return None,
        })
    }

    /// Floating point view of any numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float16(v) => Some(v.to_f64()),
            Value::Float32(v) => Some(v as f64),
            Value::Float64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    fn from_i128(ty: Type, v: i128) -> Self {
        match ty.kind() {
            TypeKind::Null => Value::Null,
            TypeKind::Bool => Value::Bool(v != 0),
            TypeKind::Int8 => Value::Int8(v as i8),
            TypeKind::UInt8 => Value::UInt8(v as u8),
            TypeKind::Int16 => Value::Int16(v as i16),
            TypeKind::UInt16 => Value::UInt16(v as u16),
            TypeKind::Int32 => Value::Int32(v as i32),
            TypeKind::UInt32 => Value::UInt32(v as u32),
            TypeKind::Int64 => Value::Int64(v as i64),
            TypeKind::UInt64 => Value::UInt64(v as u64),
            TypeKind::Float16 => Value::Float16(f16::from_f64(v as f64)),
            TypeKind::Float32 => Value::Float32(v as f32),
            TypeKind::Float64 => Value::Float64(v as f64),
            TypeKind::String => Value::String(v.to_string()),
        }
    }

    fn from_f64(ty: Type, v: f64) -> Self {
        match ty.kind() {
            TypeKind::Null => Value::Null,
            TypeKind::Bool => Value::Bool(v != 0.0),
            TypeKind::Int8 => Value::Int8(v as i8),
            TypeKind::UInt8 => Value::UInt8(v as u8),
            TypeKind::Int16 => Value::Int16(v as i16),
            TypeKind::UInt16 => Value::UInt16(v as u16),
            TypeKind::Int32 => Value::Int32(v as i32),
            TypeKind::UInt32 => Value::UInt32(v as u32),
            TypeKind::Int64 => Value::Int64(v as i64),
            TypeKind::UInt64 => Value::UInt64(v as u64),
            TypeKind::Float16 => Value::Float16(f16::from_f64(v)),
            TypeKind::Float32 => Value::Float32(v as f32),
            TypeKind::Float64 => Value::Float64(v),
            TypeKind::String => Value::String(v.to_string()),
        }
    }

    /// Convert into `ty`.
    ///
    /// Numeric conversions never fail (integers wrap, floats truncate
    /// toward zero); strings are parsed and fail with [`Error::Conversion`].
    pub fn cast(&self, ty: Type) -> Result<Value> {
        if self.ty() == ty {
            return Ok(self.clone());
        }
        if ty.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Value::Null => Ok(Value::zero(ty)),
            Value::String(s) => Value::parse(s, ty),
            _ if ty.is_string() => Ok(Value::String(self.to_string())),
            _ => match self.as_i128() {
                Some(i) if !ty.is_float() => Ok(Value::from_i128(ty, i)),
                _ => {
                    let f = self.as_f64().ok_or_else(|| Error::conversion(self, ty))?;
                    Ok(Value::from_f64(ty, f))
                }
            },
        }
    }

    /// Parse text as a value of `ty`; a Null `ty` infers the type from
    /// the text first.
    pub fn parse(text: &str, ty: Type) -> Result<Value> {
        let t = text.trim();
        match ty.kind() {
            TypeKind::Null => Value::parse(text, Type::infer_from_str(t)),
            TypeKind::String => Ok(Value::String(text.to_string())),
            TypeKind::Bool => match t.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(Error::conversion(text, ty)),
            },
            TypeKind::Float32 => t
                .parse::<f32>()
                .map(Value::Float32)
                .map_err(|_| Error::conversion(text, ty)),
            TypeKind::Float16 | TypeKind::Float64 => t
                .parse::<f64>()
                .map(|v| Value::from_f64(ty, v))
                .map_err(|_| Error::conversion(text, ty)),
            _ => {
                if let Ok(i) = t.parse::<i128>() {
                    let v = Value::from_i128(ty, i);
                    // Reject literals outside the target range.
                    return if v.as_i128() == Some(i) {
                        Ok(v)
                    } else {
                        Err(Error::conversion(text, ty))
                    };
                }
                match t.parse::<f64>() {
                    Ok(f) if f.is_finite() => Ok(Value::from_f64(ty, f)),
                    _ => Err(Error::conversion(text, ty)),
                }
            }
        }
    }

    /// Total order used for sorting. Numbers compare numerically across
    /// kinds, strings lexicographically, and Null sorts first.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::String(a), Value::String(b)) => a.cmp(b),
            // Numbers before strings.
            (Value::String(_), _) => Ordering::Greater,
            (_, Value::String(_)) => Ordering::Less,
            _ => match (self.as_i128(), other.as_i128()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => {
                    let a = self.as_f64().unwrap_or(f64::NAN);
                    let b = other.as_f64().unwrap_or(f64::NAN);
                    a.total_cmp(&b)
                }
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float16(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
        }
    }
}

macro_rules! impl_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl From<$t> for Value {
            #[inline]
            fn from(v: $t) -> Self {
                Value::$variant(v)
            }
        }
    )*};
}

impl_value_from! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f16 => Float16,
    f32 => Float32,
    f64 => Float64,
    String => String,
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::UInt64(v as u64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

/// Extraction of a concrete Rust value, converting as needed.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

macro_rules! impl_from_value {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self> {
                let ty = Type::of(TypeKind::$variant);
                match value.cast(ty)? {
                    Value::$variant(v) => Ok(v),
                    other => Err(Error::conversion(other, ty)),
                }
            }
        }
    )*};
}

impl_from_value! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f16 => Float16,
    f32 => Float32,
    f64 => Float64,
    String => String,
}

impl FromValue for usize {
    fn from_value(value: &Value) -> Result<Self> {
        u64::from_value(value).map(|v| v as usize)
    }
}
