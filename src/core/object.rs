//! Type-sticky value cells.

use std::collections::BTreeMap;
use std::fmt;

use half::f16;

use super::value::{FromValue, Value};
use crate::util::{Result, Type};

/// A dynamically typed scalar whose type is fixed by its first assignment.
///
/// An empty `Object` has the Null type. The first [`set`](Self::set)
/// adopts the incoming value's type; later assignments are coerced into
/// that type. Only [`set_type`](Self::set_type) and
/// [`convert`](Self::convert) change the type afterwards.
///
/// # Example
///
/// ```
/// use emcore::core::Object;
/// use emcore::util::Type;
///
/// let mut o = Object::new();
/// o.set(7i32).unwrap();
/// o.set(2.9f64).unwrap();
/// assert_eq!(o.ty(), Type::INT32);
/// assert_eq!(o.get::<i32>().unwrap(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object {
    value: Value,
}

/// Named objects, used for image headers.
pub type ObjectDict = BTreeMap<String, Object>;

impl Object {
    /// Create an empty (Null typed) object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object of `ty` holding its zero value.
    pub fn with_type(ty: Type) -> Self {
        Self { value: Value::zero(ty) }
    }

    /// Current type.
    #[inline]
    pub fn ty(&self) -> Type {
        self.value.ty()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Stored value.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Assign a value, coercing it into the current type unless the object
    /// is still Null. On failure the object is left unchanged.
    pub fn set(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.value = if self.is_null() {
            value
        } else {
            value.cast(self.ty())?
        };
        Ok(())
    }

    /// Force the type and reset to its zero value.
    pub fn set_type(&mut self, ty: Type) {
        if self.ty() != ty {
            self.value = Value::zero(ty);
        }
    }

    /// Change the type, converting the current value.
    pub fn convert(&mut self, ty: Type) -> Result<()> {
        self.value = self.value.cast(ty)?;
        Ok(())
    }

    /// Parse text into the current type, or into the inferred type when
    /// the object is Null.
    pub fn parse(&mut self, text: &str) -> Result<()> {
        self.value = Value::parse(text, self.ty())?;
        Ok(())
    }

    /// Read the value as `T`, converting as needed.
    pub fn get<T: FromValue>(&self) -> Result<T> {
        T::from_value(&self.value)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl From<Value> for Object {
    fn from(value: Value) -> Self {
        Self { value }
    }
}

macro_rules! impl_object_literal {
    ($($t:ty),* $(,)?) => {$(
        impl From<$t> for Object {
            #[inline]
            fn from(v: $t) -> Self {
                Self { value: Value::from(v) }
            }
        }

        /// Compares after coercing the literal into the object's type.
        impl PartialEq<$t> for Object {
            fn eq(&self, other: &$t) -> bool {
                Value::from(other.clone())
                    .cast(self.ty())
                    .map(|v| v == self.value)
                    .unwrap_or(false)
            }
        }
    )*};
}

impl_object_literal!(bool, i8, u8, i16, u16, i32, u32, i64, u64, usize, f16, f32, f64, String);

impl From<&str> for Object {
    fn from(v: &str) -> Self {
        Self { value: Value::from(v) }
    }
}

impl PartialEq<&str> for Object {
    fn eq(&self, other: &&str) -> bool {
        Value::from(*other)
            .cast(self.ty())
            .map(|v| v == self.value)
            .unwrap_or(false)
    }
}
