//! Type descriptors - the process-wide catalog of supported value kinds.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use super::{Error, Result};

/// Enumeration of every primitive kind a value cell or buffer can hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TypeKind {
    /// No type assigned yet
    #[default]
    Null = 0,
    /// Boolean
    Bool = 1,
    /// Signed 8-bit integer
    Int8 = 2,
    /// Unsigned 8-bit integer
    UInt8 = 3,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Unsigned 16-bit integer
    UInt16 = 5,
    /// Signed 32-bit integer
    Int32 = 6,
    /// Unsigned 32-bit integer
    UInt32 = 7,
    /// Signed 64-bit integer
    Int64 = 8,
    /// Unsigned 64-bit integer (also used for sizes)
    UInt64 = 9,
    /// 16-bit floating point (IEEE 754 half precision)
    Float16 = 10,
    /// 32-bit floating point
    Float32 = 11,
    /// 64-bit floating point
    Float64 = 12,
    /// UTF-8 string
    String = 13,
}

impl TypeKind {
    /// Number of kinds, including Null.
    pub const COUNT: usize = 14;

    /// Returns true if this is an integer kind.
    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::UInt8
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
        )
    }

    /// Returns true if this is a floating point kind.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Returns true if this is a numeric kind (int or float).
    #[inline]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }
}

/// Immutable descriptor of one kind.
#[derive(Debug)]
pub struct TypeInfo {
    kind: TypeKind,
    name: &'static str,
    size: usize,
    is_pod: bool,
}

const fn info(kind: TypeKind, name: &'static str, size: usize, is_pod: bool) -> TypeInfo {
    TypeInfo { kind, name, size, is_pod }
}

/// Descriptor table, indexed by `TypeKind as usize`.
static TYPE_INFOS: [TypeInfo; TypeKind::COUNT] = [
    info(TypeKind::Null, "", 0, false),
    info(TypeKind::Bool, "bool", 1, false),
    info(TypeKind::Int8, "int8", 1, true),
    info(TypeKind::UInt8, "uint8", 1, true),
    info(TypeKind::Int16, "int16", 2, true),
    info(TypeKind::UInt16, "uint16", 2, true),
    info(TypeKind::Int32, "int32", 4, true),
    info(TypeKind::UInt32, "uint32", 4, true),
    info(TypeKind::Int64, "int64", 8, true),
    info(TypeKind::UInt64, "uint64", 8, true),
    info(TypeKind::Float16, "half", 2, true),
    info(TypeKind::Float32, "float", 4, true),
    info(TypeKind::Float64, "double", 8, true),
    info(TypeKind::String, "string", std::mem::size_of::<String>(), false),
];

/// Handle to one of the immutable type descriptors.
///
/// A `Type` is a cheap `Copy` reference into a static table; there is
/// exactly one descriptor per kind, so two handles are equal iff they
/// describe the same kind.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Type(TypeKind);

impl Type {
    pub const NULL: Self = Self(TypeKind::Null);
    pub const BOOL: Self = Self(TypeKind::Bool);
    pub const INT8: Self = Self(TypeKind::Int8);
    pub const UINT8: Self = Self(TypeKind::UInt8);
    pub const INT16: Self = Self(TypeKind::Int16);
    pub const UINT16: Self = Self(TypeKind::UInt16);
    pub const INT32: Self = Self(TypeKind::Int32);
    pub const UINT32: Self = Self(TypeKind::UInt32);
    pub const INT64: Self = Self(TypeKind::Int64);
    pub const UINT64: Self = Self(TypeKind::UInt64);
    pub const SIZE_T: Self = Self::UINT64;
    pub const HALF: Self = Self(TypeKind::Float16);
    pub const FLOAT: Self = Self(TypeKind::Float32);
    pub const DOUBLE: Self = Self(TypeKind::Float64);
    pub const STRING: Self = Self(TypeKind::String);

    /// Type handle for a kind.
    #[inline]
    pub const fn of(kind: TypeKind) -> Self {
        Self(kind)
    }

    #[inline]
    fn info(self) -> &'static TypeInfo {
        &TYPE_INFOS[self.0 as usize]
    }

    /// The kind this type describes.
    #[inline]
    pub const fn kind(self) -> TypeKind {
        self.0
    }

    /// Registry name (empty for Null).
    #[inline]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Size in bytes of one value.
    #[inline]
    pub fn size(self) -> usize {
        self.info().size
    }

    /// True for plain-old-data kinds that can live in a raw buffer.
    #[inline]
    pub fn is_pod(self) -> bool {
        self.info().is_pod
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        matches!(self.0, TypeKind::Null)
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        self.0.is_integer()
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        self.0.is_float()
    }

    #[inline]
    pub const fn is_numeric(self) -> bool {
        self.0.is_numeric()
    }

    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self.0, TypeKind::String)
    }

    /// Look up a type by registry name or alias.
    pub fn get(name: &str) -> Result<Self> {
        registry()
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    /// All non-null types, in declaration order.
    pub fn all() -> impl Iterator<Item = Type> {
        TYPE_INFOS[1..].iter().map(|i| Type(i.kind))
    }

    /// Ordering used when listing types: by size, then by name.
    pub fn cmp_by_size(&self, other: &Self) -> std::cmp::Ordering {
        self.size()
            .cmp(&other.size())
            .then_with(|| self.name().cmp(other.name()))
    }
}

/// Name lookup, built once on first use and never mutated afterwards.
fn registry() -> &'static HashMap<&'static str, Type> {
    static REGISTRY: OnceLock<HashMap<&'static str, Type>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<&'static str, Type> = Type::all().map(|t| (t.name(), t)).collect();
        map.insert("size_t", Type::SIZE_T);
        map.insert("int", Type::INT32);
        map.insert("float16", Type::HALF);
        map.insert("float32", Type::FLOAT);
        map.insert("float64", Type::DOUBLE);
        map
    })
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Type(null)")
        } else {
            write!(f, "Type({})", self.name())
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{} (size: {} bytes)", self.name(), self.size())
        } else {
            write!(f, "{}", self.name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_sizes_and_names() {
        assert_eq!(Type::INT8.size(), 1);
        assert_eq!(Type::INT8.name(), "int8");
        assert_eq!(Type::INT32.size(), 4);
        assert_eq!(Type::INT32.name(), "int32");
        assert_eq!(Type::FLOAT.size(), 4);
        assert_eq!(Type::FLOAT.name(), "float");
        assert_eq!(Type::DOUBLE.size(), 8);
        assert_eq!(Type::DOUBLE.name(), "double");
        assert_eq!(Type::HALF.size(), 2);
        assert!(Type::DOUBLE.is_pod());
        assert!(!Type::STRING.is_pod());
    }

    #[test]
    fn test_null_type() {
        let null = Type::default();
        assert_eq!(null, Type::NULL);
        assert!(null.is_null());
        assert_eq!(null.size(), 0);
        assert_eq!(null.name(), "");
    }

    #[test]
    fn test_registry_lookup() {
        assert_eq!(Type::get("float").unwrap(), Type::FLOAT);
        assert_eq!(Type::get("size_t").unwrap(), Type::UINT64);
        assert_eq!(Type::get("int").unwrap(), Type::INT32);
        assert!(matches!(Type::get("complex"), Err(Error::UnknownType(_))));

        for t in Type::all() {
            assert_eq!(Type::get(t.name()).unwrap(), t);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Type::FLOAT), "float");
        assert_eq!(format!("{:#}", Type::DOUBLE), "double (size: 8 bytes)");
    }

    #[test]
    fn test_size_ordering() {
        let mut types = vec![Type::FLOAT, Type::INT8, Type::UINT16, Type::INT16, Type::UINT8];
        types.sort_by(Type::cmp_by_size);
        assert_eq!(
            types,
            vec![Type::INT8, Type::UINT8, Type::INT16, Type::UINT16, Type::FLOAT]
        );
    }
}
