//! Fixed-width scalar types.
//!
//! Two views of the same thing:
//! - **Static**: the [`Scalar`] trait, implemented for the Rust primitives a
//!   field can hold. Used by hand-written accessors.
//! - **Dynamic**: [`ScalarType`] + [`ScalarValue`], driven by a schema catalog.
//!   Used by the record layer, the verifier and the dump.

use serde::{Deserialize, Serialize};

/// Scalar kinds a field or vector element can have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarType {
    /// Width in bytes (also the required alignment).
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Schema-language name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "byte",
            Self::U8 => "ubyte",
            Self::I16 => "short",
            Self::U16 => "ushort",
            Self::I32 => "int",
            Self::U32 => "uint",
            Self::I64 => "long",
            Self::U64 => "ulong",
            Self::F32 => "float",
            Self::F64 => "double",
        }
    }

    /// Parse a schema-language scalar name, including the sized aliases.
    pub fn parse(name: &str) -> Option<Self> {
        let ty = match name {
            "bool" => Self::Bool,
            "byte" | "int8" => Self::I8,
            "ubyte" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "long" | "int64" => Self::I64,
            "ulong" | "uint64" => Self::U64,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            _ => return None,
        };
        Some(ty)
    }

    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::Bool | Self::F32 | Self::F64)
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// The zero value of this type.
    pub const fn zero(self) -> ScalarValue {
        match self {
            Self::Bool => ScalarValue::Bool(false),
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => ScalarValue::Int(0),
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => ScalarValue::UInt(0),
            Self::F32 | Self::F64 => ScalarValue::Float(0.0),
        }
    }

    /// Whether `value` is representable without truncation.
    pub fn fits(self, value: ScalarValue) -> bool {
        let signed_range = |min: i64, max: i64| match value {
            ScalarValue::Int(v) => (min..=max).contains(&v),
            ScalarValue::UInt(v) => v <= max as u64,
            ScalarValue::Bool(_) | ScalarValue::Float(_) => false,
        };
        let unsigned_range = |max: u64| match value {
            ScalarValue::Int(v) => v >= 0 && (v as u64) <= max,
            ScalarValue::UInt(v) => v <= max,
            ScalarValue::Bool(_) | ScalarValue::Float(_) => false,
        };
        match self {
            Self::Bool => matches!(value, ScalarValue::Bool(_)),
            Self::I8 => signed_range(i8::MIN.into(), i8::MAX.into()),
            Self::I16 => signed_range(i16::MIN.into(), i16::MAX.into()),
            Self::I32 => signed_range(i32::MIN.into(), i32::MAX.into()),
            Self::I64 => signed_range(i64::MIN, i64::MAX),
            Self::U8 => unsigned_range(u8::MAX.into()),
            Self::U16 => unsigned_range(u16::MAX.into()),
            Self::U32 => unsigned_range(u32::MAX.into()),
            Self::U64 => unsigned_range(u64::MAX),
            Self::F32 | Self::F64 => !matches!(value, ScalarValue::Bool(_)),
        }
    }

    /// Decode a value of this type from little-endian bytes.
    pub fn read(self, bytes: &[u8]) -> ScalarValue {
        match self {
            Self::Bool => bool::read_le(bytes).to_value(),
            Self::I8 => i8::read_le(bytes).to_value(),
            Self::U8 => u8::read_le(bytes).to_value(),
            Self::I16 => i16::read_le(bytes).to_value(),
            Self::U16 => u16::read_le(bytes).to_value(),
            Self::I32 => i32::read_le(bytes).to_value(),
            Self::U32 => u32::read_le(bytes).to_value(),
            Self::I64 => i64::read_le(bytes).to_value(),
            Self::U64 => u64::read_le(bytes).to_value(),
            Self::F32 => f32::read_le(bytes).to_value(),
            Self::F64 => f64::read_le(bytes).to_value(),
        }
    }

    /// Encode `value` as this type into `out[..self.size()]`.
    pub fn write(self, value: ScalarValue, out: &mut [u8]) {
        match self {
            Self::Bool => bool::from_value(value).write_le(out),
            Self::I8 => i8::from_value(value).write_le(out),
            Self::U8 => u8::from_value(value).write_le(out),
            Self::I16 => i16::from_value(value).write_le(out),
            Self::U16 => u16::from_value(value).write_le(out),
            Self::I32 => i32::from_value(value).write_le(out),
            Self::U32 => u32::from_value(value).write_le(out),
            Self::I64 => i64::from_value(value).write_le(out),
            Self::U64 => u64::from_value(value).write_le(out),
            Self::F32 => f32::from_value(value).write_le(out),
            Self::F64 => f64::from_value(value).write_le(out),
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar value detached from its width.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl ScalarValue {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Bool(b) => b as i64,
            Self::Int(v) => v,
            Self::UInt(v) => v as i64,
            Self::Float(v) => v as i64,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            Self::Bool(b) => b as u64,
            Self::Int(v) => v as u64,
            Self::UInt(v) => v,
            Self::Float(v) => v as u64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Bool(b) => b as u8 as f64,
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(v) => v != 0,
            Self::UInt(v) => v != 0,
            Self::Float(v) => v != 0.0,
        }
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A Rust primitive that can be stored inline in a table or vector.
pub trait Scalar: Copy + PartialEq + Default + Send + Sync + 'static {
    /// Width in bytes, also its alignment.
    const SIZE: usize;
    const TYPE: ScalarType;

    /// Decode from the first `SIZE` bytes. Panics if `bytes` is shorter.
    fn read_le(bytes: &[u8]) -> Self;

    /// Encode into the first `SIZE` bytes. Panics if `out` is shorter.
    fn write_le(self, out: &mut [u8]);

    fn from_value(value: ScalarValue) -> Self;

    fn to_value(self) -> ScalarValue;
}

macro_rules! impl_scalar {
    ($ty:ty, $scalar:ident, $variant:ident, $wide:ty) => {
        impl Scalar for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();
            const TYPE: ScalarType = ScalarType::$scalar;

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&bytes[..Self::SIZE]);
                <$ty>::from_le_bytes(raw)
            }

            #[inline]
            fn write_le(self, out: &mut [u8]) {
                out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn from_value(value: ScalarValue) -> Self {
                match value {
                    ScalarValue::Bool(b) => b as u8 as $ty,
                    ScalarValue::Int(v) => v as $ty,
                    ScalarValue::UInt(v) => v as $ty,
                    ScalarValue::Float(v) => v as $ty,
                }
            }

            #[inline]
            fn to_value(self) -> ScalarValue {
                ScalarValue::$variant(self as $wide)
            }
        }
    };
}

impl_scalar!(i8, I8, Int, i64);
impl_scalar!(u8, U8, UInt, u64);
impl_scalar!(i16, I16, Int, i64);
impl_scalar!(u16, U16, UInt, u64);
impl_scalar!(i32, I32, Int, i64);
impl_scalar!(u32, U32, UInt, u64);
impl_scalar!(i64, I64, Int, i64);
impl_scalar!(u64, U64, UInt, u64);
impl_scalar!(f32, F32, Float, f64);
impl_scalar!(f64, F64, Float, f64);

impl Scalar for bool {
    const SIZE: usize = 1;
    const TYPE: ScalarType = ScalarType::Bool;

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[0] = self as u8;
    }

    #[inline]
    fn from_value(value: ScalarValue) -> Self {
        value.as_bool()
    }

    #[inline]
    fn to_value(self) -> ScalarValue {
        ScalarValue::Bool(self)
    }
}
