//! Stored Values
//!
//! A store holds heterogeneous values in one map. Rather than carrying
//! runtime-typed objects, every value is one variant of the closed [`Value`]
//! union: the fixed-width numeric primitives, plus a few non-numeric shapes
//! (`bool`, UTF-8 text and opaque bytes).
//!
//! Numeric variants support in-place arithmetic through [`Value::add`] and
//! [`Value::sub`]. The delta must be the *same* variant as the stored value;
//! there is no implicit widening. Integer arithmetic wraps on overflow, exactly
//! like the fixed-width `wrapping_*` operations.
//!
//! ## Type Tags
//!
//! Each variant has a one-byte tag (used by the snapshot codec) and a
//! human-readable name:
//!
//! ```text
//! tag  name     tag  name
//! 0x01 i8       0x07 u32
//! 0x02 i16      0x08 u64
//! 0x03 i32      0x09 f32
//! 0x04 i64      0x0a f64
//! 0x05 u8       0x0b bool
//! 0x06 u16      0x0c string
//!               0x0d bytes
//! ```

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// One-byte type tags, written before every value payload in a snapshot.
pub mod tag {
    pub const I8: u8 = 0x01;
    pub const I16: u8 = 0x02;
    pub const I32: u8 = 0x03;
    pub const I64: u8 = 0x04;
    pub const U8: u8 = 0x05;
    pub const U16: u8 = 0x06;
    pub const U32: u8 = 0x07;
    pub const U64: u8 = 0x08;
    pub const F32: u8 = 0x09;
    pub const F64: u8 = 0x0a;
    pub const BOOL: u8 = 0x0b;
    pub const STRING: u8 = 0x0c;
    pub const BYTES: u8 = 0x0d;
}

/// A value held by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// UTF-8 text
    Str(String),
    /// Opaque binary payload
    Bytes(Bytes),
}

/// Why a numeric delta could not be applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    /// Both sides are numeric but of different types
    #[error("type mismatch: stored {stored}, delta {delta}")]
    TypeMismatch {
        stored: &'static str,
        delta: &'static str,
    },

    /// One side is not numeric
    #[error("{0} does not support arithmetic")]
    Unsupported(&'static str),
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Sub,
}

/// Applies `$op` to two same-variant numeric values.
///
/// Integers use the wrapping form, floats use plain IEEE arithmetic.
macro_rules! numeric_op {
    ($lhs:expr, $rhs:expr, $op:expr, ints: [$($int:ident),*], floats: [$($float:ident),*]) => {
        match ($lhs, $rhs) {
            $(
                (Value::$int(a), Value::$int(b)) => Some(Value::$int(match $op {
                    Op::Add => a.wrapping_add(*b),
                    Op::Sub => a.wrapping_sub(*b),
                })),
            )*
            $(
                (Value::$float(a), Value::$float(b)) => Some(Value::$float(match $op {
                    Op::Add => a + b,
                    Op::Sub => a - b,
                })),
            )*
            _ => None,
        }
    };
}

impl Value {
    /// Returns the one-byte snapshot tag for this variant.
    pub fn tag(&self) -> u8 {
        match self {
            Value::I8(_) => tag::I8,
            Value::I16(_) => tag::I16,
            Value::I32(_) => tag::I32,
            Value::I64(_) => tag::I64,
            Value::U8(_) => tag::U8,
            Value::U16(_) => tag::U16,
            Value::U32(_) => tag::U32,
            Value::U64(_) => tag::U64,
            Value::F32(_) => tag::F32,
            Value::F64(_) => tag::F64,
            Value::Bool(_) => tag::BOOL,
            Value::Str(_) => tag::STRING,
            Value::Bytes(_) => tag::BYTES,
        }
    }

    /// Returns the name of this variant's type ("i32", "string", ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Returns true for the integer and floating-point variants.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::Bool(_) | Value::Str(_) | Value::Bytes(_))
    }

    /// Returns `self + delta`.
    pub fn add(&self, delta: &Value) -> Result<Value, ArithmeticError> {
        self.apply(delta, Op::Add)
    }

    /// Returns `self - delta`.
    pub fn sub(&self, delta: &Value) -> Result<Value, ArithmeticError> {
        self.apply(delta, Op::Sub)
    }

    fn apply(&self, delta: &Value, op: Op) -> Result<Value, ArithmeticError> {
        if !delta.is_numeric() {
            return Err(ArithmeticError::Unsupported(delta.type_name()));
        }
        if !self.is_numeric() {
            return Err(ArithmeticError::Unsupported(self.type_name()));
        }

        numeric_op!(
            self,
            delta,
            op,
            ints: [I8, I16, I32, I64, U8, U16, U32, U64],
            floats: [F32, F64]
        )
        .ok_or(ArithmeticError::TypeMismatch {
            stored: self.type_name(),
            delta: delta.type_name(),
        })
    }

    /// Attempts to extract the inner text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract the value as an i64 (any signed or unsigned integer that fits).
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(n) => Some(n.into()),
            Value::I16(n) => Some(n.into()),
            Value::I32(n) => Some(n.into()),
            Value::I64(n) => Some(n),
            Value::U8(n) => Some(n.into()),
            Value::U16(n) => Some(n.into()),
            Value::U32(n) => Some(n.into()),
            Value::U64(n) => i64::try_from(n).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I8(n) => write!(f, "{}", n),
            Value::I16(n) => write!(f, "{}", n),
            Value::I32(n) => write!(f, "{}", n),
            Value::I64(n) => write!(f, "{}", n),
            Value::U8(n) => write!(f, "{}", n),
            Value::U16(n) => write!(f, "{}", n),
            Value::U32(n) => write!(f, "{}", n),
            Value::U64(n) => write!(f, "{}", n),
            Value::F32(n) => write!(f, "{}", n),
            Value::F64(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Bytes(b) => write!(f, "(binary data, {} bytes)", b.len()),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    String => Str,
    Bytes => Bytes,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(v))
    }
}
