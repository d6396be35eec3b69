//! Attribute values
//!
//! Every value on the wire starts with one tag byte naming its type. Scalars
//! are fixed-width big-endian, arrays are a varint element count followed by
//! the elements, and the mixed array repeats a tag in front of every element.

use bytes::{Buf, BufMut};
use serde::Serialize;
use std::fmt;

use super::codec::{ensure_remaining, CodecError, CodecResult};
use super::string::{get_string, put_string};
use super::varint::{get_varint, put_varint};

/// Wire tag of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Boolean = 0x50,
    BooleanArray = 0x51,
    Byte = 0x52,
    ByteArray = 0x53,
    Short = 0x54,
    ShortArray = 0x55,
    Int = 0x56,
    IntArray = 0x57,
    Long = 0x58,
    LongArray = 0x59,
    Float = 0x5A,
    FloatArray = 0x5B,
    Double = 0x5C,
    DoubleArray = 0x5D,
    String = 0x5E,
    Raw = 0x5F,
    Array = 0x60,
}

impl TryFrom<u8> for ValueType {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0x50 => Self::Boolean,
            0x51 => Self::BooleanArray,
            0x52 => Self::Byte,
            0x53 => Self::ByteArray,
            0x54 => Self::Short,
            0x55 => Self::ShortArray,
            0x56 => Self::Int,
            0x57 => Self::IntArray,
            0x58 => Self::Long,
            0x59 => Self::LongArray,
            0x5A => Self::Float,
            0x5B => Self::FloatArray,
            0x5C => Self::Double,
            0x5D => Self::DoubleArray,
            0x5E => Self::String,
            0x5F => Self::Raw,
            0x60 => Self::Array,
            other => return Err(CodecError::UnknownValueType(other)),
        })
    }
}

/// A dynamically-typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    BooleanArray(Vec<bool>),
    ByteArray(Vec<i8>),
    ShortArray(Vec<i16>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    /// Opaque bytes
    Raw(Vec<u8>),
    /// Heterogeneous array, each element tagged
    Array(Vec<Value>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Byte(_) => ValueType::Byte,
            Value::Short(_) => ValueType::Short,
            Value::Int(_) => ValueType::Int,
            Value::Long(_) => ValueType::Long,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::BooleanArray(_) => ValueType::BooleanArray,
            Value::ByteArray(_) => ValueType::ByteArray,
            Value::ShortArray(_) => ValueType::ShortArray,
            Value::IntArray(_) => ValueType::IntArray,
            Value::LongArray(_) => ValueType::LongArray,
            Value::FloatArray(_) => ValueType::FloatArray,
            Value::DoubleArray(_) => ValueType::DoubleArray,
            Value::Raw(_) => ValueType::Raw,
            Value::Array(_) => ValueType::Array,
        }
    }
}

macro_rules! impl_from_scalar {
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

impl_from_scalar! {
    bool => Boolean,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::BooleanArray(v) => write!(f, "{v:?}"),
            Value::ByteArray(v) => write!(f, "{v:?}"),
            Value::ShortArray(v) => write!(f, "{v:?}"),
            Value::IntArray(v) => write!(f, "{v:?}"),
            Value::LongArray(v) => write!(f, "{v:?}"),
            Value::FloatArray(v) => write!(f, "{v:?}"),
            Value::DoubleArray(v) => write!(f, "{v:?}"),
            Value::Raw(v) => write!(f, "<{} bytes>", v.len()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Append the tag and payload of `value`
pub fn put_value<B: BufMut>(buf: &mut B, value: &Value) {
    buf.put_u8(value.value_type() as u8);
    put_payload(buf, value);
}

fn put_payload<B: BufMut>(buf: &mut B, value: &Value) {
    match value {
        Value::Boolean(v) => buf.put_u8(*v as u8),
        Value::Byte(v) => buf.put_i8(*v),
        Value::Short(v) => buf.put_i16(*v),
        Value::Int(v) => buf.put_i32(*v),
        Value::Long(v) => buf.put_i64(*v),
        Value::Float(v) => buf.put_f32(*v),
        Value::Double(v) => buf.put_f64(*v),
        Value::String(v) => put_string(buf, v),
        Value::BooleanArray(items) => put_array(buf, items, |b, v| b.put_u8(*v as u8)),
        Value::ByteArray(items) => put_array(buf, items, |b, v| b.put_i8(*v)),
        Value::ShortArray(items) => put_array(buf, items, |b, v| b.put_i16(*v)),
        Value::IntArray(items) => put_array(buf, items, |b, v| b.put_i32(*v)),
        Value::LongArray(items) => put_array(buf, items, |b, v| b.put_i64(*v)),
        Value::FloatArray(items) => put_array(buf, items, |b, v| b.put_f32(*v)),
        Value::DoubleArray(items) => put_array(buf, items, |b, v| b.put_f64(*v)),
        Value::Raw(bytes) => {
            put_varint(buf, bytes.len() as u64);
            buf.put_slice(bytes);
        }
        Value::Array(items) => put_array(buf, items, |b, v| put_value(b, v)),
    }
}

fn put_array<B: BufMut, T>(buf: &mut B, items: &[T], mut put: impl FnMut(&mut B, &T)) {
    put_varint(buf, items.len() as u64);
    for item in items {
        put(buf, item);
    }
}

/// Deepest nesting of mixed arrays a decoder accepts
pub const MAX_VALUE_DEPTH: usize = 64;

/// Mixed arrays grow past this many slots only as elements actually decode
const MAX_PREALLOCATED_ITEMS: usize = 1024;

/// Read a value tag
pub fn get_type<B: Buf>(buf: &mut B) -> CodecResult<ValueType> {
    ensure_remaining(buf, 1)?;
    ValueType::try_from(buf.get_u8())
}

/// Read the payload of a value whose tag was already consumed
pub fn get_value<B: Buf>(buf: &mut B, value_type: ValueType) -> CodecResult<Value> {
    get_value_at(buf, value_type, 0)
}

fn get_value_at<B: Buf>(buf: &mut B, value_type: ValueType, depth: usize) -> CodecResult<Value> {
    Ok(match value_type {
        ValueType::Boolean => {
            ensure_remaining(buf, 1)?;
            Value::Boolean(buf.get_u8() != 0)
        }
        ValueType::Byte => {
            ensure_remaining(buf, 1)?;
            Value::Byte(buf.get_i8())
        }
        ValueType::Short => {
            ensure_remaining(buf, 2)?;
            Value::Short(buf.get_i16())
        }
        ValueType::Int => {
            ensure_remaining(buf, 4)?;
            Value::Int(buf.get_i32())
        }
        ValueType::Long => {
            ensure_remaining(buf, 8)?;
            Value::Long(buf.get_i64())
        }
        ValueType::Float => {
            ensure_remaining(buf, 4)?;
            Value::Float(buf.get_f32())
        }
        ValueType::Double => {
            ensure_remaining(buf, 8)?;
            Value::Double(buf.get_f64())
        }
        ValueType::String => Value::String(get_string(buf)?),
        ValueType::BooleanArray => Value::BooleanArray(get_fixed_array(buf, 1, |b| b.get_u8() != 0)?),
        ValueType::ByteArray => Value::ByteArray(get_fixed_array(buf, 1, |b| b.get_i8())?),
        ValueType::ShortArray => Value::ShortArray(get_fixed_array(buf, 2, |b| b.get_i16())?),
        ValueType::IntArray => Value::IntArray(get_fixed_array(buf, 4, |b| b.get_i32())?),
        ValueType::LongArray => Value::LongArray(get_fixed_array(buf, 8, |b| b.get_i64())?),
        ValueType::FloatArray => Value::FloatArray(get_fixed_array(buf, 4, |b| b.get_f32())?),
        ValueType::DoubleArray => Value::DoubleArray(get_fixed_array(buf, 8, |b| b.get_f64())?),
        ValueType::Raw => Value::Raw(get_fixed_array(buf, 1, |b| b.get_u8())?),
        ValueType::Array => {
            if depth >= MAX_VALUE_DEPTH {
                return Err(CodecError::NestingTooDeep(MAX_VALUE_DEPTH));
            }
            let count = get_count(buf)?;
            // Every element needs at least its tag byte
            ensure_remaining(buf, count)?;

            let mut items = Vec::with_capacity(count.min(MAX_PREALLOCATED_ITEMS));
            for _ in 0..count {
                let element_type = get_type(buf)?;
                items.push(get_value_at(buf, element_type, depth + 1)?);
            }
            Value::Array(items)
        }
    })
}

/// Read a tagged value in one step
pub fn get_tagged_value<B: Buf>(buf: &mut B) -> CodecResult<Value> {
    let value_type = get_type(buf)?;
    get_value(buf, value_type)
}

fn get_count<B: Buf>(buf: &mut B) -> CodecResult<usize> {
    let count = get_varint(buf)?;
    Ok(usize::try_from(count).unwrap_or(usize::MAX))
}

fn get_fixed_array<B: Buf, T>(
    buf: &mut B,
    width: usize,
    mut get: impl FnMut(&mut B) -> T,
) -> CodecResult<Vec<T>> {
    let count = get_count(buf)?;
    ensure_remaining(buf, count.saturating_mul(width))?;

    Ok((0..count).map(|_| get(buf)).collect())
}
