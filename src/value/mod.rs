//! This module contains the typed SQL [`Value`] that can be used as a partitioning key and the rules
//! that turn it into a [`NormalizedKey`] - the only input the partitioning schemes understand.
//!
//! Fixed width integers reserve the minimum value of their width to represent SQL NULL. These sentinels
//! are decoded here, at the boundary, so that nothing past this module has to ask whether a bit pattern is
//! secretly a NULL.
//!
//! When serialized, a [`Value`] looks like the following (big endian):
//!
//! [1 byte - type tag][payload]
//!
//! Fixed width types carry their value as payload. STRING and VARBINARY carry [4 bytes - length][bytes],
//! where a length of [`NULL_LENGTH`] marks NULL and a length of 0 is a present, empty value.
//! [`ValueType::Null`] has no payload.
use std::{fmt, mem::size_of, str::FromStr};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use strum_macros::{Display, EnumString};
use tracing::{event, Level};

use crate::error::{Error, Result, UnsupportedValueType};

/// NULL sentinel for [`ValueType::TinyInt`]
pub const NULL_TINYINT: i8 = i8::MIN;
/// NULL sentinel for [`ValueType::SmallInt`]
pub const NULL_SMALLINT: i16 = i16::MIN;
/// NULL sentinel for [`ValueType::Integer`]
pub const NULL_INTEGER: i32 = i32::MIN;
/// NULL sentinel for [`ValueType::BigInt`] (and [`ValueType::Timestamp`])
pub const NULL_BIGINT: i64 = i64::MIN;
/// Length prefix that marks a NULL STRING or VARBINARY on the wire
pub const NULL_LENGTH: i32 = -1;

/// SQL types known to this crate, tagged with their wire ids.
///
/// Only integer, string and varbinary types can be used as partitioning keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[repr(i8)]
pub enum ValueType {
    Null = 1,
    TinyInt = 3,
    SmallInt = 4,
    Integer = 5,
    BigInt = 6,
    Float = 8,
    String = 9,
    Timestamp = 11,
    VarBinary = 25,
}

impl ValueType {
    /// Returns true if values of this type can be hashed to a partition
    pub fn is_partitionable(&self) -> bool {
        !matches!(self, ValueType::Float | ValueType::Timestamp)
    }
}

impl TryFrom<i8> for ValueType {
    type Error = Error;

    fn try_from(tag: i8) -> Result<Self> {
        Ok(match tag {
            1 => ValueType::Null,
            3 => ValueType::TinyInt,
            4 => ValueType::SmallInt,
            5 => ValueType::Integer,
            6 => ValueType::BigInt,
            8 => ValueType::Float,
            9 => ValueType::String,
            11 => ValueType::Timestamp,
            25 => ValueType::VarBinary,
            _ => {
                return Err(Error::UnsupportedType {
                    value_type: UnsupportedValueType::UnknownTag(tag),
                })
            }
        })
    }
}

/// A typed SQL value.
///
/// Integer variants hold the raw bit pattern, so a variant holding its width's sentinel (eg: [`NULL_INTEGER`])
/// *is* NULL. STRING and VARBINARY use `None` for NULL; `Some` of an empty value is not NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f64),
    Timestamp(i64),
    String(Option<String>),
    VarBinary(Option<Bytes>),
}

/// The hashing input a [`Value`] reduces to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NormalizedKey {
    Null,
    Integer(i64),
    Bytes(Bytes),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::TinyInt(_) => ValueType::TinyInt,
            Value::SmallInt(_) => ValueType::SmallInt,
            Value::Integer(_) => ValueType::Integer,
            Value::BigInt(_) => ValueType::BigInt,
            Value::Float(_) => ValueType::Float,
            Value::Timestamp(_) => ValueType::Timestamp,
            Value::String(_) => ValueType::String,
            Value::VarBinary(_) => ValueType::VarBinary,
        }
    }

    /// Returns the NULL representation for the given [`ValueType`]
    pub fn null_of(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Null => Value::Null,
            ValueType::TinyInt => Value::TinyInt(NULL_TINYINT),
            ValueType::SmallInt => Value::SmallInt(NULL_SMALLINT),
            ValueType::Integer => Value::Integer(NULL_INTEGER),
            ValueType::BigInt => Value::BigInt(NULL_BIGINT),
            ValueType::Float => Value::Float(f64::MIN),
            ValueType::Timestamp => Value::Timestamp(NULL_BIGINT),
            ValueType::String => Value::String(None),
            ValueType::VarBinary => Value::VarBinary(None),
        }
    }

    /// Reduces this value to the [`NormalizedKey`] that partitioning schemes hash.
    ///
    /// Integers are sign extended to 64 bits unless they hold their width's NULL sentinel.
    /// Strings are hashed as their utf8 bytes.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedType`] if this value's type is not a legal partitioning key.
    pub fn normalize(&self) -> Result<NormalizedKey> {
        Ok(match self {
            Value::Null => NormalizedKey::Null,
            Value::TinyInt(v) => integer_or_null(*v == NULL_TINYINT, *v as i64),
            Value::SmallInt(v) => integer_or_null(*v == NULL_SMALLINT, *v as i64),
            Value::Integer(v) => integer_or_null(*v == NULL_INTEGER, *v as i64),
            Value::BigInt(v) => integer_or_null(*v == NULL_BIGINT, *v),
            Value::String(Some(s)) => NormalizedKey::Bytes(Bytes::copy_from_slice(s.as_bytes())),
            Value::VarBinary(Some(b)) => NormalizedKey::Bytes(b.clone()),
            Value::String(None) | Value::VarBinary(None) => NormalizedKey::Null,
            Value::Float(_) | Value::Timestamp(_) => {
                return Err(Error::UnsupportedType {
                    value_type: UnsupportedValueType::Known(self.value_type()),
                })
            }
        })
    }

    /// Parses a textual literal of the given type. The literal `null` (any case) yields [`Value::null_of`].
    /// STRING literals are taken verbatim and VARBINARY literals are hex encoded.
    pub fn parse_literal(value_type: ValueType, literal: &str) -> Result<Self> {
        if value_type == ValueType::Null || literal.eq_ignore_ascii_case("null") {
            return Ok(Self::null_of(value_type));
        }

        Ok(match value_type {
            ValueType::Null => Value::Null,
            ValueType::TinyInt => Value::TinyInt(parse_number(value_type, literal)?),
            ValueType::SmallInt => Value::SmallInt(parse_number(value_type, literal)?),
            ValueType::Integer => Value::Integer(parse_number(value_type, literal)?),
            ValueType::BigInt => Value::BigInt(parse_number(value_type, literal)?),
            ValueType::Float => Value::Float(parse_number(value_type, literal)?),
            ValueType::Timestamp => Value::Timestamp(parse_number(value_type, literal)?),
            ValueType::String => Value::String(Some(literal.to_string())),
            ValueType::VarBinary => {
                let decoded = hex::decode(literal).map_err(|e| Error::InvalidValue {
                    reason: format!("Unable to hex::decode varbinary literal - {}", e),
                })?;
                Value::VarBinary(Some(decoded.into()))
            }
        })
    }

    /// Serializes a [`Value`] into its wire format (see top level comment for format)
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(size_of::<i8>() + self.payload_len());
        buf.put_i8(self.value_type() as i8);
        match self {
            Value::Null => {}
            Value::TinyInt(v) => buf.put_i8(*v),
            Value::SmallInt(v) => buf.put_i16(*v),
            Value::Integer(v) => buf.put_i32(*v),
            Value::BigInt(v) | Value::Timestamp(v) => buf.put_i64(*v),
            Value::Float(v) => buf.put_f64(*v),
            Value::String(v) => put_var_len(&mut buf, v.as_ref().map(|s| s.as_bytes())),
            Value::VarBinary(v) => put_var_len(&mut buf, v.as_deref()),
        }

        buf.freeze()
    }

    /// Deserializes a single [`Value`] from the provided buffer. Bytes following the value are left untouched.
    ///
    /// # Errors
    /// This functions returns errors in the following cases
    ///  1. The type tag is unknown ([`Error::UnsupportedType`])
    ///  2. The payload is truncated, a length is negative but not [`NULL_LENGTH`] or a string is not utf8 ([`Error::InvalidValue`])
    pub fn deserialize<B: Buf>(buf: &mut B) -> Result<Self> {
        ensure_remaining(buf, size_of::<i8>())?;
        let value_type = ValueType::try_from(buf.get_i8())?;
        event!(Level::TRACE, "Will read value payload of type {}", value_type);

        Ok(match value_type {
            ValueType::Null => Value::Null,
            ValueType::TinyInt => {
                ensure_remaining(buf, size_of::<i8>())?;
                Value::TinyInt(buf.get_i8())
            }
            ValueType::SmallInt => {
                ensure_remaining(buf, size_of::<i16>())?;
                Value::SmallInt(buf.get_i16())
            }
            ValueType::Integer => {
                ensure_remaining(buf, size_of::<i32>())?;
                Value::Integer(buf.get_i32())
            }
            ValueType::BigInt => {
                ensure_remaining(buf, size_of::<i64>())?;
                Value::BigInt(buf.get_i64())
            }
            ValueType::Timestamp => {
                ensure_remaining(buf, size_of::<i64>())?;
                Value::Timestamp(buf.get_i64())
            }
            ValueType::Float => {
                ensure_remaining(buf, size_of::<f64>())?;
                Value::Float(buf.get_f64())
            }
            ValueType::String => match get_var_len(buf)? {
                Some(bytes) => Value::String(Some(String::from_utf8(bytes.into()).map_err(
                    |e| Error::InvalidValue {
                        reason: format!("String value is not utf8 encoded - {}", e),
                    },
                )?)),
                None => Value::String(None),
            },
            ValueType::VarBinary => Value::VarBinary(get_var_len(buf)?),
        })
    }

    fn payload_len(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::TinyInt(_) => size_of::<i8>(),
            Value::SmallInt(_) => size_of::<i16>(),
            Value::Integer(_) => size_of::<i32>(),
            Value::BigInt(_) | Value::Timestamp(_) | Value::Float(_) => size_of::<i64>(),
            Value::String(v) => size_of::<i32>() + v.as_ref().map_or(0, |s| s.len()),
            Value::VarBinary(v) => size_of::<i32>() + v.as_ref().map_or(0, |b| b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Some(v.to_string()))
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::VarBinary(Some(v))
    }
}

fn integer_or_null(is_null: bool, v: i64) -> NormalizedKey {
    if is_null {
        NormalizedKey::Null
    } else {
        NormalizedKey::Integer(v)
    }
}

fn parse_number<T: FromStr>(value_type: ValueType, literal: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    literal.trim().parse::<T>().map_err(|e| Error::InvalidValue {
        reason: format!("Unable to parse {} literal '{}' - {}", value_type, literal, e),
    })
}

fn put_var_len(buf: &mut BytesMut, v: Option<&[u8]>) {
    match v {
        Some(bytes) => {
            buf.put_i32(bytes.len() as i32);
            buf.put(bytes);
        }
        None => buf.put_i32(NULL_LENGTH),
    }
}

fn get_var_len<B: Buf>(buf: &mut B) -> Result<Option<Bytes>> {
    ensure_remaining(buf, size_of::<i32>())?;
    let len = buf.get_i32();
    if len == NULL_LENGTH {
        return Ok(None);
    }

    if len < 0 {
        return Err(Error::InvalidValue {
            reason: format!("Negative length {} is not a valid value length", len),
        });
    }

    ensure_remaining(buf, len as usize)?;
    Ok(Some(buf.copy_to_bytes(len as usize)))
}

fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(Error::InvalidValue {
            reason: format!(
                "buffer provided to deserialize a Value is too small. Expected at least {}, got {}",
                needed,
                buf.remaining()
            ),
        });
    }

    Ok(())
}
