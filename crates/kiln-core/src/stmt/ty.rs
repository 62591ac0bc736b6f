use super::Value;
use crate::{Error, Result};

use chrono::{NaiveDate, NaiveDateTime};

/// An expression type.
///
/// `Type` describes values as the domain model sees them. How a value is
/// stored in a column is described by [`JdbcType`](crate::types::JdbcType).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Boolean value
    Bool,

    /// Signed 32-bit integer
    I32,

    /// Signed 64-bit integer
    I64,

    /// Double precision float
    F64,

    /// String type
    String,

    /// Byte array
    Bytes,

    /// UUID
    Uuid,

    /// Civil date
    Date,

    /// Civil date and time
    Timestamp,

    /// A fixed-length tuple where each item can have a different type.
    Record(Vec<Type>),

    /// A list of a single type
    List(Box<Type>),

    /// The null type can be cast to any type.
    Null,

    /// A type that has not been inferred yet (e.g. an unused parameter)
    Unknown,
}

impl Type {
    pub fn list(ty: impl Into<Self>) -> Self {
        Self::List(Box::new(ty.into()))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F64)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown | Self::Null)
    }

    /// Number of leaf values (columns) a value of this type spans.
    pub fn width(&self) -> usize {
        match self {
            Self::Record(fields) => fields.iter().map(Type::width).sum(),
            _ => 1,
        }
    }

    /// Casts a value to this type.
    ///
    /// Only lossless conversions are performed; anything else is a type
    /// conversion error.
    pub fn cast(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(value);
        }

        Ok(match (value, self) {
            (value @ Value::Bool(_), Type::Bool) => value,
            (Value::I32(v), Type::I32) => Value::I32(v),
            (Value::I64(v), Type::I32) => match i32::try_from(v) {
                Ok(v) => Value::I32(v),
                Err(_) => return Err(Error::type_conversion(Value::I64(v), "I32")),
            },
            (Value::I32(v), Type::I64) => Value::I64(v as i64),
            (Value::I64(v), Type::I64) => Value::I64(v),
            (Value::I32(v), Type::F64) => Value::F64(v as f64),
            (Value::I64(v), Type::F64) => Value::F64(v as f64),
            (value @ Value::F64(_), Type::F64) => value,
            (value @ Value::String(_), Type::String) => value,
            (value @ Value::Bytes(_), Type::Bytes) => value,
            (value @ Value::Uuid(_), Type::Uuid) => value,
            (Value::String(v), Type::Uuid) => Value::Uuid(v.parse()?),
            (value @ Value::Date(_), Type::Date) => value,
            (Value::String(v), Type::Date) => {
                Value::Date(NaiveDate::parse_from_str(&v, "%Y-%m-%d")?)
            }
            (Value::Timestamp(v), Type::Date) => Value::Date(v.date()),
            (value @ Value::Timestamp(_), Type::Timestamp) => value,
            (Value::Date(v), Type::Timestamp) => Value::Timestamp(v.and_hms_opt(0, 0, 0).unwrap_or_default()),
            (Value::String(v), Type::Timestamp) => Value::Timestamp(parse_timestamp(&v)?),
            (Value::Record(record), Type::Record(tys)) if record.len() == tys.len() => {
                let fields = record
                    .into_iter()
                    .zip(tys)
                    .map(|(value, ty)| ty.cast(value))
                    .collect::<Result<Vec<_>>>()?;
                Value::record_from_vec(fields)
            }
            (Value::List(items), Type::List(ty)) => Value::List(
                items
                    .into_iter()
                    .map(|item| ty.cast(item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            (value, Type::Unknown) => value,
            (value, ty) => return Err(Error::type_conversion(value, format!("{ty:?}"))),
        })
    }
}

pub(crate) fn parse_timestamp(src: &str) -> Result<NaiveDateTime> {
    const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    let mut last = None;
    for format in FORMATS {
        match NaiveDateTime::parse_from_str(src, format) {
            Ok(ts) => return Ok(ts),
            Err(err) => last = Some(err),
        }
    }

    match last {
        Some(err) => Err(err.into()),
        None => Err(Error::type_conversion(Value::from(src), "Timestamp")),
    }
}
