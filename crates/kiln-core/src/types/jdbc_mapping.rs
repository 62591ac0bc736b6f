use super::JdbcType;
use crate::stmt::{Type, Value};
use crate::{Error, Result};

use chrono::{NaiveDateTime, Timelike};

/// Pairs a domain type with the JDBC type it is stored as.
///
/// Supplies the binder (`bind`), the extractor (`extract`) and the
/// mutability / equality semantics dirty checking relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JdbcMapping {
    pub ty: Type,
    pub jdbc_type: JdbcType,
}

impl JdbcMapping {
    pub fn new(ty: Type, jdbc_type: JdbcType) -> JdbcMapping {
        JdbcMapping { ty, jdbc_type }
    }

    /// Converts a domain value into the value handed to the driver.
    ///
    /// Timestamps are truncated to the column precision, integers are widened
    /// to the column width. Nulls pass through.
    pub fn bind(&self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        // Untyped parameters bind as-is
        if self.ty.is_unknown() {
            return Ok(value.clone());
        }

        Ok(match (self.jdbc_type, value) {
            (JdbcType::Boolean, Value::Bool(_)) => value.clone(),
            (JdbcType::Integer, Value::I32(_)) => value.clone(),
            (JdbcType::Integer, Value::I64(v)) => match i32::try_from(*v) {
                Ok(v) => Value::I32(v),
                Err(_) => return Err(Error::type_conversion(value.clone(), "INTEGER")),
            },
            (JdbcType::BigInt, value) if value.as_i64().is_some() => {
                Value::I64(value.to_i64()?)
            }
            (JdbcType::Double, Value::F64(_)) => value.clone(),
            (JdbcType::Double, value) if value.as_i64().is_some() => {
                Value::F64(value.to_i64()? as f64)
            }
            (JdbcType::Varchar, Value::String(_)) => value.clone(),
            (JdbcType::VarBinary, Value::Bytes(_)) => value.clone(),
            (JdbcType::Uuid, Value::Uuid(_)) => value.clone(),
            (JdbcType::Uuid, Value::String(_)) => Type::Uuid.cast(value.clone())?,
            (JdbcType::Date, Value::Date(_)) => value.clone(),
            (JdbcType::Date, Value::Timestamp(ts)) => Value::Date(ts.date()),
            (JdbcType::Date, Value::String(_)) => Type::Date.cast(value.clone())?,
            (JdbcType::Timestamp { precision }, Value::Timestamp(ts)) => {
                Value::Timestamp(truncate(*ts, precision))
            }
            (JdbcType::Timestamp { precision }, Value::Date(_) | Value::String(_)) => {
                match Type::Timestamp.cast(value.clone())? {
                    Value::Timestamp(ts) => Value::Timestamp(truncate(ts, precision)),
                    other => other,
                }
            }
            (JdbcType::Array, Value::List(items)) => {
                let item = JdbcMapping::new(element_ty(&self.ty), element_jdbc_type(&self.ty));
                Value::List(
                    items
                        .iter()
                        .map(|value| item.bind(value))
                        .collect::<Result<_>>()?,
                )
            }
            (jdbc_type, value) => {
                return Err(Error::type_conversion(value.clone(), jdbc_type.to_string()))
            }
        })
    }

    /// Converts a raw column value read from the driver into the domain type.
    ///
    /// Drivers report values in their storage class (SQLite: integer, real,
    /// text, blob), so booleans arrive as integers and temporals as text.
    pub fn extract(&self, raw: Value) -> Result<Value> {
        if raw.is_null() {
            return Ok(Value::Null);
        }

        match (&self.ty, raw) {
            (Type::Bool, Value::I32(v)) => Ok(Value::Bool(v != 0)),
            (Type::Bool, Value::I64(v)) => Ok(Value::Bool(v != 0)),
            (Type::Uuid, Value::Bytes(bytes)) => match uuid::Uuid::from_slice(&bytes) {
                Ok(uuid) => Ok(Value::Uuid(uuid)),
                Err(_) => Err(Error::type_conversion(Value::Bytes(bytes), "Uuid")),
            },
            (Type::Timestamp, raw) => match Type::Timestamp.cast(raw)? {
                Value::Timestamp(ts) => Ok(Value::Timestamp(truncate(ts, self.precision()))),
                other => Ok(other),
            },
            (ty, raw) => ty.cast(raw),
        }
    }

    /// Whether values of this type can be mutated in place after loading,
    /// in which case dirty checking needs a deep copy for its snapshot.
    pub fn is_mutable(&self) -> bool {
        matches!(self.ty, Type::Bytes | Type::List(_))
    }

    pub fn are_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Timestamp(a), Value::Timestamp(b)) => {
                truncate(*a, self.precision()) == truncate(*b, self.precision())
            }
            _ => a == b,
        }
    }

    pub fn deep_copy(&self, value: &Value) -> Value {
        value.clone()
    }

    fn precision(&self) -> u8 {
        match self.jdbc_type {
            JdbcType::Timestamp { precision } => precision,
            _ => 9,
        }
    }
}

fn element_ty(ty: &Type) -> Type {
    match ty {
        Type::List(item) => (**item).clone(),
        ty => ty.clone(),
    }
}

fn element_jdbc_type(ty: &Type) -> JdbcType {
    match element_ty(ty) {
        Type::Bool => JdbcType::Boolean,
        Type::I32 => JdbcType::Integer,
        Type::I64 => JdbcType::BigInt,
        Type::F64 => JdbcType::Double,
        Type::Bytes => JdbcType::VarBinary,
        Type::Uuid => JdbcType::Uuid,
        Type::Date => JdbcType::Date,
        Type::Timestamp => JdbcType::Timestamp { precision: 9 },
        _ => JdbcType::Varchar,
    }
}

/// Drops fractional-second digits beyond `precision`.
fn truncate(ts: NaiveDateTime, precision: u8) -> NaiveDateTime {
    if precision >= 9 {
        return ts;
    }

    let unit = 10u32.pow(9 - precision as u32);
    let nanos = ts.nanosecond() / unit * unit;
    ts.with_nanosecond(nanos).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(nanos: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_nano_opt(13, 14, 15, nanos)
            .unwrap()
    }

    #[test]
    fn timestamp_round_trip_truncates_to_precision() {
        let mapping = JdbcMapping::new(Type::Timestamp, JdbcType::Timestamp { precision: 3 });
        let bound = mapping.bind(&Value::Timestamp(ts(123_456_789))).unwrap();
        assert_eq!(bound, Value::Timestamp(ts(123_000_000)));

        // SQLite hands timestamps back as text.
        let raw = Value::String("2024-02-29 13:14:15.123".into());
        assert_eq!(mapping.extract(raw).unwrap(), bound);
    }

    #[test]
    fn scalar_round_trips() {
        let cases = [
            (Type::Bool, JdbcType::Boolean, Value::Bool(true), Value::I64(1)),
            (Type::I32, JdbcType::Integer, Value::I32(-7), Value::I64(-7)),
            (Type::I64, JdbcType::BigInt, Value::I64(1 << 40), Value::I64(1 << 40)),
            (
                Type::String,
                JdbcType::Varchar,
                Value::from("hello"),
                Value::from("hello"),
            ),
        ];

        for (ty, jdbc_type, value, raw) in cases {
            let mapping = JdbcMapping::new(ty, jdbc_type);
            assert!(mapping.bind(&value).is_ok());
            assert_eq!(mapping.extract(raw).unwrap(), value);
        }
    }

    #[test]
    fn uuid_from_text() {
        let id = uuid::Uuid::new_v4();
        let mapping = JdbcMapping::new(Type::Uuid, JdbcType::Uuid);
        assert_eq!(
            mapping.extract(Value::String(id.to_string())).unwrap(),
            Value::Uuid(id)
        );
    }

    #[test]
    fn integer_overflow_fails_to_bind() {
        let mapping = JdbcMapping::new(Type::I32, JdbcType::Integer);
        let err = mapping.bind(&Value::I64(i64::MAX)).unwrap_err();
        assert!(err.is_type_conversion());
    }

    #[test]
    fn equality_respects_precision() {
        let mapping = JdbcMapping::new(Type::Timestamp, JdbcType::Timestamp { precision: 0 });
        assert!(mapping.are_equal(
            &Value::Timestamp(ts(1)),
            &Value::Timestamp(ts(999_999_999))
        ));
    }
}
