use super::{JdbcMapping, JdbcType};
use crate::stmt::{Type, Value};

/// Resolves domain types to their default JDBC mappings.
///
/// Constructed once per session factory and passed by reference to the
/// translator and the execution layer.
#[derive(Debug, Clone)]
pub struct TypeConfiguration {
    /// Fractional-second digits used for timestamps without an explicit
    /// column precision.
    pub default_timestamp_precision: u8,
}

impl Default for TypeConfiguration {
    fn default() -> Self {
        TypeConfiguration {
            default_timestamp_precision: 6,
        }
    }
}

impl TypeConfiguration {
    pub fn jdbc_type(&self, ty: &Type, precision: Option<u8>) -> JdbcType {
        match ty {
            Type::Bool => JdbcType::Boolean,
            Type::I32 => JdbcType::Integer,
            Type::I64 => JdbcType::BigInt,
            Type::F64 => JdbcType::Double,
            Type::Bytes => JdbcType::VarBinary,
            Type::Uuid => JdbcType::Uuid,
            Type::Date => JdbcType::Date,
            Type::Timestamp => JdbcType::Timestamp {
                precision: precision.unwrap_or(self.default_timestamp_precision),
            },
            Type::List(_) => JdbcType::Array,
            Type::String | Type::Record(_) | Type::Null | Type::Unknown => JdbcType::Varchar,
        }
    }

    pub fn resolve(&self, ty: &Type, precision: Option<u8>) -> JdbcMapping {
        JdbcMapping::new(ty.clone(), self.jdbc_type(ty, precision))
    }

    /// Mapping for a value whose context gave no type, e.g. a parameter that
    /// only appears in a projection.
    pub fn resolve_value(&self, value: &Value) -> JdbcMapping {
        let ty = match value.infer_ty() {
            Type::Null => Type::Unknown,
            ty => ty,
        };
        self.resolve(&ty, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timestamp_precision() {
        let config = TypeConfiguration::default();
        assert_eq!(
            config.jdbc_type(&Type::Timestamp, None),
            JdbcType::Timestamp { precision: 6 }
        );
        assert_eq!(
            config.jdbc_type(&Type::Timestamp, Some(3)),
            JdbcType::Timestamp { precision: 3 }
        );
    }
}
