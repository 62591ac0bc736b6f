use std::fmt;

/// The column-level type a value is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JdbcType {
    Boolean,
    Integer,
    BigInt,
    Double,
    Varchar,
    VarBinary,
    Uuid,
    Date,

    /// Timestamp with `precision` fractional-second digits (0..=9).
    Timestamp { precision: u8 },

    /// A native array parameter, e.g. for `= ANY(?)` restrictions.
    Array,
}

impl JdbcType {
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Timestamp { .. })
    }
}

impl fmt::Display for JdbcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("BOOLEAN"),
            Self::Integer => f.write_str("INTEGER"),
            Self::BigInt => f.write_str("BIGINT"),
            Self::Double => f.write_str("DOUBLE"),
            Self::Varchar => f.write_str("VARCHAR"),
            Self::VarBinary => f.write_str("VARBINARY"),
            Self::Uuid => f.write_str("UUID"),
            Self::Date => f.write_str("DATE"),
            Self::Timestamp { precision } => write!(f, "TIMESTAMP({precision})"),
            Self::Array => f.write_str("ARRAY"),
        }
    }
}
