use super::Type;

impl Type {
    /// Rank used when two inference contexts disagree on a type.
    ///
    /// Temporal types rank highest: a parameter compared with a timestamp
    /// column must be bound with timestamp precision even if another
    /// occurrence looked like a plain string. Numeric types widen.
    pub fn precedence(&self) -> u8 {
        match self {
            Type::Unknown => 0,
            Type::Null => 1,
            Type::Bool => 2,
            Type::Bytes => 3,
            Type::String => 4,
            Type::Uuid => 5,
            Type::I32 => 6,
            Type::I64 => 7,
            Type::F64 => 8,
            Type::Date => 9,
            Type::Timestamp => 10,
            Type::List(item) => item.precedence(),
            Type::Record(_) => 11,
        }
    }

    /// Unifies two inferred types, picking the highest precedence type.
    ///
    /// Records unify field by field when their arity matches.
    pub fn unify(&self, other: &Type) -> Type {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (Type::Unknown | Type::Null, b) => b.clone(),
            (a, Type::Unknown | Type::Null) => a.clone(),
            (Type::Record(a), Type::Record(b)) if a.len() == b.len() => {
                Type::Record(a.iter().zip(b).map(|(a, b)| a.unify(b)).collect())
            }
            (Type::List(a), Type::List(b)) => Type::list(a.unify(b)),
            (Type::List(a), b) | (b, Type::List(a)) => Type::list(a.unify(b)),
            (a, b) => {
                if b.precedence() > a.precedence() {
                    b.clone()
                } else {
                    a.clone()
                }
            }
        }
    }
}
