use std::fmt;

/// Identifies a positional JDBC parameter within one translated statement.
///
/// Ids are assigned in the order parameters appear in the rendered SQL, so
/// the id doubles as the zero-based bind position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JdbcParameterId(pub usize);

impl JdbcParameterId {
    /// One-based position as used by `?N` / `$N` placeholders.
    pub fn position(self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for JdbcParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.position())
    }
}
