use super::Error;

/// Normalized classification of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlErrorKind {
    /// Unique, foreign key, not-null or check constraint violated.
    ConstraintViolation,

    /// A lock could not be acquired (busy / deadlock).
    LockAcquisition,

    /// The statement was cancelled because it exceeded its timeout.
    QueryTimeout,

    /// The SQL text was rejected by the database.
    Syntax,

    /// A value could not be stored or read (overflow, bad encoding).
    Data,

    /// Anything else.
    Generic,
}

/// An error reported by a database driver while executing SQL.
///
/// Drivers construct this with the vendor message; the engine attaches the
/// SQL string before surfacing it.
#[derive(Debug, Clone)]
pub struct SqlError {
    kind: SqlErrorKind,
    code: Option<i32>,
    message: Box<str>,
    sql: Option<Box<str>>,
}

impl SqlError {
    pub fn new(kind: SqlErrorKind, message: impl Into<String>) -> SqlError {
        SqlError {
            kind,
            code: None,
            message: message.into().into(),
            sql: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> SqlError {
        self.code = Some(code);
        self
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> SqlError {
        self.sql = Some(sql.into().into());
        self
    }

    pub fn kind(&self) -> SqlErrorKind {
        self.kind
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }
}

impl std::error::Error for SqlError {}

impl core::fmt::Display for SqlError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let kind = match self.kind {
            SqlErrorKind::ConstraintViolation => "constraint violation",
            SqlErrorKind::LockAcquisition => "could not acquire lock",
            SqlErrorKind::QueryTimeout => "query timed out",
            SqlErrorKind::Syntax => "SQL grammar error",
            SqlErrorKind::Data => "data exception",
            SqlErrorKind::Generic => "could not execute statement",
        };
        write!(f, "{kind}: {}", self.message)?;
        if let Some(ref sql) = self.sql {
            write!(f, " [{sql}]")?;
        }
        Ok(())
    }
}

impl Error {
    /// Creates an error from a driver SQL error.
    pub fn sql(err: SqlError) -> Error {
        Error::from(super::ErrorKind::Sql(err))
    }

    /// Returns `true` if this error came from executing SQL.
    pub fn is_sql(&self) -> bool {
        self.any(|kind| matches!(kind, super::ErrorKind::Sql(_)))
    }

    /// Returns the driver error, if this error came from executing SQL.
    pub fn sql_error(&self) -> Option<&SqlError> {
        self.chain().find_map(|err| match err.kind() {
            super::ErrorKind::Sql(err) => Some(err),
            _ => None,
        })
    }

    /// Returns `true` if the statement exceeded its timeout.
    pub fn is_query_timeout(&self) -> bool {
        self.sql_error()
            .is_some_and(|err| err.kind() == SqlErrorKind::QueryTimeout)
    }

    /// Returns `true` if the statement violated a constraint.
    pub fn is_constraint_violation(&self) -> bool {
        self.sql_error()
            .is_some_and(|err| err.kind() == SqlErrorKind::ConstraintViolation)
    }
}
