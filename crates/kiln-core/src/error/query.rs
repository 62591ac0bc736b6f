use super::Error;

/// Error compiling or translating a query.
#[derive(Debug)]
pub(super) struct QueryError {
    kind: QueryErrorKind,
    message: Box<str>,
    query: Option<Box<str>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryErrorKind {
    /// The query text does not follow the grammar.
    Syntax { position: usize },

    /// The query is well formed but does not make sense against the model.
    Semantic,
}

impl std::error::Error for QueryError {}

impl core::fmt::Display for QueryError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.kind {
            QueryErrorKind::Syntax { position } => {
                write!(f, "syntax error at position {position}: {}", self.message)?
            }
            QueryErrorKind::Semantic => write!(f, "{}", self.message)?,
        }
        if let Some(ref query) = self.query {
            write!(f, " [{query}]")?;
        }
        Ok(())
    }
}

/// Error in the mapping model itself, e.g. a dangling association target.
#[derive(Debug)]
pub(super) struct MappingError {
    message: Box<str>,
}

impl std::error::Error for MappingError {}

impl core::fmt::Display for MappingError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "mapping error: {}", self.message)
    }
}

impl Error {
    /// Creates a syntax error for the given query text.
    pub fn query_syntax(
        query: impl Into<String>,
        position: usize,
        message: impl Into<String>,
    ) -> Error {
        Error::from(super::ErrorKind::Query(QueryError {
            kind: QueryErrorKind::Syntax { position },
            message: message.into().into(),
            query: Some(query.into().into()),
        }))
    }

    /// Creates a semantic error, e.g. an unresolvable path.
    pub fn semantic(query: Option<&str>, message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Query(QueryError {
            kind: QueryErrorKind::Semantic,
            message: message.into().into(),
            query: query.map(Into::into),
        }))
    }

    /// Creates a mapping error.
    pub fn mapping(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Mapping(MappingError {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a query syntax error.
    pub fn is_query_syntax(&self) -> bool {
        self.any(|kind| {
            matches!(
                kind,
                super::ErrorKind::Query(QueryError {
                    kind: QueryErrorKind::Syntax { .. },
                    ..
                })
            )
        })
    }

    /// Returns `true` if this error is a semantic query error.
    pub fn is_semantic(&self) -> bool {
        self.any(|kind| {
            matches!(
                kind,
                super::ErrorKind::Query(QueryError {
                    kind: QueryErrorKind::Semantic,
                    ..
                })
            )
        })
    }

    /// Returns `true` if this error is a mapping error.
    pub fn is_mapping(&self) -> bool {
        self.any(|kind| matches!(kind, super::ErrorKind::Mapping(_)))
    }
}
