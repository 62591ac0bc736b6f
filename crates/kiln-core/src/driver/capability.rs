#[derive(Debug)]
pub struct Capability {
    /// SQL dialect the database speaks.
    pub dialect: Dialect,

    /// Supports binding a whole list as one array parameter, enabling
    /// `col = ANY(?)` key restrictions.
    pub array_params: bool,

    /// When a batch-load restriction has unfilled slots, pad them with NULL
    /// instead of repeating the last key.
    pub pad_batch_with_null: bool,

    /// SQL: Supports row-level locking.
    pub select_for_update: bool,

    /// SQL: Supports `NULLS FIRST` / `NULLS LAST` in `ORDER BY`.
    pub null_precedence: bool,
}

/// SQL-syntax specifics consulted while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    Postgresql,
    Mysql,
}

impl Capability {
    /// SQLite capabilities.
    pub const SQLITE: Self = Self {
        dialect: Dialect::Sqlite,
        array_params: false,
        pad_batch_with_null: false,
        select_for_update: false,
        null_precedence: true,
    };

    /// PostgreSQL capabilities
    pub const POSTGRESQL: Self = Self {
        dialect: Dialect::Postgresql,
        array_params: true,
        select_for_update: true,
        ..Self::SQLITE
    };

    /// MySQL capabilities
    pub const MYSQL: Self = Self {
        dialect: Dialect::Mysql,
        select_for_update: true,
        null_precedence: false,
        ..Self::SQLITE
    };
}

impl Dialect {
    /// Character used to quote identifiers.
    pub fn quote_char(self) -> char {
        match self {
            Dialect::Mysql => '`',
            Dialect::Sqlite | Dialect::Postgresql => '"',
        }
    }
}
