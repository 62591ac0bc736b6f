//! The type system: how domain value types are stored in and read back
//! from JDBC columns.

mod jdbc_mapping;
pub use jdbc_mapping::JdbcMapping;

mod jdbc_type;
pub use jdbc_type::JdbcType;

mod type_configuration;
pub use type_configuration::TypeConfiguration;
