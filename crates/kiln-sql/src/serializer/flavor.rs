use super::Serializer;

use kiln_core::{driver::Capability, schema::db};

impl<'a> Serializer<'a> {
    pub fn sqlite(schema: &'a db::Schema) -> Serializer<'a> {
        Serializer::new(schema, &Capability::SQLITE)
    }

    pub fn postgresql(schema: &'a db::Schema) -> Serializer<'a> {
        Serializer::new(schema, &Capability::POSTGRESQL)
    }

    pub fn mysql(schema: &'a db::Schema) -> Serializer<'a> {
        Serializer::new(schema, &Capability::MYSQL)
    }
}
