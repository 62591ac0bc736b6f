pub mod app;

mod builder;
pub use builder::{Builder, FieldBuilder, ModelBuilder};

pub mod db;

pub mod mapping;
use mapping::Mapping;

mod verify;

use app::{FieldId, ModelId};
use db::{Column, ColumnId, Table, TableId};

/// The immutable domain mapping model: entities and embeddables, the tables
/// they are stored in, and how one maps to the other.
///
/// Built once at boot and shared read-only by every session.
#[derive(Debug)]
pub struct Schema {
    /// Application-level schema
    pub app: app::Schema,

    /// Database-level schema
    pub db: db::Schema,

    /// Maps the app-level schema to the db-level schema
    pub mapping: Mapping,
}

impl Schema {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn model(&self, id: impl Into<ModelId>) -> &app::Model {
        self.app.model(id)
    }

    pub fn model_by_name(&self, name: &str) -> Option<&app::Model> {
        self.app.model_by_name(name)
    }

    pub fn field(&self, id: FieldId) -> &app::Field {
        self.app.field(id)
    }

    pub fn mapping_for(&self, id: impl Into<ModelId>) -> &mapping::Model {
        self.mapping.model(id)
    }

    pub fn table_for(&self, id: impl Into<ModelId>) -> &Table {
        self.db.table(self.table_id_for(id))
    }

    #[track_caller]
    pub fn table_id_for(&self, id: impl Into<ModelId>) -> TableId {
        self.mapping.model(id).table
    }

    pub fn table(&self, id: TableId) -> &Table {
        self.db.table(id)
    }

    pub fn column(&self, id: ColumnId) -> &Column {
        self.db.column(id)
    }

    /// Columns storing the identifier of an entity, in identifier order.
    pub fn id_columns(&self, model: impl Into<ModelId>) -> Vec<ColumnId> {
        let model = self.model(model);
        let id_field = model.expect_identifier().field;
        self.mapping_for(model.id).field(id_field).columns()
    }

    /// Columns an attribute is stored in. Collections have no columns in the
    /// owner's table.
    pub fn field_columns(&self, field: FieldId) -> Vec<ColumnId> {
        self.mapping_for(field.model).field(field).columns()
    }
}
