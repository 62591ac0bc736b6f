use super::Field;
use crate::schema::{
    app::{FieldId, ModelId},
    db::TableId,
};

#[derive(Debug, Clone)]
pub struct Model {
    /// Entity this mapping is for
    pub id: ModelId,

    /// Table the entity is stored in
    pub table: TableId,

    /// Per-attribute mappings, indexed like the entity's fields.
    pub fields: Vec<Field>,
}

impl Model {
    pub fn field(&self, id: FieldId) -> &Field {
        assert_eq!(self.id, id.model);
        &self.fields[id.index]
    }
}
