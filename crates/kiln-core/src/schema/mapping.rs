mod field;
pub use field::Field;

mod model;
pub use model::Model;

use super::app::ModelId;
use indexmap::IndexMap;

/// Defines the correspondence between entities and tables.
///
/// Embeddables have no entry of their own: their columns depend on where
/// they are embedded, so they are mapped inline by [`Field::Embedded`].
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    /// Per-entity mappings indexed by model identifier.
    pub models: IndexMap<ModelId, Model>,
}

impl Mapping {
    /// Returns the mapping for the specified entity.
    ///
    /// # Panics
    ///
    /// Panics if the model ID does not exist in the mapping.
    pub fn model(&self, id: impl Into<ModelId>) -> &Model {
        self.models.get(&id.into()).expect("invalid model ID")
    }
}
