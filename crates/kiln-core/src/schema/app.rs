mod fetch;
pub use fetch::{Cascade, FetchMode, FetchStyle, FetchTiming};

mod field;
pub use field::{
    BasicField, CollectionField, CollectionSemantics, EmbeddedField, Field, FieldId, FieldTy,
    ToOneField,
};

mod model;
pub use model::{EmbeddableInfo, EntityRoot, IdGeneration, Identifier, Model, ModelId, ModelKind};

mod schema;
pub use schema::Schema;
