mod model;
pub use model::{FieldBuilder, ModelBuilder};

mod table;

use super::{app, db, mapping, Schema};
use crate::{types::TypeConfiguration, Error, Result};
use model::FieldKind;

use heck::ToSnakeCase;
use indexmap::IndexMap;

/// Programmatic stand-in for annotation / XML metadata: describes entities
/// and embeddables and builds the immutable [`Schema`].
///
/// ```
/// use kiln_core::{schema::Schema, stmt::Type};
///
/// let schema = Schema::builder()
///     .entity("Person", |m| {
///         m.id("id", Type::I64);
///         m.basic("name", Type::String);
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(schema.table_for(schema.model_by_name("Person").unwrap()).name, "person");
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    models: Vec<ModelBuilder>,

    types: TypeConfiguration,

    /// If set, prefix all table names with this string
    table_name_prefix: Option<String>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_name_prefix(&mut self, prefix: &str) -> &mut Self {
        self.table_name_prefix = Some(prefix.to_string());
        self
    }

    pub fn types(&mut self, types: TypeConfiguration) -> &mut Self {
        self.types = types;
        self
    }

    /// Declares an entity: a model with its own table and identifier.
    pub fn entity(&mut self, name: &str, f: impl FnOnce(&mut ModelBuilder)) -> &mut Self {
        let mut model = ModelBuilder::new(name, true);
        f(&mut model);
        self.models.push(model);
        self
    }

    /// Declares an embeddable value type.
    pub fn embeddable(&mut self, name: &str, f: impl FnOnce(&mut ModelBuilder)) -> &mut Self {
        let mut model = ModelBuilder::new(name, false);
        f(&mut model);
        self.models.push(model);
        self
    }

    pub fn build(&self) -> Result<Schema> {
        let mut lookup = IndexMap::new();
        for (index, model) in self.models.iter().enumerate() {
            if lookup
                .insert(model.name.clone(), app::ModelId(index))
                .is_some()
            {
                return Err(Error::mapping(format!(
                    "duplicate model name `{}`",
                    model.name
                )));
            }
        }

        let app = self.build_app(&lookup)?;

        let mut schema = Schema {
            app,
            db: db::Schema::default(),
            mapping: mapping::Mapping::default(),
        };

        table::BuildTables::new(self, &mut schema).build()?;

        schema.verify()?;

        Ok(schema)
    }

    fn build_app(&self, lookup: &IndexMap<String, app::ModelId>) -> Result<app::Schema> {
        let mut app = app::Schema::default();

        for (index, model) in self.models.iter().enumerate() {
            let id = app::ModelId(index);

            let fields = model
                .fields
                .iter()
                .enumerate()
                .map(|(index, field)| {
                    self.build_field(lookup, app::FieldId { model: id, index }, model, field)
                })
                .collect::<Result<Vec<_>>>()?;

            let kind = if model.entity {
                let Some((index, generation)) = model.id else {
                    return Err(Error::mapping(format!(
                        "entity `{}` declares no identifier",
                        model.name
                    )));
                };

                app::ModelKind::Entity(app::EntityRoot {
                    identifier: app::Identifier {
                        field: app::FieldId { model: id, index },
                        generation,
                    },
                    version: model.version.map(|index| app::FieldId { model: id, index }),
                    batch_size: model.batch_size,
                    dynamic_insert: model.dynamic_insert,
                    dynamic_update: model.dynamic_update,
                })
            } else {
                app::ModelKind::Embeddable(app::EmbeddableInfo {
                    parent: model.parent.clone(),
                })
            };

            app.models.insert(
                id,
                app::Model {
                    id,
                    name: model.name.clone(),
                    fields,
                    kind,
                },
            );
        }

        Ok(app)
    }

    fn build_field(
        &self,
        lookup: &IndexMap<String, app::ModelId>,
        id: app::FieldId,
        model: &ModelBuilder,
        field: &FieldBuilder,
    ) -> Result<app::Field> {
        let resolve = |target: &str| {
            lookup.get(target).copied().ok_or_else(|| {
                Error::mapping(format!(
                    "`{}.{}` references unknown model `{target}`",
                    model.name, field.name
                ))
            })
        };

        let is_id = model.id.map(|(index, _)| index) == Some(id.index);

        let ty = match &field.kind {
            FieldKind::Basic(ty) => app::FieldTy::Basic(app::BasicField {
                ty: ty.clone(),
                precision: field.precision,
            }),
            FieldKind::Embedded(target) => app::FieldTy::Embedded(app::EmbeddedField {
                target: resolve(target)?,
                create_empty_composites: field.create_empty_composites,
            }),
            FieldKind::ToOne(target) => app::FieldTy::ToOne(app::ToOneField {
                target: resolve(target)?,
                fetch: field.fetch.unwrap_or(app::FetchMode::EAGER_JOIN),
                cascade: field.cascade,
            }),
            FieldKind::Collection { target, mapped_by } => {
                let target_id = resolve(target)?;
                let target_model = &self.models[target_id.0];
                let Some(index) = target_model
                    .fields
                    .iter()
                    .position(|field| field.name == *mapped_by)
                else {
                    return Err(Error::mapping(format!(
                        "`{}.{}` is mapped by unknown attribute `{target}.{mapped_by}`",
                        model.name, field.name
                    )));
                };

                app::FieldTy::Collection(app::CollectionField {
                    target: target_id,
                    mapped_by: app::FieldId {
                        model: target_id,
                        index,
                    },
                    semantics: field.semantics,
                    fetch: field.fetch.unwrap_or(app::FetchMode::LAZY),
                    cascade: field.cascade,
                })
            }
        };

        Ok(app::Field {
            id,
            name: field.name.clone(),
            ty,
            nullable: !is_id && field.nullable.unwrap_or(true),
            insertable: field.insertable,
            updatable: !is_id && field.updatable,
        })
    }

    fn table_name(&self, model: &ModelBuilder) -> String {
        let name = model
            .table
            .clone()
            .unwrap_or_else(|| model.name.to_snake_case());

        match &self.table_name_prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::Type;

    fn schema() -> Schema {
        Schema::builder()
            .entity("Parent", |m| {
                m.id("id", Type::I64);
                m.basic("displayName", Type::String);
                m.one_to_many("children", "Child", "parent");
            })
            .entity("Child", |m| {
                m.id_generated("id", Type::I64);
                m.many_to_one("parent", "Parent");
                m.embedded("address", "Address").column_prefix("home_");
            })
            .embeddable("Address", |m| {
                m.basic("street", Type::String);
                m.basic("city", Type::String).column("town");
            })
            .build()
            .unwrap()
    }

    #[test]
    fn default_names_are_snake_case() {
        let schema = schema();
        let parent = schema.model_by_name("Parent").unwrap();
        let table = schema.table_for(parent);
        assert_eq!(table.name, "parent");
        let names: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "display_name"]);
    }

    #[test]
    fn embedded_and_foreign_key_columns() {
        let schema = schema();
        let child = schema.model_by_name("Child").unwrap();
        let table = schema.table_for(child);
        let names: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "home_street", "home_town", "parent_id"]);
        assert!(table.columns[0].auto_increment);
        assert_eq!(table.columns[3].ty, Type::I64);
    }

    #[test]
    fn collection_keys_come_from_mapped_by() {
        let schema = schema();
        let parent = schema.model_by_name("Parent").unwrap();
        let children = parent.field_by_name("children").unwrap();
        let mapping::Field::Collection { table, key_columns } =
            schema.mapping_for(parent).field(children.id)
        else {
            panic!("expected collection mapping");
        };
        let child_table = schema.table(*table);
        assert_eq!(child_table.name, "child");
        assert_eq!(child_table.column(key_columns[0]).name, "parent_id");
    }

    #[test]
    fn unknown_target_is_a_mapping_error() {
        let err = Schema::builder()
            .entity("Person", |m| {
                m.id("id", Type::I64);
                m.many_to_one("employer", "Company");
            })
            .build()
            .unwrap_err();
        assert!(err.is_mapping());
    }

    #[test]
    fn entity_without_identifier_is_rejected() {
        let err = Schema::builder()
            .entity("Person", |m| {
                m.basic("name", Type::String);
            })
            .build()
            .unwrap_err();
        assert!(err.is_mapping());
    }
}
