use super::{Builder, ModelBuilder};
use crate::schema::{
    app::{self, FieldTy, IdGeneration, ModelId},
    db::{Column, ColumnId, Table, TableId},
    mapping, Schema,
};
use crate::{stmt, Error, Result};

use heck::ToSnakeCase;
use indexmap::IndexMap;

/// Embeddables nested deeper than this are assumed to be cyclic.
const MAX_EMBEDDING_DEPTH: usize = 16;

/// Used to track state while deriving tables and mappings from the app
/// schema.
pub(super) struct BuildTables<'a> {
    /// Build options
    builder: &'a Builder,

    schema: &'a mut Schema,

    /// Per-entity field mappings as they are built
    fields: IndexMap<ModelId, Vec<Option<mapping::Field>>>,
}

impl<'a> BuildTables<'a> {
    pub(super) fn new(builder: &'a Builder, schema: &'a mut Schema) -> Self {
        BuildTables {
            builder,
            schema,
            fields: IndexMap::new(),
        }
    }

    pub(super) fn build(mut self) -> Result<()> {
        let entities: Vec<ModelId> = self
            .schema
            .app
            .models()
            .filter(|model| model.is_entity())
            .map(|model| model.id)
            .collect();

        // Columns stored directly by each entity: basic and embedded
        // attributes, and the primary key.
        for &model_id in &entities {
            self.build_table(model_id)?;
        }

        // Foreign keys need the target's primary key columns.
        for &model_id in &entities {
            self.build_foreign_keys(model_id)?;
        }

        // Collections are keyed by the foreign key of their mapped-by
        // attribute.
        for &model_id in &entities {
            self.build_collections(model_id)?;
        }

        for (model_id, fields) in std::mem::take(&mut self.fields) {
            let fields = fields
                .into_iter()
                .map(|field| field.expect("every attribute is mapped"))
                .collect();

            let table = TableId(self.schema.mapping.models.len());
            self.schema.mapping.models.insert(
                model_id,
                mapping::Model {
                    id: model_id,
                    table,
                    fields,
                },
            );
        }

        Ok(())
    }

    fn model_builder(&self, id: ModelId) -> &'a ModelBuilder {
        &self.builder.models[id.0]
    }

    fn build_table(&mut self, model_id: ModelId) -> Result<()> {
        let table_id = TableId(self.schema.db.tables.len());
        let mut table = Table::new(table_id, self.builder.table_name(self.model_builder(model_id)));

        let model = self.schema.app.model(model_id).clone();
        let mut fields = vec![None; model.fields.len()];

        for field in &model.fields {
            let field_builder = &self.model_builder(model_id).fields[field.id.index];

            fields[field.id.index] = match &field.ty {
                FieldTy::Basic(basic) => {
                    let name = field_builder
                        .column
                        .clone()
                        .unwrap_or_else(|| field.name.to_snake_case());
                    Some(mapping::Field::Column(self.push_column(
                        &mut table,
                        name,
                        basic,
                        field.nullable,
                    )))
                }
                FieldTy::Embedded(embedded) => {
                    let prefix = field_builder.column_prefix.clone().unwrap_or_default();
                    Some(self.embed(&mut table, embedded.target, &prefix, field.nullable, 0)?)
                }
                FieldTy::ToOne(_) | FieldTy::Collection(_) => None,
            };
        }

        let identifier = model.expect_identifier();
        let primary_key = fields[identifier.field.index]
            .as_ref()
            .map(mapping::Field::columns)
            .unwrap_or_default();

        for column_id in &primary_key {
            let column = &mut table.columns[column_id.index];
            column.primary_key = true;
            column.nullable = false;
            column.auto_increment = identifier.generation == IdGeneration::Identity;
        }
        table.primary_key = primary_key;

        self.schema.db.tables.push(table);
        self.fields.insert(model_id, fields);
        Ok(())
    }

    fn push_column(
        &self,
        table: &mut Table,
        name: String,
        basic: &app::BasicField,
        nullable: bool,
    ) -> ColumnId {
        let id = ColumnId {
            table: table.id,
            index: table.columns.len(),
        };

        table.columns.push(Column {
            id,
            name,
            ty: basic.ty.clone(),
            jdbc_type: self.builder.types.jdbc_type(&basic.ty, basic.precision),
            nullable,
            primary_key: false,
            auto_increment: false,
        });

        id
    }

    fn embed(
        &self,
        table: &mut Table,
        target: ModelId,
        prefix: &str,
        nullable: bool,
        depth: usize,
    ) -> Result<mapping::Field> {
        let model = self.schema.app.model(target);

        if !model.is_embeddable() {
            return Err(Error::mapping(format!(
                "`{}` is embedded but is not an embeddable",
                model.name
            )));
        }

        if depth > MAX_EMBEDDING_DEPTH {
            return Err(Error::mapping(format!(
                "embeddable `{}` embeds itself",
                model.name
            )));
        }

        let mut fields = vec![];

        for field in &model.fields {
            let field_builder = &self.model_builder(target).fields[field.id.index];

            fields.push(match &field.ty {
                FieldTy::Basic(basic) => {
                    let name = field_builder
                        .column
                        .clone()
                        .unwrap_or_else(|| field.name.to_snake_case());
                    mapping::Field::Column(self.push_column(
                        table,
                        format!("{prefix}{name}"),
                        basic,
                        nullable || field.nullable,
                    ))
                }
                FieldTy::Embedded(embedded) => {
                    let nested = field_builder.column_prefix.as_deref().unwrap_or_default();
                    self.embed(
                        table,
                        embedded.target,
                        &format!("{prefix}{nested}"),
                        nullable || field.nullable,
                        depth + 1,
                    )?
                }
                FieldTy::ToOne(_) | FieldTy::Collection(_) => {
                    return Err(Error::mapping(format!(
                        "embeddable `{}` cannot declare association `{}`",
                        model.name, field.name
                    )))
                }
            });
        }

        Ok(mapping::Field::Embedded(fields))
    }

    fn build_foreign_keys(&mut self, model_id: ModelId) -> Result<()> {
        let model = self.schema.app.model(model_id).clone();
        let table_id = self.table_id(model_id);

        for field in &model.fields {
            let FieldTy::ToOne(to_one) = &field.ty else {
                continue;
            };

            let target = self.schema.app.model(to_one.target);
            if !target.is_entity() {
                return Err(Error::mapping(format!(
                    "`{}.{}` targets `{}`, which is not an entity",
                    model.name, field.name, target.name
                )));
            }

            let target_columns: Vec<Column> = self
                .schema
                .db
                .table(self.table_id(to_one.target))
                .primary_key_columns()
                .cloned()
                .collect();

            let field_builder = &self.model_builder(model_id).fields[field.id.index];
            let table = &mut self.schema.db.tables[table_id.0];
            let mut columns = vec![];

            for target_column in &target_columns {
                let name = match &field_builder.column {
                    Some(name) if target_columns.len() == 1 => name.clone(),
                    _ => format!("{}_{}", field.name.to_snake_case(), target_column.name),
                };

                let id = ColumnId {
                    table: table_id,
                    index: table.columns.len(),
                };

                table.columns.push(Column {
                    id,
                    name,
                    ty: target_column.ty.clone(),
                    jdbc_type: target_column.jdbc_type,
                    nullable: field.nullable,
                    primary_key: false,
                    auto_increment: false,
                });

                columns.push(id);
            }

            self.fields[&model_id][field.id.index] = Some(mapping::Field::ToOne(columns));
        }

        Ok(())
    }

    fn build_collections(&mut self, model_id: ModelId) -> Result<()> {
        let model = self.schema.app.model(model_id).clone();

        for field in &model.fields {
            let FieldTy::Collection(collection) = &field.ty else {
                continue;
            };

            let mapped_by = self.schema.app.field(collection.mapped_by);
            match &mapped_by.ty {
                FieldTy::ToOne(to_one) if to_one.target == model_id => {}
                _ => {
                    return Err(Error::mapping(format!(
                        "`{}.{}` is mapped by `{}`, which is not a to-one association to `{}`",
                        model.name, field.name, mapped_by.name, model.name
                    )))
                }
            }

            let key_columns = match &self.fields[&collection.target][collection.mapped_by.index] {
                Some(mapping::Field::ToOne(columns)) => columns.clone(),
                _ => {
                    return Err(Error::mapping(format!(
                        "`{}.{}` has no foreign key columns",
                        model.name, field.name
                    )))
                }
            };

            self.fields[&model_id][field.id.index] = Some(mapping::Field::Collection {
                table: self.table_id(collection.target),
                key_columns,
            });
        }

        Ok(())
    }

    /// Tables are created in entity order, so the table index is the entity's
    /// position in `fields`.
    fn table_id(&self, model_id: ModelId) -> TableId {
        let index = self
            .fields
            .get_index_of(&model_id)
            .expect("table built for entity");
        TableId(index)
    }
}

impl stmt::Type {
    /// Whether the type can back a database-generated identifier.
    pub(crate) fn is_identity_compatible(&self) -> bool {
        matches!(self, stmt::Type::I32 | stmt::Type::I64)
    }
}
