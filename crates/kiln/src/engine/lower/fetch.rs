use super::{
    AttrResult, BasicResult, CollectionResult, CompositeAttr, CompositeResult, EntityResult, Lower,
    ToOneResult,
};
use crate::engine::sqm::{FromId, SqmFromKind, SqmJoin};

use kiln_core::{
    schema::{
        app::{CollectionSemantics, FieldId, FieldTy, ModelId},
        db::ColumnId,
    },
    stmt::{self, JoinKind},
    Result,
};

/// An entity's table alias and the associations joined from it whose
/// targets are read from the same row.
#[derive(Debug)]
pub(super) struct FetchTree {
    pub(super) alias: String,
    pub(super) model: ModelId,
    pub(super) joined: Vec<(FieldId, FetchTree)>,
}

impl FetchTree {
    fn child(&self, field: FieldId) -> Option<&FetchTree> {
        self.joined
            .iter()
            .find(|(id, _)| *id == field)
            .map(|(_, tree)| tree)
    }
}

impl Lower<'_> {
    /// The fetch joins a query declares beneath `from`.
    pub(super) fn query_fetch_tree(&mut self, from: FromId) -> FetchTree {
        let sqm = self.sqm();
        let mut joined = vec![];

        for &id in &sqm.from(from).joins {
            if let SqmFromKind::Join(SqmJoin {
                fetch: true, field, ..
            }) = &sqm.from(id).kind
            {
                self.consumed.insert(id);
                joined.push((*field, self.query_fetch_tree(id)));
            }
        }

        FetchTree {
            alias: self.alias_of(from).to_string(),
            model: sqm.from(from).model,
            joined,
        }
    }

    /// Joins the associations the mapping fetches eagerly by join, up to the
    /// maximum fetch depth and never revisiting an entity on the path.
    pub(super) fn mapping_fetch_tree(
        &mut self,
        model: ModelId,
        alias: String,
        joins: &mut Vec<stmt::Join>,
        path: &mut Vec<ModelId>,
    ) -> Result<FetchTree> {
        let schema = self.cx.schema;
        let mut joined = vec![];

        if path.len() <= self.cx.max_fetch_depth {
            for field in &schema.model(model).fields {
                let (Some(fetch), Some(target)) = (field.fetch(), field.target()) else {
                    continue;
                };

                if !fetch.is_join() || path.contains(&target) {
                    continue;
                }

                let kind = if field.is_collection() || field.nullable {
                    JoinKind::Left
                } else {
                    JoinKind::Inner
                };

                let target_alias = self.aliases.next(&schema.model(target).name);
                let on = self.association_condition(&alias, field.id, &target_alias)?;
                joins.push(stmt::Join {
                    table: stmt::TableRef::new(schema.table_id_for(target), target_alias.clone()),
                    kind,
                    on,
                });

                path.push(target);
                let child = self.mapping_fetch_tree(target, target_alias, joins, path)?;
                path.pop();

                joined.push((field.id, child));
            }
        }

        Ok(FetchTree {
            alias,
            model,
            joined,
        })
    }

    pub(super) fn entity_result(&mut self, tree: &FetchTree) -> Result<EntityResult> {
        let schema = self.cx.schema;
        let model = schema.model(tree.model);
        let mapping = schema.mapping_for(model.id);
        let id_field = model.expect_identifier().field;

        let slot = self.slots;
        self.slots += 1;

        let key = self.key_result(&tree.alias, &mapping.field(id_field).columns());

        let mut attrs = Vec::with_capacity(model.fields.len());
        for field in &model.fields {
            let columns = mapping.field(field.id).columns();

            let attr = match &field.ty {
                _ if field.id == id_field => AttrResult::Id,
                FieldTy::Basic(_) => AttrResult::Basic(self.basic_result(&tree.alias, columns[0])),
                FieldTy::Embedded(embedded) => AttrResult::Composite(self.composite_result(
                    &tree.alias,
                    embedded.target,
                    embedded.create_empty_composites,
                    &mut columns.into_iter(),
                )),
                FieldTy::ToOne(to_one) => AttrResult::ToOne(match tree.child(field.id) {
                    Some(child) => ToOneResult::Joined(Box::new(self.entity_result(child)?)),
                    None => ToOneResult::Delayed {
                        key: self.key_result(&tree.alias, &columns),
                        eager: !to_one.fetch.is_lazy(),
                    },
                }),
                FieldTy::Collection(collection) => AttrResult::Collection(match tree.child(field.id) {
                    Some(child) => {
                        if collection.semantics == CollectionSemantics::Bag {
                            self.bags.push(format!("{}.{}", model.name, field.name));
                        }
                        self.collection_fetch = true;
                        CollectionResult::Joined(Box::new(self.entity_result(child)?))
                    }
                    None => CollectionResult::Delayed {
                        eager: !collection.fetch.is_lazy(),
                    },
                }),
            };

            attrs.push(attr);
        }

        Ok(EntityResult {
            slot,
            model: model.id,
            key,
            attrs,
        })
    }

    pub(super) fn basic_result(&mut self, alias: &str, column: ColumnId) -> BasicResult {
        BasicResult {
            position: self.project(stmt::Expr::column(alias, column)),
            mapping: self.cx.schema.column(column).jdbc_mapping(),
        }
    }

    pub(super) fn key_result(&mut self, alias: &str, columns: &[ColumnId]) -> Vec<BasicResult> {
        columns
            .iter()
            .map(|column| self.basic_result(alias, *column))
            .collect()
    }

    /// Reads an embeddable from `columns`, consuming one column per basic
    /// attribute in declaration order.
    pub(super) fn composite_result(
        &mut self,
        alias: &str,
        model: ModelId,
        create_empty: bool,
        columns: &mut dyn Iterator<Item = ColumnId>,
    ) -> CompositeResult {
        let embeddable = self.cx.schema.model(model);
        let mut attrs = Vec::with_capacity(embeddable.fields.len());

        for field in &embeddable.fields {
            match &field.ty {
                FieldTy::Embedded(nested) => attrs.push(CompositeAttr::Composite(self.composite_result(
                    alias,
                    nested.target,
                    nested.create_empty_composites,
                    columns,
                ))),
                _ => {
                    let column = columns.next().expect("one column per embeddable attribute");
                    attrs.push(CompositeAttr::Basic(self.basic_result(alias, column)));
                }
            }
        }

        CompositeResult {
            model,
            attrs,
            create_empty,
        }
    }
}
