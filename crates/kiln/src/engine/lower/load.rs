//! Selects loading entities and collections by key, one batch of keys per
//! execution.

use super::{
    conjunction, expr::disjunction, DomainResult, JdbcSelect, KeyBatch, Lower, Pagination,
    ParamSource, Shape,
};
use crate::engine::Cx;

use kiln_core::{
    schema::{
        app::{FieldId, ModelId},
        db::ColumnId,
        mapping,
    },
    stmt::{self, Type},
    types::{JdbcMapping, JdbcType},
    Error, Result,
};

/// Loads up to `batch` entities of `model` by identifier, joining the
/// associations the mapping fetches eagerly by join.
pub(crate) fn entity_loader(cx: Cx<'_>, model: ModelId, batch: usize) -> Result<JdbcSelect> {
    let schema = cx.schema;
    let mut lower = Lower::new(cx, None, Shape::default());

    let alias = lower.aliases.next(&schema.model(model).name);
    let mut from = stmt::TableWithJoins::new(stmt::TableRef::new(
        schema.table_id_for(model),
        alias.clone(),
    ));

    let tree = lower.mapping_fetch_tree(model, alias.clone(), &mut from.joins, &mut vec![model])?;
    let result = lower.entity_result(&tree)?;
    check_bags(&mut lower)?;

    let (filter, keys) = lower.key_restriction(&alias, &schema.id_columns(model), batch);

    let mut select = stmt::Select::new(from);
    select.filter = Some(filter);

    Ok(lower.finish(
        select,
        vec![DomainResult::Entity(result)],
        vec![None],
        Pagination::default(),
        Some(keys),
    ))
}

/// Loads the elements of up to `batch` instances of the collection `role`.
/// Rows carry the element and the key of the owner it belongs to.
pub(crate) fn collection_loader(cx: Cx<'_>, role: FieldId, batch: usize) -> Result<JdbcSelect> {
    let schema = cx.schema;
    let owner = schema.model(role.model);
    let field = owner.field(role);

    let (Some(collection), mapping::Field::Collection { key_columns, .. }) =
        (field.ty.as_collection(), schema.mapping_for(owner.id).field(role))
    else {
        return Err(Error::mapping(format!(
            "`{}.{}` is not a collection",
            owner.name, field.name
        )));
    };

    let target = collection.target;
    let mut lower = Lower::new(cx, None, Shape::default());

    let alias = lower.aliases.next(&schema.model(target).name);
    let mut from = stmt::TableWithJoins::new(stmt::TableRef::new(
        schema.table_id_for(target),
        alias.clone(),
    ));

    // The owner is already loaded; never join back to it
    let mut path = vec![owner.id, target];
    let tree = lower.mapping_fetch_tree(target, alias.clone(), &mut from.joins, &mut path)?;
    let element = lower.entity_result(&tree)?;
    check_bags(&mut lower)?;

    let owner_key = lower.key_result(&alias, key_columns);
    let (filter, keys) = lower.key_restriction(&alias, key_columns, batch);

    let mut select = stmt::Select::new(from);
    select.filter = Some(filter);

    Ok(lower.finish(
        select,
        vec![DomainResult::Entity(element), DomainResult::Key(owner_key)],
        vec![None, None],
        Pagination::default(),
        Some(keys),
    ))
}

fn check_bags(lower: &mut Lower<'_>) -> Result<()> {
    if lower.bags.len() > 1 {
        return Err(Error::multiple_bag_fetch(std::mem::take(&mut lower.bags)));
    }
    Ok(())
}

impl Lower<'_> {
    /// Restricts `columns` to a batch of keys: `=` for one key, `IN` or
    /// `= ANY` for single-column keys, and an OR of conjunctions for
    /// composite ones.
    fn key_restriction(
        &mut self,
        alias: &str,
        columns: &[ColumnId],
        size: usize,
    ) -> (stmt::Expr, KeyBatch) {
        let schema = self.cx.schema;
        let capability = self.cx.capability;
        let size = size.max(1);
        let width = columns.len();

        let mut batch = KeyBatch {
            size,
            width,
            array: false,
            pad_with_null: capability.pad_batch_with_null,
        };

        let mappings: Vec<JdbcMapping> = columns
            .iter()
            .map(|column| schema.column(*column).jdbc_mapping())
            .collect();

        let filter = match (columns, &mappings[..]) {
            ([column], [mapping]) if size > 1 && capability.array_params => {
                batch.array = true;
                let array = JdbcMapping::new(Type::list(mapping.ty.clone()), JdbcType::Array);
                let param = self.push_param(ParamSource::Arg(0), array);
                stmt::Expr::any(stmt::Expr::column(alias, *column), param)
            }
            ([column], [mapping]) if size > 1 => {
                let list = (0..size)
                    .map(|i| self.push_param(ParamSource::Arg(i), mapping.clone()))
                    .collect();
                stmt::Expr::in_list(stmt::Expr::column(alias, *column), list)
            }
            _ => {
                let mut alternatives = Vec::with_capacity(size);
                for key in 0..size {
                    let mut equalities = Vec::with_capacity(width);
                    for (i, (column, mapping)) in columns.iter().zip(&mappings).enumerate() {
                        let param = self.push_param(ParamSource::Arg(key * width + i), mapping.clone());
                        equalities.push(stmt::Expr::eq(stmt::Expr::column(alias, *column), param));
                    }
                    alternatives.push(conjunction(equalities));
                }
                disjunction(alternatives)
            }
        };

        (filter, batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        fixture::Env,
        lower::{AttrResult, ToOneResult},
    };

    use kiln_core::{driver::Capability, schema::db::TableId, stmt::Value};
    use pretty_assertions::assert_eq;

    fn model(env: &Env, name: &str) -> ModelId {
        env.schema.model_by_name(name).unwrap().id
    }

    #[test]
    fn single_key() {
        let env = Env::new();
        let plan = entity_loader(env.cx(), model(&env, "Employer"), 1).unwrap();
        assert_eq!(plan.sql, "SELECT e1_0.id, e1_0.name FROM employer e1_0 WHERE e1_0.id = ?1");
        assert_eq!(plan.tables.iter().copied().collect::<Vec<_>>(), [TableId(1)]);
    }

    #[test]
    fn eager_to_ones_are_joined() {
        let env = Env::new();
        let plan = entity_loader(env.cx(), model(&env, "Person"), 1).unwrap();
        assert_eq!(
            plan.sql,
            "SELECT p1_0.id, p1_0.name, p1_0.age, p1_0.born, p1_0.street, p1_0.city, e1_0.id, \
             e1_0.name, p1_0.parent_id FROM person p1_0 LEFT JOIN employer e1_0 \
             ON p1_0.employer_id = e1_0.id WHERE p1_0.id = ?1"
        );

        let DomainResult::Entity(person) = &plan.results[0] else {
            panic!("expected an entity result")
        };
        assert!(matches!(&person.attrs[5], AttrResult::ToOne(ToOneResult::Joined(_))));
        assert_eq!(plan.slots, 2);
    }

    #[test]
    fn batches_of_single_column_keys() {
        let env = Env::new();
        let plan = entity_loader(env.cx(), model(&env, "Employer"), 5).unwrap();
        assert_eq!(
            plan.sql,
            "SELECT e1_0.id, e1_0.name FROM employer e1_0 WHERE e1_0.id IN (?1, ?2, ?3, ?4, ?5)"
        );

        let keys = plan.keys.unwrap();
        assert_eq!(
            keys.args(&[Value::I64(7), Value::I64(9)]),
            [7, 9, 9, 9, 9].map(Value::I64)
        );
    }

    #[test]
    fn batches_bind_arrays_where_supported() {
        let env = Env::with_capability(&Capability::POSTGRESQL);
        let plan = entity_loader(env.cx(), model(&env, "Employer"), 5).unwrap();
        assert_eq!(
            plan.sql,
            "SELECT e1_0.id, e1_0.name FROM employer e1_0 WHERE e1_0.id = ANY($1)"
        );
        assert_eq!(
            plan.keys.unwrap().args(&[Value::I64(7)]),
            [Value::List(vec![Value::I64(7)])]
        );
    }

    #[test]
    fn batches_of_composite_keys() {
        let env = Env::new();
        let plan = entity_loader(env.cx(), model(&env, "Order"), 2).unwrap();
        assert_eq!(
            plan.sql,
            "SELECT o1_0.region, o1_0.number, o1_0.placed FROM \"order\" o1_0 \
             WHERE ((o1_0.region = ?1 AND o1_0.number = ?2) OR (o1_0.region = ?3 AND o1_0.number = ?4))"
        );
    }

    #[test]
    fn collections_select_elements_with_owner_key() {
        let env = Env::new();
        let staff = env.schema.model(model(&env, "Employer")).field_by_name("staff").unwrap().id;
        let plan = collection_loader(env.cx(), staff, 1).unwrap();

        // The element's eager employer is the owner being initialized
        assert_eq!(
            plan.sql,
            "SELECT p1_0.id, p1_0.name, p1_0.age, p1_0.born, p1_0.street, p1_0.city, \
             p1_0.employer_id, p1_0.parent_id FROM person p1_0 WHERE p1_0.employer_id = ?1"
        );
        assert!(matches!(&plan.results[1], DomainResult::Key(key) if key.len() == 1));
    }
}
