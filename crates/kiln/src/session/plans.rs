//! Compiled plans cached for the lifetime of a session.

use crate::engine::{
    compile,
    lower::{self, JdbcBulk, JdbcMutation, JdbcSelect, MutationKind, Shape},
    sqm::SqmStatement,
    Cx,
};

use kiln_core::{
    schema::{
        app::{FieldId, ModelId},
        db::ColumnId,
    },
    Result,
};

use std::{collections::HashMap, rc::Rc};

#[derive(Debug, Default)]
pub(super) struct Plans {
    /// Semantic trees keyed by query text
    queries: HashMap<String, Rc<SqmStatement>>,

    selects: HashMap<(String, Shape), Rc<JdbcSelect>>,
    bulks: HashMap<(String, Shape), Rc<JdbcBulk>>,
    entity_loaders: HashMap<(ModelId, usize), Rc<JdbcSelect>>,
    collection_loaders: HashMap<(FieldId, usize), Rc<JdbcSelect>>,

    /// The statement cache. An entry is replaced when a mutation needs a
    /// different column list.
    mutations: HashMap<(ModelId, MutationKind), Rc<JdbcMutation>>,
}

impl Plans {
    pub(super) fn sqm(&mut self, cx: Cx<'_>, query: &str) -> Result<Rc<SqmStatement>> {
        if let Some(sqm) = self.queries.get(query) {
            return Ok(sqm.clone());
        }
        let sqm = compile(cx, query)?;
        self.queries.insert(query.to_string(), sqm.clone());
        Ok(sqm)
    }

    pub(super) fn select(
        &mut self,
        cx: Cx<'_>,
        sqm: &SqmStatement,
        shape: &Shape,
    ) -> Result<Rc<JdbcSelect>> {
        let key = (sqm.query.clone(), shape.clone());
        if let Some(plan) = self.selects.get(&key) {
            return Ok(plan.clone());
        }
        let plan = Rc::new(lower::select(cx, sqm, shape)?);
        tracing::trace!(sql = %plan.sql, "lowered select");
        self.selects.insert(key, plan.clone());
        Ok(plan)
    }

    pub(super) fn bulk(&mut self, cx: Cx<'_>, sqm: &SqmStatement, shape: &Shape) -> Result<Rc<JdbcBulk>> {
        let key = (sqm.query.clone(), shape.clone());
        if let Some(plan) = self.bulks.get(&key) {
            return Ok(plan.clone());
        }
        let plan = Rc::new(lower::bulk(cx, sqm, shape)?);
        self.bulks.insert(key, plan.clone());
        Ok(plan)
    }

    pub(super) fn entity_loader(&mut self, cx: Cx<'_>, model: ModelId, batch: usize) -> Result<Rc<JdbcSelect>> {
        if let Some(plan) = self.entity_loaders.get(&(model, batch)) {
            return Ok(plan.clone());
        }
        let plan = Rc::new(lower::entity_loader(cx, model, batch)?);
        self.entity_loaders.insert((model, batch), plan.clone());
        Ok(plan)
    }

    pub(super) fn collection_loader(
        &mut self,
        cx: Cx<'_>,
        role: FieldId,
        batch: usize,
    ) -> Result<Rc<JdbcSelect>> {
        if let Some(plan) = self.collection_loaders.get(&(role, batch)) {
            return Ok(plan.clone());
        }
        let plan = Rc::new(lower::collection_loader(cx, role, batch)?);
        self.collection_loaders.insert((role, batch), plan.clone());
        Ok(plan)
    }

    /// The cached insert or update of `model` when it writes exactly
    /// `columns`; otherwise a new one replacing it.
    pub(super) fn mutation(
        &mut self,
        cx: Cx<'_>,
        kind: MutationKind,
        model: ModelId,
        columns: Vec<ColumnId>,
    ) -> Rc<JdbcMutation> {
        if let Some(mutation) = self.mutations.get(&(model, kind)) {
            if mutation.columns == columns {
                return mutation.clone();
            }
            tracing::trace!(?model, ?kind, "column list changed; replacing cached mutation");
        }

        let mutation = Rc::new(match kind {
            MutationKind::Insert => JdbcMutation::insert(cx, model, columns),
            MutationKind::Update => JdbcMutation::update(cx, model, columns),
            MutationKind::Delete => JdbcMutation::delete(cx, model),
        });
        self.mutations.insert((model, kind), mutation.clone());
        mutation
    }

    pub(super) fn clear(&mut self) {
        *self = Plans::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixture::Env;

    #[test]
    fn plans_are_reused_per_shape() {
        let env = Env::new();
        let mut plans = Plans::default();

        let query = "select p from Person p where p.id in (:ids)";
        let sqm = plans.sqm(env.cx(), query).unwrap();
        assert!(Rc::ptr_eq(&sqm, &plans.sqm(env.cx(), query).unwrap()));

        let two = Shape {
            list_sizes: vec![Some(2)],
            ..Shape::default()
        };
        let three = Shape {
            list_sizes: vec![Some(3)],
            ..Shape::default()
        };
        let a = plans.select(env.cx(), &sqm, &two).unwrap();
        let b = plans.select(env.cx(), &sqm, &two).unwrap();
        let c = plans.select(env.cx(), &sqm, &three).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn mutations_are_replaced_when_columns_change() {
        let env = Env::new();
        let mut plans = Plans::default();
        let employer = env.schema.model_by_name("Employer").unwrap().id;
        let columns = env.schema.table_for(employer).columns.iter().map(|c| c.id).collect::<Vec<_>>();

        let all = plans.mutation(env.cx(), MutationKind::Insert, employer, columns.clone());
        let again = plans.mutation(env.cx(), MutationKind::Insert, employer, columns.clone());
        assert!(Rc::ptr_eq(&all, &again));

        let id_only = plans.mutation(env.cx(), MutationKind::Insert, employer, columns[..1].to_vec());
        assert!(!Rc::ptr_eq(&all, &id_only));
        assert_eq!(id_only.sql, "INSERT INTO employer (id) VALUES (?1)");
    }
}
