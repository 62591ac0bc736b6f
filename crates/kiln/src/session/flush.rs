//! Writing: the action queue and the flush that synchronizes the
//! persistence context with the database.
//!
//! A flush executes scheduled inserts in the order they were scheduled,
//! then updates of dirty instances, then scheduled deletes. After a failed
//! flush the session's state no longer matches the database and the
//! transaction must be rolled back.

use super::{context::normalize_id, EntityKey, Session, Status};
use crate::{
    engine::{
        exec::{self, Bindings},
        lower::{JdbcMutation, MutationKind},
        Cx,
    },
    entity::{Attr, EntityRef},
};

use kiln_core::{
    schema::{
        app::{IdGeneration, ModelId},
        db::{ColumnId, TableId},
    },
    stmt::Value,
    Error, Result,
};

use indexmap::IndexSet;
use std::rc::Rc;

/// Inserts and deletes scheduled by `persist` and `remove`.
#[derive(Debug, Default)]
pub(super) struct ActionQueue {
    inserts: Vec<EntityRef>,
    deletes: Vec<EntityRef>,
}

impl ActionQueue {
    pub(super) fn push_insert(&mut self, entity: EntityRef) {
        self.inserts.push(entity);
    }

    pub(super) fn push_delete(&mut self, entity: EntityRef) {
        if !self.deletes.iter().any(|e| e.ptr_eq(&entity)) {
            self.deletes.push(entity);
        }
    }

    /// Drops a scheduled insert. Returns `true` if there was one.
    pub(super) fn cancel_insert(&mut self, entity: &EntityRef) -> bool {
        let before = self.inserts.len();
        self.inserts.retain(|e| !e.ptr_eq(entity));
        before != self.inserts.len()
    }

    pub(super) fn cancel_delete(&mut self, entity: &EntityRef) {
        self.deletes.retain(|e| !e.ptr_eq(entity));
    }

    pub(super) fn forget(&mut self, entity: &EntityRef) {
        self.cancel_insert(entity);
        self.cancel_delete(entity);
    }

    pub(super) fn clear(&mut self) {
        self.inserts.clear();
        self.deletes.clear();
    }

    pub(super) fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }

    fn entities(&self) -> impl Iterator<Item = &EntityRef> {
        self.inserts.iter().chain(&self.deletes)
    }
}

/// A pending update of one dirty instance.
struct Update {
    entity: EntityRef,
    columns: Vec<ColumnId>,
    values: Vec<Value>,
    old_version: Option<Value>,
}

impl Session {
    /// Writes pending changes. Outside a transaction the flush runs in one
    /// of its own.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.in_transaction {
            return self.flush_actions();
        }

        self.begin()?;
        if let Err(err) = self.flush_actions() {
            self.rollback()?;
            return Err(err);
        }
        self.commit()
    }

    /// Returns `true` if a flush would write anything.
    pub fn is_dirty(&self) -> bool {
        !self.actions.is_empty() || !self.dirty_entities().is_empty()
    }

    /// Flushes when a pending change touches one of `tables`, so a query
    /// reading them sees the session's own writes.
    pub(crate) fn auto_flush(&mut self, tables: &IndexSet<TableId>) -> Result<()> {
        let schema = &self.shared.schema;
        let touches = |entity: &EntityRef| tables.contains(&schema.table_id_for(entity.model()));

        let needed = self.actions.entities().any(touches)
            || self.dirty_entities().iter().any(|update| touches(&update.entity));

        if needed {
            tracing::debug!("auto-flushing before query");
            self.flush_actions()?;
        }
        Ok(())
    }

    pub(super) fn flush_actions(&mut self) -> Result<()> {
        self.ensure_open()?;
        let mut touched = IndexSet::new();

        let inserts = std::mem::take(&mut self.actions.inserts);
        let deletes = std::mem::take(&mut self.actions.deletes);
        let inserted = inserts.len();

        self.execute_inserts(inserts, &mut touched)?;

        let updates = self.dirty_entities();
        let updated = updates.len();
        for update in updates {
            self.execute_update(update, &mut touched)?;
        }

        let deleted = deletes.len();
        for entity in deletes {
            self.execute_delete(&entity, &mut touched)?;
        }

        if !touched.is_empty() {
            tracing::debug!(inserted, updated, deleted, "flushed");
            self.tables_written(&touched);
        }
        Ok(())
    }

    /// Executes scheduled inserts now. Used before an insert whose
    /// identifier is generated by the database.
    pub(super) fn execute_pending_inserts(&mut self) -> Result<()> {
        let inserts = std::mem::take(&mut self.actions.inserts);
        if inserts.is_empty() {
            return Ok(());
        }

        let mut touched = IndexSet::new();
        self.execute_inserts(inserts, &mut touched)?;
        self.tables_written(&touched);
        Ok(())
    }

    /// Inserts a row whose identifier is generated by the database and
    /// registers the instance under it.
    pub(super) fn insert_with_identity(&mut self, entity: &EntityRef) -> Result<()> {
        let shared = self.shared.clone();
        let (model, columns, values) = self.insert_row(entity)?;
        let mutation = self
            .plans
            .mutation(Cx::new(&shared), MutationKind::Insert, model, columns);

        let params = exec::bind(&mutation.binders, &mutation.parameters, &Bindings::args(&values))?;
        let timeout = shared.config.default_timeout;
        let connection = self.connection()?;
        let count = exec::execute(connection, &mutation.sql, &params, timeout)?;
        exec::check_row_count(&entity.entity_name(), &Value::Null, 1, count)?;

        let generated = connection
            .last_insert_id()
            .map_err(|err| exec::convert_sql_error(err, &mutation.sql))?;
        let id = normalize_id(&shared.schema, model, &Value::I64(generated))?;
        entity.set_id(&id);

        tracing::trace!(entity = %entity.entity_name(), %id, "identity generated");
        self.context.add_new(EntityKey { model, id }, entity.clone());
        self.context.after_write(entity);
        self.tables_written([&mutation.table]);
        Ok(())
    }

    /// Runs `entities` in order, batching consecutive inserts that share a
    /// statement.
    fn execute_inserts(
        &mut self,
        entities: Vec<EntityRef>,
        touched: &mut IndexSet<TableId>,
    ) -> Result<()> {
        let shared = self.shared.clone();
        let batch_size = shared.config.jdbc_batch_size.max(1);
        let mut batch: Option<(Rc<JdbcMutation>, Vec<(EntityRef, Vec<Value>)>)> = None;

        for entity in entities {
            let (model, columns, values) = self.insert_row(&entity)?;
            let mutation = self
                .plans
                .mutation(Cx::new(&shared), MutationKind::Insert, model, columns);

            if let Some((current, rows)) = &mut batch {
                if Rc::ptr_eq(current, &mutation) && rows.len() < batch_size {
                    rows.push((entity, values));
                    continue;
                }
            }

            if let Some((current, rows)) = batch.take() {
                self.execute_insert_batch(&current, rows, touched)?;
            }
            batch = Some((mutation, vec![(entity, values)]));
        }

        if let Some((current, rows)) = batch {
            self.execute_insert_batch(&current, rows, touched)?;
        }
        Ok(())
    }

    fn execute_insert_batch(
        &mut self,
        mutation: &JdbcMutation,
        rows: Vec<(EntityRef, Vec<Value>)>,
        touched: &mut IndexSet<TableId>,
    ) -> Result<()> {
        let params = rows
            .iter()
            .map(|(_, values)| exec::bind(&mutation.binders, &mutation.parameters, &Bindings::args(values)))
            .collect::<Result<Vec<_>>>()?;

        let timeout = self.shared.config.default_timeout;
        let connection = self.connection()?;
        let counts = if let [params] = &params[..] {
            vec![exec::execute(connection, &mutation.sql, params, timeout)?]
        } else {
            exec::execute_batch(connection, &mutation.sql, &params)?
        };

        for ((entity, _), count) in rows.iter().zip(counts) {
            exec::check_row_count(&entity.entity_name(), &entity.id(), 1, count)?;
            self.context.after_write(entity);
        }
        touched.insert(mutation.table);
        Ok(())
    }

    /// The model, columns and values of the row inserted for `entity`.
    fn insert_row(&self, entity: &EntityRef) -> Result<(ModelId, Vec<ColumnId>, Vec<Value>)> {
        let schema = &self.shared.schema;
        let data = entity.borrow();
        let model = schema.model(data.model);
        let root = model.expect_entity();

        let generated = root.identifier.generation == IdGeneration::Identity;
        let dynamic = self.shared.config.dynamic_insert || root.dynamic_insert;

        for attr in &data.attrs {
            if let Attr::ToOne(Some(target)) = attr {
                self.check_reference(entity, target)?;
            }
        }

        let mut columns = vec![];
        let mut values = vec![];
        for (field, column, value) in data.column_state() {
            if generated && field == root.identifier.field {
                continue;
            }
            if !schema.field(field).insertable || (dynamic && value.is_null()) {
                continue;
            }
            columns.push(column);
            values.push(value);
        }
        Ok((model.id, columns, values))
    }

    /// A row may only reference instances that exist or will exist.
    fn check_reference(&self, entity: &EntityRef, target: &EntityRef) -> Result<()> {
        if self.context.is_associated(target) || !target.id().is_all_null() {
            return Ok(());
        }
        Err(Error::from_args(format_args!(
            "`{}` references an unsaved transient `{}` instance; persist it first",
            entity.entity_name(),
            target.entity_name()
        )))
    }

    /// Instances whose updatable columns differ from the state they were
    /// loaded or last flushed with.
    fn dirty_entities(&self) -> Vec<Update> {
        let schema = &self.shared.schema;
        let mut updates = vec![];

        for (entity, entry) in self.context.managed() {
            if entry.status != Status::Managed || !entity.is_initialized() {
                continue;
            }
            let Some(loaded) = &entry.loaded_state else {
                continue;
            };

            let data = entity.borrow();
            let model = schema.model(data.model);
            let root = model.expect_entity();
            let state = data.column_state();

            let mut all = vec![];
            let mut dirty = vec![];
            for (i, (field, column, value)) in state.into_iter().enumerate() {
                if field == root.identifier.field
                    || Some(field) == root.version
                    || !schema.field(field).updatable
                {
                    continue;
                }

                let changed = loaded
                    .get(i)
                    .map_or(true, |old| !schema.column(column).jdbc_mapping().are_equal(old, &value));
                if changed {
                    dirty.push((column, value.clone()));
                }
                all.push((column, value));
            }

            if dirty.is_empty() {
                continue;
            }

            let written = if root.dynamic_update { dirty } else { all };
            let (columns, values): (Vec<ColumnId>, Vec<Value>) = written.into_iter().unzip();
            updates.push(Update {
                entity: entity.clone(),
                columns,
                values,
                old_version: entry.version.clone(),
            });
        }
        updates
    }

    fn execute_update(&mut self, update: Update, touched: &mut IndexSet<TableId>) -> Result<()> {
        let shared = self.shared.clone();
        let entity = &update.entity;
        let model = entity.model();
        let mutation = self
            .plans
            .mutation(Cx::new(&shared), MutationKind::Update, model, update.columns);

        let id = entity.id();
        let mut args = update.values;
        let new_version = mutation.versioned.then(|| next_version(update.old_version.as_ref()));
        args.extend(new_version.clone());
        id.flatten_into(&mut args);
        if mutation.versioned {
            args.push(update.old_version.unwrap_or(Value::Null));
        }

        let params = exec::bind(&mutation.binders, &mutation.parameters, &Bindings::args(&args))?;
        let count = exec::execute(
            self.connection()?,
            &mutation.sql,
            &params,
            shared.config.default_timeout,
        )?;
        exec::check_row_count(&entity.entity_name(), &id, 1, count)?;

        if let (Some(version), Some(field)) = (new_version, shared.schema.model(model).version_field()) {
            entity.borrow_mut().attrs[field.id.index] = Attr::Value(version);
        }
        self.context.after_write(entity);
        touched.insert(mutation.table);
        Ok(())
    }

    fn execute_delete(&mut self, entity: &EntityRef, touched: &mut IndexSet<TableId>) -> Result<()> {
        let shared = self.shared.clone();
        let model = entity.model();
        let mutation = self
            .plans
            .mutation(Cx::new(&shared), MutationKind::Delete, model, vec![]);

        let id = entity.id();
        let mut args = vec![];
        id.flatten_into(&mut args);
        if mutation.versioned {
            let version = self
                .context
                .entry(entity)
                .and_then(|entry| entry.version.clone())
                .unwrap_or(Value::Null);
            args.push(version);
        }

        let params = exec::bind(&mutation.binders, &mutation.parameters, &Bindings::args(&args))?;
        let count = exec::execute(
            self.connection()?,
            &mutation.sql,
            &params,
            shared.config.default_timeout,
        )?;
        exec::check_row_count(&entity.entity_name(), &id, 1, count)?;

        self.context.remove(entity);
        touched.insert(mutation.table);
        Ok(())
    }
}

/// The version written by an update. Versions are only compared for
/// equality, so the largest one wraps around.
fn next_version(old: Option<&Value>) -> Value {
    match old {
        Some(Value::I32(version)) => Value::I32(version.wrapping_add(1)),
        Some(Value::I64(version)) => Value::I64(version.wrapping_add(1)),
        _ => Value::I64(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixture;

    use std::sync::Arc;

    #[test]
    fn queue_cancellation() {
        let schema = Arc::new(fixture::schema());
        let employer = schema.model_by_name("Employer").unwrap().id;
        let a = EntityRef::new(&schema, employer);
        let b = EntityRef::new(&schema, employer);

        let mut queue = ActionQueue::default();
        queue.push_insert(a.clone());
        queue.push_delete(b.clone());
        queue.push_delete(b.clone());
        assert_eq!(queue.deletes.len(), 1);

        assert!(queue.cancel_insert(&a));
        assert!(!queue.cancel_insert(&a));

        queue.forget(&b);
        assert!(queue.is_empty());
    }

    #[test]
    fn versions_increment() {
        assert_eq!(next_version(Some(&Value::I64(4))), Value::I64(5));
        assert_eq!(next_version(Some(&Value::I32(0))), Value::I32(1));
        assert_eq!(next_version(None), Value::I64(1));
    }

    #[test]
    fn largest_versions_wrap() {
        assert_eq!(next_version(Some(&Value::I32(i32::MAX))), Value::I32(i32::MIN));
        assert_eq!(next_version(Some(&Value::I64(i64::MAX))), Value::I64(i64::MIN));
    }
}
