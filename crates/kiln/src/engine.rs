//! Query compilation and execution: HQL text is parsed, bound to the mapping
//! model, lowered to a SQL syntax tree, rendered for the dialect, executed
//! and assembled back into domain objects.

pub(crate) mod assemble;
pub(crate) mod exec;
pub(crate) mod parse;
pub(crate) mod sqm;
pub(crate) mod lower;

use crate::{db::Shared, function::FunctionRegistry};

use kiln_core::{driver::Capability, types::TypeConfiguration, Result, Schema};

use std::{rc::Rc, sync::Arc};

/// Everything compilation reads, borrowed from the session factory.
#[derive(Clone, Copy)]
pub(crate) struct Cx<'a> {
    pub(crate) schema: &'a Arc<Schema>,
    pub(crate) capability: &'a Capability,
    pub(crate) functions: &'a FunctionRegistry,
    pub(crate) types: &'a TypeConfiguration,
    pub(crate) max_fetch_depth: usize,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(shared: &'a Shared) -> Cx<'a> {
        Cx {
            schema: &shared.schema,
            capability: shared.driver.capability(),
            functions: &shared.functions,
            types: &shared.types,
            max_fetch_depth: shared.config.max_fetch_depth,
        }
    }
}

/// Parses and binds a query to the mapping model.
pub(crate) fn compile(cx: Cx<'_>, query: &str) -> Result<Rc<sqm::SqmStatement>> {
    let ast = parse::parse(query)?;
    let stmt = sqm::resolve(cx, query, ast)?;
    tracing::trace!(query, "compiled query");
    Ok(Rc::new(stmt))
}

#[cfg(test)]
pub(crate) mod fixture {
    use super::Cx;
    use crate::function::FunctionRegistry;

    use kiln_core::{driver::Capability, stmt::Type, types::TypeConfiguration, Schema};

    use std::sync::Arc;

    /// Person, Employer and Order/Line with a composite key.
    pub(crate) fn schema() -> Schema {
        Schema::builder()
            .entity("Person", |m| {
                m.id("id", Type::I64);
                m.basic("name", Type::String);
                m.basic("age", Type::I32);
                m.basic("born", Type::Timestamp).precision(3);
                m.embedded("address", "Address");
                m.many_to_one("employer", "Employer");
                m.many_to_one("parent", "Person").lazy();
                m.one_to_many("children", "Person", "parent");
            })
            .embeddable("Address", |m| {
                m.basic("street", Type::String);
                m.basic("city", Type::String);
            })
            .entity("Employer", |m| {
                m.id("id", Type::I64);
                m.basic("name", Type::String);
                m.one_to_many("staff", "Person", "employer");
            })
            .entity("Order", |m| {
                m.embedded_id("key", "OrderKey");
                m.basic("placed", Type::Timestamp);
                m.one_to_many("lines", "Line", "order").set();
            })
            .embeddable("OrderKey", |m| {
                m.basic("region", Type::String);
                m.basic("number", Type::I64);
            })
            .entity("Line", |m| {
                m.id("id", Type::I64);
                m.basic("qty", Type::I32);
                m.many_to_one("order", "Order").lazy();
            })
            .build()
            .unwrap()
    }

    pub(crate) struct Env {
        pub(crate) schema: Arc<Schema>,
        pub(crate) capability: &'static Capability,
        pub(crate) functions: FunctionRegistry,
        pub(crate) types: TypeConfiguration,
    }

    impl Env {
        pub(crate) fn new() -> Env {
            Env::with_capability(&Capability::SQLITE)
        }

        pub(crate) fn with_capability(capability: &'static Capability) -> Env {
            Env {
                schema: Arc::new(schema()),
                capability,
                functions: FunctionRegistry::default(),
                types: TypeConfiguration::default(),
            }
        }

        pub(crate) fn cx(&self) -> Cx<'_> {
            Cx {
                schema: &self.schema,
                capability: self.capability,
                functions: &self.functions,
                types: &self.types,
                max_fetch_depth: 3,
            }
        }
    }
}
