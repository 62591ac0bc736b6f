use kiln_core::{schema::app::ModelId, types::JdbcMapping};

/// How one selected item is read back from a row.
#[derive(Debug)]
pub(crate) enum DomainResult {
    Basic(BasicResult),
    Composite(CompositeResult),
    Entity(EntityResult),

    /// Identifier or foreign key columns read as one flat value: a scalar
    /// for single-column keys, a record otherwise.
    Key(Vec<BasicResult>),
}

/// A single projected column.
#[derive(Debug, Clone)]
pub(crate) struct BasicResult {
    /// Index into the projection
    pub(crate) position: usize,
    pub(crate) mapping: JdbcMapping,
}

#[derive(Debug)]
pub(crate) struct CompositeResult {
    /// The embeddable
    pub(crate) model: ModelId,

    /// One per embeddable attribute
    pub(crate) attrs: Vec<CompositeAttr>,

    /// Instantiate even when every column is null
    pub(crate) create_empty: bool,
}

#[derive(Debug)]
pub(crate) enum CompositeAttr {
    Basic(BasicResult),
    Composite(CompositeResult),
}

#[derive(Debug)]
pub(crate) struct EntityResult {
    /// Index of the entity's state while a row is processed. Joined entities
    /// have their own slots.
    pub(crate) slot: usize,

    pub(crate) model: ModelId,

    /// Identifier columns; all null when an outer join matched nothing
    pub(crate) key: Vec<BasicResult>,

    /// One per entity attribute, in field order
    pub(crate) attrs: Vec<AttrResult>,
}

#[derive(Debug)]
pub(crate) enum AttrResult {
    /// Taken from the key
    Id,
    Basic(BasicResult),
    Composite(CompositeResult),
    ToOne(ToOneResult),
    Collection(CollectionResult),
}

#[derive(Debug)]
pub(crate) enum ToOneResult {
    /// The target's columns are in the same row
    Joined(Box<EntityResult>),

    /// Only the foreign key is selected. Eager targets are loaded once the
    /// rows are processed; lazy ones become proxies.
    Delayed { key: Vec<BasicResult>, eager: bool },
}

#[derive(Debug)]
pub(crate) enum CollectionResult {
    /// Each row carries one element
    Joined(Box<EntityResult>),

    /// Loaded by a separate select, once the rows are processed when eager
    Delayed { eager: bool },
}

impl EntityResult {
    /// Visits this result and every result joined beneath it.
    pub(crate) fn walk<'a>(&'a self, f: &mut impl FnMut(&'a EntityResult)) {
        f(self);
        for attr in &self.attrs {
            match attr {
                AttrResult::ToOne(ToOneResult::Joined(joined))
                | AttrResult::Collection(CollectionResult::Joined(joined)) => joined.walk(f),
                _ => {}
            }
        }
    }
}
