use crate::schema::app::{Cascade, CollectionSemantics, FetchMode, IdGeneration};
use crate::stmt::Type;

/// Describes one entity or embeddable. Obtained from [`super::Builder`].
#[derive(Debug)]
pub struct ModelBuilder {
    pub(super) name: String,
    pub(super) entity: bool,
    pub(super) table: Option<String>,
    pub(super) fields: Vec<FieldBuilder>,
    pub(super) id: Option<(usize, IdGeneration)>,
    pub(super) version: Option<usize>,
    pub(super) batch_size: Option<usize>,
    pub(super) dynamic_insert: bool,
    pub(super) dynamic_update: bool,
    pub(super) parent: Option<String>,
}

/// Describes one attribute. Setters chain.
#[derive(Debug)]
pub struct FieldBuilder {
    pub(super) name: String,
    pub(super) kind: FieldKind,
    pub(super) column: Option<String>,
    pub(super) column_prefix: Option<String>,
    pub(super) nullable: Option<bool>,
    pub(super) insertable: bool,
    pub(super) updatable: bool,
    pub(super) precision: Option<u8>,
    pub(super) fetch: Option<FetchMode>,
    pub(super) semantics: CollectionSemantics,
    pub(super) cascade: Cascade,
    pub(super) create_empty_composites: bool,
}

#[derive(Debug)]
pub(super) enum FieldKind {
    Basic(Type),
    Embedded(String),
    ToOne(String),
    Collection { target: String, mapped_by: String },
}

impl ModelBuilder {
    pub(super) fn new(name: &str, entity: bool) -> ModelBuilder {
        ModelBuilder {
            name: name.to_string(),
            entity,
            table: None,
            fields: vec![],
            id: None,
            version: None,
            batch_size: None,
            dynamic_insert: false,
            dynamic_update: false,
            parent: None,
        }
    }

    /// Overrides the default (snake_case) table name.
    pub fn table(&mut self, name: &str) -> &mut Self {
        self.table = Some(name.to_string());
        self
    }

    /// Assigned basic identifier.
    pub fn id(&mut self, name: &str, ty: Type) -> &mut FieldBuilder {
        self.id = Some((self.fields.len(), IdGeneration::Assigned));
        self.push(name, FieldKind::Basic(ty))
    }

    /// Database-generated (identity column) identifier.
    pub fn id_generated(&mut self, name: &str, ty: Type) -> &mut FieldBuilder {
        self.id = Some((self.fields.len(), IdGeneration::Identity));
        self.push(name, FieldKind::Basic(ty))
    }

    /// Composite identifier stored through an embeddable.
    pub fn embedded_id(&mut self, name: &str, target: &str) -> &mut FieldBuilder {
        self.id = Some((self.fields.len(), IdGeneration::Assigned));
        self.push(name, FieldKind::Embedded(target.to_string()))
    }

    pub fn basic(&mut self, name: &str, ty: Type) -> &mut FieldBuilder {
        self.push(name, FieldKind::Basic(ty))
    }

    /// Optimistic-lock version counter.
    pub fn version(&mut self, name: &str) -> &mut FieldBuilder {
        self.version = Some(self.fields.len());
        self.push(name, FieldKind::Basic(Type::I64)).nullable(false)
    }

    pub fn embedded(&mut self, name: &str, target: &str) -> &mut FieldBuilder {
        self.push(name, FieldKind::Embedded(target.to_string()))
    }

    /// To-one association; eager join fetched unless configured otherwise.
    pub fn many_to_one(&mut self, name: &str, target: &str) -> &mut FieldBuilder {
        self.push(name, FieldKind::ToOne(target.to_string()))
    }

    /// Collection of `target` entities whose `mapped_by` attribute references
    /// this entity. Lazy bag unless configured otherwise.
    pub fn one_to_many(&mut self, name: &str, target: &str, mapped_by: &str) -> &mut FieldBuilder {
        self.push(
            name,
            FieldKind::Collection {
                target: target.to_string(),
                mapped_by: mapped_by.to_string(),
            },
        )
    }

    /// Names the embeddable attribute that refers back to its owner.
    pub fn parent(&mut self, name: &str) -> &mut Self {
        self.parent = Some(name.to_string());
        self
    }

    pub fn batch_size(&mut self, size: usize) -> &mut Self {
        self.batch_size = Some(size);
        self
    }

    pub fn dynamic_insert(&mut self, enabled: bool) -> &mut Self {
        self.dynamic_insert = enabled;
        self
    }

    pub fn dynamic_update(&mut self, enabled: bool) -> &mut Self {
        self.dynamic_update = enabled;
        self
    }

    fn push(&mut self, name: &str, kind: FieldKind) -> &mut FieldBuilder {
        self.fields.push(FieldBuilder {
            name: name.to_string(),
            kind,
            column: None,
            column_prefix: None,
            nullable: None,
            insertable: true,
            updatable: true,
            precision: None,
            fetch: None,
            semantics: CollectionSemantics::Bag,
            cascade: Cascade::NONE,
            create_empty_composites: false,
        });
        let index = self.fields.len() - 1;
        &mut self.fields[index]
    }
}

impl FieldBuilder {
    /// Overrides the column name. For to-one associations with a single
    /// column this names the foreign key.
    pub fn column(&mut self, name: &str) -> &mut Self {
        self.column = Some(name.to_string());
        self
    }

    /// Prefix prepended to the columns of an embedded attribute.
    pub fn column_prefix(&mut self, prefix: &str) -> &mut Self {
        self.column_prefix = Some(prefix.to_string());
        self
    }

    pub fn nullable(&mut self, nullable: bool) -> &mut Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn insertable(&mut self, insertable: bool) -> &mut Self {
        self.insertable = insertable;
        self
    }

    pub fn updatable(&mut self, updatable: bool) -> &mut Self {
        self.updatable = updatable;
        self
    }

    pub fn precision(&mut self, precision: u8) -> &mut Self {
        self.precision = Some(precision);
        self
    }

    pub fn fetch(&mut self, fetch: FetchMode) -> &mut Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn lazy(&mut self) -> &mut Self {
        self.fetch(FetchMode::LAZY)
    }

    /// Eagerly fetched with a join.
    pub fn eager(&mut self) -> &mut Self {
        self.fetch(FetchMode::EAGER_JOIN)
    }

    /// Eagerly fetched with a follow-up select.
    pub fn eager_select(&mut self) -> &mut Self {
        self.fetch(FetchMode::EAGER_SELECT)
    }

    pub fn bag(&mut self) -> &mut Self {
        self.semantics = CollectionSemantics::Bag;
        self
    }

    pub fn set(&mut self) -> &mut Self {
        self.semantics = CollectionSemantics::Set;
        self
    }

    pub fn cascade(&mut self, cascade: Cascade) -> &mut Self {
        self.cascade = cascade;
        self
    }

    pub fn create_empty_composites(&mut self, enabled: bool) -> &mut Self {
        self.create_empty_composites = enabled;
        self
    }
}
