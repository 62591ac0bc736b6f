use super::{
    app::{FieldTy, IdGeneration, Model},
    Schema,
};
use crate::{Error, Result};

struct Verify<'a> {
    schema: &'a Schema,
}

impl Schema {
    pub(super) fn verify(&self) -> Result<()> {
        Verify { schema: self }.verify()
    }
}

impl Verify<'_> {
    fn verify(&self) -> Result<()> {
        for model in self.schema.app.models() {
            if model.is_entity() {
                self.verify_identifier(model)?;
                self.verify_version(model)?;
                self.verify_collection_targets(model)?;
            }
        }

        self.verify_each_table_has_a_primary_key()
    }

    fn verify_identifier(&self, model: &Model) -> Result<()> {
        let identifier = model.expect_identifier();
        let field = model.field(identifier.field);

        match (&field.ty, identifier.generation) {
            (FieldTy::Basic(basic), IdGeneration::Identity) if !basic.ty.is_identity_compatible() => {
                Err(Error::mapping(format!(
                    "identity identifier `{}.{}` must be an integer",
                    model.name, field.name
                )))
            }
            (FieldTy::Basic(_), _) | (FieldTy::Embedded(_), IdGeneration::Assigned) => Ok(()),
            _ => Err(Error::mapping(format!(
                "identifier `{}.{}` must be a basic or embedded attribute",
                model.name, field.name
            ))),
        }
    }

    fn verify_version(&self, model: &Model) -> Result<()> {
        let Some(field) = model.version_field() else {
            return Ok(());
        };

        match &field.ty {
            FieldTy::Basic(basic) if basic.ty.is_identity_compatible() => Ok(()),
            _ => Err(Error::mapping(format!(
                "version `{}.{}` must be an integer",
                model.name, field.name
            ))),
        }
    }

    fn verify_collection_targets(&self, model: &Model) -> Result<()> {
        for field in &model.fields {
            if let FieldTy::Collection(collection) = &field.ty {
                if !self.schema.model(collection.target).is_entity() {
                    return Err(Error::mapping(format!(
                        "collection `{}.{}` must target an entity",
                        model.name, field.name
                    )));
                }
            }
        }

        Ok(())
    }

    fn verify_each_table_has_a_primary_key(&self) -> Result<()> {
        for table in &self.schema.db.tables {
            if table.primary_key.is_empty() {
                return Err(Error::mapping(format!(
                    "table `{}` has no primary key",
                    table.name
                )));
            }
        }

        Ok(())
    }
}
