//! Serving lifecycle calls from child layers.
//!
//! A call is only served for types whose exposure table allows the
//! operation. Incoming records are applied to this layer's own instances,
//! so its hooks run and its identity map caches what it has loaded.

use crate::error::{LayerError, LayerResult};
use crate::layer::Layer;
use crate::lifecycle::FindOptions;
use crate::remote::RemoteLayer;
use async_trait::async_trait;
use std::collections::BTreeSet;
use stratum_model::{
    DeserializeOptions, Entity, EntityRef, EntityResolver, Operation, SerializeOptions,
    TypeIntrospection,
};
use stratum_types::{DeleteRequest, FindQuery, FindRequest, LoadRequest, Record, SaveRequest};
use tracing::debug;

impl Layer {
    /// Fails unless every named type exposes one of `operations`.
    fn check_exposed<'a>(
        &self,
        type_names: impl IntoIterator<Item = &'a str>,
        operations: &[Operation],
    ) -> LayerResult<()> {
        let type_names: BTreeSet<&str> = type_names.into_iter().collect();
        for type_name in type_names {
            let entity_type = self.entity_type(type_name)?;
            if !operations.iter().any(|&op| entity_type.exposure().allows(op)) {
                return Err(LayerError::NotExposed {
                    entity_type: type_name.to_string(),
                    operation: operations[0],
                });
            }
        }
        Ok(())
    }

    fn resolve(&self, references: &[Record]) -> LayerResult<Vec<EntityRef>> {
        references
            .iter()
            .map(|reference| self.instance(&reference.entity_type, &reference.id))
            .collect()
    }
}

fn serialize_for_caller(entity: &EntityRef, request_fields: &stratum_model::FieldMask) -> Record {
    let mut record = entity.serialize(&SerializeOptions {
        fields: request_fields.clone(),
        only_changed: false,
    });
    record.is_new = false;
    record
}

#[async_trait]
impl RemoteLayer for Layer {
    fn id(&self) -> &str {
        self.name()
    }

    async fn load(
        &self,
        references: &[Record],
        request: &LoadRequest,
    ) -> LayerResult<Vec<Option<Record>>> {
        self.check_exposed(
            references.iter().map(|r| r.entity_type.as_str()),
            &[Operation::Load, Operation::Get],
        )?;
        debug!(layer = %self.name(), count = references.len(), "serving load");
        let entities = self.resolve(references)?;
        let found = self
            .load_roots(
                &entities,
                &request.fields,
                request.reload,
                request.throw_if_not_found,
            )
            .await?;
        Ok(entities
            .iter()
            .zip(found)
            .map(|(entity, found)| found.then(|| serialize_for_caller(entity, &request.fields)))
            .collect())
    }

    async fn save(&self, records: &[Record], request: &SaveRequest) -> LayerResult<Vec<Record>> {
        self.check_exposed(
            records.iter().map(|r| r.entity_type.as_str()),
            &[Operation::Save],
        )?;
        debug!(layer = %self.name(), count = records.len(), "serving save");
        let incoming = DeserializeOptions {
            mark_clean: false,
            ..DeserializeOptions::default()
        };
        let entities = records
            .iter()
            .map(|record| Entity::deserialize(self.registry() as &dyn EntityResolver, record, &incoming))
            .collect::<Result<Vec<_>, _>>()?;
        Layer::save(self, &entities, request).await?;
        Ok(entities
            .iter()
            .map(|entity| serialize_for_caller(entity, &stratum_model::FieldMask::all()))
            .collect())
    }

    async fn delete(&self, references: &[Record], request: &DeleteRequest) -> LayerResult<()> {
        self.check_exposed(
            references.iter().map(|r| r.entity_type.as_str()),
            &[Operation::Delete],
        )?;
        debug!(layer = %self.name(), count = references.len(), "serving delete");
        let entities = self.resolve(references)?;
        Layer::delete(self, &entities, request).await
    }

    async fn find(&self, query: &FindQuery, request: &FindRequest) -> LayerResult<Vec<Record>> {
        self.check_exposed([query.entity_type.as_str()], &[Operation::Find])?;
        debug!(layer = %self.name(), entity_type = %query.entity_type, "serving find");
        let options = FindOptions {
            filter: query.filter.clone(),
            sort: request.sort.clone(),
            skip: request.skip,
            limit: request.limit,
            fields: request.fields.clone(),
            populate: false,
            throw_if_not_found: true,
        };
        let entities = Layer::find(self, &query.entity_type, &options).await?;
        Ok(entities
            .iter()
            .map(|entity| serialize_for_caller(entity, &request.fields))
            .collect())
    }

    async fn introspect(&self) -> LayerResult<Vec<TypeIntrospection>> {
        let mut exposed = Vec::new();
        for type_name in self.registry().type_names() {
            let entity_type = self.entity_type(&type_name)?;
            if entity_type.exposure().operations().next().is_some() {
                exposed.push(entity_type.introspect());
            }
        }
        Ok(exposed)
    }
}
