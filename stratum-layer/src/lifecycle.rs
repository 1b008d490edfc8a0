//! Entity lifecycle operations: get, load, reload, save, delete, find.
//!
//! Every operation takes a batch. Hooks run one entity at a time in input
//! order, and a failure aborts the rest of the batch.

use crate::error::{LayerError, LayerResult};
use crate::layer::{Layer, group_by_type};
use serde_json::{Map, Value};
use stratum_model::{
    DeserializeOptions, Entity, EntityId, EntityRef, EntityResolver, FieldMask, SerializeOptions,
};
use stratum_types::{DeleteRequest, FindQuery, FindRequest, LoadRequest, SaveRequest, SortKey};
use tracing::debug;

/// Options for [`Layer::get`], [`Layer::load`] and [`Layer::reload`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub fields: FieldMask,
    /// Load even when the requested fields are already resident.
    pub reload: bool,
    /// Close the graph under `fields` afterwards.
    pub populate: bool,
    pub throw_if_not_found: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fields: FieldMask::all(),
            reload: false,
            populate: true,
            throw_if_not_found: true,
        }
    }
}

impl LoadOptions {
    pub fn fields(fields: FieldMask) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn lenient(mut self) -> Self {
        self.throw_if_not_found = false;
        self
    }

    #[must_use]
    pub fn without_population(mut self) -> Self {
        self.populate = false;
        self
    }
}

/// Options for [`Layer::find`].
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Attribute equality conditions.
    pub filter: Map<String, Value>,
    pub sort: Vec<SortKey>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    pub fields: FieldMask,
    pub populate: bool,
    pub throw_if_not_found: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            filter: Map::new(),
            sort: Vec::new(),
            skip: None,
            limit: None,
            fields: FieldMask::all(),
            populate: true,
            throw_if_not_found: true,
        }
    }
}

impl FindOptions {
    #[must_use]
    pub fn filter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.filter.insert(name.into(), value);
        self
    }
}

fn hook_error(entity: &EntityRef, hook: &'static str) -> impl FnOnce(anyhow::Error) -> LayerError {
    let entity = entity.to_string();
    move |source| LayerError::Hook {
        entity,
        hook,
        source,
    }
}

impl Layer {
    /// Fetches entities of one type by identifier.
    ///
    /// Resident instances are reused, so fields already loaded are not
    /// fetched again. The result is aligned with `ids`; a missing entity is
    /// `None` when `throw_if_not_found` is off.
    pub async fn get<I, S>(
        &self,
        type_name: &str,
        ids: I,
        options: &LoadOptions,
    ) -> LayerResult<Vec<Option<EntityRef>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entity_type = self.entity_type(type_name)?;
        let ids = ids
            .into_iter()
            .map(|id| EntityId::parse(id.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let entities: Vec<EntityRef> = ids
            .iter()
            .map(|id| self.registry().instance(&entity_type, id))
            .collect();
        self.load(&entities, options).await
    }

    /// [`get`](Self::get) for a single identifier.
    pub async fn get_one(
        &self,
        type_name: &str,
        id: &str,
        options: &LoadOptions,
    ) -> LayerResult<Option<EntityRef>> {
        Ok(self
            .get(type_name, [id], options)
            .await?
            .into_iter()
            .next()
            .flatten())
    }

    /// Loads the requested fields into `entities`.
    ///
    /// Entities that already hold every requested field are skipped unless
    /// `reload` is set. New entities (never saved, or deleted) are always
    /// looked up, so they report not-found. The result is aligned with `entities`.
    pub async fn load(
        &self,
        entities: &[EntityRef],
        options: &LoadOptions,
    ) -> LayerResult<Vec<Option<EntityRef>>> {
        let found = self
            .load_roots(
                entities,
                &options.fields,
                options.reload,
                options.throw_if_not_found,
            )
            .await?;
        let loaded: Vec<Option<EntityRef>> = entities
            .iter()
            .zip(found)
            .map(|(entity, found)| found.then(|| entity.clone()))
            .collect();
        if options.populate {
            let roots: Vec<EntityRef> = loaded.iter().flatten().cloned().collect();
            self.populate(&roots, &options.fields, options.throw_if_not_found)
                .await?;
        }
        Ok(loaded)
    }

    /// [`load`](Self::load) bypassing resident fields.
    pub async fn reload(
        &self,
        entities: &[EntityRef],
        options: &LoadOptions,
    ) -> LayerResult<Vec<Option<EntityRef>>> {
        let options = LoadOptions {
            reload: true,
            ..options.clone()
        };
        self.load(entities, &options).await
    }

    /// Loads one level of `entities` without populating. Returns, per
    /// entity, whether it exists (skipped entities count as existing).
    pub(crate) async fn load_roots(
        &self,
        entities: &[EntityRef],
        fields: &FieldMask,
        reload: bool,
        throw_if_not_found: bool,
    ) -> LayerResult<Vec<bool>> {
        let mut found = vec![true; entities.len()];
        // New entities have no stored record to be resident from.
        let pending: Vec<usize> = (0..entities.len())
            .filter(|&i| {
                reload || entities[i].is_new() || !entities[i].fields_are_resident(fields)
            })
            .collect();
        let skipped = entities.len() - pending.len();
        if skipped > 0 {
            debug!(layer = %self.name(), skipped, "entities already resident");
        }
        if pending.is_empty() {
            return Ok(found);
        }

        let pending_entities: Vec<EntityRef> = pending.iter().map(|&i| entities[i].clone()).collect();
        let request = LoadRequest {
            fields: fields.clone(),
            reload,
            throw_if_not_found,
        };
        for (type_name, group) in group_by_type(&pending_entities) {
            self.entity_type(&type_name)?;
            let backend = self.backend(&type_name)?;
            let references: Vec<_> = group
                .iter()
                .map(|&i| pending_entities[i].serialize_reference())
                .collect();
            let records = backend.load(&references, &request).await?;
            let options = DeserializeOptions {
                fields: Some(fields.clone()),
                source: Some(backend.id().to_string()),
                mark_clean: true,
            };
            for (&i, record) in group.iter().zip(records) {
                match record {
                    Some(record) => pending_entities[i].apply_record(self.registry(), &record, &options)?,
                    None => found[pending[i]] = false,
                }
            }
        }

        for &i in &pending {
            if found[i] {
                let entity = &entities[i];
                entity
                    .entity_type()
                    .hooks()
                    .after_load(entity)
                    .await
                    .map_err(hook_error(entity, "after_load"))?;
            }
        }
        Ok(found)
    }

    /// Persists `entities`, sending only attributes changed since they were
    /// last loaded or saved.
    pub async fn save(&self, entities: &[EntityRef], request: &SaveRequest) -> LayerResult<()> {
        for entity in entities {
            entity
                .entity_type()
                .hooks()
                .before_save(entity)
                .await
                .map_err(hook_error(entity, "before_save"))?;
        }

        for (type_name, group) in group_by_type(entities) {
            self.entity_type(&type_name)?;
            let backend = self.backend(&type_name)?;
            let records: Vec<_> = group
                .iter()
                .map(|&i| entities[i].serialize(&SerializeOptions::changes()))
                .collect();
            let saved = backend.save(&records, request).await?;
            let options = DeserializeOptions {
                source: Some(backend.id().to_string()),
                ..DeserializeOptions::default()
            };
            for (&i, record) in group.iter().zip(saved) {
                entities[i].apply_record(self.registry(), &record, &options)?;
            }
        }

        for entity in entities {
            entity.mark_saved();
            entity
                .entity_type()
                .hooks()
                .after_save(entity)
                .await
                .map_err(hook_error(entity, "after_save"))?;
        }
        Ok(())
    }

    /// Removes `entities` from their backends. The in-memory instances
    /// remain and are flagged new again.
    pub async fn delete(&self, entities: &[EntityRef], request: &DeleteRequest) -> LayerResult<()> {
        for entity in entities {
            entity
                .entity_type()
                .hooks()
                .before_delete(entity)
                .await
                .map_err(hook_error(entity, "before_delete"))?;
        }

        for (type_name, group) in group_by_type(entities) {
            self.entity_type(&type_name)?;
            let backend = self.backend(&type_name)?;
            let references: Vec<_> = group
                .iter()
                .map(|&i| entities[i].serialize_reference())
                .collect();
            backend.delete(&references, request).await?;
        }

        for entity in entities {
            entity.mark_deleted();
            entity
                .entity_type()
                .hooks()
                .after_delete(entity)
                .await
                .map_err(hook_error(entity, "after_delete"))?;
        }
        Ok(())
    }

    /// Queries a type's backend and returns the matching entities.
    pub async fn find(&self, type_name: &str, options: &FindOptions) -> LayerResult<Vec<EntityRef>> {
        self.entity_type(type_name)?;
        let backend = self.backend(type_name)?;
        let query = FindQuery {
            entity_type: type_name.to_string(),
            filter: options.filter.clone(),
        };
        let request = FindRequest {
            sort: options.sort.clone(),
            skip: options.skip,
            limit: options.limit,
            fields: options.fields.clone(),
        };
        let records = backend.find(&query, &request).await?;

        let deserialize = DeserializeOptions {
            fields: Some(options.fields.clone()),
            source: Some(backend.id().to_string()),
            mark_clean: true,
        };
        let entities = records
            .iter()
            .map(|record| Entity::deserialize(self.registry() as &dyn EntityResolver, record, &deserialize))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(layer = %self.name(), entity_type = %type_name, count = entities.len(), "found entities");

        if options.populate {
            self.populate(&entities, &options.fields, options.throw_if_not_found)
                .await?;
        }
        for entity in &entities {
            entity
                .entity_type()
                .hooks()
                .after_load(entity)
                .await
                .map_err(hook_error(entity, "after_load"))?;
        }
        Ok(entities)
    }
}
