//! Graph population.
//!
//! Each pass walks the graph below the roots, collects every referenced
//! document that lacks part of its requested mask, and loads them with one
//! call per type. Passes repeat until a walk finds nothing to load. A pass
//! only loads fields (it never populates recursively), so pass N+1 sees
//! exactly what pass N brought in.

use crate::error::{LayerError, LayerResult};
use crate::layer::Layer;
use futures::future::try_join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use stratum_model::{Entity, EntityRef, FieldMask};
use tracing::debug;

/// The entities of one type to load in a pass, with the union of the
/// masks they were reached with.
struct Bucket {
    entities: Vec<EntityRef>,
    fields: FieldMask,
}

impl Bucket {
    fn add(&mut self, entity: EntityRef, fields: &FieldMask) {
        if !self.entities.iter().any(|e| Arc::ptr_eq(e, &entity)) {
            self.entities.push(entity);
        }
        self.fields = self.fields.merged(fields);
    }
}

impl Layer {
    /// Loads nested documents until every entity reachable from `roots`
    /// through `fields` holds its part of the mask.
    ///
    /// Documents reported missing (with `throw_if_not_found` off) are left
    /// as they are and not requested again. Only passes that load something
    /// count against `max_passes`; the final walk that finds nothing does not.
    pub async fn populate(
        &self,
        roots: &[EntityRef],
        fields: &FieldMask,
        throw_if_not_found: bool,
    ) -> LayerResult<()> {
        let config = self.config().population;
        let mut missing: Vec<EntityRef> = Vec::new();

        let mut pass = 0;
        loop {
            let buckets = collect_buckets(roots, fields, &missing);
            if buckets.is_empty() {
                debug!(layer = %self.name(), passes = pass, "population complete");
                return Ok(());
            }
            if pass == config.max_passes {
                return Err(LayerError::PopulationDidNotConverge(config.max_passes));
            }
            debug!(
                layer = %self.name(),
                pass,
                types = buckets.len(),
                entities = buckets.values().map(|b| b.entities.len()).sum::<usize>(),
                "population pass"
            );

            let loads = buckets.into_values().map(|bucket| async move {
                let found = self
                    .load_roots(&bucket.entities, &bucket.fields, false, throw_if_not_found)
                    .await?;
                Ok::<_, LayerError>((bucket.entities, found))
            });
            let results = if config.concurrent_buckets {
                try_join_all(loads).await?
            } else {
                let mut results = Vec::new();
                for load in loads {
                    results.push(load.await?);
                }
                results
            };

            for (entities, found) in results {
                missing.extend(
                    entities
                        .into_iter()
                        .zip(found)
                        .filter(|(_, found)| !found)
                        .map(|(entity, _)| entity),
                );
            }
            pass += 1;
        }
    }
}

/// Walks the graph below `roots` and buckets the stored documents that
/// still lack requested fields. New documents have nothing to load. Each `(entity, mask)` pair is visited once, so cycles
/// terminate.
fn collect_buckets(
    roots: &[EntityRef],
    fields: &FieldMask,
    missing: &[EntityRef],
) -> BTreeMap<String, Bucket> {
    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();
    let mut visited: HashSet<(*const Entity, FieldMask)> = HashSet::new();
    let mut stack: Vec<(EntityRef, FieldMask)> = roots
        .iter()
        .map(|root| (root.clone(), fields.clone()))
        .collect();

    while let Some((entity, mask)) = stack.pop() {
        if !visited.insert((Arc::as_ptr(&entity), mask.clone())) {
            continue;
        }
        for (nested, sub) in entity.nested_entities(&mask) {
            let loadable = nested.entity_type().is_document()
                && !nested.is_new()
                && !missing.iter().any(|m| Arc::ptr_eq(m, &nested))
                && !nested.fields_are_resident(&sub);
            if loadable {
                buckets
                    .entry(nested.type_name().to_string())
                    .or_insert_with(|| Bucket {
                        entities: Vec::new(),
                        fields: FieldMask::identifier_only(),
                    })
                    .add(nested.clone(), &sub);
            }
            stack.push((nested, sub));
        }
    }
    buckets
}
