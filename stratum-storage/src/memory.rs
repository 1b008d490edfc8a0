use crate::error::{StorageError, StorageResult};
use crate::query;
use crate::store::Store;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use stratum_types::{
    DeleteRequest, EntityId, FindQuery, FindRequest, LoadRequest, Record, SaveRequest,
};
use tracing::debug;

type Key = (String, EntityId);

/// A store that keeps records in process memory.
pub struct MemoryStore {
    id: String,
    records: RwLock<BTreeMap<Key, Record>>,
}

impl MemoryStore {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored records, all types included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The stored record, unprojected.
    pub fn get(&self, entity_type: &str, id: &EntityId) -> Option<Record> {
        self.read().get(&(entity_type.to_string(), id.clone())).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Key, Record>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Key, Record>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn key(record: &Record) -> Key {
    (record.entity_type.clone(), record.id.clone())
}

#[async_trait]
impl Store for MemoryStore {
    fn id(&self) -> &str {
        &self.id
    }

    async fn load(
        &self,
        references: &[Record],
        request: &LoadRequest,
    ) -> StorageResult<Vec<Option<Record>>> {
        let records = self.read();
        let loaded = references
            .iter()
            .map(|reference| match records.get(&key(reference)) {
                Some(record) => Ok(Some(query::project(record, &request.fields))),
                None if request.throw_if_not_found => Err(StorageError::not_found(
                    &reference.entity_type,
                    reference.id.as_str(),
                )),
                None => Ok(None),
            })
            .collect::<StorageResult<Vec<_>>>()?;
        debug!(store = %self.id, count = loaded.len(), "loaded records");
        Ok(loaded)
    }

    async fn save(&self, records: &[Record], request: &SaveRequest) -> StorageResult<Vec<Record>> {
        let mut stored = self.write();
        for record in records {
            let exists = stored.contains_key(&key(record));
            if record.is_new && exists && request.throw_if_already_exists {
                return Err(StorageError::already_exists(&record.entity_type, record.id.as_str()));
            }
            if !record.is_new && !exists && request.throw_if_not_found {
                return Err(StorageError::not_found(&record.entity_type, record.id.as_str()));
            }
        }
        let saved: Vec<Record> = records
            .iter()
            .map(|record| {
                let merged = query::merge(stored.get(&key(record)), record);
                stored.insert(key(record), merged.clone());
                merged
            })
            .collect();
        debug!(store = %self.id, count = saved.len(), "saved records");
        Ok(saved)
    }

    async fn delete(&self, references: &[Record], request: &DeleteRequest) -> StorageResult<()> {
        let mut stored = self.write();
        if request.throw_if_not_found {
            if let Some(missing) = references.iter().find(|r| !stored.contains_key(&key(r))) {
                return Err(StorageError::not_found(&missing.entity_type, missing.id.as_str()));
            }
        }
        for reference in references {
            stored.remove(&key(reference));
        }
        debug!(store = %self.id, count = references.len(), "deleted records");
        Ok(())
    }

    async fn find(&self, query: &FindQuery, request: &FindRequest) -> StorageResult<Vec<Record>> {
        let candidates: Vec<Record> = self
            .read()
            .values()
            .filter(|record| record.entity_type == query.entity_type)
            .cloned()
            .collect();
        Ok(query::find(candidates, query, request))
    }
}
