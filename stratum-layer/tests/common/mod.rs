//! Shared test helpers for layer tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex, Once};
use stratum_layer::{Layer, LayerConfig};
use stratum_model::{
    AttributeOptions, EntityHooks, EntityRef, EntityType, EntityTypeRef, ExposureTable, Value,
};
use stratum_storage::{
    DeleteRequest, FindQuery, FindRequest, LoadRequest, MemoryStore, Record, SaveRequest,
    StorageResult, Store,
};

static TRACING: Once = Once::new();

/// Routes `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One call received by a [`CountingStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub operation: &'static str,
    pub records: Vec<Record>,
}

impl Call {
    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }
}

/// A memory store that records every call it receives.
pub struct CountingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<Call>>,
}

impl CountingStore {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(id),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, operation: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn log(&self, operation: &'static str, records: &[Record]) {
        self.calls.lock().unwrap().push(Call {
            operation,
            records: records.to_vec(),
        });
    }
}

#[async_trait]
impl Store for CountingStore {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn load(
        &self,
        references: &[Record],
        request: &LoadRequest,
    ) -> StorageResult<Vec<Option<Record>>> {
        self.log("load", references);
        self.inner.load(references, request).await
    }

    async fn save(&self, records: &[Record], request: &SaveRequest) -> StorageResult<Vec<Record>> {
        self.log("save", records);
        self.inner.save(records, request).await
    }

    async fn delete(&self, references: &[Record], request: &DeleteRequest) -> StorageResult<()> {
        self.log("delete", references);
        self.inner.delete(references, request).await
    }

    async fn find(&self, query: &FindQuery, request: &FindRequest) -> StorageResult<Vec<Record>> {
        self.log("find", &[]);
        self.inner.find(query, request).await
    }
}

/// Hooks that append `"<hook> <entity>"` to a shared log.
#[derive(Default)]
pub struct HookLog(pub Mutex<Vec<String>>);

impl HookLog {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, hook: &str, entity: &EntityRef) {
        self.0.lock().unwrap().push(format!("{hook} {entity}"));
    }
}

#[async_trait]
impl EntityHooks for HookLog {
    async fn before_save(&self, entity: &EntityRef) -> anyhow::Result<()> {
        self.push("before_save", entity);
        Ok(())
    }

    async fn after_save(&self, entity: &EntityRef) -> anyhow::Result<()> {
        anyhow::ensure!(!entity.is_new(), "{entity} is still new after saving");
        self.push("after_save", entity);
        Ok(())
    }

    async fn before_delete(&self, entity: &EntityRef) -> anyhow::Result<()> {
        self.push("before_delete", entity);
        Ok(())
    }

    async fn after_delete(&self, entity: &EntityRef) -> anyhow::Result<()> {
        self.push("after_delete", entity);
        Ok(())
    }

    async fn after_load(&self, entity: &EntityRef) -> anyhow::Result<()> {
        self.push("after_load", entity);
        Ok(())
    }
}

/// `Movie {title, year, director -> Director, cast -> [Actor]}`.
pub fn movie_type(exposure: ExposureTable) -> EntityTypeRef {
    EntityType::document("Movie")
        .attribute("title", AttributeOptions::new())
        .attribute("year", AttributeOptions::new())
        .attribute("director", AttributeOptions::new())
        .attribute("cast", AttributeOptions::new())
        .exposure(exposure)
        .build()
        .unwrap()
}

/// `Director {name, favorite -> Movie}`.
pub fn director_type(exposure: ExposureTable) -> EntityTypeRef {
    EntityType::document("Director")
        .attribute("name", AttributeOptions::new())
        .attribute("favorite", AttributeOptions::new())
        .exposure(exposure)
        .build()
        .unwrap()
}

/// `Actor {name, agent -> Agent}`.
pub fn actor_type(exposure: ExposureTable) -> EntityTypeRef {
    EntityType::document("Actor")
        .attribute("name", AttributeOptions::new())
        .attribute("agent", AttributeOptions::new())
        .exposure(exposure)
        .build()
        .unwrap()
}

/// `Agent {name}`.
pub fn agent_type(exposure: ExposureTable) -> EntityTypeRef {
    EntityType::document("Agent")
        .attribute("name", AttributeOptions::new())
        .exposure(exposure)
        .build()
        .unwrap()
}

/// Registers every test type on `layer` with the given exposure.
pub fn register_all(layer: &Layer, exposure: ExposureTable) {
    layer.register(movie_type(exposure.clone())).unwrap();
    layer.register(director_type(exposure.clone())).unwrap();
    layer.register(actor_type(exposure.clone())).unwrap();
    layer.register(agent_type(exposure)).unwrap();
}

/// A layer with every test type bound to one counting store.
pub fn store_layer(name: &str) -> (Arc<Layer>, Arc<CountingStore>) {
    init_tracing();
    let layer = Arc::new(Layer::new(LayerConfig::named(name)));
    register_all(&layer, ExposureTable::full());
    let store = CountingStore::new("store");
    for type_name in ["Movie", "Director", "Actor", "Agent"] {
        layer.bind_store(type_name, store.clone()).unwrap();
    }
    (layer, store)
}

/// Writes records straight into the store, bypassing every layer.
pub async fn seed(store: &CountingStore, records: Vec<serde_json::Value>) {
    let records: Vec<Record> = records
        .into_iter()
        .map(|plain| {
            let mut record = Record::from_value(plain).unwrap();
            record.is_new = true;
            record
        })
        .collect();
    store
        .inner()
        .save(&records, &SaveRequest::default())
        .await
        .unwrap();
}

pub fn text(entity: &EntityRef, name: &str) -> String {
    entity
        .get(name)
        .unwrap()
        .as_str()
        .map(str::to_string)
        .unwrap_or_default()
}

pub fn reference(entity: &EntityRef, name: &str) -> EntityRef {
    match entity.get(name).unwrap() {
        Value::Entity(nested) => nested,
        other => panic!("{name} is not an entity: {other:?}"),
    }
}
