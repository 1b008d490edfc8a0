//! SQLite-backed store.
//!
//! Every record is one row of the `records` table, keyed by type and
//! identifier, with its attributes kept as a JSON object. Filtering,
//! sorting and projection run in Rust over the rows of the queried type.

use crate::error::{StorageError, StorageResult};
use crate::query;
use crate::store::Store;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use stratum_types::{
    DeleteRequest, EntityId, FindQuery, FindRequest, LoadRequest, Record, SaveRequest,
};
use tracing::{debug, info};

/// Persistent store backed by a single SQLite database.
pub struct SqliteStore {
    id: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened sqlite store");
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            id: "sqlite".to_string(),
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Replaces the identifier reported by [`Store::id`].
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    fn init_schema(&self) -> StorageResult<()> {
        self.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                entity_type TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (entity_type, id)
            );
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn select(conn: &Connection, entity_type: &str, id: &EntityId) -> StorageResult<Option<Record>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM records WHERE entity_type = ?1 AND id = ?2",
            params![entity_type, id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    data.map(|data| to_record(entity_type, id.as_str(), &data))
        .transpose()
}

fn to_record(entity_type: &str, id: &str, data: &str) -> StorageResult<Record> {
    let id = EntityId::parse(id).map_err(|e| StorageError::InvalidData(e.to_string()))?;
    let attributes: Map<String, Value> = serde_json::from_str(data)?;
    Ok(Record {
        attributes,
        ..Record::new(entity_type, id)
    })
}

#[async_trait]
impl Store for SqliteStore {
    fn id(&self) -> &str {
        &self.id
    }

    async fn load(
        &self,
        references: &[Record],
        request: &LoadRequest,
    ) -> StorageResult<Vec<Option<Record>>> {
        let conn = self.lock();
        let mut loaded = Vec::with_capacity(references.len());
        for reference in references {
            match select(&conn, &reference.entity_type, &reference.id)? {
                Some(record) => loaded.push(Some(query::project(&record, &request.fields))),
                None if request.throw_if_not_found => {
                    return Err(StorageError::not_found(
                        &reference.entity_type,
                        reference.id.as_str(),
                    ));
                }
                None => loaded.push(None),
            }
        }
        debug!(store = %self.id, count = loaded.len(), "loaded records");
        Ok(loaded)
    }

    async fn save(&self, records: &[Record], request: &SaveRequest) -> StorageResult<Vec<Record>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut saved = Vec::with_capacity(records.len());
        for record in records {
            let existing = select(&tx, &record.entity_type, &record.id)?;
            if record.is_new && existing.is_some() && request.throw_if_already_exists {
                return Err(StorageError::already_exists(&record.entity_type, record.id.as_str()));
            }
            if !record.is_new && existing.is_none() && request.throw_if_not_found {
                return Err(StorageError::not_found(&record.entity_type, record.id.as_str()));
            }
            let merged = query::merge(existing.as_ref(), record);
            tx.execute(
                "INSERT INTO records (entity_type, id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(entity_type, id) DO UPDATE SET data = excluded.data",
                params![
                    merged.entity_type,
                    merged.id.as_str(),
                    serde_json::to_string(&merged.attributes)?,
                ],
            )?;
            saved.push(merged);
        }
        tx.commit()?;
        debug!(store = %self.id, count = saved.len(), "saved records");
        Ok(saved)
    }

    async fn delete(&self, references: &[Record], request: &DeleteRequest) -> StorageResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for reference in references {
            let removed = tx.execute(
                "DELETE FROM records WHERE entity_type = ?1 AND id = ?2",
                params![reference.entity_type, reference.id.as_str()],
            )?;
            if removed == 0 && request.throw_if_not_found {
                return Err(StorageError::not_found(
                    &reference.entity_type,
                    reference.id.as_str(),
                ));
            }
        }
        tx.commit()?;
        debug!(store = %self.id, count = references.len(), "deleted records");
        Ok(())
    }

    async fn find(&self, query: &FindQuery, request: &FindRequest) -> StorageResult<Vec<Record>> {
        let candidates = {
            let conn = self.lock();
            let mut stmt =
                conn.prepare("SELECT id, data FROM records WHERE entity_type = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![query.entity_type], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut candidates = Vec::new();
            for row in rows {
                let (id, data) = row?;
                candidates.push(to_record(&query.entity_type, &id, &data)?);
            }
            candidates
        };
        Ok(query::find(candidates, query, request))
    }
}
