//! In-memory document store for integration tests
//!
//! Supports equality filters on top-level fields and `$set` / `$inc`
//! updates, which is all the components need.

#![allow(dead_code)]

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document as BsonDocument};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docflow_mongodb::{
    ClientFactory, ConnectionConfig, ConnectionRegistry, ConnectorError, DeleteSummary,
    DocumentStore, DynamicValue, Message, RegistryConfig, Result, ScriptEngine, UpdateSummary,
    Value,
};

/// Driver calls recorded by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    InsertOne(String),
    InsertMany(String, usize),
    Find(String, BsonDocument),
    Update {
        collection: String,
        filter: BsonDocument,
        update: BsonDocument,
        many: bool,
        upsert: bool,
    },
    Delete(String, BsonDocument, bool),
    Count(String, BsonDocument),
}

#[derive(Default)]
pub struct MemoryState {
    collections: Mutex<HashMap<(String, String), Vec<BsonDocument>>>,
    calls: Mutex<Vec<Call>>,
    closed: AtomicUsize,
}

impl MemoryState {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn documents(&self, database: &str, collection: &str) -> Vec<BsonDocument> {
        self.collections
            .lock()
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed(&self, database: &str, collection: &str, documents: Vec<BsonDocument>) {
        self.collections
            .lock()
            .entry((database.to_string(), collection.to_string()))
            .or_default()
            .extend(documents);
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<MemoryState>,
}

fn matches(document: &BsonDocument, filter: &BsonDocument) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

fn apply_update(document: &mut BsonDocument, update: &BsonDocument) -> Result<()> {
    for (operator, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(ConnectorError::Update(format!("bad operand for {}", operator)));
        };
        match operator.as_str() {
            "$set" => {
                for (key, value) in fields {
                    document.insert(key.clone(), value.clone());
                }
            }
            "$inc" => {
                for (key, value) in fields {
                    let current = document.get_i32(key).unwrap_or(0);
                    let delta = value.as_i32().unwrap_or(0);
                    document.insert(key.clone(), current + delta);
                }
            }
            other => {
                return Err(ConnectorError::Update(format!("unknown operator {}", other)));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        mut document: BsonDocument,
    ) -> Result<Bson> {
        self.state.record(Call::InsertOne(collection.to_string()));
        let id = document
            .get("_id")
            .cloned()
            .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
        document.insert("_id", id.clone());
        self.state.seed(database, collection, vec![document]);
        Ok(id)
    }

    async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<BsonDocument>,
    ) -> Result<Vec<Bson>> {
        self.state
            .record(Call::InsertMany(collection.to_string(), documents.len()));
        let mut ids = Vec::with_capacity(documents.len());
        let mut stored = Vec::with_capacity(documents.len());
        for mut document in documents {
            let id = document
                .get("_id")
                .cloned()
                .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
            document.insert("_id", id.clone());
            ids.push(id);
            stored.push(document);
        }
        self.state.seed(database, collection, stored);
        Ok(ids)
    }

    async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: BsonDocument,
    ) -> Result<Vec<BsonDocument>> {
        self.state
            .record(Call::Find(collection.to_string(), filter.clone()));
        Ok(self
            .state
            .documents(database, collection)
            .into_iter()
            .filter(|document| matches(document, &filter))
            .collect())
    }

    async fn update(
        &self,
        database: &str,
        collection: &str,
        filter: BsonDocument,
        update: BsonDocument,
        many: bool,
        upsert: bool,
    ) -> Result<UpdateSummary> {
        self.state.record(Call::Update {
            collection: collection.to_string(),
            filter: filter.clone(),
            update: update.clone(),
            many,
            upsert,
        });

        let mut collections = self.state.collections.lock();
        let documents = collections
            .entry((database.to_string(), collection.to_string()))
            .or_default();

        let mut matched = 0;
        for document in documents.iter_mut().filter(|d| matches(d, &filter)) {
            apply_update(document, &update)?;
            matched += 1;
            if !many {
                break;
            }
        }

        let mut upserted_id = None;
        if matched == 0 && upsert {
            let id = Bson::ObjectId(ObjectId::new());
            let mut document = filter.clone();
            apply_update(&mut document, &update)?;
            document.insert("_id", id.clone());
            documents.push(document);
            upserted_id = Some(id);
        }

        Ok(UpdateSummary {
            matched_count: matched,
            modified_count: matched,
            upserted_id,
            acknowledged: true,
        })
    }

    async fn delete(
        &self,
        database: &str,
        collection: &str,
        filter: BsonDocument,
        many: bool,
    ) -> Result<DeleteSummary> {
        self.state
            .record(Call::Delete(collection.to_string(), filter.clone(), many));

        let mut collections = self.state.collections.lock();
        let documents = collections
            .entry((database.to_string(), collection.to_string()))
            .or_default();

        let mut deleted = 0;
        documents.retain(|document| {
            let remove = matches(document, &filter) && (many || deleted == 0);
            if remove {
                deleted += 1;
            }
            !remove
        });

        Ok(DeleteSummary {
            deleted_count: deleted,
            acknowledged: true,
        })
    }

    async fn count(&self, database: &str, collection: &str, filter: BsonDocument) -> Result<u64> {
        self.state
            .record(Call::Count(collection.to_string(), filter.clone()));
        Ok(self
            .state
            .documents(database, collection)
            .iter()
            .filter(|document| matches(document, &filter))
            .count() as u64)
    }

    async fn ping(&self, _database: &str) -> Result<()> {
        Ok(())
    }

    async fn close(self) {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out clients over one shared [`MemoryState`]
#[derive(Clone, Default)]
pub struct MemoryFactory {
    pub state: Arc<MemoryState>,
    created: Arc<AtomicUsize>,
}

impl MemoryFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MemoryFactory {
    type Client = MemoryStore;

    async fn create(&self, _config: &ConnectionConfig) -> Result<MemoryStore> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryStore {
            state: self.state.clone(),
        })
    }
}

pub fn registry() -> (Arc<ConnectionRegistry<MemoryFactory>>, MemoryFactory) {
    let factory = MemoryFactory::default();
    let registry = ConnectionRegistry::new(factory.clone(), RegistryConfig::default());
    (Arc::new(registry), factory)
}

pub fn connection(id: &str) -> Arc<ConnectionConfig> {
    Arc::new(ConnectionConfig::new(id, "mongodb://localhost:27017", "test"))
}

/// Script engine for tests.
///
/// `#[payload]` yields the message payload, `#[null]` yields nothing,
/// any other expression yields itself as text.
pub fn engine() -> Arc<dyn ScriptEngine> {
    Arc::new(|value: &DynamicValue, message: &Message| -> Result<Option<Value>> {
        match value.expression() {
            Some("#[payload]") => Ok(Some(message.payload().clone())),
            Some("#[null]") | None => Ok(None),
            Some(expression) => Ok(Some(Value::from(expression))),
        }
    })
}
