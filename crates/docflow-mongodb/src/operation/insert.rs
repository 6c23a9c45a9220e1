use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{base_attributes, evaluate_required, Binding, Operation};
use crate::client::{ClientFactory, DocumentStore, MongoClientFactory};
use crate::coerce::{coerce, Documents};
use crate::config::ConnectionConfig;
use crate::evaluator::{DynamicValue, Message, ScriptEngine};
use crate::object_id::render_id;
use crate::registry::ConnectionRegistry;
use crate::{ConnectorError, Result};

/// Inserts one document, or one per element when the value is a list
pub struct Insert<F: ClientFactory = MongoClientFactory> {
    binding: Binding<F>,
    engine: Arc<dyn ScriptEngine>,
    document: DynamicValue,
}

/// Result of an [`Insert`]
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    pub collection: String,
    /// Identifiers in input order, generated ObjectIds rendered as hex
    pub inserted_ids: Vec<Bson>,
}

impl InsertOutcome {
    pub fn inserted_count(&self) -> usize {
        self.inserted_ids.len()
    }

    pub fn attributes(&self) -> BsonDocument {
        let mut attributes = base_attributes("Insert", &self.collection);
        attributes.insert("insertedCount", self.inserted_count() as i64);
        attributes.insert("insertedIds", self.inserted_ids.clone());
        attributes
    }
}

impl<F: ClientFactory> Insert<F> {
    pub fn new(
        registry: Arc<ConnectionRegistry<F>>,
        connection: Arc<ConnectionConfig>,
        collection: impl Into<String>,
        engine: Arc<dyn ScriptEngine>,
    ) -> Self {
        Self {
            binding: Binding::new(registry, connection, collection),
            engine,
            document: DynamicValue::none(),
        }
    }

    /// Document to insert. Blank means the message payload.
    pub fn document(mut self, document: DynamicValue) -> Self {
        self.document = document;
        self
    }

    pub fn binding(&self) -> &Binding<F> {
        &self.binding
    }

    fn null_document(&self) -> ConnectorError {
        ConnectorError::Insert(format!(
            "The document to insert was null. Null documents cannot be inserted into MongoDB, \
             did you mean to insert an empty document ({{}}) ? (DynamicValue=[{}]).",
            self.document
        ))
    }
}

#[async_trait]
impl<F: ClientFactory> Operation for Insert<F> {
    type Output = InsertOutcome;

    async fn initialize(&mut self) -> Result<()> {
        self.binding.initialize().await
    }

    #[instrument(skip(self, message), fields(collection = %self.binding.collection()))]
    async fn apply(&self, message: &Message) -> Result<InsertOutcome> {
        let client = self.binding.client()?;
        let value = evaluate_required(&*self.engine, &self.document, message, || {
            self.null_document()
        })?;
        let documents = coerce(&value).map_err(ConnectorError::Document)?;

        let database = self.binding.database();
        let collection = self.binding.collection();
        let inserted_ids = match documents {
            Documents::One(document) => {
                vec![client.insert_one(database, collection, document).await?]
            }
            // Nothing to send, the driver rejects empty batches
            Documents::Many(documents) if documents.is_empty() => Vec::new(),
            Documents::Many(documents) => {
                client.insert_many(database, collection, documents).await?
            }
        };

        debug!(count = inserted_ids.len(), "Inserted documents");
        Ok(InsertOutcome {
            collection: collection.to_string(),
            inserted_ids: inserted_ids.into_iter().map(render_id).collect(),
        })
    }

    async fn dispose(&mut self) {
        self.binding.dispose().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn test_outcome_attributes() {
        let oid = ObjectId::new();
        let outcome = InsertOutcome {
            collection: "users".to_string(),
            inserted_ids: vec![render_id(Bson::ObjectId(oid)), Bson::Int32(7)],
        };

        let attributes = outcome.attributes();
        assert_eq!(attributes.get_str("componentName").unwrap(), "Insert");
        assert_eq!(attributes.get_i64("insertedCount").unwrap(), 2);
        let ids = attributes.get_array("insertedIds").unwrap();
        assert_eq!(ids[0], Bson::String(oid.to_hex()));
        assert_eq!(ids[1], Bson::Int32(7));
    }
}
