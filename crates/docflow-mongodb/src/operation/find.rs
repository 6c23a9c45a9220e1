use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{base_attributes, evaluate_query, Binding, Operation};
use crate::client::{ClientFactory, DocumentStore, MongoClientFactory};
use crate::coerce::coerce_one;
use crate::config::ConnectionConfig;
use crate::evaluator::{DynamicValue, Message, ScriptEngine};
use crate::object_id::render_document_id;
use crate::registry::ConnectionRegistry;
use crate::{ConnectorError, Result};

/// Returns every document matching a query
pub struct Find<F: ClientFactory = MongoClientFactory> {
    binding: Binding<F>,
    engine: Arc<dyn ScriptEngine>,
    query: DynamicValue,
}

/// Result of a [`Find`]
#[derive(Debug, Clone, PartialEq)]
pub struct FindOutcome {
    pub collection: String,
    /// Query that was run; empty when matching all documents
    pub query: BsonDocument,
    /// Matching documents with generated `_id`s rendered as hex
    pub documents: Vec<BsonDocument>,
}

impl FindOutcome {
    pub fn attributes(&self) -> BsonDocument {
        let mut attributes = base_attributes("Find", &self.collection);
        attributes.insert("query", self.query.to_string());
        attributes.insert(
            "documents",
            self.documents
                .iter()
                .cloned()
                .map(Bson::Document)
                .collect::<Vec<_>>(),
        );
        attributes
    }
}

impl<F: ClientFactory> Find<F> {
    pub fn new(
        registry: Arc<ConnectionRegistry<F>>,
        connection: Arc<ConnectionConfig>,
        collection: impl Into<String>,
        engine: Arc<dyn ScriptEngine>,
    ) -> Self {
        Self {
            binding: Binding::new(registry, connection, collection),
            engine,
            query: DynamicValue::none(),
        }
    }

    /// Query to run. Blank matches every document.
    pub fn query(mut self, query: DynamicValue) -> Self {
        self.query = query;
        self
    }

    pub fn binding(&self) -> &Binding<F> {
        &self.binding
    }
}

#[async_trait]
impl<F: ClientFactory> Operation for Find<F> {
    type Output = FindOutcome;

    async fn initialize(&mut self) -> Result<()> {
        self.binding.initialize().await
    }

    #[instrument(skip(self, message), fields(collection = %self.binding.collection()))]
    async fn apply(&self, message: &Message) -> Result<FindOutcome> {
        let client = self.binding.client()?;
        let query = match evaluate_query(&*self.engine, &self.query, message, || {
            ConnectorError::Find(format!(
                "The Find filter was null. I cannot execute find operation with a null filter \
                 (DynamicValue=[{}]).",
                self.query
            ))
        })? {
            Some(value) => coerce_one(&value).map_err(ConnectorError::Filter)?,
            None => BsonDocument::new(),
        };

        let mut documents = client
            .find(self.binding.database(), self.binding.collection(), query.clone())
            .await?;
        documents.iter_mut().for_each(render_document_id);

        debug!(count = documents.len(), "Found documents");
        Ok(FindOutcome {
            collection: self.binding.collection().to_string(),
            query,
            documents,
        })
    }

    async fn dispose(&mut self) {
        self.binding.dispose().await
    }
}
