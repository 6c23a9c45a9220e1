use async_trait::async_trait;
use bson::Document as BsonDocument;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{base_attributes, evaluate_query, Binding, Operation};
use crate::client::{ClientFactory, DocumentStore, MongoClientFactory};
use crate::coerce::coerce_one;
use crate::config::ConnectionConfig;
use crate::evaluator::{DynamicValue, Message, ScriptEngine};
use crate::registry::ConnectionRegistry;
use crate::{ConnectorError, Result};

/// Counts documents matching a query
pub struct Count<F: ClientFactory = MongoClientFactory> {
    binding: Binding<F>,
    engine: Arc<dyn ScriptEngine>,
    query: DynamicValue,
}

/// Result of a [`Count`]
#[derive(Debug, Clone, PartialEq)]
pub struct CountOutcome {
    pub collection: String,
    pub query: BsonDocument,
    pub count: u64,
}

impl CountOutcome {
    pub fn attributes(&self) -> BsonDocument {
        let mut attributes = base_attributes("Count", &self.collection);
        attributes.insert("query", self.query.to_string());
        attributes.insert("count", self.count as i64);
        attributes
    }
}

impl<F: ClientFactory> Count<F> {
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

    /// Query to count. Blank counts every document.
    pub fn query(mut self, query: DynamicValue) -> Self {
        self.query = query;
        self
    }

    pub fn binding(&self) -> &Binding<F> {
        &self.binding
    }
}

#[async_trait]
impl<F: ClientFactory> Operation for Count<F> {
    type Output = CountOutcome;

    async fn initialize(&mut self) -> Result<()> {
        self.binding.initialize().await
    }

    #[instrument(skip(self, message), fields(collection = %self.binding.collection()))]
    async fn apply(&self, message: &Message) -> Result<CountOutcome> {
        let client = self.binding.client()?;
        let query = match evaluate_query(&*self.engine, &self.query, message, || {
            ConnectorError::Count(format!(
                "The Count filter was null. I cannot execute Count operation with a null filter \
                 (DynamicValue=[{}]).",
                self.query
            ))
        })? {
            Some(value) => coerce_one(&value).map_err(ConnectorError::Filter)?,
            None => BsonDocument::new(),
        };

        let count = client
            .count(self.binding.database(), self.binding.collection(), query.clone())
            .await?;

        debug!(count, "Counted documents");
        Ok(CountOutcome {
            collection: self.binding.collection().to_string(),
            query,
            count,
        })
    }

    async fn dispose(&mut self) {
        self.binding.dispose().await
    }
}
