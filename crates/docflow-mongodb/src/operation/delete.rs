use async_trait::async_trait;
use bson::Document as BsonDocument;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{base_attributes, evaluate_required, Binding, Operation};
use crate::client::{ClientFactory, DocumentStore, MongoClientFactory};
use crate::coerce::coerce_one;
use crate::config::ConnectionConfig;
use crate::evaluator::{DynamicValue, Message, ScriptEngine};
use crate::registry::ConnectionRegistry;
use crate::{ConnectorError, Result};

/// Deletes the first, or every, document matching a filter
pub struct Delete<F: ClientFactory = MongoClientFactory> {
    binding: Binding<F>,
    engine: Arc<dyn ScriptEngine>,
    filter: DynamicValue,
    many: bool,
}

/// Result of a [`Delete`]
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub collection: String,
    pub filter: BsonDocument,
    pub deleted_count: u64,
    pub acknowledged: bool,
}

impl DeleteOutcome {
    pub fn attributes(&self) -> BsonDocument {
        let mut attributes = base_attributes("Delete", &self.collection);
        attributes.insert("query", self.filter.to_string());
        attributes.insert("deletedCount", self.deleted_count as i64);
        attributes.insert("acknowledged", self.acknowledged);
        attributes
    }
}

impl<F: ClientFactory> Delete<F> {
    pub fn new(
        registry: Arc<ConnectionRegistry<F>>,
        connection: Arc<ConnectionConfig>,
        collection: impl Into<String>,
        engine: Arc<dyn ScriptEngine>,
    ) -> Self {
        Self {
            binding: Binding::new(registry, connection, collection),
            engine,
            filter: DynamicValue::none(),
            many: false,
        }
    }

    /// Filter selecting documents. Blank means the message payload.
    pub fn filter(mut self, filter: DynamicValue) -> Self {
        self.filter = filter;
        self
    }

    /// Delete every matching document instead of the first
    pub fn many(mut self, many: bool) -> Self {
        self.many = many;
        self
    }

    pub fn binding(&self) -> &Binding<F> {
        &self.binding
    }
}

#[async_trait]
impl<F: ClientFactory> Operation for Delete<F> {
    type Output = DeleteOutcome;

    async fn initialize(&mut self) -> Result<()> {
        self.binding.initialize().await
    }

    #[instrument(skip(self, message), fields(collection = %self.binding.collection(), many = self.many))]
    async fn apply(&self, message: &Message) -> Result<DeleteOutcome> {
        let client = self.binding.client()?;
        let filter = evaluate_required(&*self.engine, &self.filter, message, || {
            ConnectorError::Delete(format!(
                "The Delete filter was null. I cannot execute Delete operation with a null \
                 filter (DynamicValue=[{}]).",
                self.filter
            ))
        })?;
        let filter = coerce_one(&filter).map_err(ConnectorError::Filter)?;

        let summary = client
            .delete(
                self.binding.database(),
                self.binding.collection(),
                filter.clone(),
                self.many,
            )
            .await?;

        debug!(deleted = summary.deleted_count, "Deleted documents");
        Ok(DeleteOutcome {
            collection: self.binding.collection().to_string(),
            filter,
            deleted_count: summary.deleted_count,
            acknowledged: summary.acknowledged,
        })
    }

    async fn dispose(&mut self) {
        self.binding.dispose().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_outcome_attributes() {
        let outcome = DeleteOutcome {
            collection: "users".to_string(),
            filter: doc! { "name": "Mark" },
            deleted_count: 3,
            acknowledged: true,
        };

        let attributes = outcome.attributes();
        assert_eq!(attributes.get_str("componentName").unwrap(), "Delete");
        assert_eq!(attributes.get_i64("deletedCount").unwrap(), 3);
        assert!(attributes.get_bool("acknowledged").unwrap());
    }
}
