use async_trait::async_trait;
use bson::{doc, Bson, Document as BsonDocument};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{base_attributes, evaluate_required, Binding, Operation};
use crate::client::{ClientFactory, DocumentStore, MongoClientFactory};
use crate::coerce::coerce_one;
use crate::config::ConnectionConfig;
use crate::evaluator::{DynamicValue, Message, ScriptEngine};
use crate::object_id::render_id;
use crate::registry::ConnectionRegistry;
use crate::{ConnectorError, Result};

/// Updates the first, or every, document matching a filter
pub struct Update<F: ClientFactory = MongoClientFactory> {
    binding: Binding<F>,
    engine: Arc<dyn ScriptEngine>,
    filter: DynamicValue,
    document: DynamicValue,
    many: bool,
    upsert: bool,
}

/// Result of an [`Update`]
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub collection: String,
    pub filter: BsonDocument,
    /// Update document sent to the server
    pub update: BsonDocument,
    pub matched_count: u64,
    pub modified_count: u64,
    /// Identifier of an upserted document, rendered as hex when generated
    pub upserted_id: Option<Bson>,
    pub acknowledged: bool,
}

impl UpdateOutcome {
    pub fn attributes(&self) -> BsonDocument {
        let mut attributes = base_attributes("Update", &self.collection);
        attributes.insert("filter", self.filter.to_string());
        attributes.insert("update", self.update.to_string());
        attributes.insert("matchedCount", self.matched_count as i64);
        attributes.insert("modifiedCount", self.modified_count as i64);
        attributes.insert(
            "upsertedId",
            self.upserted_id.clone().unwrap_or(Bson::Null),
        );
        attributes.insert("acknowledged", self.acknowledged);
        attributes
    }
}

impl<F: ClientFactory> Update<F> {
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
            document: DynamicValue::none(),
            many: false,
            upsert: false,
        }
    }

    /// Filter selecting documents. Blank means the message payload.
    pub fn filter(mut self, filter: DynamicValue) -> Self {
        self.filter = filter;
        self
    }

    /// Update to apply. Blank means the message payload.
    pub fn document(mut self, document: DynamicValue) -> Self {
        self.document = document;
        self
    }

    /// Update every matching document instead of the first
    pub fn many(mut self, many: bool) -> Self {
        self.many = many;
        self
    }

    /// Insert when nothing matches
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn binding(&self) -> &Binding<F> {
        &self.binding
    }
}

/// Wrap a plain replacement document in `$set`.
///
/// Documents whose first key is an update operator are sent unchanged.
pub(crate) fn as_update_document(document: BsonDocument) -> BsonDocument {
    let has_operator = document.keys().next().is_some_and(|key| key.starts_with('$'));
    if has_operator {
        document
    } else {
        doc! { "$set": document }
    }
}

#[async_trait]
impl<F: ClientFactory> Operation for Update<F> {
    type Output = UpdateOutcome;

    async fn initialize(&mut self) -> Result<()> {
        self.binding.initialize().await
    }

    #[instrument(
        skip(self, message),
        fields(collection = %self.binding.collection(), many = self.many, upsert = self.upsert)
    )]
    async fn apply(&self, message: &Message) -> Result<UpdateOutcome> {
        let client = self.binding.client()?;

        let filter = evaluate_required(&*self.engine, &self.filter, message, || {
            ConnectorError::Update(format!(
                "The Update filter was null. I cannot execute Update operation with a null \
                 filter (DynamicValue=[{}]).",
                self.filter
            ))
        })?;
        let filter = coerce_one(&filter).map_err(ConnectorError::Filter)?;

        let document = evaluate_required(&*self.engine, &self.document, message, || {
            ConnectorError::Update(format!(
                "The updated document was null. Null documents cannot be updated into MongoDB, \
                 did you mean to update with an empty document ({{}}) ? (DynamicValue=[{}]).",
                self.document
            ))
        })?;
        let update = as_update_document(coerce_one(&document).map_err(ConnectorError::Document)?);

        let summary = client
            .update(
                self.binding.database(),
                self.binding.collection(),
                filter.clone(),
                update.clone(),
                self.many,
                self.upsert,
            )
            .await?;

        debug!(
            matched = summary.matched_count,
            modified = summary.modified_count,
            "Updated documents"
        );
        Ok(UpdateOutcome {
            collection: self.binding.collection().to_string(),
            filter,
            update,
            matched_count: summary.matched_count,
            modified_count: summary.modified_count,
            upserted_id: summary.upserted_id.map(render_id),
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
    use bson::oid::ObjectId;

    #[test]
    fn test_plain_document_wrapped_in_set() {
        let update = as_update_document(doc! { "age": 44 });
        assert_eq!(update, doc! { "$set": { "age": 44 } });
    }

    #[test]
    fn test_operator_document_unchanged() {
        let update = as_update_document(doc! { "$inc": { "age": 1 } });
        assert_eq!(update, doc! { "$inc": { "age": 1 } });
    }

    #[test]
    fn test_empty_document_wrapped() {
        let update = as_update_document(BsonDocument::new());
        assert_eq!(update, doc! { "$set": {} });
    }

    #[test]
    fn test_outcome_attributes() {
        let oid = ObjectId::new();
        let outcome = UpdateOutcome {
            collection: "users".to_string(),
            filter: doc! { "name": "Mark" },
            update: doc! { "$set": { "age": 44 } },
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(render_id(Bson::ObjectId(oid))),
            acknowledged: true,
        };

        let attributes = outcome.attributes();
        assert_eq!(attributes.get_str("componentName").unwrap(), "Update");
        assert_eq!(attributes.get_i64("matchedCount").unwrap(), 0);
        assert_eq!(attributes.get_str("upsertedId").unwrap(), oid.to_hex());
        assert!(attributes.get_bool("acknowledged").unwrap());
    }
}
