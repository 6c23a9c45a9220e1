//! Operation components: Insert, Find, Update, Delete and Count
//!
//! Every component follows the same lifecycle:
//! - `initialize` validates its collection and acquires a client from the
//!   shared [`ConnectionRegistry`];
//! - `apply` evaluates its dynamic properties, coerces them into documents
//!   and issues exactly one driver call;
//! - `dispose` releases its consumer token. Calling it twice is harmless.
//!
//! `apply` takes `&self`, so one initialized component can serve concurrent
//! messages behind an `Arc`.

mod count;
mod delete;
mod find;
mod insert;
mod update;

pub use count::{Count, CountOutcome};
pub use delete::{Delete, DeleteOutcome};
pub use find::{Find, FindOutcome};
pub use insert::{Insert, InsertOutcome};
pub use update::{Update, UpdateOutcome};

use async_trait::async_trait;
use bson::{doc, Document as BsonDocument};
use std::sync::Arc;

use crate::client::{ClientFactory, MongoClientFactory};
use crate::config::ConnectionConfig;
use crate::evaluator::{evaluate_or_payload, DynamicValue, Message, ScriptEngine};
use crate::registry::{ConnectionRegistry, ConsumerId};
use crate::validation::ValidatedCollectionName;
use crate::value::Value;
use crate::{ConnectorError, Result};

/// Lifecycle shared by all operation components
#[async_trait]
pub trait Operation: Send + Sync {
    type Output: Send;

    /// Validate configuration and acquire the shared client
    async fn initialize(&mut self) -> Result<()>;

    /// Process one message
    async fn apply(&self, message: &Message) -> Result<Self::Output>;

    /// Release the shared client
    async fn dispose(&mut self);
}

/// A component's attachment to the connection registry
pub struct Binding<F: ClientFactory = MongoClientFactory> {
    registry: Arc<ConnectionRegistry<F>>,
    connection: Arc<ConnectionConfig>,
    collection: String,
    consumer: ConsumerId,
    client: Option<F::Client>,
}

impl<F: ClientFactory> Binding<F> {
    pub fn new(
        registry: Arc<ConnectionRegistry<F>>,
        connection: Arc<ConnectionConfig>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            connection,
            collection: collection.into(),
            consumer: ConsumerId::new(),
            client: None,
        }
    }

    /// Acquire the client. A second call while initialized does nothing.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }
        ValidatedCollectionName::new(&self.collection)?;
        let client = self.registry.acquire(self.consumer, &self.connection).await?;
        self.client = Some(client);
        Ok(())
    }

    pub async fn dispose(&mut self) {
        if self.client.take().is_some() {
            self.registry.release(self.consumer, &self.connection).await;
        }
    }

    pub fn client(&self) -> Result<&F::Client> {
        self.client.as_ref().ok_or_else(|| {
            ConnectorError::Internal(format!(
                "component for collection '{}' used before initialize",
                self.collection
            ))
        })
    }

    pub fn consumer(&self) -> ConsumerId {
        self.consumer
    }

    pub fn database(&self) -> &str {
        self.connection.database()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

/// Evaluate a property that must produce a value, falling back to the
/// payload when blank. A null result is reported with `on_null`.
pub(crate) fn evaluate_required(
    engine: &dyn ScriptEngine,
    value: &DynamicValue,
    message: &Message,
    on_null: impl FnOnce() -> ConnectorError,
) -> Result<Value> {
    match evaluate_or_payload(engine, value, message)? {
        Some(evaluated) if !evaluated.is_null() => Ok(evaluated),
        _ => Err(on_null()),
    }
}

/// Evaluate an optional query. A blank property means "match all" and
/// yields `Ok(None)`; a configured expression producing null is an error.
pub(crate) fn evaluate_query(
    engine: &dyn ScriptEngine,
    value: &DynamicValue,
    message: &Message,
    on_null: impl FnOnce() -> ConnectorError,
) -> Result<Option<Value>> {
    if value.is_blank() {
        return Ok(None);
    }
    match engine.evaluate(value, message)? {
        Some(evaluated) if !evaluated.is_null() => Ok(Some(evaluated)),
        _ => Err(on_null()),
    }
}

/// Attribute document every outcome starts from
pub(crate) fn base_attributes(component: &str, collection: &str) -> BsonDocument {
    doc! {
        "componentName": component,
        "collection": collection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(value: &DynamicValue, _message: &Message) -> Result<Option<Value>> {
        Ok(value.expression().map(Value::from))
    }

    fn nothing(_: &DynamicValue, _: &Message) -> Result<Option<Value>> {
        Ok(None)
    }

    fn null_error() -> ConnectorError {
        ConnectorError::Insert("null".to_string())
    }

    #[test]
    fn test_required_uses_payload_when_blank() {
        let message = Message::new(Value::pair("name", "Mark"));
        let value = evaluate_required(&literal, &DynamicValue::none(), &message, null_error).unwrap();
        assert_eq!(value, Value::pair("name", "Mark"));
    }

    #[test]
    fn test_required_rejects_null_payload() {
        let err = evaluate_required(&literal, &DynamicValue::none(), &Message::empty(), null_error)
            .unwrap_err();
        assert_eq!(err, null_error());
    }

    #[test]
    fn test_required_rejects_absent_result() {
        let err = evaluate_required(&nothing, &DynamicValue::new("#[x]"), &Message::empty(), null_error)
            .unwrap_err();
        assert_eq!(err, null_error());
    }

    #[test]
    fn test_query_blank_matches_all() {
        let message = Message::new("{name: 'ignored'}");
        let query = evaluate_query(&literal, &DynamicValue::none(), &message, null_error).unwrap();
        assert!(query.is_none());
    }

    #[test]
    fn test_query_null_is_error() {
        let err = evaluate_query(&nothing, &DynamicValue::new("#[x]"), &Message::empty(), null_error)
            .unwrap_err();
        assert_eq!(err, null_error());
    }

    #[test]
    fn test_base_attributes() {
        let attributes = base_attributes("Count", "orders");
        assert_eq!(attributes.get_str("componentName").unwrap(), "Count");
        assert_eq!(attributes.get_str("collection").unwrap(), "orders");
    }
}
