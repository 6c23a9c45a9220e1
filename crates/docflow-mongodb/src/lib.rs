//! MongoDB connector core for docflow
//!
//! This crate lets integration flows read and write MongoDB collections.
//!
//! # Features
//! - Shared connection registry: one client per connection id, reference
//!   counted by the components using it
//! - Document coercion from JSON text, maps, pairs, tabular rows and lists
//! - Insert, Find, Update, Delete and Count components with a common
//!   initialize / apply / dispose lifecycle
//! - Generated ObjectIds exposed as hex strings

pub mod client;
pub mod coerce;
pub mod config;
pub mod evaluator;
pub mod json;
pub mod object_id;
pub mod operation;
pub mod registry;
pub mod validation;
pub mod value;

pub use client::{
    ClientFactory, DeleteSummary, DocumentStore, MongoClientFactory, MongoStore, PoolConfig,
    UpdateSummary,
};
pub use coerce::{coerce, coerce_one, to_bson, Documents, Shape};
pub use config::{ConnectionConfig, RegistryConfig};
pub use docflow_common::{ConnectorError, DocumentError, Result};
pub use evaluator::{evaluate_or_payload, DynamicValue, Message, ScriptEngine};
pub use json::parse_document;
pub use object_id::{render_document_id, render_id, OBJECT_ID_PROPERTY};
pub use operation::{
    Binding, Count, CountOutcome, Delete, DeleteOutcome, Find, FindOutcome, Insert, InsertOutcome,
    Operation, Update, UpdateOutcome,
};
pub use registry::{ConnectionRegistry, ConsumerId};
pub use validation::ValidatedCollectionName;
pub use value::{DataRow, Value};
