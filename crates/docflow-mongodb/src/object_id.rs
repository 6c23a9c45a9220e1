//! Identifier rendering at the component boundary
//!
//! Generated `ObjectId`s are exposed to flows as their 24-character hex
//! string. Identifiers supplied by the caller (any other type) pass through
//! untouched.

use bson::{Bson, Document as BsonDocument};

/// Name of the document identifier field
pub const OBJECT_ID_PROPERTY: &str = "_id";

/// Render an identifier value
pub fn render_id(id: Bson) -> Bson {
    match id {
        Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
        other => other,
    }
}

/// Render the `_id` entry of a document in place, if present
pub fn render_document_id(document: &mut BsonDocument) {
    if let Some(Bson::ObjectId(oid)) = document.get(OBJECT_ID_PROPERTY) {
        let hex = oid.to_hex();
        document.insert(OBJECT_ID_PROPERTY, hex);
    }
}
