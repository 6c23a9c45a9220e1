//! Value to document coercion
//!
//! Every evaluated value an operation component receives goes through
//! [`coerce`] before it reaches the driver. The runtime shape of the value is
//! classified once by [`Shape::of`], in a fixed precedence order:
//!
//! 1. JSON text
//! 2. key/value map
//! 3. two-element pair
//! 4. tabular row
//! 5. list of any of the above
//!
//! Anything else is rejected with [`DocumentError::Unsupported`]. Coercion
//! never mutates its input and a failure on any list element aborts the
//! whole batch.

use bson::{Binary, Bson, Document as BsonDocument};
use bson::spec::BinarySubtype;

use crate::json::parse_document;
use crate::value::{DataRow, Value};
use crate::DocumentError;

/// Runtime shape of an evaluated value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape<'a> {
    JsonText(&'a str),
    Mapping(&'a [(Value, Value)]),
    Pair(&'a Value, &'a Value),
    Row(&'a DataRow),
    List(&'a [Value]),
    Unsupported(&'static str),
}

impl<'a> Shape<'a> {
    /// Classify a value. First match wins.
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::String(text) => Shape::JsonText(text),
            Value::Map(entries) => Shape::Mapping(entries),
            Value::Pair(left, right) => Shape::Pair(left, right),
            Value::Row(row) => Shape::Row(row),
            Value::List(items) => Shape::List(items),
            other => Shape::Unsupported(other.type_name()),
        }
    }
}

/// Result of a coercion: one document, or one per list element
#[derive(Debug, Clone, PartialEq)]
pub enum Documents {
    One(BsonDocument),
    Many(Vec<BsonDocument>),
}

impl Documents {
    /// Number of documents produced
    pub fn len(&self) -> usize {
        match self {
            Documents::One(_) => 1,
            Documents::Many(docs) => docs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a list, in order
    pub fn into_vec(self) -> Vec<BsonDocument> {
        match self {
            Documents::One(doc) => vec![doc],
            Documents::Many(docs) => docs,
        }
    }
}

/// Convert an evaluated value into one or more documents.
///
/// # Errors
/// - `MalformedJson` if JSON text does not parse to an object
/// - `MapKeyNotString` if any map key (at any depth) is not a string
/// - `PairKeyNotString` if a pair's left element is not a string
/// - `Unsupported` for any other shape, including a list nested in a list
pub fn coerce(value: &Value) -> Result<Documents, DocumentError> {
    match Shape::of(value) {
        Shape::List(items) => items
            .iter()
            .map(coerce_single)
            .collect::<Result<Vec<_>, _>>()
            .map(Documents::Many),
        _ => coerce_single(value).map(Documents::One),
    }
}

/// Convert an evaluated value into exactly one document.
///
/// Used for filters and update documents, where a list has no meaning.
pub fn coerce_one(value: &Value) -> Result<BsonDocument, DocumentError> {
    coerce_single(value)
}

fn coerce_single(value: &Value) -> Result<BsonDocument, DocumentError> {
    match Shape::of(value) {
        Shape::JsonText(text) => parse_document(text),
        Shape::Mapping(entries) => map_to_document(entries),
        Shape::Pair(left, right) => {
            let Value::String(key) = left else {
                return Err(DocumentError::PairKeyNotString {
                    found: left.type_name().to_string(),
                });
            };
            let mut doc = BsonDocument::new();
            doc.insert(key.clone(), to_bson(right)?);
            Ok(doc)
        }
        Shape::Row(row) => row_to_document(row),
        Shape::List(_) => Err(unsupported(value)),
        Shape::Unsupported(type_name) => Err(DocumentError::Unsupported {
            type_name: type_name.to_string(),
        }),
    }
}

fn map_to_document(entries: &[(Value, Value)]) -> Result<BsonDocument, DocumentError> {
    // Reject the whole map before converting anything
    if let Some((key, _)) = entries.iter().find(|(k, _)| !matches!(k, Value::String(_))) {
        return Err(DocumentError::MapKeyNotString {
            found: key.type_name().to_string(),
        });
    }

    let mut doc = BsonDocument::new();
    for (key, value) in entries {
        if let Value::String(key) = key {
            doc.insert(key.clone(), to_bson(value)?);
        }
    }
    Ok(doc)
}

fn row_to_document(row: &DataRow) -> Result<BsonDocument, DocumentError> {
    let mut doc = BsonDocument::new();
    for (column, value) in row.columns() {
        doc.insert(column, to_bson(value)?);
    }
    Ok(doc)
}

/// Convert a value nested inside a document into BSON.
///
/// Strings stay strings here; only a top-level string is parsed as JSON.
pub fn to_bson(value: &Value) -> Result<Bson, DocumentError> {
    let bson = match value {
        Value::Null => Bson::Null,
        Value::Boolean(b) => Bson::Boolean(*b),
        Value::Integer(i) => Bson::Int32(*i),
        Value::Long(i) => Bson::Int64(*i),
        Value::Double(f) => Bson::Double(*f),
        Value::String(s) => Bson::String(s.clone()),
        Value::DateTime(dt) => Bson::DateTime(bson::DateTime::from_chrono(*dt)),
        Value::Bytes(bytes) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.clone(),
        }),
        Value::ObjectId(id) => Bson::ObjectId(*id),
        Value::Map(entries) => Bson::Document(map_to_document(entries)?),
        Value::Pair(_, _) => Bson::Document(coerce_single(value)?),
        Value::Row(row) => Bson::Document(row_to_document(row)?),
        Value::List(items) => Bson::Array(
            items
                .iter()
                .map(to_bson)
                .collect::<Result<Vec<_>, DocumentError>>()?,
        ),
    };
    Ok(bson)
}

fn unsupported(value: &Value) -> DocumentError {
    DocumentError::Unsupported {
        type_name: value.type_name().to_string(),
    }
}
