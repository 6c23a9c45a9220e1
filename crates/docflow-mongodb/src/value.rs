//! Evaluated values handed over by the script engine
//!
//! `Value` is the closed set of runtime shapes a dynamic property can evaluate
//! to. Maps keep their entries in insertion order and may carry keys of any
//! type; it is the coercer's job to reject the ones that cannot become a
//! document.

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};

/// A loosely-typed evaluated value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Bytes(Vec<u8>),
    ObjectId(ObjectId),
    /// Ordered key/value entries
    Map(Vec<(Value, Value)>),
    /// Two-element pair, left is the key
    Pair(Box<Value>, Box<Value>),
    Row(DataRow),
    List(Vec<Value>),
}

impl Value {
    /// Runtime type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::DateTime(_) => "DateTime",
            Value::Bytes(_) => "Bytes",
            Value::ObjectId(_) => "ObjectId",
            Value::Map(_) => "Map",
            Value::Pair(_, _) => "Pair",
            Value::Row(_) => "DataRow",
            Value::List(_) => "List",
        }
    }

    /// Build a map from string-keyed entries
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::String(k.into()), v.into()))
                .collect(),
        )
    }

    /// Build a pair
    pub fn pair(left: impl Into<Value>, right: impl Into<Value>) -> Self {
        Value::Pair(Box::new(left.into()), Box::new(right.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// One row of tabular data: ordered column names with their values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataRow {
    columns: Vec<(String, Value)>,
}

impl DataRow {
    /// Build a row from `(column, value)` pairs, in column order
    pub fn new<C, V>(columns: impl IntoIterator<Item = (C, V)>) -> Self
    where
        C: Into<String>,
        V: Into<Value>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl From<DataRow> for Value {
    fn from(row: DataRow) -> Self {
        Value::Row(row)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Long(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::from(2).type_name(), "Integer");
        assert_eq!(Value::from(2i64).type_name(), "Long");
        assert_eq!(Value::from("x").type_name(), "String");
        assert_eq!(Value::pair("a", 1).type_name(), "Pair");
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::from(DataRow::default()).type_name(), "DataRow");
    }

    #[test]
    fn test_map_keeps_insertion_order() {
        let map = Value::map([("z", 1), ("a", 2), ("m", 3)]);
        let Value::Map(entries) = map else {
            panic!("expected map");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![Value::from("z"), Value::from("a"), Value::from("m")]);
    }

    #[test]
    fn test_data_row_keeps_every_column() {
        let row = DataRow::new([
            ("column1", Value::from("One")),
            ("column2", Value::from(2)),
            ("column3", Value::Null),
        ]);
        assert_eq!(row.len(), 3);
        assert_eq!(row.get("column1"), Some(&Value::from("One")));
        assert_eq!(row.get("column2"), Some(&Value::from(2)));
        assert_eq!(row.get("column3"), Some(&Value::Null));
        let names: Vec<_> = row.columns().map(|(name, _)| name).collect();
        assert_eq!(names, ["column1", "column2", "column3"]);
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }
}
