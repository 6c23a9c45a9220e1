//! Error types for docflow

use thiserror::Error;

/// Result type alias for docflow operations
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Unified error type for all docflow operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectorError {
    /// Missing or blank required setting, detected before any network activity
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Client construction or connectivity ping failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// A value could not be turned into a document to write
    #[error("Document error: {0}")]
    Document(DocumentError),

    /// A value could not be turned into a query filter
    #[error("Filter error: {0}")]
    Filter(DocumentError),

    #[error("Insert error: {0}")]
    Insert(String),

    #[error("Find error: {0}")]
    Find(String),

    #[error("Update error: {0}")]
    Update(String),

    #[error("Delete error: {0}")]
    Delete(String),

    #[error("Count error: {0}")]
    Count(String),

    #[error("MongoDB error: {0}")]
    MongoDB(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Returns true if the host may retry the failed setup
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectorError::Connection(_))
    }

    /// Returns true if the error comes from value coercion
    pub fn is_coercion(&self) -> bool {
        matches!(self, ConnectorError::Document(_) | ConnectorError::Filter(_))
    }

    /// The coercion failure carried by this error, if any
    pub fn coercion(&self) -> Option<&DocumentError> {
        match self {
            ConnectorError::Document(e) | ConnectorError::Filter(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure to convert an evaluated value into a document.
///
/// Each variant carries the offending runtime type name (or the literal text
/// for JSON) so the host can report what it was given.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("could not parse JSON text [{text}]: {reason}")]
    MalformedJson { text: String, reason: String },

    #[error("map must have all keys with string type (found=[{found}])")]
    MapKeyNotString { found: String },

    #[error("the pair 'left' element must be a string (found=[{found}])")]
    PairKeyNotString { found: String },

    #[error("value with type=[{type_name}] is not supported")]
    Unsupported { type_name: String },
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Serialization(err.to_string())
    }
}

// MongoDB-specific error conversions (when mongodb-errors feature is enabled)
#[cfg(feature = "mongodb-errors")]
impl From<mongodb::error::Error> for ConnectorError {
    fn from(err: mongodb::error::Error) -> Self {
        ConnectorError::MongoDB(err.to_string())
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::ser::Error> for ConnectorError {
    fn from(err: bson::ser::Error) -> Self {
        ConnectorError::Serialization(format!("BSON serialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::de::Error> for ConnectorError {
    fn from(err: bson::de::Error) -> Self {
        ConnectorError::Serialization(format!("BSON deserialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_configuration() {
        let err = ConnectorError::Configuration("MongoDB database must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: MongoDB database must not be empty"
        );
    }

    #[test]
    fn test_error_display_connection() {
        let err = ConnectorError::Connection("timeout".to_string());
        assert_eq!(err.to_string(), "Connection error: timeout");
    }

    #[test]
    fn test_error_display_filter_unsupported() {
        let err = ConnectorError::Filter(DocumentError::Unsupported {
            type_name: "Integer".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Filter error: value with type=[Integer] is not supported"
        );
    }

    #[test]
    fn test_error_display_document_pair_key() {
        let err = ConnectorError::Document(DocumentError::PairKeyNotString {
            found: "Long".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Document error: the pair 'left' element must be a string (found=[Long])"
        );
    }

    #[test]
    fn test_error_display_malformed_json() {
        let err = DocumentError::MalformedJson {
            text: "{name:".to_string(),
            reason: "EOF while parsing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "could not parse JSON text [{name:]: EOF while parsing"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: ConnectorError = json_err.into();
        assert!(matches!(err, ConnectorError::Serialization(_)));
    }

    #[test]
    fn test_is_retryable() {
        assert!(ConnectorError::Connection("test".to_string()).is_retryable());
        assert!(!ConnectorError::Configuration("test".to_string()).is_retryable());
        assert!(!ConnectorError::Insert("test".to_string()).is_retryable());
    }

    #[test]
    fn test_is_coercion() {
        let key = DocumentError::MapKeyNotString {
            found: "Integer".to_string(),
        };
        assert!(ConnectorError::Document(key.clone()).is_coercion());
        assert!(ConnectorError::Filter(key.clone()).is_coercion());
        assert_eq!(ConnectorError::Filter(key.clone()).coercion(), Some(&key));
        assert!(!ConnectorError::Count("test".to_string()).is_coercion());
        assert!(ConnectorError::Count("test".to_string()).coercion().is_none());
    }
}
