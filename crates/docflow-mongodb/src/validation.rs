//! Collection name validation for operation components
//!
//! Collection names come from flow configuration. They are checked once at
//! component setup, before any connection is acquired.

use tracing::warn;

use crate::config::is_blank;
use crate::{ConnectorError, Result};

/// Maximum allowed length for collection names (MongoDB limit is 255, we're more conservative)
const MAX_COLLECTION_NAME_LENGTH: usize = 120;

/// Validated collection name
///
/// # Guarantees
/// - Not blank
/// - Maximum 120 characters
/// - No null bytes
/// - No "system." prefix (system collections)
/// - No $ characters (special operators)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCollectionName {
    name: String,
}

impl ValidatedCollectionName {
    /// Creates a new validated collection name
    ///
    /// # Errors
    /// Returns `ConnectorError::Configuration` if any guarantee is violated.
    pub fn new(name: &str) -> Result<Self> {
        if is_blank(name) {
            return Err(ConnectorError::Configuration(
                "MongoDB collection must not be empty".to_string(),
            ));
        }

        if name.len() > MAX_COLLECTION_NAME_LENGTH {
            return Err(ConnectorError::Configuration(format!(
                "Collection name exceeds maximum length of {} characters: '{}'",
                MAX_COLLECTION_NAME_LENGTH, name
            )));
        }

        if name.contains('\0') {
            return Err(ConnectorError::Configuration(
                "Collection name cannot contain null bytes".to_string(),
            ));
        }

        if name.starts_with("system.") {
            return Err(ConnectorError::Configuration(format!(
                "Collection name cannot start with 'system.' (reserved): '{}'",
                name
            )));
        }

        if name.contains('$') {
            return Err(ConnectorError::Configuration(format!(
                "Collection name cannot contain '$' character: '{}'",
                name
            )));
        }

        // Suspicious but legal
        if name.contains("..") || name.contains("//") {
            warn!(collection = name, "Collection name contains suspicious pattern");
        }

        Ok(ValidatedCollectionName {
            name: name.to_string(),
        })
    }

    /// Returns the validated collection name as a string slice
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl AsRef<str> for ValidatedCollectionName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for ValidatedCollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_collection_names() {
        assert!(ValidatedCollectionName::new("users").is_ok());
        assert!(ValidatedCollectionName::new("test-collection").is_ok());
        assert!(ValidatedCollectionName::new("orders.archive").is_ok());
        assert_eq!(ValidatedCollectionName::new("users").unwrap().as_str(), "users");
    }

    #[test]
    fn test_blank_collection_name() {
        let err = ValidatedCollectionName::new("  ").unwrap_err();
        assert_eq!(
            err,
            ConnectorError::Configuration("MongoDB collection must not be empty".to_string())
        );
    }

    #[test]
    fn test_collection_name_too_long() {
        let name = "a".repeat(MAX_COLLECTION_NAME_LENGTH + 1);
        assert!(ValidatedCollectionName::new(&name).is_err());
    }

    #[test]
    fn test_collection_name_null_byte() {
        assert!(ValidatedCollectionName::new("users\0admin").is_err());
    }

    #[test]
    fn test_collection_name_system_prefix() {
        assert!(ValidatedCollectionName::new("system.users").is_err());
    }

    #[test]
    fn test_collection_name_dollar_sign() {
        assert!(ValidatedCollectionName::new("users$where").is_err());
    }
}
