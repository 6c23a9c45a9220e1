//! Connection and registry configuration
//!
//! `ConnectionConfig` is the value object an owning configuration hands to every
//! operation component that shares a connection. Its `id` is the registry
//! identity: two configs with the same URL but different ids are distinct
//! connections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::{ConnectorError, Result};

/// Settings for one logical MongoDB connection.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    id: String,
    #[serde(rename = "connectionURL")]
    connection_url: String,
    database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

impl ConnectionConfig {
    /// Create a config without credentials
    pub fn new(
        id: impl Into<String>,
        connection_url: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            connection_url: connection_url.into(),
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Attach credentials, authenticated against the target database
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Registry identity of this connection
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connection_url(&self) -> &str {
        &self.connection_url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Credentials to apply, if a username is present.
    ///
    /// Returns `None` when no (non-blank) username is configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username().filter(|u| !is_blank(u))?;
        Some((username, self.password().unwrap_or_default()))
    }

    /// Check required fields, reporting the first one missing.
    ///
    /// # Errors
    /// Returns `ConnectorError::Configuration` if:
    /// - id, connection URL or database is blank
    /// - a username is given without a password
    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.id) {
            return Err(ConnectorError::Configuration(
                "MongoDB connection id must not be empty".to_string(),
            ));
        }
        if is_blank(&self.connection_url) {
            return Err(ConnectorError::Configuration(
                "MongoDB connection url must not be empty".to_string(),
            ));
        }
        if is_blank(&self.database) {
            return Err(ConnectorError::Configuration(
                "MongoDB database must not be empty".to_string(),
            ));
        }
        if let Some((username, password)) = self.credentials() {
            if is_blank(password) {
                return Err(ConnectorError::Configuration(format!(
                    "MongoDB password must not be empty for username '{}'",
                    username
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("id", &self.id)
            .field("connection_url", &self.connection_url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Behaviour of the connection registry when it builds a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Run a connection status command right after the client is built (default: true)
    pub ping_on_connect: bool,
    /// Upper bound for the ping (default: 10s)
    pub ping_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ping_on_connect: true,
            ping_timeout: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    /// Skip the connectivity ping
    pub fn without_ping() -> Self {
        Self {
            ping_on_connect: false,
            ..Default::default()
        }
    }

    /// Set the ping timeout
    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
