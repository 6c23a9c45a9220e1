//! Shared connection registry
//!
//! One client per connection identity, shared by every operation component
//! that references the same [`ConnectionConfig`]. Components attach with
//! [`ConnectionRegistry::acquire`] at setup and detach with
//! [`ConnectionRegistry::release`] at teardown; the client is closed when the
//! last consumer detaches.
//!
//! # Concurrency
//! A single async mutex guards the whole identity map. It is held across
//! client construction, probing and closing, so:
//! - the first acquirer of an identity builds the client while later
//!   acquirers of any identity wait;
//! - a failed construction leaves no entry behind;
//! - removal from the map and closing the client happen in one critical
//!   section, so a client is closed exactly once.
//!
//! Acquire and release run at component setup and teardown only, never on
//! the message path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::client::{ClientFactory, DocumentStore, MongoClientFactory};
use crate::config::{ConnectionConfig, RegistryConfig};
use crate::{ConnectorError, Result};

/// Opaque identity of a component holding a connection.
///
/// Tokens compare by identity: every call to [`ConsumerId::new`] yields a
/// distinct token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

impl ConsumerId {
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ConsumerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A live client and the consumers depending on it.
///
/// Never stored with an empty consumer list.
struct ConnectionHandle<C> {
    client: C,
    consumers: Vec<ConsumerId>,
}

/// Reference-counted cache of clients keyed by connection id
pub struct ConnectionRegistry<F: ClientFactory = MongoClientFactory> {
    factory: F,
    config: RegistryConfig,
    handles: Mutex<HashMap<String, ConnectionHandle<F::Client>>>,
}

impl ConnectionRegistry<MongoClientFactory> {
    /// Registry backed by the MongoDB driver with default settings
    pub fn mongodb() -> Self {
        Self::new(MongoClientFactory::default(), RegistryConfig::default())
    }
}

impl<F: ClientFactory> ConnectionRegistry<F> {
    pub fn new(factory: F, config: RegistryConfig) -> Self {
        Self {
            factory,
            config,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Attach `consumer` to the client for `config`, building it on first use.
    ///
    /// Every call with the same `config.id()` returns the same client until
    /// its last consumer is released.
    ///
    /// # Errors
    /// - `Configuration` if the config is incomplete (checked before any I/O)
    /// - `Connection` if the client cannot be built or the ping fails
    #[instrument(skip(self, config), fields(connection_id = %config.id()))]
    pub async fn acquire(&self, consumer: ConsumerId, config: &ConnectionConfig) -> Result<F::Client> {
        config.validate()?;

        let mut handles = self.handles.lock().await;

        if !handles.contains_key(config.id()) {
            let client = self.connect(config).await?;
            info!(database = config.database(), "MongoDB client created");
            handles.insert(
                config.id().to_string(),
                ConnectionHandle {
                    client,
                    consumers: Vec::new(),
                },
            );
        }

        let handle = handles
            .get_mut(config.id())
            .ok_or_else(|| ConnectorError::Internal("connection handle vanished".to_string()))?;
        handle.consumers.push(consumer);
        debug!(consumers = handle.consumers.len(), "Consumer attached");

        Ok(handle.client.clone())
    }

    /// Detach `consumer` from the client for `config`.
    ///
    /// Closes and forgets the client when this was its last consumer.
    /// Releasing an unknown consumer or identity does nothing.
    #[instrument(skip(self, config), fields(connection_id = %config.id()))]
    pub async fn release(&self, consumer: ConsumerId, config: &ConnectionConfig) {
        let mut handles = self.handles.lock().await;

        let Some(handle) = handles.get_mut(config.id()) else {
            return;
        };
        let Some(position) = handle.consumers.iter().position(|c| *c == consumer) else {
            return;
        };
        handle.consumers.remove(position);
        debug!(consumers = handle.consumers.len(), "Consumer detached");

        if handle.consumers.is_empty() {
            if let Some(handle) = handles.remove(config.id()) {
                handle.client.close().await;
                info!(database = config.database(), "MongoDB client closed");
            }
        }
    }

    /// Close every client and empty the registry, whatever the consumer counts.
    #[instrument(skip(self))]
    pub async fn dispose_all(&self) {
        let mut handles = self.handles.lock().await;
        for (connection_id, handle) in handles.drain() {
            handle.client.close().await;
            info!(connection_id = %connection_id, "MongoDB client closed");
        }
    }

    /// Number of live clients
    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.lock().await.is_empty()
    }

    /// Consumers currently attached to `connection_id`, in attach order
    pub async fn consumers(&self, connection_id: &str) -> Option<Vec<ConsumerId>> {
        self.handles
            .lock()
            .await
            .get(connection_id)
            .map(|handle| handle.consumers.clone())
    }

    /// Build and optionally ping a client. Closes it again if the ping fails.
    async fn connect(&self, config: &ConnectionConfig) -> Result<F::Client> {
        let client = self.factory.create(config).await?;

        if !self.config.ping_on_connect {
            return Ok(client);
        }

        let timeout = self.config.ping_timeout;
        let ping = tokio::time::timeout(timeout, client.ping(config.database())).await;
        match ping {
            Ok(Ok(())) => Ok(client),
            Ok(Err(e)) => {
                warn!(error = %e, "MongoDB connection ping failed");
                client.close().await;
                Err(as_connection_error(e))
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "MongoDB connection ping timed out");
                client.close().await;
                Err(ping_timed_out(timeout))
            }
        }
    }
}

fn as_connection_error(err: ConnectorError) -> ConnectorError {
    match err {
        ConnectorError::Connection(_) => err,
        other => ConnectorError::Connection(other.to_string()),
    }
}

fn ping_timed_out(timeout: Duration) -> ConnectorError {
    ConnectorError::Connection(format!(
        "Connection ping timed out after {}ms",
        timeout.as_millis()
    ))
}
