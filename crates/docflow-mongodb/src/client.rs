//! MongoDB client construction and the driver calls used by operation components
//!
//! [`DocumentStore`] is the seam between the components and the driver: one
//! value per live client, cheap to clone. [`ClientFactory`] builds one from a
//! validated [`ConnectionConfig`]. The production pair is
//! [`MongoClientFactory`] / [`MongoStore`].

use async_trait::async_trait;
use bson::{doc, Bson, Document as BsonDocument};
use futures::TryStreamExt;
use mongodb::{
    options::{ClientOptions, Credential, ServerApi, ServerApiVersion},
    Client, Collection,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::{ConnectorError, Result};

/// Outcome of an update driver call
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSummary {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
    pub acknowledged: bool,
}

/// Outcome of a delete driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted_count: u64,
    pub acknowledged: bool,
}

/// Driver calls available on one live client
#[async_trait]
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Insert one document, returning its identifier
    async fn insert_one(&self, database: &str, collection: &str, document: BsonDocument)
        -> Result<Bson>;

    /// Insert documents in order, returning their identifiers in the same order
    async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<BsonDocument>,
    ) -> Result<Vec<Bson>>;

    async fn find(&self, database: &str, collection: &str, filter: BsonDocument)
        -> Result<Vec<BsonDocument>>;

    async fn update(
        &self,
        database: &str,
        collection: &str,
        filter: BsonDocument,
        update: BsonDocument,
        many: bool,
        upsert: bool,
    ) -> Result<UpdateSummary>;

    async fn delete(
        &self,
        database: &str,
        collection: &str,
        filter: BsonDocument,
        many: bool,
    ) -> Result<DeleteSummary>;

    async fn count(&self, database: &str, collection: &str, filter: BsonDocument) -> Result<u64>;

    /// Lightweight connectivity and authentication check against `database`
    async fn ping(&self, database: &str) -> Result<()>;

    /// Release the client's resources. Called exactly once per client.
    async fn close(self);
}

/// Builds clients for the connection registry
#[async_trait]
pub trait ClientFactory: Send + Sync {
    type Client: DocumentStore;

    /// Build a client. `config` has already been validated.
    async fn create(&self, config: &ConnectionConfig) -> Result<Self::Client>;
}

/// Connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Minimum number of connections in the pool (default: 0)
    pub min_pool_size: Option<u32>,
    /// Maximum number of connections in the pool (default: 10)
    pub max_pool_size: Option<u32>,
    /// Maximum time a connection can remain idle before being closed (default: none)
    pub max_idle_time: Option<Duration>,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Option<Duration>,
    /// Server selection timeout (default: 30s)
    pub server_selection_timeout: Option<Duration>,
    /// Application name for server logs
    pub app_name: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_pool_size: Some(0),
            max_pool_size: Some(10),
            max_idle_time: None,
            connect_timeout: Some(Duration::from_secs(10)),
            server_selection_timeout: Some(Duration::from_secs(30)),
            app_name: Some("docflow".to_string()),
        }
    }
}

/// Production factory backed by the MongoDB driver
#[derive(Debug, Clone, Default)]
pub struct MongoClientFactory {
    pool: PoolConfig,
}

impl MongoClientFactory {
    pub fn new(pool: PoolConfig) -> Self {
        Self { pool }
    }

    /// Driver options for `config`: URL, pool settings, stable API and credentials
    async fn client_options(&self, config: &ConnectionConfig) -> Result<ClientOptions> {
        let mut client_options = ClientOptions::parse(config.connection_url())
            .await
            .map_err(|e| ConnectorError::Connection(format!("Invalid connection url: {}", e)))?;

        // Apply pool configuration
        if let Some(min) = self.pool.min_pool_size {
            client_options.min_pool_size = Some(min);
        }
        if let Some(max) = self.pool.max_pool_size {
            client_options.max_pool_size = Some(max);
        }
        if let Some(idle) = self.pool.max_idle_time {
            client_options.max_idle_time = Some(idle);
        }
        if let Some(connect) = self.pool.connect_timeout {
            client_options.connect_timeout = Some(connect);
        }
        if let Some(server_sel) = self.pool.server_selection_timeout {
            client_options.server_selection_timeout = Some(server_sel);
        }
        if let Some(app) = self.pool.app_name.clone() {
            client_options.app_name = Some(app);
        }

        // Set stable API version for compatibility
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);

        if let Some((username, password)) = config.credentials() {
            let credential = Credential::builder()
                .username(username.to_string())
                .password(password.to_string())
                .source(config.database().to_string())
                .build();
            client_options.credential = Some(credential);
        }

        Ok(client_options)
    }
}

#[async_trait]
impl ClientFactory for MongoClientFactory {
    type Client = MongoStore;

    async fn create(&self, config: &ConnectionConfig) -> Result<MongoStore> {
        let options = self.client_options(config).await?;
        let client = Client::with_options(options)
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;
        Ok(MongoStore { client })
    }
}

/// A live MongoDB client
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Wrap an existing driver client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the driver client
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, database: &str, collection: &str) -> Collection<BsonDocument> {
        self.client.database(database).collection(collection)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        document: BsonDocument,
    ) -> Result<Bson> {
        let result = self.collection(database, collection).insert_one(document).await?;
        Ok(result.inserted_id)
    }

    async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<BsonDocument>,
    ) -> Result<Vec<Bson>> {
        let result = self
            .collection(database, collection)
            .insert_many(documents)
            .await?;

        // inserted_ids is keyed by input position
        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: BsonDocument,
    ) -> Result<Vec<BsonDocument>> {
        let cursor = self.collection(database, collection).find(filter).await?;
        let docs: Vec<BsonDocument> = cursor.try_collect().await?;
        Ok(docs)
    }

    async fn update(
        &self,
        database: &str,
        collection: &str,
        filter: BsonDocument,
        update: BsonDocument,
        many: bool,
        upsert: bool,
    ) -> Result<UpdateSummary> {
        let options = mongodb::options::UpdateOptions::builder()
            .upsert(upsert)
            .build();

        let collection = self.collection(database, collection);
        let result = if many {
            collection
                .update_many(filter, update)
                .with_options(options)
                .await?
        } else {
            collection
                .update_one(filter, update)
                .with_options(options)
                .await?
        };

        Ok(UpdateSummary {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
            // Unacknowledged writes surface as driver errors
            acknowledged: true,
        })
    }

    async fn delete(
        &self,
        database: &str,
        collection: &str,
        filter: BsonDocument,
        many: bool,
    ) -> Result<DeleteSummary> {
        let collection = self.collection(database, collection);
        let result = if many {
            collection.delete_many(filter).await?
        } else {
            collection.delete_one(filter).await?
        };

        Ok(DeleteSummary {
            deleted_count: result.deleted_count,
            acknowledged: true,
        })
    }

    async fn count(&self, database: &str, collection: &str, filter: BsonDocument) -> Result<u64> {
        let count = self
            .collection(database, collection)
            .count_documents(filter)
            .await?;
        Ok(count)
    }

    async fn ping(&self, database: &str) -> Result<()> {
        // Fails on bad credentials right away instead of on the first operation
        self.client
            .database(database)
            .run_command(doc! { "connectionStatus": 1, "showPrivileges": false })
            .await
            .map_err(|e| ConnectorError::Connection(format!("Connection ping failed: {}", e)))?;
        Ok(())
    }

    async fn close(self) {
        self.client.shutdown().await;
    }
}
