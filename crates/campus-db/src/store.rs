//! Async capabilities over the message log and group catalog, and the
//! SQLite-backed implementation used by the server.

use std::future::Future;
use std::sync::Arc;

use tracing::error;
use uuid::Uuid;

use campus_types::error::ChatError;
use campus_types::models::{Group, Message, NewGroup, NewMessage, SortOrder};

use crate::Database;

/// Append-only, per-group message log.
pub trait MessageStore: Send + Sync {
    fn append(
        &self,
        group_id: Uuid,
        message: NewMessage,
    ) -> impl Future<Output = Result<Message, ChatError>> + Send;

    fn query(
        &self,
        group_id: Uuid,
        order: SortOrder,
        limit: Option<u32>,
    ) -> impl Future<Output = Result<Vec<Message>, ChatError>> + Send;
}

/// Catalog of class groups.
pub trait GroupDirectory: Send + Sync {
    fn list(&self) -> impl Future<Output = Result<Vec<Group>, ChatError>> + Send;

    fn get(&self, group_id: Uuid) -> impl Future<Output = Result<Group, ChatError>> + Send;

    fn create(&self, group: NewGroup) -> impl Future<Output = Result<Group, ChatError>> + Send;
}

/// Runs every blocking `Database` call off the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, ChatError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ChatError::store(e)
            })?
            .map_err(|e| {
                error!("Database error: {:#}", e);
                ChatError::store(format!("{:#}", e))
            })
    }
}

impl MessageStore for SqliteStore {
    async fn append(&self, group_id: Uuid, message: NewMessage) -> Result<Message, ChatError> {
        self.blocking(move |db| db.append_message(group_id, &message))
            .await?
            .ok_or(ChatError::NotFound(group_id))
    }

    async fn query(
        &self,
        group_id: Uuid,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, ChatError> {
        self.blocking(move |db| db.query_messages(group_id, order, limit))
            .await
    }
}

impl GroupDirectory for SqliteStore {
    async fn list(&self) -> Result<Vec<Group>, ChatError> {
        self.blocking(|db| db.list_groups()).await
    }

    async fn get(&self, group_id: Uuid) -> Result<Group, ChatError> {
        self.blocking(move |db| db.get_group(group_id))
            .await?
            .ok_or(ChatError::NotFound(group_id))
    }

    async fn create(&self, group: NewGroup) -> Result<Group, ChatError> {
        let group = group.normalized()?;
        self.blocking(move |db| db.create_group(&group)).await
    }
}
