pub mod migrations;
pub mod models;
pub mod queries;
pub mod store;

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing::info;

use uuid::Uuid;

use campus_types::models::Message;

pub use store::{GroupDirectory, MessageStore, SqliteStore};

/// Change notification for committed message inserts, in two phases.
///
/// `staged` runs while the writer is still held, so calls arrive in store
/// order. It must only record the message: no I/O, no waiting on other
/// groups, no calls back into the database. `committed` runs for the same
/// group once the writer has been released, and is where slow work belongs.
pub trait InsertHook: Send + Sync {
    fn staged(&self, message: &Message);

    fn committed(&self, group_id: Uuid);
}

impl<T: InsertHook + ?Sized> InsertHook for std::sync::Arc<T> {
    fn staged(&self, message: &Message) {
        (**self).staged(message)
    }

    fn committed(&self, group_id: Uuid) {
        (**self).committed(group_id)
    }
}

pub struct Database {
    conn: Mutex<Connection>,
    on_insert: OnceLock<Box<dyn InsertHook>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::init(conn)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private database that disappears with the handle.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            on_insert: OnceLock::new(),
        })
    }

    /// Register the change-notification hook. Only one hook may be installed.
    pub fn on_message_insert(&self, hook: impl InsertHook + 'static) -> Result<()> {
        self.on_insert
            .set(Box::new(hook))
            .map_err(|_| anyhow!("message insert hook already installed"))
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }

    fn stage_insert(&self, message: &Message) {
        if let Some(hook) = self.on_insert.get() {
            hook.staged(message);
        }
    }

    fn commit_insert(&self, group_id: Uuid) {
        if let Some(hook) = self.on_insert.get() {
            hook.committed(group_id);
        }
    }
}
