use crate::app::ports::{StoreConnector, StoreHandle};
use crate::error::Result;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Where a database URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Memory,
    File(PathBuf),
}

impl DatabaseTarget {
    /// Accepts `:memory:`, `sqlite::memory:`, `sqlite://<path>`, `sqlite:<path>` or a bare path.
    pub fn parse(url: &str) -> Self {
        let trimmed = url.trim();
        let rest = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);
        if rest == ":memory:" || rest.is_empty() {
            DatabaseTarget::Memory
        } else {
            DatabaseTarget::File(PathBuf::from(rest))
        }
    }

    pub fn open(&self) -> Result<Connection> {
        match self {
            DatabaseTarget::Memory => Ok(Connection::open_in_memory()?),
            DatabaseTarget::File(path) => open_file(path),
        }
    }

    /// Open without write access; a missing file is an error, never created.
    pub fn open_read_only(&self) -> Result<Connection> {
        match self {
            DatabaseTarget::Memory => Ok(Connection::open_in_memory()?),
            DatabaseTarget::File(path) => Ok(Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?),
        }
    }
}

fn open_file(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Connection::open(path)?)
}

/// Opens a fresh connection per `acquire` and closes it on `release`.
///
/// With an in-memory target every acquire sees an empty database; use
/// [`SharedConnector`] when the data has to outlive one stage.
pub struct DirectConnector {
    target: DatabaseTarget,
    read_only: bool,
}

impl DirectConnector {
    pub fn new(database_url: &str) -> Self {
        Self {
            target: DatabaseTarget::parse(database_url),
            read_only: false,
        }
    }

    /// For the analyze path: never creates directories, files or tables.
    pub fn read_only(database_url: &str) -> Self {
        Self {
            target: DatabaseTarget::parse(database_url),
            read_only: true,
        }
    }
}

impl StoreConnector for DirectConnector {
    fn acquire(&self) -> Result<StoreHandle<'_>> {
        debug!(read_only = self.read_only, "Opening database connection to {:?}", self.target);
        let conn = if self.read_only {
            self.target.open_read_only()?
        } else {
            self.target.open()?
        };
        Ok(StoreHandle::Owned(conn))
    }

    fn release(&self, handle: StoreHandle<'_>) -> Result<()> {
        match handle {
            StoreHandle::Owned(conn) => conn.close().map_err(|(_, e)| e.into()),
            StoreHandle::Shared(_) => Ok(()),
        }
    }
}

/// Hands out a connection owned by the embedding application.
///
/// `release` returns the connection without closing it.
#[derive(Clone)]
pub struct SharedConnector {
    conn: Arc<Mutex<Connection>>,
}

impl SharedConnector {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(database_url: &str) -> Result<Self> {
        Ok(Self::new(DatabaseTarget::parse(database_url).open()?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Connection::open_in_memory()?))
    }
}

impl StoreConnector for SharedConnector {
    fn acquire(&self) -> Result<StoreHandle<'_>> {
        // A panic mid-transaction already rolled back when the transaction dropped.
        let guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(StoreHandle::Shared(guard))
    }

    fn release(&self, handle: StoreHandle<'_>) -> Result<()> {
        drop(handle);
        Ok(())
    }
}
