use crate::error::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::MutexGuard;

// Fetch-side port
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpGetResult>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub content_length: u64,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// Store-side port

/// A connection checked out of a [`StoreConnector`].
///
/// `Owned` connections belong to the caller for the duration of one stage;
/// `Shared` ones stay owned by whoever built the connector.
pub enum StoreHandle<'a> {
    Owned(Connection),
    Shared(MutexGuard<'a, Connection>),
}

impl Deref for StoreHandle<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            StoreHandle::Owned(conn) => conn,
            StoreHandle::Shared(guard) => guard,
        }
    }
}

impl DerefMut for StoreHandle<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        match self {
            StoreHandle::Owned(conn) => conn,
            StoreHandle::Shared(guard) => guard,
        }
    }
}

/// Connection capability used by the loader and the aggregator.
///
/// Every `acquire` must be paired with a `release` of the same handle.
pub trait StoreConnector: Send + Sync {
    fn acquire(&self) -> Result<StoreHandle<'_>>;
    fn release(&self, handle: StoreHandle<'_>) -> Result<()>;
}
