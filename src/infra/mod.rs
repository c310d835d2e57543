pub mod http_client;
pub mod sqlite_store;
