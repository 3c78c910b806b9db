use shared::{CodecError, WorldError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not prepare database location: {0}")]
    Io(#[from] std::io::Error),
    #[error("record encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    World(#[from] WorldError),
}
