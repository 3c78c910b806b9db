use shared::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("invalid server address: {0}")]
    Address(#[from] std::net::AddrParseError),
    #[error("no response from server after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("disconnected: {0}")]
    Disconnected(String),
    #[error("session is not active")]
    NotActive,
    #[error("unexpected {0} response")]
    Unexpected(&'static str),
}
