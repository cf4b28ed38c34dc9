use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which side of the server rejected a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerErrorKind {
    Client,
    Compile,
    Runtime,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("connection to {address} timed out")]
    ConnectTimeout { address: String },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("connection is no longer usable: {0}")]
    ConnectionBroken(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{kind:?} error from server: {message}")]
    Server {
        kind: ServerErrorKind,
        message: String,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("write rejected: {0}")]
    Write(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("table `{0}` does not exist")]
    NoSuchTable(String),

    #[error("index `{index}` does not exist on table `{table}`")]
    NoSuchIndex { table: String, index: String },

    #[error("table `{0}` already exists")]
    TableExists(String),

    #[error("index `{0}` already exists")]
    IndexExists(String),

    #[error("timed out waiting for {0}")]
    NotReady(String),
}

impl Error {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }

    pub(crate) fn server(kind: ServerErrorKind, message: impl Into<String>) -> Self {
        Error::Server {
            kind,
            message: message.into(),
        }
    }
}
