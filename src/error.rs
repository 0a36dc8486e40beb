use crate::http::Status;
use std::io;
use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Stream closed: {0}")]
    StreamClosed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Forwarding error: {0}")]
    Forwarding(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    /// The canned status the dispatcher answers with for this error
    pub fn status(&self) -> Status {
        match self {
            ServerError::Protocol(_) | ServerError::BadRequest(_) => Status::BadRequest,
            ServerError::NotFound(_) => Status::NotFound,
            _ => Status::InternalServerError,
        }
    }

    /// Errors after which the peer can no longer be answered
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ServerError::Io(_) | ServerError::StreamClosed(_) | ServerError::ResourceLimit(_)
        )
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
