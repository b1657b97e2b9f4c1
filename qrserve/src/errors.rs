use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Missing or malformed input
    #[error("{message}")]
    BadRequest { message: String },

    /// Decoding ran but no QR symbol could be read from the image
    #[error("QR code could not be decoded")]
    NoCodeFound,

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Request body exceeded the configured limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// An optional capability is disabled or was compiled out
    #[error("{capability} is not available on this server")]
    CapabilityUnavailable { capability: String },

    /// The decoder failed in an unexpected way
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Filesystem operation failed
    #[error("Failed to {operation}")]
    Storage {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON body returned for every error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } | Error::NoCodeFound => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::CapabilityUnavailable { .. } => StatusCode::NOT_IMPLEMENTED,
            Error::Decode { .. } | Error::Storage { .. } | Error::Internal { .. } | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } | Error::PayloadTooLarge { message } => message.clone(),
            Error::NoCodeFound | Error::NotFound { .. } | Error::CapabilityUnavailable { .. } | Error::Decode { .. } => {
                self.to_string()
            }
            Error::Storage { operation, .. } => format!("Failed to {operation}"),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest { message: message.into() }
    }

    pub fn storage(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::Storage {
            operation: operation.into(),
            source,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Decode { .. } | Error::Storage { .. } | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {}", self.chain());
            }
            Error::CapabilityUnavailable { .. } => {
                tracing::warn!("Capability error: {}", self);
            }
            Error::BadRequest { .. } | Error::NoCodeFound | Error::NotFound { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorResponse { error: self.user_message() };
        (self.status_code(), Json(body)).into_response()
    }
}

impl Error {
    /// Full error chain joined with `: `, for logs only
    fn chain(&self) -> String {
        if let Error::Other(err) = self {
            return format!("{err:#}");
        }
        let mut chain = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        chain.join(": ")
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
