use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use fulfillment_engine::OrderFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Auth token invalid or not provided")]
    Unauthorized,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Insufficient permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
}

impl ServerError {
    /// Machine-readable kind reported in the error body next to the human-readable reason.
    fn kind(&self) -> &'static str {
        match self {
            Self::OrderFlow(e) => e.kind(),
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InsufficientPermissions(_) => "FORBIDDEN",
            Self::NoRecordFound(_) => "NOT_FOUND",
            Self::InvalidRequestBody(_) => "BAD_REQUEST",
            _ => "SERVER_ERROR",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::OrderFlow(e) => match e {
                OrderFlowError::OrderNotFound(_) | OrderFlowError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
                OrderFlowError::Forbidden(_) => StatusCode::FORBIDDEN,
                OrderFlowError::InvalidTransition(_) |
                OrderFlowError::InvalidStatus(_) |
                OrderFlowError::NoCancellableItems(_) => StatusCode::BAD_REQUEST,
                OrderFlowError::Conflict(_) => StatusCode::CONFLICT,
                OrderFlowError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) |
            Self::BackendError(_) |
            Self::IOError(_) |
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.kind(), "reason": self.to_string() }).to_string())
    }
}
