use std::error::Error as StdError;
use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde_json::error::Error as SerdeError;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;
use blob_store::BlobError;

#[derive(Debug, Error)]
pub enum ServerErr {
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] SerdeError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("catalog storage failure: {0}")]
    Catalog(Box<dyn StdError + Send + Sync>),

    #[error("failed to issue token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl ServerErr {
    pub fn catalog<E: StdError + Send + Sync + 'static>(e: E) -> Self {
        ServerErr::Catalog(Box::new(e))
    }
}

impl From<rocksdb::Error> for ServerErr {
    fn from(e: rocksdb::Error) -> Self {
        ServerErr::catalog(e)
    }
}

impl ResponseError for ServerErr {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerErr::Json(_) | ServerErr::Validation(_) | ServerErr::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerErr::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerErr::NotFound(_) => StatusCode::NOT_FOUND,
            ServerErr::Blob(e) => match e {
                e if e.is_not_found() => StatusCode::NOT_FOUND,
                BlobError::InvalidRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
                BlobError::SizeLimitExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                BlobError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerErr::Catalog(_) | ServerErr::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        let mut response = HttpResponse::build(status);
        if let ServerErr::Blob(BlobError::InvalidRange { length, .. }) = self {
            response.insert_header((header::CONTENT_RANGE, format!("bytes */{}", length)));
        }
        response.json(json!({ "error": self.to_string() }))
    }
}
