use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use diesel::r2d2::PoolError;
use thiserror::Error;

use crate::forms::FieldError;

#[derive(Error, Debug)]
pub(crate) enum AppError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] BlockingError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    #[error("invalid form: {} field error(s)", .0.len())]
    Invalid(Vec<FieldError>),

    #[error("store is not responding")]
    Unavailable,

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub(crate) fn not_found(entity: &'static str, id: i32) -> Self {
        AppError::NotFound { entity, id }
    }

    /// Whether the error says something about the health of the store, as
    /// opposed to the request.
    pub(crate) fn is_store_failure(&self) -> bool {
        match self {
            AppError::Database(diesel::result::Error::NotFound) => false,
            AppError::Database(_) | AppError::Pool(_) => true,
            _ => false,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Invalid(errors) = self {
            return HttpResponse::build(self.status_code())
                .json(serde_json::json!({ "error": self.to_string(), "errors": errors }));
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": self.to_string() }))
    }
}

pub(crate) fn trips_breaker(err: &AppError) -> bool {
    err.is_store_failure()
}
