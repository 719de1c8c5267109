use std::time::Duration;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("you have already reviewed this title")]
    DuplicateReview,

    #[error("you do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("request was throttled, retry in {} seconds", retry_after_secs(.retry_after))]
    RateLimited { retry_after: Duration },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::DuplicateReview => "duplicate_review",
            AppError::Forbidden => "forbidden",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::DuplicateReview => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn retry_after_secs(wait: &Duration) -> u64 {
    (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1)
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let mut body = match &self {
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal error");
                json!({ "error": kind, "detail": "internal server error" })
            },
            other => json!({ "error": kind, "detail": other.to_string() }),
        };

        let retry_after = match &self {
            AppError::RateLimited { retry_after } => Some(retry_after_secs(retry_after)),
            _ => None,
        };

        if let Some(secs) = retry_after {
            body["retry_after"] = json!(secs);
        }

        let mut resp = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            resp.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        resp
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_rounds_up_to_whole_seconds() {
        assert_eq!(retry_after_secs(&Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(&Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(&Duration::from_secs(60)), 60);
        assert_eq!(retry_after_secs(&Duration::ZERO), 1);
    }

    #[test]
    fn rate_limited_response_carries_retry_after() {
        let resp = AppError::RateLimited { retry_after: Duration::from_secs(30) }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get(RETRY_AFTER).unwrap(), "30");
    }

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(AppError::not_found("Title").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::validation("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DuplicateReview.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Unauthenticated("no").status(), StatusCode::UNAUTHORIZED);
    }
}
