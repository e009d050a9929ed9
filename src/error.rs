use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::response::{ApiResponse, Meta};

pub const LOGIN_PATH: &str = "/auth/login";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated { next: String },

    #[error("Not Found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Insufficient stock for variant {0}")]
    InsufficientStock(Uuid),

    #[error("No valid items selected")]
    NoItemsSelected,

    #[error("Order cannot move from {from} to {to}")]
    StateTransitionNotAllowed { from: String, to: String },

    #[error("Only delivered orders can be returned")]
    ReturnNotAllowed,

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated { .. } => StatusCode::SEE_OTHER,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::NoItemsSelected => StatusCode::BAD_REQUEST,
            AppError::InsufficientStock(_)
            | AppError::StateTransitionNotAllowed { .. }
            | AppError::ReturnNotAllowed => StatusCode::CONFLICT,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Login URL carrying the `next` continuation the client should return to.
pub fn login_redirect_target(next: &str) -> String {
    match serde_urlencoded::to_string([("next", next)]) {
        Ok(query) => format!("{LOGIN_PATH}?{query}"),
        Err(_) => LOGIN_PATH.to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::DbError(err) => tracing::error!(error = %err, "database failure"),
            AppError::OrmError(err) => tracing::error!(error = %err, "orm failure"),
            AppError::Internal(err) => tracing::error!(error = ?err, "internal failure"),
            _ => {}
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
            }),
            meta: Some(Meta::empty()),
        };

        if let AppError::Unauthenticated { next } = &self {
            let location = login_redirect_target(next);
            return (status, [(header::LOCATION, location)], axum::Json(body)).into_response();
        }

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_redirects_to_login_with_next() {
        let response = AppError::Unauthenticated {
            next: "/cart?x=1".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert_eq!(location, "/auth/login?next=%2Fcart%3Fx%3D1");
    }

    #[test]
    fn domain_errors_map_to_client_statuses() {
        assert_eq!(
            AppError::InsufficientStock(Uuid::nil()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::NoItemsSelected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::ReturnNotAllowed.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
