use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::password::PasswordError;
use super::token::TokenError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credential encoding: {0}")]
    Validation(PasswordError),
    #[error("wrong username or password")]
    Authentication,
    #[error("account is disabled")]
    AccountDisabled,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("token expired")]
    TokenExpired,
    #[error("illegal token")]
    IllegalToken,
    #[error("Forbidden: host or path not allowed")]
    Forbidden,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("password hashing failed: {0}")]
    Hash(PasswordError),
    #[error("{0}")]
    InvalidRequest(String),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Configuration(_) | Self::Store(_) | Self::Hash(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Authentication | Self::Unauthenticated | Self::TokenExpired | Self::IllegalToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::AccountDisabled | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            _ => Self::IllegalToken,
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        if err.is_malformed() {
            Self::Validation(err)
        } else {
            Self::Hash(err)
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{self}");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
