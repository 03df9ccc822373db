use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::valid_credential;
use crate::auth::{AuthError, AuthService};

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path= "/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Session token", body = LoginResponse, content_type = "application/json"),
        (status = 400, description = "Missing payload or malformed username/password"),
        (status = 401, description = "Wrong username or password"),
        (status = 403, description = "Host or path not allowed"),
    ),
    tag= "auth"
)]
#[instrument(skip(auth))]
pub async fn login(
    Extension(auth): Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::InvalidRequest("Missing payload".to_string()));
    };

    if !valid_credential(&request.username) || !valid_credential(&request.password) {
        debug!("Rejected login payload with malformed username or password");
        return Err(AuthError::InvalidRequest(
            "username and password must be 6-32 characters of [A-Za-z0-9!@#$%^&*()_+-=]"
                .to_string(),
        ));
    }

    let token = auth.login(&request.username, &request.password).await?;

    Ok(Json(LoginResponse { token }))
}
