use axum::{extract::Extension, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use crate::auth::{bearer_token, AuthError, AuthService};
use crate::store::AccountIdentity;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: i64,
    pub username: String,
    pub roles: Vec<String>,
}

impl From<AccountIdentity> for AccountInfo {
    fn from(identity: AccountIdentity) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
            roles: vec![identity.role],
        }
    }
}

#[utoipa::path(
    get,
    path= "/auth/account",
    responses (
        (status = 200, description = "Account behind the bearer token", body = AccountInfo, content_type = "application/json"),
        (status = 401, description = "Missing, expired or illegal token"),
        (status = 403, description = "Account disabled, or host or path not allowed"),
    ),
    security(("bearer" = [])),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn account(
    Extension(auth): Extension<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Json<AccountInfo>, AuthError> {
    let token = bearer_token(&headers).unwrap_or_default();
    let identity = auth.account_info(token).await?;

    Ok(Json(AccountInfo::from(identity)))
}
