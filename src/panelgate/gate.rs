//! Host and path-prefix allowlist for panel routes.
//!
//! The policy is resolved on every request: config store first, process
//! environment second. Only a fully set policy lets traffic through; an
//! unset or half-set policy answers `500` so a fresh or broken install never
//! exposes the panel.

use axum::{
    extract::{OriginalUri, Request, State},
    http::header::HOST,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::store::{ConfigStore, ALLOWED_HOST, SECURITY_PATH};

pub const ENV_ALLOWED_HOST: &str = "PANELGATE_ALLOWED_HOST";
pub const ENV_SECURITY_PATH: &str = "PANELGATE_SECURITY_PATH";

pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub allowed_host: String,
    pub path_prefix: String,
}

impl AccessPolicy {
    /// Host must match exactly (ASCII case-insensitive, port included);
    /// path must start with the prefix.
    #[must_use]
    pub fn permits(&self, host: &str, path: &str) -> bool {
        host.eq_ignore_ascii_case(&self.allowed_host) && path.starts_with(&self.path_prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyState {
    Active(AccessPolicy),
    Unset,
    Partial { missing: &'static str },
}

pub struct AccessGate {
    config: Arc<dyn ConfigStore>,
    env: EnvLookup,
}

impl AccessGate {
    #[must_use]
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self::with_env(config, process_env)
    }

    /// Gate with a custom environment lookup.
    #[must_use]
    pub fn with_env(config: Arc<dyn ConfigStore>, env: EnvLookup) -> Self {
        Self { config, env }
    }

    async fn lookup(&self, key: &str, env_key: &str) -> Option<String> {
        match self.config.get(key).await {
            Ok(Some(value)) if !value.is_empty() => return Some(value),
            Ok(_) => {}
            Err(e) => error!("Failed to read {key} from config store, falling back to {env_key}: {e}"),
        }
        (self.env)(env_key).filter(|value| !value.is_empty())
    }

    pub async fn resolve(&self) -> PolicyState {
        let host = self.lookup(ALLOWED_HOST, ENV_ALLOWED_HOST).await;
        let path = self.lookup(SECURITY_PATH, ENV_SECURITY_PATH).await;

        match (host, path) {
            (Some(allowed_host), Some(path_prefix)) => PolicyState::Active(AccessPolicy {
                allowed_host,
                path_prefix,
            }),
            (None, None) => PolicyState::Unset,
            (None, Some(_)) => PolicyState::Partial {
                missing: ALLOWED_HOST,
            },
            (Some(_), None) => PolicyState::Partial {
                missing: SECURITY_PATH,
            },
        }
    }

    /// # Errors
    /// [`AuthError::Forbidden`] when the active policy rejects the request,
    /// [`AuthError::Configuration`] when there is no complete policy.
    pub async fn evaluate(&self, host: &str, path: &str) -> Result<(), AuthError> {
        match self.resolve().await {
            PolicyState::Active(policy) if policy.permits(host, path) => Ok(()),
            PolicyState::Active(_) => Err(AuthError::Forbidden),
            PolicyState::Unset => Err(AuthError::Configuration(
                "access policy is not configured".to_string(),
            )),
            PolicyState::Partial { missing } => Err(AuthError::Configuration(format!(
                "access policy is incomplete: {missing} is not set"
            ))),
        }
    }
}

fn request_host(request: &Request) -> String {
    request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default()
        .to_string()
}

// nested routers see a stripped URI; the policy applies to the full path
fn request_path(request: &Request) -> String {
    request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().path(), |uri| uri.path())
        .to_string()
}

pub async fn access_gate(
    State(gate): State<Arc<AccessGate>>,
    request: Request,
    next: Next,
) -> Response {
    let host = request_host(&request);
    let path = request_path(&request);

    match gate.evaluate(&host, &path).await {
        Ok(()) => next.run(request).await,
        Err(e) => {
            if matches!(e, AuthError::Forbidden) {
                warn!(%host, %path, "Access gate rejected request");
            }
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn policy_env(key: &str) -> Option<String> {
        match key {
            ENV_ALLOWED_HOST => Some("panel.example.com".to_string()),
            ENV_SECURITY_PATH => Some("/secure".to_string()),
            _ => None,
        }
    }

    async fn configured_store() -> Result<Arc<MemoryStore>, StoreError> {
        let store = Arc::new(MemoryStore::new());
        store.set(ALLOWED_HOST, "panel.example.com").await?;
        store.set(SECURITY_PATH, "/secure").await?;
        Ok(store)
    }

    struct BrokenConfig;

    #[async_trait]
    impl ConfigStore for BrokenConfig {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("config table locked".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("config table locked".to_string()))
        }
    }

    fn app(gate: AccessGate) -> Router {
        Router::new()
            .route("/*rest", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(Arc::new(gate), access_gate))
    }

    async fn call(app: Router, host: &str, path: &str) -> anyhow::Result<(StatusCode, String)> {
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri(path)
                    .header(HOST, host)
                    .body(Body::empty())?,
            )
            .await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, String::from_utf8_lossy(&body).into_owned()))
    }

    #[test]
    fn policy_matching() {
        let policy = AccessPolicy {
            allowed_host: "panel.example.com".to_string(),
            path_prefix: "/secure".to_string(),
        };
        assert!(policy.permits("panel.example.com", "/secure/login"));
        assert!(policy.permits("Panel.Example.com", "/secure"));
        assert!(!policy.permits("panel.example.com", "/other"));
        assert!(!policy.permits("evil.example.com", "/secure/login"));
        assert!(!policy.permits("panel.example.com:8081", "/secure/login"));
    }

    #[tokio::test]
    async fn evaluate_decisions() -> anyhow::Result<()> {
        let gate = AccessGate::with_env(configured_store().await?, no_env);

        assert!(gate.evaluate("panel.example.com", "/secure/login").await.is_ok());
        assert!(matches!(
            gate.evaluate("panel.example.com", "/other").await,
            Err(AuthError::Forbidden)
        ));
        assert!(matches!(
            gate.evaluate("other.example.com", "/secure/login").await,
            Err(AuthError::Forbidden)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn resolve_reports_unset_and_partial() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let gate = AccessGate::with_env(store.clone(), no_env);
        assert_eq!(gate.resolve().await, PolicyState::Unset);

        store.set(SECURITY_PATH, "/secure").await?;
        assert_eq!(
            gate.resolve().await,
            PolicyState::Partial {
                missing: ALLOWED_HOST
            }
        );

        // empty store values count as unset
        store.set(ALLOWED_HOST, "").await?;
        assert!(matches!(
            gate.evaluate("panel.example.com", "/secure").await,
            Err(AuthError::Configuration(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn environment_fills_missing_store_values() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let gate = AccessGate::with_env(store.clone(), policy_env);
        assert!(gate.evaluate("panel.example.com", "/secure/x").await.is_ok());

        // store wins over environment
        store.set(SECURITY_PATH, "/vault").await?;
        assert!(matches!(
            gate.evaluate("panel.example.com", "/secure/x").await,
            Err(AuthError::Forbidden)
        ));
        assert!(gate.evaluate("panel.example.com", "/vault/x").await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn store_errors_fall_back_to_environment() {
        let gate = AccessGate::with_env(Arc::new(BrokenConfig), policy_env);
        assert!(gate.evaluate("panel.example.com", "/secure/x").await.is_ok());
        assert!(matches!(
            gate.evaluate("panel.example.com", "/other").await,
            Err(AuthError::Forbidden)
        ));

        // no environment either: still fails closed
        let gate = AccessGate::with_env(Arc::new(BrokenConfig), no_env);
        assert_eq!(gate.resolve().await, PolicyState::Unset);
        assert!(matches!(
            gate.evaluate("panel.example.com", "/secure/x").await,
            Err(AuthError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn middleware_allows_and_denies() -> anyhow::Result<()> {
        let store = configured_store().await?;

        let (status, body) = call(
            app(AccessGate::with_env(store.clone(), no_env)),
            "panel.example.com",
            "/secure/login",
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");

        let (status, body) = call(
            app(AccessGate::with_env(store.clone(), no_env)),
            "panel.example.com",
            "/other",
        )
        .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let json: serde_json::Value = serde_json::from_str(&body)?;
        assert_eq!(json["error"], "Forbidden: host or path not allowed");

        let (status, _) = call(
            app(AccessGate::with_env(store, no_env)),
            "evil.example.com",
            "/secure/login",
        )
        .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn middleware_fails_closed_without_policy() -> anyhow::Result<()> {
        let gate = AccessGate::with_env(Arc::new(MemoryStore::new()), no_env);

        let (status, body) = call(app(gate), "panel.example.com", "/secure/login").await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_str(&body)?;
        assert!(json["error"].is_string());
        Ok(())
    }
}
