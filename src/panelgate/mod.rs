use anyhow::{bail, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;

pub mod gate;
pub mod handlers;
pub mod openapi;

use crate::auth::AuthService;
use crate::store::{AccountStore, ConfigStore};
use gate::{access_gate, AccessGate, AccessPolicy, PolicyState};

pub const SETUP_REQUIRED: &str =
    "Initial setup required: run `panelgate setup --allowed-host <host> --security-path <path>`";

/// `/`, `` and `/panel/` become `/`, `/` and `/panel`.
#[must_use]
pub fn normalize_context(web_context: &str) -> String {
    let trimmed = web_context.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

const LOGIN_ROUTE: &str = "/auth/login";
const ACCOUNT_ROUTE: &str = "/auth/account";

/// Full path of `route` once mounted under `web_context`.
fn mounted(web_context: &str, route: &str) -> String {
    match normalize_context(web_context).as_str() {
        "/" => route.to_string(),
        context => format!("{context}{route}"),
    }
}

/// Check that every panel route mounted under `web_context` falls under the
/// policy's path prefix; otherwise the gate would reject all of them.
///
/// # Errors
/// Returns an error naming the context to use instead.
pub fn check_context(policy: &AccessPolicy, web_context: &str) -> Result<()> {
    let unreachable: Vec<String> = [LOGIN_ROUTE, ACCOUNT_ROUTE]
        .iter()
        .map(|route| mounted(web_context, route))
        .filter(|path| !path.starts_with(&policy.path_prefix))
        .collect();
    if !unreachable.is_empty() {
        bail!(
            "Panel routes {} are outside security path {}: start the server with `--web-context {}`",
            unreachable.join(", "),
            policy.path_prefix,
            policy.path_prefix
        );
    }
    Ok(())
}

/// Application router.
///
/// Panel routes live under `web_context` behind the access gate; `/health`
/// and `/openapi.json` are always reachable.
pub fn router(auth: Arc<AuthService>, gate: Arc<AccessGate>, web_context: &str) -> Router {
    let panel = Router::new()
        .route(LOGIN_ROUTE, post(handlers::login))
        .route(ACCOUNT_ROUTE, get(handlers::account))
        .layer(middleware::from_fn_with_state(gate, access_gate))
        .layer(Extension(auth));

    let context = normalize_context(web_context);
    let app = if context == "/" {
        Router::new().merge(panel)
    } else {
        Router::new().nest(&context, panel)
    };

    app.route("/openapi.json", get(|| async { Json(openapi::openapi()) }))
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
}

/// Serve the panel until Ctrl-C.
///
/// # Errors
/// Returns an error if the access policy is not fully configured, the panel
/// would be mounted outside the security path, or the listener cannot be
/// bound.
pub async fn new<S>(port: u16, store: Arc<S>, web_context: &str) -> Result<()>
where
    S: AccountStore + ConfigStore + 'static,
{
    let gate = Arc::new(AccessGate::new(store.clone()));
    match gate.resolve().await {
        PolicyState::Active(policy) => {
            check_context(&policy, web_context)?;
            info!(
                "Access restricted to host {} under {}",
                policy.allowed_host, policy.path_prefix
            );
        }
        PolicyState::Unset => bail!(SETUP_REQUIRED),
        PolicyState::Partial { missing } => bail!("{SETUP_REQUIRED} ({missing} is not set)"),
    }

    let auth = Arc::new(AuthService::new(store.clone(), store));
    let app = router(auth, gate, web_context);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let method = request.method().as_str();
    let path = request.uri().path();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or("unmatched", MatchedPath::as_str);
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", method, path, route, request_id)
}
