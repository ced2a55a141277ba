//! Request/response metrics endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;

use crate::auth;
use crate::error::{Error, Result};
use crate::metrics::Engine;
use crate::stream::ShutdownSignal;

mod models;

pub use models::{ContainerScope, MetricsResponse, ProcessScope, ScopedMetrics};

#[derive(Debug, serde::Deserialize)]
pub struct MetricsParams {
    pub target: Option<String>,
}

#[derive(Clone)]
struct ApiState {
    engine: Arc<Engine>,
    token: Arc<str>,
}

fn json_response(status: StatusCode, body: impl Serialize) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, error: &'static str) -> Response {
    json_response(status, models::ErrorBody { error })
}

async fn get_metrics(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<MetricsParams>,
) -> Response {
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(auth::bearer_token);
    if !auth::is_authorized(&state.token, provided) {
        log::warn!("Rejected unauthorized metrics request");
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let snapshot = match state.engine.collect_blocking().await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            log::error!("Failed to collect snapshot: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    let scoped_metrics = params
        .target
        .as_deref()
        .and_then(|target| ScopedMetrics::build(target, &snapshot));
    json_response(
        StatusCode::OK,
        MetricsResponse {
            snapshot: &snapshot,
            scoped_metrics,
        },
    )
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    /// Serves snapshots on `GET <path>`. Other paths answer 404.
    pub fn new(engine: Arc<Engine>, path: &str, token: impl Into<Arc<str>>) -> Self {
        let state = ApiState {
            engine,
            token: token.into(),
        };
        let router = axum::Router::new()
            .route(path, get(get_metrics))
            .with_state(state);
        Self { router }
    }

    pub fn into_router(self) -> axum::Router {
        self.router
    }

    /// Serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the address cannot be bound and
    /// [`Error::Serve`] if accepting connections fails.
    pub async fn listen(self, addr: &str, shutdown: ShutdownSignal) -> Result<()> {
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        log::info!("Serving metrics on http://{addr}");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| Error::Serve {
                addr: addr.to_string(),
                source,
            })
    }
}
