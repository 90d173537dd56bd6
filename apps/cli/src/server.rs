//! HTTP boundary: `POST /api/buscar` runs one search session per request.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use color_eyre::eyre::Result;
use jobscraper_crawler::{SessionController, SilentProgress};
use jobscraper_render::Renderer;
use jobscraper_shared::{ScrapeConfig, ScraperError};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

const MISSING_TERM: &str = "Debe proporcionar un puesto de trabajo para buscar.";
const SCRAPE_FAILED: &str = "Ocurrió un error al realizar el scraping.";

/// Produces a fresh renderer for each search session.
pub(crate) type RendererFactory =
    Arc<dyn Fn() -> jobscraper_shared::Result<Arc<dyn Renderer>> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub renderers: RendererFactory,
    pub config: ScrapeConfig,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    puesto: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    fn bad_request() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: MISSING_TERM,
            details: None,
        }
    }

    fn internal(details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: SCRAPE_FAILED,
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/buscar", post(buscar))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors()),
        )
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C or SIGTERM.
pub(crate) async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "API listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("received shutdown signal, starting graceful shutdown");
}

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "jobscraper",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["POST /api/buscar", "GET /health"],
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn buscar(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    let term = match payload {
        Ok(Json(request)) => request.puesto.unwrap_or_default(),
        Err(rejection) => {
            warn!(error = %rejection, "rejected search body");
            return ApiError::bad_request().into_response();
        }
    };
    let term = term.trim().to_string();
    if term.is_empty() {
        return ApiError::bad_request().into_response();
    }

    info!(puesto = %term, "search request received");

    let renderer = match (state.renderers)() {
        Ok(renderer) => renderer,
        Err(e) => {
            error!(error = %e, "could not create renderer");
            return ApiError::internal(e.to_string()).into_response();
        }
    };
    let controller = SessionController::new(renderer, state.config.clone());

    // A panicking session surfaces as a join error instead of tearing down the connection.
    let session = tokio::spawn(async move { controller.run(&term, &SilentProgress).await });

    match session.await {
        Ok(Ok(report)) => (StatusCode::OK, Json(report.records)).into_response(),
        Ok(Err(ScraperError::Validation { .. })) => ApiError::bad_request().into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "search session failed");
            ApiError::internal(e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "search session panicked");
            ApiError::internal(e.to_string()).into_response()
        }
    }
}
