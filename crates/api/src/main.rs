use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use valuator_core::domain::report::ScoreDocument;
use valuator_core::domain::request::ValuationRequest;
use valuator_core::ingest::provider::{HttpJsonDataProvider, MarketDataProvider};
use valuator_core::observer::TracingObserver;
use valuator_core::pipeline::{analyze_company, AnalysisContext};
use valuator_core::ScoringError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = valuator_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let provider: Option<Arc<dyn MarketDataProvider>> =
        match HttpJsonDataProvider::from_settings(&settings) {
            Ok(p) => Some(Arc::new(p)),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(
                    error = %e,
                    "data provider unavailable; starting API in degraded mode"
                );
                None
            }
        };

    let state = AppState {
        provider,
        price_currency: settings.price_currency(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/analyze_company", post(analyze))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    provider: Option<Arc<dyn MarketDataProvider>>,
    price_currency: String,
}

#[derive(Debug, Serialize)]
struct ApiScoreDocument {
    request_id: Uuid,
    document: ScoreDocument,
}

#[derive(Debug, Serialize)]
struct ApiError {
    request_id: Uuid,
    error: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);

async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<ValuationRequest>, JsonRejection>,
) -> Result<Json<ApiScoreDocument>, ApiFailure> {
    let request_id = Uuid::new_v4();
    let fail = |status: StatusCode, error: String| (status, Json(ApiError { request_id, error }));

    let Some(provider) = &state.provider else {
        return Err(fail(
            StatusCode::SERVICE_UNAVAILABLE,
            "data provider is not configured".to_string(),
        ));
    };
    let Json(request) = body.map_err(|e| fail(StatusCode::BAD_REQUEST, e.body_text()))?;

    let ctx = AnalysisContext {
        today: request.today.unwrap_or_else(|| Utc::now().date_naive()),
        price_currency: state.price_currency.clone(),
    };

    tracing::info!(%request_id, ticker = %request.ticker, "analyze_company requested");
    let document = analyze_company(&**provider, &request, &ctx, &TracingObserver)
        .await
        .map_err(|err| {
            let status = status_for(&err);
            if status.is_server_error() {
                let e = anyhow::Error::new(err.clone());
                sentry_anyhow::capture_anyhow(&e);
            }
            tracing::warn!(%request_id, %status, error = %err, "analyze_company failed");
            fail(status, err.to_string())
        })?;

    Ok(Json(ApiScoreDocument {
        request_id,
        document,
    }))
}

fn status_for(err: &ScoringError) -> StatusCode {
    match err {
        ScoringError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        ScoringError::InsufficientData { .. }
        | ScoringError::MissingField { .. }
        | ScoringError::CurrencyMismatchUnresolved { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ScoringError::Fetch { .. } => StatusCode::BAD_GATEWAY,
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &valuator_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
