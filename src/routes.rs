use crate::handlers::{self, AppState};
use crate::webhook_handler;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Request size limit: 5MB max payload
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Per-IP token bucket for the rate limiter.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub per_second: u64,
    pub burst: u32,
}

/// Builds the application router.
///
/// `/health` bypasses the rate limiter. Passing `None` disables rate limiting,
/// which is needed when requests carry no peer address (in-process tests).
pub fn router(state: Arc<AppState>, rate_limit: Option<RateLimit>) -> anyhow::Result<Router> {
    let mut protected_routes = Router::new()
        // Dashboard
        .route("/", get(handlers::dashboard_page))
        .route("/api/resumen/", get(handlers::resumen))
        .route("/api/conversaciones-dia/", get(handlers::conversaciones_dia))
        .route("/api/rangos-ingresos/", get(handlers::rangos_ingresos))
        .route("/api/hipoteca-estado/", get(handlers::hipoteca_estado))
        .route("/api/embudo-estados/", get(handlers::embudo_estados))
        .route("/api/metricas-diarias/", get(handlers::metricas_diarias))
        // Make automation webhook
        .route("/webhook/make/", post(webhook_handler::make_webhook))
        // Spreadsheet sync
        .route(
            "/sincronizar/",
            get(handlers::sincronizar).post(handlers::sincronizar),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    if let Some(limit) = rate_limit {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(limit.per_second)
                .burst_size(limit.burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
        );
        tracing::info!(
            "Rate limiting: {} req/s per IP, burst of {}",
            limit.per_second,
            limit.burst
        );
        protected_routes = protected_routes.layer(GovernorLayer {
            config: governor_conf,
        });
    }

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
