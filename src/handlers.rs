use crate::config::Config;
use crate::errors::AppError;
use crate::metrics;
use crate::models::*;
use crate::sheets_client::SheetSource;
use crate::store::LeadStore;
use crate::sync;
use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Upper bound of rows returned by `/api/metricas-diarias/`.
const DAILY_METRICS_LIMIT: usize = 90;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lead and daily metric storage.
    pub store: Arc<dyn LeadStore>,
    /// Application configuration.
    pub config: Config,
    /// Spreadsheet source, present only when Sheets credentials are configured.
    pub sheets: Option<Arc<dyn SheetSource>>,
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "carlos-dashboard-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /
///
/// Dashboard page. Summary figures are rendered server-side; the charts load
/// their data from the `/api/...` endpoints.
pub async fn dashboard_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let leads = state.store.list_leads().await?;
    let summary = metrics::dashboard_summary(&leads);
    Ok(Html(render_dashboard(&summary)))
}

/// GET /api/resumen/
pub async fn resumen(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardSummary>, AppError> {
    let leads = state.store.list_leads().await?;
    Ok(Json(metrics::dashboard_summary(&leads)))
}

/// GET /api/conversaciones-dia/
///
/// New conversations per day over the last 30 days, oldest first.
pub async fn conversaciones_dia(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChartSeries>, AppError> {
    let leads = state.store.list_leads().await?;
    let today = Utc::now().date_naive();
    Ok(Json(metrics::daily_conversations(&leads, today)))
}

/// GET /api/rangos-ingresos/
pub async fn rangos_ingresos(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChartSeries>, AppError> {
    let leads = state.store.list_leads().await?;
    Ok(Json(metrics::income_distribution(&leads)))
}

/// GET /api/hipoteca-estado/
pub async fn hipoteca_estado(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MortgageSplit>, AppError> {
    let leads = state.store.list_leads().await?;
    Ok(Json(metrics::mortgage_split(&leads)))
}

/// GET /api/embudo-estados/
pub async fn embudo_estados(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FunnelResponse>, AppError> {
    let leads = state.store.list_leads().await?;
    Ok(Json(metrics::funnel_counts(&leads)))
}

/// GET /api/metricas-diarias/
pub async fn metricas_diarias(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DailyMetric>>, AppError> {
    let metrics = state.store.list_daily_metrics(DAILY_METRICS_LIMIT).await?;
    Ok(Json(metrics))
}

/// GET|POST /sincronizar/
///
/// Imports the spreadsheet with create-if-absent semantics. A missing Sheets
/// configuration is reported in the body with a 200 status.
pub async fn sincronizar(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Some(ref source) = state.sheets else {
        tracing::warn!("Sync requested but Google Sheets is not configured");
        return Ok(Json(json!({
            "status": "error",
            "message": "Configuración de Google Sheets no encontrada"
        })));
    };

    tracing::info!("Manual spreadsheet sync requested");
    let report = sync::sync_from_spreadsheet(state.store.as_ref(), source.as_ref()).await?;

    Ok(Json(json!({
        "status": "success",
        "message": format!(
            "Sincronización completada. {} registros procesados.",
            report.processed()
        ),
        "report": report,
    })))
}

fn render_dashboard(summary: &DashboardSummary) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Carlos AI - Dashboard</title>
    <script src="https://cdn.jsdelivr.net/npm/chart.js@4"></script>
    <style>
        body {{ font-family: sans-serif; margin: 2rem; background: #f5f6fa; }}
        .cards {{ display: flex; gap: 1rem; flex-wrap: wrap; }}
        .card {{ background: #fff; border-radius: 8px; padding: 1rem 1.5rem; min-width: 180px; }}
        .card span {{ display: block; font-size: 2rem; font-weight: bold; }}
        .charts {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(420px, 1fr)); gap: 1rem; margin-top: 2rem; }}
        canvas {{ background: #fff; border-radius: 8px; padding: 1rem; }}
    </style>
</head>
<body>
    <h1>Carlos AI</h1>
    <div class="cards">
        <div class="card">Conversaciones<span>{total}</span></div>
        <div class="card">Tiempo promedio (min)<span>{tiempo}</span></div>
        <div class="card">Interacciones promedio<span>{interacciones}</span></div>
        <div class="card">Eficiencia (%)<span>{eficiencia}</span></div>
    </div>
    <div class="charts">
        <canvas id="conversaciones"></canvas>
        <canvas id="ingresos"></canvas>
        <canvas id="hipoteca"></canvas>
        <canvas id="embudo"></canvas>
    </div>
    <script>
        async function load(url) {{ return (await fetch(url)).json(); }}
        (async () => {{
            const dia = await load('/api/conversaciones-dia/');
            new Chart(document.getElementById('conversaciones'), {{
                type: 'line', data: {{ labels: dia.labels, datasets: [{{ label: 'Conversaciones', data: dia.data }}] }}
            }});
            const ingresos = await load('/api/rangos-ingresos/');
            new Chart(document.getElementById('ingresos'), {{
                type: 'bar', data: {{ labels: ingresos.labels, datasets: [{{ label: 'Leads', data: ingresos.data }}] }}
            }});
            const hipoteca = await load('/api/hipoteca-estado/');
            new Chart(document.getElementById('hipoteca'), {{
                type: 'doughnut',
                data: {{ labels: ['Con hipoteca', 'Sin hipoteca'], datasets: [{{ data: [hipoteca.con_hipoteca, hipoteca.sin_hipoteca] }}] }}
            }});
            const embudo = await load('/api/embudo-estados/');
            new Chart(document.getElementById('embudo'), {{
                type: 'bar', options: {{ indexAxis: 'y' }},
                data: {{ labels: embudo.embudo.map(e => e.estado), datasets: [{{ label: 'Leads', data: embudo.embudo.map(e => e.cantidad) }}] }}
            }});
        }})();
    </script>
</body>
</html>
"#,
        total = summary.total_conversaciones,
        tiempo = summary.tiempo_promedio,
        interacciones = summary.interacciones_promedio,
        eficiencia = summary.eficiencia,
    )
}
