/// HTTP API tests driving the router in-process
/// No network and no database: the in-memory store and a fake sheet source
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use carlos_dashboard_api::config::{Config, DEFAULT_SHEETS_API_BASE_URL};
use carlos_dashboard_api::errors::AppError;
use carlos_dashboard_api::handlers::AppState;
use carlos_dashboard_api::routes;
use carlos_dashboard_api::sheets_client::{SheetRecord, SheetSource};
use carlos_dashboard_api::store::{LeadStore, MemoryLeadStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Helper function to create test config
fn create_test_config(webhook_secret: Option<&str>) -> Config {
    Config {
        database_url: None,
        port: 3000,
        webhook_secret: webhook_secret.map(str::to_string),
        sheets_service_account_file: None,
        sheets_spreadsheet_id: None,
        sheets_api_base_url: DEFAULT_SHEETS_API_BASE_URL.to_string(),
        sync_interval_secs: None,
        snapshot_interval_secs: 3600,
        rate_limit_per_second: 10,
        rate_limit_burst: 20,
    }
}

struct FakeSheet(Vec<Value>);

#[async_trait]
impl SheetSource for FakeSheet {
    async fn fetch_records(&self) -> Result<Vec<SheetRecord>, AppError> {
        Ok(self
            .0
            .iter()
            .filter_map(|v| v.as_object().cloned())
            .collect())
    }
}

struct FailingSheet;

#[async_trait]
impl SheetSource for FailingSheet {
    async fn fetch_records(&self) -> Result<Vec<SheetRecord>, AppError> {
        Err(AppError::ExternalApiError(
            "Google authentication failed".to_string(),
        ))
    }
}

fn app_with(
    store: Arc<MemoryLeadStore>,
    config: Config,
    sheets: Option<Arc<dyn SheetSource>>,
) -> Router {
    let state = Arc::new(AppState {
        store,
        config,
        sheets,
    });
    routes::router(state, None).unwrap()
}

fn app(store: Arc<MemoryLeadStore>) -> Router {
    app_with(store, create_test_config(None), None)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_webhook(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook/make/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app(Arc::new(MemoryLeadStore::new()));
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_cors_headers_on_responses() {
    let app = app(Arc::new(MemoryLeadStore::new()));
    let request = Request::builder()
        .uri("/api/resumen/")
        .header("origin", "https://dashboard.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}

#[tokio::test]
async fn test_webhook_create_then_update() {
    let store = Arc::new(MemoryLeadStore::new());
    let app = app(store.clone());

    let (status, body) = send(
        &app,
        post_webhook(r#"{"telefono":"555","nombre":"Ana","ingreso_bruto":900}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status":"success","message":"Datos actualizados correctamente","created":true})
    );

    let (status, body) = send(
        &app,
        post_webhook(r#"{"telefono":"555","estado_lead":"FINALIZADO"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);

    let lead = store.find_by_phone("555").await.unwrap().unwrap();
    assert_eq!(lead.estado_lead, "FINALIZADO");
    assert_eq!(lead.nombre.as_deref(), Some("Ana"));
    assert_eq!(store.list_leads().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_malformed_body_is_rejected_without_mutation() {
    let store = Arc::new(MemoryLeadStore::new());
    let app = app(store.clone());

    for body in [
        "{not json",
        r#"{"telefono":"555","ingreso_bruto":"mucho"}"#,
        r#"{"telefono":"555","numero_interacciones":-1}"#,
        r#"{"telefono":"555","ingreso_bruto":10000000000000}"#,
        r#"{"telefono":"555","monto_recomendado":"9999999999.999"}"#,
    ] {
        let (status, response) = send(&app, post_webhook(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(response["status"], "error");
        assert!(response["message"].is_string());
    }

    assert!(store.list_leads().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_stores_money_rounded_to_cents() {
    let store = Arc::new(MemoryLeadStore::new());
    let app = app(store.clone());

    let (status, _) = send(
        &app,
        post_webhook(
            r#"{"telefono":"555","ingreso_bruto":"950.555","monto_recomendado":"123.456","hipoteca_vigente":"1"}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let lead = store.find_by_phone("555").await.unwrap().unwrap();
    assert_eq!(lead.ingreso_bruto.unwrap().to_string(), "950.56");
    assert_eq!(lead.monto_recomendado.unwrap().to_string(), "123.46");
    assert!(lead.hipoteca_vigente);
}

#[tokio::test]
async fn test_webhook_secret_required_when_configured() {
    let store = Arc::new(MemoryLeadStore::new());
    let app = app_with(store.clone(), create_test_config(Some("s3cret")), None);

    let (status, _) = send(&app, post_webhook(r#"{"telefono":"555"}"#)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/webhook/make/")
        .header("content-type", "application/json")
        .header("X-Webhook-Token", "s3cret")
        .body(Body::from(r#"{"telefono":"555"}"#))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], true);
}

#[tokio::test]
async fn test_summary_with_zero_leads() {
    let app = app(Arc::new(MemoryLeadStore::new()));
    let (status, body) = send(&app, get("/api/resumen/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "total_conversaciones": 0,
            "tiempo_promedio": 0.0,
            "interacciones_promedio": 0.0,
            "eficiencia": 0.0
        })
    );
}

#[tokio::test]
async fn test_chart_endpoints_shape() {
    let store = Arc::new(MemoryLeadStore::new());
    let app = app(store.clone());

    for body in [
        r#"{"telefono":"1","ingreso_bruto":500,"hipoteca_vigente":true,"estado_lead":"ACEPTA_DERIVACION"}"#,
        r#"{"telefono":"2","ingreso_bruto":1600}"#,
        r#"{"telefono":"3","estado_lead":"FINALIZADO"}"#,
    ] {
        let (status, _) = send(&app, post_webhook(body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, dia) = send(&app, get("/api/conversaciones-dia/")).await;
    let data = dia["data"].as_array().unwrap();
    assert_eq!(dia["labels"].as_array().unwrap().len(), data.len());
    assert_eq!(data.iter().filter_map(Value::as_i64).sum::<i64>(), 3);

    let (_, ingresos) = send(&app, get("/api/rangos-ingresos/")).await;
    assert_eq!(ingresos["labels"].as_array().unwrap().len(), 7);
    assert_eq!(ingresos["labels"][1], "500-700");
    assert_eq!(ingresos["data"][1], 1);
    assert_eq!(
        ingresos["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .sum::<i64>(),
        2
    );

    let (_, hipoteca) = send(&app, get("/api/hipoteca-estado/")).await;
    assert_eq!(hipoteca, json!({"con_hipoteca": 1, "sin_hipoteca": 2}));

    let (_, embudo) = send(&app, get("/api/embudo-estados/")).await;
    let stages = embudo["embudo"].as_array().unwrap();
    assert_eq!(stages.len(), 7);
    assert_eq!(stages[0], json!({"estado": "CONTACTO_INICIAL", "cantidad": 1}));
    assert_eq!(stages[6], json!({"estado": "FINALIZADO", "cantidad": 1}));

    let (_, resumen) = send(&app, get("/api/resumen/")).await;
    assert_eq!(resumen["total_conversaciones"], 3);
    assert_eq!(resumen["eficiencia"], 33.3);
}

#[tokio::test]
async fn test_daily_metrics_endpoint_lists_snapshots() {
    let store = Arc::new(MemoryLeadStore::new());
    let app = app(store.clone());
    let (_, body) = send(&app, get("/api/metricas-diarias/")).await;
    assert_eq!(body, json!([]));

    send(&app, post_webhook(r#"{"telefono":"1"}"#)).await;
    carlos_dashboard_api::scheduler::refresh_daily_metric(store.as_ref())
        .await
        .unwrap();

    let (status, body) = send(&app, get("/api/metricas-diarias/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["total_conversaciones"], 1);
}

#[tokio::test]
async fn test_dashboard_page_renders() {
    let app = app(Arc::new(MemoryLeadStore::new()));
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Carlos AI"));
}

#[tokio::test]
async fn test_sync_without_configuration() {
    let app = app(Arc::new(MemoryLeadStore::new()));
    let (status, body) = send(&app, get("/sincronizar/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status":"error","message":"Configuración de Google Sheets no encontrada"})
    );
}

#[tokio::test]
async fn test_sync_skips_rows_without_phone() {
    let store = Arc::new(MemoryLeadStore::new());
    let sheet = FakeSheet(vec![
        json!({"Telefono": "111", "Nombre": "Ana", "Hipoteca_Vigente": "SI"}),
        json!({"Telefono": "", "Nombre": "Sin teléfono"}),
        json!({"Telefono": 222, "Ingreso_Bruto": 1200}),
    ]);
    let app = app_with(
        store.clone(),
        create_test_config(None),
        Some(Arc::new(sheet) as Arc<dyn SheetSource>),
    );

    let request = Request::builder()
        .method("POST")
        .uri("/sincronizar/")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(
        body["message"],
        "Sincronización completada. 2 registros procesados."
    );
    assert_eq!(body["report"]["skipped"], 1);
    assert_eq!(store.list_leads().await.unwrap().len(), 2);
    assert!(store.find_by_phone("111").await.unwrap().unwrap().hipoteca_vigente);
}

#[tokio::test]
async fn test_sync_external_failure_is_500() {
    let app = app_with(
        Arc::new(MemoryLeadStore::new()),
        create_test_config(None),
        Some(Arc::new(FailingSheet) as Arc<dyn SheetSource>),
    );
    let (status, body) = send(&app, get("/sincronizar/")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Google authentication failed");
}
