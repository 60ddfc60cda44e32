//! HTTP handlers for the repo-health ingestion server.

use actix_web::http::Method;
use actix_web::middleware::DefaultHeaders;
use actix_web::{HttpResponse, Responder, get, web};
use chrono::Utc;
#[allow(unused_imports)]
use repohealth_core::Report;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::openapi::ApiDoc;
use crate::service::{IngestError, IngestService};

/// Ingest endpoint, matching the hosted function path.
pub const INGEST_PATH: &str = "/.netlify/functions/repo-health";
/// Ingest endpoint alias under `/api`.
pub const INGEST_ALIAS_PATH: &str = "/api/repo-health";
/// List endpoint, matching the hosted function path.
pub const LIST_PATH: &str = "/.netlify/functions/repo-health-list";
/// List endpoint alias under `/api`.
pub const LIST_ALIAS_PATH: &str = "/api/repo-health/list";

/// Largest accepted report body.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone)]
/// Shared application state for handlers.
pub struct AppState {
    /// Ingestion service over the configured backend.
    pub service: IngestService,
}

/// Successful ingest acknowledgement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    /// Always `true`.
    pub ok: bool,
    /// Storage key the report was written under.
    pub saved: String,
}

/// Register every endpoint on an app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    for path in [INGEST_PATH, INGEST_ALIAS_PATH] {
        cfg.service(
            web::resource(path)
                .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
                .route(web::post().to(ingest_report))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(method_not_allowed)),
        );
    }
    for path in [LIST_PATH, LIST_ALIAS_PATH] {
        cfg.service(
            web::resource(path)
                .route(web::get().to(list_reports))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(method_not_allowed)),
        );
    }
    cfg.service(openapi_json);
}

/// Permissive CORS headers attached to every response.
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET,POST,OPTIONS"))
        .add(("Access-Control-Allow-Headers", "Content-Type"))
}

#[utoipa::path(
    post,
    path = "/.netlify/functions/repo-health",
    request_body = Report,
    responses(
        (status = 200, description = "Report stored", body = IngestResponse),
        (status = 400, description = "Missing body, invalid JSON or not an object"),
        (status = 500, description = "Storage failure")
    ),
    tag = "reports"
)]
/// Store one submitted report.
pub async fn ingest_report(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let service = state.service.clone();
    let result = web::block(move || service.ingest(&body, Utc::now())).await;

    match result {
        Ok(Ok(saved)) => HttpResponse::Ok().json(IngestResponse { ok: true, saved }),
        Ok(Err(IngestError::Storage(err))) => {
            log::error!("failed to store report: {err}");
            internal_error()
        }
        Ok(Err(err)) => plain_text(HttpResponse::BadRequest(), err.to_string()),
        Err(err) => {
            log::error!("ingest task failed: {err}");
            internal_error()
        }
    }
}

#[utoipa::path(
    get,
    path = "/.netlify/functions/repo-health-list",
    responses(
        (status = 200, description = "Stored reports, newest first", body = [Report]),
        (status = 500, description = "Storage failure")
    ),
    tag = "reports"
)]
/// List the most recent stored reports.
pub async fn list_reports(state: web::Data<AppState>) -> HttpResponse {
    let service = state.service.clone();
    let result = web::block(move || service.list()).await;

    match result {
        Ok(Ok(reports)) => HttpResponse::Ok().json(reports),
        Ok(Err(err)) => {
            log::error!("failed to list reports: {err}");
            internal_error()
        }
        Err(err) => {
            log::error!("list task failed: {err}");
            internal_error()
        }
    }
}

async fn preflight() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

async fn method_not_allowed() -> HttpResponse {
    plain_text(HttpResponse::MethodNotAllowed(), "Method Not Allowed")
}

fn internal_error() -> HttpResponse {
    plain_text(HttpResponse::InternalServerError(), "Internal Server Error")
}

fn plain_text(
    mut builder: actix_web::HttpResponseBuilder,
    body: impl Into<String>,
) -> HttpResponse {
    builder
        .content_type("text/plain; charset=utf-8")
        .body(body.into())
}

#[utoipa::path(
    get,
    path = "/api/openapi.json",
    responses(
        (status = 200, description = "OpenAPI document")
    ),
    tag = "docs"
)]
#[get("/api/openapi.json")]
/// Serve the OpenAPI specification.
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use repohealth_core::{
        EnvMetrics, HealthMetrics, Report, ScriptMap, ScriptMetrics, score_health,
    };
    use std::sync::Arc;

    use crate::storage::testing::{FailingStore, MemoryStore};
    use crate::storage::{FsReportStore, SharedStore};

    fn state_with(store: SharedStore, list_limit: usize) -> web::Data<AppState> {
        web::Data::new(AppState {
            service: IngestService::new(store, list_limit),
        })
    }

    fn sample_report(repository_id: &str, generated_at: &str) -> Report {
        let mut scripts = ScriptMap::new();
        scripts.insert("build".to_string(), "tsc -p .".to_string());
        let metrics = HealthMetrics {
            repository_path: "/work/svc".to_string(),
            scripts,
            build: ScriptMetrics {
                has_script: true,
                success: Some(true),
                duration_ms: Some(1200),
                stdout_preview: Some("compiled".to_string()),
                stderr_preview: None,
            },
            test: ScriptMetrics::missing(),
            env: EnvMetrics {
                env_files: vec![".env".to_string()],
                env_loaded_keys: 3,
                uses_env_core: true,
            },
        };
        let score = score_health(&metrics);
        Report {
            repository_id: repository_id.to_string(),
            generated_at: generated_at.to_string(),
            metrics,
            score,
        }
    }

    macro_rules! init_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .wrap(cors_headers())
                    .app_data($state)
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn ingest_returns_storage_key() {
        let store = Arc::new(MemoryStore::default());
        let app = init_app!(state_with(store.clone(), 100));
        let body = serde_json::to_vec(&sample_report("svc", "2025-01-01T00:00:00.000Z"))
            .expect("json");

        let req = test::TestRequest::post()
            .uri(INGEST_PATH)
            .insert_header(("Content-Type", "application/json"))
            .set_payload(body)
            .to_request();
        let resp: IngestResponse = test::call_and_read_body_json(&app, req).await;

        assert!(resp.ok);
        assert!(resp.saved.starts_with("svc/"));
        assert!(resp.saved.ends_with("Z.json"));
        assert_eq!(store.keys(), vec![resp.saved]);
    }

    #[actix_web::test]
    async fn responses_carry_cors_headers() {
        let app = init_app!(state_with(Arc::new(MemoryStore::default()), 100));

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri(INGEST_PATH)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let headers = resp.headers();
        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "*");
        assert_eq!(
            headers.get("Access-Control-Allow-Methods").unwrap(),
            "GET,POST,OPTIONS"
        );
        assert_eq!(
            headers.get("Access-Control-Allow-Headers").unwrap(),
            "Content-Type"
        );

        let req = test::TestRequest::get().uri(LIST_ALIAS_PATH).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
    }

    #[actix_web::test]
    async fn wrong_methods_are_rejected() {
        let app = init_app!(state_with(Arc::new(MemoryStore::default()), 100));

        let req = test::TestRequest::get().uri(INGEST_PATH).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(test::read_body(resp).await, "Method Not Allowed");

        let req = test::TestRequest::post().uri(LIST_PATH).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[actix_web::test]
    async fn bad_bodies_return_400_and_store_nothing() {
        let store = Arc::new(MemoryStore::default());
        let app = init_app!(state_with(store.clone(), 100));

        for (payload, message) in [
            ("", "Missing body"),
            ("{oops", "Invalid JSON"),
            ("\"just a string\"", "Invalid report"),
        ] {
            let req = test::TestRequest::post()
                .uri(INGEST_ALIAS_PATH)
                .set_payload(payload)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(test::read_body(resp).await, message);
        }

        assert!(store.keys().is_empty());
    }

    #[actix_web::test]
    async fn storage_failures_return_500() {
        let app = init_app!(state_with(Arc::new(FailingStore), 100));

        let req = test::TestRequest::post()
            .uri(INGEST_PATH)
            .set_payload("{\"repositoryId\":\"svc\"}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(test::read_body(resp).await, "Internal Server Error");

        let req = test::TestRequest::get().uri(LIST_PATH).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn list_returns_reports_newest_first() {
        let root = temp_root();
        let store: SharedStore = Arc::new(FsReportStore::new(root.clone(), None));
        let app = init_app!(state_with(store, 100));

        let older = sample_report("svc-a", "2025-01-01T00:00:00.000Z");
        let newer = sample_report("svc-b", "2025-01-02T00:00:00.000Z");
        for report in [&older, &newer] {
            let req = test::TestRequest::post()
                .uri(INGEST_PATH)
                .set_payload(serde_json::to_vec(report).expect("json"))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get().uri(LIST_PATH).to_request();
        let listed: Vec<Report> = test::call_and_read_body_json(&app, req).await;

        assert_eq!(listed, vec![newer, older]);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[actix_web::test]
    async fn list_returns_stored_metrics_and_score_verbatim() {
        let root = temp_root();
        let store: SharedStore = Arc::new(FsReportStore::new(root.clone(), None));
        let app = init_app!(state_with(store, 100));

        let metrics = r#"{"repositoryPath":"/r","scripts":{"test":"jest","build":"tsc"},"build":{"hasScript":false,"success":null,"durationMs":null},"test":{"hasScript":false,"success":null,"durationMs":null},"env":{"envFiles":[],"envLoadedKeys":0,"usesEnvCore":false}}"#;
        let score = r#"{"score":40,"grade":"D","reasons":["missing build script","missing test script"]}"#;
        let body = format!(
            r#"{{"repositoryId":"svc","generatedAt":"2025-01-01T00:00:00.000Z","metrics":{metrics},"score":{score}}}"#
        );
        let req = test::TestRequest::post()
            .uri(INGEST_PATH)
            .set_payload(body.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri(LIST_PATH).to_request();
        let listed = test::call_and_read_body(&app, req).await;
        let listed = std::str::from_utf8(&listed).expect("utf8");

        assert!(listed.contains(&format!("\"metrics\":{metrics}")), "{listed}");
        assert!(listed.contains(&format!("\"score\":{score}")), "{listed}");
        assert_eq!(listed, format!("[{body}]"));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[actix_web::test]
    async fn list_is_capped() {
        let store = Arc::new(MemoryStore::default());
        for day in 1..=5 {
            let report = sample_report("svc", &format!("2025-01-0{day}T00:00:00.000Z"));
            crate::storage::ReportStore::put(
                store.as_ref(),
                &format!("svc/{day}.json"),
                &serde_json::to_vec(&report).expect("json"),
            )
            .expect("put");
        }
        let app = init_app!(state_with(store, 3));

        let req = test::TestRequest::get().uri(LIST_PATH).to_request();
        let listed: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;

        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0]["generatedAt"], "2025-01-05T00:00:00.000Z");
    }

    #[actix_web::test]
    async fn openapi_lists_report_endpoints() {
        let app = init_app!(state_with(Arc::new(MemoryStore::default()), 100));

        let req = test::TestRequest::get().uri("/api/openapi.json").to_request();
        let doc: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert!(doc["paths"].get(INGEST_PATH).is_some());
        assert!(doc["paths"].get(LIST_PATH).is_some());
    }

    fn temp_root() -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        std::env::temp_dir().join(format!("repohealth_routes_test_{nanos}"))
    }
}
