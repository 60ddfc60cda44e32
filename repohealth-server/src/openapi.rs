//! OpenAPI specification for the repo-health server.

use utoipa::OpenApi;

use repohealth_core::{EnvMetrics, Grade, HealthMetrics, HealthScore, Report, ScriptMetrics};

use crate::routes::IngestResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::ingest_report,
        crate::routes::list_reports,
        crate::routes::openapi_json
    ),
    components(
        schemas(
            Report,
            HealthMetrics,
            HealthScore,
            ScriptMetrics,
            EnvMetrics,
            Grade,
            IngestResponse
        )
    ),
    tags(
        (name = "reports", description = "Report ingestion and listing"),
        (name = "docs", description = "API documentation")
    )
)]
/// OpenAPI specification for the repo-health server.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn openapi_includes_expected_paths() {
        let doc = ApiDoc::openapi();
        let paths = doc.paths.paths;

        assert!(paths.contains_key("/.netlify/functions/repo-health"));
        assert!(paths.contains_key("/.netlify/functions/repo-health-list"));
        assert!(paths.contains_key("/api/openapi.json"));
    }

    #[test]
    fn openapi_registers_report_schemas() {
        let doc = ApiDoc::openapi();
        let schemas = doc.components.expect("components").schemas;

        for name in ["Report", "HealthMetrics", "ScriptMetrics", "Grade", "IngestResponse"] {
            assert!(schemas.contains_key(name), "missing schema {name}");
        }
    }
}
