//! Report formatting utilities for repo-health outputs.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::domain::{HealthMetrics, HealthScore, ScriptMetrics};
use crate::error::{HealthError, Result};

/// File name of the JSON report inside the reports directory.
pub const JSON_REPORT_FILE: &str = "repo-health.json";

/// Reports directory, relative to the analyzed repository.
pub const DEFAULT_REPORT_DIR: &str = "reports";

/// Output format for a rendered report.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReportFormat {
    /// Multi-section text block.
    Pretty,
    /// JSON document written to disk.
    Json,
}

/// Result of rendering a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedReport {
    /// Pretty text, ready to print.
    Text(String),
    /// Path of the JSON report that was written.
    File(PathBuf),
}

/// Options controlling `render`.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Output format.
    pub format: ReportFormat,
    /// Directory for JSON output; defaults to `<repositoryPath>/reports`.
    pub out_dir: Option<PathBuf>,
    /// Timestamp recorded as `generatedAt`; defaults to now.
    pub generated_at: Option<String>,
}

impl RenderOptions {
    /// Options for the given format with defaults for everything else.
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            out_dir: None,
            generated_at: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    generated_at: &'a str,
    metrics: &'a HealthMetrics,
    score: &'a HealthScore,
}

/// Current UTC time as an ISO-8601 string with millisecond precision.
pub fn generated_at_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render the report in the requested format.
pub fn render(
    metrics: &HealthMetrics,
    score: &HealthScore,
    options: &RenderOptions,
) -> Result<RenderedReport> {
    match options.format {
        ReportFormat::Pretty => Ok(RenderedReport::Text(format_pretty(metrics, score))),
        ReportFormat::Json => {
            let out_dir = options
                .out_dir
                .clone()
                .unwrap_or_else(|| Path::new(&metrics.repository_path).join(DEFAULT_REPORT_DIR));
            let generated_at = options.generated_at.clone().unwrap_or_else(generated_at_now);
            write_json_report(metrics, score, &generated_at, &out_dir).map(RenderedReport::File)
        }
    }
}

/// Render metrics and score as the pretty text report.
pub fn format_pretty(metrics: &HealthMetrics, score: &HealthScore) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Repository: {}", metrics.repository_path);
    append_script(&mut output, "Build", &metrics.build);
    append_script(&mut output, "Test", &metrics.test);

    let files = if metrics.env.env_files.is_empty() {
        "(none)".to_string()
    } else {
        metrics.env.env_files.join(", ")
    };
    let _ = writeln!(output, "Env:");
    let _ = writeln!(output, "  files: {files} ");
    let _ = writeln!(output, "  loadedKeys: {}", metrics.env.env_loaded_keys);
    let _ = writeln!(output, "  usesEnvCore: {}", metrics.env.uses_env_core);

    let _ = writeln!(output, "Score: {} (grade: {})", score.score, score.grade);
    for reason in &score.reasons {
        let _ = writeln!(output, "  - {reason}");
    }

    if output.ends_with('\n') {
        output.pop();
    }
    output
}

/// Write `{generatedAt, metrics, score}` to `<out_dir>/repo-health.json`.
pub fn write_json_report(
    metrics: &HealthMetrics,
    score: &HealthScore,
    generated_at: &str,
    out_dir: &Path,
) -> Result<PathBuf> {
    let payload = JsonReport {
        generated_at,
        metrics,
        score,
    };
    let contents = render_json(&payload)?;
    std::fs::create_dir_all(out_dir).map_err(|err| HealthError::write(out_dir, err))?;
    let path = out_dir.join(JSON_REPORT_FILE);
    std::fs::write(&path, contents).map_err(|err| HealthError::write(&path, err))?;
    Ok(path)
}

/// Render any serializable report payload as pretty JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

fn append_script(output: &mut String, title: &str, script: &ScriptMetrics) {
    let _ = writeln!(output, "{title}:");
    let _ = writeln!(
        output,
        "  script: {}",
        if script.has_script { "yes" } else { "no" }
    );
    let _ = writeln!(output, "  success: {}", display_or_na(script.success));
    let _ = writeln!(output, "  durationMs: {}", display_or_na(script.duration_ms));
    append_preview(output, "stdout", script.stdout_preview.as_deref());
    append_preview(output, "stderr", script.stderr_preview.as_deref());
}

fn append_preview(output: &mut String, label: &str, preview: Option<&str>) {
    let Some(preview) = preview.filter(|text| !text.is_empty()) else {
        return;
    };
    let _ = writeln!(output, "  {label}: |");
    let _ = writeln!(output, "{}", indent(preview, 4));
}

fn display_or_na<T: ToString>(value: Option<T>) -> String {
    value
        .map(|value| value.to_string())
        .unwrap_or_else(|| "n/a".to_string())
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.split('\n')
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
