#![deny(missing_docs)]
//! Repo-health core library.
//!
//! This crate runs a repository's own build and test scripts, scores the
//! observations, and renders the reports consumed by the CLI and the
//! ingestion server.

pub mod analyzer;
pub mod domain;
pub mod error;
pub mod fs;
/// Ordering and indexing of stored report documents.
pub mod history;
pub mod manifest;
pub mod report;
pub mod runner;
pub mod score;

pub use analyzer::{
    AnalyzeOptions, Analyzer, DEFAULT_TIMEOUT, ENV_CANDIDATES, ENV_CORE_PACKAGE, analyze_env,
    analyze_repository, preview, select_test_script,
};
pub use domain::{
    BuildMetrics, EnvMetrics, Grade, HealthMetrics, HealthScore, Report, ScriptMap,
    ScriptMetrics, TestMetrics,
};
pub use error::{HealthError, Result};
pub use fs::{FileSystem, StdFileSystem};
pub use history::{
    INDEX_LIMIT, merge_index_entry, recent_reports, update_index_file, write_index_file,
};
pub use manifest::{MANIFEST_FILE, Manifest};
pub use report::{
    JSON_REPORT_FILE, RenderOptions, RenderedReport, ReportFormat, format_pretty,
    generated_at_now, render, render_json, write_json_report,
};
pub use runner::{ProcessRunner, ScriptOutcome, ScriptRunner};
pub use score::{Penalty, applied_penalties, score_health};
