//! Domain entities for repo-health.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Script names declared by a manifest, mapped to their command strings.
pub type ScriptMap = BTreeMap<String, String>;

/// Outcome of running (or not running) a single manifest script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScriptMetrics {
    /// Whether the manifest declares the script.
    pub has_script: bool,
    /// Exit outcome; `None` only when the script is not declared.
    pub success: Option<bool>,
    /// Wall-clock run time; `None` iff the script was not run.
    pub duration_ms: Option<u64>,
    /// Bounded excerpt of captured stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_preview: Option<String>,
    /// Bounded excerpt of captured stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_preview: Option<String>,
}

impl ScriptMetrics {
    /// Metrics for a script the manifest does not declare.
    pub fn missing() -> Self {
        Self::default()
    }

    /// True when the script was declared and exited unsuccessfully.
    pub fn failed(&self) -> bool {
        self.has_script && self.success == Some(false)
    }
}

/// Metrics for the `build` script.
pub type BuildMetrics = ScriptMetrics;

/// Metrics for the `test` (or `test:ci`) script.
pub type TestMetrics = ScriptMetrics;

/// Environment-configuration hygiene observations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvMetrics {
    /// Candidate env files found, in candidate order.
    pub env_files: Vec<String>,
    /// Number of keys parsed across all found files.
    pub env_loaded_keys: usize,
    /// Whether the manifest depends on the shared env-loader package.
    pub uses_env_core: bool,
}

/// Everything the analyzer observed about a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    /// Directory that was analyzed.
    pub repository_path: String,
    /// Scripts read verbatim from the manifest.
    #[schema(value_type = Object)]
    pub scripts: ScriptMap,
    /// Build script outcome.
    #[schema(value_type = ScriptMetrics)]
    pub build: BuildMetrics,
    /// Test script outcome.
    #[schema(value_type = ScriptMetrics)]
    pub test: TestMetrics,
    /// Environment-file observations.
    pub env: EnvMetrics,
}

/// Letter bucket derived from a numeric score.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Grade {
    /// Score of 90 or more.
    A,
    /// Score of 75 or more.
    B,
    /// Score of 60 or more.
    C,
    /// Score of 40 or more.
    D,
    /// Anything lower.
    E,
}

impl Grade {
    /// Grade for an already clamped score.
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Grade::A,
            75..=89 => Grade::B,
            60..=74 => Grade::C,
            40..=59 => Grade::D,
            _ => Grade::E,
        }
    }

    /// Letter label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted health score for a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthScore {
    /// Aggregate score, 0-100.
    pub score: u8,
    /// Letter grade for `score`.
    pub grade: Grade,
    /// Applied penalties, in rule order.
    pub reasons: Vec<String>,
}

/// Persisted unit submitted to the ingestion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Repository identifier used as the storage namespace.
    pub repository_id: String,
    /// ISO-8601 generation timestamp.
    pub generated_at: String,
    /// Analyzer observations.
    pub metrics: HealthMetrics,
    /// Score computed from `metrics`.
    pub score: HealthScore,
}
