//! Weighted health scoring.

use std::fmt;

use crate::domain::{Grade, HealthMetrics, HealthScore, ScriptMetrics};

/// Score before any penalty is applied.
pub const STARTING_SCORE: i32 = 100;

/// Build runs longer than this are penalised.
pub const SLOW_BUILD_MS: u64 = 180_000;

/// Test runs longer than this are penalised.
pub const SLOW_TEST_MS: u64 = 120_000;

/// A scoring rule that can fire against `HealthMetrics`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Penalty {
    /// No build script declared.
    MissingBuild,
    /// Build script failed.
    BuildFailed,
    /// Build script succeeded slowly.
    BuildSlow,
    /// No test script declared.
    MissingTest,
    /// Test script failed.
    TestFailed,
    /// Test script succeeded slowly.
    TestSlow,
    /// No env file found.
    NoEnvFiles,
    /// Shared env loader not in the manifest dependencies.
    NoSharedEnvLoader,
}

impl Penalty {
    /// Points subtracted when the rule fires.
    pub fn points(&self) -> i32 {
        match self {
            Penalty::MissingBuild => 25,
            Penalty::BuildFailed => 35,
            Penalty::BuildSlow => 10,
            Penalty::MissingTest => 20,
            Penalty::TestFailed => 25,
            Penalty::TestSlow => 5,
            Penalty::NoEnvFiles => 10,
            Penalty::NoSharedEnvLoader => 5,
        }
    }

    /// Human-readable reason recorded in the score.
    pub fn reason(&self) -> &'static str {
        match self {
            Penalty::MissingBuild => "missing build script",
            Penalty::BuildFailed => "build failed",
            Penalty::BuildSlow => "build too slow",
            Penalty::MissingTest => "missing test script",
            Penalty::TestFailed => "test failed",
            Penalty::TestSlow => "test too slow",
            Penalty::NoEnvFiles => "no env files",
            Penalty::NoSharedEnvLoader => "not using shared env loader",
        }
    }
}

impl fmt::Display for Penalty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Rules that fire for `metrics`, in evaluation order.
pub fn applied_penalties(metrics: &HealthMetrics) -> Vec<Penalty> {
    let mut penalties = Vec::new();
    penalties.extend(script_penalty(
        &metrics.build,
        SLOW_BUILD_MS,
        [Penalty::MissingBuild, Penalty::BuildFailed, Penalty::BuildSlow],
    ));
    penalties.extend(script_penalty(
        &metrics.test,
        SLOW_TEST_MS,
        [Penalty::MissingTest, Penalty::TestFailed, Penalty::TestSlow],
    ));
    if metrics.env.env_files.is_empty() {
        penalties.push(Penalty::NoEnvFiles);
    }
    if !metrics.env.uses_env_core {
        penalties.push(Penalty::NoSharedEnvLoader);
    }
    penalties
}

/// Score the metrics. Pure and deterministic.
pub fn score_health(metrics: &HealthMetrics) -> HealthScore {
    let penalties = applied_penalties(metrics);
    let total: i32 = penalties.iter().map(Penalty::points).sum();
    let score = (STARTING_SCORE - total).clamp(0, 100) as u8;

    HealthScore {
        score,
        grade: Grade::from_score(score),
        reasons: penalties
            .iter()
            .map(|penalty| penalty.reason().to_string())
            .collect(),
    }
}

fn script_penalty(
    script: &ScriptMetrics,
    slow_after_ms: u64,
    [missing, failed, slow]: [Penalty; 3],
) -> Option<Penalty> {
    if !script.has_script {
        Some(missing)
    } else if script.success == Some(false) {
        Some(failed)
    } else if script.duration_ms.is_some_and(|ms| ms > slow_after_ms) {
        Some(slow)
    } else {
        None
    }
}
