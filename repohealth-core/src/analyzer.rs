//! Repository analysis: manifest scripts, script runs, and env hygiene.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{EnvMetrics, HealthMetrics, ScriptMetrics};
use crate::fs::{FileSystem, StdFileSystem};
use crate::manifest::Manifest;
use crate::runner::{ProcessRunner, ScriptRunner};

/// Default per-script time budget (5 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum number of characters kept in an output preview.
pub const PREVIEW_LIMIT: usize = 600;

/// Appended to previews that were cut at `PREVIEW_LIMIT`.
pub const TRUNCATION_MARKER: &str = "\n…(truncated)…";

/// Env files looked up in the repository root, in report order.
pub const ENV_CANDIDATES: [&str; 4] = [".env", ".env.local", ".env.production", ".env.development"];

/// Package whose presence marks use of the shared env loader.
pub const ENV_CORE_PACKAGE: &str = "@luckyfields/env-core";

/// Options for a single analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Repository directory to analyze.
    pub cwd: PathBuf,
    /// Time budget for each script.
    pub timeout: Duration,
    /// Echo child output while scripts run.
    pub verbose: bool,
    /// Dependency name that counts as using the shared env loader.
    pub env_loader_package: String,
}

impl AnalyzeOptions {
    /// Default options for a repository directory.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            timeout: DEFAULT_TIMEOUT,
            verbose: false,
            env_loader_package: ENV_CORE_PACKAGE.to_string(),
        }
    }
}

/// Runs the analysis against injectable filesystem and process seams.
pub struct Analyzer<F: FileSystem, R: ScriptRunner> {
    fs: F,
    runner: R,
}

impl<F: FileSystem, R: ScriptRunner> Analyzer<F, R> {
    /// Create an analyzer.
    pub fn new(fs: F, runner: R) -> Self {
        Self { fs, runner }
    }

    /// Analyze the repository. Build runs before test; never concurrently.
    pub async fn analyze(&self, options: &AnalyzeOptions) -> HealthMetrics {
        let cwd = options.cwd.as_path();
        let manifest = Manifest::load(&self.fs, cwd);

        let build = if manifest.declares("build") {
            self.run_script("build", cwd, options.timeout).await
        } else {
            ScriptMetrics::missing()
        };

        let test = match select_test_script(&manifest) {
            Some(name) => self.run_script(name, cwd, options.timeout).await,
            None => ScriptMetrics::missing(),
        };

        let env = analyze_env(&self.fs, cwd, &manifest, &options.env_loader_package);

        HealthMetrics {
            repository_path: cwd.display().to_string(),
            scripts: manifest.scripts().clone(),
            build,
            test,
            env,
        }
    }

    async fn run_script(&self, name: &str, cwd: &Path, timeout: Duration) -> ScriptMetrics {
        let outcome = self.runner.run(name, cwd, timeout).await;
        log::info!(
            "script `{name}` finished in {}ms (success: {})",
            outcome.duration_ms,
            outcome.success
        );
        ScriptMetrics {
            has_script: true,
            success: Some(outcome.success),
            duration_ms: Some(outcome.duration_ms),
            stdout_preview: preview(&outcome.stdout),
            stderr_preview: preview(&outcome.stderr),
        }
    }
}

/// Analyze a repository on disk using `npm run` for scripts.
pub async fn analyze_repository(options: &AnalyzeOptions) -> HealthMetrics {
    let runner = ProcessRunner::npm().verbose(options.verbose);
    Analyzer::new(StdFileSystem::new(), runner)
        .analyze(options)
        .await
}

/// Pick the test script to run: `test:ci` wins over `test`.
pub fn select_test_script(manifest: &Manifest) -> Option<&'static str> {
    ["test:ci", "test"]
        .into_iter()
        .find(|name| manifest.declares(name))
}

/// Bounded excerpt of captured output; `None` for empty output.
pub fn preview(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    match text.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => Some(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
        None => Some(text.to_string()),
    }
}

/// Inspect env files in `cwd` and the env-loader dependency signal.
pub fn analyze_env<F: FileSystem>(
    fs: &F,
    cwd: &Path,
    manifest: &Manifest,
    env_loader_package: &str,
) -> EnvMetrics {
    let mut env_files = Vec::new();
    let mut env_loaded_keys = 0usize;

    for candidate in ENV_CANDIDATES {
        let path = cwd.join(candidate);
        if !fs.is_file(&path) {
            continue;
        }
        env_files.push(candidate.to_string());
        match fs.read_to_string(&path) {
            Ok(contents) => env_loaded_keys += count_env_keys(&contents),
            Err(err) => log::warn!("failed to read {}: {err}", path.display()),
        }
    }

    EnvMetrics {
        env_files,
        env_loaded_keys,
        uses_env_core: manifest.depends_on(env_loader_package),
    }
}

/// Count distinct keys in dotenv content, skipping malformed lines.
///
/// A quoted value may span several lines. A quote that never closes is
/// read as a raw one-line value, so the lines after it are still counted.
pub fn count_env_keys(contents: &str) -> usize {
    let lines: Vec<&str> = contents.lines().collect();
    let mut keys = BTreeSet::new();
    let mut start = 0;
    while start < lines.len() {
        let (key, consumed) = parse_env_entry(&lines[start..]);
        if let Some(key) = key {
            keys.insert(key);
        }
        start += consumed;
    }
    keys.len()
}

/// Key of the entry starting at `lines[0]` and the number of lines it spans.
fn parse_env_entry(lines: &[&str]) -> (Option<String>, usize) {
    let multiline = opens_quote(lines[0]);
    for end in 1..=lines.len() {
        let chunk = lines[..end].join("\n");
        match dotenvy::from_read_iter(chunk.as_bytes()).next() {
            Some(Ok((key, _))) => return (Some(key), end),
            Some(Err(dotenvy::Error::LineParse(..))) if multiline => continue,
            _ => break,
        }
    }
    (raw_env_key(lines[0]), 1)
}

fn split_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").unwrap_or(line);
    line.split_once('=')
}

fn opens_quote(line: &str) -> bool {
    split_env_line(line)
        .is_some_and(|(_, value)| value.trim_start().starts_with(['"', '\'', '`']))
}

fn raw_env_key(line: &str) -> Option<String> {
    let (key, _) = split_env_line(line)?;
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    valid.then(|| key.to_string())
}
