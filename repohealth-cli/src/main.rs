#![deny(missing_docs)]
//! Repo-health command-line interface.
//!
//! Runs a repository's build and test scripts, prints or writes the scored
//! report, and optionally submits it to an ingestion endpoint.

use clap::Parser;
use repohealth_core::{
    AnalyzeOptions, HealthMetrics, HealthScore, RenderOptions, RenderedReport, Report,
    ReportFormat, analyze_repository, generated_at_now, render, score_health, update_index_file,
};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Repository id used when `--repo-id` is not given.
const DEFAULT_REPO_ID: &str = "unknown-repo";
/// Path of the ingest function relative to an API base URL.
const INGEST_FUNCTION_PATH: &str = "/.netlify/functions/repo-health";
/// Endpoint used when neither a flag nor the environment names one.
const DEFAULT_ENDPOINT: &str = "http://localhost:8888/.netlify/functions/repo-health";

#[derive(Parser, Debug, Clone)]
#[command(name = "repo-health", version, about = "Assess the health of a repository")]
struct Cli {
    /// Write a JSON report file instead of printing the text summary.
    #[arg(long)]
    json: bool,
    /// Echo script output while it runs.
    #[arg(long)]
    verbose: bool,
    /// Repository directory, relative to the current directory.
    #[arg(long)]
    cwd: Option<PathBuf>,
    /// Per-script timeout in milliseconds.
    #[arg(long = "timeoutMs", default_value_t = 300_000)]
    timeout_ms: u64,
    /// Submit the report to the ingestion endpoint.
    #[arg(long)]
    report: bool,
    /// Repository id recorded in the submitted report.
    #[arg(long = "repo-id")]
    repo_id: Option<String>,
    /// Ingestion endpoint URL.
    #[arg(long)]
    endpoint: Option<String>,
    /// Directory for the JSON report (default `<repo>/reports`).
    #[arg(long = "out-dir")]
    out_dir: Option<PathBuf>,
    /// Merge this run's report into an index file.
    #[arg(long = "update-index")]
    update_index: Option<PathBuf>,
}

impl Cli {
    fn wants_post(&self) -> bool {
        self.report || self.endpoint.is_some() || self.repo_id.is_some()
    }
}

/// What a run produced.
#[derive(Debug)]
struct RunOutcome {
    metrics: HealthMetrics,
    score: HealthScore,
    rendered: RenderedReport,
    posted: Option<CliResult<String>>,
}

impl RunOutcome {
    /// One-line description of the run for the log.
    fn summary(&self) -> String {
        let output = match &self.rendered {
            RenderedReport::Text(_) => "printed".to_string(),
            RenderedReport::File(path) => format!("written to {}", path.display()),
        };
        let post = match &self.posted {
            None => "not submitted",
            Some(Ok(_)) => "submitted",
            Some(Err(_)) => "submission failed",
        };
        format!(
            "{}: score {} ({}), report {output}, {post}",
            self.metrics.repository_path, self.score.score, self.score.grade
        )
    }
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let base = std::env::current_dir()?;
    let outcome = run_health_analysis(&cli, &base, |key| std::env::var(key).ok()).await?;
    log::info!("{}", outcome.summary());
    Ok(())
}

#[cfg(test)]
fn main() {}

/// Analyze, score, render and optionally submit one repository.
async fn run_health_analysis<L>(cli: &Cli, base: &Path, lookup: L) -> CliResult<RunOutcome>
where
    L: Fn(&str) -> Option<String>,
{
    let cwd = resolve_cwd(base, cli.cwd.as_deref());
    let mut options = AnalyzeOptions::new(cwd);
    options.timeout = Duration::from_millis(cli.timeout_ms);
    options.verbose = cli.verbose;

    let metrics = analyze_repository(&options).await;
    let score = score_health(&metrics);
    let generated_at = generated_at_now();

    let format = if cli.json {
        ReportFormat::Json
    } else {
        ReportFormat::Pretty
    };
    let render_options = RenderOptions {
        format,
        out_dir: cli.out_dir.as_ref().map(|dir| base.join(dir)),
        generated_at: Some(generated_at.clone()),
    };
    let rendered = render(&metrics, &score, &render_options)?;
    match &rendered {
        RenderedReport::Text(text) => println!("{text}"),
        RenderedReport::File(path) => println!("{}", path.display()),
    }

    let report = Report {
        repository_id: cli
            .repo_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_REPO_ID.to_string()),
        generated_at,
        metrics,
        score,
    };

    if let Some(index_path) = &cli.update_index {
        let index_path = base.join(index_path);
        let entries = update_index_file(&index_path, serde_json::to_value(&report)?)?;
        log::info!(
            "index {} now holds {} reports",
            index_path.display(),
            entries.len()
        );
    }

    let posted = if cli.wants_post() {
        let endpoint = resolve_endpoint(cli.endpoint.as_deref(), &lookup);
        let result = post_report(&endpoint, &report).await;
        match &result {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("Report POST failed: {err}"),
        }
        Some(result)
    } else {
        None
    };

    Ok(RunOutcome {
        metrics: report.metrics,
        score: report.score,
        rendered,
        posted,
    })
}

/// Absolute repository directory: `cwd` resolved against `base`, with `.`
/// and `..` segments folded away.
fn resolve_cwd(base: &Path, cwd: Option<&Path>) -> PathBuf {
    let joined = match cwd {
        Some(path) => base.join(path),
        None => base.to_path_buf(),
    };
    normalize_lexically(&joined)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = normalized.parent().is_none() && normalized.has_root();
                let ends_in_parent =
                    matches!(normalized.components().next_back(), Some(Component::ParentDir));
                if at_root {
                    continue;
                }
                if ends_in_parent || !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Ingestion endpoint: flag, then `REPO_HEALTH_ENDPOINT`, then
/// `REPO_HEALTH_API_BASE_URL` plus the function path, then the local default.
fn resolve_endpoint<L>(flag: Option<&str>, lookup: L) -> String
where
    L: Fn(&str) -> Option<String>,
{
    let non_empty = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
    if let Some(endpoint) = non_empty(flag.map(str::to_string)) {
        return endpoint;
    }
    if let Some(endpoint) = non_empty(lookup("REPO_HEALTH_ENDPOINT")) {
        return endpoint;
    }
    if let Some(base) = non_empty(lookup("REPO_HEALTH_API_BASE_URL")) {
        return format!("{}{INGEST_FUNCTION_PATH}", base.trim_end_matches('/'));
    }
    DEFAULT_ENDPOINT.to_string()
}

/// POST the report and describe the response as `Report POST → <status>: <body>`.
async fn post_report(endpoint: &str, report: &Report) -> CliResult<String> {
    let client = reqwest::Client::new();
    let response = client.post(endpoint).json(report).send().await?;
    let status = response.status();
    let text = response.text().await?;
    Ok(format!("Report POST → {status}: {text}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use std::collections::HashMap;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["repo-health"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse args")
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn temp_repo(manifest: &str) -> PathBuf {
        static COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let counter = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!("repohealth_cli_test_{nanos}_{counter}"));
        std::fs::create_dir_all(&root).expect("create repo");
        std::fs::write(root.join("package.json"), manifest).expect("write manifest");
        root
    }

    #[test]
    fn parses_flags() {
        let parsed = cli(&[
            "--json",
            "--verbose",
            "--cwd",
            "apps/web",
            "--timeoutMs",
            "1500",
            "--repo-id",
            "web",
            "--out-dir",
            "out",
        ]);

        assert!(parsed.json);
        assert!(parsed.verbose);
        assert_eq!(parsed.cwd, Some(PathBuf::from("apps/web")));
        assert_eq!(parsed.timeout_ms, 1500);
        assert_eq!(parsed.repo_id.as_deref(), Some("web"));
        assert_eq!(parsed.out_dir, Some(PathBuf::from("out")));
        assert!(parsed.wants_post());
    }

    #[test]
    fn posts_only_when_asked() {
        assert!(!cli(&[]).wants_post());
        assert!(!cli(&["--json"]).wants_post());
        assert!(cli(&["--report"]).wants_post());
        assert!(cli(&["--endpoint", "http://example.com"]).wants_post());
    }

    #[test]
    fn resolves_cwd_against_base() {
        let base = Path::new("/work");
        assert_eq!(resolve_cwd(base, None), PathBuf::from("/work"));
        assert_eq!(
            resolve_cwd(base, Some(Path::new("pkg"))),
            PathBuf::from("/work/pkg")
        );
        assert_eq!(
            resolve_cwd(base, Some(Path::new("/elsewhere"))),
            PathBuf::from("/elsewhere")
        );
    }

    #[test]
    fn resolved_cwd_folds_dot_segments() {
        let base = Path::new("/work");
        assert_eq!(resolve_cwd(base, Some(Path::new("../x"))), PathBuf::from("/x"));
        assert_eq!(
            resolve_cwd(base, Some(Path::new("./pkg/../lib/."))),
            PathBuf::from("/work/lib")
        );
        assert_eq!(resolve_cwd(base, Some(Path::new("../../.."))), PathBuf::from("/"));
        assert_eq!(
            resolve_cwd(Path::new("/work/a"), Some(Path::new(".."))),
            PathBuf::from("/work")
        );
    }

    #[test]
    fn endpoint_precedence() {
        let env = lookup_from(&[
            ("REPO_HEALTH_ENDPOINT", "http://env.example/ingest"),
            ("REPO_HEALTH_API_BASE_URL", "http://api.example/"),
        ]);
        assert_eq!(
            resolve_endpoint(Some("http://flag.example"), &env),
            "http://flag.example"
        );
        assert_eq!(resolve_endpoint(None, &env), "http://env.example/ingest");

        let base_only = lookup_from(&[("REPO_HEALTH_API_BASE_URL", "http://api.example/")]);
        assert_eq!(
            resolve_endpoint(None, &base_only),
            "http://api.example/.netlify/functions/repo-health"
        );

        assert_eq!(resolve_endpoint(None, lookup_from(&[])), DEFAULT_ENDPOINT);
        assert_eq!(resolve_endpoint(Some(""), lookup_from(&[])), DEFAULT_ENDPOINT);
    }

    #[tokio::test]
    async fn pretty_run_without_post() {
        let repo = temp_repo("{}");
        let outcome = run_health_analysis(&cli(&[]), &repo, lookup_from(&[]))
            .await
            .expect("run");

        assert_eq!(outcome.score.score, 40);
        assert!(!outcome.metrics.build.has_script);
        assert!(outcome.posted.is_none());
        let RenderedReport::Text(text) = &outcome.rendered else {
            panic!("expected text output");
        };
        assert!(text.starts_with(&format!("Repository: {}", repo.display())));
        assert_eq!(
            outcome.summary(),
            format!("{}: score 40 (D), report printed, not submitted", repo.display())
        );

        std::fs::remove_dir_all(&repo).expect("cleanup");
    }

    #[tokio::test]
    async fn json_run_writes_report_index_and_posts() {
        let repo = temp_repo(r#"{"devDependencies": {"@luckyfields/env-core": "1.0.0"}}"#);
        std::fs::write(repo.join(".env"), "A=1\nB=2\n").expect("write env");
        let server = MockServer::start_async().await;
        let ingest = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/.netlify/functions/repo-health")
                    .header("content-type", "application/json")
                    .body_contains("\"repositoryId\":\"web\"");
                then.status(200)
                    .body("{\"ok\":true,\"saved\":\"web/x.json\"}");
            })
            .await;

        let args = cli(&[
            "--json",
            "--repo-id",
            "web",
            "--out-dir",
            "out",
            "--update-index",
            "docs/index.json",
        ]);
        let base_url = server.base_url();
        let vars = [("REPO_HEALTH_API_BASE_URL", base_url.as_str())];
        let env = lookup_from(&vars);
        let outcome = run_health_analysis(&args, &repo, env).await.expect("run");

        ingest.assert_async().await;
        assert_eq!(outcome.score.score, 55);
        assert_eq!(
            outcome.rendered,
            RenderedReport::File(repo.join("out").join("repo-health.json"))
        );
        let posted = outcome.posted.expect("posted").expect("post ok");
        assert_eq!(
            posted,
            "Report POST → 200 OK: {\"ok\":true,\"saved\":\"web/x.json\"}"
        );

        let written: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(repo.join("out").join("repo-health.json")).expect("read"),
        )
        .expect("parse");
        let index: Vec<serde_json::Value> = serde_json::from_str(
            &std::fs::read_to_string(repo.join("docs").join("index.json")).expect("read"),
        )
        .expect("parse");
        assert_eq!(index.len(), 1);
        assert_eq!(index[0]["repositoryId"], "web");
        assert_eq!(index[0]["generatedAt"], written["generatedAt"]);
        assert_eq!(written["metrics"]["env"]["envLoadedKeys"], 2);

        std::fs::remove_dir_all(&repo).expect("cleanup");
    }

    #[tokio::test]
    async fn post_failure_does_not_fail_the_run() {
        let repo = temp_repo("{}");
        let args = cli(&["--endpoint", "http://127.0.0.1:9/unreachable"]);

        let outcome = run_health_analysis(&args, &repo, lookup_from(&[]))
            .await
            .expect("run");

        assert!(matches!(outcome.posted, Some(Err(_))));
        assert!(outcome.summary().ends_with("report printed, submission failed"));

        std::fs::remove_dir_all(&repo).expect("cleanup");
    }
}
