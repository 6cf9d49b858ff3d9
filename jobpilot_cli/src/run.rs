use crate::input::{OracleKey, RunInput};
use crate::CliError;
use jobpilot::llm::{DEFAULT_ANTHROPIC_MODEL, DEFAULT_OPENAI_MODEL};
use jobpilot::{
    ActionOracle, AnthropicProvider, ChromeDriver, ChromeSettings, EvidenceStore, JobRecord,
    JsonLinesSink, LLMProvider, OpenAIProvider, Orchestrator, RunEnd,
};
use jobpilot_scout::{Scout, ScoutContext};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How `summary.platforms` is bucketed.
pub const PLATFORM_KEYS_NOTE: &str = "listing sites by short key (linkedin, indeed, simplyhired); \
     other hosts by their domain label (boards.greenhouse.io -> greenhouse); unparsable URLs as other";

pub struct RunOptions {
    pub output: PathBuf,
    pub evidence_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub headful: bool,
    pub chrome_url: Option<String>,
    pub no_delay: bool,
}

fn provider(key: OracleKey, model: Option<String>) -> Arc<dyn LLMProvider> {
    match key {
        OracleKey::Anthropic(key) => Arc::new(AnthropicProvider::new(
            key,
            model.unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
        )),
        OracleKey::OpenAI(key) => Arc::new(OpenAIProvider::new(
            key,
            model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        )),
    }
}

/// The input's explicit job list, or whatever discovery finds.
pub async fn jobs_for(input: &RunInput) -> Result<Vec<JobRecord>, CliError> {
    if !input.jobs.is_empty() {
        log::info!("Using {} jobs from the input file", input.jobs.len());
        return Ok(input.jobs.clone());
    }

    log::info!("Scouting for jobs...");
    let scout = Scout::new(input.scout_config())?;
    let jobs = scout.discover(&mut ScoutContext::new()).await?;
    log::info!("Found {} jobs to process", jobs.len());
    Ok(jobs)
}

pub async fn run(input: RunInput, options: RunOptions) -> Result<bool, CliError> {
    let key = input.oracle_key()?;
    let jobs = jobs_for(&input).await?;
    if jobs.is_empty() {
        log::warn!("No jobs found matching criteria");
        return Ok(true);
    }

    let mut config = input.orchestrator_config();
    if options.no_delay {
        config = config.with_inter_job_delay(Duration::ZERO, Duration::ZERO);
    }

    let settings = ChromeSettings {
        headless: !options.headful,
        remote_url: options.chrome_url,
        ..Default::default()
    };
    let driver = Arc::new(ChromeDriver::launch(&settings).await?);

    let sink = Arc::new(JsonLinesSink::open(&options.output).await?);
    log::info!("Writing results to {}", sink.path().display());
    let evidence = match options.evidence_dir {
        Some(dir) => EvidenceStore::directory(dir),
        None => EvidenceStore::Inline,
    };

    let oracle = ActionOracle::new(provider(key, options.model));
    log::info!("Using {} for form decisions", oracle.provider_name());

    let orchestrator = Orchestrator::new(
        driver.clone(),
        oracle,
        input.credentials(),
        input.profile(),
    )
    .with_config(config)
    .with_sink(sink)
    .with_evidence(evidence);

    let cancel = orchestrator.cancel_handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        log::warn!("Interrupt received, stopping after the current job (Ctrl-C again to quit now)");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            log::error!("Second interrupt, exiting without a final summary");
            std::process::exit(130);
        }
    });

    let end = orchestrator.run(jobs).await;
    watcher.abort();
    drop(orchestrator);
    match Arc::try_unwrap(driver) {
        Ok(driver) => driver.shutdown().await,
        Err(_) => log::warn!("Browser still in use, leaving it to exit with the process"),
    }

    let report = match end? {
        RunEnd::Completed(report) => report,
        RunEnd::NoValidSessions(record) => {
            log::error!("No valid sessions found. Please check your cookies and try again.");
            println!("{}", serde_json::to_string_pretty(&record)?);
            return Ok(false);
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "summary": report.summary,
            "platformKeys": PLATFORM_KEYS_NOTE,
            "usage": report.usage,
            "cancelled": report.cancelled,
        }))?
    );
    Ok(true)
}
