pub mod input;
pub mod options;
#[cfg(feature = "chrome")]
pub mod run;
pub mod validate;

use clap::Parser;
use input::RunInput;
use options::{Cli, Commands};
use std::process::ExitCode;
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid input JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] jobpilot::ConfigError),
    #[error(transparent)]
    Run(#[from] jobpilot::Error),
    #[error(transparent)]
    Scout(#[from] jobpilot_scout::ScoutError),
    #[cfg(not(feature = "chrome"))]
    #[error("this build has no browser support; rebuild with the `chrome` feature")]
    NoBrowser,
}

fn init_logging(verbose: bool) {
    use env_logger::Env;
    let env = Env::default()
        .filter_or("RUST_LOG", if verbose { "info" } else { "warn" })
        .write_style_or("RUST_LOG_STYLE", "always");

    env_logger::init_from_env(env);
}

async fn load(cli: &Cli, path: &std::path::Path) -> Result<RunInput, CliError> {
    Ok(RunInput::load(path)
        .await?
        .with_api_keys(cli.anthropic_api_key.clone(), cli.openai_api_key.clone()))
}

fn check(input: &RunInput) -> Result<(), CliError> {
    let report = validate::validate(input)?;
    for warning in &report.warnings {
        log::warn!("{}", warning);
    }
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<bool, CliError> {
    match &cli.command {
        Commands::Validate { input } => {
            let input = load(&cli, input).await?;
            check(&input)?;
            let profile = input.profile();
            println!("Input validation passed");
            println!("  Name: {}", profile.full_name());
            println!("  Email: {}", profile.email);
            println!(
                "  Phone: {}",
                if profile.phone.is_empty() {
                    "(not provided)"
                } else {
                    profile.phone.as_str()
                }
            );
            match &input.job_keywords {
                Some(keywords) => println!("  Keywords: {}", keywords.to_vec().join(", ")),
                None => println!("  Keywords: (not provided)"),
            }
            println!(
                "  Location: {}",
                input.job_location.as_deref().unwrap_or("(not provided)")
            );
            println!("  Max jobs: {}", input.max_jobs_to_process);
            println!("  Validate first: {}", input.validate_sessions_first);
            Ok(true)
        }
        Commands::Scout { input } => {
            let input = load(&cli, input).await?;
            let scout = jobpilot_scout::Scout::new(input.scout_config())?;
            let jobs = scout
                .discover(&mut jobpilot_scout::ScoutContext::new())
                .await?;
            let mut stdout = tokio::io::stdout();
            for job in jobs {
                let mut line = serde_json::to_vec(&job)?;
                line.push(b'\n');
                stdout.write_all(&line).await?;
            }
            stdout.flush().await?;
            Ok(true)
        }
        #[cfg(feature = "chrome")]
        Commands::Run {
            input,
            output,
            evidence_dir,
            model,
            headful,
            chrome_url,
            no_delay,
        } => {
            let input = load(&cli, input).await?;
            check(&input)?;
            run::run(
                input,
                run::RunOptions {
                    output: output.clone(),
                    evidence_dir: evidence_dir.clone(),
                    model: model.clone(),
                    headful: *headful,
                    chrome_url: chrome_url.clone(),
                    no_delay: *no_delay,
                },
            )
            .await
        }
        #[cfg(not(feature = "chrome"))]
        Commands::Run { .. } => Err(CliError::NoBrowser),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose || matches!(cli.command, Commands::Run { .. }));

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
