use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// discover jobs (or use the input's `jobs` list) and apply to each.
    Run {
        /// JSON input file.
        input: PathBuf,
        /// Append outcome records to this JSON lines file.
        #[clap(short, long, default_value = "results.jsonl")]
        output: PathBuf,
        /// Write screenshots here instead of inlining them in records.
        #[clap(short, long)]
        evidence_dir: Option<PathBuf>,
        /// Model override for the chosen provider.
        #[clap(short, long)]
        model: Option<String>,
        /// Show the browser window.
        #[clap(long)]
        headful: bool,
        /// Connect to a running Chrome (ws:// or http:// debugger URL).
        #[clap(long)]
        chrome_url: Option<String>,
        /// Skip the randomized pause between applications.
        #[clap(long)]
        no_delay: bool,
    },
    /// check an input file without launching a browser.
    Validate {
        /// JSON input file.
        input: PathBuf,
    },
    /// search listing sites and print the jobs found, one JSON object per line.
    Scout {
        /// JSON input file.
        input: PathBuf,
    },
}
