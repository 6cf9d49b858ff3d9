use crate::options::sub_command::Commands;
use clap::Parser;

/// Apply to jobs with exported session cookies and a vision model.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Build main sub commands
    #[clap(subcommand)]
    pub command: Commands,
    /// Log progress to stderr (always on for `run`)
    #[clap(short, long, global = true)]
    pub verbose: bool,
    /// Anthropic API key, overrides `anthropicApiKey` in the input file.
    #[clap(long, env = "ANTHROPIC_API_KEY", global = true, hide_env_values = true)]
    pub anthropic_api_key: Option<String>,
    /// OpenAI API key, used when no Anthropic key is available.
    #[clap(long, env = "OPENAI_API_KEY", global = true, hide_env_values = true)]
    pub openai_api_key: Option<String>,
}
