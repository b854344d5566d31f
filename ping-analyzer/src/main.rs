use crate::config::cli::{CliOpt, Command};
use crate::config::json::AnalysisJsonConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod analysis;
mod config;
mod plot;
mod report;

fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr, stdout is reserved for the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = CliOpt::parse();
    match &options.command {
        Command::Analyze(analyze_opt) => {
            let json_config = match &options.config {
                Some(path) => config::load_json_config(path)?,
                None => AnalysisJsonConfig::default(),
            };

            analysis::run_analysis(&options, analyze_opt, json_config)
        }
        Command::Bandwidth(bandwidth_opt) => {
            config::ensure_no_analysis_options(&options)?;
            analysis::run_bandwidth(bandwidth_opt)
        }
    }
}
