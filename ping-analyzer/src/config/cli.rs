use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct CliOpt {
    /// Path to a JSON file with analysis settings (command line flags take precedence)
    ///
    /// This and the other global options only apply to the `analyze` command
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The directory where plots are written (defaults to the working directory)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Skip rendering the plots
    #[arg(long)]
    pub no_plots: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyze a single ping trace
    Analyze(AnalyzeOpt),
    /// Estimate the bottleneck bandwidth from a small-packet and a large-packet trace
    Bandwidth(BandwidthOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct AnalyzeOpt {
    /// Path to the CSV trace
    #[arg(long)]
    pub trace: PathBuf,

    /// The number of packets that were sent
    ///
    /// If not provided, it is derived from the highest sequence number found in the trace
    #[arg(long)]
    pub expected_packets: Option<u64>,

    /// The size of each probe's payload, in bytes
    ///
    /// If not provided, the most frequent `bytes_received` value of the trace is used
    #[arg(long)]
    pub payload_size: Option<u64>,

    /// The number of consecutive packets summarized by each box of the boxplot
    #[arg(long)]
    pub bin_size: Option<u64>,

    /// Trace captured with small probes, used together with `--large-trace` to estimate the
    /// bottleneck bandwidth
    #[arg(long, requires = "large_trace")]
    pub small_trace: Option<PathBuf>,

    /// Trace captured with large probes
    #[arg(long, requires = "small_trace")]
    pub large_trace: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct BandwidthOpt {
    /// Trace captured with small probes
    #[arg(long)]
    pub small_trace: PathBuf,

    /// Trace captured with large probes
    #[arg(long)]
    pub large_trace: PathBuf,
}
