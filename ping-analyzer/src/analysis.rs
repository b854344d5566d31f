use crate::config::cli::{AnalyzeOpt, BandwidthOpt, CliOpt};
use crate::config::json::AnalysisJsonConfig;
use crate::config::{AnalysisConfig, PlotConfig};
use crate::plot::{self, Dimensions};
use crate::report;
use anyhow::Context as _;
use std::fs;
use std::path::Path;
use trace_analysis::bandwidth::estimate_bandwidth;
use trace_analysis::stats::{TraceSummary, summarize};
use trace_analysis::{LoadOptions, LoadedTrace, Trace, load_trace};
use tracing::{debug, info};

pub fn run_analysis(
    cli_opt: &CliOpt,
    analyze_opt: &AnalyzeOpt,
    json_config: AnalysisJsonConfig,
) -> anyhow::Result<()> {
    let config = AnalysisConfig::resolve(cli_opt, analyze_opt, json_config)?;
    debug!("resolved analysis config: {config:?}");

    println!("--- Params ---");
    println!("* Trace path: {}", analyze_opt.trace.display());
    match config.expected_packets {
        Some(expected) => println!("* Expected packets: {expected}"),
        None => println!("* Expected packets: derived from the highest sequence number"),
    }
    match config.payload_size_bytes {
        Some(size) => println!("* Payload size: {size} bytes"),
        None => println!("* Payload size: most frequent bytes received"),
    }
    println!("* Boxplot bin size: {}", config.bin_size);

    let loaded = load(&analyze_opt.trace, &config.load_options())?;
    let summary = summarize(&loaded.trace, config.payload_size_bytes);
    print!("{}", report::render_summary(&loaded.report, &summary));

    if let (Some(small_trace), Some(large_trace)) =
        (&analyze_opt.small_trace, &analyze_opt.large_trace)
    {
        estimate_and_report(small_trace, large_trace)?;
    }

    if let Some(plot_config) = &config.plots {
        render_plots(&loaded.trace, &summary, config.bin_size, plot_config)?;
    }

    Ok(())
}

pub fn run_bandwidth(bandwidth_opt: &BandwidthOpt) -> anyhow::Result<()> {
    println!("--- Params ---");
    println!(
        "* Small packet trace path: {}",
        bandwidth_opt.small_trace.display()
    );
    println!(
        "* Large packet trace path: {}",
        bandwidth_opt.large_trace.display()
    );

    estimate_and_report(&bandwidth_opt.small_trace, &bandwidth_opt.large_trace)
}

fn load(path: &Path, options: &LoadOptions) -> anyhow::Result<LoadedTrace> {
    let loaded = load_trace(path, options)
        .with_context(|| format!("failed to load trace at `{}`", path.display()))?;
    info!(
        "loaded {} records from `{}` ({} rows accepted, {} skipped)",
        loaded.trace.len(),
        path.display(),
        loaded.report.accepted_rows,
        loaded.report.malformed_rows
    );

    Ok(loaded)
}

fn estimate_and_report(small_trace: &Path, large_trace: &Path) -> anyhow::Result<()> {
    let small = load(small_trace, &LoadOptions::default())?;
    let large = load(large_trace, &LoadOptions::default())?;

    // A failed estimate is part of the report, not an error of the run
    let outcome = estimate_bandwidth(&small.trace, &large.trace);
    print!("{}", report::render_bandwidth(&outcome));

    Ok(())
}

fn render_plots(
    trace: &Trace,
    summary: &TraceSummary,
    bin_size: u64,
    plot_config: &PlotConfig,
) -> anyhow::Result<()> {
    println!("--- Plots ---");
    if summary.rtt.is_none() {
        println!("* Skipped: the trace contains no RTT samples");
        return Ok(());
    }

    for path in [
        &plot_config.scatter_path,
        &plot_config.boxplot_path,
        &plot_config.cdf_path,
    ] {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| {
                format!("failed to create output directory `{}`", dir.display())
            })?;
        }
    }

    let dimensions = Dimensions {
        width: plot_config.width,
        height: plot_config.height,
    };

    plot::render_scatter(trace, summary, &plot_config.scatter_path, dimensions)
        .context("failed to render the scatter plot")?;
    println!("* Scatter plot: {}", plot_config.scatter_path.display());

    plot::render_boxplot(
        trace,
        summary,
        bin_size,
        &plot_config.boxplot_path,
        dimensions,
    )
    .context("failed to render the boxplot")?;
    println!("* Boxplot: {}", plot_config.boxplot_path.display());

    plot::render_cdf(trace, &plot_config.cdf_path, dimensions)
        .context("failed to render the CDF plot")?;
    println!("* CDF plot: {}", plot_config.cdf_path.display());

    Ok(())
}
