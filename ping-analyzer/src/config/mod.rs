use crate::config::cli::{AnalyzeOpt, CliOpt};
use crate::config::json::AnalysisJsonConfig;
use anyhow::{Context as _, bail};
use std::fs;
use std::path::{Path, PathBuf};
use trace_analysis::LoadOptions;
use trace_analysis::distribution::DEFAULT_BIN_SIZE;
use trace_analysis::loader::MAX_SEQUENCE_NUMBER;

pub mod cli;
pub mod json;

/// Settings of an analysis run, after merging the command line with the JSON config
#[derive(Debug)]
pub struct AnalysisConfig {
    pub expected_packets: Option<u64>,
    pub payload_size_bytes: Option<u64>,
    pub bin_size: u64,
    /// Absent when plotting is disabled
    pub plots: Option<PlotConfig>,
}

#[derive(Debug)]
pub struct PlotConfig {
    pub scatter_path: PathBuf,
    pub boxplot_path: PathBuf,
    pub cdf_path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl AnalysisConfig {
    pub fn resolve(
        cli_opt: &CliOpt,
        analyze_opt: &AnalyzeOpt,
        json_config: AnalysisJsonConfig,
    ) -> anyhow::Result<Self> {
        let bin_size = analyze_opt
            .bin_size
            .or(json_config.boxplot_bin_size)
            .unwrap_or(DEFAULT_BIN_SIZE);
        if bin_size == 0 {
            bail!("the boxplot bin size must be at least 1");
        }

        let expected_packets = analyze_opt.expected_packets.or(json_config.expected_packets);
        if let Some(expected) = expected_packets.filter(|&n| n > MAX_SEQUENCE_NUMBER + 1) {
            bail!(
                "the expected packet count ({expected}) exceeds the supported maximum of {}",
                MAX_SEQUENCE_NUMBER + 1
            );
        }

        let plots = if cli_opt.no_plots {
            None
        } else {
            let plots = json_config.plots;
            if plots.width == 0 || plots.height == 0 {
                bail!(
                    "invalid plot dimensions {}x{}",
                    plots.width,
                    plots.height
                );
            }

            let in_output_dir = |name: String| match &cli_opt.output_dir {
                Some(dir) => dir.join(name),
                None => PathBuf::from(name),
            };

            Some(PlotConfig {
                scatter_path: in_output_dir(plots.scatter),
                boxplot_path: in_output_dir(plots.boxplot),
                cdf_path: in_output_dir(plots.cdf),
                width: plots.width,
                height: plots.height,
            })
        };

        Ok(Self {
            expected_packets,
            payload_size_bytes: analyze_opt.payload_size.or(json_config.payload_size_bytes),
            bin_size,
            plots,
        })
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            expected_packets: self.expected_packets,
        }
    }
}

/// Rejects the global options that only affect the `analyze` command
pub fn ensure_no_analysis_options(cli_opt: &CliOpt) -> anyhow::Result<()> {
    let ignored: Vec<_> = [
        ("--config", cli_opt.config.is_some()),
        ("--output-dir", cli_opt.output_dir.is_some()),
        ("--no-plots", cli_opt.no_plots),
    ]
    .into_iter()
    .filter_map(|(flag, set)| set.then_some(flag))
    .collect();

    if !ignored.is_empty() {
        bail!(
            "{} only apply to the `analyze` command",
            ignored.join(", ")
        );
    }

    Ok(())
}

pub fn load_json_config(path: &Path) -> anyhow::Result<AnalysisJsonConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at `{}`", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("failed to parse config file at `{}`", path.display()))
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;
    use crate::config::cli::Command;

    fn parse(args: &[&str]) -> (CliOpt, AnalyzeOpt) {
        let cli_opt = CliOpt::try_parse_from(args).unwrap();
        let Command::Analyze(analyze_opt) = cli_opt.command.clone() else {
            panic!("expected the analyze command");
        };

        (cli_opt, analyze_opt)
    }

    #[test]
    fn test_defaults() {
        let (cli_opt, analyze_opt) = parse(&["ping-analyzer", "analyze", "--trace", "t.csv"]);
        let config =
            AnalysisConfig::resolve(&cli_opt, &analyze_opt, AnalysisJsonConfig::default()).unwrap();

        assert_eq!(config.expected_packets, None);
        assert_eq!(config.payload_size_bytes, None);
        assert_eq!(config.bin_size, DEFAULT_BIN_SIZE);

        let plots = config.plots.unwrap();
        assert_eq!(plots.scatter_path, PathBuf::from("rtt_scatter.png"));
        assert_eq!(plots.boxplot_path, PathBuf::from("rtt_boxplot.png"));
        assert_eq!(plots.cdf_path, PathBuf::from("rtt_cdf.png"));
        assert_eq!((plots.width, plots.height), (1200, 800));
    }

    #[test]
    fn test_cli_overrides_json() {
        let json_config: AnalysisJsonConfig = serde_json::from_str(
            r#"{
                "expected_packets": 1200,
                "payload_size_bytes": 64,
                "boxplot_bin_size": 30,
                "plots": { "cdf": "cdf.png", "width": 640 }
            }"#,
        )
        .unwrap();

        let (cli_opt, analyze_opt) = parse(&[
            "ping-analyzer",
            "--output-dir",
            "out",
            "analyze",
            "--trace",
            "t.csv",
            "--payload-size",
            "128",
        ]);
        let config = AnalysisConfig::resolve(&cli_opt, &analyze_opt, json_config).unwrap();

        assert_eq!(config.expected_packets, Some(1200));
        assert_eq!(config.payload_size_bytes, Some(128));
        assert_eq!(config.bin_size, 30);

        let plots = config.plots.unwrap();
        assert_eq!(plots.cdf_path, Path::new("out").join("cdf.png"));
        assert_eq!(plots.scatter_path, Path::new("out").join("rtt_scatter.png"));
        assert_eq!((plots.width, plots.height), (640, 800));
    }

    #[test]
    fn test_no_plots() {
        let (cli_opt, analyze_opt) =
            parse(&["ping-analyzer", "--no-plots", "analyze", "--trace", "t.csv"]);
        let config =
            AnalysisConfig::resolve(&cli_opt, &analyze_opt, AnalysisJsonConfig::default()).unwrap();

        assert!(config.plots.is_none());
    }

    #[test]
    fn test_invalid_settings() {
        let (cli_opt, analyze_opt) = parse(&[
            "ping-analyzer",
            "analyze",
            "--trace",
            "t.csv",
            "--bin-size",
            "0",
        ]);
        assert!(
            AnalysisConfig::resolve(&cli_opt, &analyze_opt, AnalysisJsonConfig::default()).is_err()
        );

        let result = serde_json::from_str::<AnalysisJsonConfig>(r#"{ "expected_packet": 5 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_expected_packets_upper_bound() {
        let limit = (MAX_SEQUENCE_NUMBER + 1).to_string();
        let (cli_opt, analyze_opt) = parse(&[
            "ping-analyzer",
            "analyze",
            "--trace",
            "t.csv",
            "--expected-packets",
            &limit,
        ]);
        let config =
            AnalysisConfig::resolve(&cli_opt, &analyze_opt, AnalysisJsonConfig::default()).unwrap();
        assert_eq!(config.expected_packets, Some(MAX_SEQUENCE_NUMBER + 1));

        let (cli_opt, analyze_opt) = parse(&["ping-analyzer", "analyze", "--trace", "t.csv"]);
        let json_config: AnalysisJsonConfig =
            serde_json::from_str(&format!(r#"{{ "expected_packets": {} }}"#, u64::MAX)).unwrap();
        assert!(AnalysisConfig::resolve(&cli_opt, &analyze_opt, json_config).is_err());
    }

    #[test]
    fn test_bandwidth_rejects_analysis_options() {
        let bandwidth = ["bandwidth", "--small-trace", "s.csv", "--large-trace", "l.csv"];

        let cli_opt = CliOpt::try_parse_from(["ping-analyzer"].into_iter().chain(bandwidth)).unwrap();
        assert!(ensure_no_analysis_options(&cli_opt).is_ok());

        for flags in [
            &["--no-plots"][..],
            &["--output-dir", "out"][..],
            &["--config", "settings.json"][..],
        ] {
            let args = ["ping-analyzer"].iter().chain(flags).chain(&bandwidth);
            let cli_opt = CliOpt::try_parse_from(args).unwrap();
            let error = ensure_no_analysis_options(&cli_opt).unwrap_err();
            assert!(error.to_string().contains(flags[0]));
        }
    }
}
