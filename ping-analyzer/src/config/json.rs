use serde::Deserialize;

#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct AnalysisJsonConfig {
    /// The number of packets that were sent, overriding the one derived from the trace
    pub expected_packets: Option<u64>,
    /// The size of each probe's payload, in bytes
    pub payload_size_bytes: Option<u64>,
    /// The number of consecutive packets summarized by each box of the boxplot
    pub boxplot_bin_size: Option<u64>,
    #[serde(default)]
    pub plots: PlotsJsonConfig,
}

#[derive(Deserialize, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct PlotsJsonConfig {
    pub scatter: String,
    pub boxplot: String,
    pub cdf: String,
    /// Width of each image, in pixels
    pub width: u32,
    /// Height of each image, in pixels
    pub height: u32,
}

impl Default for PlotsJsonConfig {
    fn default() -> Self {
        Self {
            scatter: "rtt_scatter.png".to_string(),
            boxplot: "rtt_boxplot.png".to_string(),
            cdf: "rtt_cdf.png".to_string(),
            width: 1200,
            height: 800,
        }
    }
}
