use crate::stats::percentile;
use crate::trace::Trace;

/// Default number of sequence numbers per boxplot bin (a minute, at one packet per second)
pub const DEFAULT_BIN_SIZE: u64 = 60;

/// Empirical CDF of the received RTTs, as `(rtt_ms, cumulative_probability)` points
///
/// The first point sits at the smallest RTT with probability 0, the last one reaches 1. Both
/// coordinates are non-decreasing.
pub fn empirical_cdf(trace: &Trace) -> Vec<(f64, f64)> {
    let sorted = trace.sorted_rtts();
    let Some(&min) = sorted.first() else {
        return Vec::new();
    };

    let total = sorted.len() as f64;
    let mut points = Vec::with_capacity(sorted.len() + 1);
    points.push((min, 0.0));
    points.extend(
        sorted
            .iter()
            .enumerate()
            .map(|(i, &rtt)| (rtt, (i + 1) as f64 / total)),
    );

    points
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest sample within 1.5 IQR below `q1`
    pub lower_whisker: f64,
    /// Largest sample within 1.5 IQR above `q3`
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let q1 = percentile(sorted, 25.0)?;
        let median = percentile(sorted, 50.0)?;
        let q3 = percentile(sorted, 75.0)?;

        let fence = 1.5 * (q3 - q1);
        let (low_fence, high_fence) = (q1 - fence, q3 + fence);
        let inside = |rtt: &&f64| (low_fence..=high_fence).contains(*rtt);

        Some(Self {
            q1,
            median,
            q3,
            lower_whisker: sorted.iter().find(inside).copied().unwrap_or(q1),
            upper_whisker: sorted.iter().rev().find(inside).copied().unwrap_or(q3),
            outliers: sorted
                .iter()
                .filter(|rtt| !inside(rtt))
                .copied()
                .collect(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BinBoxStats {
    /// First sequence number of the bin
    pub first_sequence_number: u64,
    pub samples: usize,
    pub lost: usize,
    /// Undefined when every packet of the bin was lost
    pub stats: Option<BoxStats>,
}

/// Splits the trace in consecutive bins of `bin_size` records and summarizes each of them
pub fn binned_box_stats(trace: &Trace, bin_size: u64) -> Vec<BinBoxStats> {
    let bin_size = usize::try_from(bin_size).unwrap_or(usize::MAX).max(1);

    trace
        .records()
        .chunks(bin_size)
        .map(|bin| {
            let mut rtts: Vec<_> = bin.iter().filter_map(|r| r.rtt_ms).collect();
            rtts.sort_unstable_by(f64::total_cmp);

            BinBoxStats {
                first_sequence_number: bin[0].sequence_number,
                samples: rtts.len(),
                lost: bin.len() - rtts.len(),
                stats: BoxStats::from_sorted(&rtts),
            }
        })
        .collect()
}
