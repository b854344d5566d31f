use crate::trace::Trace;
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LossStats {
    pub expected: u64,
    pub received: u64,
    pub lost: u64,
    /// Undefined for an empty trace
    pub loss_rate_percent: Option<f64>,
}

/// Distribution of the RTTs of received packets, in milliseconds
#[derive(Clone, Debug, PartialEq)]
pub struct RttStats {
    pub samples: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    /// Sample standard deviation, undefined for a single sample
    pub std_dev_ms: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadSource {
    /// Provided by the user
    Configured,
    /// The most frequent `bytes_received` value of the trace
    Modal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Throughput {
    pub payload_size_bytes: u64,
    pub payload_source: PayloadSource,
    /// Assumes one packet per second, so the duration equals the highest sequence number
    pub duration_s: f64,
    pub bits_per_second: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceSummary {
    pub loss: LossStats,
    pub rtt: Option<RttStats>,
    /// Mean absolute difference between consecutive RTTs
    pub precision_ms: Option<f64>,
    pub total_bytes_received: u64,
    pub throughput: Option<Throughput>,
}

pub fn summarize(trace: &Trace, payload_size_bytes: Option<u64>) -> TraceSummary {
    TraceSummary {
        loss: loss(trace),
        rtt: rtt_stats(trace),
        precision_ms: precision(trace),
        total_bytes_received: trace
            .records()
            .iter()
            .filter_map(|r| r.bytes_received)
            .fold(0, u64::saturating_add),
        throughput: throughput(trace, payload_size_bytes),
    }
}

pub fn loss(trace: &Trace) -> LossStats {
    let expected = trace.len() as u64;
    let lost = trace.lost_count() as u64;
    let loss_rate_percent = (expected > 0).then(|| lost as f64 / expected as f64 * 100.0);

    LossStats {
        expected,
        received: expected - lost,
        lost,
        loss_rate_percent,
    }
}

pub fn rtt_stats(trace: &Trace) -> Option<RttStats> {
    let sorted = trace.sorted_rtts();
    let (&min_ms, &max_ms) = (sorted.first()?, sorted.last()?);

    let n = sorted.len() as f64;
    let mean_ms = sorted.iter().sum::<f64>() / n;
    let std_dev_ms = (sorted.len() > 1).then(|| {
        let squared_deviations: f64 = sorted.iter().map(|rtt| (rtt - mean_ms).powi(2)).sum();
        (squared_deviations / (n - 1.0)).sqrt()
    });

    Some(RttStats {
        samples: sorted.len() as u64,
        min_ms,
        max_ms,
        mean_ms,
        median_ms: percentile(&sorted, 50.0)?,
        p95_ms: percentile(&sorted, 95.0)?,
        std_dev_ms,
    })
}

/// Mean absolute RTT difference between consecutive records
///
/// Differences involving a lost packet are undefined and left out of the mean.
pub fn precision(trace: &Trace) -> Option<f64> {
    let deltas: Vec<_> = trace.rtt_deltas().into_iter().flatten().collect();
    if deltas.is_empty() {
        return None;
    }

    Some(deltas.iter().sum::<f64>() / deltas.len() as f64)
}

pub fn median_rtt(trace: &Trace) -> Option<f64> {
    percentile(&trace.sorted_rtts(), 50.0)
}

/// The most frequent payload size among received packets (the smallest one on ties)
pub fn modal_payload_size(trace: &Trace) -> Option<u64> {
    let mut counts: HashMap<u64, u64> = HashMap::new();
    for record in trace.records().iter().filter(|r| !r.is_lost()) {
        if let Some(size) = record.bytes_received {
            *counts.entry(size).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|(size1, count1), (size2, count2)| count1.cmp(count2).then(size2.cmp(size1)))
        .map(|(size, _)| size)
}

pub fn throughput(trace: &Trace, payload_size_bytes: Option<u64>) -> Option<Throughput> {
    let duration_s = trace.max_sequence_number()? as f64;
    if duration_s == 0.0 {
        return None;
    }

    let (payload_size_bytes, payload_source) = match payload_size_bytes {
        Some(size) => (size, PayloadSource::Configured),
        None => (modal_payload_size(trace)?, PayloadSource::Modal),
    };

    let received = (trace.len() - trace.lost_count()) as f64;
    let bits_per_second = received * payload_size_bytes as f64 * 8.0 / duration_s;

    Some(Throughput {
        payload_size_bytes,
        payload_source,
        duration_s,
        bits_per_second,
    })
}

/// Percentile of already sorted values, interpolating linearly between the closest ranks
///
/// `p` must be within `[0, 100]`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = p / 100.0 * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}
