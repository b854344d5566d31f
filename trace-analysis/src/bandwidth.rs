//! Packet-pair style bottleneck bandwidth estimation
//!
//! Two traces are captured with differently sized probes. Serializing the extra bytes of the
//! large probes over the bottleneck link is what makes their RTT longer, so the bandwidth follows
//! from the size difference divided by the one-way delay difference.

use crate::stats::{median_rtt, modal_payload_size};
use crate::trace::Trace;
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceRole {
    Small,
    Large,
}

impl fmt::Display for TraceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceRole::Small => write!(f, "small"),
            TraceRole::Large => write!(f, "large"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BandwidthError {
    #[error("the {role} packet trace contains no received packets")]
    EmptyTrace { role: TraceRole },
    #[error(
        "the large packet size ({large_bytes} bytes) must exceed the small packet size ({small_bytes} bytes)"
    )]
    InvertedSizes { small_bytes: u64, large_bytes: u64 },
    #[error(
        "the median RTT difference ({delta_rtt_ms:.3} ms) is not positive, the bottleneck bandwidth exceeds the measurable precision"
    )]
    BelowPrecision { delta_rtt_ms: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BandwidthEstimate {
    pub small_size_bytes: u64,
    pub large_size_bytes: u64,
    pub small_median_rtt_ms: f64,
    pub large_median_rtt_ms: f64,
    pub delta_bits: u64,
    pub delta_one_way_s: f64,
    pub bandwidth_bps: f64,
}

struct ProbeSummary {
    size_bytes: u64,
    median_rtt_ms: f64,
}

impl ProbeSummary {
    fn of(trace: &Trace, role: TraceRole) -> Result<Self, BandwidthError> {
        let size_bytes = modal_payload_size(trace);
        let median_rtt_ms = median_rtt(trace);

        match (size_bytes, median_rtt_ms) {
            (Some(size_bytes), Some(median_rtt_ms)) => Ok(Self {
                size_bytes,
                median_rtt_ms,
            }),
            _ => Err(BandwidthError::EmptyTrace { role }),
        }
    }
}

pub fn estimate_bandwidth(small: &Trace, large: &Trace) -> Result<BandwidthEstimate, BandwidthError> {
    let small = ProbeSummary::of(small, TraceRole::Small)?;
    let large = ProbeSummary::of(large, TraceRole::Large)?;

    if large.size_bytes <= small.size_bytes {
        return Err(BandwidthError::InvertedSizes {
            small_bytes: small.size_bytes,
            large_bytes: large.size_bytes,
        });
    }

    let delta_rtt_ms = large.median_rtt_ms - small.median_rtt_ms;
    if delta_rtt_ms <= 0.0 {
        return Err(BandwidthError::BelowPrecision { delta_rtt_ms });
    }

    let delta_bits = (large.size_bytes - small.size_bytes).saturating_mul(8);
    let delta_one_way_s = delta_rtt_ms / 2.0 / 1000.0;

    Ok(BandwidthEstimate {
        small_size_bytes: small.size_bytes,
        large_size_bytes: large.size_bytes,
        small_median_rtt_ms: small.median_rtt_ms,
        large_median_rtt_ms: large.median_rtt_ms,
        delta_bits,
        delta_one_way_s,
        bandwidth_bps: delta_bits as f64 / delta_one_way_s,
    })
}
