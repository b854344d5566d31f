use std::fmt::Write;
use trace_analysis::LoadReport;
use trace_analysis::bandwidth::{BandwidthError, BandwidthEstimate};
use trace_analysis::loader::Schema;
use trace_analysis::stats::{PayloadSource, TraceSummary};

const UNDEFINED: &str = "n/a";

fn ms(value: Option<f64>) -> String {
    value.map_or_else(|| UNDEFINED.to_string(), |v| format!("{v:.3} ms"))
}

pub fn render_summary(load_report: &LoadReport, summary: &TraceSummary) -> String {
    let mut output = String::new();

    _ = writeln!(output, "--- Trace ---");
    let schema = match load_report.schema {
        Schema::Positional => "positional (counter, time, bytes_received)",
        Schema::Header => "header row",
    };
    _ = writeln!(output, "* Detected schema: {schema}");
    _ = writeln!(output, "* Expected packets: {}", summary.loss.expected);
    _ = writeln!(output, "* Received packets: {}", summary.loss.received);
    let loss_rate = summary
        .loss
        .loss_rate_percent
        .map_or_else(|| UNDEFINED.to_string(), |rate| format!("{rate:.2}%"));
    _ = writeln!(
        output,
        "* Lost packets: {} ({loss_rate})",
        summary.loss.lost
    );
    _ = writeln!(output, "* Logged losses: {}", load_report.logged_losses);
    _ = writeln!(
        output,
        "* Skipped malformed rows: {}",
        load_report.malformed_rows
    );
    if load_report.duplicate_rows > 0 {
        _ = writeln!(
            output,
            "* Dropped duplicate rows: {}",
            load_report.duplicate_rows
        );
    }
    if load_report.beyond_expected_rows > 0 {
        _ = writeln!(
            output,
            "* Dropped rows beyond the expected packet count: {}",
            load_report.beyond_expected_rows
        );
    }

    _ = writeln!(output, "--- RTT ---");
    let rtt = summary.rtt.as_ref();
    _ = writeln!(output, "* Min: {}", ms(rtt.map(|r| r.min_ms)));
    _ = writeln!(output, "* Max: {}", ms(rtt.map(|r| r.max_ms)));
    _ = writeln!(output, "* Mean: {}", ms(rtt.map(|r| r.mean_ms)));
    _ = writeln!(output, "* Median: {}", ms(rtt.map(|r| r.median_ms)));
    _ = writeln!(output, "* 95th percentile: {}", ms(rtt.map(|r| r.p95_ms)));
    _ = writeln!(
        output,
        "* Standard deviation: {}",
        ms(rtt.and_then(|r| r.std_dev_ms))
    );
    _ = writeln!(
        output,
        "* Precision (mean |ΔRTT| between consecutive packets): {}",
        ms(summary.precision_ms)
    );

    _ = writeln!(output, "--- Throughput ---");
    _ = writeln!(
        output,
        "* Total data received: {} bytes",
        summary.total_bytes_received
    );
    match &summary.throughput {
        Some(throughput) => {
            let source = match throughput.payload_source {
                PayloadSource::Configured => "configured",
                PayloadSource::Modal => "modal",
            };
            _ = writeln!(
                output,
                "* Payload size: {} bytes ({source})",
                throughput.payload_size_bytes
            );
            _ = writeln!(
                output,
                "* Duration (one packet per second): {:.2} s",
                throughput.duration_s
            );
            _ = writeln!(
                output,
                "* End-to-end data rate: {:.2} bps",
                throughput.bits_per_second
            );
        }
        None => {
            _ = writeln!(output, "* Payload size: {UNDEFINED}");
            _ = writeln!(output, "* Duration (one packet per second): {UNDEFINED}");
            _ = writeln!(output, "* End-to-end data rate: {UNDEFINED}");
        }
    }

    output
}

pub fn render_bandwidth(outcome: &Result<BandwidthEstimate, BandwidthError>) -> String {
    let mut output = String::new();
    _ = writeln!(output, "--- Bandwidth estimation ---");

    let estimate = match outcome {
        Ok(estimate) => estimate,
        Err(e) => {
            _ = writeln!(output, "* Skipped: {e}");
            return output;
        }
    };

    _ = writeln!(
        output,
        "* Small packets: {} bytes, median RTT {}",
        estimate.small_size_bytes,
        ms(Some(estimate.small_median_rtt_ms))
    );
    _ = writeln!(
        output,
        "* Large packets: {} bytes, median RTT {}",
        estimate.large_size_bytes,
        ms(Some(estimate.large_median_rtt_ms))
    );
    _ = writeln!(output, "* Size difference: {} bits", estimate.delta_bits);
    _ = writeln!(
        output,
        "* One-way delay difference: {}",
        ms(Some(estimate.delta_one_way_s * 1000.0))
    );
    _ = writeln!(
        output,
        "* Estimated bottleneck bandwidth: {:.2} bps ({:.3} Mbps)",
        estimate.bandwidth_bps,
        estimate.bandwidth_bps / 1_000_000.0
    );

    output
}
