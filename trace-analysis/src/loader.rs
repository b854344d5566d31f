//! Loading of ping traces from CSV
//!
//! Two layouts are understood: a header row naming the columns, or the positional layout
//! `counter,time,bytes_received` written by the trace producer. Rows that cannot be interpreted
//! are skipped, which turns them into gaps of the resulting dense [`Trace`].

use crate::trace::{Trace, TraceRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Sequence numbers above this value are treated as corrupt rows rather than materialized
pub const MAX_SEQUENCE_NUMBER: u64 = 10_000_000;

const SEQUENCE_COLUMNS: &[&str] = &["sequence_number", "counter", "seq"];
const RTT_COLUMNS: &[&str] = &["rtt_ms", "time", "rtt"];
const SIZE_COLUMNS: &[&str] = &["bytes_received", "bytes", "size"];

/// Prefix used by the trace producer for packets that timed out
const LOST_MARKER: &str = "lost";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to open trace file `{}`", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read trace data")]
    Read(#[source] csv::Error),
    #[error(
        "the expected packet count ({expected}) exceeds the supported maximum of {}",
        MAX_SEQUENCE_NUMBER + 1
    )]
    TooManyExpectedPackets { expected: u64 },
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Fixed number of packets the trace is expected to contain
    ///
    /// When absent, the expected count is derived from the highest sequence number observed.
    pub expected_packets: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Schema {
    /// `counter,time,bytes_received`, without a header row
    #[default]
    Positional,
    /// Columns located through a header row
    Header,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub schema: Schema,
    /// Rows carrying a valid sequence number
    pub accepted_rows: u64,
    /// Rows explicitly marking a packet as lost
    pub logged_losses: u64,
    pub malformed_rows: u64,
    pub duplicate_rows: u64,
    /// Rows dropped because their sequence number exceeds the fixed expected packet count
    pub beyond_expected_rows: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedTrace {
    pub trace: Trace,
    pub report: LoadReport,
}

#[derive(Clone, Copy, Debug)]
struct Columns {
    sequence: usize,
    rtt: Option<usize>,
    size: Option<usize>,
}

impl Columns {
    const POSITIONAL: Columns = Columns {
        sequence: 0,
        rtt: Some(1),
        size: Some(2),
    };

    /// Locates the columns if `record` is a header row
    fn from_header_row(record: &csv::StringRecord) -> Option<Self> {
        let first_field = record.get(0).unwrap_or_default();
        if parse_sequence_number(first_field).is_some() || is_lost_marker(first_field) {
            return None;
        }

        let find = |names: &[&str]| {
            record
                .iter()
                .position(|field| names.iter().any(|n| field.eq_ignore_ascii_case(n)))
        };

        Some(Self {
            sequence: find(SEQUENCE_COLUMNS)?,
            rtt: find(RTT_COLUMNS),
            size: find(SIZE_COLUMNS),
        })
    }
}

enum Row {
    Received(TraceRecord),
    LoggedLoss,
    Malformed,
}

pub fn load_trace(path: &Path, options: &LoadOptions) -> Result<LoadedTrace, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    read_trace(file, options)
}

pub fn read_trace(reader: impl io::Read, options: &LoadOptions) -> Result<LoadedTrace, LoadError> {
    if let Some(expected) = options
        .expected_packets
        .filter(|&expected| expected > MAX_SEQUENCE_NUMBER + 1)
    {
        return Err(LoadError::TooManyExpectedPackets { expected });
    }

    // The producer never quotes fields, a stray quote must not swallow the following rows
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut report = LoadReport::default();
    let mut columns = None;
    let mut received: HashMap<u64, TraceRecord> = HashMap::new();

    for result in csv_reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(LoadError::Read(e)),
            Err(e) => {
                debug!("skipping undecodable row: {e}");
                report.malformed_rows += 1;
                continue;
            }
        };

        let columns = match columns {
            Some(columns) => columns,
            None => {
                let header = Columns::from_header_row(&record);
                columns = Some(header.unwrap_or(Columns::POSITIONAL));
                if header.is_some() {
                    report.schema = Schema::Header;
                    continue;
                }

                Columns::POSITIONAL
            }
        };

        let row = parse_row(&record, columns);
        match row {
            Row::Received(trace_record) => {
                report.accepted_rows += 1;
                let sequence_number = trace_record.sequence_number;
                if options
                    .expected_packets
                    .is_some_and(|expected| sequence_number >= expected)
                {
                    report.beyond_expected_rows += 1;
                    continue;
                }

                if received.contains_key(&sequence_number) {
                    debug!("dropping duplicate of sequence number {sequence_number}");
                    report.duplicate_rows += 1;
                    continue;
                }

                received.insert(sequence_number, trace_record);
            }
            Row::LoggedLoss => report.logged_losses += 1,
            Row::Malformed => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                debug!("skipping malformed row at line {line}");
                report.malformed_rows += 1;
            }
        }
    }

    if report.beyond_expected_rows > 0 {
        warn!(
            "dropped {} rows with a sequence number beyond the expected packet count",
            report.beyond_expected_rows
        );
    }

    let len = match options.expected_packets {
        Some(expected) => expected,
        None => received.keys().max().map_or(0, |max| max + 1),
    };

    Ok(LoadedTrace {
        trace: Trace::from_sparse(len, received.into_values()),
        report,
    })
}

fn parse_row(record: &csv::StringRecord, columns: Columns) -> Row {
    let sequence_field = record.get(columns.sequence).unwrap_or_default();
    let Some(sequence_number) = parse_sequence_number(sequence_field) else {
        if is_lost_marker(sequence_field) {
            return Row::LoggedLoss;
        }

        return Row::Malformed;
    };

    let field = |index: Option<usize>| index.and_then(|i| record.get(i));
    let rtt_ms = field(columns.rtt)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|rtt| rtt.is_finite() && *rtt >= 0.0);
    let bytes_received = field(columns.size).and_then(|s| s.parse::<u64>().ok());

    Row::Received(TraceRecord {
        sequence_number,
        rtt_ms,
        bytes_received,
    })
}

fn parse_sequence_number(field: &str) -> Option<u64> {
    let sequence_number = match field.parse::<u64>() {
        Ok(n) => n,
        Err(_) => {
            let value = field.parse::<f64>().ok()?;
            if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
                return None;
            }

            value as u64
        }
    };

    (sequence_number <= MAX_SEQUENCE_NUMBER).then_some(sequence_number)
}

fn is_lost_marker(field: &str) -> bool {
    field
        .get(..LOST_MARKER.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(LOST_MARKER))
}

#[cfg(test)]
mod test {
    use super::*;
    use bon::builder;
    use fastrand::Rng;

    /// Generates a trace in the producer's output format
    #[builder]
    fn producer_csv(
        packets: u64,
        rng_seed: Option<u64>,
        loss_ratio: Option<f64>,
        header: Option<bool>,
    ) -> String {
        let mut rng = Rng::with_seed(rng_seed.unwrap_or(42));
        let loss_ratio = loss_ratio.unwrap_or(0.1);

        let mut csv = String::new();
        if header.unwrap_or(true) {
            csv.push_str("counter,time,bytes_received\n");
        }

        for counter in 0..packets {
            if rng.f64() < loss_ratio {
                csv.push_str("LOST (Timeout),,\n");
            } else {
                let rtt = 0.2 + rng.f64() * 0.8;
                csv.push_str(&format!("{counter},{rtt:.3},128\n"));
            }
        }

        csv
    }

    fn load(input: &str) -> LoadedTrace {
        read_trace(input.as_bytes(), &LoadOptions::default()).unwrap()
    }

    #[test]
    fn test_positional_without_header() {
        let loaded = load("0,1.5,128\n2,2.5,128\n");

        assert_eq!(loaded.report.schema, Schema::Positional);
        assert_eq!(loaded.trace.len(), 3);
        assert_eq!(loaded.trace.records()[0].rtt_ms, Some(1.5));
        assert!(loaded.trace.records()[1].is_lost());
        assert_eq!(loaded.trace.records()[2].bytes_received, Some(128));
    }

    #[test]
    fn test_named_header_in_any_order() {
        let loaded = load("rtt_ms,sequence_number,payload\n4.0,1,x\n3.0,0,y\n");

        assert_eq!(loaded.report.schema, Schema::Header);
        assert_eq!(loaded.report.malformed_rows, 0);
        assert_eq!(loaded.trace.len(), 2);
        assert_eq!(loaded.trace.records()[0].rtt_ms, Some(3.0));
        assert_eq!(loaded.trace.records()[1].rtt_ms, Some(4.0));
        assert_eq!(loaded.trace.records()[1].bytes_received, None);
    }

    #[test]
    fn test_unknown_header_is_skipped_as_malformed() {
        let loaded = load("a,b,c\n0,1.0,64\n");

        assert_eq!(loaded.report.schema, Schema::Positional);
        assert_eq!(loaded.report.malformed_rows, 1);
        assert_eq!(loaded.trace.len(), 1);
    }

    #[test]
    fn test_lost_markers_and_malformed_rows() {
        let loaded = load(
            "counter,time,bytes_received\n0,1.0,128\nLOST (Timeout),,\nlost\n\nnot a row\n-3,1.0,1\n3,1.0,128\n",
        );

        assert_eq!(loaded.report.logged_losses, 2);
        assert_eq!(loaded.report.malformed_rows, 2);
        assert_eq!(loaded.report.accepted_rows, 2);
        assert_eq!(loaded.trace.len(), 4);
        assert_eq!(loaded.trace.lost_count(), 2);
    }

    #[test]
    fn test_missing_rtt_counts_as_lost() {
        let loaded = load("0,,128\n1,abc,128\n2,-1.0,128\n3,0.5,\n");

        assert_eq!(loaded.trace.lost_count(), 3);
        assert_eq!(loaded.trace.records()[3].rtt_ms, Some(0.5));
        assert_eq!(loaded.trace.records()[3].bytes_received, None);
    }

    #[test]
    fn test_integral_float_sequence_numbers() {
        let loaded = load("0.0,1.0,1\n1.5,1.0,1\n2.0,1.0,1\n");

        assert_eq!(loaded.report.malformed_rows, 1);
        assert_eq!(loaded.trace.len(), 3);
        assert!(loaded.trace.records()[1].is_lost());
    }

    #[test]
    fn test_huge_sequence_number_is_malformed() {
        let loaded = load(&format!("0,1.0,1\n{},1.0,1\n", MAX_SEQUENCE_NUMBER + 1));

        assert_eq!(loaded.report.malformed_rows, 1);
        assert_eq!(loaded.trace.len(), 1);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let loaded = load("0,1.0,1\n0,9.0,1\n");

        assert_eq!(loaded.report.duplicate_rows, 1);
        assert_eq!(loaded.trace.records()[0].rtt_ms, Some(1.0));
    }

    #[test]
    fn test_fixed_expected_packets() {
        let options = LoadOptions {
            expected_packets: Some(5),
        };

        let loaded = read_trace("0,1.0,1\n1,1.0,1\n".as_bytes(), &options).unwrap();
        assert_eq!(loaded.trace.len(), 5);
        assert_eq!(loaded.trace.lost_count(), 3);

        let loaded = read_trace("0,1.0,1\n7,1.0,1\n".as_bytes(), &options).unwrap();
        assert_eq!(loaded.trace.len(), 5);
        assert_eq!(loaded.report.beyond_expected_rows, 1);
    }

    #[test]
    fn test_expected_packets_are_bounded() {
        let options = LoadOptions {
            expected_packets: Some(u64::MAX),
        };
        let result = read_trace("0,1.0,1\n".as_bytes(), &options);
        assert!(matches!(
            result,
            Err(LoadError::TooManyExpectedPackets { expected: u64::MAX })
        ));

        let options = LoadOptions {
            expected_packets: Some(MAX_SEQUENCE_NUMBER + 2),
        };
        assert!(read_trace("".as_bytes(), &options).is_err());
    }

    #[test]
    fn test_stray_quote_does_not_swallow_rows() {
        let loaded = load("0,1.0,128\n1,2.0,\"128\n2,3.0,128\n3,4.0,128\n");

        assert_eq!(loaded.trace.len(), 4);
        assert_eq!(loaded.trace.lost_count(), 0);
        assert_eq!(loaded.report.accepted_rows, 4);
        assert_eq!(loaded.trace.records()[1].bytes_received, None);
        assert_eq!(loaded.trace.records()[3].rtt_ms, Some(4.0));
    }

    #[test]
    fn test_empty_and_fully_invalid_input() {
        let loaded = load("");
        assert!(loaded.trace.is_empty());

        let loaded = load("counter,time,bytes_received\nLOST (Timeout),,\nfoo\n");
        assert!(loaded.trace.is_empty());
        assert_eq!(loaded.report.logged_losses, 1);
        assert_eq!(loaded.report.malformed_rows, 1);
    }

    #[test]
    fn test_missing_file() {
        let result = load_trace(
            Path::new("this-trace-does-not-exist.csv"),
            &LoadOptions::default(),
        );
        assert!(matches!(result, Err(LoadError::Open { .. })));
    }

    #[test]
    fn test_loading_is_idempotent() {
        for seed in 0..20 {
            let csv = producer_csv().packets(200).rng_seed(seed).call();
            assert_eq!(load(&csv), load(&csv));
        }
    }

    #[test]
    fn test_generated_trace_is_dense() {
        let csv = producer_csv()
            .packets(500)
            .loss_ratio(0.3)
            .header(false)
            .call();
        let loaded = load(&csv);

        let logged = csv.lines().filter(|l| l.starts_with("LOST")).count() as u64;
        assert_eq!(loaded.report.logged_losses, logged);

        let trace = &loaded.trace;
        for (i, record) in trace.records().iter().enumerate() {
            assert_eq!(record.sequence_number, i as u64);
        }

        // Losses after the last received packet are not part of the trace
        assert!(trace.lost_count() as u64 <= logged);
    }
}
