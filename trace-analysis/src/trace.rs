/// A single probe of the trace, identified by its sequence number
///
/// A record without an RTT stands for a lost packet: either the producer logged the loss
/// explicitly or the sequence number never showed up in the input.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRecord {
    pub sequence_number: u64,
    pub rtt_ms: Option<f64>,
    pub bytes_received: Option<u64>,
}

impl TraceRecord {
    pub fn lost(sequence_number: u64) -> Self {
        Self {
            sequence_number,
            rtt_ms: None,
            bytes_received: None,
        }
    }

    pub fn is_lost(&self) -> bool {
        self.rtt_ms.is_none()
    }
}

/// A dense trace: record `i` always carries sequence number `i`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trace {
    records: Vec<TraceRecord>,
}

impl Trace {
    /// Materializes the range `[0, len)`, taking the received records from `received`
    ///
    /// Records with a sequence number outside of the range are ignored. When a sequence number
    /// appears more than once, the first occurrence is kept.
    pub fn from_sparse(len: u64, received: impl IntoIterator<Item = TraceRecord>) -> Self {
        let mut records: Vec<_> = (0..len).map(TraceRecord::lost).collect();
        let mut filled = vec![false; records.len()];

        for record in received {
            let Ok(index) = usize::try_from(record.sequence_number) else {
                continue;
            };

            if index < records.len() && !filled[index] {
                filled[index] = true;
                records[index] = record;
            }
        }

        Self { records }
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The highest sequence number of the trace, if any
    pub fn max_sequence_number(&self) -> Option<u64> {
        self.records.last().map(|r| r.sequence_number)
    }

    pub fn lost_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_lost()).count()
    }

    /// RTTs of the received packets, in sequence order
    pub fn rtts(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().filter_map(|r| r.rtt_ms)
    }

    /// Received RTTs, sorted ascending
    pub fn sorted_rtts(&self) -> Vec<f64> {
        let mut rtts: Vec<_> = self.rtts().collect();
        rtts.sort_unstable_by(f64::total_cmp);
        rtts
    }

    /// Absolute RTT difference between each record and its predecessor
    ///
    /// The first record, and any record whose own RTT or predecessor's RTT is missing, has no
    /// delta.
    pub fn rtt_deltas(&self) -> Vec<Option<f64>> {
        let mut deltas = Vec::with_capacity(self.records.len());
        let mut previous: Option<f64> = None;
        for record in &self.records {
            let delta = match (previous, record.rtt_ms) {
                (Some(prev), Some(current)) => Some((current - prev).abs()),
                _ => None,
            };

            deltas.push(delta);
            previous = record.rtt_ms;
        }

        deltas
    }
}
