//! Waveform record merging and time-span grouping.
//!
//! The merger buffers at most one record per build and folds each incoming
//! record into it when stream identity, encoding, sample rate and bit-exact
//! sample continuity allow and the merged payload still fits one physical
//! record. Everything else flushes the buffer. Failing to merge is never an
//! error; it only produces more, smaller physical records.
//!
//! Flushed records are grouped into [`TimeSeries`] (contiguous segments of
//! one stream) inside [`TimeSpan`]s (index-level groups of overlapping
//! intervals). Two explicit gap policies apply: a new series starts when the
//! gap exceeds [`SERIES_GAP_FACTOR`] sample periods, a new span starts when
//! the record lies more than [`SPAN_GAP_TOLERANCE`] seconds outside every
//! existing span.

use log::{info, warn};

use crate::record::DataRecord;
use crate::time::SeedTime;

/// A gap of more than this many sample periods splits a time series.
pub const SERIES_GAP_FACTOR: f64 = 1.5;

/// A record further than this many seconds from every existing span opens a
/// new one.
pub const SPAN_GAP_TOLERANCE: f64 = 86_400.0;

/// One contiguous segment of a single stream inside a time span.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub start: SeedTime,
    pub end: SeedTime,
    /// 0-based ordinals into the merged record list; the volume assembler
    /// adds the data-section start offset in its final index pass.
    pub first_record: usize,
    pub last_record: usize,
}

/// Index-level group of overlapping record intervals.
#[derive(Debug, Clone)]
pub struct TimeSpan {
    pub start: SeedTime,
    pub end: SeedTime,
    pub series: Vec<TimeSeries>,
}

impl TimeSpan {
    fn overlaps(&self, begin: SeedTime, end: SeedTime) -> bool {
        begin.epoch_seconds() <= self.end.epoch_seconds() + SPAN_GAP_TOLERANCE
            && end.epoch_seconds() >= self.start.epoch_seconds() - SPAN_GAP_TOLERANCE
    }

    fn extend(&mut self, begin: SeedTime, end: SeedTime) {
        if begin < self.start {
            self.start = begin;
        }
        if end > self.end {
            self.end = end;
        }
    }
}

/// Merged records plus the span/series index over them.
#[derive(Debug, Default)]
pub struct MergedData {
    pub records: Vec<DataRecord>,
    pub spans: Vec<TimeSpan>,
}

impl MergedData {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Record merger: state machine over {empty, accumulating}.
#[derive(Debug, Default)]
pub struct Merger {
    buffered: Option<DataRecord>,
    out: MergedData,
    /// (span index, series index) of the series the buffered record extends.
    current: Option<(usize, usize)>,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one record in file order.
    pub fn add(&mut self, record: DataRecord) {
        let Some(buffered) = self.buffered.as_mut() else {
            self.open_series(record);
            return;
        };

        if buffered.can_merge(&record) {
            buffered.merge(&record);
            return;
        }

        let continues = Self::continues_series(buffered, &record);
        Self::log_split(buffered, &record);
        self.flush();

        if continues {
            self.buffered = Some(record);
        } else {
            self.open_series(record);
        }
    }

    /// Flush any buffered record and return the merged output.
    pub fn finish(mut self) -> MergedData {
        self.flush();
        self.out
    }

    /// Whether `next` continues the series of the buffered record: same
    /// stream, same rate and encoding, and a gap within the tolerance.
    fn continues_series(buffered: &DataRecord, next: &DataRecord) -> bool {
        if !buffered.same_stream(next)
            || buffered.encoding != next.encoding
            || buffered.fsamp != next.fsamp
            || next.fsamp <= 0.0
        {
            return false;
        }
        let gap = next.begin_time.epoch_seconds() - buffered.end_time.epoch_seconds();
        gap.abs() <= SERIES_GAP_FACTOR / next.fsamp
    }

    fn log_split(buffered: &DataRecord, next: &DataRecord) {
        if !buffered.same_stream(next) {
            return;
        }
        if buffered.encoding != next.encoding {
            warn!(
                "{}: encoding change {} -> {}",
                next.stream_id(),
                buffered.encoding,
                next.encoding
            );
        } else if buffered.fsamp != next.fsamp {
            warn!(
                "{}: sample rate change {} -> {} Hz",
                next.stream_id(),
                buffered.fsamp,
                next.fsamp
            );
        } else if buffered.xn != next.x_minus1 {
            info!(
                "{}: non-contiguous samples at {}",
                next.stream_id(),
                next.begin_time
            );
        }
    }

    /// Close the accumulating record into the output list and stamp the
    /// current series with its ordinal and end time.
    fn flush(&mut self) {
        let Some(record) = self.buffered.take() else {
            return;
        };
        let ordinal = self.out.records.len();
        let (span_idx, series_idx) = self.current.expect("buffered record has a series");
        let span = &mut self.out.spans[span_idx];
        span.extend(record.begin_time, record.end_time);
        let series = &mut span.series[series_idx];
        series.last_record = ordinal;
        if record.end_time > series.end {
            series.end = record.end_time;
        }
        self.out.records.push(record);
    }

    /// Start a new series for `record`, attaching it to an overlapping span
    /// or opening a new one.
    fn open_series(&mut self, record: DataRecord) {
        let span_idx = match self
            .out
            .spans
            .iter()
            .position(|s| s.overlaps(record.begin_time, record.end_time))
        {
            Some(i) => i,
            None => {
                self.out.spans.push(TimeSpan {
                    start: record.begin_time,
                    end: record.end_time,
                    series: Vec::new(),
                });
                self.out.spans.len() - 1
            }
        };

        let ordinal = self.out.records.len();
        let span = &mut self.out.spans[span_idx];
        span.extend(record.begin_time, record.end_time);
        span.series.push(TimeSeries {
            network: record.network.clone(),
            station: record.station.clone(),
            location: record.location.clone(),
            channel: record.channel.clone(),
            start: record.begin_time,
            end: record.end_time,
            first_record: ordinal,
            last_record: ordinal,
        });
        self.current = Some((span_idx, span.series.len() - 1));
        self.buffered = Some(record);
    }
}
