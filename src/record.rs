//! Waveform data records: the optional second input of the volume builder.
//!
//! [`DataRecord`] is one fixed-format continuous-waveform record as handed
//! over by the record source: stream identity, time interval, sample rate,
//! encoding, an opaque compressed payload, and, for mergeable encodings,
//! the first/last sample state used for bit-exact continuity checks. The
//! merger concatenates compatible records; [`DataRecord::render`] then
//! serializes the merged record into one 4096-byte physical record of the
//! output volume.

use std::fmt;

use crate::error::{Result, SeedError};
use crate::time::SeedTime;
use crate::types::Encoding;

/// Physical record size of the output volume.
pub const RECORD_LEN: usize = 4096;

/// log2 of [`RECORD_LEN`], carried in B10, B52 and blockette 1000.
pub const RECORD_LEN_POWER: u8 = 12;

/// Offset of waveform payload inside a data record; Steim frames must start
/// on a 64-byte boundary.
pub const DATA_OFFSET: usize = 64;

/// Payload capacity of one physical data record.
pub const DATA_CAPACITY: usize = RECORD_LEN - DATA_OFFSET;

/// One continuous waveform record.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub begin_time: SeedTime,
    pub end_time: SeedTime,
    /// Sample rate in Hz.
    pub fsamp: f64,
    pub encoding: Encoding,
    /// Number of 64-byte frames in the payload (Steim encodings).
    pub nframes: u16,
    pub nsamples: u32,
    /// Continuity placeholder: the sample preceding this record's first.
    pub x_minus1: i32,
    /// Last sample state of this record.
    pub xn: i32,
    pub payload: Vec<u8>,
}

impl DataRecord {
    pub fn new(network: &str, station: &str, location: &str, channel: &str) -> Self {
        Self {
            network: network.to_owned(),
            station: station.to_owned(),
            location: location.to_owned(),
            channel: channel.to_owned(),
            begin_time: SeedTime::date(1970, 1),
            end_time: SeedTime::date(1970, 1),
            fsamp: 1.0,
            encoding: Encoding::Steim2,
            nframes: 0,
            nsamples: 0,
            x_minus1: 0,
            xn: 0,
            payload: Vec::new(),
        }
    }

    pub fn with_times(mut self, begin: SeedTime, end: SeedTime) -> Self {
        self.begin_time = begin;
        self.end_time = end;
        self
    }

    pub fn with_fsamp(mut self, fsamp: f64) -> Self {
        self.fsamp = fsamp;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_samples(mut self, nsamples: u32, x_minus1: i32, xn: i32) -> Self {
        self.nsamples = nsamples;
        self.x_minus1 = x_minus1;
        self.xn = xn;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.nframes = (payload.len() / 64) as u16;
        self.payload = payload;
        self
    }

    /// Stream identity: `"NET.STA.LOC.CHA"`.
    pub fn stream_id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }

    /// Whether `self` and `other` belong to the same stream.
    pub fn same_stream(&self, other: &DataRecord) -> bool {
        self.network == other.network
            && self.station == other.station
            && self.location == other.location
            && self.channel == other.channel
    }

    /// Whether `other` can be appended to `self` as one physical record:
    /// same stream, same encoding and rate, bit-exact sample continuity,
    /// and the merged payload still fits the record capacity.
    pub fn can_merge(&self, other: &DataRecord) -> bool {
        self.same_stream(other)
            && self.encoding == other.encoding
            && self.encoding.mergeable()
            && self.fsamp == other.fsamp
            && self.xn == other.x_minus1
            && self.payload.len() + other.payload.len() <= DATA_CAPACITY
    }

    /// Append `other`'s samples to this record. Caller checked `can_merge`.
    pub fn merge(&mut self, other: &DataRecord) {
        self.end_time = other.end_time;
        self.nsamples += other.nsamples;
        self.nframes += other.nframes;
        self.xn = other.xn;
        self.payload.extend_from_slice(&other.payload);
    }

    /// Serialize into one 4096-byte physical record with the given sequence
    /// number: 48-byte fixed data header, blockette 1000, payload at the
    /// 64-byte boundary.
    pub fn render(&self, sequence: u32) -> Result<Vec<u8>> {
        if self.payload.len() > DATA_CAPACITY {
            return Err(SeedError::LengthMismatch {
                ty: 999,
                declared: DATA_CAPACITY,
                actual: self.payload.len(),
            });
        }
        let mut buf = vec![0u8; RECORD_LEN];

        // --- Fixed header (48 bytes) ---

        // Sequence number (bytes 0-5) + quality 'D' + reserved
        buf[..6].copy_from_slice(format!("{sequence:06}").as_bytes());
        buf[6] = b'D';
        buf[7] = b' ';

        // Station (bytes 8-12), right-padded with spaces
        write_padded(&mut buf[8..13], &self.station);
        // Location (bytes 13-14)
        write_padded(&mut buf[13..15], &self.location);
        // Channel (bytes 15-17)
        write_padded(&mut buf[15..18], &self.channel);
        // Network (bytes 18-19)
        write_padded(&mut buf[18..20], &self.network);

        // BTIME (bytes 20-29)
        write_btime(&mut buf[20..30], &self.begin_time);

        // Number of samples (bytes 30-31)
        let nsamples = u16::try_from(self.nsamples).map_err(|_| SeedError::FieldOverflow {
            value: self.nsamples as i64,
            width: 5,
        })?;
        buf[30..32].copy_from_slice(&nsamples.to_be_bytes());

        // Sample rate factor and multiplier (bytes 32-35)
        let (factor, multiplier) = decompose_sample_rate(self.fsamp)?;
        buf[32..34].copy_from_slice(&factor.to_be_bytes());
        buf[34..36].copy_from_slice(&multiplier.to_be_bytes());

        // Activity/IO/quality flags (36-38): all 0
        // Number of blockettes (byte 39)
        buf[39] = 1;

        // Time correction (40-43): 0
        // Beginning of data (44-45)
        buf[44..46].copy_from_slice(&(DATA_OFFSET as u16).to_be_bytes());
        // First blockette offset (46-47)
        buf[46..48].copy_from_slice(&48u16.to_be_bytes());

        // --- Blockette 1000 (8 bytes at offset 48) ---
        buf[48..50].copy_from_slice(&1000u16.to_be_bytes());
        buf[50..52].copy_from_slice(&0u16.to_be_bytes());
        buf[52] = self.encoding.to_code();
        buf[53] = 1; // big-endian
        buf[54] = RECORD_LEN_POWER;
        buf[55] = 0;

        buf[DATA_OFFSET..DATA_OFFSET + self.payload.len()].copy_from_slice(&self.payload);
        Ok(buf)
    }
}

impl fmt::Display for DataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} - {} | {} Hz | {} samples ({})",
            self.stream_id(),
            self.begin_time,
            self.end_time,
            self.fsamp,
            self.nsamples,
            self.encoding,
        )
    }
}

fn write_padded(dest: &mut [u8], src: &str) {
    let bytes = src.as_bytes();
    for (i, slot) in dest.iter_mut().enumerate() {
        *slot = if i < bytes.len() { bytes[i] } else { b' ' };
    }
}

fn write_btime(dest: &mut [u8], t: &SeedTime) {
    dest[0..2].copy_from_slice(&t.year.to_be_bytes());
    dest[2..4].copy_from_slice(&t.day.to_be_bytes());
    dest[4] = t.hour;
    dest[5] = t.minute;
    dest[6] = t.second;
    dest[7] = 0; // unused
    dest[8..10].copy_from_slice(&((t.micros / 100) as u16).to_be_bytes());
}

/// Decompose a sample rate (Hz) into the header's (factor, multiplier) pair.
fn decompose_sample_rate(rate: f64) -> Result<(i16, i16)> {
    if rate <= 0.0 {
        return Err(SeedError::BadNumber(format!("sample rate {rate}")));
    }
    if rate >= 1.0 {
        Ok((rate.round() as i16, 1))
    } else {
        // sub-hertz: factor < 0 encodes the period
        Ok((-(1.0 / rate).round() as i16, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steim_record(begin_h: u8, x_minus1: i32, xn: i32, frames: usize) -> DataRecord {
        DataRecord::new("GE", "APO", "00", "HHZ")
            .with_times(
                SeedTime::new(2024, 100, begin_h, 0, 0),
                SeedTime::new(2024, 100, begin_h, 59, 59),
            )
            .with_fsamp(100.0)
            .with_encoding(Encoding::Steim2)
            .with_samples(1000, x_minus1, xn)
            .with_payload(vec![0xAA; frames * 64])
    }

    #[test]
    fn test_merge_compatibility() {
        let a = steim_record(0, 0, 42, 10);
        let b = steim_record(1, 42, 99, 10);
        assert!(a.can_merge(&b));

        // broken continuity
        let c = steim_record(1, 41, 99, 10);
        assert!(!a.can_merge(&c));

        // different stream
        let mut d = steim_record(1, 42, 99, 10);
        d.channel = "HHN".into();
        assert!(!a.can_merge(&d));

        // over capacity: 63 frames fit, one more does not
        let big = steim_record(0, 0, 42, 32);
        assert!(!big.can_merge(&steim_record(1, 42, 99, 32)));
    }

    #[test]
    fn test_uncompressed_never_merges() {
        let mut a = steim_record(0, 0, 42, 10);
        let mut b = steim_record(1, 42, 99, 10);
        a.encoding = Encoding::Int32;
        b.encoding = Encoding::Int32;
        assert!(!a.can_merge(&b));
    }

    #[test]
    fn test_merge_accumulates() {
        let mut a = steim_record(0, 0, 42, 10);
        let b = steim_record(1, 42, 99, 10);
        a.merge(&b);
        assert_eq!(a.nsamples, 2000);
        assert_eq!(a.nframes, 20);
        assert_eq!(a.xn, 99);
        assert_eq!(a.end_time, b.end_time);
        assert_eq!(a.payload.len(), 1280);
    }

    #[test]
    fn test_render_layout() {
        let r = steim_record(0, 0, 42, 2);
        let buf = r.render(17).unwrap();
        assert_eq!(buf.len(), RECORD_LEN);
        assert_eq!(&buf[..8], b"000017D ");
        assert_eq!(&buf[8..13], b"APO  ");
        assert_eq!(&buf[13..15], b"00");
        assert_eq!(&buf[15..18], b"HHZ");
        assert_eq!(&buf[18..20], b"GE");
        // year 2024 big-endian
        assert_eq!(&buf[20..22], &2024u16.to_be_bytes());
        // sample count and rate factor
        assert_eq!(&buf[30..32], &1000u16.to_be_bytes());
        assert_eq!(&buf[32..34], &100i16.to_be_bytes());
        // blockette 1000 with Steim2 code and 4096 length power
        assert_eq!(&buf[48..50], &1000u16.to_be_bytes());
        assert_eq!(buf[52], 11);
        assert_eq!(buf[54], 12);
        // payload at the 64-byte boundary
        assert_eq!(buf[DATA_OFFSET], 0xAA);
        assert_eq!(buf[DATA_OFFSET + 128 - 1], 0xAA);
        assert_eq!(buf[DATA_OFFSET + 128], 0);
    }

    #[test]
    fn test_render_rejects_oversized_payload() {
        let mut r = steim_record(0, 0, 1, 2);
        r.payload = vec![0; DATA_CAPACITY + 64];
        assert!(r.render(1).is_err());
    }

    #[test]
    fn test_sub_hertz_rate() {
        assert_eq!(decompose_sample_rate(0.1).unwrap(), (-10, 1));
        assert_eq!(decompose_sample_rate(20.0).unwrap(), (20, 1));
        assert!(decompose_sample_rate(0.0).is_err());
    }
}
