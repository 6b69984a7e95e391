//! Time-index-section blockettes: B70 (time span identifier) and B74 (time
//! series index).
//!
//! B74 embeds the absolute physical record numbers of the first and last
//! data record of a series; those are only correct after the volume
//! assembler's final index pass.

use crate::blockette::Blockette;
use crate::error::Result;
use crate::field::{self, class};
use crate::time::SeedTime;

/// B70: time span identifier.
#[derive(Debug, Clone)]
pub struct TimeSpanId {
    pub start: Option<SeedTime>,
    pub end: Option<SeedTime>,
}

impl Blockette for TimeSpanId {
    fn type_code(&self) -> u16 {
        70
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = vec![b'P']; // time span flag
        b.extend_from_slice(&field::time_full(self.start));
        b.extend_from_slice(&field::time_full(self.end));
        Ok(b)
    }
}

/// B74: time series index: one per contiguous series within a span.
#[derive(Debug, Clone)]
pub struct TimeSeriesIndex {
    pub station: String,
    pub location: String,
    pub channel: String,
    pub series_start: Option<SeedTime>,
    pub first_record: u32,
    pub series_end: Option<SeedTime>,
    pub last_record: u32,
}

impl Blockette for TimeSeriesIndex {
    fn type_code(&self) -> u16 {
        74
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::fixed(&self.station, 5, class::UN)?;
        b.extend_from_slice(&field::fixed(&self.location, 2, class::UN)?);
        b.extend_from_slice(&field::fixed(&self.channel, 3, class::UN)?);
        b.extend_from_slice(&field::time_full(self.series_start));
        b.extend_from_slice(&field::int(self.first_record as i64, 6)?);
        b.extend_from_slice(&field::int(1, 2)?); // sub-sequence of first record
        b.extend_from_slice(&field::time_full(self.series_end));
        b.extend_from_slice(&field::int(self.last_record as i64, 6)?);
        b.extend_from_slice(&field::int(1, 2)?); // sub-sequence of last record
        b.extend_from_slice(&field::int(0, 3)?); // accelerator count
        Ok(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared_len(b: &[u8]) -> usize {
        std::str::from_utf8(&b[3..7]).unwrap().parse().unwrap()
    }

    #[test]
    fn test_time_span_id() {
        let b = TimeSpanId {
            start: Some(SeedTime::new(2024, 100, 0, 0, 0)),
            end: Some(SeedTime::new(2024, 100, 1, 0, 0)),
        }
        .render()
        .unwrap();
        assert_eq!(&b[..3], b"070");
        assert_eq!(b[7], b'P');
        assert_eq!(declared_len(&b), b.len());
    }

    #[test]
    fn test_series_index_record_numbers_fixed_width() {
        let mk = |first: u32, last: u32| {
            TimeSeriesIndex {
                station: "APO".into(),
                location: "00".into(),
                channel: "HHZ".into(),
                series_start: Some(SeedTime::new(2024, 100, 0, 0, 0)),
                first_record: first,
                series_end: Some(SeedTime::new(2024, 100, 2, 0, 0)),
                last_record: last,
            }
            .render()
            .unwrap()
        };
        // provisional and final renderings must be byte-size identical
        let a = mk(0, 0);
        let b = mk(123_456, 654_321);
        assert_eq!(a.len(), b.len());
        assert_eq!(declared_len(&b), b.len());
        assert!(b.windows(6).any(|w| w == b"123456"));
    }
}
