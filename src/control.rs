//! Volume-section blockettes: B10 (volume identifier), B11 (station header
//! index) and B12 (volume time span index).
//!
//! B11 and B12 carry fixed-width 6-digit record numbers, which is what makes
//! the multi-pass rewrite in the volume assembler byte-size stable: the
//! section is rendered once with placeholder numbers and once with the final
//! ones, and both renderings have identical length.

use crate::blockette::{chunk_entries, frame, Blockette};
use crate::error::Result;
use crate::field::{self, class};
use crate::time::SeedTime;

/// B10: volume identifier.
#[derive(Debug, Clone)]
pub struct VolumeId {
    pub record_length_power: u8,
    pub start: Option<SeedTime>,
    pub end: Option<SeedTime>,
    pub volume_time: Option<SeedTime>,
    pub organization: String,
    pub label: String,
}

impl Blockette for VolumeId {
    fn type_code(&self) -> u16 {
        10
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = Vec::new();
        b.extend_from_slice(b"02.3");
        b.extend_from_slice(&field::int(self.record_length_power as i64, 2)?);
        b.extend_from_slice(&field::time_full(self.start));
        b.extend_from_slice(&field::time_full(self.end));
        b.extend_from_slice(&field::time_full(self.volume_time));
        b.extend_from_slice(&field::variable(&self.organization, 1, 80, class::UNLPS)?);
        b.extend_from_slice(&field::variable(&self.label, 1, 80, class::UNLPS)?);
        Ok(b)
    }
}

/// B11: volume station header index: `(station code, record number)` pairs.
#[derive(Debug, Clone)]
pub struct StationIndex {
    pub entries: Vec<(String, u32)>,
}

impl StationIndex {
    // 3-digit count + entries of 5 (code) + 6 (record number) bytes
    const PER_PART: usize = (crate::blockette::MAX_BLOCKETTE_LEN
        - crate::blockette::HEADER_LEN
        - 3)
        / 11;
}

impl Blockette for StationIndex {
    fn type_code(&self) -> u16 {
        11
    }

    fn body(&self) -> Result<Vec<u8>> {
        self.part(0..self.entries.len())
    }

    fn render(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for range in chunk_entries(self.entries.len(), Self::PER_PART) {
            out.extend_from_slice(&frame(self.type_code(), &self.part(range)?)?);
        }
        Ok(out)
    }
}

impl StationIndex {
    fn part(&self, range: std::ops::Range<usize>) -> Result<Vec<u8>> {
        let mut b = field::int(range.len() as i64, 3)?;
        for (code, recno) in &self.entries[range] {
            b.extend_from_slice(&field::fixed(code, 5, class::UN)?);
            b.extend_from_slice(&field::int(*recno as i64, 6)?);
        }
        Ok(b)
    }
}

/// B12: volume time span index: one entry per time span, pointing at the
/// record number of the span's B70 in the time-index section.
#[derive(Debug, Clone)]
pub struct SpanIndex {
    pub entries: Vec<(Option<SeedTime>, Option<SeedTime>, u32)>,
}

impl SpanIndex {
    fn entry_bytes(entry: &(Option<SeedTime>, Option<SeedTime>, u32)) -> Result<Vec<u8>> {
        let mut b = field::time_full(entry.0);
        b.extend_from_slice(&field::time_full(entry.1));
        b.extend_from_slice(&field::int(entry.2 as i64, 6)?);
        Ok(b)
    }
}

impl Blockette for SpanIndex {
    fn type_code(&self) -> u16 {
        12
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.entries.len() as i64, 4)?;
        for entry in &self.entries {
            b.extend_from_slice(&Self::entry_bytes(entry)?);
        }
        Ok(b)
    }

    // Span entries are variable width (times encode variably), so the split
    // packs greedily by rendered size instead of a fixed per-part count.
    fn render(&self) -> Result<Vec<u8>> {
        let limit = crate::blockette::MAX_BLOCKETTE_LEN - crate::blockette::HEADER_LEN - 4;
        let mut parts: Vec<Vec<Vec<u8>>> = vec![Vec::new()];
        let mut used = 0;
        for entry in &self.entries {
            let bytes = Self::entry_bytes(entry)?;
            if used + bytes.len() > limit && !parts.last().unwrap().is_empty() {
                parts.push(Vec::new());
                used = 0;
            }
            used += bytes.len();
            parts.last_mut().unwrap().push(bytes);
        }
        let mut out = Vec::new();
        for part in parts {
            let mut b = field::int(part.len() as i64, 4)?;
            for e in part {
                b.extend_from_slice(&e);
            }
            out.extend_from_slice(&frame(self.type_code(), &b)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(year: u16, day: u16) -> SeedTime {
        SeedTime::date(year, day)
    }

    #[test]
    fn test_volume_id_layout() {
        let b = VolumeId {
            record_length_power: 12,
            start: Some(t(2000, 1)),
            end: None,
            volume_time: Some(SeedTime::new(2024, 15, 10, 0, 0)),
            organization: "GEOFON".into(),
            label: "".into(),
        }
        .render()
        .unwrap();
        assert_eq!(&b[..3], b"010");
        let declared: usize = std::str::from_utf8(&b[3..7]).unwrap().parse().unwrap();
        assert_eq!(declared, b.len());
        assert_eq!(&b[7..11], b"02.3");
        assert_eq!(&b[11..13], b"12");
        assert!(b.windows(7).any(|w| w == b"GEOFON~"));
    }

    #[test]
    fn test_station_index_entry_width() {
        let b = StationIndex {
            entries: vec![("APO".into(), 4), ("WLF".into(), 7)],
        }
        .render()
        .unwrap();
        assert_eq!(&b[..3], b"011");
        assert_eq!(&b[7..10], b"002");
        assert_eq!(&b[10..21], b"APO  000004");
        assert_eq!(&b[21..32], b"WLF  000007");
        assert_eq!(b.len(), 32);
    }

    #[test]
    fn test_station_index_huge_split() {
        let entries: Vec<_> = (0..2000)
            .map(|i| (format!("S{:03}", i % 1000), i as u32 + 1))
            .collect();
        let b = StationIndex { entries }.render().unwrap();
        // every part must be independently length-correct
        let mut offset = 0;
        let mut parts = 0;
        let mut total_entries = 0;
        while offset < b.len() {
            assert_eq!(&b[offset..offset + 3], b"011");
            let declared: usize = std::str::from_utf8(&b[offset + 3..offset + 7])
                .unwrap()
                .parse()
                .unwrap();
            let count: usize = std::str::from_utf8(&b[offset + 7..offset + 10])
                .unwrap()
                .parse()
                .unwrap();
            assert_eq!(declared, 10 + count * 11);
            total_entries += count;
            offset += declared;
            parts += 1;
        }
        assert!(parts > 1);
        assert_eq!(total_entries, 2000);
    }

    #[test]
    fn test_span_index_placeholder_and_final_same_size() {
        let spans = vec![(Some(t(2024, 1)), Some(t(2024, 2)), 0u32)];
        let provisional = SpanIndex {
            entries: spans.clone(),
        }
        .render()
        .unwrap();
        let fin = SpanIndex {
            entries: spans.into_iter().map(|(a, b, _)| (a, b, 123456)).collect(),
        }
        .render()
        .unwrap();
        assert_eq!(provisional.len(), fin.len());
    }
}
