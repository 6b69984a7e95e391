//! Physical record packing for control sections.
//!
//! Control blockettes are packed back to back into fixed 4096-byte records.
//! Each record starts with a 6-digit ASCII sequence number, the section tag
//! and a continuation flag (`*` when a blockette spans into this record from
//! the previous one); unused tail bytes are space-filled. Data records are
//! not packed here, they render as whole records in `record.rs`.

use crate::error::{Result, SeedError};
use crate::record::RECORD_LEN;
use crate::types::SectionTag;

/// Per-record payload after the 8-byte record header.
pub const RECORD_CAPACITY: usize = RECORD_LEN - 8;

/// Packs one section's blockettes into sequence-numbered physical records.
#[derive(Debug)]
pub struct SectionWriter {
    tag: SectionTag,
    next_record: u32,
    cur: Vec<u8>,
    out: Vec<u8>,
    continuation: bool,
}

impl SectionWriter {
    /// Start a section whose first record gets sequence number
    /// `first_record`.
    pub fn new(tag: SectionTag, first_record: u32) -> Self {
        Self {
            tag,
            next_record: first_record,
            cur: Vec::with_capacity(RECORD_CAPACITY),
            out: Vec::new(),
            continuation: false,
        }
    }

    /// Append one blockette (or one run of same-type split blockettes),
    /// returning the sequence number of the record it starts in.
    pub fn append(&mut self, blockette: &[u8]) -> u32 {
        if self.cur.len() == RECORD_CAPACITY {
            self.close_record(false);
        }
        let start = self.next_record;
        let mut rest = blockette;
        while !rest.is_empty() {
            let space = RECORD_CAPACITY - self.cur.len();
            let take = space.min(rest.len());
            self.cur.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if !rest.is_empty() {
                self.close_record(true);
            }
        }
        start
    }

    /// Append a buffer of concatenated blockette frames one by one, so that
    /// the continuation flag is only raised when an actual blockette spans
    /// a record boundary.
    pub fn append_all(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            if bytes.len() < 7 {
                return Err(SeedError::BadNumber("truncated blockette frame".into()));
            }
            let len: usize = std::str::from_utf8(&bytes[3..7])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| SeedError::BadNumber("bad blockette length header".into()))?;
            if len < 7 || len > bytes.len() {
                return Err(SeedError::BadNumber("bad blockette length header".into()));
            }
            self.append(&bytes[..len]);
            bytes = &bytes[len..];
        }
        Ok(())
    }

    /// Sequence number the next appended blockette would start in.
    pub fn next_record(&self) -> u32 {
        if self.cur.len() == RECORD_CAPACITY {
            self.next_record + 1
        } else {
            self.next_record
        }
    }

    /// Close the section: pad and emit the open record, return the packed
    /// bytes and the sequence number following the section.
    pub fn finish(mut self) -> (Vec<u8>, u32) {
        if !self.cur.is_empty() {
            self.close_record(false);
        }
        (self.out, self.next_record)
    }

    fn close_record(&mut self, next_is_continuation: bool) {
        self.out
            .extend_from_slice(format!("{:06}", self.next_record).as_bytes());
        self.out.push(self.tag.to_byte());
        self.out.push(if self.continuation { b'*' } else { b' ' });
        self.out.extend_from_slice(&self.cur);
        self.out.resize(self.out.len() + (RECORD_CAPACITY - self.cur.len()), b' ');
        self.cur.clear();
        self.next_record += 1;
        self.continuation = next_is_continuation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockette::frame;

    #[test]
    fn test_single_small_blockette() {
        let mut w = SectionWriter::new(SectionTag::Volume, 1);
        let b = frame(10, b"02.312~~~TEST~~").unwrap();
        assert_eq!(w.append(&b), 1);
        let (bytes, next) = w.finish();
        assert_eq!(bytes.len(), RECORD_LEN);
        assert_eq!(next, 2);
        assert_eq!(&bytes[..8], b"000001V ");
        assert_eq!(&bytes[8..8 + b.len()], &b[..]);
        // tail is space padding
        assert!(bytes[8 + b.len()..].iter().all(|&c| c == b' '));
    }

    #[test]
    fn test_blockette_spanning_records_sets_continuation() {
        let mut w = SectionWriter::new(SectionTag::Abbreviation, 3);
        let big = frame(33, &vec![b'X'; 6000]).unwrap();
        assert_eq!(w.append(&big), 3);
        let (bytes, next) = w.finish();
        assert_eq!(bytes.len(), 2 * RECORD_LEN);
        assert_eq!(next, 5);
        assert_eq!(&bytes[..8], b"000003A ");
        assert_eq!(&bytes[RECORD_LEN..RECORD_LEN + 8], b"000004A*");
    }

    #[test]
    fn test_boundary_between_blockettes_is_not_continuation() {
        let mut w = SectionWriter::new(SectionTag::Station, 1);
        // fill exactly one record with padding-free frames: 4088 = 7 + 4081
        let b1 = frame(50, &vec![b'A'; RECORD_CAPACITY - 7]).unwrap();
        let b2 = frame(52, &vec![b'B'; 10]).unwrap();
        assert_eq!(w.append(&b1), 1);
        assert_eq!(w.append(&b2), 2);
        let (bytes, _) = w.finish();
        assert_eq!(&bytes[RECORD_LEN..RECORD_LEN + 8], b"000002S ");
    }

    #[test]
    fn test_append_all_walks_frames() {
        let mut w = SectionWriter::new(SectionTag::Abbreviation, 1);
        let mut buf = frame(33, b"0011ABC~").unwrap();
        buf.extend_from_slice(&frame(34, b"001M/S~x~").unwrap());
        w.append_all(&buf).unwrap();
        let (bytes, next) = w.finish();
        assert_eq!(next, 2);
        assert_eq!(&bytes[8..8 + buf.len()], &buf[..]);

        assert!(SectionWriter::new(SectionTag::Abbreviation, 1)
            .append_all(b"0330bad")
            .is_err());
    }
}
