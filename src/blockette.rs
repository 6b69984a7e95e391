//! Blockette framing: the `NNNLLLL` header and its length invariant.
//!
//! Every SEED control blockette starts with a 3-digit type code and a
//! 4-digit total length (header included). The length is computed from the
//! serialized body and re-checked against the rendered bytes at emit time;
//! a mismatch is a construction bug and fails the build.

use crate::error::{Result, SeedError};

/// Header bytes of every blockette: 3-digit type + 4-digit length.
pub const HEADER_LEN: usize = 7;

/// Largest value the 4-digit length header can carry.
pub const MAX_BLOCKETTE_LEN: usize = 9999;

/// A renderable SEED control blockette.
///
/// `body()` serializes the fields after the 7-byte header. The default
/// `render()` frames a single blockette; encoders with repeated fields that
/// can exceed the length header ("huge" blockettes) override `render()` and
/// emit several same-type blockettes instead.
pub trait Blockette {
    fn type_code(&self) -> u16;

    fn body(&self) -> Result<Vec<u8>>;

    fn render(&self) -> Result<Vec<u8>> {
        frame(self.type_code(), &self.body()?)
    }
}

/// Frame a blockette body with its `NNNLLLL` header and verify the length
/// invariant.
pub fn frame(ty: u16, body: &[u8]) -> Result<Vec<u8>> {
    let declared = body.len() + HEADER_LEN;
    if declared > MAX_BLOCKETTE_LEN {
        return Err(SeedError::LengthMismatch {
            ty,
            declared,
            actual: MAX_BLOCKETTE_LEN,
        });
    }
    let mut out = format!("{ty:03}{declared:04}").into_bytes();
    out.extend_from_slice(body);
    if out.len() != declared {
        return Err(SeedError::LengthMismatch {
            ty,
            declared,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Split `total` repeated entries into chunks of at most `per_part`, for
/// encoders that spill one logical blockette into several physical ones.
pub fn chunk_entries(total: usize, per_part: usize) -> Vec<std::ops::Range<usize>> {
    assert!(per_part > 0);
    if total == 0 {
        return vec![0..0];
    }
    let mut parts = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + per_part).min(total);
        parts.push(start..end);
        start = end;
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake(Vec<u8>);

    impl Blockette for Fake {
        fn type_code(&self) -> u16 {
            999
        }
        fn body(&self) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_frame_header_matches_length() {
        let b = Fake(b"ABCDE".to_vec()).render().unwrap();
        assert_eq!(&b[..7], b"9990012");
        assert_eq!(b.len(), 12);
    }

    #[test]
    fn test_frame_rejects_oversized_body() {
        let body = vec![b'X'; MAX_BLOCKETTE_LEN];
        assert!(matches!(
            frame(41, &body),
            Err(SeedError::LengthMismatch { ty: 41, .. })
        ));
    }

    #[test]
    fn test_chunk_entries() {
        assert_eq!(chunk_entries(0, 10), vec![0..0]);
        assert_eq!(chunk_entries(10, 10), vec![0..10]);
        assert_eq!(chunk_entries(25, 10), vec![0..10, 10..20, 20..25]);
    }
}
