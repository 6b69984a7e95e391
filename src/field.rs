//! SEED ASCII field primitives.
//!
//! SEED 2.3 control blockettes are ASCII-in-binary: fixed-width alphanumeric
//! fields restricted to declared character classes, variable-length fields
//! terminated by `~`, zero-padded decimal integers, and fixed-width decimal /
//! exponential reals. Everything here is length-exact by construction; a
//! value that cannot be rendered in its field is a [`SeedError`], never a
//! silently truncated number.

use crate::error::{Result, SeedError};
use crate::time::SeedTime;

/// Character-class flags for alphanumeric fields.
pub mod class {
    pub const UPPER: u8 = 1;
    pub const LOWER: u8 = 2;
    pub const NUMERIC: u8 = 4;
    pub const PUNCT: u8 = 8;
    pub const SPACE: u8 = 16;

    /// Upper-case + digits: station/channel/network codes.
    pub const UN: u8 = UPPER | NUMERIC;
    /// Dictionary names: upper-case, digits, punctuation.
    pub const UNP: u8 = UPPER | NUMERIC | PUNCT;
    /// Free text: descriptions, site names, comments.
    pub const UNLPS: u8 = UPPER | NUMERIC | LOWER | PUNCT | SPACE;
}

/// Normalize a string to the given character classes.
///
/// Lower-case letters fold to upper case when lower case is not allowed;
/// spaces become underscores when space is not allowed but punctuation is.
/// Any character that cannot be reduced to an allowed class fails with
/// [`SeedError::BadCharset`].
fn normalize(value: &str, classes: u8) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        let mapped = match ch {
            'A'..='Z' => {
                if classes & class::UPPER != 0 {
                    ch
                } else if classes & class::LOWER != 0 {
                    ch.to_ascii_lowercase()
                } else {
                    return bad(value);
                }
            }
            'a'..='z' => {
                if classes & class::LOWER != 0 {
                    ch
                } else if classes & class::UPPER != 0 {
                    ch.to_ascii_uppercase()
                } else {
                    return bad(value);
                }
            }
            '0'..='9' => {
                if classes & class::NUMERIC != 0 {
                    ch
                } else {
                    return bad(value);
                }
            }
            ' ' => {
                if classes & class::SPACE != 0 {
                    ch
                } else if classes & class::PUNCT != 0 {
                    '_'
                } else {
                    return bad(value);
                }
            }
            // '~' terminates variable fields and may never appear in one
            '~' => return bad(value),
            _ if ch.is_ascii_punctuation() => {
                if classes & class::PUNCT != 0 {
                    ch
                } else {
                    return bad(value);
                }
            }
            _ => return bad(value),
        };
        out.push(mapped);
    }
    Ok(out)
}

fn bad<T>(value: &str) -> Result<T> {
    Err(SeedError::BadCharset {
        value: value.to_owned(),
    })
}

/// Fixed-width alphanumeric field, right-padded with spaces.
pub fn fixed(value: &str, len: usize, classes: u8) -> Result<Vec<u8>> {
    let s = normalize(value, classes)?;
    let mut out = vec![b' '; len];
    for (slot, b) in out.iter_mut().zip(s.bytes()) {
        *slot = b;
    }
    Ok(out)
}

/// Variable-length alphanumeric field, `~`-terminated.
///
/// The value is clamped to `max` characters and space-padded up to `min`.
pub fn variable(value: &str, min: usize, max: usize, classes: u8) -> Result<Vec<u8>> {
    let mut s = normalize(value, classes)?;
    s.truncate(max);
    while s.len() < min {
        s.push(' ');
    }
    let mut out = s.into_bytes();
    out.push(b'~');
    Ok(out)
}

/// Fixed-width zero-padded decimal integer.
pub fn int(value: i64, width: usize) -> Result<Vec<u8>> {
    let s = format!("{value:0width$}");
    if s.len() != width {
        return Err(SeedError::FieldOverflow { value, width });
    }
    Ok(s.into_bytes())
}

/// Fixed-width decimal real (`Fw.p`), right-justified, sign only when
/// negative.
pub fn fixed_f64(value: f64, width: usize, prec: usize) -> Result<Vec<u8>> {
    let s = format!("{value:>width$.prec$}");
    if s.len() != width {
        return Err(SeedError::BadNumber(format!("{value} !~ F{width}.{prec}")));
    }
    Ok(s.into_bytes())
}

/// Fixed-width exponential real (`Ew.p`), `D.DDDDDE+EE` right-justified,
/// sign only when negative. The exponent is always sign + 2 digits.
pub fn exp_f64(value: f64, width: usize, prec: usize) -> Result<Vec<u8>> {
    let s = if value == 0.0 || !value.is_finite() {
        format!("{:.prec$}E+00", 0.0)
    } else {
        let mut e = value.abs().log10().floor() as i32;
        let scale = 10f64.powi(prec as i32);
        let mut m = (value.abs() / 10f64.powi(e) * scale).round() / scale;
        if m >= 10.0 {
            m /= 10.0;
            e += 1;
        }
        let esign = if e < 0 { '-' } else { '+' };
        let sign = if value < 0.0 { "-" } else { "" };
        format!("{sign}{m:.prec$}E{esign}{:02}", e.abs())
    };
    if s.len() > width {
        return Err(SeedError::BadNumber(format!("{value} !~ E{width}.{prec}")));
    }
    let mut out = vec![b' '; width - s.len()];
    out.extend_from_slice(s.as_bytes());
    Ok(out)
}

/// Full time field `YYYY,DDD,HH:MM:SS.ffff~`; a null time encodes as `~`.
pub fn time_full(t: Option<SeedTime>) -> Vec<u8> {
    match t {
        Some(t) => {
            let mut out = t.encode_full().into_bytes();
            out.push(b'~');
            out
        }
        None => vec![b'~'],
    }
}

/// Date-only time field `YYYY,DDD~`; a null time encodes as `~`.
pub fn time_date(t: Option<SeedTime>) -> Vec<u8> {
    match t {
        Some(t) => {
            let mut out = t.encode_date().into_bytes();
            out.push(b'~');
            out
        }
        None => vec![b'~'],
    }
}

/// Parse a list of complex entries `"(re,im)"`, each optionally prefixed by
/// an integer repeat count: `"2(0,0) (-4.21,4.66)"`.
pub fn parse_complex_list(s: &str) -> Result<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    for tok in s.split_whitespace() {
        let (count, body) = split_repeat(tok)?;
        let inner = body
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .ok_or_else(|| SeedError::BadNumber(tok.to_owned()))?;
        let (re, im) = inner
            .split_once(',')
            .ok_or_else(|| SeedError::BadNumber(tok.to_owned()))?;
        let re: f64 = parse_num(re)?;
        let im: f64 = parse_num(im)?;
        for _ in 0..count {
            out.push((re, im));
        }
    }
    Ok(out)
}

/// Parse a list of reals, each either a bare number or `N(value)`.
pub fn parse_real_list(s: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for tok in s.split_whitespace() {
        if tok.contains('(') {
            let (count, body) = split_repeat(tok)?;
            let inner = body
                .strip_prefix('(')
                .and_then(|b| b.strip_suffix(')'))
                .ok_or_else(|| SeedError::BadNumber(tok.to_owned()))?;
            let v = parse_num(inner)?;
            for _ in 0..count {
                out.push(v);
            }
        } else {
            out.push(parse_num(tok)?);
        }
    }
    Ok(out)
}

fn split_repeat(tok: &str) -> Result<(usize, &str)> {
    match tok.find('(') {
        Some(0) | None => Ok((1, tok)),
        Some(pos) => {
            let count: usize = tok[..pos]
                .parse()
                .map_err(|_| SeedError::BadNumber(tok.to_owned()))?;
            Ok((count, &tok[pos..]))
        }
    }
}

fn parse_num(s: &str) -> Result<f64> {
    s.trim()
        .parse()
        .map_err(|_| SeedError::BadNumber(s.to_owned()))
}
