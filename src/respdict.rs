//! Old-style response dictionary blockettes (B41-B48).
//!
//! These live in the abbreviation section, carry a 4-digit lookup key, and
//! are referenced from per-channel B60 response-reference blockettes. The
//! resolver deduplicates them so identical filters across channels share one
//! entry. B41 is the one family here that routinely outgrows the 4-digit
//! length header (FIR filters with thousands of coefficients) and splits
//! into several physical blockettes.

use crate::blockette::{frame, Blockette, HEADER_LEN, MAX_BLOCKETTE_LEN};
use crate::error::Result;
use crate::field::{self, class};

fn name_field(name: &str) -> Result<Vec<u8>> {
    field::variable(name, 1, 25, class::UNP)
}

fn char_field(c: char) -> Result<Vec<u8>> {
    field::fixed(&c.to_string(), 1, class::UPPER)
}

/// B41: FIR dictionary.
#[derive(Debug, Clone)]
pub struct FirDict {
    pub key: u16,
    pub name: String,
    pub symmetry: char,
    pub input_units: u16,
    pub output_units: u16,
    pub coefficients: Vec<f64>,
}

impl FirDict {
    fn header_fields(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 4)?;
        b.extend_from_slice(&name_field(&self.name)?);
        b.extend_from_slice(&char_field(self.symmetry)?);
        b.extend_from_slice(&field::int(self.input_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.output_units as i64, 3)?);
        Ok(b)
    }
}

impl Blockette for FirDict {
    fn type_code(&self) -> u16 {
        41
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = self.header_fields()?;
        b.extend_from_slice(&field::int(self.coefficients.len() as i64, 4)?);
        for c in &self.coefficients {
            b.extend_from_slice(&field::exp_f64(*c, 14, 7)?);
        }
        Ok(b)
    }

    fn render(&self) -> Result<Vec<u8>> {
        let head = self.header_fields()?;
        let per_part = (MAX_BLOCKETTE_LEN - HEADER_LEN - head.len() - 4) / 14;
        let mut out = Vec::new();
        for range in crate::blockette::chunk_entries(self.coefficients.len(), per_part) {
            let mut b = head.clone();
            b.extend_from_slice(&field::int(range.len() as i64, 4)?);
            for c in &self.coefficients[range] {
                b.extend_from_slice(&field::exp_f64(*c, 14, 7)?);
            }
            out.extend_from_slice(&frame(self.type_code(), &b)?);
        }
        Ok(out)
    }
}

/// B42: polynomial dictionary.
#[derive(Debug, Clone)]
pub struct PolynomialDict {
    pub key: u16,
    pub name: String,
    pub input_units: u16,
    pub output_units: u16,
    pub approximation_type: char,
    pub frequency_unit: char,
    pub lower_frequency: f64,
    pub upper_frequency: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub max_error: f64,
    pub coefficients: Vec<f64>,
}

impl Blockette for PolynomialDict {
    fn type_code(&self) -> u16 {
        42
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 4)?;
        b.extend_from_slice(&name_field(&self.name)?);
        b.extend_from_slice(&char_field('P')?);
        b.extend_from_slice(&field::int(self.input_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.output_units as i64, 3)?);
        b.extend_from_slice(&char_field(self.approximation_type)?);
        b.extend_from_slice(&char_field(self.frequency_unit)?);
        b.extend_from_slice(&field::exp_f64(self.lower_frequency, 12, 5)?);
        b.extend_from_slice(&field::exp_f64(self.upper_frequency, 12, 5)?);
        b.extend_from_slice(&field::exp_f64(self.lower_bound, 12, 5)?);
        b.extend_from_slice(&field::exp_f64(self.upper_bound, 12, 5)?);
        b.extend_from_slice(&field::exp_f64(self.max_error, 12, 5)?);
        b.extend_from_slice(&field::int(self.coefficients.len() as i64, 3)?);
        for c in &self.coefficients {
            b.extend_from_slice(&field::exp_f64(*c, 12, 5)?);
            b.extend_from_slice(&field::exp_f64(0.0, 12, 5)?);
        }
        Ok(b)
    }
}

/// B43: poles and zeros dictionary.
#[derive(Debug, Clone)]
pub struct PazDict {
    pub key: u16,
    pub name: String,
    pub response_type: char,
    pub input_units: u16,
    pub output_units: u16,
    pub norm_factor: f64,
    pub norm_frequency: f64,
    pub zeros: Vec<(f64, f64)>,
    pub poles: Vec<(f64, f64)>,
}

impl Blockette for PazDict {
    fn type_code(&self) -> u16 {
        43
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 4)?;
        b.extend_from_slice(&name_field(&self.name)?);
        b.extend_from_slice(&char_field(self.response_type)?);
        b.extend_from_slice(&field::int(self.input_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.output_units as i64, 3)?);
        b.extend_from_slice(&field::exp_f64(self.norm_factor, 12, 5)?);
        b.extend_from_slice(&field::exp_f64(self.norm_frequency, 12, 5)?);
        b.extend_from_slice(&field::int(self.zeros.len() as i64, 3)?);
        for (re, im) in &self.zeros {
            b.extend_from_slice(&complex_entry(*re, *im)?);
        }
        b.extend_from_slice(&field::int(self.poles.len() as i64, 3)?);
        for (re, im) in &self.poles {
            b.extend_from_slice(&complex_entry(*re, *im)?);
        }
        Ok(b)
    }
}

fn complex_entry(re: f64, im: f64) -> Result<Vec<u8>> {
    let mut b = field::exp_f64(re, 12, 5)?;
    b.extend_from_slice(&field::exp_f64(im, 12, 5)?);
    b.extend_from_slice(&field::exp_f64(0.0, 12, 5)?);
    b.extend_from_slice(&field::exp_f64(0.0, 12, 5)?);
    Ok(b)
}

/// B44: coefficients dictionary.
#[derive(Debug, Clone)]
pub struct CoefficientsDict {
    pub key: u16,
    pub name: String,
    pub response_type: char,
    pub input_units: u16,
    pub output_units: u16,
    pub numerators: Vec<f64>,
    pub denominators: Vec<f64>,
}

impl Blockette for CoefficientsDict {
    fn type_code(&self) -> u16 {
        44
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 4)?;
        b.extend_from_slice(&name_field(&self.name)?);
        b.extend_from_slice(&char_field(self.response_type)?);
        b.extend_from_slice(&field::int(self.input_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.output_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.numerators.len() as i64, 4)?);
        for c in &self.numerators {
            b.extend_from_slice(&field::exp_f64(*c, 12, 5)?);
            b.extend_from_slice(&field::exp_f64(0.0, 12, 5)?);
        }
        b.extend_from_slice(&field::int(self.denominators.len() as i64, 4)?);
        for c in &self.denominators {
            b.extend_from_slice(&field::exp_f64(*c, 12, 5)?);
            b.extend_from_slice(&field::exp_f64(0.0, 12, 5)?);
        }
        Ok(b)
    }
}

/// B45: response list dictionary: `(frequency, amplitude, amplitude error,
/// phase, phase error)` rows.
#[derive(Debug, Clone)]
pub struct ResponseListDict {
    pub key: u16,
    pub name: String,
    pub input_units: u16,
    pub output_units: u16,
    pub entries: Vec<(f64, f64, f64, f64, f64)>,
}

impl Blockette for ResponseListDict {
    fn type_code(&self) -> u16 {
        45
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 4)?;
        b.extend_from_slice(&name_field(&self.name)?);
        b.extend_from_slice(&field::int(self.input_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.output_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.entries.len() as i64, 4)?);
        for (f, a, ae, p, pe) in &self.entries {
            for v in [f, a, ae, p, pe] {
                b.extend_from_slice(&field::exp_f64(*v, 12, 5)?);
            }
        }
        Ok(b)
    }
}

/// B46: generic response dictionary: corner frequency/slope pairs.
#[derive(Debug, Clone)]
pub struct GenericResponseDict {
    pub key: u16,
    pub name: String,
    pub input_units: u16,
    pub output_units: u16,
    pub corners: Vec<(f64, f64)>,
}

impl Blockette for GenericResponseDict {
    fn type_code(&self) -> u16 {
        46
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 4)?;
        b.extend_from_slice(&name_field(&self.name)?);
        b.extend_from_slice(&field::int(self.input_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.output_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.corners.len() as i64, 4)?);
        for (freq, slope) in &self.corners {
            b.extend_from_slice(&field::exp_f64(*freq, 12, 5)?);
            b.extend_from_slice(&field::exp_f64(*slope, 12, 5)?);
        }
        Ok(b)
    }
}

/// B47: decimation dictionary.
#[derive(Debug, Clone)]
pub struct DecimationDict {
    pub key: u16,
    pub name: String,
    pub input_rate: f64,
    pub factor: u32,
    pub offset: u32,
    pub delay: f64,
    pub correction: f64,
}

impl Blockette for DecimationDict {
    fn type_code(&self) -> u16 {
        47
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 4)?;
        b.extend_from_slice(&name_field(&self.name)?);
        b.extend_from_slice(&field::exp_f64(self.input_rate, 10, 4)?);
        b.extend_from_slice(&field::int(self.factor as i64, 5)?);
        b.extend_from_slice(&field::int(self.offset as i64, 5)?);
        b.extend_from_slice(&field::exp_f64(self.delay, 11, 4)?);
        b.extend_from_slice(&field::exp_f64(self.correction, 11, 4)?);
        Ok(b)
    }
}

/// B48: channel sensitivity/gain dictionary.
#[derive(Debug, Clone)]
pub struct GainDict {
    pub key: u16,
    pub name: String,
    pub gain: f64,
    pub frequency: f64,
}

impl Blockette for GainDict {
    fn type_code(&self) -> u16 {
        48
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 4)?;
        b.extend_from_slice(&name_field(&self.name)?);
        b.extend_from_slice(&field::exp_f64(self.gain, 12, 5)?);
        b.extend_from_slice(&field::exp_f64(self.frequency, 12, 5)?);
        b.extend_from_slice(&field::int(0, 2)?);
        Ok(b)
    }
}
