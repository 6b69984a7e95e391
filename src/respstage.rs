//! Per-stage response blockettes (B53, B54, B57, B58, B60, B61, B62).
//!
//! B53-B58/B61/B62 are the new-style channel-section response blockettes,
//! one instance per filter stage with no cross-channel sharing. B60 is the
//! old-style counterpart: a response-reference listing the dictionary keys
//! (B41-B48) of every stage.

use crate::blockette::{frame, Blockette, HEADER_LEN, MAX_BLOCKETTE_LEN};
use crate::error::Result;
use crate::field::{self, class};

fn char_field(c: char) -> Result<Vec<u8>> {
    field::fixed(&c.to_string(), 1, class::UPPER)
}

/// B53: response poles and zeros.
#[derive(Debug, Clone)]
pub struct PazStage {
    pub transfer_type: char,
    pub stage: u8,
    pub input_units: u16,
    pub output_units: u16,
    pub norm_factor: f64,
    pub norm_frequency: f64,
    pub zeros: Vec<(f64, f64)>,
    pub poles: Vec<(f64, f64)>,
}

impl Blockette for PazStage {
    fn type_code(&self) -> u16 {
        53
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = char_field(self.transfer_type)?;
        b.extend_from_slice(&field::int(self.stage as i64, 2)?);
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

/// B54: response coefficients.
#[derive(Debug, Clone)]
pub struct CoefficientsStage {
    pub response_type: char,
    pub stage: u8,
    pub input_units: u16,
    pub output_units: u16,
    pub numerators: Vec<f64>,
    pub denominators: Vec<f64>,
}

impl Blockette for CoefficientsStage {
    fn type_code(&self) -> u16 {
        54
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = char_field(self.response_type)?;
        b.extend_from_slice(&field::int(self.stage as i64, 2)?);
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

/// B57: decimation.
#[derive(Debug, Clone)]
pub struct DecimationStage {
    pub stage: u8,
    pub input_rate: f64,
    pub factor: u32,
    pub offset: u32,
    pub delay: f64,
    pub correction: f64,
}

impl Blockette for DecimationStage {
    fn type_code(&self) -> u16 {
        57
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.stage as i64, 2)?;
        b.extend_from_slice(&field::exp_f64(self.input_rate, 10, 4)?);
        b.extend_from_slice(&field::int(self.factor as i64, 5)?);
        b.extend_from_slice(&field::int(self.offset as i64, 5)?);
        b.extend_from_slice(&field::exp_f64(self.delay, 11, 4)?);
        b.extend_from_slice(&field::exp_f64(self.correction, 11, 4)?);
        Ok(b)
    }
}

/// B58: channel sensitivity/gain. Stage 0 carries the cumulative
/// sensitivity of the whole chain.
#[derive(Debug, Clone)]
pub struct GainStage {
    pub stage: u8,
    pub gain: f64,
    pub frequency: f64,
}

impl Blockette for GainStage {
    fn type_code(&self) -> u16 {
        58
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.stage as i64, 2)?;
        b.extend_from_slice(&field::exp_f64(self.gain, 12, 5)?);
        b.extend_from_slice(&field::exp_f64(self.frequency, 12, 5)?);
        b.extend_from_slice(&field::int(0, 2)?);
        Ok(b)
    }
}

/// B60: response reference: per stage, the dictionary keys of its response
/// blockettes in the abbreviation section.
#[derive(Debug, Clone)]
pub struct ResponseReference {
    pub stages: Vec<(u8, Vec<u16>)>,
}

impl Blockette for ResponseReference {
    fn type_code(&self) -> u16 {
        60
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.stages.len() as i64, 2)?;
        for (stage, keys) in &self.stages {
            b.extend_from_slice(&field::int(*stage as i64, 2)?);
            b.extend_from_slice(&field::int(keys.len() as i64, 2)?);
            for key in keys {
                b.extend_from_slice(&field::int(*key as i64, 4)?);
            }
        }
        Ok(b)
    }
}

/// B61: FIR response.
#[derive(Debug, Clone)]
pub struct FirStage {
    pub stage: u8,
    pub name: String,
    pub symmetry: char,
    pub input_units: u16,
    pub output_units: u16,
    pub coefficients: Vec<f64>,
}

impl FirStage {
    fn header_fields(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.stage as i64, 2)?;
        b.extend_from_slice(&field::variable(&self.name, 1, 25, class::UNP)?);
        b.extend_from_slice(&char_field(self.symmetry)?);
        b.extend_from_slice(&field::int(self.input_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.output_units as i64, 3)?);
        Ok(b)
    }
}

impl Blockette for FirStage {
    fn type_code(&self) -> u16 {
        61
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

/// B62: response polynomial.
#[derive(Debug, Clone)]
pub struct PolynomialStage {
    pub stage: u8,
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

impl Blockette for PolynomialStage {
    fn type_code(&self) -> u16 {
        62
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = char_field('P')?;
        b.extend_from_slice(&field::int(self.stage as i64, 2)?);
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
