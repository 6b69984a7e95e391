//! Abbreviation-section blockettes: B30 (data format), B31 (comment
//! description), B33 (generic abbreviation) and B34 (units abbreviation).
//!
//! Instances are created exclusively by the dictionary managers; the small
//! integer keys they carry are what later station/channel/response
//! blockettes reference.

use crate::blockette::Blockette;
use crate::error::Result;
use crate::field::{self, class};

/// B30: data format dictionary entry.
#[derive(Debug, Clone)]
pub struct DataFormat {
    pub name: String,
    pub key: u16,
    pub family: u16,
    pub decoder_keys: Vec<String>,
}

impl Blockette for DataFormat {
    fn type_code(&self) -> u16 {
        30
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::variable(&self.name, 1, 50, class::UNLPS)?;
        b.extend_from_slice(&field::int(self.key as i64, 4)?);
        b.extend_from_slice(&field::int(self.family as i64, 3)?);
        b.extend_from_slice(&field::int(self.decoder_keys.len() as i64, 2)?);
        for k in &self.decoder_keys {
            b.extend_from_slice(&field::variable(k, 1, 9999, class::UNLPS)?);
        }
        Ok(b)
    }
}

/// B31: comment description.
#[derive(Debug, Clone)]
pub struct CommentDescription {
    pub key: u16,
    pub class_code: char,
    pub text: String,
    /// Units of the comment level, 0 when the comment has no level.
    pub units: u16,
}

impl Blockette for CommentDescription {
    fn type_code(&self) -> u16 {
        31
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 4)?;
        b.extend_from_slice(&field::fixed(
            &self.class_code.to_string(),
            1,
            class::UPPER,
        )?);
        b.extend_from_slice(&field::variable(&self.text, 1, 70, class::UNLPS)?);
        b.extend_from_slice(&field::int(self.units as i64, 3)?);
        Ok(b)
    }
}

/// B33: generic abbreviation (instrument and network descriptions).
#[derive(Debug, Clone)]
pub struct GenericAbbreviation {
    pub key: u16,
    pub description: String,
}

impl Blockette for GenericAbbreviation {
    fn type_code(&self) -> u16 {
        33
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 3)?;
        b.extend_from_slice(&field::variable(&self.description, 1, 50, class::UNLPS)?);
        Ok(b)
    }
}

/// B34: units abbreviation.
#[derive(Debug, Clone)]
pub struct UnitAbbreviation {
    pub key: u16,
    pub name: String,
    pub description: String,
}

impl Blockette for UnitAbbreviation {
    fn type_code(&self) -> u16 {
        34
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::int(self.key as i64, 3)?;
        b.extend_from_slice(&field::variable(&self.name, 1, 20, class::UNP)?);
        b.extend_from_slice(&field::variable(&self.description, 0, 50, class::UNLPS)?);
        Ok(b)
    }
}
