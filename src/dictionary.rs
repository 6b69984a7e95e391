//! Abbreviation dictionaries: deduplicated key managers for the volume's
//! abbreviation section.
//!
//! Each dictionary hands out 1-based integer keys via `lookup()`: the first
//! lookup of a value creates the backing blockette and assigns the next key,
//! every later lookup of the same value returns the same key. One blockette
//! per distinct value is the deduplication guarantee of the whole section.
//! All state is scoped to a single volume build session.

use std::collections::HashMap;

use crate::abbrev::{CommentDescription, DataFormat, GenericAbbreviation, UnitAbbreviation};
use crate::blockette::Blockette;
use crate::error::Result;
use crate::types::Encoding;

/// A data-format definition looked up in the B30 dictionary.
#[derive(Debug, Clone)]
pub struct FormatSpec {
    pub name: &'static str,
    pub family: u16,
    pub decoder_keys: &'static [&'static str],
}

impl FormatSpec {
    /// The B30 definition for a waveform encoding.
    pub fn for_encoding(encoding: Encoding) -> &'static FormatSpec {
        match encoding {
            Encoding::Steim1 => &STEIM1,
            Encoding::Steim2 => &STEIM2,
            Encoding::Int16 => &INT16,
            Encoding::Int32 => &INT32,
            Encoding::Float32 => &FLOAT32,
            Encoding::Float64 => &FLOAT64,
        }
    }
}

static STEIM1: FormatSpec = FormatSpec {
    name: "Steim1 Integer Compression Format",
    family: 50,
    decoder_keys: &[
        "F1 P4 W4 D C2 R1 P8 W4 D C2",
        "P0 W4 N15 S2,0,1",
        "T0 X N0 W4 D0-31 C2",
        "T1 Y4 W1 D0-7 C2 N0 W4 D0-31 C2",
        "T2 Y2 W2 D0-15 C2 N0 W4 D0-31 C2",
        "T3 N0 W4 D0-31 C2",
    ],
};

static STEIM2: FormatSpec = FormatSpec {
    name: "Steim2 Integer Compression Format",
    family: 50,
    decoder_keys: &[
        "F1 P4 W4 D C2 R1 P8 W4 D C2",
        "P0 W4 N15 S2,0,1",
        "T0 X W4",
        "T1 Y4 W4 D C2",
        "T2 W4 I D2",
        "T3 W4 I D2",
    ],
};

static INT16: FormatSpec = FormatSpec {
    name: "16-Bit Integer Format",
    family: 0,
    decoder_keys: &["M0 W2 D0-15 C2"],
};

static INT32: FormatSpec = FormatSpec {
    name: "32-Bit Integer Format",
    family: 0,
    decoder_keys: &["M0 W4 D0-31 C2"],
};

static FLOAT32: FormatSpec = FormatSpec {
    name: "IEEE Single Precision Float",
    family: 1,
    decoder_keys: &["M0 W4 F"],
};

static FLOAT64: FormatSpec = FormatSpec {
    name: "IEEE Double Precision Float",
    family: 1,
    decoder_keys: &["M0 W8 F"],
};

/// B30 data format dictionary, keyed by format name.
#[derive(Debug, Default)]
pub struct FormatDict {
    entries: Vec<DataFormat>,
    map: HashMap<&'static str, u16>,
}

impl FormatDict {
    pub fn lookup(&mut self, spec: &'static FormatSpec) -> u16 {
        if let Some(&key) = self.map.get(spec.name) {
            return key;
        }
        let key = self.entries.len() as u16 + 1;
        self.entries.push(DataFormat {
            name: spec.name.to_owned(),
            key,
            family: spec.family,
            decoder_keys: spec.decoder_keys.iter().map(|s| (*s).to_owned()).collect(),
        });
        self.map.insert(spec.name, key);
        key
    }

    pub fn render_all(&self) -> Result<Vec<u8>> {
        render_all(&self.entries)
    }
}

/// B34 units dictionary, keyed by unit name.
#[derive(Debug, Default)]
pub struct UnitDict {
    entries: Vec<UnitAbbreviation>,
    map: HashMap<String, u16>,
}

impl UnitDict {
    pub fn lookup(&mut self, name: &str, description: &str) -> u16 {
        if let Some(&key) = self.map.get(name) {
            return key;
        }
        let key = self.entries.len() as u16 + 1;
        self.entries.push(UnitAbbreviation {
            key,
            name: name.to_owned(),
            description: description.to_owned(),
        });
        self.map.insert(name.to_owned(), key);
        key
    }

    pub fn render_all(&self) -> Result<Vec<u8>> {
        render_all(&self.entries)
    }
}

/// B33 generic abbreviation dictionary, keyed by description text.
#[derive(Debug, Default)]
pub struct GenericDict {
    entries: Vec<GenericAbbreviation>,
    map: HashMap<String, u16>,
}

impl GenericDict {
    pub fn lookup(&mut self, description: &str) -> u16 {
        if let Some(&key) = self.map.get(description) {
            return key;
        }
        let key = self.entries.len() as u16 + 1;
        self.entries.push(GenericAbbreviation {
            key,
            description: description.to_owned(),
        });
        self.map.insert(description.to_owned(), key);
        key
    }

    pub fn render_all(&self) -> Result<Vec<u8>> {
        render_all(&self.entries)
    }
}

/// B31 comment dictionary, keyed by `(class, text)`.
#[derive(Debug, Default)]
pub struct CommentDict {
    entries: Vec<CommentDescription>,
    map: HashMap<(char, String), u16>,
}

impl CommentDict {
    pub fn lookup(&mut self, class_code: char, text: &str) -> u16 {
        if let Some(&key) = self.map.get(&(class_code, text.to_owned())) {
            return key;
        }
        let key = self.entries.len() as u16 + 1;
        self.entries.push(CommentDescription {
            key,
            class_code,
            text: text.to_owned(),
            units: 0,
        });
        self.map.insert((class_code, text.to_owned()), key);
        key
    }

    pub fn render_all(&self) -> Result<Vec<u8>> {
        render_all(&self.entries)
    }
}

fn render_all<B: Blockette>(entries: &[B]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for e in entries {
        out.extend_from_slice(&e.render()?);
    }
    Ok(out)
}
