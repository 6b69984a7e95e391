//! Error types for SEED volume building.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("string {value:?} cannot be reduced to its allowed character classes")]
    BadCharset { value: String },

    #[error("cannot parse numeric field {0:?}")]
    BadNumber(String),

    #[error("value {value} does not fit in a {width}-digit field")]
    FieldOverflow { value: i64, width: usize },

    #[error("blockette {ty}: declared length {declared} != serialized length {actual}")]
    LengthMismatch {
        ty: u16,
        declared: usize,
        actual: usize,
    },

    #[error("response {id:?}: declared {declared} {what}, found {actual}")]
    CountMismatch {
        id: String,
        what: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("FIR {id:?}: declared symmetry {declared}, detected {detected}")]
    SymmetryMismatch {
        id: String,
        declared: char,
        detected: char,
    },

    #[error("no {kind} with public id {id:?}")]
    MissingObject { kind: &'static str, id: String },

    #[error("datalogger {id:?} defines no decimation for {numerator}/{denominator} sps")]
    MissingDecimation {
        id: String,
        numerator: u32,
        denominator: u32,
    },

    #[error("no channel epoch matches {net}_{sta}_{loc}_{cha} at {time}")]
    UnmatchedChannel {
        net: String,
        sta: String,
        loc: String,
        cha: String,
        time: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SeedError {
    /// Whether this error concerns a single channel's resolution rather than
    /// the volume as a whole. In relaxed mode the builder skips the channel
    /// and keeps going; in strict mode every error aborts the build.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            SeedError::MissingObject { .. }
                | SeedError::MissingDecimation { .. }
                | SeedError::UnmatchedChannel { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SeedError>;
