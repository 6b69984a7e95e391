//! Station-section blockettes: B50 (station identifier), B51 (station
//! comment) and B52 (channel identifier).

use crate::blockette::Blockette;
use crate::error::Result;
use crate::field::{self, class};
use crate::time::SeedTime;

/// B50: station identifier.
#[derive(Debug, Clone)]
pub struct StationId {
    pub code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub num_channels: u16,
    pub num_comments: u16,
    pub site_name: String,
    /// B33 key of the network description.
    pub network_key: u16,
    pub start: Option<SeedTime>,
    pub end: Option<SeedTime>,
    pub network_code: String,
}

impl Blockette for StationId {
    fn type_code(&self) -> u16 {
        50
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::fixed(&self.code, 5, class::UN)?;
        b.extend_from_slice(&field::fixed_f64(self.latitude, 10, 6)?);
        b.extend_from_slice(&field::fixed_f64(self.longitude, 11, 6)?);
        b.extend_from_slice(&field::fixed_f64(self.elevation, 7, 1)?);
        b.extend_from_slice(&field::int(self.num_channels as i64, 4)?);
        b.extend_from_slice(&field::int(self.num_comments as i64, 3)?);
        b.extend_from_slice(&field::variable(&self.site_name, 1, 60, class::UNLPS)?);
        b.extend_from_slice(&field::int(self.network_key as i64, 3)?);
        b.extend_from_slice(b"3210"); // 32-bit word order
        b.extend_from_slice(b"10"); // 16-bit word order
        b.extend_from_slice(&field::time_full(self.start));
        b.extend_from_slice(&field::time_full(self.end));
        b.push(b'N'); // update flag
        b.extend_from_slice(&field::fixed(&self.network_code, 2, class::UN)?);
        Ok(b)
    }
}

/// B51: station comment, referencing a B31 comment description.
#[derive(Debug, Clone)]
pub struct StationComment {
    pub start: Option<SeedTime>,
    pub end: Option<SeedTime>,
    pub comment_key: u16,
}

impl Blockette for StationComment {
    fn type_code(&self) -> u16 {
        51
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::time_full(self.start);
        b.extend_from_slice(&field::time_full(self.end));
        b.extend_from_slice(&field::int(self.comment_key as i64, 4)?);
        b.extend_from_slice(&field::int(0, 6)?); // comment level
        Ok(b)
    }
}

/// B52: channel identifier.
#[derive(Debug, Clone)]
pub struct ChannelId {
    pub location: String,
    pub channel: String,
    /// B33 key of the instrument description.
    pub instrument_key: u16,
    /// B34 key of the signal response units.
    pub signal_units: u16,
    /// B34 key of the calibration input units.
    pub calibration_units: u16,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub local_depth: f64,
    pub azimuth: f64,
    pub dip: f64,
    /// B30 key of the data format.
    pub format_key: u16,
    pub record_length_power: u8,
    pub sample_rate: f64,
    pub max_clock_drift: f64,
    pub flags: String,
    pub start: Option<SeedTime>,
    pub end: Option<SeedTime>,
}

impl Blockette for ChannelId {
    fn type_code(&self) -> u16 {
        52
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut b = field::fixed(&self.location, 2, class::UN)?;
        b.extend_from_slice(&field::fixed(&self.channel, 3, class::UN)?);
        b.extend_from_slice(&field::int(0, 4)?); // subchannel
        b.extend_from_slice(&field::int(self.instrument_key as i64, 3)?);
        b.extend_from_slice(&field::variable("", 0, 30, class::UNLPS)?); // optional comment
        b.extend_from_slice(&field::int(self.signal_units as i64, 3)?);
        b.extend_from_slice(&field::int(self.calibration_units as i64, 3)?);
        b.extend_from_slice(&field::fixed_f64(self.latitude, 10, 6)?);
        b.extend_from_slice(&field::fixed_f64(self.longitude, 11, 6)?);
        b.extend_from_slice(&field::fixed_f64(self.elevation, 7, 1)?);
        b.extend_from_slice(&field::fixed_f64(self.local_depth, 5, 1)?);
        b.extend_from_slice(&field::fixed_f64(self.azimuth, 5, 1)?);
        b.extend_from_slice(&field::fixed_f64(self.dip, 5, 1)?);
        b.extend_from_slice(&field::int(self.format_key as i64, 4)?);
        b.extend_from_slice(&field::int(self.record_length_power as i64, 2)?);
        b.extend_from_slice(&field::exp_f64(self.sample_rate, 10, 4)?);
        b.extend_from_slice(&field::exp_f64(self.max_clock_drift, 10, 4)?);
        b.extend_from_slice(&field::int(0, 4)?); // number of comments
        b.extend_from_slice(&field::variable(&self.flags, 0, 26, class::UN)?);
        b.extend_from_slice(&field::time_full(self.start));
        b.extend_from_slice(&field::time_full(self.end));
        b.push(b'N'); // update flag
        Ok(b)
    }
}
