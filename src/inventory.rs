//! The read-only metadata inventory consumed by the volume builder.
//!
//! A forest of epoch-keyed entities (network, station, sensor location,
//! stream) plus a flat registry of equipment and response objects keyed by
//! public id. The builder borrows the inventory and never mutates it;
//! validation of business rules happened upstream. Every optional attribute
//! is an explicit `Option`, there is no attribute probing.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::error::{Result, SeedError};
use crate::time::SeedTime;
use crate::types::Encoding;

/// Epoch-keyed map: `code -> start -> entity`.
pub type EpochMap<T> = BTreeMap<String, BTreeMap<SeedTime, T>>;

#[derive(Debug, Default)]
pub struct Inventory {
    pub networks: EpochMap<Network>,
    objects: HashMap<String, Equipment>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_network(&mut self, network: Network) {
        self.networks
            .entry(network.code.clone())
            .or_default()
            .insert(network.start, network);
    }

    pub fn add_sensor(&mut self, sensor: Sensor) {
        self.objects
            .insert(sensor.public_id.clone(), Equipment::Sensor(sensor));
    }

    pub fn add_datalogger(&mut self, datalogger: Datalogger) {
        self.objects
            .insert(datalogger.public_id.clone(), Equipment::Datalogger(datalogger));
    }

    pub fn add_response_paz(&mut self, paz: ResponsePaz) {
        self.objects
            .insert(paz.public_id.clone(), Equipment::Paz(paz));
    }

    pub fn add_response_polynomial(&mut self, poly: ResponsePolynomial) {
        self.objects
            .insert(poly.public_id.clone(), Equipment::Polynomial(poly));
    }

    pub fn add_response_fir(&mut self, fir: ResponseFir) {
        self.objects
            .insert(fir.public_id.clone(), Equipment::Fir(fir));
    }

    pub fn network(&self, code: &str, start: SeedTime) -> Option<&Network> {
        self.networks.get(code)?.get(&start)
    }

    pub fn object(&self, public_id: &str) -> Option<&Equipment> {
        self.objects.get(public_id)
    }

    pub fn sensor(&self, public_id: &str) -> Result<&Sensor> {
        match self.objects.get(public_id) {
            Some(Equipment::Sensor(s)) => Ok(s),
            _ => Err(missing("sensor", public_id)),
        }
    }

    pub fn datalogger(&self, public_id: &str) -> Result<&Datalogger> {
        match self.objects.get(public_id) {
            Some(Equipment::Datalogger(d)) => Ok(d),
            _ => Err(missing("datalogger", public_id)),
        }
    }

    pub fn response_paz(&self, public_id: &str) -> Result<&ResponsePaz> {
        match self.objects.get(public_id) {
            Some(Equipment::Paz(p)) => Ok(p),
            _ => Err(missing("response", public_id)),
        }
    }
}

fn missing(kind: &'static str, id: &str) -> SeedError {
    SeedError::MissingObject {
        kind,
        id: id.to_owned(),
    }
}

/// Equipment and response objects addressable by public id.
#[derive(Debug)]
pub enum Equipment {
    Sensor(Sensor),
    Datalogger(Datalogger),
    Paz(ResponsePaz),
    Polynomial(ResponsePolynomial),
    Fir(ResponseFir),
}

#[derive(Debug)]
pub struct Network {
    pub code: String,
    pub start: SeedTime,
    pub end: Option<SeedTime>,
    pub description: String,
    pub stations: EpochMap<Station>,
}

impl Network {
    pub fn new(code: &str, start: SeedTime) -> Self {
        Self {
            code: code.to_owned(),
            start,
            end: None,
            description: String::new(),
            stations: EpochMap::default(),
        }
    }

    pub fn with_end(mut self, end: SeedTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    pub fn add_station(&mut self, station: Station) {
        self.stations
            .entry(station.code.clone())
            .or_default()
            .insert(station.start, station);
    }

    pub fn station(&self, code: &str, start: SeedTime) -> Option<&Station> {
        self.stations.get(code)?.get(&start)
    }
}

#[derive(Debug)]
pub struct Station {
    pub code: String,
    pub start: SeedTime,
    pub end: Option<SeedTime>,
    /// Site description, e.g. "Apolda, Germany".
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub locations: EpochMap<SensorLocation>,
}

impl Station {
    pub fn new(code: &str, start: SeedTime) -> Self {
        Self {
            code: code.to_owned(),
            start,
            end: None,
            description: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            elevation: 0.0,
            locations: EpochMap::default(),
        }
    }

    pub fn with_end(mut self, end: SeedTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64, elevation: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self.elevation = elevation;
        self
    }

    pub fn add_location(&mut self, location: SensorLocation) {
        self.locations
            .entry(location.code.clone())
            .or_default()
            .insert(location.start, location);
    }

    pub fn location(&self, code: &str, start: SeedTime) -> Option<&SensorLocation> {
        self.locations.get(code)?.get(&start)
    }
}

#[derive(Debug)]
pub struct SensorLocation {
    pub code: String,
    pub start: SeedTime,
    pub end: Option<SeedTime>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub streams: EpochMap<Stream>,
}

impl SensorLocation {
    pub fn new(code: &str, start: SeedTime) -> Self {
        Self {
            code: code.to_owned(),
            start,
            end: None,
            latitude: 0.0,
            longitude: 0.0,
            elevation: 0.0,
            streams: EpochMap::default(),
        }
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64, elevation: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self.elevation = elevation;
        self
    }

    pub fn add_stream(&mut self, stream: Stream) {
        self.streams
            .entry(stream.code.clone())
            .or_default()
            .insert(stream.start, stream);
    }

    pub fn stream(&self, code: &str, start: SeedTime) -> Option<&Stream> {
        self.streams.get(code)?.get(&start)
    }
}

/// A channel epoch: what was recorded, with which equipment, at which rate.
#[derive(Debug)]
pub struct Stream {
    pub code: String,
    pub start: SeedTime,
    pub end: Option<SeedTime>,
    pub sensor: Option<String>,
    pub sensor_serial: Option<String>,
    pub sensor_channel: Option<u32>,
    pub datalogger: Option<String>,
    pub datalogger_serial: Option<String>,
    pub datalogger_channel: Option<u32>,
    pub sample_rate_numerator: u32,
    pub sample_rate_denominator: u32,
    pub depth: f64,
    pub azimuth: f64,
    pub dip: f64,
    pub format: Encoding,
    pub flags: String,
}

impl Stream {
    pub fn new(code: &str, start: SeedTime) -> Self {
        Self {
            code: code.to_owned(),
            start,
            end: None,
            sensor: None,
            sensor_serial: None,
            sensor_channel: None,
            datalogger: None,
            datalogger_serial: None,
            datalogger_channel: None,
            sample_rate_numerator: 1,
            sample_rate_denominator: 1,
            depth: 0.0,
            azimuth: 0.0,
            dip: 0.0,
            format: Encoding::Steim2,
            flags: "CG".to_owned(),
        }
    }

    pub fn with_end(mut self, end: SeedTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_sensor(mut self, public_id: &str) -> Self {
        self.sensor = Some(public_id.to_owned());
        self
    }

    pub fn with_datalogger(mut self, public_id: &str) -> Self {
        self.datalogger = Some(public_id.to_owned());
        self
    }

    pub fn with_sample_rate(mut self, numerator: u32, denominator: u32) -> Self {
        self.sample_rate_numerator = numerator;
        self.sample_rate_denominator = denominator;
        self
    }

    pub fn with_orientation(mut self, azimuth: f64, dip: f64, depth: f64) -> Self {
        self.azimuth = azimuth;
        self.dip = dip;
        self.depth = depth;
        self
    }

    pub fn with_format(mut self, format: Encoding) -> Self {
        self.format = format;
        self
    }

    /// Delivered sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        if self.sample_rate_denominator == 0 {
            return 0.0;
        }
        self.sample_rate_numerator as f64 / self.sample_rate_denominator as f64
    }
}

#[derive(Debug)]
pub struct Sensor {
    pub public_id: String,
    pub name: String,
    pub description: String,
    /// Input unit of the sensor signal, e.g. "M/S".
    pub unit: String,
    pub response: Option<String>,
    pub calibrations: Vec<Calibration>,
}

impl Sensor {
    pub fn new(public_id: &str, name: &str) -> Self {
        Self {
            public_id: public_id.to_owned(),
            name: name.to_owned(),
            description: String::new(),
            unit: "M/S".to_owned(),
            response: None,
            calibrations: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_owned();
        self
    }

    pub fn with_response(mut self, public_id: &str) -> Self {
        self.response = Some(public_id.to_owned());
        self
    }

    pub fn add_calibration(&mut self, calibration: Calibration) {
        self.calibrations.push(calibration);
    }
}

#[derive(Debug)]
pub struct Datalogger {
    pub public_id: String,
    pub name: String,
    pub description: String,
    pub gain: f64,
    pub max_clock_drift: Option<f64>,
    pub decimations: HashMap<(u32, u32), Decimation>,
    pub calibrations: Vec<Calibration>,
}

impl Datalogger {
    pub fn new(public_id: &str, name: &str, gain: f64) -> Self {
        Self {
            public_id: public_id.to_owned(),
            name: name.to_owned(),
            description: String::new(),
            gain,
            max_clock_drift: None,
            decimations: HashMap::new(),
            calibrations: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    pub fn with_max_clock_drift(mut self, drift: f64) -> Self {
        self.max_clock_drift = Some(drift);
        self
    }

    pub fn add_decimation(&mut self, numerator: u32, denominator: u32, decimation: Decimation) {
        self.decimations.insert((numerator, denominator), decimation);
    }

    pub fn add_calibration(&mut self, calibration: Calibration) {
        self.calibrations.push(calibration);
    }
}

/// The filter chains reducing a digitizer's native rate to one delivered
/// sample rate.
#[derive(Debug, Default, Clone)]
pub struct Decimation {
    /// Public ids of analog (PAZ) stages between sensor and digitizer.
    pub analog_chain: Vec<String>,
    /// Public ids of digital (FIR or digital-PAZ) stages after the digitizer.
    pub digital_chain: Vec<String>,
}

/// Gain override measured for one physical unit and channel.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub serial_number: String,
    pub channel_number: u32,
    pub start: SeedTime,
    pub end: Option<SeedTime>,
    pub gain: f64,
}

/// Poles-and-zeros response. `zeros`/`poles` keep the inventory's textual
/// list form (`"2(0,0) (-4.21,4.66)"`) and are parsed by the field codec at
/// encode time; `nzeros`/`npoles` are the declared counts checked against
/// the parse result.
#[derive(Debug)]
pub struct ResponsePaz {
    pub public_id: String,
    pub name: String,
    /// A = laplace rad/s, B = laplace Hz, D = digital (z-transform).
    pub ty: char,
    pub gain: f64,
    pub gain_frequency: f64,
    pub norm_factor: f64,
    pub norm_frequency: f64,
    pub nzeros: u16,
    pub npoles: u16,
    pub zeros: String,
    pub poles: String,
}

#[derive(Debug)]
pub struct ResponsePolynomial {
    pub public_id: String,
    pub name: String,
    pub gain: f64,
    pub gain_frequency: f64,
    /// 'A' rad/s, 'B' Hz.
    pub frequency_unit: char,
    /// 'M' MacLaurin.
    pub approximation_type: char,
    pub lower_frequency: f64,
    pub upper_frequency: f64,
    pub approximation_lower_bound: f64,
    pub approximation_upper_bound: f64,
    pub approximation_error: f64,
    pub coefficients: String,
}

/// FIR response. Coefficients are either inline or a reference to an
/// external coefficient file loaded lazily on first use.
#[derive(Debug)]
pub struct ResponseFir {
    pub public_id: String,
    pub name: String,
    pub gain: f64,
    pub decimation_factor: u32,
    pub delay: f64,
    pub correction: f64,
    /// Declared symmetry: A = none, B = even mirror, C = odd mirror.
    pub symmetry: char,
    /// Declared coefficient count.
    pub ncoeff: u16,
    pub coefficients: FirCoefficients,
}

#[derive(Debug)]
pub enum FirCoefficients {
    Inline(String),
    File(PathBuf),
}
