//! Pure Rust SEED 2.3 volume builder.
//!
//! Zero `unsafe`, zero C dependencies. Consumes a validated seismic-network
//! metadata inventory (networks, stations, sensor locations, channels,
//! instrument responses) and, optionally, a stream of continuous waveform
//! records, and writes a single standards-compliant SEED 2.3 volume of
//! 4096-byte physical records: dataless when no waveforms are supplied,
//! full otherwise. Blockette dictionaries are deduplicated, instrument
//! response chains are resolved per channel, contiguous waveform records
//! are merged, and index blockettes carry the multi-pass-corrected absolute
//! record numbers downstream tools depend on.
//!
//! # Building a dataless volume
//!
//! ```
//! use std::io::Cursor;
//! use seedvol::{
//!     Datalogger, Decimation, Inventory, Network, ResponsePaz, SeedTime, SeedVolume, Sensor,
//!     SensorLocation, Station, Stream,
//! };
//!
//! let mut inv = Inventory::new();
//! inv.add_response_paz(ResponsePaz {
//!     public_id: "resp/paz/STS2".into(),
//!     name: "STS-2".into(),
//!     ty: 'A',
//!     gain: 1500.0,
//!     gain_frequency: 0.02,
//!     norm_factor: 6.0077e7,
//!     norm_frequency: 1.0,
//!     nzeros: 1,
//!     npoles: 1,
//!     zeros: "(0,0)".into(),
//!     poles: "(-0.037016,0.037016)".into(),
//! });
//! inv.add_sensor(Sensor::new("sensor/STS2", "STS-2").with_response("resp/paz/STS2"));
//! let mut dl = Datalogger::new("dl/Q330", "Q330", 419430.0);
//! dl.add_decimation(100, 1, Decimation::default());
//! inv.add_datalogger(dl);
//!
//! let mut net = Network::new("XX", SeedTime::date(2000, 1));
//! let mut sta = Station::new("AAA", SeedTime::date(2000, 1));
//! let mut loc = SensorLocation::new("00", SeedTime::date(2000, 1));
//! loc.add_stream(
//!     Stream::new("HHZ", SeedTime::date(2000, 1))
//!         .with_sensor("sensor/STS2")
//!         .with_datalogger("dl/Q330")
//!         .with_sample_rate(100, 1),
//! );
//! sta.add_location(loc);
//! net.add_station(sta);
//! inv.add_network(net);
//!
//! let mut vol = SeedVolume::new(&inv).with_organization("TEST");
//! vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true).unwrap();
//!
//! let mut out = Cursor::new(Vec::new());
//! let stats = vol.output(&mut out, true).unwrap();
//! assert_eq!(stats.data_records, 0);
//! assert_eq!(out.get_ref().len() % 4096, 0);
//! ```
//!
//! # Adding waveform data
//!
//! ```
//! use seedvol::{DataRecord, Encoding, SeedTime};
//!
//! let record = DataRecord::new("XX", "AAA", "00", "HHZ")
//!     .with_times(
//!         SeedTime::new(2024, 100, 0, 0, 0),
//!         SeedTime::new(2024, 100, 0, 1, 0),
//!     )
//!     .with_fsamp(100.0)
//!     .with_encoding(Encoding::Steim2)
//!     .with_samples(6_000, 0, 1234)
//!     .with_payload(vec![0; 20 * 64]);
//!
//! assert_eq!(record.stream_id(), "XX.AAA.00.HHZ");
//! ```

pub mod abbrev;
pub mod blockette;
pub mod control;
pub mod dictionary;
pub mod error;
pub mod field;
pub mod index;
pub mod inventory;
pub mod record;
pub mod respdict;
pub mod response;
pub mod respstage;
pub mod span;
pub mod station;
pub mod time;
pub mod types;
pub mod volume;
pub mod writer;

pub use error::{Result, SeedError};
pub use inventory::{
    Calibration, Datalogger, Decimation, Equipment, FirCoefficients, Inventory, Network,
    ResponseFir, ResponsePaz, ResponsePolynomial, Sensor, SensorLocation, Station, Stream,
};
pub use record::{DataRecord, DATA_CAPACITY, RECORD_LEN, RECORD_LEN_POWER};
pub use time::SeedTime;
pub use types::{Encoding, ResponseStyle, SectionTag};
pub use volume::{SeedVolume, VolumeStats};
