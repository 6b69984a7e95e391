//! End-to-end volume builds: dataless and full volumes, checked by walking
//! the emitted 4096-byte physical records.

use std::io::Cursor;

use seedvol::{
    DataRecord, Datalogger, Decimation, Encoding, FirCoefficients, Inventory, Network,
    ResponseFir, ResponsePaz, ResponseStyle, SeedTime, SeedVolume, Sensor, SensorLocation,
    Station, Stream, RECORD_LEN,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Minimal inventory: network XX, station AAA, location 00, channel HHZ at
/// 100 Hz with a 1-pole-1-zero sensor and a nominal-gain digitizer.
fn basic_inventory() -> Inventory {
    let mut inv = Inventory::new();
    inv.add_response_paz(ResponsePaz {
        public_id: "resp/paz/STS2".into(),
        name: "STS-2".into(),
        ty: 'A',
        gain: 1500.0,
        gain_frequency: 0.02,
        norm_factor: 6.0077e7,
        norm_frequency: 1.0,
        nzeros: 1,
        npoles: 1,
        zeros: "(0,0)".into(),
        poles: "(-0.037016,0.037016)".into(),
    });
    inv.add_sensor(
        Sensor::new("sensor/STS2", "STS-2")
            .with_description("Streckeisen STS-2")
            .with_response("resp/paz/STS2"),
    );
    let mut dl = Datalogger::new("dl/Q330", "Q330", 419430.0).with_max_clock_drift(1e-4);
    dl.add_decimation(100, 1, Decimation::default());
    inv.add_datalogger(dl);

    let mut net = Network::new("XX", SeedTime::date(2000, 1)).with_description("Test Network");
    let mut sta = Station::new("AAA", SeedTime::date(2000, 1))
        .with_description("Test Site")
        .with_position(48.16, 11.28, 613.0);
    let mut loc = SensorLocation::new("00", SeedTime::date(2000, 1)).with_position(48.16, 11.28, 613.0);
    loc.add_stream(
        Stream::new("HHZ", SeedTime::date(2000, 1))
            .with_sensor("sensor/STS2")
            .with_datalogger("dl/Q330")
            .with_sample_rate(100, 1)
            .with_orientation(0.0, -90.0, 0.0),
    );
    sta.add_location(loc);
    net.add_station(sta);
    inv.add_network(net);
    inv
}

fn steim_record(hour: u8, minute: u8, x_minus1: i32, xn: i32, frames: usize) -> DataRecord {
    DataRecord::new("XX", "AAA", "00", "HHZ")
        .with_times(
            SeedTime::new(2024, 100, hour, minute, 0),
            SeedTime::new(2024, 100, hour, minute, 59),
        )
        .with_fsamp(100.0)
        .with_encoding(Encoding::Steim2)
        .with_samples(6000, x_minus1, xn)
        .with_payload(vec![0x5A; frames * 64])
}

fn physical_records(buf: &[u8]) -> Vec<&[u8]> {
    assert_eq!(buf.len() % RECORD_LEN, 0, "volume must be whole records");
    buf.chunks(RECORD_LEN).collect()
}

/// Concatenated blockette payload of all records carrying one section tag.
fn section_payload(buf: &[u8], tag: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for rec in physical_records(buf) {
        if rec[6] == tag {
            out.extend_from_slice(&rec[8..]);
        }
    }
    out
}

/// Walk concatenated blockette frames up to the trailing space padding.
fn blockettes(payload: &[u8]) -> Vec<(u16, Vec<u8>)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos + 7 <= payload.len() && payload[pos] != b' ' {
        let ty: u16 = std::str::from_utf8(&payload[pos..pos + 3])
            .unwrap()
            .parse()
            .unwrap();
        let len: usize = std::str::from_utf8(&payload[pos + 3..pos + 7])
            .unwrap()
            .parse()
            .unwrap();
        out.push((ty, payload[pos..pos + len].to_vec()));
        pos += len;
    }
    out
}

fn count_type(payload: &[u8], ty: u16) -> usize {
    blockettes(payload).iter().filter(|(t, _)| *t == ty).count()
}

#[test]
fn dataless_volume_has_expected_blockettes() {
    init_logging();
    let inv = basic_inventory();
    let mut vol = SeedVolume::new(&inv).with_organization("GEOFON");
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .unwrap();
    let mut out = Cursor::new(Vec::new());
    let stats = vol.output(&mut out, true).unwrap();
    let buf = out.into_inner();

    assert_eq!(stats.data_records, 0);
    assert_eq!(stats.index_records, 0);
    assert_eq!(
        buf.len(),
        stats.total_records() as usize * RECORD_LEN
    );

    // sequence numbers are continuous from 1 and sections appear in order
    for (i, rec) in physical_records(&buf).iter().enumerate() {
        let seq: u32 = std::str::from_utf8(&rec[..6]).unwrap().parse().unwrap();
        assert_eq!(seq, i as u32 + 1);
        assert!(matches!(rec[6], b'V' | b'A' | b'S'));
    }

    let station = section_payload(&buf, b'S');
    assert_eq!(count_type(&station, 50), 1, "exactly one B50");
    assert_eq!(count_type(&station, 52), 1, "exactly one B52");
    // default dictionary style: B60 in the channel, B43 in the abbreviations
    assert_eq!(count_type(&station, 60), 1);
    let abbrev = section_payload(&buf, b'A');
    assert_eq!(count_type(&abbrev, 43), 1);
    assert!(count_type(&abbrev, 48) >= 1);
    // stage-0 sensitivity in the channel
    assert!(count_type(&station, 58) >= 1);
}

#[test]
fn inline_style_emits_b53_chain() {
    init_logging();
    let inv = basic_inventory();
    let mut vol = SeedVolume::new(&inv).with_response_style(ResponseStyle::Inline);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .unwrap();
    let mut out = Cursor::new(Vec::new());
    vol.output(&mut out, true).unwrap();
    let buf = out.into_inner();

    let station = section_payload(&buf, b'S');
    assert_eq!(count_type(&station, 53), 1);
    assert_eq!(count_type(&station, 54), 1);
    assert_eq!(count_type(&station, 57), 1);
    assert!(count_type(&station, 58) >= 2, "per-stage gains plus stage 0");
    assert_eq!(count_type(&station, 60), 0);
    let abbrev = section_payload(&buf, b'A');
    assert_eq!(count_type(&abbrev, 43), 0);
}

#[test]
fn missing_decimation_is_recoverable_unless_strict() {
    init_logging();
    let mut inv = basic_inventory();
    // channel requests 100/1 but the datalogger only defines 50/1
    let mut dl = Datalogger::new("dl/Q330", "Q330", 419430.0);
    dl.add_decimation(50, 1, Decimation::default());
    inv.add_datalogger(dl);

    // strict: the build raises
    let mut vol = SeedVolume::new(&inv);
    assert!(vol
        .add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .is_err());

    // relaxed: the build succeeds with a synthesized empty chain
    let mut vol = SeedVolume::new(&inv);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, false)
        .unwrap();
    let mut out = Cursor::new(Vec::new());
    vol.output(&mut out, false).unwrap();
    let buf = out.into_inner();
    let station = section_payload(&buf, b'S');
    assert_eq!(count_type(&station, 52), 1, "channel still present");
    let abbrev = section_payload(&buf, b'A');
    // digitizer decimation at the stream's nominal rate
    let b47 = blockettes(&abbrev)
        .into_iter()
        .find(|(t, _)| *t == 47)
        .expect("decimation dictionary entry");
    assert!(b47.1.windows(10).any(|w| w == b"1.0000E+02"));
}

#[test]
fn unresolvable_channel_is_skipped_not_fatal() {
    init_logging();
    let mut inv = basic_inventory();
    // second channel referencing a sensor that does not exist
    let mut net = Network::new("XX", SeedTime::date(2000, 1));
    let mut sta = Station::new("AAA", SeedTime::date(2000, 1));
    let mut loc = SensorLocation::new("00", SeedTime::date(2000, 1));
    loc.add_stream(
        Stream::new("HHZ", SeedTime::date(2000, 1))
            .with_sensor("sensor/STS2")
            .with_datalogger("dl/Q330")
            .with_sample_rate(100, 1),
    );
    loc.add_stream(
        Stream::new("HHN", SeedTime::date(2000, 1))
            .with_sensor("sensor/ghost")
            .with_datalogger("dl/Q330")
            .with_sample_rate(100, 1),
    );
    sta.add_location(loc);
    net.add_station(sta);
    inv.add_network(net);

    let mut vol = SeedVolume::new(&inv);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, false)
        .unwrap();
    vol.add_chan("XX", "AAA", "00", "HHN", SeedTime::date(2000, 1), None, false)
        .unwrap();
    let mut out = Cursor::new(Vec::new());
    vol.output(&mut out, false).unwrap();
    let station = section_payload(&out.into_inner(), b'S');
    assert_eq!(count_type(&station, 52), 1, "only the resolvable channel");
}

#[test]
fn fir_splitting_survives_full_build() {
    init_logging();
    let mut inv = basic_inventory();
    inv.add_response_fir(ResponseFir {
        public_id: "fir/big".into(),
        name: "FIR_BIG".into(),
        gain: 1.0,
        decimation_factor: 2,
        delay: 0.0,
        correction: 0.0,
        symmetry: 'A',
        ncoeff: 5000,
        coefficients: FirCoefficients::Inline(
            (0..5000)
                .map(|i| format!("{:.6e}", (i as f64 + 1.0) * 1e-6))
                .collect::<Vec<_>>()
                .join(" "),
        ),
    });
    let mut dl = Datalogger::new("dl/Q330", "Q330", 419430.0);
    dl.add_decimation(
        100,
        1,
        Decimation {
            analog_chain: Vec::new(),
            digital_chain: vec!["fir/big".into()],
        },
    );
    inv.add_datalogger(dl);

    let mut vol = SeedVolume::new(&inv);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .unwrap();
    let mut out = Cursor::new(Vec::new());
    vol.output(&mut out, true).unwrap();
    let abbrev = section_payload(&out.into_inner(), b'A');

    let parts: Vec<_> = blockettes(&abbrev)
        .into_iter()
        .filter(|(t, _)| *t == 41)
        .collect();
    assert!(parts.len() > 1, "5000 coefficients need several B41s");
    let total: usize = parts
        .iter()
        .map(|(_, b)| {
            // key(4) + name~ + symmetry(1) + units(6) precede the count
            let name_end = b[11..].iter().position(|&c| c == b'~').unwrap() + 12;
            std::str::from_utf8(&b[name_end + 7..name_end + 11])
                .unwrap()
                .parse::<usize>()
                .unwrap()
        })
        .sum();
    assert_eq!(total, 5000);
}

#[test]
fn full_volume_record_numbering_is_consistent() {
    init_logging();
    let inv = basic_inventory();
    let mut vol = SeedVolume::new(&inv);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .unwrap();
    // three non-contiguous chunks: continuity broken on purpose
    vol.add_data(steim_record(0, 0, 0, 10, 20));
    vol.add_data(steim_record(1, 0, 99, 20, 20));
    vol.add_data(steim_record(2, 0, 88, 30, 20));
    let mut out = Cursor::new(Vec::new());
    let stats = vol.output(&mut out, false).unwrap();
    let buf = out.into_inner();

    assert_eq!(stats.data_records, 3);
    assert!(stats.index_records >= 1);
    assert_eq!(
        buf.len(),
        stats.total_records() as usize * RECORD_LEN
    );

    // every B74 reference must point at a data record whose sequence number
    // and section tag match what is physically at that offset
    let index = section_payload(&buf, b'T');
    let recs = physical_records(&buf);
    let mut checked = 0;
    for (ty, frame) in blockettes(&index) {
        if ty != 74 {
            continue;
        }
        let body = &frame[7..];
        let mut pos = 10;
        for _ in 0..2 {
            let tilde = body[pos..].iter().position(|&c| c == b'~').unwrap();
            pos += tilde + 1;
            let refno: usize = std::str::from_utf8(&body[pos..pos + 6])
                .unwrap()
                .parse()
                .unwrap();
            let rec = recs[refno - 1];
            assert_eq!(rec[6], b'D');
            let seq: usize = std::str::from_utf8(&rec[..6]).unwrap().parse().unwrap();
            assert_eq!(seq, refno);
            pos += 6 + 2;
            checked += 1;
        }
    }
    assert_eq!(checked, 6, "three series, first+last each");

    // B12 must point at the record carrying the span's B70
    let volume = section_payload(&buf, b'V');
    let b12 = blockettes(&volume)
        .into_iter()
        .find(|(t, _)| *t == 12)
        .unwrap();
    let body = &b12.1[7..];
    let nspans: usize = std::str::from_utf8(&body[..4]).unwrap().parse().unwrap();
    assert!(nspans >= 1);
    let mut pos = 4;
    for _ in 0..nspans {
        for _ in 0..2 {
            let tilde = body[pos..].iter().position(|&c| c == b'~').unwrap();
            pos += tilde + 1;
        }
        let refno: usize = std::str::from_utf8(&body[pos..pos + 6])
            .unwrap()
            .parse()
            .unwrap();
        pos += 6;
        assert_eq!(recs[refno - 1][6], b'T');
    }
}

#[test]
fn contiguous_records_merge_into_one_physical_record() {
    init_logging();
    let inv = basic_inventory();
    let mut vol = SeedVolume::new(&inv);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .unwrap();
    // bit-exact continuity: xn == next x_minus1
    vol.add_data(steim_record(0, 0, 0, 10, 20));
    vol.add_data(steim_record(0, 1, 10, 20, 20));
    let mut out = Cursor::new(Vec::new());
    let stats = vol.output(&mut out, false).unwrap();
    assert_eq!(stats.data_records, 1);
}

#[test]
fn unmatched_data_dropped_or_fatal() {
    init_logging();
    let inv = basic_inventory();

    let mut vol = SeedVolume::new(&inv);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .unwrap();
    let mut stray = steim_record(0, 0, 0, 10, 20);
    stray.channel = "HHN".into();
    vol.add_data(stray.clone());
    let mut out = Cursor::new(Vec::new());
    let stats = vol.output(&mut out, false).unwrap();
    assert_eq!(stats.data_records, 0, "stray series dropped in relaxed mode");
    assert_eq!(stats.index_records, 0);

    let mut vol = SeedVolume::new(&inv);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .unwrap();
    vol.add_data(stray);
    let mut out = Cursor::new(Vec::new());
    assert!(vol.output(&mut out, true).is_err());
}

#[test]
fn rebuilds_are_byte_identical() {
    init_logging();
    let inv = basic_inventory();
    let build = || {
        let mut vol = SeedVolume::new(&inv).with_organization("GEOFON").with_label("TEST");
        vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
            .unwrap();
        vol.add_data(steim_record(0, 0, 0, 10, 20));
        vol.add_data(steim_record(1, 0, 10, 20, 20));
        let mut out = Cursor::new(Vec::new());
        vol.output(&mut out, false).unwrap();
        out.into_inner()
    };
    assert_eq!(build(), build());
}

#[test]
fn channel_epochs_clamp_to_volume_span() {
    init_logging();
    let inv = basic_inventory();
    let mut vol = SeedVolume::new(&inv);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .unwrap();
    vol.add_data(steim_record(6, 0, 0, 10, 20));
    let mut out = Cursor::new(Vec::new());
    vol.output(&mut out, false).unwrap();
    let buf = out.into_inner();

    let station = section_payload(&buf, b'S');
    let (_, b52) = blockettes(&station)
        .into_iter()
        .find(|(t, _)| *t == 52)
        .unwrap();
    let text = String::from_utf8_lossy(&b52).into_owned();
    // channel epoch opened 2000-001 but the volume span is the data span
    assert!(text.contains("2024,100"), "clamped start: {text}");
    assert!(!text.contains("2000,001"), "unclamped epoch leaked: {text}");

    // the station header keeps its true epoch
    let (_, b50) = blockettes(&station)
        .into_iter()
        .find(|(t, _)| *t == 50)
        .unwrap();
    assert!(String::from_utf8_lossy(&b50).contains("2000,001"));
}

#[test]
fn station_comments_reference_the_dictionary() {
    init_logging();
    let inv = basic_inventory();
    let mut vol = SeedVolume::new(&inv);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .unwrap();
    vol.add_station_comment(
        "XX",
        "AAA",
        SeedTime::date(2010, 1),
        Some(SeedTime::date(2010, 200)),
        "Vault flooded after heavy rain",
    )
    .unwrap();
    let mut out = Cursor::new(Vec::new());
    vol.output(&mut out, true).unwrap();
    let buf = out.into_inner();

    let station = section_payload(&buf, b'S');
    assert_eq!(count_type(&station, 51), 1);
    let abbrev = section_payload(&buf, b'A');
    let b31 = blockettes(&abbrev)
        .into_iter()
        .find(|(t, _)| *t == 31)
        .expect("comment dictionary entry");
    assert!(String::from_utf8_lossy(&b31.1).contains("Vault flooded"));
}

#[test]
fn fir_coefficients_load_from_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fir_taps.txt");
    // symmetric 5-tap filter declared asymmetric: loader must fold it to C
    std::fs::write(&path, "0.1 0.2 0.4 0.2 0.1").unwrap();

    let mut inv = basic_inventory();
    inv.add_response_fir(ResponseFir {
        public_id: "fir/file".into(),
        name: "FIR_FILE".into(),
        gain: 1.0,
        decimation_factor: 2,
        delay: 0.0,
        correction: 0.0,
        symmetry: 'A',
        ncoeff: 5,
        coefficients: FirCoefficients::File(path),
    });
    let mut dl = Datalogger::new("dl/Q330", "Q330", 419430.0);
    dl.add_decimation(
        100,
        1,
        Decimation {
            analog_chain: Vec::new(),
            digital_chain: vec!["fir/file".into()],
        },
    );
    inv.add_datalogger(dl);

    // relaxed: symmetry corrected in place with a warning
    let mut vol = SeedVolume::new(&inv);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, false)
        .unwrap();
    let mut out = Cursor::new(Vec::new());
    vol.output(&mut out, false).unwrap();
    let abbrev = section_payload(&out.into_inner(), b'A');
    let (_, b41) = blockettes(&abbrev)
        .into_iter()
        .find(|(t, _)| *t == 41)
        .expect("FIR dictionary entry");
    let text = String::from_utf8_lossy(&b41);
    assert!(text.contains('C'), "folded symmetry: {text}");
    // folded to 3 stored coefficients
    let name_end = b41[11..].iter().position(|&c| c == b'~').unwrap() + 12;
    let count: usize = std::str::from_utf8(&b41[name_end + 7..name_end + 11])
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(count, 3);

    // strict: the same mismatch is fatal
    let mut vol = SeedVolume::new(&inv);
    assert!(vol
        .add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .is_err());
}

#[test]
fn inline_fir_spans_records_with_continuation_flag() {
    init_logging();
    let mut inv = basic_inventory();
    inv.add_response_fir(ResponseFir {
        public_id: "fir/wide".into(),
        name: "FIR_WIDE".into(),
        gain: 1.0,
        decimation_factor: 2,
        delay: 0.0,
        correction: 0.0,
        symmetry: 'A',
        ncoeff: 400,
        coefficients: FirCoefficients::Inline(
            (0..400)
                .map(|i| format!("{:.6e}", (i as f64 + 1.0) * 1e-5))
                .collect::<Vec<_>>()
                .join(" "),
        ),
    });
    let mut dl = Datalogger::new("dl/Q330", "Q330", 419430.0);
    dl.add_decimation(
        100,
        1,
        Decimation {
            analog_chain: Vec::new(),
            digital_chain: vec!["fir/wide".into()],
        },
    );
    inv.add_datalogger(dl);

    let mut vol = SeedVolume::new(&inv).with_response_style(ResponseStyle::Inline);
    vol.add_chan("XX", "AAA", "00", "HHZ", SeedTime::date(2000, 1), None, true)
        .unwrap();
    let mut out = Cursor::new(Vec::new());
    vol.output(&mut out, true).unwrap();
    let buf = out.into_inner();

    // a 400-coefficient B61 is ~5.6 KB and must span two station records
    let continued = physical_records(&buf)
        .iter()
        .any(|r| r[6] == b'S' && r[7] == b'*');
    assert!(continued, "expected a continuation record in the S section");
}
