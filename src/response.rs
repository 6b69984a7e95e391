//! Instrument response resolution.
//!
//! For every channel the resolver walks the filter graph: sensor response,
//! optional analog PAZ chain, digitizer, optional digital FIR/PAZ chain,
//! and turns it into response blockettes plus a cumulative stage-0
//! sensitivity. Two output flavors hide behind the same call: the old-style
//! dictionary flavor deduplicates B41-B48 entries in the abbreviation
//! section and hands the channel a B60 reference, the new-style flavor
//! writes per-stage B53-B58/B61/B62 inline. The station assembler never
//! sees the difference.

use std::collections::HashMap;

use log::warn;

use crate::blockette::Blockette;
use crate::dictionary::UnitDict;
use crate::error::{Result, SeedError};
use crate::field;
use crate::inventory::{
    Calibration, Decimation, Equipment, FirCoefficients, Inventory, ResponseFir, ResponsePaz,
    ResponsePolynomial, Stream,
};
use crate::respdict::{CoefficientsDict, DecimationDict, FirDict, GainDict, PazDict, PolynomialDict};
use crate::respstage::{
    CoefficientsStage, DecimationStage, FirStage, GainStage, PazStage, PolynomialStage,
    ResponseReference,
};
use crate::types::ResponseStyle;

/// The resolved response of one channel.
#[derive(Debug)]
pub struct ChannelResponse {
    /// Rendered channel-section response blockettes, emitted after the B52.
    pub blockettes: Vec<u8>,
    /// Cumulative gain over all stages.
    pub sensitivity: f64,
    pub sensitivity_frequency: f64,
    /// B34 key of the sensor signal units.
    pub signal_units: u16,
    /// B34 key of the calibration input units.
    pub calibration_units: u16,
}

/// Per-volume response resolver and dictionary store.
#[derive(Debug)]
pub struct Resolver {
    style: ResponseStyle,
    pub units: UnitDict,
    /// Content-keyed dedup of B41-B48 dictionary entries.
    dict_keys: HashMap<String, u16>,
    dict_bytes: Vec<u8>,
    next_key: u16,
    fir_cache: HashMap<String, EffectiveFir>,
}

/// A FIR filter after lazy loading and symmetry verification: the
/// "effective" half of the declared-vs-effective pair.
#[derive(Debug, Clone)]
struct EffectiveFir {
    symmetry: char,
    coefficients: Vec<f64>,
}

/// Deviation of a FIR filter's declared shape from its coefficient list.
#[derive(Debug)]
enum FirCorrection {
    Count { declared: usize, actual: usize },
    Symmetry { declared: char, detected: char },
}

impl Resolver {
    pub fn new(style: ResponseStyle) -> Self {
        Self {
            style,
            units: UnitDict::default(),
            dict_keys: HashMap::new(),
            dict_bytes: Vec::new(),
            next_key: 1,
            fir_cache: HashMap::new(),
        }
    }

    /// Rendered B41-B48 dictionary blockettes, in key order, for the
    /// abbreviation section. Empty in inline style.
    pub fn dictionary_bytes(&self) -> &[u8] {
        &self.dict_bytes
    }

    /// Resolve the full response chain of one stream.
    pub fn resolve(&mut self, inv: &Inventory, stream: &Stream, strict: bool) -> Result<ChannelResponse> {
        let sensor_id = stream
            .sensor
            .as_deref()
            .ok_or_else(|| missing("sensor", &stream.code))?;
        let sensor = inv.sensor(sensor_id)?;
        let sensor_resp_id = sensor
            .response
            .as_deref()
            .ok_or_else(|| missing("response", sensor_id))?;

        let dl_id = stream
            .datalogger
            .as_deref()
            .ok_or_else(|| missing("datalogger", &stream.code))?;
        let dl = inv.datalogger(dl_id)?;

        let signal_units = self.units.lookup(&sensor.unit, unit_description(&sensor.unit));
        let volt = self.units.lookup("V", "Volts");
        let counts = self.units.lookup("COUNTS", "Digital Counts");

        // Decimation chain for the requested rate pair. Absence is
        // recoverable: warn and continue with an empty chain at the
        // stream's nominal rate.
        let rate_key = (stream.sample_rate_numerator, stream.sample_rate_denominator);
        let decimation = match dl.decimations.get(&rate_key) {
            Some(d) => d.clone(),
            None if strict => {
                return Err(SeedError::MissingDecimation {
                    id: dl.public_id.clone(),
                    numerator: rate_key.0,
                    denominator: rate_key.1,
                });
            }
            None => {
                warn!(
                    "datalogger {:?} has no decimation for {}/{} sps, using empty chain",
                    dl.public_id, rate_key.0, rate_key.1
                );
                Decimation::default()
            }
        };

        // Resolve the digital chain up front; decimation factors determine
        // the per-stage input rates and the digitizer's native rate.
        enum Digital<'a> {
            Fir(&'a ResponseFir, EffectiveFir),
            Paz(&'a ResponsePaz),
        }
        let mut digital = Vec::new();
        for id in &decimation.digital_chain {
            match inv.object(id) {
                Some(Equipment::Fir(f)) => {
                    let eff = self.effective_fir(f, strict)?;
                    digital.push(Digital::Fir(f, eff));
                }
                Some(Equipment::Paz(p)) => digital.push(Digital::Paz(p)),
                _ => return Err(missing("digital filter", id)),
            }
        }

        let stream_rate = stream.sample_rate();
        let mut input_rates = vec![0.0; digital.len()];
        let mut rate = stream_rate;
        for (i, stage) in digital.iter().enumerate().rev() {
            let factor = match stage {
                Digital::Fir(f, _) => f.decimation_factor.max(1),
                Digital::Paz(_) => 1,
            };
            rate *= factor as f64;
            input_rates[i] = rate;
        }
        let digitizer_rate = rate;

        let sensor_gain_override = calibrated_gain(
            &sensor.calibrations,
            stream.sensor_serial.as_deref(),
            stream.sensor_channel,
        );
        let dl_gain = calibrated_gain(
            &dl.calibrations,
            stream.datalogger_serial.as_deref(),
            stream.datalogger_channel,
        )
        .unwrap_or(dl.gain);

        let mut out = Vec::new();
        let mut refstages: Vec<(u8, Vec<u16>)> = Vec::new();
        let mut stage: u8 = 1;
        let mut sensitivity = 1.0;
        let sensitivity_frequency;

        // --- Stage 1: sensor ---
        match inv.object(sensor_resp_id) {
            Some(Equipment::Paz(p)) => {
                let gain = sensor_gain_override.unwrap_or(p.gain);
                sensitivity *= gain;
                sensitivity_frequency = p.gain_frequency;
                self.paz_stage(&mut out, &mut refstages, p, stage, gain, signal_units, volt)?;
            }
            Some(Equipment::Polynomial(p)) => {
                let gain = sensor_gain_override.unwrap_or(p.gain);
                sensitivity *= gain;
                sensitivity_frequency = p.gain_frequency;
                self.polynomial_stage(&mut out, &mut refstages, p, stage, gain, signal_units, volt)?;
            }
            _ => return Err(missing("response", sensor_resp_id)),
        }
        stage += 1;

        // --- Analog chain: PAZ stages between sensor and digitizer ---
        for id in &decimation.analog_chain {
            let p = inv.response_paz(id)?;
            sensitivity *= p.gain;
            self.paz_stage(&mut out, &mut refstages, p, stage, p.gain, volt, volt)?;
            stage += 1;
        }

        // --- Digitizer: empty coefficients + unit decimation + gain ---
        sensitivity *= dl_gain;
        self.digitizer_stage(&mut out, &mut refstages, stage, digitizer_rate, dl_gain, volt, counts)?;
        stage += 1;

        // --- Digital chain ---
        for (i, dstage) in digital.iter().enumerate() {
            match dstage {
                Digital::Fir(f, eff) => {
                    sensitivity *= f.gain;
                    self.fir_filter_stage(
                        &mut out,
                        &mut refstages,
                        f,
                        eff,
                        stage,
                        input_rates[i],
                        counts,
                    )?;
                }
                Digital::Paz(p) => {
                    sensitivity *= p.gain;
                    self.digital_paz_stage(
                        &mut out,
                        &mut refstages,
                        p,
                        stage,
                        input_rates[i],
                        counts,
                    )?;
                }
            }
            stage += 1;
        }

        // Old style gathers everything into one response reference.
        if self.style == ResponseStyle::Dictionary {
            out.extend_from_slice(&ResponseReference { stages: refstages }.render()?);
        }

        // Stage 0: cumulative sensitivity, in both styles.
        out.extend_from_slice(
            &GainStage {
                stage: 0,
                gain: sensitivity,
                frequency: sensitivity_frequency,
            }
            .render()?,
        );

        Ok(ChannelResponse {
            blockettes: out,
            sensitivity,
            sensitivity_frequency,
            signal_units,
            calibration_units: volt,
        })
    }

    fn paz_stage(
        &mut self,
        out: &mut Vec<u8>,
        refstages: &mut Vec<(u8, Vec<u16>)>,
        p: &ResponsePaz,
        stage: u8,
        gain: f64,
        input_units: u16,
        output_units: u16,
    ) -> Result<()> {
        let (zeros, poles) = parse_paz(p)?;
        match self.style {
            ResponseStyle::Dictionary => {
                let name = dict_name(&p.name, "PAZ", self.next_key);
                let pk = self.dict_key(format!("paz:{}", p.public_id), |key| {
                    PazDict {
                        key,
                        name,
                        response_type: p.ty,
                        input_units,
                        output_units,
                        norm_factor: p.norm_factor,
                        norm_frequency: p.norm_frequency,
                        zeros,
                        poles,
                    }
                    .render()
                })?;
                let gk = self.gain_key(gain, p.gain_frequency)?;
                refstages.push((stage, vec![pk, gk]));
            }
            ResponseStyle::Inline => {
                out.extend_from_slice(
                    &PazStage {
                        transfer_type: p.ty,
                        stage,
                        input_units,
                        output_units,
                        norm_factor: p.norm_factor,
                        norm_frequency: p.norm_frequency,
                        zeros,
                        poles,
                    }
                    .render()?,
                );
                out.extend_from_slice(
                    &GainStage {
                        stage,
                        gain,
                        frequency: p.gain_frequency,
                    }
                    .render()?,
                );
            }
        }
        Ok(())
    }

    fn polynomial_stage(
        &mut self,
        out: &mut Vec<u8>,
        refstages: &mut Vec<(u8, Vec<u16>)>,
        p: &ResponsePolynomial,
        stage: u8,
        gain: f64,
        input_units: u16,
        output_units: u16,
    ) -> Result<()> {
        let coefficients = field::parse_real_list(&p.coefficients)?;
        match self.style {
            ResponseStyle::Dictionary => {
                let name = dict_name(&p.name, "POLY", self.next_key);
                let pk = self.dict_key(format!("poly:{}", p.public_id), |key| {
                    PolynomialDict {
                        key,
                        name,
                        input_units,
                        output_units,
                        approximation_type: p.approximation_type,
                        frequency_unit: p.frequency_unit,
                        lower_frequency: p.lower_frequency,
                        upper_frequency: p.upper_frequency,
                        lower_bound: p.approximation_lower_bound,
                        upper_bound: p.approximation_upper_bound,
                        max_error: p.approximation_error,
                        coefficients,
                    }
                    .render()
                })?;
                let gk = self.gain_key(gain, p.gain_frequency)?;
                refstages.push((stage, vec![pk, gk]));
            }
            ResponseStyle::Inline => {
                out.extend_from_slice(
                    &PolynomialStage {
                        stage,
                        input_units,
                        output_units,
                        approximation_type: p.approximation_type,
                        frequency_unit: p.frequency_unit,
                        lower_frequency: p.lower_frequency,
                        upper_frequency: p.upper_frequency,
                        lower_bound: p.approximation_lower_bound,
                        upper_bound: p.approximation_upper_bound,
                        max_error: p.approximation_error,
                        coefficients,
                    }
                    .render()?,
                );
                out.extend_from_slice(
                    &GainStage {
                        stage,
                        gain,
                        frequency: p.gain_frequency,
                    }
                    .render()?,
                );
            }
        }
        Ok(())
    }

    fn digitizer_stage(
        &mut self,
        out: &mut Vec<u8>,
        refstages: &mut Vec<(u8, Vec<u16>)>,
        stage: u8,
        input_rate: f64,
        gain: f64,
        input_units: u16,
        output_units: u16,
    ) -> Result<()> {
        match self.style {
            ResponseStyle::Dictionary => {
                let name = dict_name("", "DIG", self.next_key);
                let ck = self.dict_key(format!("digicoeff:{input_units}:{output_units}"), |key| {
                    CoefficientsDict {
                        key,
                        name,
                        response_type: 'D',
                        input_units,
                        output_units,
                        numerators: Vec::new(),
                        denominators: Vec::new(),
                    }
                    .render()
                })?;
                let dk = self.decimation_key(input_rate, 1, 0.0, 0.0)?;
                let gk = self.gain_key(gain, 0.0)?;
                refstages.push((stage, vec![ck, dk, gk]));
            }
            ResponseStyle::Inline => {
                out.extend_from_slice(
                    &CoefficientsStage {
                        response_type: 'D',
                        stage,
                        input_units,
                        output_units,
                        numerators: Vec::new(),
                        denominators: Vec::new(),
                    }
                    .render()?,
                );
                out.extend_from_slice(
                    &DecimationStage {
                        stage,
                        input_rate,
                        factor: 1,
                        offset: 0,
                        delay: 0.0,
                        correction: 0.0,
                    }
                    .render()?,
                );
                out.extend_from_slice(
                    &GainStage {
                        stage,
                        gain,
                        frequency: 0.0,
                    }
                    .render()?,
                );
            }
        }
        Ok(())
    }

    fn fir_filter_stage(
        &mut self,
        out: &mut Vec<u8>,
        refstages: &mut Vec<(u8, Vec<u16>)>,
        f: &ResponseFir,
        eff: &EffectiveFir,
        stage: u8,
        input_rate: f64,
        counts: u16,
    ) -> Result<()> {
        // delay/correction are stored in samples of the stage input rate
        let delay = f.delay / input_rate;
        let correction = f.correction / input_rate;
        match self.style {
            ResponseStyle::Dictionary => {
                let name = dict_name(&f.name, "FIR", self.next_key);
                let coefficients = eff.coefficients.clone();
                let symmetry = eff.symmetry;
                let fk = self.dict_key(format!("fir:{}", f.public_id), |key| {
                    FirDict {
                        key,
                        name,
                        symmetry,
                        input_units: counts,
                        output_units: counts,
                        coefficients,
                    }
                    .render()
                })?;
                let dk = self.decimation_key(input_rate, f.decimation_factor, delay, correction)?;
                let gk = self.gain_key(f.gain, 0.0)?;
                refstages.push((stage, vec![fk, dk, gk]));
            }
            ResponseStyle::Inline => {
                out.extend_from_slice(
                    &FirStage {
                        stage,
                        name: dict_name(&f.name, "FIR", stage as u16),
                        symmetry: eff.symmetry,
                        input_units: counts,
                        output_units: counts,
                        coefficients: eff.coefficients.clone(),
                    }
                    .render()?,
                );
                out.extend_from_slice(
                    &DecimationStage {
                        stage,
                        input_rate,
                        factor: f.decimation_factor.max(1),
                        offset: 0,
                        delay,
                        correction,
                    }
                    .render()?,
                );
                out.extend_from_slice(
                    &GainStage {
                        stage,
                        gain: f.gain,
                        frequency: 0.0,
                    }
                    .render()?,
                );
            }
        }
        Ok(())
    }

    fn digital_paz_stage(
        &mut self,
        out: &mut Vec<u8>,
        refstages: &mut Vec<(u8, Vec<u16>)>,
        p: &ResponsePaz,
        stage: u8,
        input_rate: f64,
        counts: u16,
    ) -> Result<()> {
        self.paz_stage(out, refstages, p, stage, p.gain, counts, counts)?;
        match self.style {
            ResponseStyle::Dictionary => {
                let dk = self.decimation_key(input_rate, 1, 0.0, 0.0)?;
                // attach the decimation to the stage entry created above
                refstages
                    .last_mut()
                    .expect("paz_stage pushed a stage")
                    .1
                    .push(dk);
            }
            ResponseStyle::Inline => {
                out.extend_from_slice(
                    &DecimationStage {
                        stage,
                        input_rate,
                        factor: 1,
                        offset: 0,
                        delay: 0.0,
                        correction: 0.0,
                    }
                    .render()?,
                );
            }
        }
        Ok(())
    }

    fn gain_key(&mut self, gain: f64, frequency: f64) -> Result<u16> {
        let name = dict_name("", "GAIN", self.next_key);
        self.dict_key(
            format!("gain:{:016x}:{:016x}", gain.to_bits(), frequency.to_bits()),
            |key| {
                GainDict {
                    key,
                    name,
                    gain,
                    frequency,
                }
                .render()
            },
        )
    }

    fn decimation_key(
        &mut self,
        input_rate: f64,
        factor: u32,
        delay: f64,
        correction: f64,
    ) -> Result<u16> {
        let name = dict_name("", "DEC", self.next_key);
        self.dict_key(
            format!(
                "decim:{:016x}:{factor}:{:016x}:{:016x}",
                input_rate.to_bits(),
                delay.to_bits(),
                correction.to_bits()
            ),
            |key| {
                DecimationDict {
                    key,
                    name,
                    input_rate,
                    factor,
                    offset: 0,
                    delay,
                    correction,
                }
                .render()
            },
        )
    }

    /// Look up a response dictionary entry by content key, creating the
    /// blockette on first use. Keys are 1-based and shared across all
    /// dictionary blockette types so a B60 reference is unambiguous.
    fn dict_key(
        &mut self,
        cache_key: String,
        build: impl FnOnce(u16) -> Result<Vec<u8>>,
    ) -> Result<u16> {
        if let Some(&key) = self.dict_keys.get(&cache_key) {
            return Ok(key);
        }
        let key = self.next_key;
        let bytes = build(key)?;
        self.next_key += 1;
        self.dict_bytes.extend_from_slice(&bytes);
        self.dict_keys.insert(cache_key, key);
        Ok(key)
    }

    /// Load and verify a FIR filter, caching the effective value per public
    /// id. Coefficient files are read on first use only.
    fn effective_fir(&mut self, fir: &ResponseFir, strict: bool) -> Result<EffectiveFir> {
        if let Some(eff) = self.fir_cache.get(&fir.public_id) {
            return Ok(eff.clone());
        }
        let text = match &fir.coefficients {
            FirCoefficients::Inline(s) => s.clone(),
            FirCoefficients::File(path) => std::fs::read_to_string(path)?,
        };
        let parsed = field::parse_real_list(&text)?;
        let (eff, corrections) = effective_fir_value(fir.symmetry, fir.ncoeff as usize, parsed);
        for c in &corrections {
            match c {
                FirCorrection::Count { declared, actual } => {
                    if strict {
                        return Err(SeedError::CountMismatch {
                            id: fir.public_id.clone(),
                            what: "FIR coefficients",
                            declared: *declared,
                            actual: *actual,
                        });
                    }
                    warn!(
                        "FIR {:?}: declared {declared} coefficients, found {actual}; using found",
                        fir.public_id
                    );
                }
                FirCorrection::Symmetry { declared, detected } => {
                    if strict {
                        return Err(SeedError::SymmetryMismatch {
                            id: fir.public_id.clone(),
                            declared: *declared,
                            detected: *detected,
                        });
                    }
                    warn!(
                        "FIR {:?}: declared symmetry {declared}, detected {detected}; folding",
                        fir.public_id
                    );
                }
            }
        }
        self.fir_cache.insert(fir.public_id.clone(), eff.clone());
        Ok(eff)
    }
}

/// Compute the effective symmetry and coefficient list of a FIR filter.
///
/// Pure: deviations from the declared shape come back as a correction list
/// and the caller decides between warning and error.
fn effective_fir_value(
    declared_symmetry: char,
    declared_count: usize,
    coefficients: Vec<f64>,
) -> (EffectiveFir, Vec<FirCorrection>) {
    let mut corrections = Vec::new();
    if declared_count != coefficients.len() {
        corrections.push(FirCorrection::Count {
            declared: declared_count,
            actual: coefficients.len(),
        });
    }

    let mut symmetry = declared_symmetry;
    let mut coefficients = coefficients;
    if symmetry == 'A' && coefficients.len() > 1 && is_palindrome(&coefficients) {
        let n = coefficients.len();
        let detected = if n % 2 == 0 { 'B' } else { 'C' };
        corrections.push(FirCorrection::Symmetry {
            declared: symmetry,
            detected,
        });
        symmetry = detected;
        coefficients.truncate(n.div_ceil(2));
    }

    (
        EffectiveFir {
            symmetry,
            coefficients,
        },
        corrections,
    )
}

fn is_palindrome(v: &[f64]) -> bool {
    v.iter().zip(v.iter().rev()).all(|(a, b)| a == b)
}

/// Parse a PAZ response's textual pole/zero lists and check the declared
/// counts. A mismatch is a format defect and always fatal.
fn parse_paz(p: &ResponsePaz) -> Result<(Vec<(f64, f64)>, Vec<(f64, f64)>)> {
    let zeros = field::parse_complex_list(&p.zeros)?;
    let poles = field::parse_complex_list(&p.poles)?;
    if zeros.len() != p.nzeros as usize {
        return Err(SeedError::CountMismatch {
            id: p.public_id.clone(),
            what: "zeros",
            declared: p.nzeros as usize,
            actual: zeros.len(),
        });
    }
    if poles.len() != p.npoles as usize {
        return Err(SeedError::CountMismatch {
            id: p.public_id.clone(),
            what: "poles",
            declared: p.npoles as usize,
            actual: poles.len(),
        });
    }
    Ok((zeros, poles))
}

/// Most recent calibration gain for the exact `(serial, channel)` pair.
fn calibrated_gain(
    calibrations: &[Calibration],
    serial: Option<&str>,
    channel: Option<u32>,
) -> Option<f64> {
    let serial = serial?;
    let channel = channel?;
    calibrations
        .iter()
        .filter(|c| c.serial_number == serial && c.channel_number == channel)
        .max_by_key(|c| c.start)
        .map(|c| c.gain)
}

fn missing(kind: &'static str, id: &str) -> SeedError {
    SeedError::MissingObject {
        kind,
        id: id.to_owned(),
    }
}

fn dict_name(name: &str, prefix: &str, key: u16) -> String {
    if name.is_empty() {
        format!("{prefix}{key:04}")
    } else {
        let mut n = name.to_owned();
        n.truncate(25);
        n
    }
}

fn unit_description(unit: &str) -> &'static str {
    match unit {
        "M" => "Displacement in Meters",
        "M/S" => "Velocity in Meters Per Second",
        "M/S**2" => "Acceleration in Meters Per Second Squared",
        "V" => "Volts",
        "A" => "Amperes",
        "PA" => "Pressure in Pascals",
        "COUNTS" => "Digital Counts",
        _ => "",
    }
}
