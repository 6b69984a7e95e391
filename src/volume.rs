//! The volume build session: channel assembly and the multi-pass output.
//!
//! A [`SeedVolume`] borrows a read-only [`Inventory`], accumulates channels
//! (`add_chan`), waveform records (`add_data`) and station comments, and
//! then writes one SEED 2.3 volume in `output()`. Sections render as pure
//! byte buffers of whole physical records; the driver re-renders only what
//! record counts invalidate: the time-span index once the index section's
//! own size is known, and the volume header once every station and span
//! position is known. It seeks backward over the destination to overwrite
//! both. All record-number fields are fixed width, so a re-render never
//! changes a section's size.

use std::io::{Seek, SeekFrom, Write};

use log::warn;

use crate::blockette::Blockette;
use crate::control::{SpanIndex, StationIndex, VolumeId};
use crate::dictionary::{CommentDict, FormatDict, FormatSpec, GenericDict};
use crate::error::{Result, SeedError};
use crate::inventory::{Inventory, Network, SensorLocation, Station, Stream};
use crate::record::{DataRecord, RECORD_LEN, RECORD_LEN_POWER};
use crate::response::Resolver;
use crate::span::{MergedData, Merger, TimeSeries, TimeSpan};
use crate::station::{ChannelId, StationComment, StationId};
use crate::time::SeedTime;
use crate::types::{ResponseStyle, SectionTag};
use crate::writer::SectionWriter;
use crate::index::{TimeSeriesIndex, TimeSpanId};

/// Record counts per section of a finished volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeStats {
    pub volume_records: u32,
    pub abbreviation_records: u32,
    pub station_records: u32,
    pub index_records: u32,
    pub data_records: u32,
}

impl VolumeStats {
    pub fn total_records(&self) -> u32 {
        self.volume_records
            + self.abbreviation_records
            + self.station_records
            + self.index_records
            + self.data_records
    }
}

/// One station header with its channels, keyed by network and station epoch.
#[derive(Debug)]
struct StationEntry {
    network_code: String,
    network_start: SeedTime,
    station_code: String,
    station_start: SeedTime,
    header: StationId,
    comments: Vec<StationComment>,
    channels: Vec<ChannelEntry>,
}

#[derive(Debug)]
struct ChannelEntry {
    location: String,
    channel: String,
    start: SeedTime,
    end: Option<SeedTime>,
    header: ChannelId,
    response: Vec<u8>,
}

#[derive(Debug)]
struct PendingComment {
    network: String,
    station: String,
    start: SeedTime,
    end: Option<SeedTime>,
    key: u16,
}

/// A single SEED volume build session.
pub struct SeedVolume<'a> {
    inventory: &'a Inventory,
    organization: String,
    label: String,
    volume_time: Option<SeedTime>,
    resolver: Resolver,
    formats: FormatDict,
    generics: GenericDict,
    comments: CommentDict,
    stations: Vec<StationEntry>,
    pending_comments: Vec<PendingComment>,
    merger: Merger,
}

impl<'a> SeedVolume<'a> {
    pub fn new(inventory: &'a Inventory) -> Self {
        Self {
            inventory,
            organization: String::new(),
            label: String::new(),
            volume_time: None,
            resolver: Resolver::new(ResponseStyle::default()),
            formats: FormatDict::default(),
            generics: GenericDict::default(),
            comments: CommentDict::default(),
            stations: Vec::new(),
            pending_comments: Vec::new(),
            merger: Merger::new(),
        }
    }

    /// Originating organization written into B10.
    pub fn with_organization(mut self, organization: &str) -> Self {
        self.organization = organization.to_owned();
        self
    }

    /// Volume label written into B10.
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }

    /// Volume creation time written into B10. Left null when not set, which
    /// keeps rebuilds byte-identical.
    pub fn with_volume_time(mut self, time: SeedTime) -> Self {
        self.volume_time = Some(time);
        self
    }

    /// Response output flavor; dictionary style is the default.
    pub fn with_response_style(mut self, style: ResponseStyle) -> Self {
        self.resolver = Resolver::new(style);
        self
    }

    /// Add every inventory channel matching the codes and overlapping the
    /// `[start, end]` interval.
    ///
    /// In relaxed mode an unmatched lookup or a per-channel resolution gap
    /// is logged and skipped; in strict mode both abort.
    pub fn add_chan(
        &mut self,
        net: &str,
        sta: &str,
        loc: &str,
        cha: &str,
        start: SeedTime,
        end: Option<SeedTime>,
        strict: bool,
    ) -> Result<()> {
        let inv = self.inventory;
        let mut matched = false;
        for network in epochs(&inv.networks, net) {
            if !overlaps(network.start, network.end, start, end) {
                continue;
            }
            for station in epochs(&network.stations, sta) {
                if !overlaps(station.start, station.end, start, end) {
                    continue;
                }
                for location in epochs(&station.locations, loc) {
                    for stream in epochs(&location.streams, cha) {
                        if !overlaps(stream.start, stream.end, start, end) {
                            continue;
                        }
                        matched = true;
                        match self.add_stream(network, station, location, stream, strict) {
                            Ok(()) => {}
                            Err(e) if !strict && e.is_resolution() => {
                                warn!("skipping channel {net}_{sta}_{loc}_{cha}: {e}");
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
        }
        if !matched {
            let err = SeedError::UnmatchedChannel {
                net: net.to_owned(),
                sta: sta.to_owned(),
                loc: loc.to_owned(),
                cha: cha.to_owned(),
                time: start.to_string(),
            };
            if strict {
                return Err(err);
            }
            warn!("{err}");
        }
        Ok(())
    }

    /// Feed one waveform record. Records must arrive in file order; merging
    /// and span grouping happen immediately.
    pub fn add_data(&mut self, record: DataRecord) {
        self.merger.add(record);
    }

    /// Feed a finite record source, consumed once.
    pub fn add_data_iter<I: IntoIterator<Item = DataRecord>>(&mut self, records: I) {
        for r in records {
            self.add_data(r);
        }
    }

    /// Attach a comment to every matching station epoch. The comment text is
    /// deduplicated through the B31 dictionary.
    pub fn add_station_comment(
        &mut self,
        net: &str,
        sta: &str,
        start: SeedTime,
        end: Option<SeedTime>,
        text: &str,
    ) -> Result<()> {
        let key = self.comments.lookup('S', text);
        self.pending_comments.push(PendingComment {
            network: net.to_owned(),
            station: sta.to_owned(),
            start,
            end,
            key,
        });
        Ok(())
    }

    fn add_stream(
        &mut self,
        network: &Network,
        station: &Station,
        location: &SensorLocation,
        stream: &Stream,
        strict: bool,
    ) -> Result<()> {
        let response = self.resolver.resolve(self.inventory, stream, strict)?;

        let instrument = stream
            .sensor
            .as_deref()
            .and_then(|id| self.inventory.sensor(id).ok())
            .map(|s| {
                if s.description.is_empty() {
                    s.name.clone()
                } else {
                    s.description.clone()
                }
            })
            .unwrap_or_default();
        let instrument_key = self.generics.lookup(&instrument);
        let format_key = self.formats.lookup(FormatSpec::for_encoding(stream.format));
        let max_clock_drift = stream
            .datalogger
            .as_deref()
            .and_then(|id| self.inventory.datalogger(id).ok())
            .and_then(|d| d.max_clock_drift)
            .unwrap_or(0.0);

        let header = ChannelId {
            location: location.code.clone(),
            channel: stream.code.clone(),
            instrument_key,
            signal_units: response.signal_units,
            calibration_units: response.calibration_units,
            latitude: location.latitude,
            longitude: location.longitude,
            elevation: location.elevation,
            local_depth: stream.depth,
            azimuth: stream.azimuth,
            dip: stream.dip,
            format_key,
            record_length_power: RECORD_LEN_POWER,
            sample_rate: stream.sample_rate(),
            max_clock_drift,
            flags: stream.flags.clone(),
            start: Some(stream.start),
            end: stream.end,
        };

        let entry = self.station_entry(network, station);
        entry.channels.push(ChannelEntry {
            location: location.code.clone(),
            channel: stream.code.clone(),
            start: stream.start,
            end: stream.end,
            header,
            response: response.blockettes,
        });
        Ok(())
    }

    fn station_entry(&mut self, network: &Network, station: &Station) -> &mut StationEntry {
        let pos = self.stations.iter().position(|s| {
            s.network_code == network.code
                && s.network_start == network.start
                && s.station_code == station.code
                && s.station_start == station.start
        });
        let network_description = if network.description.is_empty() {
            network.code.clone()
        } else {
            network.description.clone()
        };
        match pos {
            Some(i) => &mut self.stations[i],
            None => {
                let network_key = self.generics.lookup(&network_description);
                self.stations.push(StationEntry {
                    network_code: network.code.clone(),
                    network_start: network.start,
                    station_code: station.code.clone(),
                    station_start: station.start,
                    header: StationId {
                        code: station.code.clone(),
                        latitude: station.latitude,
                        longitude: station.longitude,
                        elevation: station.elevation,
                        num_channels: 0,
                        num_comments: 0,
                        site_name: if station.description.is_empty() {
                            station.code.clone()
                        } else {
                            station.description.clone()
                        },
                        network_key,
                        start: Some(station.start),
                        end: station.end,
                        network_code: network.code.clone(),
                    },
                    comments: Vec::new(),
                    channels: Vec::new(),
                });
                self.stations.last_mut().unwrap()
            }
        }
    }

    /// Write the volume. Consumes the session: dictionaries and blockette
    /// state do not outlive one output.
    pub fn output<W: Write + Seek>(mut self, mut dest: W, strict: bool) -> Result<VolumeStats> {
        // attach pending station comments to their station epochs
        let pending = std::mem::take(&mut self.pending_comments);
        for c in pending {
            let mut hit = false;
            for entry in self.stations.iter_mut().filter(|s| {
                s.network_code == c.network && s.station_code == c.station
            }) {
                hit = true;
                entry.comments.push(StationComment {
                    start: Some(c.start),
                    end: c.end,
                    comment_key: c.key,
                });
            }
            if !hit {
                warn!("station comment for {}_{} matches no station", c.network, c.station);
            }
        }

        let merged = std::mem::take(&mut self.merger).finish();
        let (records, spans) = self.filter_unmatched(merged, strict)?;
        let (vol_start, vol_end) = self.volume_span(&spans);

        // --- Pass 1: volume (placeholder numbers) + abbreviation + station ---
        let b11_placeholder: Vec<(String, u32)> = self
            .stations
            .iter()
            .filter(|s| !s.channels.is_empty())
            .map(|s| (s.station_code.clone(), 0))
            .collect();
        let b12_placeholder: Option<Vec<(Option<SeedTime>, Option<SeedTime>, u32)>> =
            if records.is_empty() {
                None
            } else {
                Some(
                    spans
                        .iter()
                        .map(|s| (Some(s.start), Some(s.end), 0))
                        .collect(),
                )
            };

        let (vol_bytes, volume_records) =
            self.render_volume(&b11_placeholder, b12_placeholder.as_deref(), vol_start, vol_end)?;
        let (abbrev_bytes, abbreviation_records) = self.render_abbreviations(volume_records + 1)?;
        let (station_bytes, b11_final, station_records) = self.render_stations(
            volume_records + abbreviation_records + 1,
            vol_start,
            vol_end,
        )?;

        dest.write_all(&vol_bytes)?;
        dest.write_all(&abbrev_bytes)?;
        dest.write_all(&station_bytes)?;

        let metadata_records = volume_records + abbreviation_records + station_records;
        let mut stats = VolumeStats {
            volume_records,
            abbreviation_records,
            station_records,
            ..VolumeStats::default()
        };

        let b12_final = if records.is_empty() {
            None
        } else {
            // --- Pass 2: provisional index to learn its own record count ---
            let first_index = metadata_records + 1;
            let (index_prov, _, index_records) = render_index(&spans, first_index, 0)?;
            dest.write_all(&index_prov)?;

            // --- Pass 3: final index with the data-start offset ---
            let data_start = first_index + index_records;
            let (index_final, b12_entries, index_records_again) =
                render_index(&spans, first_index, data_start)?;
            debug_assert_eq!(index_records, index_records_again);
            dest.seek(SeekFrom::Start(
                (first_index as u64 - 1) * RECORD_LEN as u64,
            ))?;
            dest.write_all(&index_final)?;

            // --- Pass 4: data records ---
            for (i, record) in records.iter().enumerate() {
                dest.write_all(&record.render(data_start + i as u32)?)?;
            }
            stats.index_records = index_records;
            stats.data_records = records.len() as u32;
            Some(b12_entries)
        };

        // --- Pass 5: rewrite the volume header with final positions ---
        let (vol_final, volume_records_again) =
            self.render_volume(&b11_final, b12_final.as_deref(), vol_start, vol_end)?;
        debug_assert_eq!(volume_records, volume_records_again);
        dest.seek(SeekFrom::Start(0))?;
        dest.write_all(&vol_final)?;
        dest.seek(SeekFrom::End(0))?;

        Ok(stats)
    }

    /// Drop time series whose stream identity and start time match no added
    /// channel epoch, remapping record ordinals.
    fn filter_unmatched(
        &self,
        merged: MergedData,
        strict: bool,
    ) -> Result<(Vec<DataRecord>, Vec<TimeSpan>)> {
        if merged.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let mut keep = vec![false; merged.records.len()];
        let mut spans_out = Vec::new();
        for span in merged.spans {
            let mut series_out = Vec::new();
            for series in span.series {
                if self.channel_covers(&series) {
                    for slot in &mut keep[series.first_record..=series.last_record] {
                        *slot = true;
                    }
                    series_out.push(series);
                } else {
                    let err = SeedError::UnmatchedChannel {
                        net: series.network.clone(),
                        sta: series.station.clone(),
                        loc: series.location.clone(),
                        cha: series.channel.clone(),
                        time: series.start.to_string(),
                    };
                    if strict {
                        return Err(err);
                    }
                    warn!("dropping data: {err}");
                }
            }
            if !series_out.is_empty() {
                spans_out.push(TimeSpan {
                    start: span.start,
                    end: span.end,
                    series: series_out,
                });
            }
        }

        let mut remap = vec![0usize; keep.len()];
        let mut next = 0;
        for (i, kept) in keep.iter().enumerate() {
            if *kept {
                remap[i] = next;
                next += 1;
            }
        }
        let records: Vec<DataRecord> = merged
            .records
            .into_iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(r, _)| r)
            .collect();
        for span in &mut spans_out {
            for series in &mut span.series {
                series.first_record = remap[series.first_record];
                series.last_record = remap[series.last_record];
            }
        }
        Ok((records, spans_out))
    }

    fn channel_covers(&self, series: &TimeSeries) -> bool {
        self.stations.iter().any(|st| {
            st.network_code == series.network
                && st.station_code == series.station
                && st.channels.iter().any(|ch| {
                    ch.location == series.location
                        && ch.channel == series.channel
                        && ch.start <= series.start
                        && ch.end.map_or(true, |end| series.start <= end)
                })
        })
    }

    /// Volume span: the data span when waveforms are present, otherwise the
    /// union of channel epochs.
    fn volume_span(&self, spans: &[TimeSpan]) -> (Option<SeedTime>, Option<SeedTime>) {
        if !spans.is_empty() {
            let start = spans.iter().map(|s| s.start).min();
            let end = spans.iter().map(|s| s.end).max();
            return (start, end);
        }
        let mut start: Option<SeedTime> = None;
        let mut end: Option<SeedTime> = None;
        let mut open = false;
        for st in &self.stations {
            for ch in &st.channels {
                start = Some(match start {
                    Some(s) => s.min(ch.start),
                    None => ch.start,
                });
                match ch.end {
                    Some(e) => end = Some(end.map_or(e, |cur: SeedTime| cur.max(e))),
                    None => open = true,
                }
            }
        }
        (start, if open { None } else { end })
    }

    fn render_volume(
        &self,
        b11: &[(String, u32)],
        b12: Option<&[(Option<SeedTime>, Option<SeedTime>, u32)]>,
        vol_start: Option<SeedTime>,
        vol_end: Option<SeedTime>,
    ) -> Result<(Vec<u8>, u32)> {
        let mut w = SectionWriter::new(SectionTag::Volume, 1);
        let b10 = VolumeId {
            record_length_power: RECORD_LEN_POWER,
            start: vol_start,
            end: vol_end,
            volume_time: self.volume_time,
            organization: self.organization.clone(),
            label: self.label.clone(),
        };
        w.append(&b10.render()?);
        w.append(
            &StationIndex {
                entries: b11.to_vec(),
            }
            .render()?,
        );
        if let Some(entries) = b12 {
            w.append(
                &SpanIndex {
                    entries: entries.to_vec(),
                }
                .render()?,
            );
        }
        let (bytes, next) = w.finish();
        Ok((bytes, next - 1))
    }

    fn render_abbreviations(&self, first_record: u32) -> Result<(Vec<u8>, u32)> {
        let mut w = SectionWriter::new(SectionTag::Abbreviation, first_record);
        w.append_all(&self.formats.render_all()?)?;
        w.append_all(&self.comments.render_all()?)?;
        w.append_all(&self.generics.render_all()?)?;
        w.append_all(&self.resolver.units.render_all()?)?;
        w.append_all(self.resolver.dictionary_bytes())?;
        let (bytes, next) = w.finish();
        Ok((bytes, next - first_record))
    }

    fn render_stations(
        &self,
        first_record: u32,
        vol_start: Option<SeedTime>,
        vol_end: Option<SeedTime>,
    ) -> Result<(Vec<u8>, Vec<(String, u32)>, u32)> {
        let mut w = SectionWriter::new(SectionTag::Station, first_record);
        let mut b11 = Vec::new();
        for entry in self.stations.iter().filter(|s| !s.channels.is_empty()) {
            let mut header = entry.header.clone();
            header.num_channels = entry.channels.len() as u16;
            header.num_comments = entry.comments.len() as u16;
            let recno = w.append(&header.render()?);
            b11.push((entry.station_code.clone(), recno));
            for comment in &entry.comments {
                w.append(&comment.render()?);
            }
            for channel in &entry.channels {
                let mut b52 = channel.header.clone();
                // vol-span clamp, applied only here at emission time
                if let Some(vs) = vol_start {
                    b52.start = Some(b52.start.map_or(vs, |s| s.max(vs)));
                }
                b52.end = match (b52.end, vol_end) {
                    (Some(e), Some(v)) => Some(e.min(v)),
                    (None, v) => v,
                    (e, None) => e,
                };
                w.append(&b52.render()?);
                w.append_all(&channel.response)?;
            }
        }
        let (bytes, next) = w.finish();
        Ok((bytes, b11, next - first_record))
    }
}

/// Render the time-span index section. `data_start` of 0 produces the
/// provisional pass; any other value the final one. Returns the packed
/// bytes, the B12 entries (span extent + B70 record number) and the record
/// count.
fn render_index(
    spans: &[TimeSpan],
    first_record: u32,
    data_start: u32,
) -> Result<(Vec<u8>, Vec<(Option<SeedTime>, Option<SeedTime>, u32)>, u32)> {
    let mut w = SectionWriter::new(SectionTag::TimeIndex, first_record);
    let mut b12 = Vec::new();
    for span in spans {
        let recno = w.append(
            &TimeSpanId {
                start: Some(span.start),
                end: Some(span.end),
            }
            .render()?,
        );
        b12.push((Some(span.start), Some(span.end), recno));
        for series in &span.series {
            w.append(
                &TimeSeriesIndex {
                    station: series.station.clone(),
                    location: series.location.clone(),
                    channel: series.channel.clone(),
                    series_start: Some(series.start),
                    first_record: data_start + series.first_record as u32,
                    series_end: Some(series.end),
                    last_record: data_start + series.last_record as u32,
                }
                .render()?,
            );
        }
    }
    let (bytes, next) = w.finish();
    Ok((bytes, b12, next - first_record))
}

fn epochs<'m, T>(
    map: &'m crate::inventory::EpochMap<T>,
    code: &str,
) -> impl Iterator<Item = &'m T> {
    map.get(code).into_iter().flat_map(|m| m.values())
}

/// Interval overlap with open (`None`) right ends.
fn overlaps(
    a_start: SeedTime,
    a_end: Option<SeedTime>,
    b_start: SeedTime,
    b_end: Option<SeedTime>,
) -> bool {
    b_end.map_or(true, |be| a_start <= be) && a_end.map_or(true, |ae| b_start <= ae)
}
