// decoder.rs - Trace and run-metadata extraction from ABIF files

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use super::directory::{be_i16, be_i32, read_directory, read_header, DirEntry, ElementType};
use crate::data::trace::{default_dye_name, RawTrace, MAX_CHANNELS};
use crate::error::ParseError;

/// Container flavour: sizing-only run (FSA) or sequencing run with base calls (AB1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum FileKind {
    #[default]
    Fsa,
    Ab1,
}

/// Run information carried alongside the traces
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct RunMetadata {
    pub sample_name: Option<String>,
    pub run_date: Option<NaiveDate>,
    pub run_time: Option<NaiveTime>,
    pub instrument: Option<String>,
    pub dye_set: Option<String>,
    pub lane: Option<i32>,
    /// Dye label per channel, defaulted when the file names none
    pub dye_names: BTreeMap<u8, String>,
    pub file_kind: FileKind,
    pub abif_version: u16,
    /// Length of the longest raw trace
    pub data_points: usize,
}

/// Everything the analysis needs from one ABIF file
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub version: u16,
    pub entries: Vec<DirEntry>,
    /// Raw traces keyed by channel (DATA1-4, DATA105)
    pub traces: BTreeMap<u8, RawTrace>,
    /// Instrument-processed traces keyed by channel (DATA9-12)
    pub analyzed_traces: BTreeMap<u8, RawTrace>,
    pub metadata: RunMetadata,
    /// Non-fatal problems met while decoding
    pub warnings: Vec<ParseError>,
}

impl DecodedFile {
    pub fn has_traces(&self) -> bool {
        !self.traces.is_empty()
    }
}

enum TraceSlot {
    Raw(u8),
    Analyzed(u8),
}

fn trace_slot(entry: &DirEntry) -> Option<TraceSlot> {
    if entry.name != "DATA" {
        return None;
    }
    match entry.number {
        1..=4 => Some(TraceSlot::Raw(entry.number as u8)),
        105 => Some(TraceSlot::Raw(5)),
        9..=12 => Some(TraceSlot::Analyzed((entry.number - 8) as u8)),
        _ => None,
    }
}

/// Decode an ABIF byte stream.
///
/// Fails only for a bad signature or a directory with no readable record.
/// Malformed tags are skipped and recorded in `warnings`.
pub fn decode(bytes: &[u8]) -> Result<DecodedFile, ParseError> {
    let header = read_header(bytes)?;
    let (entries, truncated) = read_directory(bytes, &header);

    let mut warnings = Vec::new();
    if let Some(err) = truncated {
        if entries.is_empty() {
            return Err(err);
        }
        warnings.push(err);
    }

    let mut raw_samples: BTreeMap<u8, Vec<i32>> = BTreeMap::new();
    let mut analyzed_samples: BTreeMap<u8, Vec<i32>> = BTreeMap::new();
    let mut metadata = RunMetadata {
        abif_version: header.version,
        ..RunMetadata::default()
    };
    let mut file_dyes: BTreeMap<u8, String> = BTreeMap::new();

    for entry in &entries {
        if let Some(slot) = trace_slot(entry) {
            let (channel, target) = match slot {
                TraceSlot::Raw(ch) => (ch, &mut raw_samples),
                TraceSlot::Analyzed(ch) => (ch, &mut analyzed_samples),
            };
            if target.contains_key(&channel) {
                continue;
            }
            match read_samples(entry, bytes) {
                Ok(samples) if samples.is_empty() => {
                    warnings.push(ParseError::EmptyTrace { channel });
                }
                Ok(samples) => {
                    target.insert(channel, samples);
                }
                Err(err) => warnings.push(err),
            }
            continue;
        }

        let outcome = match (entry.name.as_str(), entry.number) {
            ("SMPL", 1) => read_string(entry, bytes).map(|s| metadata.sample_name = s),
            ("MODL", 1) => read_string(entry, bytes).map(|s| metadata.instrument = s),
            ("DySN", 1) => read_string(entry, bytes).map(|s| metadata.dye_set = s),
            ("RUND", 1) => read_date(entry, bytes).map(|d| metadata.run_date = d),
            ("RUNT", 1) => read_time(entry, bytes).map(|t| metadata.run_time = t),
            ("LANE", 1) => read_integer(entry, bytes).map(|l| metadata.lane = l),
            ("DyeN", n) if (1..=MAX_CHANNELS as i32).contains(&n) => {
                read_string(entry, bytes).map(|name| {
                    if let Some(name) = name {
                        file_dyes.insert(n as u8, name);
                    }
                })
            }
            ("PBAS", _) => {
                metadata.file_kind = FileKind::Ab1;
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = outcome {
            warnings.push(err);
        }
    }

    for channel in 1..=MAX_CHANNELS {
        let dye = file_dyes
            .remove(&channel)
            .unwrap_or_else(|| default_dye_name(channel).to_string());
        metadata.dye_names.insert(channel, dye);
    }

    let build = |samples: BTreeMap<u8, Vec<i32>>| -> BTreeMap<u8, RawTrace> {
        samples
            .into_iter()
            .map(|(ch, s)| {
                let dye = metadata
                    .dye_names
                    .get(&ch)
                    .cloned()
                    .unwrap_or_else(|| default_dye_name(ch).to_string());
                (ch, RawTrace::new(ch, dye, s))
            })
            .collect()
    };
    let traces = build(raw_samples);
    let analyzed_traces = build(analyzed_samples);
    metadata.data_points = traces.values().map(RawTrace::len).max().unwrap_or(0);

    for warning in &warnings {
        log::debug!("ABIF decode warning: {}", warning);
    }

    Ok(DecodedFile {
        version: header.version,
        entries,
        traces,
        analyzed_traces,
        metadata,
        warnings,
    })
}

/// Numeric array whose width follows the declared element size
fn read_samples(entry: &DirEntry, bytes: &[u8]) -> Result<Vec<i32>, ParseError> {
    let width = match entry.element_size {
        2 | 4 => entry.element_size as usize,
        _ => {
            return Err(ParseError::UnsupportedElement {
                tag: entry.tag(),
                element_type: entry.element_type,
                element_size: entry.element_size,
            })
        }
    };
    let data = entry.data(bytes)?;
    let count = (entry.num_elements.max(0) as usize).min(data.len() / width);

    let samples = (0..count)
        .filter_map(|i| {
            let offset = i * width;
            if width == 2 {
                be_i16(data, offset).map(i32::from)
            } else {
                be_i32(data, offset)
            }
        })
        .collect();
    Ok(samples)
}

fn clean_text(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string();
    (!text.is_empty()).then_some(text)
}

fn read_string(entry: &DirEntry, bytes: &[u8]) -> Result<Option<String>, ParseError> {
    let data = entry.data(bytes)?;
    let text = match entry.kind() {
        ElementType::PString => match data.split_first() {
            Some((&len, body)) => clean_text(&body[..(len as usize).min(body.len())]),
            None => None,
        },
        ElementType::CString => {
            let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            clean_text(&data[..end])
        }
        ElementType::Char | ElementType::Byte => clean_text(data),
        _ => {
            return Err(ParseError::UnsupportedElement {
                tag: entry.tag(),
                element_type: entry.element_type,
                element_size: entry.element_size,
            })
        }
    };
    Ok(text)
}

fn read_date(entry: &DirEntry, bytes: &[u8]) -> Result<Option<NaiveDate>, ParseError> {
    let data = entry.data(bytes)?;
    if entry.kind() != ElementType::Date || data.len() < 4 {
        return Err(ParseError::UnsupportedElement {
            tag: entry.tag(),
            element_type: entry.element_type,
            element_size: entry.element_size,
        });
    }
    let year = be_i16(data, 0).unwrap_or(0) as i32;
    Ok(NaiveDate::from_ymd_opt(year, data[2] as u32, data[3] as u32))
}

fn read_time(entry: &DirEntry, bytes: &[u8]) -> Result<Option<NaiveTime>, ParseError> {
    let data = entry.data(bytes)?;
    if entry.kind() != ElementType::Time || data.len() < 4 {
        return Err(ParseError::UnsupportedElement {
            tag: entry.tag(),
            element_type: entry.element_type,
            element_size: entry.element_size,
        });
    }
    Ok(NaiveTime::from_hms_milli_opt(
        data[0] as u32,
        data[1] as u32,
        data[2] as u32,
        data[3] as u32 * 10,
    ))
}

fn read_integer(entry: &DirEntry, bytes: &[u8]) -> Result<Option<i32>, ParseError> {
    let data = entry.data(bytes)?;
    let value = match entry.kind() {
        ElementType::Short => be_i16(data, 0).map(i32::from),
        ElementType::Long => be_i32(data, 0),
        ElementType::Word => super::directory::be_u16(data, 0).map(i32::from),
        ElementType::Byte => data.first().map(|&b| b as i32),
        _ => {
            return Err(ParseError::UnsupportedElement {
                tag: entry.tag(),
                element_type: entry.element_type,
                element_size: entry.element_size,
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::AbifBuilder;

    #[test]
    fn test_decode_channels_and_metadata() {
        let bytes = AbifBuilder::new()
            .trace(1, &[10, 20, 30])
            .trace(2, &[-5, 0, 5])
            .trace(105, &[7; 8])
            .trace(9, &[1, 1])
            .pstring("SMPL", 1, "Sample_01")
            .pstring("DySN", 1, "G5")
            .chars("MODL", 1, "3130")
            .date("RUND", 1, 2023, 6, 14)
            .time("RUNT", 1, 9, 30, 15, 50)
            .short("LANE", 1, 7)
            .pstring("DyeN", 1, "6-FAM")
            .build();

        let decoded = decode(&bytes).unwrap();
        assert!(decoded.warnings.is_empty());
        assert_eq!(decoded.traces.keys().copied().collect::<Vec<_>>(), vec![1, 2, 5]);
        assert_eq!(decoded.traces[&2].samples, vec![-5, 0, 5]);
        assert!(decoded.traces[&5].is_size_standard());
        assert_eq!(decoded.traces[&1].dye, "6-FAM");
        assert_eq!(decoded.traces[&2].dye, "VIC");
        assert_eq!(decoded.analyzed_traces.len(), 1);
        assert!(decoded.analyzed_traces.contains_key(&1));

        let meta = &decoded.metadata;
        assert_eq!(meta.sample_name.as_deref(), Some("Sample_01"));
        assert_eq!(meta.dye_set.as_deref(), Some("G5"));
        assert_eq!(meta.instrument.as_deref(), Some("3130"));
        assert_eq!(meta.run_date, NaiveDate::from_ymd_opt(2023, 6, 14));
        assert_eq!(meta.run_time, NaiveTime::from_hms_milli_opt(9, 30, 15, 500));
        assert_eq!(meta.lane, Some(7));
        assert_eq!(meta.file_kind, FileKind::Fsa);
        assert_eq!(meta.data_points, 8);
    }

    #[test]
    fn test_thirty_two_bit_samples() {
        let bytes = AbifBuilder::new()
            .trace_i32(1, &[70_000, -70_000, 3])
            .build();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.traces[&1].samples, vec![70_000, -70_000, 3]);
    }

    #[test]
    fn test_bad_tag_is_skipped_not_fatal() {
        let mut builder = AbifBuilder::new().trace(1, &[1; 50]).trace(2, &[2; 50]);
        builder.corrupt_offset(0, 1_000_000);
        let decoded = decode(&builder.build()).unwrap();

        assert!(!decoded.traces.contains_key(&1));
        assert_eq!(decoded.traces[&2].len(), 50);
        assert!(matches!(
            decoded.warnings[0],
            ParseError::TagOutOfBounds { .. }
        ));
    }

    #[test]
    fn test_empty_trace_is_warning() {
        let bytes = AbifBuilder::new().trace(3, &[]).trace(4, &[1, 2]).build();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.warnings, vec![ParseError::EmptyTrace { channel: 3 }]);
        assert_eq!(decoded.traces.len(), 1);
    }

    #[test]
    fn test_pbas_marks_ab1() {
        let bytes = AbifBuilder::new()
            .trace(1, &[1, 2])
            .chars("PBAS", 1, "ACGT")
            .build();
        assert_eq!(decode(&bytes).unwrap().metadata.file_kind, FileKind::Ab1);
    }

    #[test]
    fn test_garbage_offsets_never_panic() {
        // Every directory field overwritten with a spread of hostile values
        let base = AbifBuilder::new()
            .trace(1, &[5; 100])
            .trace(2, &[5; 100])
            .trace(105, &[5; 100])
            .pstring("SMPL", 1, "x")
            .build();
        let header = read_header(&base).unwrap();
        let dir = header.directory_offset as usize;
        let hostile: [i32; 6] = [-1, 0, 1, i32::MAX, i32::MIN, base.len() as i32];

        for entry in 0..4 {
            for field in [12usize, 16, 20] {
                for value in hostile {
                    let mut bytes = base.clone();
                    let at = dir + entry * 28 + field;
                    bytes[at..at + 4].copy_from_slice(&value.to_be_bytes());
                    if let Ok(decoded) = decode(&bytes) {
                        for trace in decoded.traces.values() {
                            assert!(trace.len() <= bytes.len());
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_unreadable_directory_is_fatal() {
        let mut bytes = AbifBuilder::new().trace(1, &[1, 2, 3]).build();
        // Point the root directory past the end of the file
        let past_end = (bytes.len() as i32 + 100).to_be_bytes();
        bytes[26..30].copy_from_slice(&past_end);
        assert!(matches!(
            decode(&bytes),
            Err(ParseError::TruncatedDirectory { readable: 0, .. })
        ));
    }
}
