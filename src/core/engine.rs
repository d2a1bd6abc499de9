// engine.rs - Per-file analysis pipeline: decode, detect, calibrate, call, score

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::Serialize;

use super::alleles::{call_alleles, AlleleCall};
use super::calibration::{calibrate, CalibrationModel};
use super::params::AnalysisConfig;
use super::peaks::{Peak, PeakDetector};
use super::quality::{summarize, QualityMetrics};
use crate::abif::{decode, RunMetadata};
use crate::data::trace::RawTrace;
use crate::error::{AnalysisError, Result};

/// Everything produced for one input file. Never modified after creation;
/// manual corrections live in overlays held by the store.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub filename: String,
    pub error: Option<String>,
    pub metadata: RunMetadata,
    pub traces: BTreeMap<u8, RawTrace>,
    pub analyzed_traces: BTreeMap<u8, RawTrace>,
    /// Size-annotated peaks per channel, tallest first
    pub peaks: BTreeMap<u8, Vec<Peak>>,
    pub calibration: Option<CalibrationModel>,
    pub alleles: BTreeMap<String, AlleleCall>,
    pub quality: Option<QualityMetrics>,
    /// Decode problems that were absorbed
    pub warnings: Vec<String>,
    /// CRC32 of the input bytes
    pub checksum: u32,
}

impl AnalysisResult {
    fn failed(filename: &str, error: &AnalysisError, checksum: u32) -> Self {
        Self {
            success: false,
            filename: filename.to_string(),
            error: Some(error.to_string()),
            metadata: RunMetadata::default(),
            traces: BTreeMap::new(),
            analyzed_traces: BTreeMap::new(),
            peaks: BTreeMap::new(),
            calibration: None,
            alleles: BTreeMap::new(),
            quality: None,
            warnings: Vec::new(),
            checksum,
        }
    }

    /// Sample name from the file, or the file stem when absent
    pub fn sample_name(&self) -> String {
        self.metadata.sample_name.clone().unwrap_or_else(|| {
            Path::new(&self.filename)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.filename.clone())
        })
    }

    pub fn total_peaks(&self) -> usize {
        self.peaks.values().map(Vec::len).sum()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Analysis pipeline bound to one configuration
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse one file. Always returns a result; failures (including
    /// panics inside the pipeline) come back with `success == false`.
    pub fn analyze(&self, bytes: &[u8], filename: &str) -> AnalysisResult {
        let checksum = crc32fast::hash(bytes);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(bytes, filename, checksum)));

        let error = match outcome {
            Ok(Ok(result)) => return result,
            Ok(Err(err)) => err,
            Err(payload) => AnalysisError::Unhandled(panic_message(payload.as_ref())),
        };
        log::warn!("{}: analysis failed: {}", filename, error);
        AnalysisResult::failed(filename, &error, checksum)
    }

    fn run(&self, bytes: &[u8], filename: &str, checksum: u32) -> Result<AnalysisResult> {
        let decoded = decode(bytes)?;
        if !decoded.has_traces() {
            return Err(AnalysisError::NoTraceData);
        }
        for warning in &decoded.warnings {
            log::warn!("{}: {}", filename, warning);
        }

        let detector = PeakDetector::new(self.config.detector.clone());
        let raw_peaks: BTreeMap<u8, Vec<Peak>> = decoded
            .traces
            .iter()
            .filter(|(_, trace)| !trace.is_empty())
            .map(|(&ch, trace)| {
                let peaks = detector.detect(trace);
                log::debug!("{}: channel {} ({}): {} peaks", filename, ch, trace.dye, peaks.len());
                (ch, peaks)
            })
            .collect();

        let calibration = match decoded.traces.values().find(|t| t.is_size_standard()) {
            Some(standard) => calibrate(
                raw_peaks.get(&standard.channel).map(Vec::as_slice).unwrap_or(&[]),
                &self.config.ladder,
                standard.len(),
                &self.config.calibration,
            ),
            None => CalibrationModel::estimated(&self.config.calibration),
        };

        let peaks = calibration.annotate_all(&raw_peaks);
        let alleles = call_alleles(&peaks, &calibration, &self.config.markers, &self.config.caller);
        let quality = summarize(&decoded.traces, &peaks, &calibration, &self.config.quality);

        log::info!(
            "{}: {:?} (R2 {:.4}), {} loci called, quality {:.0} ({})",
            filename,
            calibration.status,
            calibration.r_squared,
            alleles.len(),
            quality.score,
            quality.status.as_str()
        );

        Ok(AnalysisResult {
            success: true,
            filename: filename.to_string(),
            error: None,
            metadata: decoded.metadata,
            traces: decoded.traces,
            analyzed_traces: decoded.analyzed_traces,
            peaks,
            calibration: Some(calibration),
            alleles,
            quality: Some(quality),
            warnings: decoded.warnings.iter().map(ToString::to_string).collect(),
            checksum,
        })
    }
}

/// Analyse one file with the default forensic configuration
pub fn analyze(bytes: &[u8], filename: &str) -> AnalysisResult {
    Analyzer::default().analyze(bytes, filename)
}
