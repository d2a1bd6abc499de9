// quality.rs - Per-channel metrics and the overall run quality score

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::calibration::{CalibrationModel, CalibrationStatus};
use super::params::QualityParams;
use super::peaks::Peak;
use super::stats::{mean, std_dev};
use crate::data::trace::{DyePurpose, RawTrace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    Good,
    Warning,
    Poor,
}

impl QualityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityStatus::Good => "good",
            QualityStatus::Warning => "warning",
            QualityStatus::Poor => "poor",
        }
    }
}

/// Signal summary of one dye channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub channel: u8,
    pub dye: String,
    pub max_intensity: f64,
    pub mean_intensity: f64,
    pub std_intensity: f64,
    /// Standard deviation of the leading baseline segment
    pub baseline_noise: f64,
    pub snr: f64,
    pub saturated: bool,
    pub peak_count: usize,
    /// Smallest scan distance between adjacent peaks
    pub min_peak_spacing: Option<usize>,
}

impl ChannelMetrics {
    pub fn compute(trace: &RawTrace, peaks: &[Peak], params: &QualityParams) -> Self {
        let data = trace.as_f64();
        let max_intensity = data.iter().copied().fold(0.0, f64::max);
        let baseline_len = (data.len() as f64 * params.baseline_fraction) as usize;
        let baseline_noise = std_dev(&data[..baseline_len.min(data.len())]);

        let mut positions: Vec<usize> = peaks.iter().map(|p| p.position).collect();
        positions.sort_unstable();
        let min_peak_spacing = positions.windows(2).map(|w| w[1] - w[0]).min();

        Self {
            channel: trace.channel,
            dye: trace.dye.clone(),
            max_intensity,
            mean_intensity: mean(&data),
            std_intensity: std_dev(&data),
            baseline_noise,
            snr: max_intensity / (baseline_noise + 1e-6),
            saturated: max_intensity > params.saturation_level,
            peak_count: peaks.len(),
            min_peak_spacing,
        }
    }
}

/// Overall assessment of one analysed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub score: f64,
    pub status: QualityStatus,
    pub issues: Vec<String>,
    /// Peaks on the analyte channels
    pub total_peaks: usize,
    pub channels: BTreeMap<u8, ChannelMetrics>,
}

/// Score a run from 100 down, one penalty per problem found
pub fn summarize(
    traces: &BTreeMap<u8, RawTrace>,
    peaks_by_channel: &BTreeMap<u8, Vec<Peak>>,
    calibration: &CalibrationModel,
    params: &QualityParams,
) -> QualityMetrics {
    let mut score = 100.0;
    let mut issues = Vec::new();

    let channels: BTreeMap<u8, ChannelMetrics> = traces
        .iter()
        .map(|(&ch, trace)| {
            let peaks = peaks_by_channel.get(&ch).map(Vec::as_slice).unwrap_or(&[]);
            (ch, ChannelMetrics::compute(trace, peaks, params))
        })
        .collect();

    let analyte_channels = traces
        .values()
        .filter(|t| !t.is_size_standard() && !t.is_empty())
        .count();
    if analyte_channels < params.expected_analyte_channels {
        score -= params.missing_channels_penalty;
        issues.push(format!(
            "Only {} of {} dye channels contain data",
            analyte_channels, params.expected_analyte_channels
        ));
    }

    match calibration.status {
        CalibrationStatus::Calibrated => {
            if calibration.r_squared < params.min_r_squared {
                score -= params.weak_fit_penalty;
                issues.push(format!(
                    "Weak size calibration fit (R2 = {:.3})",
                    calibration.r_squared
                ));
            }
        }
        status => {
            score -= params.uncalibrated_penalty;
            issues.push(format!("Size calibration not achieved ({:?})", status));
        }
    }

    let is_size_standard = |ch: u8| match traces.get(&ch) {
        Some(trace) => trace.is_size_standard(),
        None => DyePurpose::for_channel(ch) == DyePurpose::SizeStandard,
    };

    // The ladder dye is judged by the calibration, not by these checks
    for (ch, metrics) in channels.iter().filter(|(&ch, _)| !is_size_standard(ch)) {
        if metrics.max_intensity > 0.0 && metrics.snr < params.snr_floor {
            score -= params.low_snr_penalty;
            issues.push(format!(
                "Low signal-to-noise in channel {} ({}): {:.1}",
                ch, metrics.dye, metrics.snr
            ));
        }
        if metrics.saturated {
            score -= params.saturation_penalty;
            issues.push(format!(
                "Saturation in channel {} ({}): max {:.0}",
                ch, metrics.dye, metrics.max_intensity
            ));
        }
    }

    let total_peaks: usize = peaks_by_channel
        .iter()
        .filter(|(&ch, _)| !is_size_standard(ch))
        .map(|(_, peaks)| peaks.len())
        .sum();
    if total_peaks < params.min_total_peaks {
        score -= params.few_peaks_penalty;
        issues.push(format!("Few peaks detected ({})", total_peaks));
    }

    let score: f64 = score.clamp(0.0, 100.0);
    let status = if score >= params.good_score {
        QualityStatus::Good
    } else if score >= params.warning_score {
        QualityStatus::Warning
    } else {
        QualityStatus::Poor
    };

    QualityMetrics {
        score,
        status,
        issues,
        total_peaks,
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::CalibrationParams;
    use crate::data::trace::default_dye_name;

    fn calibrated(r_squared: f64) -> CalibrationModel {
        CalibrationModel {
            r_squared,
            status: CalibrationStatus::Calibrated,
            ..CalibrationModel::estimated(&CalibrationParams::default())
        }
    }

    fn noisy_trace(channel: u8, peak: i32) -> RawTrace {
        let mut samples: Vec<i32> = (0..1000).map(|i| 100 + (i % 7) - 3).collect();
        samples[600] = peak;
        RawTrace::new(channel, default_dye_name(channel), samples)
    }

    fn weak_trace(channel: u8) -> RawTrace {
        let samples = (0..1000)
            .map(|i| match i {
                0..=99 if i % 2 == 0 => 0,
                0..=99 => 40,
                _ => 50,
            })
            .collect();
        RawTrace::new(channel, default_dye_name(channel), samples)
    }

    fn dummy_peaks(n: usize) -> Vec<Peak> {
        (0..n)
            .map(|i| Peak {
                position: i * 50,
                height: 500.0,
                prominence: 400.0,
                width: 5.0,
                area: 2000.0,
                snr: 50.0,
                quality_score: 50.0,
                size_bp: None,
            })
            .collect()
    }

    #[test]
    fn test_clean_run_scores_full() {
        let traces: BTreeMap<u8, RawTrace> =
            (1..=5).map(|ch| (ch, noisy_trace(ch, 5000))).collect();
        let peaks: BTreeMap<u8, Vec<Peak>> = (1..=5).map(|ch| (ch, dummy_peaks(3))).collect();
        let q = summarize(&traces, &peaks, &calibrated(0.999), &QualityParams::default());
        assert_eq!(q.score, 100.0);
        assert_eq!(q.status, QualityStatus::Good);
        assert!(q.issues.is_empty());
        assert_eq!(q.total_peaks, 12);
        assert_eq!(q.channels[&1].min_peak_spacing, Some(50));
    }

    #[test]
    fn test_penalties_accumulate() {
        // two analyte channels, one saturated, one weak; no calibration; few peaks
        let mut traces = BTreeMap::new();
        traces.insert(1, noisy_trace(1, 32_000));
        traces.insert(2, weak_trace(2));
        traces.insert(5, noisy_trace(5, 3000));
        let peaks: BTreeMap<u8, Vec<Peak>> = [(1u8, dummy_peaks(2))].into_iter().collect();
        let model = CalibrationModel::estimated(&CalibrationParams::default());
        let q = summarize(&traces, &peaks, &model, &QualityParams::default());

        // 100 - 20 (channels) - 30 (calibration) - 5 (snr ch2) - 10 (saturation) - 15 (peaks)
        assert_eq!(q.score, 20.0);
        assert_eq!(q.status, QualityStatus::Poor);
        assert_eq!(q.issues.len(), 5);
        assert!(q.channels[&1].saturated);
    }

    #[test]
    fn test_weak_fit_and_clamping() {
        let traces: BTreeMap<u8, RawTrace> =
            (1..=4).map(|ch| (ch, noisy_trace(ch, 5000))).collect();
        let peaks: BTreeMap<u8, Vec<Peak>> = (1..=4).map(|ch| (ch, dummy_peaks(3))).collect();
        let q = summarize(&traces, &peaks, &calibrated(0.95), &QualityParams::default());
        assert_eq!(q.score, 90.0);

        let mut harsh = QualityParams::default();
        harsh.weak_fit_penalty = 500.0;
        let q = summarize(&traces, &peaks, &calibrated(0.95), &harsh);
        assert_eq!(q.score, 0.0);
        assert_eq!(q.status.as_str(), "poor");
    }

    #[test]
    fn test_size_standard_is_not_scored() {
        // saturated ladder with 16 peaks, one analyte peak
        let mut traces: BTreeMap<u8, RawTrace> =
            (1..=4).map(|ch| (ch, noisy_trace(ch, 5000))).collect();
        traces.insert(5, noisy_trace(5, 32_000));
        let mut peaks = BTreeMap::new();
        peaks.insert(1u8, dummy_peaks(1));
        peaks.insert(5u8, dummy_peaks(16));

        let q = summarize(&traces, &peaks, &calibrated(0.999), &QualityParams::default());
        assert!(q.channels[&5].saturated);
        assert_eq!(q.total_peaks, 1);
        // 100 - 15 (peaks); ladder saturation is not penalised
        assert_eq!(q.score, 85.0);
        assert_eq!(q.issues.len(), 1);
        assert!(q.issues[0].starts_with("Few peaks"));
    }
}
