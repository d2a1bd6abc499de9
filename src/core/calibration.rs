// calibration.rs - Scan position to fragment size mapping from the size standard

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::params::CalibrationParams;
use super::peaks::Peak;
use super::stats::{linear_fit, linspace, mean};
use crate::data::markers::SizeLadder;

/// How much the mapping can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationStatus {
    /// Fitted on at least `min_peaks` ladder peaks
    Calibrated,
    /// No size-standard channel; fixed default mapping
    Estimated,
    /// Size standard present but too few usable peaks
    InsufficientPeaks,
}

/// Fit tier of a calibrated model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitQuality {
    Good,
    Acceptable,
    Poor,
}

/// A ladder peak paired with its expected fragment size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LadderMatch {
    pub position: usize,
    pub size_bp: f64,
}

/// `size_bp = slope * position + intercept`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub max_residual: f64,
    pub status: CalibrationStatus,
    pub quality: FitQuality,
    pub matches: Vec<LadderMatch>,
}

impl CalibrationModel {
    /// Default mapping for runs without a size-standard channel
    pub fn estimated(params: &CalibrationParams) -> Self {
        Self {
            slope: params.default_slope,
            intercept: params.default_intercept,
            r_squared: 0.0,
            max_residual: 0.0,
            status: CalibrationStatus::Estimated,
            quality: FitQuality::Poor,
            matches: Vec::new(),
        }
    }

    /// Assume the trace spans the whole ladder range
    fn from_trace_length(ladder: &SizeLadder, trace_len: usize) -> Self {
        let min = ladder.min_size().unwrap_or(0.0);
        let max = ladder.max_size().unwrap_or(min);
        Self {
            slope: (max - min) / trace_len.max(1) as f64,
            intercept: min,
            r_squared: 0.0,
            max_residual: 0.0,
            status: CalibrationStatus::InsufficientPeaks,
            quality: FitQuality::Poor,
            matches: Vec::new(),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.status == CalibrationStatus::Calibrated
    }

    pub fn size_at(&self, position: usize) -> f64 {
        self.slope * position as f64 + self.intercept
    }

    /// Copies of `peaks` carrying their mapped size
    pub fn annotate(&self, peaks: &[Peak]) -> Vec<Peak> {
        peaks.iter().map(|p| p.with_size(self.size_at(p.position))).collect()
    }

    pub fn annotate_all(&self, peaks: &BTreeMap<u8, Vec<Peak>>) -> BTreeMap<u8, Vec<Peak>> {
        peaks
            .iter()
            .map(|(&ch, list)| (ch, self.annotate(list)))
            .collect()
    }
}

/// Ladder sizes for `count` peaks: in order when most of the ladder is
/// present, otherwise spread evenly over the ladder to keep monotonic order.
fn assign_sizes(ladder: &[f64], count: usize, direct_fraction: f64) -> Vec<f64> {
    if count as f64 >= direct_fraction * ladder.len() as f64 {
        ladder.iter().take(count).copied().collect()
    } else {
        linspace(0.0, (ladder.len() - 1) as f64, count)
            .into_iter()
            .map(|i| ladder[(i.round_ties_even() as usize).min(ladder.len() - 1)])
            .collect()
    }
}

/// Fit the size-standard peaks against the expected ladder.
///
/// `trace_len` is only used for the fallback model when too few peaks
/// survive filtering.
pub fn calibrate(
    size_standard_peaks: &[Peak],
    ladder: &SizeLadder,
    trace_len: usize,
    params: &CalibrationParams,
) -> CalibrationModel {
    let tallest = size_standard_peaks
        .iter()
        .map(|p| p.height)
        .fold(f64::NEG_INFINITY, f64::max);
    let mut usable: Vec<&Peak> = size_standard_peaks
        .iter()
        .filter(|p| p.height > params.relative_height_cutoff * tallest)
        .collect();

    if usable.len() < params.min_peaks || ladder.is_empty() {
        log::debug!(
            "{} usable ladder peaks (need {}), estimating from trace length",
            usable.len(),
            params.min_peaks
        );
        return CalibrationModel::from_trace_length(ladder, trace_len);
    }

    usable.sort_by_key(|p| p.position);
    let sizes = assign_sizes(&ladder.sizes, usable.len(), params.direct_assignment_fraction);
    let matches: Vec<LadderMatch> = usable
        .iter()
        .zip(&sizes)
        .map(|(p, &size_bp)| LadderMatch {
            position: p.position,
            size_bp,
        })
        .collect();

    let xs: Vec<f64> = matches.iter().map(|m| m.position as f64).collect();
    let ys: Vec<f64> = matches.iter().map(|m| m.size_bp).collect();
    let Some(fit) = linear_fit(&xs, &ys) else {
        return CalibrationModel::from_trace_length(ladder, trace_len);
    };

    let residuals: Vec<f64> = xs.iter().zip(&ys).map(|(&x, &y)| y - fit.predict(x)).collect();
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let y_mean = mean(&ys);
    let ss_tot: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
    let r_squared = 1.0 - ss_res / (ss_tot + 1e-6);
    let max_residual = residuals.iter().map(|r| r.abs()).fold(0.0, f64::max);

    let quality = if r_squared > params.good_r_squared && max_residual < params.good_max_residual {
        FitQuality::Good
    } else {
        FitQuality::Acceptable
    };

    log::debug!(
        "calibrated on {} ladder peaks: slope={:.5} intercept={:.2} R2={:.4} max residual={:.2}",
        matches.len(),
        fit.slope,
        fit.intercept,
        r_squared,
        max_residual
    );

    CalibrationModel {
        slope: fit.slope,
        intercept: fit.intercept,
        r_squared,
        max_residual,
        status: CalibrationStatus::Calibrated,
        quality,
        matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::DetectorParams;
    use crate::core::peaks::detect_peaks;
    use crate::test_utils::ladder_trace;

    fn peak_at(position: usize, height: f64) -> Peak {
        Peak {
            position,
            height,
            prominence: height,
            width: 5.0,
            area: height * 5.0,
            snr: 50.0,
            quality_score: 50.0,
            size_bp: None,
        }
    }

    fn ladder_peaks(slope: f64, intercept: f64) -> Vec<Peak> {
        SizeLadder::liz500()
            .sizes
            .iter()
            .map(|s| peak_at(((s - intercept) / slope).round() as usize, 800.0))
            .collect()
    }

    #[test]
    fn test_round_trip_recovers_mapping() {
        let ladder = SizeLadder::liz500();
        let samples = ladder_trace(5200, &ladder.sizes, 0.1, 10.0, 5);
        let data: Vec<f64> = samples.iter().map(|&v| v as f64).collect();
        let peaks = detect_peaks(&data, true, &DetectorParams::default());
        assert_eq!(peaks.len(), 16);

        let model = calibrate(&peaks, &ladder, data.len(), &CalibrationParams::default());
        assert_eq!(model.status, CalibrationStatus::Calibrated);
        assert!((model.slope - 0.1).abs() / 0.1 < 0.01);
        assert!((model.intercept - 10.0).abs() < 1.0);
        assert!(model.r_squared > 0.98);
        assert_eq!(model.quality, FitQuality::Good);
    }

    #[test]
    fn test_calibrate_is_idempotent() {
        let mut peaks = ladder_peaks(0.09, 12.0);
        peaks[3].position += 7;
        peaks[11].position -= 4;
        let ladder = SizeLadder::liz500();
        let params = CalibrationParams::default();
        let a = calibrate(&peaks, &ladder, 6000, &params);
        let b = calibrate(&peaks, &ladder, 6000, &params);
        assert_eq!(a.slope.to_bits(), b.slope.to_bits());
        assert_eq!(a.intercept.to_bits(), b.intercept.to_bits());
        assert_eq!(a.r_squared.to_bits(), b.r_squared.to_bits());
    }

    #[test]
    fn test_small_peaks_are_ignored() {
        let mut peaks = ladder_peaks(0.1, 10.0);
        peaks.push(peak_at(3, 50.0));
        peaks.push(peak_at(5100, 79.0));
        let model = calibrate(&peaks, &SizeLadder::liz500(), 5200, &CalibrationParams::default());
        assert_eq!(model.matches.len(), 16);
        assert!((model.slope - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_partial_ladder_uses_spread_assignment() {
        let full = ladder_peaks(0.1, 10.0);
        let partial: Vec<Peak> = full.iter().step_by(2).cloned().collect();
        let model = calibrate(&partial, &SizeLadder::liz500(), 5200, &CalibrationParams::default());
        assert_eq!(model.status, CalibrationStatus::Calibrated);
        assert_eq!(model.matches.len(), 8);
        assert!(model
            .matches
            .windows(2)
            .all(|w| w[0].size_bp < w[1].size_bp && w[0].position < w[1].position));
        assert_eq!(model.matches[0].size_bp, 35.0);
        assert_eq!(model.matches[7].size_bp, 500.0);
    }

    #[test]
    fn test_too_few_peaks_falls_back_to_trace_length() {
        let peaks: Vec<Peak> = ladder_peaks(0.1, 10.0).into_iter().take(5).collect();
        let model = calibrate(&peaks, &SizeLadder::liz500(), 5000, &CalibrationParams::default());
        assert_eq!(model.status, CalibrationStatus::InsufficientPeaks);
        assert_eq!(model.r_squared, 0.0);
        assert!((model.slope - 465.0 / 5000.0).abs() < 1e-12);
        assert_eq!(model.intercept, 35.0);
        assert!(!model.is_calibrated());
    }

    #[test]
    fn test_annotate_leaves_input_untouched() {
        let model = CalibrationModel::estimated(&CalibrationParams::default());
        let mut peaks = BTreeMap::new();
        peaks.insert(1u8, vec![peak_at(1000, 500.0)]);
        let annotated = model.annotate_all(&peaks);
        assert_eq!(peaks[&1][0].size_bp, None);
        assert!((annotated[&1][0].size_bp.unwrap() - 95.0).abs() < 1e-9);
        assert_eq!(model.status, CalibrationStatus::Estimated);
    }
}
