// params.rs - Tunable thresholds of every analysis stage

use serde::{Deserialize, Serialize};

use crate::data::markers::{MarkerTable, SizeLadder};

/// Peak detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Noise multiplier above the median for analyte channels
    pub height_multiplier: f64,
    /// Noise multiplier for the size-standard channel
    pub size_standard_multiplier: f64,
    /// Percentile competing with the noise threshold
    pub height_percentile: f64,
    pub height_floor: f64,
    pub relaxed_multiplier: f64,
    pub relaxed_percentile: f64,
    pub relaxed_floor: f64,
    pub min_separation: usize,
    pub relaxed_separation: usize,
    /// Relax once when an analyte channel yields fewer peaks than this
    pub min_peaks_before_relaxing: usize,
    pub prominence_noise_factor: f64,
    pub prominence_spread_fraction: f64,
    pub smoothing_max_window: usize,
    pub smoothing_window_divisor: usize,
    pub smoothing_min_window: usize,
    pub polynomial_degree: usize,
    pub area_half_window: usize,
    pub local_baseline_half_window: usize,
    pub min_snr: f64,
    pub mad_scale: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            height_multiplier: 5.0,
            size_standard_multiplier: 3.0,
            height_percentile: 75.0,
            height_floor: 20.0,
            relaxed_multiplier: 3.0,
            relaxed_percentile: 70.0,
            relaxed_floor: 10.0,
            min_separation: 10,
            relaxed_separation: 8,
            min_peaks_before_relaxing: 5,
            prominence_noise_factor: 2.0,
            prominence_spread_fraction: 0.1,
            smoothing_max_window: 21,
            smoothing_window_divisor: 100,
            smoothing_min_window: 5,
            polynomial_degree: 3,
            area_half_window: 15,
            local_baseline_half_window: 50,
            min_snr: 3.0,
            mad_scale: 1.4826,
        }
    }
}

/// Size-standard calibration thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    pub min_peaks: usize,
    /// Peaks below this fraction of the tallest ladder peak are ignored
    pub relative_height_cutoff: f64,
    /// Assign ladder sizes 1:1 once this fraction of the ladder is seen
    pub direct_assignment_fraction: f64,
    pub good_r_squared: f64,
    pub good_max_residual: f64,
    /// Mapping used when the run has no size-standard channel
    pub default_slope: f64,
    pub default_intercept: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            min_peaks: 6,
            relative_height_cutoff: 0.10,
            direct_assignment_fraction: 0.8,
            good_r_squared: 0.98,
            good_max_residual: 5.0,
            default_slope: 0.075,
            default_intercept: 20.0,
        }
    }
}

/// Allele calling thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallerParams {
    /// Extra bp accepted on both sides of a locus range
    pub size_tolerance: f64,
    /// Candidates below this fraction of the tallest are dropped
    pub significance_fraction: f64,
    pub known_allele_window: f64,
    /// Designations closer than this (repeat units) collapse to one allele
    pub homozygous_collapse: f64,
    pub medium_quality_score: f64,
    pub generic_anchor_size: f64,
    pub generic_anchor_allele: f64,
}

impl Default for CallerParams {
    fn default() -> Self {
        Self {
            size_tolerance: 10.0,
            significance_fraction: 0.20,
            known_allele_window: 3.0,
            homozygous_collapse: 0.5,
            medium_quality_score: 5.0,
            generic_anchor_size: 100.0,
            generic_anchor_allele: 10.0,
        }
    }
}

/// Quality score penalties and cut-offs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityParams {
    pub expected_analyte_channels: usize,
    pub missing_channels_penalty: f64,
    pub uncalibrated_penalty: f64,
    pub weak_fit_penalty: f64,
    pub low_snr_penalty: f64,
    pub saturation_penalty: f64,
    pub few_peaks_penalty: f64,
    /// Calibrated fits below this R2 are penalised
    pub min_r_squared: f64,
    pub snr_floor: f64,
    pub saturation_level: f64,
    pub min_total_peaks: usize,
    pub good_score: f64,
    pub warning_score: f64,
    /// Leading fraction of a trace treated as baseline for SNR
    pub baseline_fraction: f64,
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            expected_analyte_channels: 4,
            missing_channels_penalty: 20.0,
            uncalibrated_penalty: 30.0,
            weak_fit_penalty: 10.0,
            low_snr_penalty: 5.0,
            saturation_penalty: 10.0,
            few_peaks_penalty: 15.0,
            min_r_squared: 0.98,
            snr_floor: 10.0,
            saturation_level: 30_000.0,
            min_total_peaks: 10,
            good_score: 70.0,
            warning_score: 40.0,
            baseline_fraction: 0.1,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    pub detector: DetectorParams,
    pub calibration: CalibrationParams,
    pub caller: CallerParams,
    pub quality: QualityParams,
    pub ladder: SizeLadder,
    pub markers: MarkerTable,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.ladder.validate()?;
        self.markers.validate()?;
        if self.calibration.min_peaks < 2 {
            return Err("Calibration needs at least 2 peaks for a linear fit".to_string());
        }
        if !(0.0..=1.0).contains(&self.caller.significance_fraction) {
            return Err(format!(
                "Significance fraction must be in [0, 1], got {}",
                self.caller.significance_fraction
            ));
        }
        if self.detector.min_separation == 0 || self.detector.relaxed_separation == 0 {
            return Err("Peak separation must be at least 1 sample".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ladder.len(), 16);
        assert_eq!(config.markers.len(), 15);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [detector]
            min_snr = 4.5

            [caller]
            size_tolerance = 6.0
            "#,
        )
        .unwrap();
        assert_eq!(config.detector.min_snr, 4.5);
        assert_eq!(config.detector.min_separation, 10);
        assert_eq!(config.caller.size_tolerance, 6.0);
        assert_eq!(config.markers, MarkerTable::forensic_default());
    }

    #[test]
    fn test_markers_from_toml() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [[markers]]
            locus = "TH01"
            channel = 2
            size_range = { min = 150.0, max = 200.0 }
            known_alleles = [{ allele = 6, size_bp = 160.0 }]
            "#,
        )
        .unwrap();
        assert_eq!(config.markers.len(), 1);
        let th01 = config.markers.get("TH01").unwrap();
        assert_eq!(th01.repeat_length, 4.0);
        assert_eq!(th01.known_alleles[0].allele, 6);
    }

    #[test]
    fn test_validate_rejects_zero_separation() {
        let mut config = AnalysisConfig::default();
        config.detector.min_separation = 0;
        assert!(config.validate().is_err());
    }
}
