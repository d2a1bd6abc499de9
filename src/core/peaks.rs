// peaks.rs - Adaptive peak detection on a single fluorescence channel

use serde::{Deserialize, Serialize};

use super::params::DetectorParams;
use super::signal::{find_peaks, savgol_filter, FoundPeak, PeakCriteria};
use super::stats::{mad, median, trapezoid, SortedSample};
use crate::data::trace::RawTrace;

/// A detected peak. Created by the detector; size annotation produces a new
/// value rather than editing this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Scan index into the originating trace
    pub position: usize,
    /// Raw intensity at `position`
    pub height: f64,
    pub prominence: f64,
    pub width: f64,
    pub area: f64,
    pub snr: f64,
    /// SNR clamped to 0-100
    pub quality_score: f64,
    /// Fragment length once a calibration model has been applied
    pub size_bp: Option<f64>,
}

impl Peak {
    pub fn with_size(&self, size_bp: f64) -> Peak {
        Peak {
            size_bp: Some(size_bp),
            ..self.clone()
        }
    }
}

/// Whole-trace statistics the thresholds are derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceStatistics {
    pub baseline: f64,
    pub noise: f64,
    pub p10: f64,
    pub p70: f64,
    pub p75: f64,
    pub p90: f64,
}

impl TraceStatistics {
    pub fn compute(data: &[f64], params: &DetectorParams) -> Self {
        let sorted = SortedSample::new(data);
        Self {
            baseline: sorted.median(),
            noise: params.mad_scale * mad(data),
            p10: sorted.percentile(10.0),
            p70: sorted.percentile(params.relaxed_percentile),
            p75: sorted.percentile(params.height_percentile),
            p90: sorted.percentile(90.0),
        }
    }
}

/// Peak detector bound to one parameter set
#[derive(Debug, Clone, Default)]
pub struct PeakDetector {
    pub params: DetectorParams,
}

impl PeakDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    pub fn detect(&self, trace: &RawTrace) -> Vec<Peak> {
        detect_peaks(&trace.as_f64(), trace.is_size_standard(), &self.params)
    }

    fn smoothing_window(&self, len: usize) -> usize {
        let divisor = self.params.smoothing_window_divisor.max(1);
        let mut window = self.params.smoothing_max_window.min(len / divisor);
        if window % 2 == 0 {
            window += 1;
        }
        window
    }

    fn strict_criteria(&self, stats: &TraceStatistics, is_size_standard: bool) -> PeakCriteria {
        let p = &self.params;
        let multiplier = if is_size_standard {
            p.size_standard_multiplier
        } else {
            p.height_multiplier
        };
        PeakCriteria {
            min_height: (stats.baseline + multiplier * stats.noise)
                .max(stats.p75)
                .max(p.height_floor),
            min_distance: p.min_separation,
            min_prominence: (p.prominence_noise_factor * stats.noise)
                .max(p.prominence_spread_fraction * (stats.p90 - stats.p10)),
        }
    }

    fn relaxed_criteria(&self, stats: &TraceStatistics) -> PeakCriteria {
        let p = &self.params;
        PeakCriteria {
            min_height: (stats.baseline + p.relaxed_multiplier * stats.noise)
                .max(stats.p70)
                .max(p.relaxed_floor),
            min_distance: p.relaxed_separation,
            min_prominence: stats.noise,
        }
    }

    fn measure(&self, data: &[f64], found: &FoundPeak, stats: &TraceStatistics) -> Peak {
        let n = data.len();
        let pos = found.position;
        let p = &self.params;

        let area_window = &data[pos.saturating_sub(p.area_half_window)..(pos + p.area_half_window).min(n)];
        let corrected: Vec<f64> = area_window.iter().map(|v| v - stats.baseline).collect();
        let area = trapezoid(&corrected);

        let local = &data[pos.saturating_sub(p.local_baseline_half_window)
            ..(pos + p.local_baseline_half_window).min(n)];
        let height = data[pos];
        let snr = (height - median(local)) / (stats.noise + 1e-6);

        Peak {
            position: pos,
            height,
            prominence: found.prominence,
            width: found.width,
            area,
            snr,
            quality_score: snr.clamp(0.0, 100.0),
            size_bp: None,
        }
    }
}

/// Detect peaks in `data`, sorted by descending height.
pub fn detect_peaks(data: &[f64], is_size_standard: bool, params: &DetectorParams) -> Vec<Peak> {
    if data.is_empty() {
        return Vec::new();
    }
    let detector = PeakDetector::new(params.clone());
    let stats = TraceStatistics::compute(data, params);

    let window = detector.smoothing_window(data.len());
    let smoothed = if window >= params.smoothing_min_window {
        savgol_filter(data, window, params.polynomial_degree)
    } else {
        data.to_vec()
    };

    let strict = detector.strict_criteria(&stats, is_size_standard);
    let mut found = find_peaks(&smoothed, &strict);
    log::debug!(
        "baseline={:.1} noise={:.2} height>={:.1} prominence>={:.1}: {} maxima",
        stats.baseline,
        stats.noise,
        strict.min_height,
        strict.min_prominence,
        found.len()
    );

    if found.len() < params.min_peaks_before_relaxing && !is_size_standard {
        let relaxed = detector.relaxed_criteria(&stats);
        found = find_peaks(&smoothed, &relaxed);
        log::debug!(
            "relaxed to height>={:.1}: {} maxima",
            relaxed.min_height,
            found.len()
        );
    }

    let mut peaks: Vec<Peak> = found
        .iter()
        .map(|f| detector.measure(data, f, &stats))
        .filter(|peak| peak.snr >= params.min_snr && peak.area > 0.0)
        .collect();

    peaks.sort_by(|a, b| {
        b.height
            .total_cmp(&a.height)
            .then(a.position.cmp(&b.position))
    });
    peaks
}
