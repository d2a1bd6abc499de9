// mod.rs - Core analysis module

pub mod alleles;
pub mod batch;
pub mod calibration;
pub mod distance;
pub mod engine;
pub mod params;
pub mod peaks;
pub mod quality;
pub mod signal;
pub mod stats;

// Re-export main types for convenience
pub use alleles::{call_alleles, AlleleCall, Confidence};
pub use batch::{analyze_batch, BatchInput, BatchReport};
pub use calibration::{calibrate, CalibrationModel, CalibrationStatus, FitQuality};
pub use distance::{
    calculate_distance_matrix, calculate_sample_distance, compare_profiles, DistanceMode,
    ProfileComparison,
};
pub use engine::{analyze, AnalysisResult, Analyzer};
pub use params::{AnalysisConfig, CalibrationParams, CallerParams, DetectorParams, QualityParams};
pub use peaks::{detect_peaks, Peak, PeakDetector};
pub use quality::{summarize, ChannelMetrics, QualityMetrics, QualityStatus};
