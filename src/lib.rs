// lib.rs - genotyper library root

//! # genotyper - fragment analysis of capillary electrophoresis runs
//!
//! Reads Applied Biosystems ABIF files (`.fsa`, `.ab1`), finds peaks in every dye
//! channel, sizes them against the internal size standard and calls STR alleles
//! for a marker kit.
//!
//! ## Features
//!
//! - **Robust decoding**: a damaged tag becomes a warning, only an unreadable file is fatal
//! - **Adaptive peak detection**: noise-relative thresholds with a relaxed second pass
//! - **Size calibration**: least-squares fit against LIZ-500 or any configured ladder
//! - **Allele calling**: known-allele tables or repeat-based nomenclature per locus
//! - **Quality scoring**: per-run score with the issues that lowered it
//! - **Batch mode**: files analysed in parallel, one failure never stops the others
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use genotyper::prelude::*;
//!
//! let bytes = std::fs::read("A01.fsa").map_err(|e| e.to_string())?;
//! let result = analyze(&bytes, "A01.fsa");
//! if result.success {
//!     for (locus, call) in &result.alleles {
//!         println!("{}: {} ({:?})", locus, call.genotype(), call.confidence);
//!     }
//! } else {
//!     eprintln!("{}", result.error.unwrap_or_default());
//! }
//! # Ok::<(), String>(())
//! ```

pub mod abif;
pub mod cli;
pub mod core;
pub mod data;
pub mod error;
pub mod output;

#[cfg(test)]
mod test_utils;

// Convenience prelude for common imports
pub mod prelude {
    pub use crate::abif::{decode, DecodedFile, RunMetadata};
    pub use crate::cli::{validate_args, Args, Config, ValidationResult};
    pub use crate::core::{analyze, analyze_batch, AnalysisResult, Analyzer, BatchInput, BatchReport};
    pub use crate::core::{calculate_distance_matrix, compare_profiles, DistanceMode};
    pub use crate::core::{AlleleCall, CalibrationModel, CalibrationStatus, Confidence, Peak};
    pub use crate::core::{AnalysisConfig, QualityMetrics, QualityStatus};
    pub use crate::data::{GenotypeMatrix, GenotypeProfile, MarkerTable, SampleStore, SizeLadder};
    pub use crate::error::{AnalysisError, ParseError};
    pub use crate::output::{write_genotypes, write_json, write_matrix};
}

// Re-export main types at the root level for convenience
pub use core::{analyze, AnalysisConfig, AnalysisResult, Analyzer};
pub use data::{MarkerTable, SizeLadder};
pub use error::{AnalysisError, ParseError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn get_info() -> String {
    format!(
        "genotyper v{} - STR fragment analysis for ABIF capillary runs",
        VERSION
    )
}
