// validation.rs - Input validation utilities

use std::path::Path;
use std::str::FromStr;

use regex::Regex;

use crate::cli::args::Args;
use crate::core::DistanceMode;

const GENOTYPE_FORMATS: [&str; 2] = ["tsv", "csv"];
const DISTANCE_FORMATS: [&str; 3] = ["tsv", "csv", "phylip"];

#[derive(Debug)]
pub struct ValidationResult {
    pub distance_mode: DistanceMode,
    pub sample_include_regex: Option<Regex>,
    pub sample_exclude_regex: Option<Regex>,
    pub loci_include_regex: Option<Regex>,
    pub loci_exclude_regex: Option<Regex>,
}

fn compile(pattern: Option<&String>, what: &str) -> Result<Option<Regex>, String> {
    pattern
        .map(|p| Regex::new(p).map_err(|e| format!("Invalid {} regex: {}", what, e)))
        .transpose()
}

/// Validate all command line arguments
pub fn validate_args(args: &Args) -> Result<ValidationResult, String> {
    if args.files.is_empty() {
        return Err("No input files given (pass .fsa/.ab1 paths or set `files` in the config)".to_string());
    }
    let missing: Vec<&str> = args
        .files
        .iter()
        .filter(|f| !Path::new(f).is_file())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(format!("Input file(s) not found: {}", missing.join(", ")));
    }

    let format = args.format.to_lowercase();
    if !GENOTYPE_FORMATS.contains(&format.as_str()) {
        return Err(format!(
            "Unsupported genotype table format: {}. Use: {}",
            args.format,
            GENOTYPE_FORMATS.join(", ")
        ));
    }
    let distance_format = args.distance_format.to_lowercase();
    if !DISTANCE_FORMATS.contains(&distance_format.as_str()) {
        return Err(format!(
            "Unsupported distance matrix format: {}. Use: {}",
            args.distance_format,
            DISTANCE_FORMATS.join(", ")
        ));
    }

    let distance_mode = DistanceMode::from_str(&args.distance_mode)?;

    if args.threads == Some(0) {
        return Err("--threads must be at least 1".to_string());
    }

    // Validate thresholds
    if !(0.0..=1.0).contains(&args.sample_threshold) {
        return Err("Sample threshold must be between 0.0 and 1.0".to_string());
    }
    if !(0.0..=1.0).contains(&args.locus_threshold) {
        return Err("Locus threshold must be between 0.0 and 1.0".to_string());
    }

    Ok(ValidationResult {
        distance_mode,
        sample_include_regex: compile(args.include_samples.as_ref(), "include_samples")?,
        sample_exclude_regex: compile(args.exclude_samples.as_ref(), "exclude_samples")?,
        loci_include_regex: compile(args.include_loci.as_ref(), "include_loci")?,
        loci_exclude_regex: compile(args.exclude_loci.as_ref(), "exclude_loci")?,
    })
}
