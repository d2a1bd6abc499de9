// config.rs - Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::params::AnalysisConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    // Input/Output
    pub files: Option<Vec<String>>,
    pub output: Option<String>,
    pub format: Option<String>,
    pub json: Option<String>,

    // Profile distances
    pub distances: Option<String>,
    pub distance_format: Option<String>,
    pub distance_mode: Option<String>,
    pub min_loci: Option<usize>,

    // Performance
    pub threads: Option<usize>,

    // Completeness filters
    pub sample_threshold: Option<f64>,
    pub locus_threshold: Option<f64>,

    // Sample/Loci filtering
    pub include_samples: Option<String>,
    pub exclude_samples: Option<String>,
    pub include_loci: Option<String>,
    pub exclude_loci: Option<String>,

    // Flags
    pub dry_run: Option<bool>,
    pub no_progress: Option<bool>,
    pub quiet: Option<bool>,

    /// Engine thresholds, ladder and marker table
    pub analysis: Option<AnalysisConfig>,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config = Self::from_toml(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
        if let Some(analysis) = &config.analysis {
            analysis.validate()?;
        }
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        println!("📄 Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Engine configuration, defaults when the file has no `[analysis]` table
    pub fn analysis_config(&self) -> AnalysisConfig {
        self.analysis.clone().unwrap_or_default()
    }

    /// Generate a sample configuration file with comments
    pub fn generate_sample() -> String {
        r#"# genotyper.toml - Configuration file for genotyper
# Command line arguments will override these settings

# =============================================================================
# INPUT/OUTPUT
# =============================================================================

# Input runs (.fsa / .ab1); positional CLI arguments replace this list
# files = ["run01/A01.fsa", "run01/B01.fsa"]

# Genotype table (samples x loci)
output = "genotypes.tsv"

# Genotype table format: tsv, csv
format = "tsv"

# Full per-file results as JSON
# json = "results.json"

# =============================================================================
# PROFILE DISTANCES
# =============================================================================

# Pairwise distance matrix between samples
# distances = "distances.tsv"

# Distance matrix format: tsv, csv, phylip
distance_format = "tsv"

# Distance mode: alleles (differing alleles), loci (differing loci)
distance_mode = "alleles"

# Minimum number of loci typed in both samples
min_loci = 8

# =============================================================================
# PERFORMANCE
# =============================================================================

# Number of threads (omit for auto-detection)
# threads = 8

# =============================================================================
# FILTERS
# =============================================================================

# Minimum fraction of called loci per sample (0.0-1.0)
sample_threshold = 0.0

# Minimum fraction of samples called at a locus (0.0-1.0)
locus_threshold = 0.0

# include_samples = "^Case"
# exclude_samples = "(?i)ladder|blank"
# include_loci = "^D"
# exclude_loci = "^AMEL"

# =============================================================================
# FLAGS
# =============================================================================

dry_run = false
no_progress = false
quiet = false

# =============================================================================
# ANALYSIS ENGINE
# =============================================================================

[analysis.detector]
height_multiplier = 5.0
size_standard_multiplier = 3.0
height_floor = 20.0
min_separation = 10
min_snr = 3.0

[analysis.calibration]
min_peaks = 6
good_r_squared = 0.98
good_max_residual = 5.0
default_slope = 0.075
default_intercept = 20.0

[analysis.caller]
size_tolerance = 10.0
significance_fraction = 0.20
known_allele_window = 3.0

[analysis.quality]
snr_floor = 10.0
saturation_level = 30000.0
min_total_peaks = 10

# Size standard fragments in bp (default: LIZ-500)
[analysis.ladder]
name = "LIZ-500"
sizes = [35, 50, 75, 100, 139, 150, 160, 200, 250, 300, 340, 350, 400, 450, 490, 500]

# Omit [[analysis.markers]] to use the built-in 15-locus forensic panel.
# Listing any marker replaces the whole table.
# [[analysis.markers]]
# locus = "D3S1358"
# channel = 1
# size_range = { min = 100.0, max = 150.0 }
# repeat_length = 4.0
# known_alleles = [{ allele = 12, size_bp = 114.0 }, { allele = 13, size_bp = 118.0 }]
"#
        .to_string()
    }
}
