// args.rs - Command line arguments definition

use argh::FromArgs;

#[derive(FromArgs)]
/// genotyper - STR fragment analysis of ABIF (.fsa/.ab1) capillary runs
pub struct Args {
    /// input .fsa/.ab1 files
    #[argh(positional)]
    pub files: Vec<String>,

    /// output genotype table (samples x loci)
    #[argh(option)]
    pub output: Option<String>,

    /// genotype table format: tsv, csv (default: tsv)
    #[argh(option, default = "String::from(\"tsv\")")]
    pub format: String,

    /// write full analysis results (peaks, calibration, calls, quality) as JSON
    #[argh(option)]
    pub json: Option<String>,

    /// write a pairwise profile distance matrix
    #[argh(option)]
    pub distances: Option<String>,

    /// distance matrix format: tsv, csv, phylip (default: tsv)
    #[argh(option, default = "String::from(\"tsv\")")]
    pub distance_format: String,

    /// distance mode: alleles, loci (default: alleles)
    #[argh(option, default = "String::from(\"alleles\")")]
    pub distance_mode: String,

    /// minimum number of shared loci required for a distance (default: 0)
    #[argh(option, default = "0")]
    pub min_loci: usize,

    /// number of threads (default: auto-detect)
    #[argh(option)]
    pub threads: Option<usize>,

    /// sample completeness filter: minimum fraction of called loci per sample (0.0-1.0, default: 0.0 = no filter)
    #[argh(option, default = "0.0")]
    pub sample_threshold: f64,

    /// locus completeness filter: minimum fraction of samples called at a locus (0.0-1.0, default: 0.0 = no filter)
    #[argh(option, default = "0.0")]
    pub locus_threshold: f64,

    /// include only samples matching regex pattern
    #[argh(option)]
    pub include_samples: Option<String>,

    /// exclude samples matching regex pattern
    #[argh(option)]
    pub exclude_samples: Option<String>,

    /// include only loci matching regex pattern
    #[argh(option)]
    pub include_loci: Option<String>,

    /// exclude loci matching regex pattern
    #[argh(option)]
    pub exclude_loci: Option<String>,

    /// configuration file (TOML format)
    #[argh(option)]
    pub config: Option<String>,

    /// print a sample configuration file and exit
    #[argh(switch)]
    pub generate_config: bool,

    /// validate inputs and configuration without analysing
    #[argh(switch)]
    pub dry_run: bool,

    /// hide the progress bar
    #[argh(switch)]
    pub no_progress: bool,

    /// only print errors and the final summary
    #[argh(switch)]
    pub quiet: bool,
}
