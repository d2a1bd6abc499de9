// merge.rs - Merge configuration file with CLI arguments

use crate::cli::{Args, Config};

impl Args {
    /// Merge with configuration from file
    /// CLI arguments take precedence over config file values
    pub fn merge_with_config(mut self, config: &Config) -> Self {
        // Input/Output
        if self.files.is_empty() {
            if let Some(files) = &config.files {
                self.files = files.clone();
            }
        }
        if self.output.is_none() {
            self.output = config.output.clone();
        }
        if self.json.is_none() {
            self.json = config.json.clone();
        }
        if self.distances.is_none() {
            self.distances = config.distances.clone();
        }

        // Formats and modes (only override defaults, not explicit CLI values)
        if let Some(format) = config.format.as_ref().filter(|_| self.format == "tsv") {
            self.format = format.clone();
        }
        if let Some(format) = config.distance_format.as_ref().filter(|_| self.distance_format == "tsv") {
            self.distance_format = format.clone();
        }
        if let Some(mode) = config.distance_mode.as_ref().filter(|_| self.distance_mode == "alleles") {
            self.distance_mode = mode.clone();
        }
        if let Some(min_loci) = config.min_loci.filter(|_| self.min_loci == 0) {
            self.min_loci = min_loci;
        }

        // Performance
        if self.threads.is_none() {
            self.threads = config.threads;
        }

        // Completeness filters (only override default 0.0)
        if let Some(threshold) = config.sample_threshold.filter(|_| self.sample_threshold == 0.0) {
            self.sample_threshold = threshold;
        }
        if let Some(threshold) = config.locus_threshold.filter(|_| self.locus_threshold == 0.0) {
            self.locus_threshold = threshold;
        }

        // Sample/Loci filtering
        if self.include_samples.is_none() {
            self.include_samples = config.include_samples.clone();
        }
        if self.exclude_samples.is_none() {
            self.exclude_samples = config.exclude_samples.clone();
        }
        if self.include_loci.is_none() {
            self.include_loci = config.include_loci.clone();
        }
        if self.exclude_loci.is_none() {
            self.exclude_loci = config.exclude_loci.clone();
        }

        // Flags can only be switched on by the file
        self.dry_run |= config.dry_run.unwrap_or(false);
        self.no_progress |= config.no_progress.unwrap_or(false);
        self.quiet |= config.quiet.unwrap_or(false);

        self
    }

    /// Load configuration and merge with CLI args; also returns the file
    /// so the caller can pick up its `[analysis]` table
    pub fn with_config_file(self, config_path: &str) -> Result<(Self, Config), String> {
        let config = Config::from_file(config_path)?;
        let merged = self.merge_with_config(&config);
        Ok((merged, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argh::FromArgs;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["genotyper"], args).unwrap()
    }

    #[test]
    fn test_cli_values_win() {
        let args = parse(&["--format", "csv", "--min-loci", "3", "a.fsa"]);
        let config = Config::from_toml(
            "format = \"tsv\"\nmin_loci = 10\noutput = \"g.tsv\"\nfiles = [\"x.fsa\"]\n",
        )
        .unwrap();
        let merged = args.merge_with_config(&config);
        assert_eq!(merged.format, "csv");
        assert_eq!(merged.min_loci, 3);
        assert_eq!(merged.output.as_deref(), Some("g.tsv"));
        assert_eq!(merged.files, vec!["a.fsa"]);
    }

    #[test]
    fn test_config_fills_defaults() {
        let args = parse(&[]);
        let config = Config::from_toml(
            "distance_mode = \"loci\"\nlocus_threshold = 0.5\nfiles = [\"x.fsa\"]\nquiet = true\n",
        )
        .unwrap();
        let merged = args.merge_with_config(&config);
        assert_eq!(merged.distance_mode, "loci");
        assert_eq!(merged.locus_threshold, 0.5);
        assert_eq!(merged.files, vec!["x.fsa"]);
        assert!(merged.quiet);
        assert!(!merged.dry_run);
    }
}
