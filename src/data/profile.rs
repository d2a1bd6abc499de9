// profile.rs - Genotype profile and matrix data structures

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::alleles::AlleleCall;
use crate::core::engine::AnalysisResult;

/// Unordered pair of allele designations at one locus
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Genotype {
    pub allele1: String,
    pub allele2: String,
}

impl Genotype {
    pub fn new(allele1: impl Into<String>, allele2: impl Into<String>) -> Self {
        Self {
            allele1: allele1.into(),
            allele2: allele2.into(),
        }
    }

    pub fn from_call(call: &AlleleCall) -> Self {
        Self::new(call.allele1.clone(), call.allele2.clone())
    }

    pub fn is_heterozygous(&self) -> bool {
        self.allele1 != self.allele2
    }

    /// Alleles in a canonical order, so 14/13 and 13/14 compare equal
    pub fn sorted(&self) -> (&str, &str) {
        if self.allele1 <= self.allele2 {
            (&self.allele1, &self.allele2)
        } else {
            (&self.allele2, &self.allele1)
        }
    }

    /// Alleles of `self` not matched in `other` (0, 1 or 2)
    pub fn allele_difference(&self, other: &Genotype) -> usize {
        let mut remaining = vec![other.allele1.as_str(), other.allele2.as_str()];
        let mut shared = 0;
        for allele in [self.allele1.as_str(), self.allele2.as_str()] {
            if let Some(idx) = remaining.iter().position(|a| *a == allele) {
                remaining.remove(idx);
                shared += 1;
            }
        }
        2 - shared
    }
}

impl std::fmt::Display for Genotype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.allele1, self.allele2)
    }
}

/// Genetic diversity metrics for the genotype matrix
#[derive(Debug, Clone)]
pub struct DiversityMetrics {
    pub avg_unique_genotypes: f64,
    /// Fraction of typed loci that are heterozygous
    pub heterozygosity: f64,
    pub diversity_category: &'static str,
}

/// One sample's genotypes keyed by locus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenotypeProfile {
    pub sample_id: String,
    pub genotypes: BTreeMap<String, Genotype>,
}

impl GenotypeProfile {
    pub fn new(sample_id: impl Into<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            genotypes: BTreeMap::new(),
        }
    }

    /// Profile of an analysis result as called by the engine
    pub fn from_result(result: &AnalysisResult) -> Self {
        Self {
            sample_id: result.sample_name(),
            genotypes: result
                .alleles
                .iter()
                .map(|(locus, call)| (locus.clone(), Genotype::from_call(call)))
                .collect(),
        }
    }

    pub fn get(&self, locus: &str) -> Option<&Genotype> {
        self.genotypes.get(locus)
    }
}

/// Samples x loci genotype table
#[derive(Debug, Clone, Default)]
pub struct GenotypeMatrix {
    pub samples: Vec<GenotypeProfile>,
    pub loci_names: Vec<String>,
}

impl GenotypeMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a matrix over `loci_names` (typically the marker table order);
    /// loci seen in profiles but not listed are appended sorted.
    pub fn from_profiles(samples: Vec<GenotypeProfile>, loci_names: &[String]) -> Self {
        let mut loci: Vec<String> = loci_names.to_vec();
        let known: HashSet<&String> = loci_names.iter().collect();
        let mut extra: Vec<String> = samples
            .iter()
            .flat_map(|s| s.genotypes.keys())
            .filter(|l| !known.contains(l))
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        extra.sort();
        loci.extend(extra);
        Self {
            samples,
            loci_names: loci,
        }
    }

    pub fn get(&self, sample_id: &str) -> Option<&GenotypeProfile> {
        self.samples.iter().find(|s| s.sample_id == sample_id)
    }

    /// Sample filtering by id regex
    pub fn apply_sample_filtering(
        &mut self,
        sample_include: Option<&Regex>,
        sample_exclude: Option<&Regex>,
    ) -> Result<(), String> {
        let initial_samples = self.samples.len();
        self.samples.retain(|sample| {
            if let Some(regex) = sample_include {
                if !regex.is_match(&sample.sample_id) {
                    return false;
                }
            }
            if let Some(regex) = sample_exclude {
                if regex.is_match(&sample.sample_id) {
                    return false;
                }
            }
            true
        });

        let filtered_samples = self.samples.len();
        if initial_samples != filtered_samples {
            println!(
                "Sample filters: kept {} samples (removed {})",
                filtered_samples,
                initial_samples - filtered_samples
            );
        }
        if filtered_samples == 0 && initial_samples > 0 {
            return Err("No samples remain after filtering".to_string());
        }
        Ok(())
    }

    /// Locus regex filters, then completeness thresholds in [0, 1]
    pub fn apply_quality_filters(
        &mut self,
        sample_threshold: f64,
        locus_threshold: f64,
        loci_include: Option<&Regex>,
        loci_exclude: Option<&Regex>,
    ) -> Result<(), String> {
        let original_samples = self.samples.len();
        let original_loci = self.loci_names.len();

        if let Some(include_regex) = loci_include {
            self.loci_names.retain(|locus| include_regex.is_match(locus));
        }
        if let Some(exclude_regex) = loci_exclude {
            self.loci_names.retain(|locus| !exclude_regex.is_match(locus));
        }
        self.retain_listed_loci();

        if sample_threshold > 0.0 && !self.loci_names.is_empty() {
            let total_loci = self.loci_names.len();
            self.samples.retain(|sample| {
                sample.genotypes.len() as f64 / total_loci as f64 >= sample_threshold
            });
        }

        if locus_threshold > 0.0 && !self.samples.is_empty() {
            let total_samples = self.samples.len();
            let samples = &self.samples;
            self.loci_names.retain(|locus| {
                let typed = samples
                    .iter()
                    .filter(|s| s.genotypes.contains_key(locus))
                    .count();
                typed as f64 / total_samples as f64 >= locus_threshold
            });
            self.retain_listed_loci();
        }

        let final_samples = self.samples.len();
        let final_loci = self.loci_names.len();
        if final_samples != original_samples || final_loci != original_loci {
            println!("Filter summary:");
            println!(
                "  Samples: {} → {} (removed {})",
                original_samples,
                final_samples,
                original_samples - final_samples
            );
            println!(
                "  Loci: {} → {} (removed {})",
                original_loci,
                final_loci,
                original_loci - final_loci
            );
        }

        if final_samples == 0 {
            return Err("No samples remain after filtering".to_string());
        }
        if final_loci == 0 {
            return Err("No loci remain after filtering".to_string());
        }
        Ok(())
    }

    fn retain_listed_loci(&mut self) {
        let keep: HashSet<String> = self.loci_names.iter().cloned().collect();
        self.samples.par_iter_mut().for_each(|sample| {
            sample.genotypes.retain(|locus, _| keep.contains(locus));
        });
    }

    /// Fraction of empty cells
    pub fn missing_fraction(&self) -> f64 {
        let total_cells = self.samples.len() * self.loci_names.len();
        if total_cells == 0 {
            return 0.0;
        }
        let typed: usize = self.samples.iter().map(|s| s.genotypes.len()).sum();
        1.0 - typed as f64 / total_cells as f64
    }

    /// Print matrix statistics
    pub fn print_matrix_statistics(&self, phase: &str) {
        println!("\n📊 === GENOTYPE MATRIX ({}) ===", phase);
        println!(
            "  📏 Dimensions: {} samples × {} loci = {} total cells",
            self.samples.len(),
            self.loci_names.len(),
            self.samples.len() * self.loci_names.len()
        );

        let missing_percent = 100.0 * self.missing_fraction();
        print!("  📊 Untyped loci: {:.2}%", missing_percent);
        if missing_percent <= 5.0 {
            println!("  🟢 EXCELLENT");
        } else if missing_percent <= 15.0 {
            println!("  🟡 GOOD");
        } else if missing_percent <= 30.0 {
            println!("  🟠 FAIR - check low-quality runs");
        } else {
            println!("  🔴 POOR - many loci without a call");
        }

        let diversity = self.calculate_diversity_metrics();
        println!(
            "  🧬 Avg distinct genotypes per locus: {:.1}",
            diversity.avg_unique_genotypes
        );
        println!(
            "  📈 Heterozygosity: {:.3} ({})",
            diversity.heterozygosity, diversity.diversity_category
        );
    }

    pub fn calculate_diversity_metrics(&self) -> DiversityMetrics {
        let unique_counts: Vec<usize> = self
            .loci_names
            .par_iter()
            .map(|locus| {
                self.samples
                    .iter()
                    .filter_map(|s| s.genotypes.get(locus).map(Genotype::sorted))
                    .collect::<HashSet<_>>()
                    .len()
            })
            .collect();
        let avg_unique_genotypes = if unique_counts.is_empty() {
            0.0
        } else {
            unique_counts.iter().sum::<usize>() as f64 / unique_counts.len() as f64
        };

        let (typed, het) = self
            .samples
            .iter()
            .flat_map(|s| s.genotypes.values())
            .fold((0usize, 0usize), |(t, h), g| {
                (t + 1, h + usize::from(g.is_heterozygous()))
            });
        let heterozygosity = if typed == 0 {
            0.0
        } else {
            het as f64 / typed as f64
        };

        let diversity_category = if heterozygosity < 0.3 {
            "Low"
        } else if heterozygosity < 0.6 {
            "Moderate"
        } else {
            "High"
        };

        DiversityMetrics {
            avg_unique_genotypes,
            heterozygosity,
            diversity_category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, calls: &[(&str, &str, &str)]) -> GenotypeProfile {
        GenotypeProfile {
            sample_id: id.to_string(),
            genotypes: calls
                .iter()
                .map(|(l, a, b)| (l.to_string(), Genotype::new(*a, *b)))
                .collect(),
        }
    }

    #[test]
    fn test_allele_difference() {
        let g = Genotype::new("13", "14");
        assert_eq!(g.allele_difference(&Genotype::new("14", "13")), 0);
        assert_eq!(g.allele_difference(&Genotype::new("13", "15")), 1);
        assert_eq!(g.allele_difference(&Genotype::new("9", "9.3")), 2);
        assert_eq!(
            Genotype::new("12", "12").allele_difference(&Genotype::new("12", "13")),
            1
        );
        assert_eq!(g.to_string(), "13/14");
    }

    #[test]
    fn test_matrix_loci_order_and_filters() {
        let loci = vec!["D3S1358".to_string(), "vWA".to_string(), "FGA".to_string()];
        let samples = vec![
            profile("S1", &[("D3S1358", "13", "14"), ("vWA", "16", "16"), ("XTRA", "1", "2")]),
            profile("S2", &[("D3S1358", "15", "15")]),
            profile("Ctrl", &[("D3S1358", "15", "16"), ("vWA", "17", "18")]),
        ];
        let mut matrix = GenotypeMatrix::from_profiles(samples, &loci);
        assert_eq!(matrix.loci_names, vec!["D3S1358", "vWA", "FGA", "XTRA"]);

        let exclude = Regex::new("^Ctrl").unwrap();
        matrix.apply_sample_filtering(None, Some(&exclude)).unwrap();
        assert_eq!(matrix.samples.len(), 2);

        // FGA is typed in no sample, XTRA in half
        matrix.apply_quality_filters(0.0, 0.6, None, None).unwrap();
        assert_eq!(matrix.loci_names, vec!["D3S1358"]);
        assert!(matrix.get("S1").unwrap().get("XTRA").is_none());
    }

    #[test]
    fn test_filters_can_empty_the_matrix() {
        let mut matrix = GenotypeMatrix::from_profiles(
            vec![profile("S1", &[("TH01", "6", "9.3")])],
            &["TH01".to_string()],
        );
        let include = Regex::new("^D").unwrap();
        assert!(matrix
            .apply_quality_filters(0.0, 0.0, Some(&include), None)
            .is_err());
    }

    #[test]
    fn test_diversity_metrics() {
        let matrix = GenotypeMatrix::from_profiles(
            vec![
                profile("A", &[("TH01", "6", "7")]),
                profile("B", &[("TH01", "7", "6")]),
                profile("C", &[("TH01", "8", "8")]),
            ],
            &["TH01".to_string()],
        );
        let d = matrix.calculate_diversity_metrics();
        assert_eq!(d.avg_unique_genotypes, 2.0);
        assert!((d.heterozygosity - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(d.diversity_category, "High");
        assert_eq!(matrix.missing_fraction(), 0.0);
    }
}
