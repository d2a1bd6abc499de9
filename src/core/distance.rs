// distance.rs - Pairwise genotype profile comparison and distance matrix

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::profile::GenotypeProfile;

/// What a distance counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistanceMode {
    /// Differing alleles summed over shared loci (0-2 per locus)
    #[default]
    Alleles,
    /// Shared loci whose genotypes differ
    Loci,
}

impl std::str::FromStr for DistanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "alleles" | "allele" => Ok(DistanceMode::Alleles),
            "loci" | "locus" => Ok(DistanceMode::Loci),
            other => Err(format!(
                "Invalid distance mode '{}'. Use 'alleles' or 'loci'",
                other
            )),
        }
    }
}

/// Locus-by-locus comparison of two profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileComparison {
    pub sample1: String,
    pub sample2: String,
    /// Loci typed in both samples
    pub shared_loci: usize,
    /// Shared loci with identical genotypes
    pub matching_loci: usize,
    pub allele_differences: usize,
    pub mismatched: Vec<String>,
}

impl ProfileComparison {
    pub fn match_fraction(&self) -> f64 {
        if self.shared_loci == 0 {
            0.0
        } else {
            self.matching_loci as f64 / self.shared_loci as f64
        }
    }

    pub fn is_full_match(&self) -> bool {
        self.shared_loci > 0 && self.matching_loci == self.shared_loci
    }

    pub fn distance(&self, mode: DistanceMode) -> usize {
        match mode {
            DistanceMode::Alleles => self.allele_differences,
            DistanceMode::Loci => self.shared_loci - self.matching_loci,
        }
    }
}

/// Compare two profiles over `loci_names`
pub fn compare_profiles(
    sample1: &GenotypeProfile,
    sample2: &GenotypeProfile,
    loci_names: &[String],
) -> ProfileComparison {
    let mut shared_loci = 0;
    let mut matching_loci = 0;
    let mut allele_differences = 0;
    let mut mismatched = Vec::new();

    for locus in loci_names {
        let (Some(g1), Some(g2)) = (sample1.get(locus), sample2.get(locus)) else {
            continue;
        };
        shared_loci += 1;
        let diff = g1.allele_difference(g2);
        if diff == 0 {
            matching_loci += 1;
        } else {
            allele_differences += diff;
            mismatched.push(locus.clone());
        }
    }

    ProfileComparison {
        sample1: sample1.sample_id.clone(),
        sample2: sample2.sample_id.clone(),
        shared_loci,
        matching_loci,
        allele_differences,
        mismatched,
    }
}

/// Distance between two samples, `None` when they share fewer than `min_loci`
pub fn calculate_sample_distance(
    sample1: &GenotypeProfile,
    sample2: &GenotypeProfile,
    loci_names: &[String],
    mode: DistanceMode,
    min_loci: usize,
) -> Option<usize> {
    let comparison = compare_profiles(sample1, sample2, loci_names);
    if comparison.shared_loci >= min_loci {
        Some(comparison.distance(mode))
    } else {
        None
    }
}

/// Calculate full distance matrix
pub fn calculate_distance_matrix(
    samples: &[GenotypeProfile],
    loci_names: &[String],
    mode: DistanceMode,
    min_loci: usize,
    show_progress: bool,
) -> Vec<Vec<Option<usize>>> {
    let n_samples = samples.len();
    let mut matrix = vec![vec![None; n_samples]; n_samples];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[i] = Some(0);
    }
    if n_samples < 2 {
        return matrix;
    }

    let start = Instant::now();
    let total_comparisons = n_samples * (n_samples - 1) / 2;

    let pb = if show_progress {
        println!(
            "🔄 Computing distance matrix ({} × {} = {} comparisons)...",
            n_samples, n_samples, total_comparisons
        );
        let pb = ProgressBar::new(total_comparisons as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {per_sec} ETA: {eta}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    // Update every 1%
    let update_interval = std::cmp::max(1, total_comparisons / 100);
    let progress_counter = Arc::new(AtomicUsize::new(0));

    let upper_triangle: Vec<_> = (0..n_samples)
        .into_par_iter()
        .flat_map(|i| {
            let progress = progress_counter.clone();
            let pb = pb.clone();
            (i + 1..n_samples).into_par_iter().map(move |j| {
                let distance =
                    calculate_sample_distance(&samples[i], &samples[j], loci_names, mode, min_loci);
                let count = progress.fetch_add(1, Ordering::Relaxed) + 1;
                if count % update_interval == 0 {
                    pb.set_position(count as u64);
                }
                (i, j, distance)
            })
        })
        .collect();

    pb.finish_with_message("✅ Distance matrix computation completed!");

    for (i, j, distance) in upper_triangle {
        matrix[i][j] = distance;
        matrix[j][i] = distance;
    }

    log::info!(
        "Distance matrix ({} samples) computed in {:.2}s",
        n_samples,
        start.elapsed().as_secs_f64()
    );
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::profile::Genotype;

    fn profile(id: &str, calls: &[(&str, &str, &str)]) -> GenotypeProfile {
        let mut p = GenotypeProfile::new(id);
        for (locus, a, b) in calls {
            p.genotypes.insert(locus.to_string(), Genotype::new(*a, *b));
        }
        p
    }

    fn loci() -> Vec<String> {
        ["D3S1358", "vWA", "TH01", "FGA"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compare_profiles() {
        let a = profile("A", &[("D3S1358", "13", "14"), ("vWA", "16", "17"), ("TH01", "6", "9.3")]);
        let b = profile("B", &[("D3S1358", "14", "13"), ("vWA", "16", "18"), ("FGA", "21", "22")]);
        let c = compare_profiles(&a, &b, &loci());

        assert_eq!(c.shared_loci, 2);
        assert_eq!(c.matching_loci, 1);
        assert_eq!(c.allele_differences, 1);
        assert_eq!(c.mismatched, vec!["vWA"]);
        assert_eq!(c.distance(DistanceMode::Loci), 1);
        assert!((c.match_fraction() - 0.5).abs() < 1e-12);
        assert!(!c.is_full_match());
    }

    #[test]
    fn test_min_loci_cut_off() {
        let a = profile("A", &[("D3S1358", "13", "14")]);
        let b = profile("B", &[("D3S1358", "15", "16")]);
        assert_eq!(
            calculate_sample_distance(&a, &b, &loci(), DistanceMode::Alleles, 1),
            Some(2)
        );
        assert_eq!(
            calculate_sample_distance(&a, &b, &loci(), DistanceMode::Alleles, 2),
            None
        );
    }

    #[test]
    fn test_distance_matrix_is_symmetric() {
        let samples = vec![
            profile("A", &[("D3S1358", "13", "14"), ("vWA", "16", "17")]),
            profile("B", &[("D3S1358", "13", "14"), ("vWA", "16", "16")]),
            profile("C", &[("D3S1358", "15", "15"), ("vWA", "18", "19")]),
        ];
        let m = calculate_distance_matrix(&samples, &loci(), DistanceMode::Alleles, 1, false);
        assert_eq!(m[0][0], Some(0));
        assert_eq!(m[0][1], Some(1));
        assert_eq!(m[1][0], Some(1));
        assert_eq!(m[0][2], Some(4));
        assert_eq!(m[2][1], m[1][2]);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("LOCI".parse::<DistanceMode>().unwrap(), DistanceMode::Loci);
        assert!("snps".parse::<DistanceMode>().is_err());
    }
}
