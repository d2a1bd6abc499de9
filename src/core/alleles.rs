// alleles.rs - STR genotype calls from calibrated peaks

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::calibration::CalibrationModel;
use super::params::CallerParams;
use super::peaks::Peak;
use crate::data::markers::{MarkerDefinition, MarkerTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Genotype at one locus; `allele1` comes from the taller peak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlleleCall {
    pub locus: String,
    pub channel: u8,
    pub allele1: String,
    pub allele2: String,
    pub heterozygous: bool,
    pub confidence: Confidence,
    /// Supporting peaks, tallest first
    pub peaks: Vec<Peak>,
}

impl AlleleCall {
    pub fn alleles(&self) -> (&str, &str) {
        (&self.allele1, &self.allele2)
    }

    /// `a1/a2` notation, e.g. `13/14`
    pub fn genotype(&self) -> String {
        format!("{}/{}", self.allele1, self.allele2)
    }
}

/// Allele label and its numeric value
#[derive(Debug, Clone, PartialEq)]
pub struct Designation {
    pub label: String,
    pub value: f64,
}

impl Designation {
    fn integer(allele: u32) -> Self {
        Self {
            label: allele.to_string(),
            value: allele as f64,
        }
    }

    fn continuous(value: f64) -> Self {
        let mut label = format!("{:.1}", value);
        if label == "-0.0" {
            label = "0.0".to_string();
        }
        let value = label.parse().unwrap_or(value);
        Self { label, value }
    }
}

/// Allele designation for a fragment of `size_bp` at `marker`
pub fn designate(size_bp: f64, marker: &MarkerDefinition, params: &CallerParams) -> Designation {
    let Some(nearest) = marker
        .known_alleles
        .iter()
        .min_by(|a, b| (a.size_bp - size_bp).abs().total_cmp(&(b.size_bp - size_bp).abs()))
    else {
        return Designation::continuous(
            (size_bp - params.generic_anchor_size) / marker.repeat_length
                + params.generic_anchor_allele,
        );
    };

    if (nearest.size_bp - size_bp).abs() < params.known_allele_window {
        return Designation::integer(nearest.allele);
    }
    let reference = marker
        .known_alleles
        .iter()
        .min_by_key(|k| k.allele)
        .unwrap_or(nearest);
    Designation::continuous(
        reference.allele as f64 + (size_bp - reference.size_bp) / marker.repeat_length,
    )
}

/// Fragment size of a peak, from its annotation or the model
fn peak_size(peak: &Peak, calibration: &CalibrationModel) -> f64 {
    peak.size_bp
        .unwrap_or_else(|| calibration.size_at(peak.position))
}

/// Call one locus; `None` when no peak falls in its window
pub fn call_locus(
    marker: &MarkerDefinition,
    channel_peaks: &[Peak],
    calibration: &CalibrationModel,
    params: &CallerParams,
) -> Option<AlleleCall> {
    let mut candidates: Vec<(&Peak, f64)> = channel_peaks
        .iter()
        .map(|p| (p, peak_size(p, calibration)))
        .filter(|&(_, size)| {
            marker
                .size_range
                .contains_with_tolerance(size, params.size_tolerance)
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.0.height
            .total_cmp(&a.0.height)
            .then(a.0.position.cmp(&b.0.position))
    });

    if candidates.len() > 1 {
        let tallest = candidates[0].0.height;
        candidates.retain(|(p, _)| p.height >= params.significance_fraction * tallest);
    }
    let significant = candidates.len();

    let homozygous = |peak: &Peak, size: f64, confidence: Confidence| {
        let d = designate(size, marker, params);
        AlleleCall {
            locus: marker.locus.clone(),
            channel: marker.channel,
            allele1: d.label.clone(),
            allele2: d.label,
            heterozygous: false,
            confidence,
            peaks: vec![peak.with_size(size)],
        }
    };

    match candidates.as_slice() {
        [] => None,
        [(peak, size)] => {
            let confidence = if peak.quality_score >= params.medium_quality_score {
                Confidence::Medium
            } else {
                Confidence::Low
            };
            Some(homozygous(peak, *size, confidence))
        }
        [(p1, s1), (p2, s2), ..] => {
            let d1 = designate(*s1, marker, params);
            let d2 = designate(*s2, marker, params);
            if (d1.value - d2.value).abs() < params.homozygous_collapse {
                return Some(homozygous(p1, *s1, Confidence::Medium));
            }
            let confidence = if significant == 2 {
                Confidence::High
            } else {
                Confidence::Medium
            };
            Some(AlleleCall {
                locus: marker.locus.clone(),
                channel: marker.channel,
                allele1: d1.label,
                allele2: d2.label,
                heterozygous: true,
                confidence,
                peaks: vec![p1.with_size(*s1), p2.with_size(*s2)],
            })
        }
    }
}

/// Genotype every locus of `markers` that has at least one candidate peak
pub fn call_alleles(
    peaks_by_channel: &BTreeMap<u8, Vec<Peak>>,
    calibration: &CalibrationModel,
    markers: &MarkerTable,
    params: &CallerParams,
) -> BTreeMap<String, AlleleCall> {
    markers
        .iter()
        .filter_map(|marker| {
            let peaks = peaks_by_channel.get(&marker.channel)?;
            call_locus(marker, peaks, calibration, params)
        })
        .map(|call| (call.locus.clone(), call))
        .collect()
}
