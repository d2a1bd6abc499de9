// markers.rs - STR marker definitions and size-standard ladders

use serde::{Deserialize, Serialize};

/// Inclusive size window of a locus, in base pairs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: f64,
    pub max: f64,
}

impl SizeRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range widened by `tolerance` bp on both sides
    pub fn contains_with_tolerance(&self, size_bp: f64, tolerance: f64) -> bool {
        size_bp >= self.min - tolerance && size_bp <= self.max + tolerance
    }
}

/// Canonical fragment size of a known allele
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnownAllele {
    pub allele: u32,
    pub size_bp: f64,
}

/// One STR locus of a kit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDefinition {
    pub locus: String,
    pub channel: u8,
    pub size_range: SizeRange,
    #[serde(default = "default_repeat_length")]
    pub repeat_length: f64,
    #[serde(default)]
    pub known_alleles: Vec<KnownAllele>,
}

fn default_repeat_length() -> f64 {
    4.0
}

impl MarkerDefinition {
    pub fn new(locus: &str, channel: u8, min: f64, max: f64) -> Self {
        Self {
            locus: locus.to_string(),
            channel,
            size_range: SizeRange::new(min, max),
            repeat_length: default_repeat_length(),
            known_alleles: Vec::new(),
        }
    }

    pub fn with_known_alleles(mut self, alleles: &[(u32, f64)]) -> Self {
        self.known_alleles = alleles
            .iter()
            .map(|&(allele, size_bp)| KnownAllele { allele, size_bp })
            .collect();
        self
    }
}

/// Ordered collection of marker definitions (a kit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerTable {
    pub markers: Vec<MarkerDefinition>,
}

impl MarkerTable {
    pub fn new(markers: Vec<MarkerDefinition>) -> Self {
        Self { markers }
    }

    /// The 15 autosomal forensic STR loci shipped as defaults.
    /// Ranges and typical alleles are starting points; calibrate them
    /// against the kit actually in use.
    pub fn forensic_default() -> Self {
        Self::new(vec![
            MarkerDefinition::new("D3S1358", 1, 95.0, 175.0).with_known_alleles(&[
                (12, 114.0),
                (13, 118.0),
                (14, 122.0),
                (15, 126.0),
                (16, 130.0),
                (17, 134.0),
                (18, 138.0),
            ]),
            MarkerDefinition::new("vWA", 1, 145.0, 215.0).with_known_alleles(&[
                (14, 169.0),
                (15, 173.0),
                (16, 177.0),
                (17, 181.0),
                (18, 185.0),
                (19, 189.0),
            ]),
            MarkerDefinition::new("D16S539", 1, 215.0, 285.0).with_known_alleles(&[
                (9, 240.0),
                (10, 244.0),
                (11, 248.0),
                (12, 252.0),
                (13, 256.0),
            ]),
            MarkerDefinition::new("D2S1338", 1, 280.0, 360.0),
            MarkerDefinition::new("CSF1PO", 2, 275.0, 345.0).with_known_alleles(&[
                (10, 305.0),
                (11, 309.0),
                (12, 313.0),
                (13, 317.0),
            ]),
            MarkerDefinition::new("TPOX", 2, 215.0, 275.0).with_known_alleles(&[
                (8, 238.0),
                (9, 242.0),
                (10, 246.0),
                (11, 250.0),
            ]),
            MarkerDefinition::new("TH01", 2, 150.0, 200.0),
            MarkerDefinition::new("D19S433", 2, 100.0, 150.0),
            MarkerDefinition::new("D8S1179", 3, 120.0, 170.0),
            MarkerDefinition::new("D21S11", 3, 180.0, 250.0),
            MarkerDefinition::new("D18S51", 3, 270.0, 360.0),
            MarkerDefinition::new("D5S818", 4, 130.0, 170.0),
            MarkerDefinition::new("D13S317", 4, 170.0, 210.0),
            MarkerDefinition::new("D7S820", 4, 210.0, 250.0),
            MarkerDefinition::new("FGA", 4, 310.0, 460.0),
        ])
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarkerDefinition> {
        self.markers.iter()
    }

    pub fn get(&self, locus: &str) -> Option<&MarkerDefinition> {
        self.markers.iter().find(|m| m.locus == locus)
    }

    pub fn loci_names(&self) -> Vec<String> {
        self.markers.iter().map(|m| m.locus.clone()).collect()
    }

    /// Keep only loci accepted by `keep`
    pub fn retain<F: FnMut(&MarkerDefinition) -> bool>(&mut self, keep: F) {
        self.markers.retain(keep);
    }

    /// Check the table for definitions the caller cannot use
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for marker in &self.markers {
            if !seen.insert(marker.locus.as_str()) {
                return Err(format!("Duplicate locus '{}' in marker table", marker.locus));
            }
            if marker.channel == 0 || marker.channel > super::trace::MAX_CHANNELS {
                return Err(format!(
                    "Locus '{}' has invalid channel {} (expected 1-{})",
                    marker.locus,
                    marker.channel,
                    super::trace::MAX_CHANNELS
                ));
            }
            if marker.size_range.min > marker.size_range.max {
                return Err(format!(
                    "Locus '{}' has inverted size range {}-{}",
                    marker.locus, marker.size_range.min, marker.size_range.max
                ));
            }
            if marker.repeat_length <= 0.0 {
                return Err(format!(
                    "Locus '{}' must have a positive repeat length",
                    marker.locus
                ));
            }
        }
        Ok(())
    }
}

impl Default for MarkerTable {
    fn default() -> Self {
        Self::forensic_default()
    }
}

/// Expected fragment sizes of a size-standard dye, ascending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeLadder {
    pub name: String,
    pub sizes: Vec<f64>,
}

impl SizeLadder {
    /// GeneScan LIZ-500: 16 fragments from 35 to 500 bp
    pub fn liz500() -> Self {
        Self {
            name: "LIZ-500".to_string(),
            sizes: vec![
                35.0, 50.0, 75.0, 100.0, 139.0, 150.0, 160.0, 200.0, 250.0, 300.0, 340.0, 350.0,
                400.0, 450.0, 490.0, 500.0,
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn min_size(&self) -> Option<f64> {
        self.sizes.first().copied()
    }

    pub fn max_size(&self) -> Option<f64> {
        self.sizes.last().copied()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sizes.len() < 2 {
            return Err(format!("Ladder '{}' needs at least 2 fragment sizes", self.name));
        }
        if self.sizes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!("Ladder '{}' sizes must be strictly ascending", self.name));
        }
        Ok(())
    }
}

impl Default for SizeLadder {
    fn default() -> Self {
        Self::liz500()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forensic_default_is_valid() {
        let table = MarkerTable::forensic_default();
        assert_eq!(table.len(), 15);
        assert!(table.validate().is_ok());
        let d3 = table.get("D3S1358").unwrap();
        assert_eq!(d3.channel, 1);
        assert_eq!(d3.known_alleles.len(), 7);
        assert!(table.get("FGA").unwrap().known_alleles.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_definitions() {
        let dup = MarkerTable::new(vec![
            MarkerDefinition::new("TH01", 2, 150.0, 200.0),
            MarkerDefinition::new("TH01", 2, 150.0, 200.0),
        ]);
        assert!(dup.validate().is_err());

        let bad_channel = MarkerTable::new(vec![MarkerDefinition::new("X", 7, 1.0, 2.0)]);
        assert!(bad_channel.validate().is_err());

        let inverted = MarkerTable::new(vec![MarkerDefinition::new("X", 1, 200.0, 100.0)]);
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_liz500_ladder() {
        let ladder = SizeLadder::liz500();
        assert_eq!(ladder.len(), 16);
        assert_eq!(ladder.min_size(), Some(35.0));
        assert_eq!(ladder.max_size(), Some(500.0));
        assert!(ladder.validate().is_ok());

        let unsorted = SizeLadder {
            name: "bad".to_string(),
            sizes: vec![50.0, 35.0],
        };
        assert!(unsorted.validate().is_err());
    }

    #[test]
    fn test_range_tolerance() {
        let range = SizeRange::new(100.0, 150.0);
        assert!(range.contains_with_tolerance(92.0, 10.0));
        assert!(range.contains_with_tolerance(160.0, 10.0));
        assert!(!range.contains_with_tolerance(160.5, 10.0));
    }
}
