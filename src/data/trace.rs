// trace.rs - Fluorescence channel traces

use serde::{Deserialize, Serialize};

/// Number of dye channels an FSA run carries (4 analyte dyes + size standard)
pub const MAX_CHANNELS: u8 = 5;

/// Channel reserved for the size-standard dye
pub const SIZE_STANDARD_CHANNEL: u8 = 5;

/// Role of a dye channel in the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DyePurpose {
    SizeStandard,
    Analyte,
}

impl DyePurpose {
    pub fn for_channel(channel: u8) -> Self {
        if channel == SIZE_STANDARD_CHANNEL {
            DyePurpose::SizeStandard
        } else {
            DyePurpose::Analyte
        }
    }
}

/// Conventional dye for a channel (G5 dye set: 6-FAM, VIC, NED, PET, LIZ)
pub fn default_dye_name(channel: u8) -> &'static str {
    match channel {
        1 => "FAM",
        2 => "VIC",
        3 => "NED",
        4 => "PET",
        5 => "LIZ",
        _ => "Unknown",
    }
}

/// Display colour of a channel in electropherograms
pub fn channel_color(channel: u8) -> &'static str {
    match channel {
        1 => "blue",
        2 => "green",
        3 => "yellow",
        4 => "red",
        5 => "orange",
        _ => "unknown",
    }
}

/// One decoded fluorescence channel. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrace {
    pub channel: u8,
    pub dye: String,
    pub purpose: DyePurpose,
    pub samples: Vec<i32>,
}

impl RawTrace {
    pub fn new(channel: u8, dye: impl Into<String>, samples: Vec<i32>) -> Self {
        Self {
            channel,
            dye: dye.into(),
            purpose: DyePurpose::for_channel(channel),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_size_standard(&self) -> bool {
        self.purpose == DyePurpose::SizeStandard
    }

    /// Samples as floating point for the numeric routines
    pub fn as_f64(&self) -> Vec<f64> {
        self.samples.iter().map(|&v| v as f64).collect()
    }

    pub fn max_intensity(&self) -> Option<i32> {
        self.samples.iter().copied().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_follows_channel() {
        assert_eq!(DyePurpose::for_channel(5), DyePurpose::SizeStandard);
        for ch in 1..=4 {
            assert_eq!(DyePurpose::for_channel(ch), DyePurpose::Analyte);
        }
        let trace = RawTrace::new(5, default_dye_name(5), vec![1, 2, 3]);
        assert!(trace.is_size_standard());
        assert_eq!(trace.dye, "LIZ");
        assert_eq!(trace.max_intensity(), Some(3));
    }
}
