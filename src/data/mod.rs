// mod.rs - Data structures module

pub mod markers;
pub mod profile;
pub mod store;
pub mod trace;

// Re-export main types for convenience
pub use markers::{KnownAllele, MarkerDefinition, MarkerTable, SizeLadder, SizeRange};
pub use profile::{Genotype, GenotypeMatrix, GenotypeProfile};
pub use store::{AlleleOverlay, Project, SampleStore, StoredSample};
pub use trace::{DyePurpose, RawTrace};
