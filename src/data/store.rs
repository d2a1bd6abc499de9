// store.rs - Projects, stored analysis results and manual allele overlays

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::{Genotype, GenotypeMatrix, GenotypeProfile};
use crate::core::engine::AnalysisResult;

pub type ProjectId = u64;
pub type SampleId = u64;

/// A named group of samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub sample_ids: Vec<SampleId>,
}

/// Manual replacement of one locus call. Stored next to the result,
/// the original call stays untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlleleOverlay {
    pub locus: String,
    pub allele1: String,
    pub allele2: String,
    pub note: Option<String>,
    pub created: DateTime<Utc>,
}

impl AlleleOverlay {
    pub fn new(locus: impl Into<String>, allele1: impl Into<String>, allele2: impl Into<String>) -> Self {
        Self {
            locus: locus.into(),
            allele1: allele1.into(),
            allele2: allele2.into(),
            note: None,
            created: Utc::now(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A result as held by the store
#[derive(Debug, Clone)]
pub struct StoredSample {
    pub id: SampleId,
    pub project_id: ProjectId,
    pub result: Arc<AnalysisResult>,
    /// Oldest first; the newest overlay for a locus wins
    pub overlays: Vec<AlleleOverlay>,
    pub added: DateTime<Utc>,
}

impl StoredSample {
    /// Genotypes as called, with overlays applied
    pub fn effective_genotypes(&self) -> BTreeMap<String, Genotype> {
        let mut genotypes: BTreeMap<String, Genotype> = self
            .result
            .alleles
            .iter()
            .map(|(locus, call)| (locus.clone(), Genotype::from_call(call)))
            .collect();
        for overlay in &self.overlays {
            genotypes.insert(
                overlay.locus.clone(),
                Genotype::new(overlay.allele1.clone(), overlay.allele2.clone()),
            );
        }
        genotypes
    }

    pub fn profile(&self) -> GenotypeProfile {
        GenotypeProfile {
            sample_id: self.result.sample_name(),
            genotypes: self.effective_genotypes(),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    projects: BTreeMap<ProjectId, Project>,
    samples: BTreeMap<SampleId, StoredSample>,
}

/// In-memory bookkeeping owned by whoever drives the engine. Safe to share
/// between threads.
#[derive(Debug, Default)]
pub struct SampleStore {
    state: RwLock<StoreState>,
    next_id: AtomicU64,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn create_project(&self, name: &str, description: Option<&str>) -> ProjectId {
        let id = self.allocate_id();
        let project = Project {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created: Utc::now(),
            sample_ids: Vec::new(),
        };
        self.write().projects.insert(id, project);
        id
    }

    pub fn project(&self, id: ProjectId) -> Option<Project> {
        self.read().projects.get(&id).cloned()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.read().projects.values().cloned().collect()
    }

    /// Delete a project together with its samples
    pub fn delete_project(&self, id: ProjectId) -> Result<(), String> {
        let mut state = self.write();
        let project = state
            .projects
            .remove(&id)
            .ok_or_else(|| format!("Project {} not found", id))?;
        for sample_id in project.sample_ids {
            state.samples.remove(&sample_id);
        }
        Ok(())
    }

    /// Store a result under a project
    pub fn add_result(&self, project_id: ProjectId, result: AnalysisResult) -> Result<SampleId, String> {
        let id = self.allocate_id();
        let mut state = self.write();
        let project = state
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| format!("Project {} not found", project_id))?;
        project.sample_ids.push(id);
        state.samples.insert(
            id,
            StoredSample {
                id,
                project_id,
                result: Arc::new(result),
                overlays: Vec::new(),
                added: Utc::now(),
            },
        );
        Ok(id)
    }

    pub fn sample(&self, id: SampleId) -> Option<StoredSample> {
        self.read().samples.get(&id).cloned()
    }

    pub fn result(&self, id: SampleId) -> Option<Arc<AnalysisResult>> {
        self.read().samples.get(&id).map(|s| Arc::clone(&s.result))
    }

    /// Sample in `project_id` whose input had this CRC32
    pub fn find_by_checksum(&self, project_id: ProjectId, checksum: u32) -> Option<SampleId> {
        let state = self.read();
        let project = state.projects.get(&project_id)?;
        project.sample_ids.iter().copied().find(|id| {
            state
                .samples
                .get(id)
                .is_some_and(|s| s.result.success && s.result.checksum == checksum)
        })
    }

    pub fn remove_sample(&self, id: SampleId) -> Result<(), String> {
        let mut state = self.write();
        let sample = state
            .samples
            .remove(&id)
            .ok_or_else(|| format!("Sample {} not found", id))?;
        if let Some(project) = state.projects.get_mut(&sample.project_id) {
            project.sample_ids.retain(|&s| s != id);
        }
        Ok(())
    }

    /// Attach a manual call; the stored result is not modified
    pub fn add_overlay(&self, sample_id: SampleId, overlay: AlleleOverlay) -> Result<(), String> {
        let mut state = self.write();
        let sample = state
            .samples
            .get_mut(&sample_id)
            .ok_or_else(|| format!("Sample {} not found", sample_id))?;
        log::info!(
            "Manual call for {} at {}: {}/{}",
            sample.result.sample_name(),
            overlay.locus,
            overlay.allele1,
            overlay.allele2
        );
        sample.overlays.push(overlay);
        Ok(())
    }

    /// Drop every overlay for `locus`, reverting to the engine's call
    pub fn clear_overlays(&self, sample_id: SampleId, locus: &str) -> Result<usize, String> {
        let mut state = self.write();
        let sample = state
            .samples
            .get_mut(&sample_id)
            .ok_or_else(|| format!("Sample {} not found", sample_id))?;
        let before = sample.overlays.len();
        sample.overlays.retain(|o| o.locus != locus);
        Ok(before - sample.overlays.len())
    }

    /// Samples x loci genotypes of a project's successful results, overlays
    /// preferred over engine calls
    pub fn allele_matrix(&self, project_id: ProjectId, loci_names: &[String]) -> Result<GenotypeMatrix, String> {
        let state = self.read();
        let project = state
            .projects
            .get(&project_id)
            .ok_or_else(|| format!("Project {} not found", project_id))?;
        let profiles = project
            .sample_ids
            .iter()
            .filter_map(|id| state.samples.get(id))
            .filter(|s| s.result.success)
            .map(StoredSample::profile)
            .collect();
        Ok(GenotypeMatrix::from_profiles(profiles, loci_names))
    }
}
