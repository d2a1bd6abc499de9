// batch.rs - Parallel analysis of many files with per-file failure isolation

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use super::engine::{AnalysisResult, Analyzer};

/// One file to analyse
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl BatchInput {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a file from disk; the name kept is the file name without directories
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }
}

/// Results in input order plus outcome counts
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub results: Vec<AnalysisResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn successes(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.results.iter().filter(|r| r.success)
    }
}

fn progress_bar(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Analyse every input in parallel, one task per file. A failing file
/// yields a failed result and never affects the others.
pub fn analyze_batch(analyzer: &Analyzer, inputs: &[BatchInput], show_progress: bool) -> BatchReport {
    let start = Instant::now();
    let pb = progress_bar(inputs.len(), show_progress);
    let completed = AtomicUsize::new(0);

    let results: Vec<AnalysisResult> = inputs
        .par_iter()
        .map(|input| {
            let result = analyzer.analyze(&input.bytes, &input.filename);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            pb.set_position(done as u64);
            result
        })
        .collect();

    pb.finish_with_message("done");

    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = results.len() - succeeded;
    log::info!(
        "Batch of {} files: {} succeeded, {} failed",
        results.len(),
        succeeded,
        failed
    );

    BatchReport {
        results,
        succeeded,
        failed,
        elapsed_secs: start.elapsed().as_secs_f64(),
    }
}
