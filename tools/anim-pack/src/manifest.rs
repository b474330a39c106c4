//! Batch manifest parsing and build orchestration
//!
//! ```toml
//! [defaults]
//! skeletons = ["skeletons/body.anpk"]
//! format = "binary"
//!
//! [[jobs]]
//! mode = "pack"
//! input = "walk.json"
//! output = "out/walk.anpk"
//! ```
//!
//! Relative paths resolve against the manifest's directory.

use anyhow::{Context, Result};
use hashbrown::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use anim_common::{Error, Skeleton};

use crate::convert::{self, Format, Space};
use crate::skeletons::load_skeletons;

/// Root manifest structure
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Settings shared by every job that does not override them
#[derive(Debug, Default, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub skeletons: Vec<PathBuf>,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub space: Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Pack,
    Unpack,
}

#[derive(Debug, Deserialize)]
pub struct Job {
    pub mode: Mode,
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub skeletons: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub format: Option<Format>,
    #[serde(default)]
    pub space: Option<Space>,
}

/// Outcome of a batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub written: usize,
    pub skipped: usize,
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::read(path.display().to_string(), e))
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    parse_manifest(&content).with_context(|| format!("Failed to parse manifest: {:?}", path))
}

pub fn parse_manifest(content: &str) -> Result<Manifest> {
    toml::from_str(content)
        .map_err(|e| Error::InvalidInput(e.to_string()))
        .context("Invalid manifest")
}

/// Run every job of a manifest
///
/// Skeleton files are loaded once per distinct list and shared by the jobs
/// that name the same list.
pub fn build_all(manifest: &Manifest, base_dir: &Path) -> Result<BuildSummary> {
    let mut cache: HashMap<Vec<PathBuf>, Vec<Skeleton>> = HashMap::new();
    let mut summary = BuildSummary::default();

    for (i, job) in manifest.jobs.iter().enumerate() {
        let input = base_dir.join(&job.input);
        let output = base_dir.join(&job.output);
        let paths: Vec<PathBuf> = job
            .skeletons
            .as_ref()
            .unwrap_or(&manifest.defaults.skeletons)
            .iter()
            .map(|p| base_dir.join(p))
            .collect();
        if paths.is_empty() {
            return Err(Error::InvalidArgs(format!(
                "job {} ({:?}) has no skeletons",
                i, job.input
            ))
            .into());
        }

        if !cache.contains_key(&paths) {
            let loaded = load_skeletons(&paths)?;
            cache.insert(paths.clone(), loaded);
        }
        let skeletons = &cache[&paths];

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::write(parent.display().to_string(), e))
                .with_context(|| format!("Failed to create output directory for job {}", i))?;
        }

        let written = match job.mode {
            Mode::Pack => convert::pack(
                &input,
                &output,
                skeletons,
                job.format.unwrap_or(manifest.defaults.format),
            )?,
            Mode::Unpack => convert::unpack(
                &input,
                &output,
                skeletons,
                job.space.unwrap_or(manifest.defaults.space),
            )?,
        };
        if written {
            summary.written += 1;
        } else {
            summary.skipped += 1;
        }
    }

    tracing::info!(
        "Batch done: {} written, {} skipped ({} skeleton sets)",
        summary.written,
        summary.skipped,
        cache.len()
    );
    Ok(summary)
}
