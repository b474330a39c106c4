//! Skeleton loading
//!
//! A skeleton source is a container holding skeleton records. Only the first
//! record of each file is used; later records (ragdolls and the like) are
//! ignored.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use anim_common::formats::AnimationContainer;
use anim_common::{Error, Skeleton};

/// Load the first skeleton of every source, in order
///
/// Sources without a skeleton are skipped. Fails when nothing was loaded.
pub fn load_skeletons(paths: &[PathBuf]) -> Result<Vec<Skeleton>> {
    let mut skeletons = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(skeleton) = load_skeleton(path)? {
            skeletons.push(skeleton);
        }
    }
    if skeletons.is_empty() {
        return Err(Error::InvalidInput("No skeleton found".into()).into());
    }
    Ok(skeletons)
}

fn load_skeleton(path: &Path) -> Result<Option<Skeleton>> {
    let container = AnimationContainer::read(path)?;
    let Some(record) = container.skeletons.first() else {
        tracing::warn!("No skeleton in {:?}, skipping", path);
        return Ok(None);
    };
    if container.skeletons.len() > 1 {
        tracing::debug!(
            "{:?} holds {} skeletons, using '{}'",
            path,
            container.skeletons.len(),
            record.name
        );
    }

    let skeleton = record
        .to_skeleton()
        .with_context(|| format!("Invalid skeleton in {:?}", path))?;
    tracing::info!(
        "Loaded skeleton '{}' ({} bones, {} floats) from {:?}",
        skeleton.name(),
        skeleton.bone_count(),
        skeleton.float_count(),
        path
    );
    Ok(Some(skeleton))
}
