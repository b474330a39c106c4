//! Single-file conversions
//!
//! Each function reads one input, converts it against already loaded
//! skeletons and writes one output. Animations that do not fit the
//! skeletons are skipped rather than failing the run; the return value
//! tells whether anything was written.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use anim_common::formats::{AnimationContainer, ContainerFormat, Document, SkeletonRecord};
use anim_common::{assemble, disassemble, Error, KeySpace, SampledAnimation, Skeleton};

/// Container output form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Binary,
    /// Pretty JSON
    Text,
}

impl From<Format> for ContainerFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Binary => ContainerFormat::Binary,
            Format::Text => ContainerFormat::Text,
        }
    }
}

/// Key space of unpacked clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    /// Offsets from the bind pose
    #[default]
    Bone,
    Parent,
    Object,
}

impl From<Space> for KeySpace {
    fn from(space: Space) -> Self {
        match space {
            Space::Bone => KeySpace::BoneLocal,
            Space::Parent => KeySpace::Parent,
            Space::Object => KeySpace::Object,
        }
    }
}

/// Convert a tool document into a compressed container
pub fn pack(input: &Path, output: &Path, skeletons: &[Skeleton], format: Format) -> Result<bool> {
    let document = Document::read(input)?;
    let refs: Vec<&Skeleton> = skeletons.iter().collect();
    let mut data = document
        .to_animation(&refs)
        .with_context(|| format!("Failed to bind {:?}", input))?;
    let assembled = assemble(&mut data).with_context(|| format!("Failed to pack {:?}", input))?;
    let Some(assembled) = assembled else {
        tracing::warn!("Skipping {:?}: nothing to pack", input);
        return Ok(false);
    };

    let mut container = AnimationContainer::default();
    container.push_assembled(&assembled);
    container.write(output, format.into())?;

    tracing::info!(
        "Packed {:?} -> {:?} ({} frames, {} transform tracks, {} float tracks)",
        input,
        output,
        assembled.frame_count,
        assembled.transform_track_count,
        assembled.float_track_count
    );
    Ok(true)
}

/// Convert the first animation of a container into a tool document
pub fn unpack(input: &Path, output: &Path, skeletons: &[Skeleton], space: Space) -> Result<bool> {
    let container = AnimationContainer::read(input)?;
    let Some(animation) = container.animations.first() else {
        tracing::warn!("No animation in {:?}, skipping", input);
        return Ok(false);
    };
    if container.animations.len() > 1 {
        tracing::warn!(
            "{:?} holds {} animations, converting the first",
            input,
            container.animations.len()
        );
    }

    let refs: Vec<&Skeleton> = skeletons.iter().collect();
    let data = disassemble(animation, container.binding_for(0), &refs, space.into());
    if data.is_empty() {
        tracing::warn!("Skipping {:?}: animation does not fit the skeletons", input);
        return Ok(false);
    }

    Document::from_animation(&data).write(output)?;
    tracing::info!(
        "Unpacked {:?} -> {:?} ({} frames, {} clips)",
        input,
        output,
        data.frame_count,
        data.clips.len()
    );
    Ok(true)
}

/// Write the skeletons described by a document into a skeleton source
pub fn skeleton(input: &Path, output: &Path, format: Format) -> Result<()> {
    let document = Document::read(input)?;
    let skeletons = document
        .skeletons()
        .with_context(|| format!("Invalid skeleton in {:?}", input))?;
    if skeletons.is_empty() {
        return Err(Error::InvalidInput("No skeleton found".into()))
            .with_context(|| format!("{:?} describes no skeleton", input));
    }

    let container = AnimationContainer {
        skeletons: skeletons
            .iter()
            .map(SkeletonRecord::from_skeleton)
            .collect::<anim_common::Result<_>>()
            .with_context(|| format!("Invalid skeleton in {:?}", input))?,
        ..Default::default()
    };
    container.write(output, format.into())?;
    tracing::info!(
        "Wrote {} skeletons from {:?} -> {:?}",
        skeletons.len(),
        input,
        output
    );
    Ok(())
}

/// Log a summary of a container
pub fn info(input: &Path) -> Result<()> {
    let container = AnimationContainer::read(input)?;
    tracing::info!("{:?}:", input);
    for line in describe(&container) {
        tracing::info!("  {}", line);
    }
    Ok(())
}

/// One line per skeleton and animation
pub fn describe(container: &AnimationContainer) -> Vec<String> {
    let mut lines = Vec::new();
    for skeleton in &container.skeletons {
        lines.push(format!(
            "skeleton '{}': {} bones, {} floats",
            skeleton.name,
            skeleton.bones.len(),
            skeleton.floats.len()
        ));
    }
    for (i, animation) in container.animations.iter().enumerate() {
        let mut line = format!(
            "animation {}: {:.3}s, {} frames, {} transform tracks, {} float tracks",
            i,
            animation.duration(),
            animation.frame_count,
            animation.transform_track_count(),
            animation.float_track_count()
        );
        match container.binding_for(i) {
            Some(binding) => {
                line.push_str(&format!(
                    ", skeleton '{}', {:?}",
                    binding.original_skeleton_name, binding.blend_hint
                ));
                if !binding.transform_track_to_bone_indices.is_empty()
                    || !binding.float_track_to_float_slot_indices.is_empty()
                {
                    line.push_str(", remapped");
                }
            }
            None => line.push_str(", unbound"),
        }
        lines.push(line);
    }
    lines
}
