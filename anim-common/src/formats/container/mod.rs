//! Compressed animation container (`.anpk`)
//!
//! A container holds skeletons, compressed animations and the bindings that
//! attach animations to skeletons. The same file can carry only skeletons
//! (a skeleton source), only animations, or both.
//!
//! # Layout
//!
//! Binary form:
//! ```text
//! 0x00: magic "ANPK"
//! 0x04: version u16 LE
//! 0x06: reserved u16 LE
//! 0x08: bitcode-encoded AnimationContainer
//! ```
//!
//! Text form: the same structure as pretty JSON, with a top-level `version`.
//!
//! Transform keys are stored per frame, `[frame0_track0, frame0_track1, ...,
//! frame1_track0, ...]`, with rotations packed smallest-three into 64 bits.

mod encoding;
mod header;


use std::path::Path;

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assembler::frame_count;
use crate::codec::{AnimationBinding, AnnotationTrack, AssembledAnimation, SampledAnimation};
use crate::error::{Error, Result};
use crate::math::{slerp, QsTransform};
use crate::skeleton::{BoneDef, Skeleton};

pub use encoding::{
    decode_quat_smallest_three, decode_transform, encode_quat_smallest_three, encode_transform,
    PackedTransform,
};
pub use header::{is_binary, ContainerHeader, CONTAINER_MAGIC, CONTAINER_VERSION};

/// Distance from a whole frame below which sampling snaps to it
const FRAME_SNAP: f32 = 1e-4;

/// On-disk form of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerFormat {
    #[default]
    Binary,
    Text,
}

// ============================================================================
// Skeletons
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct BoneRecord {
    pub name: String,
    /// Parent bone index, -1 for top-level bones
    pub parent: i16,
    /// Parent-space bind pose, `[tx, ty, tz, rw, rx, ry, rz, sx, sy, sz]`
    pub bind: [f32; 10],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct FloatRecord {
    pub name: String,
    pub reference_value: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct SkeletonRecord {
    pub name: String,
    pub bones: Vec<BoneRecord>,
    #[serde(default)]
    pub floats: Vec<FloatRecord>,
}

impl SkeletonRecord {
    /// Fails when a parent index does not fit the 16-bit record field
    pub fn from_skeleton(skeleton: &Skeleton) -> Result<Self> {
        let bones = skeleton
            .bones()
            .iter()
            .map(|b| {
                let parent = match b.parent().and_then(|p| p.index()) {
                    Some(p) => i16::try_from(p).map_err(|_| Error::InvalidSkeleton {
                        name: skeleton.name().to_string(),
                        reason: format!("bone '{}' has parent index {} above 32767", b.name(), p),
                    })?,
                    None => -1,
                };
                Ok(BoneRecord {
                    name: b.name().to_string(),
                    parent,
                    bind: b.bind().to_array(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: skeleton.name().to_string(),
            bones,
            floats: skeleton
                .floats()
                .iter()
                .map(|f| FloatRecord {
                    name: f.name.clone(),
                    reference_value: f.reference_value,
                })
                .collect(),
        })
    }

    pub fn to_skeleton(&self) -> Result<Skeleton> {
        let bones: Vec<BoneDef> = self
            .bones
            .iter()
            .map(|b| BoneDef {
                name: b.name.clone(),
                parent: usize::try_from(b.parent).ok(),
                bind: QsTransform::from_array(b.bind),
            })
            .collect();
        let floats: Vec<(String, f32)> = self
            .floats
            .iter()
            .map(|f| (f.name.clone(), f.reference_value))
            .collect();
        Skeleton::from_parts(self.name.clone(), &bones, &floats)
    }
}

// ============================================================================
// Animations
// ============================================================================

/// Flag bits of [`CompressedAnimation::flags`]
pub mod flags {
    /// Tracks must be sampled one at a time (paired animations)
    pub const SAMPLE_SINGLE_TRACKS: u8 = 0x01;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct CompressedAnimation {
    /// Length in seconds
    pub duration: f32,
    pub frame_count: u32,
    pub transform_track_count: u32,
    pub float_track_count: u32,
    #[serde(default)]
    pub flags: u8,
    #[serde(default)]
    pub annotation_tracks: Vec<AnnotationTrack>,
    /// `frame_count × transform_track_count` keys
    pub transforms: Vec<PackedTransform>,
    /// `frame_count × float_track_count` values
    #[serde(default)]
    pub floats: Vec<f32>,
}

impl CompressedAnimation {
    /// Encode an assembled pose buffer
    ///
    /// Empty slots are stored as the identity (transforms) or 0 (floats).
    pub fn encode(assembled: &AssembledAnimation) -> Self {
        let transforms = assembled
            .transforms
            .iter()
            .map(|t| encode_transform(t.as_ref().unwrap_or(&QsTransform::IDENTITY)))
            .collect();
        let floats = assembled.floats.iter().map(|f| f.unwrap_or(0.0)).collect();

        Self {
            duration: assembled.duration,
            frame_count: assembled.frame_count as u32,
            transform_track_count: assembled.transform_track_count as u32,
            float_track_count: assembled.float_track_count as u32,
            flags: if assembled.sample_single_tracks {
                flags::SAMPLE_SINGLE_TRACKS
            } else {
                0
            },
            annotation_tracks: assembled.annotation_tracks.clone(),
            transforms,
            floats,
        }
    }

    pub fn sample_single_tracks(&self) -> bool {
        self.flags & flags::SAMPLE_SINGLE_TRACKS != 0
    }

    /// Check the duration and that the key buffers match the declared counts
    fn validate(&self) -> Result<()> {
        let frames = self.frame_count as usize;
        if frame_count(self.duration) != Some(frames) {
            return Err(Error::InvalidInput(format!(
                "animation duration {} does not cover {} frames",
                self.duration, frames
            )));
        }
        let expected_transforms = frames * self.transform_track_count as usize;
        let expected_floats = frames * self.float_track_count as usize;
        if self.transforms.len() != expected_transforms {
            return Err(Error::InvalidInput(format!(
                "animation has {} transform keys, expected {}",
                self.transforms.len(),
                expected_transforms
            )));
        }
        if self.floats.len() != expected_floats {
            return Err(Error::InvalidInput(format!(
                "animation has {} float keys, expected {}",
                self.floats.len(),
                expected_floats
            )));
        }
        Ok(())
    }

    /// Fractional frame position of `time`, snapped to whole frames
    fn frame_position(&self, time: f32) -> f32 {
        let last = self.frame_count.saturating_sub(1) as f32;
        if last == 0.0 || self.duration <= 0.0 {
            return 0.0;
        }
        let p = (time / self.duration * last).clamp(0.0, last);
        let nearest = p.round();
        if (p - nearest).abs() < FRAME_SNAP {
            nearest
        } else {
            p
        }
    }
}

impl SampledAnimation for CompressedAnimation {
    fn duration(&self) -> f32 {
        self.duration
    }

    fn transform_track_count(&self) -> usize {
        self.transform_track_count as usize
    }

    fn float_track_count(&self) -> usize {
        self.float_track_count as usize
    }

    fn annotation_tracks(&self) -> &[AnnotationTrack] {
        &self.annotation_tracks
    }

    fn sample_tracks(&self, time: f32, transforms: &mut [QsTransform], floats: &mut [f32]) {
        let n_bones = self.transform_track_count as usize;
        let n_floats = self.float_track_count as usize;
        if self.frame_count == 0 {
            transforms.fill(QsTransform::IDENTITY);
            floats.fill(0.0);
            return;
        }

        let p = self.frame_position(time);
        let f0 = p.floor() as usize;
        let f1 = (f0 + 1).min(self.frame_count as usize - 1);
        let alpha = p - f0 as f32;

        for (i, out) in transforms.iter_mut().take(n_bones).enumerate() {
            let key = |f: usize| {
                self.transforms
                    .get(i + f * n_bones)
                    .map_or(QsTransform::IDENTITY, decode_transform)
            };
            let a = key(f0);
            *out = if alpha == 0.0 {
                a
            } else {
                let b = key(f1);
                QsTransform {
                    translation: a.translation.lerp(b.translation, alpha),
                    rotation: slerp(a.rotation, b.rotation, alpha),
                    scale: a.scale.lerp(b.scale, alpha),
                }
            };
        }

        for (i, out) in floats.iter_mut().take(n_floats).enumerate() {
            let value = |f: usize| self.floats.get(i + f * n_floats).copied().unwrap_or(0.0);
            let a = value(f0);
            *out = if alpha == 0.0 {
                a
            } else {
                a + (value(f1) - a) * alpha
            };
        }
    }
}

// ============================================================================
// Container
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct StoredBinding {
    /// Index into [`AnimationContainer::animations`]
    pub animation: u32,
    pub binding: AnimationBinding,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct AnimationContainer {
    #[serde(default)]
    pub skeletons: Vec<SkeletonRecord>,
    #[serde(default)]
    pub animations: Vec<CompressedAnimation>,
    #[serde(default)]
    pub bindings: Vec<StoredBinding>,
}

/// Text form: the container with its format version alongside
#[derive(Serialize, Deserialize)]
struct TextContainer {
    version: u32,
    #[serde(flatten)]
    container: AnimationContainer,
}

impl AnimationContainer {
    /// Add an assembled animation and its binding
    pub fn push_assembled(&mut self, assembled: &AssembledAnimation) {
        self.bindings.push(StoredBinding {
            animation: self.animations.len() as u32,
            binding: assembled.binding.clone(),
        });
        self.animations.push(CompressedAnimation::encode(assembled));
    }

    /// Binding of animation `index`, if it has one
    pub fn binding_for(&self, index: usize) -> Option<&AnimationBinding> {
        self.bindings
            .iter()
            .find(|b| b.animation as usize == index)
            .map(|b| &b.binding)
    }

    /// Serialize to the binary form
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = ContainerHeader::new().to_bytes().to_vec();
        bytes.extend(bitcode::encode(self));
        bytes
    }

    /// Serialize to the text form
    pub fn to_json(&self) -> Result<String> {
        let text = TextContainer {
            version: CONTAINER_VERSION as u32,
            container: self.clone(),
        };
        serde_json::to_string_pretty(&text).map_err(|e| Error::InvalidInput(e.to_string()))
    }

    /// Deserialize either form; `origin` names the source in errors
    pub fn from_bytes(bytes: &[u8], origin: &str) -> Result<Self> {
        let container = if let Some(header) = ContainerHeader::from_bytes(bytes) {
            if header.version > CONTAINER_VERSION {
                return Err(Error::UnsupportedVersion {
                    format: "container",
                    version: header.version as u32,
                });
            }
            let container: AnimationContainer = bitcode::decode(&bytes[ContainerHeader::SIZE..])
                .map_err(|e| Error::read(origin, e))?;
            container
        } else {
            let text: TextContainer =
                serde_json::from_slice(bytes).map_err(|e| Error::read(origin, e))?;
            if text.version > CONTAINER_VERSION as u32 {
                return Err(Error::UnsupportedVersion {
                    format: "container",
                    version: text.version,
                });
            }
            text.container
        };

        for animation in &container.animations {
            animation.validate()?;
        }
        debug!(
            "Read {}: {} skeletons, {} animations",
            origin,
            container.skeletons.len(),
            container.animations.len()
        );
        Ok(container)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| Error::read(origin.as_str(), e))?;
        Self::from_bytes(&bytes, &origin)
    }

    pub fn write(&self, path: &Path, format: ContainerFormat) -> Result<()> {
        let origin = path.display().to_string();
        let bytes = match format {
            ContainerFormat::Binary => self.to_bytes(),
            ContainerFormat::Text => self
                .to_json()
                .map_err(|e| Error::write(origin.as_str(), e))?
                .into_bytes(),
        };
        std::fs::write(path, bytes).map_err(|e| Error::write(origin, e))
    }
}
