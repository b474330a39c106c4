//! Boundary with the compressed animation store
//!
//! The assembler produces an [`AssembledAnimation`] for the store to encode,
//! and reads back anything implementing [`SampledAnimation`].

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::math::QsTransform;

/// Skeleton name stored in the binding of paired (two-actor) animations
pub const PAIRED_ROOT: &str = "PairedRoot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum BlendHint {
    #[default]
    Normal,
    Additive,
}

impl BlendHint {
    pub fn from_additive(additive: bool) -> Self {
        if additive {
            BlendHint::Additive
        } else {
            BlendHint::Normal
        }
    }

    pub fn is_additive(self) -> bool {
        self == BlendHint::Additive
    }
}

/// How the tracks of an animation attach to a skeleton
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct AnimationBinding {
    /// Name of the skeleton the animation was built for, or [`PAIRED_ROOT`]
    pub original_skeleton_name: String,
    pub blend_hint: BlendHint,
    /// Track → bone index; empty means track `i` is bone `i`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform_track_to_bone_indices: Vec<i16>,
    /// Track → float slot; empty means track `i` is float `i`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub float_track_to_float_slot_indices: Vec<i16>,
}

impl AnimationBinding {
    pub fn is_paired(&self) -> bool {
        self.original_skeleton_name == PAIRED_ROOT
    }
}

/// Timed text events attached to one track
///
/// In paired animations every track carries one of these, and its name is
/// what identifies the bone the track belongs to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct AnnotationTrack {
    pub track_name: String,
    /// `(time in seconds, text)`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<(f32, String)>,
}

impl AnnotationTrack {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            track_name: name.into(),
            annotations: Vec::new(),
        }
    }
}

/// A compressed animation that can be evaluated at any time
pub trait SampledAnimation {
    /// Length in seconds
    fn duration(&self) -> f32;

    fn transform_track_count(&self) -> usize;

    fn float_track_count(&self) -> usize;

    /// One entry per transform track, or empty when the animation carries none
    fn annotation_tracks(&self) -> &[AnnotationTrack];

    /// Evaluate every track at `time` seconds
    ///
    /// `transforms` and `floats` must hold at least the respective track counts.
    fn sample_tracks(&self, time: f32, transforms: &mut [QsTransform], floats: &mut [f32]);
}

/// Uniform per-frame pose buffer, ready for encoding
///
/// Buffers are addressed `track + frame × track_count`. `None` marks a
/// logically empty slot that is never read back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssembledAnimation {
    pub duration: f32,
    pub frame_count: usize,
    pub transform_track_count: usize,
    pub float_track_count: usize,
    pub transforms: Vec<Option<QsTransform>>,
    pub floats: Vec<Option<f32>>,
    pub annotation_tracks: Vec<AnnotationTrack>,
    pub binding: AnimationBinding,
    /// Required by the runtime codec for paired data
    pub sample_single_tracks: bool,
}

impl AssembledAnimation {
    pub fn transform(&self, track: usize, frame: usize) -> Option<&QsTransform> {
        self.transforms
            .get(track + frame * self.transform_track_count)
            .and_then(Option::as_ref)
    }

    pub fn float(&self, track: usize, frame: usize) -> Option<f32> {
        self.floats
            .get(track + frame * self.float_track_count)
            .copied()
            .flatten()
    }
}
