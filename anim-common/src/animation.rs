//! Tool-side animation data
//!
//! [`AnimationData`] is the named, per-clip representation shared by the
//! document format and the assembler. It owns every track; skeletons are
//! borrowed for the lifetime `'s`.

use crate::math::QsTransform;
use crate::skeleton::{BoneId, Skeleton};

/// The only frame rate the runtime accepts
pub const FRAME_RATE: i32 = 30;

/// Coordinate convention the keys of a clip are currently expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceFrame {
    #[default]
    Undefined,
    /// Relative to the skeleton origin
    Object,
    /// Offset from the bone's own parent-space bind pose
    BoneLocal,
    /// Relative to the parent bone's current pose
    ParentBone,
    /// Additive encoding: parent-space key times the inverse bind pose
    AdditiveOffset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneTrack {
    /// Backing bone, `None` when the track exists but maps to nothing
    pub target: Option<BoneId>,
    /// Either one constant key or one key per frame
    pub keys: Vec<QsTransform>,
}

impl BoneTrack {
    pub fn new(target: Option<BoneId>, keys: Vec<QsTransform>) -> Self {
        Self { target, keys }
    }

    /// Key at `frame`, repeating the last key past the end
    pub fn key_at(&self, frame: usize) -> Option<&QsTransform> {
        self.keys.get(frame).or_else(|| self.keys.last())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatTrack {
    /// Index into the skeleton's float table
    pub target: Option<usize>,
    pub keys: Vec<f32>,
}

impl FloatTrack {
    pub fn new(target: Option<usize>, keys: Vec<f32>) -> Self {
        Self { target, keys }
    }

    pub fn key_at(&self, frame: usize) -> Option<f32> {
        self.keys.get(frame).or_else(|| self.keys.last()).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub frame: u32,
    pub text: String,
}

/// One actor's tracks
#[derive(Debug, Clone)]
pub struct Clip<'s> {
    pub skeleton: &'s Skeleton,
    /// Track of the synthetic root bone (paired animations only)
    pub root_transform: Option<BoneTrack>,
    pub bone_tracks: Vec<BoneTrack>,
    pub float_tracks: Vec<FloatTrack>,
    /// Bone index → position in `bone_tracks`
    pub bone_map: Vec<Option<usize>>,
    /// Float index → position in `float_tracks`
    pub float_map: Vec<Option<usize>>,
    pub annotations: Vec<Annotation>,
    pub reference_frame: ReferenceFrame,
}

impl<'s> Clip<'s> {
    pub fn new(skeleton: &'s Skeleton) -> Self {
        Self {
            skeleton,
            root_transform: None,
            bone_tracks: Vec::new(),
            float_tracks: Vec::new(),
            bone_map: vec![None; skeleton.bone_count()],
            float_map: vec![None; skeleton.float_count()],
            annotations: Vec::new(),
            reference_frame: ReferenceFrame::Undefined,
        }
    }

    /// Append a bone track, indexing it if it targets a source bone
    ///
    /// When two tracks target the same bone the map keeps the first one.
    pub fn push_bone_track(&mut self, track: BoneTrack) {
        if let Some(index) = track.target.and_then(BoneId::index) {
            if let Some(slot) = self.bone_map.get_mut(index) {
                slot.get_or_insert(self.bone_tracks.len());
            }
        }
        self.bone_tracks.push(track);
    }

    pub fn push_float_track(&mut self, track: FloatTrack) {
        if let Some(index) = track.target {
            if let Some(slot) = self.float_map.get_mut(index) {
                slot.get_or_insert(self.float_tracks.len());
            }
        }
        self.float_tracks.push(track);
    }

    /// Track animating source bone `index`
    pub fn track_for_bone(&self, index: usize) -> Option<&BoneTrack> {
        self.bone_map
            .get(index)
            .copied()
            .flatten()
            .and_then(|i| self.bone_tracks.get(i))
    }

    pub fn track_for_float(&self, index: usize) -> Option<&FloatTrack> {
        self.float_map
            .get(index)
            .copied()
            .flatten()
            .and_then(|i| self.float_tracks.get(i))
    }

    /// Mutable access to every bone track, root track first
    pub fn all_bone_tracks_mut(&mut self) -> impl Iterator<Item = &mut BoneTrack> {
        self.root_transform.iter_mut().chain(self.bone_tracks.iter_mut())
    }

    pub fn all_bone_tracks(&self) -> impl Iterator<Item = &BoneTrack> {
        self.root_transform.iter().chain(self.bone_tracks.iter())
    }
}

/// A whole animation: one clip per actor
#[derive(Debug, Clone)]
pub struct AnimationData<'s> {
    pub frame_count: usize,
    pub frame_rate: i32,
    pub additive: bool,
    pub clips: Vec<Clip<'s>>,
}

impl Default for AnimationData<'_> {
    fn default() -> Self {
        Self {
            frame_count: 0,
            frame_rate: FRAME_RATE,
            additive: false,
            clips: Vec::new(),
        }
    }
}

impl<'s> AnimationData<'s> {
    pub fn new(frame_count: usize, additive: bool) -> Self {
        Self {
            frame_count,
            frame_rate: FRAME_RATE,
            additive,
            clips: Vec::new(),
        }
    }

    /// True when nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn is_paired(&self) -> bool {
        self.clips.len() == 2
    }

    /// Duration in seconds covered by `frame_count` frames
    pub fn duration(&self) -> f32 {
        self.frame_count.saturating_sub(1) as f32 / FRAME_RATE as f32
    }
}
