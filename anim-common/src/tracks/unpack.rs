//! Track mapping for decompression
//!
//! Works out which clip track each compressed track feeds. Failures here are
//! never errors: an animation that does not fit the given skeletons maps to
//! nothing and the caller skips it.

use tracing::{debug, warn};

use crate::animation::{BoneTrack, Clip, FloatTrack};
use crate::codec::{AnimationBinding, SampledAnimation};
use crate::skeleton::{BoneId, Skeleton};
use super::names::{resolve_track_target, TrackTarget};

/// Destination of one compressed transform track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSlot {
    /// The clip's synthetic-root track
    Root { clip: usize },
    /// `clip.bone_tracks[track]`
    Bone { clip: usize, track: usize },
}

impl TrackSlot {
    pub fn clip(self) -> usize {
        match self {
            TrackSlot::Root { clip } | TrackSlot::Bone { clip, .. } => clip,
        }
    }
}

/// Destination of one compressed float track: `clips[clip].float_tracks[track]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatSlot {
    pub clip: usize,
    pub track: usize,
}

/// Clips with empty tracks, and where every compressed track goes
#[derive(Debug, Clone)]
pub struct UnpackLayout<'s> {
    pub clips: Vec<Clip<'s>>,
    /// One entry per compressed transform track, `None` when discarded
    pub transforms: Vec<Option<TrackSlot>>,
    /// One entry per compressed float track
    pub floats: Vec<Option<FloatSlot>>,
    /// Per clip: the compressed track whose annotations belong to the clip
    pub annotation_tracks: Vec<Option<usize>>,
}

impl<'s> UnpackLayout<'s> {
    /// Keys of the track a compressed transform track feeds
    pub fn track_mut(&mut self, slot: TrackSlot) -> Option<&mut BoneTrack> {
        match slot {
            TrackSlot::Root { clip } => self.clips.get_mut(clip)?.root_transform.as_mut(),
            TrackSlot::Bone { clip, track } => {
                self.clips.get_mut(clip)?.bone_tracks.get_mut(track)
            }
        }
    }

    pub fn float_track_mut(&mut self, slot: FloatSlot) -> Option<&mut FloatTrack> {
        self.clips
            .get_mut(slot.clip)?
            .float_tracks
            .get_mut(slot.track)
    }

    /// Bone a compressed transform track maps to
    pub fn target(&self, slot: TrackSlot) -> Option<(&'s Skeleton, BoneId)> {
        let clip = self.clips.get(slot.clip())?;
        let id = match slot {
            TrackSlot::Root { .. } => BoneId::ROOT,
            TrackSlot::Bone { track, .. } => clip.bone_tracks.get(track)?.target?,
        };
        Some((clip.skeleton, id))
    }
}

/// How the tracks of an animation are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Addressing {
    /// By skeleton slot index, possibly through a remap table
    Single,
    /// By annotation name, across two actors
    Paired,
}

/// Map the tracks of `animation` onto clips over `skeletons`
///
/// `skeletons` is ordered primary first. Returns `None` when the animation
/// does not fit.
pub fn unpack_layout<'s>(
    animation: &dyn SampledAnimation,
    binding: &AnimationBinding,
    skeletons: &[&'s Skeleton],
) -> Option<UnpackLayout<'s>> {
    let addressing = if binding.is_paired() {
        Addressing::Paired
    } else {
        Addressing::Single
    };
    debug!("Mapping tracks by {:?} addressing", addressing);

    match addressing {
        Addressing::Single => single(animation, binding, skeletons),
        Addressing::Paired => paired(animation, binding, skeletons),
    }
}

fn single<'s>(
    animation: &dyn SampledAnimation,
    binding: &AnimationBinding,
    skeletons: &[&'s Skeleton],
) -> Option<UnpackLayout<'s>> {
    let n_bones = animation.transform_track_count();
    let n_floats = animation.float_track_count();

    let Some(&skeleton) = skeletons.first() else {
        warn!("No skeleton to map tracks onto");
        return None;
    };
    // Skeleton names are not unique, so a too-small skeleton is the only
    // reliable sign of a mismatch.
    if skeleton.bone_count() < n_bones || skeleton.float_count() < n_floats {
        warn!(
            "Skeleton '{}' ({} bones, {} floats) is too small for {} transform and {} float tracks",
            skeleton.name(),
            skeleton.bone_count(),
            skeleton.float_count(),
            n_bones,
            n_floats
        );
        return None;
    }

    let bone_indices = slot_indices(
        n_bones,
        &binding.transform_track_to_bone_indices,
        skeleton.bone_count(),
        "transform",
    )?;
    let float_indices = slot_indices(
        n_floats,
        &binding.float_track_to_float_slot_indices,
        skeleton.float_count(),
        "float",
    )?;

    let mut clip = Clip::new(skeleton);
    let mut transforms = Vec::with_capacity(n_bones);
    let mut annotation_track = None;
    for (i, &index) in bone_indices.iter().enumerate() {
        clip.push_bone_track(BoneTrack::new(Some(BoneId::from_index(index)), Vec::new()));
        transforms.push(Some(TrackSlot::Bone { clip: 0, track: i }));
        if index == 0 {
            annotation_track = Some(i);
        }
    }

    let mut floats = Vec::with_capacity(n_floats);
    for (i, &index) in float_indices.iter().enumerate() {
        clip.push_float_track(FloatTrack::new(Some(index), Vec::new()));
        floats.push(Some(FloatSlot { clip: 0, track: i }));
    }

    Some(UnpackLayout {
        clips: vec![clip],
        transforms,
        floats,
        annotation_tracks: vec![annotation_track],
    })
}

/// Skeleton slot of every track: identity when `remap` is empty
fn slot_indices(n: usize, remap: &[i16], slots: usize, kind: &str) -> Option<Vec<usize>> {
    if remap.is_empty() {
        return Some((0..n).collect());
    }
    if remap.len() != n {
        warn!(
            "{} remap has {} entries for {} tracks",
            kind,
            remap.len(),
            n
        );
        return None;
    }
    remap
        .iter()
        .map(|&i| usize::try_from(i).ok().filter(|&i| i < slots))
        .collect::<Option<Vec<_>>>()
        .or_else(|| {
            warn!("{} remap points outside the skeleton", kind);
            None
        })
}

fn paired<'s>(
    animation: &dyn SampledAnimation,
    binding: &AnimationBinding,
    skeletons: &[&'s Skeleton],
) -> Option<UnpackLayout<'s>> {
    let n_bones = animation.transform_track_count();
    let n_floats = animation.float_track_count();
    let names = animation.annotation_tracks();

    if n_bones == 0 {
        warn!("Paired animation has no transform tracks");
        return None;
    }
    if names.len() != n_bones {
        warn!(
            "Paired animation has {} annotation tracks for {} transform tracks",
            names.len(),
            n_bones
        );
        return None;
    }
    let Some(&primary) = skeletons.first() else {
        warn!("No skeleton to map tracks onto");
        return None;
    };
    // With one skeleton, both actors use it
    let secondary = skeletons.get(1).copied().unwrap_or(primary);
    let actors = [primary, secondary];

    let mut clips = vec![Clip::new(primary), Clip::new(secondary)];
    let mut transforms = vec![None; n_bones];
    let mut annotation_tracks = vec![None; 2];
    let mut mapped: [Vec<(usize, BoneId)>; 2] = [Vec::new(), Vec::new()];

    for (i, track) in names.iter().enumerate() {
        match resolve_track_target(&track.track_name, &actors) {
            TrackTarget::Clip {
                clip,
                bone: Some(id),
            } if id.is_root() => {
                let root = &mut clips[clip].root_transform;
                if root.is_some() {
                    warn!("Duplicate root track '{}' ignored", track.track_name);
                    continue;
                }
                *root = Some(BoneTrack::new(Some(BoneId::ROOT), Vec::new()));
                transforms[i] = Some(TrackSlot::Root { clip });
            }
            TrackTarget::Clip {
                clip,
                bone: Some(id),
            } => {
                mapped[clip].push((i, id));
                if id.index() == Some(0) {
                    annotation_tracks[clip] = Some(i);
                }
            }
            TrackTarget::Clip { clip, bone: None } => {
                debug!(
                    "Track '{}' of actor {} has no bone in '{}'",
                    track.track_name,
                    clip,
                    actors[clip].name()
                );
            }
            TrackTarget::Unmapped => {
                debug!("Track '{}' is not mapped", track.track_name);
            }
        }
    }

    for (c, tracks) in mapped.iter().enumerate() {
        for &(i, id) in tracks {
            transforms[i] = Some(TrackSlot::Bone {
                clip: c,
                track: clips[c].bone_tracks.len(),
            });
            clips[c].push_bone_track(BoneTrack::new(Some(id), Vec::new()));
        }
    }

    let floats = paired_floats(&mut clips[0], binding, n_floats);

    Some(UnpackLayout {
        clips,
        transforms,
        floats,
        annotation_tracks,
    })
}

/// Attribute paired float tracks to the primary actor, if they fit
fn paired_floats(
    primary: &mut Clip,
    binding: &AnimationBinding,
    n: usize,
) -> Vec<Option<FloatSlot>> {
    let slots = primary.skeleton.float_count();
    let remap = &binding.float_track_to_float_slot_indices;

    let indices = if n == slots {
        Some((0..n).collect::<Vec<_>>())
    } else if remap.len() == n {
        remap
            .iter()
            .map(|&i| usize::try_from(i).ok().filter(|&i| i < slots))
            .collect()
    } else {
        None
    };

    let Some(indices) = indices else {
        warn!(
            "Dropping {} paired float tracks that do not fit skeleton '{}'",
            n,
            primary.skeleton.name()
        );
        return vec![None; n];
    };

    indices
        .into_iter()
        .enumerate()
        .map(|(i, index)| {
            primary.push_float_track(FloatTrack::new(Some(index), Vec::new()));
            Some(FloatSlot { clip: 0, track: i })
        })
        .collect()
}
