//! Output track layout for compression
//!
//! Single-actor animations are laid out in skeleton order. When fewer tracks
//! than skeleton slots are written, the binding carries the ascending list of
//! slot indices that do have tracks.
//!
//! Paired animations use a fixed layout of every bone of both skeletons plus
//! three root slots:
//!
//! ```text
//! 0                  paired anchor (never carries data)
//! 1                  primary root
//! 2 ..= n0 + 1       primary bones
//! n0 + 2             secondary root
//! n0 + 3 ..          secondary bones
//! ```

use tracing::{debug, warn};

use crate::animation::{AnimationData, BoneTrack, Clip, FloatTrack};
use crate::codec::{AnimationBinding, BlendHint, PAIRED_ROOT};
use crate::error::{Error, Result};
use crate::skeleton::{Bone, ROOT_BONE_NAME};
use super::names::{secondary_bone_name, secondary_root_name};

/// One output transform track
#[derive(Debug, Clone, Copy)]
pub struct OutputTrack<'a> {
    /// Authored keys, if any
    pub track: Option<&'a BoneTrack>,
    /// Bone whose bind pose fills unauthored frames
    pub bone: Option<&'a Bone>,
}

/// Output track layout of a whole animation
#[derive(Debug, Clone)]
pub struct PackLayout<'a> {
    pub bones: Vec<OutputTrack<'a>>,
    pub floats: Vec<Option<&'a FloatTrack>>,
    /// One annotation name per output transform track
    pub track_names: Vec<String>,
    /// Per clip: the output track carrying the clip's annotations
    pub annotation_tracks: Vec<Option<usize>>,
    pub binding: AnimationBinding,
}

/// Lay out the output tracks of `data`
///
/// Returns `Ok(None)` for additive paired animations, which have no
/// established layout.
pub fn pack_layout<'a>(data: &'a AnimationData<'_>) -> Result<Option<PackLayout<'a>>> {
    match data.clips.len() {
        1 => single(data).map(Some),
        2 if data.additive => {
            warn!("Additive paired animations are not supported");
            Ok(None)
        }
        2 => paired(data).map(Some),
        n => Err(Error::ClipCount(n)),
    }
}

fn single<'a>(data: &'a AnimationData<'_>) -> Result<PackLayout<'a>> {
    let clip = &data.clips[0];
    let skeleton = clip.skeleton;

    if clip.root_transform.is_some() {
        debug!("Ignoring root track of single-actor clip");
    }

    let n_bones = if data.additive {
        clip.bone_tracks.len()
    } else {
        skeleton.bone_count()
    };
    let bone_remap = compact_slots(n_bones, &clip.bone_map, "bone")?;
    let (floats, float_remap) = float_layout(clip)?;

    let mut bones = Vec::with_capacity(n_bones);
    let mut annotation_track = None;
    for i in 0..n_bones {
        let index = bone_remap.as_ref().map_or(i, |r| r[i]);
        bones.push(OutputTrack {
            track: clip.track_for_bone(index),
            bone: skeleton.bone(index),
        });
        if index == 0 {
            annotation_track = Some(i);
        }
    }

    Ok(PackLayout {
        track_names: vec![String::new(); bones.len()],
        bones,
        floats,
        annotation_tracks: vec![annotation_track],
        binding: AnimationBinding {
            original_skeleton_name: skeleton.name().to_string(),
            blend_hint: BlendHint::from_additive(data.additive),
            transform_track_to_bone_indices: to_indices(bone_remap)?,
            float_track_to_float_slot_indices: to_indices(float_remap)?,
        },
    })
}

fn paired<'a>(data: &'a AnimationData<'_>) -> Result<PackLayout<'a>> {
    let primary = &data.clips[0];
    let secondary = &data.clips[1];
    let n_bones = primary.skeleton.bone_count() + secondary.skeleton.bone_count() + 3;

    let mut bones = Vec::with_capacity(n_bones);
    let mut track_names = Vec::with_capacity(n_bones);

    bones.push(OutputTrack {
        track: None,
        bone: None,
    });
    track_names.push(PAIRED_ROOT.to_string());

    bones.push(OutputTrack {
        track: primary.root_transform.as_ref(),
        bone: Some(primary.skeleton.root()),
    });
    track_names.push(ROOT_BONE_NAME.to_string());

    let primary_annotations = bones.len();
    for bone in primary.skeleton.bones() {
        bones.push(OutputTrack {
            track: bone.index().and_then(|i| primary.track_for_bone(i)),
            bone: Some(bone),
        });
        track_names.push(bone.name().to_string());
    }

    bones.push(OutputTrack {
        track: secondary.root_transform.as_ref(),
        bone: Some(secondary.skeleton.root()),
    });
    track_names.push(secondary_root_name(secondary.skeleton));

    let secondary_annotations = bones.len();
    for bone in secondary.skeleton.bones() {
        bones.push(OutputTrack {
            track: bone.index().and_then(|i| secondary.track_for_bone(i)),
            bone: Some(bone),
        });
        track_names.push(secondary_bone_name(secondary.skeleton, bone.name()));
    }

    if bones.len() != n_bones {
        return Err(Error::TrackLayout(format!(
            "paired layout has {} tracks, expected {}",
            bones.len(),
            n_bones
        )));
    }

    // Floats belong to the primary actor
    let (floats, float_remap) = float_layout(primary)?;
    if !secondary.float_tracks.is_empty() {
        warn!(
            "Dropping {} float tracks of the secondary actor",
            secondary.float_tracks.len()
        );
    }

    Ok(PackLayout {
        bones,
        floats,
        track_names,
        annotation_tracks: vec![
            (primary.skeleton.bone_count() > 0).then_some(primary_annotations),
            (secondary.skeleton.bone_count() > 0).then_some(secondary_annotations),
        ],
        binding: AnimationBinding {
            original_skeleton_name: PAIRED_ROOT.to_string(),
            blend_hint: BlendHint::Normal,
            transform_track_to_bone_indices: Vec::new(),
            float_track_to_float_slot_indices: to_indices(float_remap)?,
        },
    })
}

type FloatLayout<'a> = (Vec<Option<&'a FloatTrack>>, Option<Vec<usize>>);

fn float_layout<'a>(clip: &'a Clip<'_>) -> Result<FloatLayout<'a>> {
    let n_floats = clip.float_tracks.len();
    let remap = compact_slots(n_floats, &clip.float_map, "float")?;
    let floats = (0..n_floats)
        .map(|i| clip.track_for_float(remap.as_ref().map_or(i, |r| r[i])))
        .collect();
    Ok((floats, remap))
}

/// Ascending slot indices that have tracks, when `n` is less than the slot count
fn compact_slots(n: usize, map: &[Option<usize>], kind: &str) -> Result<Option<Vec<usize>>> {
    if n > map.len() {
        return Err(Error::TrackLayout(format!(
            "{} {} tracks for {} skeleton slots",
            n,
            kind,
            map.len()
        )));
    }
    if n == map.len() {
        return Ok(None);
    }

    let remap: Vec<usize> = map
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.map(|_| i))
        .collect();
    if remap.len() != n {
        return Err(Error::TrackLayout(format!(
            "{} {} tracks but {} distinct skeleton slots",
            n,
            kind,
            remap.len()
        )));
    }
    debug!("Compacted {} tracks to {} of {} slots", kind, n, map.len());
    Ok(Some(remap))
}

/// Slot indices as stored in the binding
fn to_indices(remap: Option<Vec<usize>>) -> Result<Vec<i16>> {
    remap
        .unwrap_or_default()
        .into_iter()
        .map(|i| {
            i16::try_from(i).map_err(|_| {
                Error::TrackLayout(format!("slot index {} does not fit in 16 bits", i))
            })
        })
        .collect()
}
