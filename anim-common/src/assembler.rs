//! Animation assembler and disassembler
//!
//! [`assemble`] turns tool-side [`AnimationData`] into a uniform pose buffer
//! for the codec. [`disassemble`] samples a compressed animation back into
//! clips.

use tracing::{debug, info, warn};

use crate::animation::{AnimationData, Annotation, Clip, ReferenceFrame, FRAME_RATE};
use crate::codec::{AnimationBinding, AnnotationTrack, AssembledAnimation, SampledAnimation};
use crate::error::{Error, Result};
use crate::math::{normalize_quat, normalize_rotations, QsTransform};
use crate::pose;
use crate::skeleton::Skeleton;
use crate::tracks::{pack_layout, unpack_layout};

/// Key space of disassembled clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySpace {
    /// Offsets from each bone's bind pose
    #[default]
    BoneLocal,
    /// Relative to the parent bone
    Parent,
    /// Relative to the skeleton origin
    Object,
}

// ============================================================================
// Assembly
// ============================================================================

/// Build the pose buffer for `data`
///
/// Keys are converted to parent space (and to bind-relative offsets when
/// additive) in place. Clips already tagged
/// [`ReferenceFrame::AdditiveOffset`] are left as they are, so assembling the
/// same data twice yields the same buffer. Returns `Ok(None)` for the
/// unsupported combination of an additive paired animation.
pub fn assemble(data: &mut AnimationData<'_>) -> Result<Option<AssembledAnimation>> {
    validate(data)?;

    let frames = data.frame_count;
    for clip in &mut data.clips {
        match clip.reference_frame {
            ReferenceFrame::Object | ReferenceFrame::Undefined => {
                pose::to_parent_space(clip, frames)
            }
            ReferenceFrame::BoneLocal => pose::bone_local_to_parent_space(clip),
            ReferenceFrame::ParentBone | ReferenceFrame::AdditiveOffset => {}
        }
        if data.additive && clip.reference_frame != ReferenceFrame::AdditiveOffset {
            pose::apply_additive(clip);
        }
        pose::sanitize_quaternions(clip);
    }

    let Some(layout) = pack_layout(data)? else {
        return Ok(None);
    };

    let n_bones = layout.bones.len();
    let n_floats = layout.floats.len();
    let mut transforms = Vec::with_capacity(n_bones * frames);
    let mut floats = Vec::with_capacity(n_floats * frames);

    for frame in 0..frames {
        for out in &layout.bones {
            let key = match out.track {
                Some(track) => track.key_at(frame).copied(),
                None if !data.additive => {
                    Some(out.bone.map_or(QsTransform::IDENTITY, |b| *b.bind()))
                }
                None => None,
            };
            transforms.push(key);
        }
        for out in &layout.floats {
            floats.push(out.and_then(|t| t.key_at(frame)));
        }
    }

    // Empty slots stay out of the renormalization pass
    for key in transforms.iter_mut().flatten() {
        key.rotation = normalize_quat(key.rotation);
    }

    let mut annotation_tracks: Vec<AnnotationTrack> = layout
        .track_names
        .iter()
        .map(AnnotationTrack::named)
        .collect();
    for (clip, slot) in data.clips.iter().zip(&layout.annotation_tracks) {
        let Some(track) = slot.and_then(|s| annotation_tracks.get_mut(s)) else {
            if !clip.annotations.is_empty() {
                warn!("Dropping {} annotations with no track", clip.annotations.len());
            }
            continue;
        };
        track.annotations.extend(
            clip.annotations
                .iter()
                .map(|a| (a.frame as f32 / FRAME_RATE as f32, a.text.clone())),
        );
    }

    info!(
        "Assembled {} frames, {} transform tracks, {} float tracks",
        frames, n_bones, n_floats
    );

    Ok(Some(AssembledAnimation {
        duration: data.duration(),
        frame_count: frames,
        transform_track_count: n_bones,
        float_track_count: n_floats,
        transforms,
        floats,
        annotation_tracks,
        binding: layout.binding,
        sample_single_tracks: data.is_paired(),
    }))
}

fn validate(data: &AnimationData<'_>) -> Result<()> {
    if data.frame_count < 1 {
        return Err(Error::NoFrames);
    }
    if data.frame_rate != FRAME_RATE {
        return Err(Error::InvalidFrameRate(data.frame_rate));
    }

    let check = |name: &str, keys: usize| {
        if keys == 0 {
            Err(Error::EmptyTrack(name.to_string()))
        } else if keys != 1 && keys != data.frame_count {
            Err(Error::MissingKeys {
                track: name.to_string(),
                expected: data.frame_count,
                found: keys,
            })
        } else {
            Ok(())
        }
    };

    for clip in &data.clips {
        if !data.additive && clip.reference_frame == ReferenceFrame::AdditiveOffset {
            return Err(Error::InvalidInput(
                "additive-encoded clip in a non-additive animation".into(),
            ));
        }
        let skeleton = clip.skeleton;
        for track in clip.all_bone_tracks() {
            let name = track.target.map_or("<unmapped>", |id| skeleton.get(id).name());
            check(name, track.keys.len())?;
        }
        for track in &clip.float_tracks {
            let name = track
                .target
                .and_then(|i| skeleton.float(i))
                .map_or("<unmapped>", |f| f.name.as_str());
            check(name, track.keys.len())?;
        }
    }
    Ok(())
}

// ============================================================================
// Disassembly
// ============================================================================

/// Sample `animation` into clips over `skeletons`
///
/// Returns empty data when the animation has no tracks or no binding, when it
/// does not fit the skeletons, and when its duration is out of range.
pub fn disassemble<'s>(
    animation: &dyn SampledAnimation,
    binding: Option<&AnimationBinding>,
    skeletons: &[&'s Skeleton],
    space: KeySpace,
) -> AnimationData<'s> {
    let n_bones = animation.transform_track_count();
    let n_floats = animation.float_track_count();

    if n_bones == 0 && n_floats == 0 {
        warn!("Animation has no tracks");
        return AnimationData::default();
    }
    let Some(binding) = binding else {
        warn!("Animation has no binding");
        return AnimationData::default();
    };
    let Some(mut layout) = unpack_layout(animation, binding, skeletons) else {
        warn!("Animation does not fit the given skeletons");
        return AnimationData::default();
    };
    if layout.clips.is_empty() {
        return AnimationData::default();
    }

    let Some(frames) = frame_count(animation.duration()) else {
        warn!("Animation duration {} is out of range", animation.duration());
        return AnimationData::default();
    };
    let additive = binding.blend_hint.is_additive();
    debug!(
        "Sampling {} frames of {} transform and {} float tracks",
        frames, n_bones, n_floats
    );

    for clip in &mut layout.clips {
        for track in clip.all_bone_tracks_mut() {
            track.keys.reserve_exact(frames);
        }
        for track in &mut clip.float_tracks {
            track.keys.reserve_exact(frames);
        }
    }

    let mut transforms = vec![QsTransform::IDENTITY; n_bones];
    let mut values = vec![0.0f32; n_floats];
    for frame in 0..frames {
        animation.sample_tracks(frame as f32 / FRAME_RATE as f32, &mut transforms, &mut values);

        for (i, key) in transforms.iter_mut().enumerate() {
            let Some((skeleton, id)) = layout.transforms[i].and_then(|s| layout.target(s)) else {
                continue;
            };
            let bone = skeleton.get(id);
            if additive {
                *key = *key * *bone.bind();
            }
            *key = *bone.inverse_bind() * *key;
        }
        normalize_rotations(&mut transforms);

        for (i, key) in transforms.iter().enumerate() {
            if let Some(track) = layout.transforms[i].and_then(|s| layout.track_mut(s)) {
                track.keys.push(*key);
            }
        }
        for (i, value) in values.iter().enumerate() {
            if let Some(track) = layout.floats[i].and_then(|s| layout.float_track_mut(s)) {
                track.keys.push(*value);
            }
        }
    }

    let names = animation.annotation_tracks();
    for (clip, slot) in layout.clips.iter_mut().zip(&layout.annotation_tracks) {
        clip.reference_frame = ReferenceFrame::BoneLocal;
        convert_keys(clip, frames, space, additive);
        pose::collapse_constant_tracks(clip, frames);

        if let Some(track) = slot.and_then(|s| names.get(s)) {
            clip.annotations
                .extend(track.annotations.iter().map(|(time, text)| Annotation {
                    frame: (time * FRAME_RATE as f32).round() as u32,
                    text: text.clone(),
                }));
        }
    }

    AnimationData {
        frame_count: frames,
        frame_rate: FRAME_RATE,
        additive,
        clips: layout.clips,
    }
}

/// Longest animation [`disassemble`] will sample, one hour at 30 fps
pub const MAX_FRAMES: usize = 30 * 60 * 60;

/// Frame count covering `duration` seconds, `None` when the duration is not
/// finite, negative or longer than [`MAX_FRAMES`]
pub fn frame_count(duration: f32) -> Option<usize> {
    if !duration.is_finite() || duration < 0.0 {
        return None;
    }
    let last = (duration * FRAME_RATE as f32).round();
    if last >= MAX_FRAMES as f32 {
        return None;
    }
    Some(last as usize + 1)
}

fn convert_keys(clip: &mut Clip<'_>, frames: usize, space: KeySpace, additive: bool) {
    if additive && space != KeySpace::BoneLocal {
        debug!("Additive keys stay bone-local");
        return;
    }
    match space {
        KeySpace::BoneLocal => {}
        KeySpace::Parent => pose::bone_local_to_parent_space(clip),
        KeySpace::Object => {
            pose::bone_local_to_parent_space(clip);
            pose::to_object_space(clip, frames);
        }
    }
}
