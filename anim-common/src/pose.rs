//! Pose-space conversion and key cleanup over a [`Clip`]
//!
//! Conversions walk the skeleton from the synthetic root once per frame.
//! Every frame starts from the identity at the root; nothing accumulates
//! across frames. Constant (single-key) tracks are broadcast to one key per
//! frame before a hierarchical conversion, since a constant parent-space key
//! under an animated parent is not constant in object space.

use tracing::debug;

use crate::animation::{Clip, ReferenceFrame};
use crate::math::QsTransform;
use crate::skeleton::BoneId;

// ============================================================================
// Hierarchical conversions
// ============================================================================

/// Convert object-space keys to parent-bone space
///
/// Each authored key becomes `inverse(parent object pose) × key`. Children
/// see the parent's original object-space key. Unanimated bones follow the
/// hierarchy with their bind pose.
pub fn to_parent_space(clip: &mut Clip, frame_count: usize) {
    broadcast_constant_tracks(clip, frame_count);
    for frame in 0..frame_count {
        object_to_parent(
            clip,
            frame,
            BoneId::ROOT,
            QsTransform::IDENTITY,
            QsTransform::IDENTITY,
        );
    }
    clip.reference_frame = ReferenceFrame::ParentBone;
}

fn object_to_parent(
    clip: &mut Clip,
    frame: usize,
    id: BoneId,
    parent: QsTransform,
    parent_inverse: QsTransform,
) {
    let skeleton = clip.skeleton;
    let bone = skeleton.get(id);

    let (pose, pose_inverse) = match key_mut(clip, id, frame) {
        Some(key) => {
            let object = *key;
            *key = parent_inverse * object;
            (object, object.inverse())
        }
        None => {
            let object = parent * *bone.bind();
            (object, object.inverse())
        }
    };

    for &child in bone.children() {
        object_to_parent(clip, frame, child, pose, pose_inverse);
    }
}

/// Convert parent-bone space keys to object space
///
/// Mirror of [`to_parent_space`]: each key becomes `parent object pose × key`.
pub fn to_object_space(clip: &mut Clip, frame_count: usize) {
    broadcast_constant_tracks(clip, frame_count);
    for frame in 0..frame_count {
        parent_to_object(clip, frame, BoneId::ROOT, QsTransform::IDENTITY);
    }
    clip.reference_frame = ReferenceFrame::Object;
}

fn parent_to_object(clip: &mut Clip, frame: usize, id: BoneId, parent: QsTransform) {
    let skeleton = clip.skeleton;
    let bone = skeleton.get(id);

    let pose = match key_mut(clip, id, frame) {
        Some(key) => {
            *key = parent * *key;
            *key
        }
        None => parent * *bone.bind(),
    };

    for &child in bone.children() {
        parent_to_object(clip, frame, child, pose);
    }
}

/// Mapped track key of bone `id` at `frame`
fn key_mut<'a>(clip: &'a mut Clip, id: BoneId, frame: usize) -> Option<&'a mut QsTransform> {
    let track = match id.index() {
        Some(index) => {
            let slot = clip.bone_map.get(index).copied().flatten()?;
            clip.bone_tracks.get_mut(slot)?
        }
        None => clip.root_transform.as_mut()?,
    };
    track.keys.get_mut(frame)
}

// ============================================================================
// Bind-relative conversions
// ============================================================================

/// Convert bind-relative offsets to parent space (`bind × key`)
pub fn bone_local_to_parent_space(clip: &mut Clip) {
    let skeleton = clip.skeleton;
    for track in clip.all_bone_tracks_mut() {
        let Some(target) = track.target else {
            continue;
        };
        let bind = *skeleton.get(target).bind();
        for key in &mut track.keys {
            *key = bind * *key;
        }
    }
    clip.reference_frame = ReferenceFrame::ParentBone;
}

/// Express parent-space keys as offsets from the bind pose (`key × inverse bind`)
///
/// This is the additive encoding step; the root track is left untouched since
/// the synthetic root binds to the identity. The result is tagged
/// [`ReferenceFrame::AdditiveOffset`], which differs from the `inverse bind × key`
/// convention of [`ReferenceFrame::BoneLocal`].
pub fn apply_additive(clip: &mut Clip) {
    let skeleton = clip.skeleton;
    for track in &mut clip.bone_tracks {
        let Some(target) = track.target else {
            continue;
        };
        let inverse_bind = *skeleton.get(target).inverse_bind();
        for key in &mut track.keys {
            *key = *key * inverse_bind;
        }
    }
    clip.reference_frame = ReferenceFrame::AdditiveOffset;
}

// ============================================================================
// Key cleanup
// ============================================================================

/// Flip rotations so consecutive keys of a track lie in the same hemisphere
pub fn sanitize_quaternions(clip: &mut Clip) {
    for track in clip.all_bone_tracks_mut() {
        for i in 1..track.keys.len() {
            let previous = track.keys[i - 1].rotation;
            let current = &mut track.keys[i].rotation;
            if previous.dot(*current) < 0.0 {
                *current = -*current;
            }
        }
    }
}

/// Reduce tracks whose keys are all equal to a single key
///
/// Transforms compare within [`crate::math::KEY_EPSILON`]; floats compare exactly.
pub fn collapse_constant_tracks(clip: &mut Clip, frame_count: usize) {
    let mut collapsed = 0;
    for track in clip.all_bone_tracks_mut() {
        let end = track.keys.len().min(frame_count);
        if end > 1 && track.keys[1..end].iter().all(|k| k.approx_eq(&track.keys[0])) {
            track.keys.truncate(1);
            collapsed += 1;
        }
    }
    for track in &mut clip.float_tracks {
        let end = track.keys.len().min(frame_count);
        if end > 1 && track.keys[1..end].iter().all(|&k| k == track.keys[0]) {
            track.keys.truncate(1);
            collapsed += 1;
        }
    }
    debug!("Collapsed {} constant tracks", collapsed);
}

/// Expand single-key bone tracks to one key per frame
pub fn broadcast_constant_tracks(clip: &mut Clip, frame_count: usize) {
    for track in clip.all_bone_tracks_mut() {
        if track.keys.len() == 1 && frame_count > 1 {
            let key = track.keys[0];
            track.keys.resize(frame_count, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{BoneTrack, FloatTrack};
    use crate::skeleton::tests::{bone, humanoid};
    use crate::skeleton::Skeleton;
    use glam::{Quat, Vec3};

    fn assert_close(a: &QsTransform, b: &QsTransform) {
        assert!(
            a.translation.abs_diff_eq(b.translation, 1e-5)
                && a.rotation.abs_diff_eq(b.rotation, 1e-5)
                && a.scale.abs_diff_eq(b.scale, 1e-5),
            "{:?} != {:?}",
            a,
            b
        );
    }

    fn chain() -> Skeleton {
        let up = QsTransform::from_translation(Vec3::Y);
        Skeleton::from_parts(
            "Chain",
            &[
                bone("A", None, QsTransform::IDENTITY),
                bone("B", Some(0), up),
                bone("C", Some(1), up),
            ],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_parent_space_relative_to_parent_object_pose() {
        let skel = chain();
        let mut clip = Clip::new(&skel);
        let a = QsTransform::from_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let c = QsTransform::from_translation(Vec3::new(-2.0, 0.0, 0.0));
        clip.push_bone_track(BoneTrack::new(Some(BoneId::from_index(0)), vec![a]));
        clip.push_bone_track(BoneTrack::new(Some(BoneId::from_index(2)), vec![c]));

        to_parent_space(&mut clip, 1);
        assert_eq!(clip.reference_frame, ReferenceFrame::ParentBone);

        // A sits under the identity root
        assert_close(&clip.bone_tracks[0].keys[0], &a);

        // B is unanimated: object pose = a × bind(B); C is expressed relative to it
        let b_object = a * *skel.bone(1).unwrap().bind();
        assert_close(&clip.bone_tracks[1].keys[0], &(b_object.inverse() * c));
    }

    #[test]
    fn test_parent_object_roundtrip() {
        let skel = humanoid();
        let mut clip = Clip::new(&skel);
        let keys: Vec<Vec<QsTransform>> = (0..4)
            .map(|b| {
                (0..3)
                    .map(|f| {
                        QsTransform::new(
                            Vec3::new(b as f32, f as f32 * 0.5, 1.0),
                            Quat::from_rotation_y(0.3 * f as f32 + 0.1 * b as f32),
                            Vec3::splat(1.0 + 0.1 * f as f32),
                        )
                    })
                    .collect()
            })
            .collect();
        for (b, k) in keys.iter().enumerate() {
            clip.push_bone_track(BoneTrack::new(Some(BoneId::from_index(b)), k.clone()));
        }

        to_parent_space(&mut clip, 3);
        to_object_space(&mut clip, 3);
        assert_eq!(clip.reference_frame, ReferenceFrame::Object);

        for (b, k) in keys.iter().enumerate() {
            for f in 0..3 {
                assert_close(&clip.bone_tracks[b].keys[f], &k[f]);
            }
        }
    }

    #[test]
    fn test_constant_parent_broadcast_under_animated_ancestor() {
        let skel = chain();
        let mut clip = Clip::new(&skel);
        let moving = vec![
            QsTransform::IDENTITY,
            QsTransform::from_translation(Vec3::X),
        ];
        clip.push_bone_track(BoneTrack::new(Some(BoneId::from_index(0)), moving));
        clip.push_bone_track(BoneTrack::new(
            Some(BoneId::from_index(1)),
            vec![QsTransform::from_translation(Vec3::new(0.0, 1.0, 0.0))],
        ));

        to_parent_space(&mut clip, 2);
        let b = &clip.bone_tracks[1].keys;
        assert_eq!(b.len(), 2);
        assert_close(&b[0], &QsTransform::from_translation(Vec3::Y));
        assert_close(&b[1], &QsTransform::from_translation(Vec3::new(-1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_root_track_is_converted_first() {
        let skel = chain();
        let mut clip = Clip::new(&skel);
        let root = QsTransform::from_translation(Vec3::new(0.0, 0.0, 5.0));
        clip.root_transform = Some(BoneTrack::new(Some(BoneId::ROOT), vec![root]));
        clip.push_bone_track(BoneTrack::new(Some(BoneId::from_index(0)), vec![root]));

        to_parent_space(&mut clip, 1);
        assert_close(&clip.root_transform.as_ref().unwrap().keys[0], &root);
        assert_close(&clip.bone_tracks[0].keys[0], &QsTransform::IDENTITY);
    }

    #[test]
    fn test_bone_local_and_additive_are_inverse() {
        let skel = humanoid();
        let mut clip = Clip::new(&skel);
        let offset = QsTransform::from_rotation(Quat::from_rotation_x(0.4));
        clip.push_bone_track(BoneTrack::new(Some(BoneId::from_index(3)), vec![offset]));

        bone_local_to_parent_space(&mut clip);
        let arm_bind = *skel.bone(3).unwrap().bind();
        assert_close(&clip.bone_tracks[0].keys[0], &(arm_bind * offset));

        apply_additive(&mut clip);
        assert_eq!(clip.reference_frame, ReferenceFrame::AdditiveOffset);
        let expected = arm_bind * offset * arm_bind.inverse();
        assert_close(&clip.bone_tracks[0].keys[0], &expected);
    }

    #[test]
    fn test_sanitize_quaternions_keeps_hemisphere() {
        let skel = chain();
        let mut clip = Clip::new(&skel);
        let q = Quat::from_rotation_z(0.2);
        let keys = vec![
            QsTransform::from_rotation(q),
            QsTransform::from_rotation(-q),
            QsTransform::from_rotation(-Quat::from_rotation_z(0.4)),
            QsTransform::from_rotation(Quat::from_rotation_z(0.6)),
        ];
        clip.push_bone_track(BoneTrack::new(Some(BoneId::from_index(0)), keys));
        sanitize_quaternions(&mut clip);

        let keys = &clip.bone_tracks[0].keys;
        for pair in keys.windows(2) {
            assert!(pair[0].rotation.dot(pair[1].rotation) >= 0.0);
        }
        assert_eq!(keys[1].rotation, q);
    }

    #[test]
    fn test_collapse_constant_tracks() {
        let skel = humanoid();
        let mut clip = Clip::new(&skel);
        let k = QsTransform::from_translation(Vec3::X);
        let mut nearly = k;
        nearly.translation.x += 1e-7;
        clip.push_bone_track(BoneTrack::new(Some(BoneId::from_index(0)), vec![k, nearly, k]));
        clip.push_bone_track(BoneTrack::new(
            Some(BoneId::from_index(1)),
            vec![k, k, QsTransform::IDENTITY],
        ));
        clip.push_float_track(FloatTrack::new(Some(0), vec![0.5, 0.5, 0.5]));
        clip.push_float_track(FloatTrack::new(Some(1), vec![0.5, 0.5, 0.500001]));

        collapse_constant_tracks(&mut clip, 3);

        assert_eq!(clip.bone_tracks[0].keys, vec![k]);
        assert_eq!(clip.bone_tracks[1].keys.len(), 3);
        assert_eq!(clip.float_tracks[0].keys, vec![0.5]);
        assert_eq!(clip.float_tracks[1].keys.len(), 3);
    }
}
