//! Annotation-name conventions of paired animations
//!
//! Paired tracks are identified only by their annotation names. The naming is
//! irregular around the quadruped (horse) skeleton, and the rules here must
//! match in both directions for a paired animation to survive a round trip.

use tracing::debug;

use crate::codec::PAIRED_ROOT;
use crate::skeleton::{BoneId, Skeleton, ROOT_BONE_NAME};

/// Prefix marking a track of the secondary actor
pub const SECONDARY_PREFIX: &str = "2_";

/// Root-like bone of the quadruped skeleton
pub const QUADRUPED_ROOT_BONE: &str = "NPC Root [Root]";

/// Suffix naming the secondary root of a quadruped
const QUADRUPED_ROOT_SUFFIX: &str = "Horse";

/// Accessory bone that always belongs to the secondary actor
pub const SADDLE_BONE: &str = "SaddleBone";

/// What a paired track annotation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackTarget {
    /// Not a real track (the paired anchor), or unresolvable
    Unmapped,
    /// Track of actor `clip`; `bone` is `None` when the skeleton lacks it
    Clip { clip: usize, bone: Option<BoneId> },
}

/// Resolve a paired annotation name against the actors' skeletons
///
/// `skeletons` is ordered primary first. A name that reaches a skeleton but
/// misses its bone table still resolves to the clip, with no bone.
pub fn resolve_track_target(name: &str, skeletons: &[&Skeleton]) -> TrackTarget {
    if name == PAIRED_ROOT {
        return TrackTarget::Unmapped;
    }

    let (clip, bone_name) = if let Some(rest) = name.strip_prefix(SECONDARY_PREFIX) {
        let Some(skeleton) = skeletons.get(1) else {
            return TrackTarget::Unmapped;
        };
        if rest.is_empty() {
            // Bare prefix: the secondary root, except on a quadruped
            if !skeleton.is_quadruped() {
                return TrackTarget::Clip {
                    clip: 1,
                    bone: Some(BoneId::ROOT),
                };
            }
            return match skeleton
                .bones()
                .iter()
                .find(|b| b.name() == QUADRUPED_ROOT_BONE)
            {
                Some(bone) => TrackTarget::Clip {
                    clip: 1,
                    bone: Some(bone.id()),
                },
                None => {
                    debug!("Quadruped skeleton '{}' has no root bone", skeleton.name());
                    TrackTarget::Unmapped
                }
            };
        }
        if rest == QUADRUPED_ROOT_SUFFIX {
            return TrackTarget::Clip {
                clip: 1,
                bone: Some(BoneId::ROOT),
            };
        }
        (1, rest)
    } else if name == SADDLE_BONE {
        (1, name)
    } else {
        if name == ROOT_BONE_NAME {
            return TrackTarget::Clip {
                clip: 0,
                bone: Some(BoneId::ROOT),
            };
        }
        (0, name)
    };

    match skeletons.get(clip) {
        Some(skeleton) => TrackTarget::Clip {
            clip,
            bone: skeleton.find_bone(bone_name),
        },
        None => TrackTarget::Unmapped,
    }
}

/// Annotation name of the secondary actor's synthetic root
pub fn secondary_root_name(skeleton: &Skeleton) -> String {
    if skeleton.is_quadruped() {
        format!("{}{}", SECONDARY_PREFIX, QUADRUPED_ROOT_SUFFIX)
    } else {
        SECONDARY_PREFIX.to_string()
    }
}

/// Annotation name of a secondary actor bone
pub fn secondary_bone_name(skeleton: &Skeleton, bone_name: &str) -> String {
    if bone_name == QUADRUPED_ROOT_BONE && skeleton.is_quadruped() {
        SECONDARY_PREFIX.to_string()
    } else {
        format!("{}{}", SECONDARY_PREFIX, bone_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::QsTransform;
    use crate::skeleton::tests::{bone, humanoid};

    fn horse() -> Skeleton {
        Skeleton::from_parts(
            "Horse",
            &[
                bone("HorseBody", None, QsTransform::IDENTITY),
                bone("HorseHead", Some(0), QsTransform::IDENTITY),
                bone("HorseLeg1", Some(0), QsTransform::IDENTITY),
                bone(QUADRUPED_ROOT_BONE, Some(0), QsTransform::IDENTITY),
                bone(SADDLE_BONE, Some(0), QsTransform::IDENTITY),
            ],
            &[],
        )
        .unwrap()
    }

    fn clip(clip: usize, bone: Option<BoneId>) -> TrackTarget {
        TrackTarget::Clip { clip, bone }
    }

    #[test]
    fn test_anchor_is_unmapped() {
        let h = humanoid();
        assert_eq!(resolve_track_target(PAIRED_ROOT, &[&h, &h]), TrackTarget::Unmapped);
    }

    #[test]
    fn test_primary_names() {
        let h = humanoid();
        let skels = [&h, &h];
        assert_eq!(resolve_track_target("NPC", &skels), clip(0, Some(BoneId::ROOT)));
        assert_eq!(
            resolve_track_target("Head", &skels),
            clip(0, Some(BoneId::from_index(2)))
        );
        assert_eq!(resolve_track_target("Tail", &skels), clip(0, None));
    }

    #[test]
    fn test_secondary_names() {
        let h = humanoid();
        let skels = [&h, &h];
        assert_eq!(resolve_track_target("2_", &skels), clip(1, Some(BoneId::ROOT)));
        assert_eq!(
            resolve_track_target("2_Spine", &skels),
            clip(1, Some(BoneId::from_index(1)))
        );
        assert_eq!(resolve_track_target("2_Horse", &skels), clip(1, Some(BoneId::ROOT)));
        assert_eq!(resolve_track_target("2_Nope", &skels), clip(1, None));
        assert_eq!(resolve_track_target("2_Head", &[&h]), TrackTarget::Unmapped);
    }

    #[test]
    fn test_quadruped_bare_prefix_finds_named_root() {
        let h = humanoid();
        let hs = horse();
        let target = resolve_track_target("2_", &[&h, &hs]);
        assert_eq!(target, clip(1, Some(BoneId::from_index(3))));
        assert_ne!(target, clip(1, Some(BoneId::ROOT)));
        assert_ne!(target, clip(1, Some(BoneId::from_index(0))));
    }

    #[test]
    fn test_quadruped_without_named_root() {
        let h = humanoid();
        let hs = Skeleton::from_parts(
            "Pony",
            &[bone("HorsePelvis", None, QsTransform::IDENTITY)],
            &[],
        )
        .unwrap();
        assert_eq!(resolve_track_target("2_", &[&h, &hs]), TrackTarget::Unmapped);
    }

    #[test]
    fn test_saddle_belongs_to_secondary() {
        let h = humanoid();
        let hs = horse();
        assert_eq!(
            resolve_track_target(SADDLE_BONE, &[&h, &hs]),
            clip(1, Some(BoneId::from_index(4)))
        );
    }

    #[test]
    fn test_secondary_names_mirror_resolution() {
        let h = humanoid();
        let hs = horse();
        assert_eq!(secondary_root_name(&h), "2_");
        assert_eq!(secondary_root_name(&hs), "2_Horse");
        assert_eq!(secondary_bone_name(&hs, QUADRUPED_ROOT_BONE), "2_");
        assert_eq!(secondary_bone_name(&hs, "HorseHead"), "2_HorseHead");
        assert_eq!(secondary_bone_name(&h, QUADRUPED_ROOT_BONE), "2_NPC Root [Root]");

        for b in hs.bones() {
            let name = secondary_bone_name(&hs, b.name());
            assert_eq!(
                resolve_track_target(&name, &[&h, &hs]),
                clip(1, Some(b.id()))
            );
        }
        assert_eq!(
            resolve_track_target(&secondary_root_name(&hs), &[&h, &hs]),
            clip(1, Some(BoneId::ROOT))
        );
    }
}
