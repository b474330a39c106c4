//! Tool-facing animation document (JSON)
//!
//! The document addresses everything by name: skeletons carry a bone tree
//! with object-space reference poses, clips carry named tracks. Transform
//! keys are `[tx, ty, tz, rw, rx, ry, rz, sx, sy, sz]`.
//!
//! Clips bind to skeletons by position rather than by name, since shipped
//! skeletons often share a name.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::animation::{AnimationData, Annotation, BoneTrack, Clip, FloatTrack, ReferenceFrame};
use crate::error::{Error, Result};
use crate::math::QsTransform;
use crate::skeleton::{Bone, BoneDef, BoneId, Skeleton, ROOT_BONE_NAME};

/// Current document format version
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
}

/// Key space of a document clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSpace {
    #[default]
    Object,
    #[serde(rename = "bone")]
    BoneLocal,
    Parent,
    /// Keys already encoded as additive offsets
    Additive,
}

impl DocumentSpace {
    fn reference_frame(self) -> ReferenceFrame {
        match self {
            DocumentSpace::Object => ReferenceFrame::Object,
            DocumentSpace::BoneLocal => ReferenceFrame::BoneLocal,
            DocumentSpace::Parent => ReferenceFrame::ParentBone,
            DocumentSpace::Additive => ReferenceFrame::AdditiveOffset,
        }
    }

    fn from_reference_frame(frame: ReferenceFrame) -> Self {
        match frame {
            ReferenceFrame::Undefined | ReferenceFrame::Object => DocumentSpace::Object,
            ReferenceFrame::BoneLocal => DocumentSpace::BoneLocal,
            ReferenceFrame::ParentBone => DocumentSpace::Parent,
            ReferenceFrame::AdditiveOffset => DocumentSpace::Additive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoneNode {
    pub name: String,
    /// Object-space reference pose
    pub ref_pose: [f32; 10],
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BoneNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatNode {
    pub name: String,
    pub ref_value: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonNode {
    pub name: String,
    pub bones: Vec<BoneNode>,
    #[serde(default)]
    pub floats: Vec<FloatNode>,
}

impl SkeletonNode {
    pub fn from_skeleton(skeleton: &Skeleton) -> Self {
        fn node(skeleton: &Skeleton, bone: &Bone) -> BoneNode {
            BoneNode {
                name: bone.name().to_string(),
                ref_pose: bone.object_bind().to_array(),
                children: bone
                    .children()
                    .iter()
                    .map(|&c| node(skeleton, skeleton.get(c)))
                    .collect(),
            }
        }

        Self {
            name: skeleton.name().to_string(),
            bones: skeleton
                .root()
                .children()
                .iter()
                .map(|&c| node(skeleton, skeleton.get(c)))
                .collect(),
            floats: skeleton
                .floats()
                .iter()
                .map(|f| FloatNode {
                    name: f.name.clone(),
                    ref_value: f.reference_value,
                })
                .collect(),
        }
    }

    /// Flatten the bone tree depth-first, converting reference poses to
    /// parent space
    pub fn to_skeleton(&self) -> Result<Skeleton> {
        fn flatten(
            node: &BoneNode,
            parent: Option<(usize, QsTransform)>,
            bones: &mut Vec<BoneDef>,
        ) {
            let object = QsTransform::from_array(node.ref_pose);
            let bind = match parent {
                Some((_, parent_object)) => parent_object.inverse() * object,
                None => object,
            };
            let index = bones.len();
            bones.push(BoneDef {
                name: node.name.clone(),
                parent: parent.map(|(p, _)| p),
                bind,
            });
            for child in &node.children {
                flatten(child, Some((index, object)), bones);
            }
        }

        let mut bones = Vec::new();
        for node in &self.bones {
            flatten(node, None, &mut bones);
        }
        let floats: Vec<(String, f32)> = self
            .floats
            .iter()
            .map(|f| (f.name.clone(), f.ref_value))
            .collect();
        Skeleton::from_parts(self.name.clone(), &bones, &floats)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TrackNode {
    Transform { name: String, keys: Vec<[f32; 10]> },
    Float { name: String, keys: Vec<f32> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationNode {
    pub frame: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipNode {
    pub name: String,
    /// Informational; binding is positional
    pub skeleton: String,
    #[serde(default)]
    pub space: DocumentSpace,
    #[serde(default)]
    pub tracks: Vec<TrackNode>,
    #[serde(default)]
    pub annotations: Vec<AnnotationNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub version: u32,
    pub frames: usize,
    pub frame_rate: i32,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default)]
    pub skeletons: Vec<SkeletonNode>,
    #[serde(default)]
    pub clips: Vec<ClipNode>,
}

impl Document {
    /// Describe `data`, emitting each distinct skeleton once
    pub fn from_animation(data: &AnimationData<'_>) -> Self {
        let mut seen: Vec<&Skeleton> = Vec::new();
        for clip in &data.clips {
            if !seen.iter().any(|s| std::ptr::eq(*s, clip.skeleton)) {
                seen.push(clip.skeleton);
            }
        }

        Self {
            version: DOCUMENT_VERSION,
            frames: data.frame_count,
            frame_rate: data.frame_rate,
            blend_mode: if data.additive {
                BlendMode::Additive
            } else {
                BlendMode::Normal
            },
            skeletons: seen.iter().map(|s| SkeletonNode::from_skeleton(s)).collect(),
            clips: data
                .clips
                .iter()
                .enumerate()
                .map(|(i, clip)| clip_node(i, clip))
                .collect(),
        }
    }

    /// Skeletons described by the document itself
    pub fn skeletons(&self) -> Result<Vec<Skeleton>> {
        self.skeletons.iter().map(SkeletonNode::to_skeleton).collect()
    }

    /// Build animation data over `skeletons`
    ///
    /// Clip 0 binds to the first skeleton, every later clip to the last one.
    pub fn to_animation<'s>(&self, skeletons: &[&'s Skeleton]) -> Result<AnimationData<'s>> {
        let (Some(&first), Some(&last)) = (skeletons.first(), skeletons.last()) else {
            return Err(Error::InvalidArgs("no skeleton to bind clips to".into()));
        };

        let mut data = AnimationData::new(self.frames, self.blend_mode == BlendMode::Additive);
        data.frame_rate = self.frame_rate;
        for (i, node) in self.clips.iter().enumerate() {
            let skeleton = if i == 0 { first } else { last };
            if skeleton.name() != node.skeleton {
                debug!(
                    "Clip '{}' names skeleton '{}', binding to '{}'",
                    node.name,
                    node.skeleton,
                    skeleton.name()
                );
            }
            data.clips.push(read_clip(node, skeleton));
        }
        Ok(data)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidInput(e.to_string()))
    }

    /// Parse a document; `origin` names the source in errors
    pub fn from_slice(bytes: &[u8], origin: &str) -> Result<Self> {
        let document: Document =
            serde_json::from_slice(bytes).map_err(|e| Error::read(origin, e))?;
        if document.version != DOCUMENT_VERSION {
            return Err(Error::UnsupportedVersion {
                format: "document",
                version: document.version,
            });
        }
        Ok(document)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| Error::read(origin.as_str(), e))?;
        Self::from_slice(&bytes, &origin)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let origin = path.display().to_string();
        let json = self.to_json().map_err(|e| Error::write(origin.as_str(), e))?;
        std::fs::write(path, json).map_err(|e| Error::write(origin, e))
    }
}

fn read_clip<'s>(node: &ClipNode, skeleton: &'s Skeleton) -> Clip<'s> {
    let mut clip = Clip::new(skeleton);
    clip.reference_frame = node.space.reference_frame();

    for track in &node.tracks {
        match track {
            TrackNode::Transform { name, keys } => {
                let keys = keys.iter().copied().map(QsTransform::from_array).collect();
                if name == ROOT_BONE_NAME {
                    if clip.root_transform.is_some() {
                        warn!("Clip '{}' has a second root track, ignored", node.name);
                        continue;
                    }
                    clip.root_transform = Some(BoneTrack::new(Some(BoneId::ROOT), keys));
                    continue;
                }
                match skeleton.find_bone(name) {
                    Some(id) => clip.push_bone_track(BoneTrack::new(Some(id), keys)),
                    None => warn!(
                        "Skipping track '{}': no such bone in '{}'",
                        name,
                        skeleton.name()
                    ),
                }
            }
            TrackNode::Float { name, keys } => match skeleton.find_float(name) {
                Some(index) => clip.push_float_track(FloatTrack::new(Some(index), keys.clone())),
                None => warn!(
                    "Skipping float track '{}': no such float in '{}'",
                    name,
                    skeleton.name()
                ),
            },
        }
    }

    clip.annotations = node
        .annotations
        .iter()
        .map(|a| Annotation {
            frame: a.frame,
            text: a.text.clone(),
        })
        .collect();
    clip
}

fn clip_node(index: usize, clip: &Clip<'_>) -> ClipNode {
    let skeleton = clip.skeleton;
    let mut tracks = Vec::with_capacity(clip.bone_tracks.len() + clip.float_tracks.len() + 1);

    for track in clip.all_bone_tracks() {
        let Some(id) = track.target else {
            debug!("Dropping unmapped track of clip {}", index);
            continue;
        };
        tracks.push(TrackNode::Transform {
            name: skeleton.get(id).name().to_string(),
            keys: track.keys.iter().map(QsTransform::to_array).collect(),
        });
    }
    for track in &clip.float_tracks {
        let Some(float) = track.target.and_then(|i| skeleton.float(i)) else {
            debug!("Dropping unmapped float track of clip {}", index);
            continue;
        };
        tracks.push(TrackNode::Float {
            name: float.name.clone(),
            keys: track.keys.clone(),
        });
    }

    ClipNode {
        name: index.to_string(),
        skeleton: skeleton.name().to_string(),
        space: DocumentSpace::from_reference_frame(clip.reference_frame),
        tracks,
        annotations: clip
            .annotations
            .iter()
            .map(|a| AnnotationNode {
                frame: a.frame,
                text: a.text.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::skeleton::tests::humanoid;
    use glam::{Quat, Vec3};

    const EXAMPLE: &str = r#"{
        "version": 1,
        "frames": 2,
        "frameRate": 30,
        "skeletons": [],
        "clips": [{
            "name": "0",
            "skeleton": "Humanoid",
            "tracks": [
                { "type": "transform", "name": "Spine",
                  "keys": [[0, 1, 0, 1, 0, 0, 0, 1, 1, 1], [0, 2, 0, 1, 0, 0, 0, 1, 1, 1]] },
                { "type": "transform", "name": "Tail", "keys": [[0, 0, 0, 1, 0, 0, 0, 1, 1, 1]] },
                { "type": "transform", "name": "NPC", "keys": [[5, 0, 0, 1, 0, 0, 0, 1, 1, 1]] },
                { "type": "float", "name": "Jaw", "keys": [0.5] }
            ],
            "annotations": [{ "frame": 1, "text": "Hit" }]
        }]
    }"#;

    #[test]
    fn test_read_binds_tracks_by_name() {
        let skel = humanoid();
        let doc = Document::from_slice(EXAMPLE.as_bytes(), "example").unwrap();
        let data = doc.to_animation(&[&skel]).unwrap();

        assert_eq!(data.frame_count, 2);
        assert!(!data.additive);
        let clip = &data.clips[0];
        assert_eq!(clip.reference_frame, ReferenceFrame::Object);
        // "Tail" has no bone and is skipped
        assert_eq!(clip.bone_tracks.len(), 1);
        let spine = clip.track_for_bone(1).unwrap();
        assert_eq!(spine.keys[1].translation, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(
            clip.root_transform.as_ref().unwrap().keys[0].translation,
            Vec3::new(5.0, 0.0, 0.0)
        );
        assert_eq!(clip.track_for_float(1).unwrap().keys, vec![0.5]);
        assert_eq!(
            clip.annotations,
            vec![Annotation {
                frame: 1,
                text: "Hit".into()
            }]
        );
    }

    #[test]
    fn test_second_clip_binds_to_last_skeleton() {
        let a = humanoid();
        let b = humanoid();
        let mut doc = Document::from_slice(EXAMPLE.as_bytes(), "example").unwrap();
        doc.clips.push(doc.clips[0].clone());
        let data = doc.to_animation(&[&a, &b]).unwrap();
        assert!(std::ptr::eq(data.clips[0].skeleton, &a));
        assert!(std::ptr::eq(data.clips[1].skeleton, &b));

        assert!(matches!(doc.to_animation(&[]), Err(Error::InvalidArgs(_))));
    }

    #[test]
    fn test_version_and_syntax_errors() {
        let err = Document::from_slice(
            br#"{"version": 2, "frames": 1, "frameRate": 30}"#,
            "doc",
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);

        let err = Document::from_slice(b"{ not json", "doc").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ReadFail);
    }

    #[test]
    fn test_skeleton_tree_roundtrip() {
        let skel = humanoid();
        let node = SkeletonNode::from_skeleton(&skel);
        assert_eq!(node.bones.len(), 1);
        assert_eq!(node.bones[0].name, "Root");
        assert_eq!(node.bones[0].children[0].children.len(), 2);

        let rebuilt = node.to_skeleton().unwrap();
        assert_eq!(rebuilt.bone_count(), skel.bone_count());
        for (a, b) in rebuilt.bones().iter().zip(skel.bones()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.parent(), b.parent());
            assert!(a.bind().translation.abs_diff_eq(b.bind().translation, 1e-5));
            assert!(a.bind().rotation.abs_diff_eq(b.bind().rotation, 1e-5));
        }
        assert_eq!(rebuilt.find_float("Jaw"), Some(1));
    }

    #[test]
    fn test_write_then_read() {
        let skel = humanoid();
        let mut clip = Clip::new(&skel);
        clip.reference_frame = ReferenceFrame::ParentBone;
        clip.root_transform = Some(BoneTrack::new(
            Some(BoneId::ROOT),
            vec![QsTransform::from_translation(Vec3::X)],
        ));
        clip.push_bone_track(BoneTrack::new(
            Some(BoneId::from_index(3)),
            vec![QsTransform::from_rotation(Quat::from_rotation_y(0.5)); 3],
        ));
        clip.annotations.push(Annotation {
            frame: 2,
            text: "End".into(),
        });
        let mut data = AnimationData::new(3, true);
        data.clips.push(clip);

        let doc = Document::from_animation(&data);
        assert_eq!(doc.blend_mode, BlendMode::Additive);
        assert_eq!(doc.skeletons.len(), 1);
        assert_eq!(doc.clips[0].space, DocumentSpace::Parent);
        let TrackNode::Transform { name, .. } = &doc.clips[0].tracks[0] else {
            panic!("root track should come first");
        };
        assert_eq!(name, ROOT_BONE_NAME);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.json");
        doc.write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"blendMode\": \"ADDITIVE\""));
        assert!(text.contains("\"space\": \"parent\""));

        let back = Document::read(&path).unwrap();
        assert_eq!(back, doc);
        let skeletons = back.skeletons().unwrap();
        let data = back.to_animation(&[&skeletons[0]]).unwrap();
        let clip = &data.clips[0];
        assert!(data.additive);
        assert_eq!(clip.reference_frame, ReferenceFrame::ParentBone);
        assert!(clip.root_transform.is_some());
        assert_eq!(clip.track_for_bone(3).unwrap().keys.len(), 3);
        assert_eq!(clip.annotations[0].text, "End");
    }

    #[test]
    fn test_assembled_additive_clip_keeps_its_space() {
        let skel = humanoid();
        let mut clip = Clip::new(&skel);
        clip.reference_frame = ReferenceFrame::ParentBone;
        clip.push_bone_track(BoneTrack::new(
            Some(BoneId::from_index(3)),
            vec![QsTransform::from_rotation(Quat::from_rotation_x(0.3))],
        ));
        let mut data = AnimationData::new(1, true);
        data.clips.push(clip);
        let first = crate::assemble(&mut data).unwrap().unwrap();

        let doc = Document::from_animation(&data);
        assert_eq!(doc.clips[0].space, DocumentSpace::Additive);
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"space\": \"additive\""));

        let back = Document::from_slice(json.as_bytes(), "doc").unwrap();
        let mut reread = back.to_animation(&[&skel]).unwrap();
        assert_eq!(reread.clips[0].reference_frame, ReferenceFrame::AdditiveOffset);
        let second = crate::assemble(&mut reread).unwrap().unwrap();
        assert_eq!(second.transforms, first.transforms);
    }
}
