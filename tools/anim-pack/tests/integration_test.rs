//! Integration tests for anim-pack
//!
//! Tests the full pipeline: write a document -> skeleton -> pack -> unpack -> verify

use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

use anim_common::formats::{AnimationContainer, Document, TrackNode};
use anim_common::{
    AnimationData, BoneDef, BoneId, BoneTrack, Clip, FloatTrack, QsTransform, ReferenceFrame,
    Skeleton,
};
use glam::{Quat, Vec3};

const FRAMES: usize = 5;

fn test_skeleton() -> Skeleton {
    let bone = |name: &str, parent: Option<usize>, bind: QsTransform| BoneDef {
        name: name.into(),
        parent,
        bind,
    };
    Skeleton::from_parts(
        "Body",
        &[
            bone("Pelvis", None, QsTransform::from_translation(Vec3::Y)),
            bone(
                "Spine",
                Some(0),
                QsTransform::from_translation(Vec3::new(0.0, 0.4, 0.0)),
            ),
            bone(
                "Arm",
                Some(1),
                QsTransform::new(
                    Vec3::new(0.3, 0.2, 0.0),
                    Quat::from_rotation_z(-1.2),
                    Vec3::ONE,
                ),
            ),
        ],
        &[("Blink".to_string(), 0.0)],
    )
    .unwrap()
}

/// Object-space key of `bone` at `frame`
fn authored_key(bone: usize, frame: usize) -> QsTransform {
    let t = frame as f32 / FRAMES as f32;
    QsTransform::new(
        Vec3::new(0.1 * bone as f32 + t, 1.0 + 0.4 * bone as f32, 0.5 * t),
        Quat::from_rotation_y(1.5 * t) * Quat::from_rotation_x(0.3 * bone as f32),
        Vec3::ONE,
    )
}

/// Write a document holding the skeleton and one object-space clip
fn write_document(path: &Path, skeleton: &Skeleton) {
    let mut clip = Clip::new(skeleton);
    clip.reference_frame = ReferenceFrame::Object;
    for bone in 0..skeleton.bone_count() {
        clip.push_bone_track(BoneTrack::new(
            Some(BoneId::from_index(bone)),
            (0..FRAMES).map(|f| authored_key(bone, f)).collect(),
        ));
    }
    clip.push_float_track(FloatTrack::new(
        Some(0),
        (0..FRAMES).map(|f| f as f32 * 0.25).collect(),
    ));
    let mut data = AnimationData::new(FRAMES, false);
    data.clips.push(clip);
    Document::from_animation(&data)
        .write(path)
        .expect("Failed to write document");
}

fn anim_pack(args: &[&Path]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_anim-pack"))
        .args(args)
        .output()
        .expect("Failed to run anim-pack")
}

fn run_ok(args: &[&Path]) {
    let output = anim_pack(args);
    assert!(
        output.status.success(),
        "anim-pack {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Test document -> container -> document through the binary
#[test]
fn test_pack_unpack_roundtrip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let doc_path = dir.path().join("walk.json");
    let skel_path = dir.path().join("body.anpk");
    let anim_path = dir.path().join("walk.anpk");
    let out_path = dir.path().join("walk_out.json");

    write_document(&doc_path, &test_skeleton());

    run_ok(&[Path::new("skeleton"), &doc_path, &skel_path]);
    let container = AnimationContainer::read(&skel_path).expect("Failed to read skeleton");
    assert_eq!(container.skeletons.len(), 1);
    assert_eq!(container.skeletons[0].bones.len(), 3);

    run_ok(&[Path::new("pack"), &doc_path, &anim_path, &skel_path]);
    let container = AnimationContainer::read(&anim_path).expect("Failed to read animation");
    assert_eq!(container.animations.len(), 1);
    assert_eq!(container.animations[0].frame_count as usize, FRAMES);
    assert_eq!(container.animations[0].transform_track_count, 3);
    assert_eq!(container.animations[0].float_track_count, 1);

    run_ok(&[
        Path::new("unpack"),
        &anim_path,
        &out_path,
        &skel_path,
        Path::new("--space"),
        Path::new("object"),
    ]);
    let document = Document::read(&out_path).expect("Failed to read unpacked document");
    assert_eq!(document.frames, FRAMES);
    assert_eq!(document.clips.len(), 1);

    let mut seen = 0;
    for track in &document.clips[0].tracks {
        match track {
            TrackNode::Transform { name, keys } => {
                let bone = ["Pelvis", "Spine", "Arm"]
                    .iter()
                    .position(|n| n == name)
                    .expect("unexpected track");
                assert_eq!(keys.len(), FRAMES);
                for (f, key) in keys.iter().enumerate() {
                    let got = QsTransform::from_array(*key);
                    let want = authored_key(bone, f);
                    assert!(
                        got.translation.abs_diff_eq(want.translation, 0.004),
                        "{} frame {}: {:?} != {:?}",
                        name,
                        f,
                        got.translation,
                        want.translation
                    );
                    assert!(got.scale.abs_diff_eq(want.scale, 0.004));
                    assert!(
                        got.rotation.dot(want.rotation).abs() > 1.0 - 0.001,
                        "{} frame {}: {:?} != {:?}",
                        name,
                        f,
                        got.rotation,
                        want.rotation
                    );
                }
                seen += 1;
            }
            TrackNode::Float { name, keys } => {
                assert_eq!(name, "Blink");
                assert_eq!(keys.len(), FRAMES);
                assert!((keys[4] - 1.0).abs() < 1e-6);
            }
        }
    }
    assert_eq!(seen, 3);
}

/// Test batch build through a manifest with relative paths
#[test]
fn test_build_manifest() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_document(&dir.path().join("walk.json"), &test_skeleton());
    run_ok(&[
        Path::new("skeleton"),
        &dir.path().join("walk.json"),
        &dir.path().join("body.anpk"),
    ]);

    let manifest_path = dir.path().join("anim-pack.toml");
    std::fs::write(
        &manifest_path,
        r#"
[defaults]
skeletons = ["body.anpk"]

[[jobs]]
mode = "pack"
input = "walk.json"
output = "out/walk.anpk"
format = "text"

[[jobs]]
mode = "unpack"
input = "out/walk.anpk"
output = "out/walk.json"
space = "parent"
"#,
    )
    .expect("Failed to write manifest");

    let config = anim_pack::load_manifest(&manifest_path).expect("Failed to load manifest");
    let summary = anim_pack::build_all(&config, dir.path()).expect("Build failed");
    assert_eq!(summary.written, 2);
    assert_eq!(summary.skipped, 0);

    let packed = std::fs::read(dir.path().join("out/walk.anpk")).unwrap();
    assert_eq!(packed.first(), Some(&b'{'), "text container expected");
    let document = Document::read(&dir.path().join("out/walk.json")).unwrap();
    assert_eq!(
        document.clips[0].space,
        anim_common::formats::DocumentSpace::Parent
    );

    // Same manifest through the binary
    run_ok(&[Path::new("build"), &manifest_path]);
}

/// Test that failures map to their exit codes
#[test]
fn test_exit_codes() {
    let dir = tempdir().expect("Failed to create temp dir");
    let doc_path = dir.path().join("walk.json");
    let skel_path = dir.path().join("body.anpk");
    write_document(&doc_path, &test_skeleton());
    run_ok(&[Path::new("skeleton"), &doc_path, &skel_path]);

    // Missing input: read failure
    let output = anim_pack(&[
        Path::new("pack"),
        &dir.path().join("missing.json"),
        &dir.path().join("out.anpk"),
        &skel_path,
    ]);
    assert_eq!(output.status.code(), Some(3));

    // Wrong frame rate: invalid input
    let mut document = Document::read(&doc_path).unwrap();
    document.frame_rate = 24;
    document.write(&doc_path).unwrap();
    let output = anim_pack(&[
        Path::new("pack"),
        &doc_path,
        &dir.path().join("out.anpk"),
        &skel_path,
    ]);
    assert_eq!(output.status.code(), Some(2));

    // Missing skeleton arguments: usage error from clap
    let output = anim_pack(&[Path::new("pack"), &doc_path]);
    assert!(!output.status.success());
}
