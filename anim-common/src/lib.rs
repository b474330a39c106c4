//! Core of the animation converter
//!
//! Converts character animations between the runtime's compressed,
//! index-addressed tracks and a tool-editable document addressed by bone
//! and float names.
//!
//! # Modules
//!
//! - [`skeleton`] - Bone arena and float parameter tables
//! - [`math`] - QS transforms and quaternion helpers
//! - [`animation`] - Named per-clip tracks
//! - [`pose`] - Object/parent/bone-local space conversions
//! - [`tracks`] - Track layout and paired-name resolution
//! - [`assembler`] - Clips → pose buffer, sampled animation → clips
//! - [`codec`] - Boundary types shared with the compressed format
//! - [`formats`] - Container and document files

pub mod animation;
pub mod assembler;
pub mod codec;
pub mod error;
pub mod formats;
pub mod math;
pub mod pose;
pub mod skeleton;
pub mod tracks;

pub use animation::{
    AnimationData, Annotation, BoneTrack, Clip, FloatTrack, ReferenceFrame, FRAME_RATE,
};
pub use assembler::{assemble, disassemble, KeySpace};
pub use codec::{
    AnimationBinding, AnnotationTrack, AssembledAnimation, BlendHint, SampledAnimation,
};
pub use error::{Error, ErrorCode, Result};
pub use math::QsTransform;
pub use skeleton::{Bone, BoneDef, BoneId, Skeleton};
