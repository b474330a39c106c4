//! Track resolver
//!
//! Maps between named skeleton entities and numeric compressed tracks, in
//! both directions, for single-actor and paired animations.

mod names;
mod pack;
mod unpack;

pub use names::{
    resolve_track_target, secondary_bone_name, secondary_root_name, TrackTarget,
    QUADRUPED_ROOT_BONE, SADDLE_BONE, SECONDARY_PREFIX,
};
pub use pack::{pack_layout, OutputTrack, PackLayout};
pub use unpack::{unpack_layout, FloatSlot, TrackSlot, UnpackLayout};
