//! anim-pack library
//!
//! Process wiring around `anim-common`: skeleton loading, the pack/unpack
//! drivers and batch manifests. The binary is a thin clap front end.

pub mod convert;
pub mod manifest;
pub mod skeletons;

pub use convert::{describe, info, pack, skeleton, unpack, Format, Space};
pub use manifest::{build_all, load_manifest, BuildSummary, Manifest};
pub use skeletons::load_skeletons;

/// Process exit code for a failed run
///
/// Conversion errors report their own code; anything else is 1.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|e| e.downcast_ref::<anim_common::Error>())
        .map_or(1, |e| e.code() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_code_through_context() {
        let err = Err::<(), _>(anim_common::Error::NoFrames)
            .context("Failed to pack walk.json")
            .unwrap_err();
        assert_eq!(exit_code(&err), 2);

        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&err), 1);
    }
}
