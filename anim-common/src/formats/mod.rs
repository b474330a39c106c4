//! On-disk formats
//!
//! The compressed container is the runtime side of a conversion, the
//! document is the tool side. Both can be written as JSON; the container
//! also has a compact binary form.

pub mod container;
pub mod document;

pub use container::{
    AnimationContainer, CompressedAnimation, ContainerFormat, SkeletonRecord, StoredBinding,
    CONTAINER_MAGIC, CONTAINER_VERSION,
};
pub use document::{
    BlendMode, ClipNode, Document, DocumentSpace, SkeletonNode, TrackNode, DOCUMENT_VERSION,
};
