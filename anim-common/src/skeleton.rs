//! Skeleton model
//!
//! A [`Skeleton`] is an arena of [`Bone`]s plus a flat table of
//! [`FloatParameter`]s. Slot 0 of the arena is a synthetic root bone that
//! parents every top-level bone and anchors paired animations; the source
//! bones follow in their original (topological) order.
//!
//! Skeletons are built once and never mutated afterwards. Clips refer to them
//! by shared reference.

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::math::QsTransform;

/// Reserved name of the synthetic root bone
///
/// This is also the name under which a clip's root track is serialized, and
/// the annotation name of the primary actor's root in paired animations.
pub const ROOT_BONE_NAME: &str = "NPC";

/// Arena slot of a bone within its skeleton
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(u32);

impl BoneId {
    /// The synthetic root bone
    pub const ROOT: BoneId = BoneId(0);

    /// Slot of source bone `index`
    pub const fn from_index(index: usize) -> Self {
        BoneId(index as u32 + 1)
    }

    /// Source bone index, or `None` for the synthetic root
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }

    fn slot(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Bone {
    id: BoneId,
    name: String,
    /// Parent-space bind pose
    bind: QsTransform,
    /// Cached inverse of `bind`
    inverse_bind: QsTransform,
    /// Object-space bind pose (parent's object bind × own bind)
    object_bind: QsTransform,
    parent: Option<BoneId>,
    children: Vec<BoneId>,
}

impl Bone {
    pub fn id(&self) -> BoneId {
        self.id
    }

    /// Position in the source bone table (`None` for the synthetic root)
    pub fn index(&self) -> Option<usize> {
        self.id.index()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bind(&self) -> &QsTransform {
        &self.bind
    }

    pub fn inverse_bind(&self) -> &QsTransform {
        &self.inverse_bind
    }

    pub fn object_bind(&self) -> &QsTransform {
        &self.object_bind
    }

    pub fn parent(&self) -> Option<BoneId> {
        self.parent
    }

    pub fn children(&self) -> &[BoneId] {
        &self.children
    }
}

/// Named scalar channel
#[derive(Debug, Clone, PartialEq)]
pub struct FloatParameter {
    pub index: usize,
    pub name: String,
    /// Value used to fill unauthored frames
    pub reference_value: f32,
}

/// Source description of one bone, as handed to [`Skeleton::from_parts`]
#[derive(Debug, Clone)]
pub struct BoneDef {
    pub name: String,
    /// Index of the parent in the same table, or `None` for a top-level bone
    pub parent: Option<usize>,
    /// Parent-space bind pose
    pub bind: QsTransform,
}

#[derive(Debug, Clone)]
pub struct Skeleton {
    name: String,
    /// Synthetic root at slot 0, then source bones
    bones: Vec<Bone>,
    floats: Vec<FloatParameter>,
    bone_names: HashMap<String, BoneId>,
    float_names: HashMap<String, usize>,
}

impl Skeleton {
    /// Build a skeleton from its bone and float tables
    ///
    /// Bones must be in topological order: a parent always precedes its
    /// children. When names repeat, lookups resolve to the first definition.
    pub fn from_parts(
        name: impl Into<String>,
        bones: &[BoneDef],
        floats: &[(String, f32)],
    ) -> Result<Self> {
        let name = name.into();

        let mut arena = Vec::with_capacity(bones.len() + 1);
        arena.push(Bone {
            id: BoneId::ROOT,
            name: ROOT_BONE_NAME.to_string(),
            bind: QsTransform::IDENTITY,
            inverse_bind: QsTransform::IDENTITY,
            object_bind: QsTransform::IDENTITY,
            parent: None,
            children: Vec::new(),
        });

        for (i, def) in bones.iter().enumerate() {
            let parent = match def.parent {
                Some(p) if p >= i => {
                    return Err(Error::InvalidSkeleton {
                        name,
                        reason: format!(
                            "bone {} '{}' has parent {} (parents must precede children)",
                            i, def.name, p
                        ),
                    });
                }
                Some(p) => BoneId::from_index(p),
                None => BoneId::ROOT,
            };
            let id = BoneId::from_index(i);
            let object_bind = arena[parent.slot()].object_bind * def.bind;
            arena[parent.slot()].children.push(id);
            arena.push(Bone {
                id,
                name: def.name.clone(),
                bind: def.bind,
                inverse_bind: def.bind.inverse(),
                object_bind,
                parent: Some(parent),
                children: Vec::new(),
            });
        }

        let mut bone_names = HashMap::with_capacity(bones.len());
        for bone in &arena[1..] {
            bone_names.entry(bone.name.clone()).or_insert(bone.id);
        }

        let floats: Vec<FloatParameter> = floats
            .iter()
            .enumerate()
            .map(|(index, (name, reference_value))| FloatParameter {
                index,
                name: name.clone(),
                reference_value: *reference_value,
            })
            .collect();

        let mut float_names = HashMap::with_capacity(floats.len());
        for f in &floats {
            float_names.entry(f.name.clone()).or_insert(f.index);
        }

        Ok(Self {
            name,
            bones: arena,
            floats,
            bone_names,
            float_names,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of source bones (the synthetic root is not counted)
    pub fn bone_count(&self) -> usize {
        self.bones.len() - 1
    }

    pub fn float_count(&self) -> usize {
        self.floats.len()
    }

    /// The synthetic root bone
    pub fn root(&self) -> &Bone {
        &self.bones[0]
    }

    /// Source bones in table order
    pub fn bones(&self) -> &[Bone] {
        &self.bones[1..]
    }

    /// Source bone by table index
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index + 1)
    }

    /// Any bone, including the synthetic root, by arena slot
    pub fn get(&self, id: BoneId) -> &Bone {
        &self.bones[id.slot()]
    }

    pub fn floats(&self) -> &[FloatParameter] {
        &self.floats
    }

    pub fn float(&self, index: usize) -> Option<&FloatParameter> {
        self.floats.get(index)
    }

    pub fn find_bone(&self, name: &str) -> Option<BoneId> {
        self.bone_names.get(name).copied()
    }

    pub fn find_float(&self, name: &str) -> Option<usize> {
        self.float_names.get(name).copied()
    }

    /// Does any of the first three bones carry the quadruped prefix?
    ///
    /// Horse skeletons name every bone `Horse*` except `NPC Root [Root]` and
    /// `SaddleBone`, so three bones are enough to tell.
    pub fn is_quadruped(&self) -> bool {
        self.bones()
            .iter()
            .take(3)
            .any(|b| b.name.starts_with(QUADRUPED_PREFIX))
    }
}

/// Name prefix identifying the quadruped (horse) skeleton
pub const QUADRUPED_PREFIX: &str = "Horse";
