use bimap::BiMap;
use std::hash::{BuildHasher, Hash, Hasher};

use crate::base::{AnimError, DeterministicState, SKELETON_MAX_BONES};
use crate::math::KeyData;
use crate::motion::Motion;

///
/// Runtime skeleton description consumed by the animator.
///
/// The animator only needs bone names (to map motion-local bone ordering onto
/// skeleton ordering) and a rest pose (used for bones no layer writes). Bone
/// hierarchy and skinning belong to the renderer.
///
#[derive(Debug, Clone)]
pub struct Skeleton {
    bone_names: BiMap<String, u16>,
    rest_poses: Vec<KeyData>,
    fingerprint: u64,
}

impl Skeleton {
    /// Creates a `Skeleton` with identity rest poses.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Skeleton, AnimError> {
        Skeleton::from_raw(names, vec![KeyData::IDENTITY; names.len()])
    }

    /// Creates a `Skeleton` from bone names and their rest poses.
    pub fn from_raw<S: AsRef<str>>(names: &[S], rest_poses: Vec<KeyData>) -> Result<Skeleton, AnimError> {
        if names.len() > SKELETON_MAX_BONES {
            return Err(AnimError::InvalidSkeleton(format!("{} bones", names.len())));
        }
        if names.len() != rest_poses.len() {
            return Err(AnimError::InvalidSkeleton("rest pose count".into()));
        }

        let mut bone_names = BiMap::with_capacity(names.len());
        let mut hasher = DeterministicState::new().build_hasher();
        for (idx, name) in names.iter().enumerate() {
            let name = name.as_ref();
            if bone_names.contains_left(name) {
                return Err(AnimError::InvalidSkeleton(format!("duplicated bone {}", name)));
            }
            name.hash(&mut hasher);
            bone_names.insert(name.to_string(), idx as u16);
        }

        Ok(Skeleton {
            bone_names,
            rest_poses,
            fingerprint: hasher.finish(),
        })
    }

    /// Gets the number of bones of `Skeleton`.
    #[inline]
    pub fn num_bones(&self) -> usize {
        self.rest_poses.len()
    }

    /// Gets bone's rest poses, in skeleton order.
    #[inline]
    pub fn rest_poses(&self) -> &[KeyData] {
        &self.rest_poses
    }

    /// Gets bone's index by name.
    #[inline]
    pub fn bone_by_name(&self, name: &str) -> Option<u16> {
        self.bone_names.get_by_left(name).copied()
    }

    /// Gets bone's name by index.
    #[inline]
    pub fn bone_name(&self, idx: u16) -> Option<&str> {
        self.bone_names.get_by_right(&idx).map(|name| name.as_str())
    }

    /// A hash of the ordered bone names. Two skeletons with the same
    /// fingerprint share bone remapping tables.
    #[inline]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// Maps a motion's local bone ordering onto a skeleton's ordering.
///
/// Built once per (motion, skeleton) pair. Motion bones missing from the
/// skeleton map to `None` and are skipped while sampling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneRemap {
    targets: Vec<Option<u16>>,
}

impl BoneRemap {
    pub fn new(motion: &Motion, skeleton: &Skeleton) -> BoneRemap {
        let targets = (0..motion.num_bones())
            .map(|idx| motion.bone_name(idx as u16).and_then(|name| skeleton.bone_by_name(name)))
            .collect();
        BoneRemap { targets }
    }

    /// Skeleton index of motion bone `idx`.
    #[inline]
    pub fn target(&self, idx: usize) -> Option<usize> {
        self.targets.get(idx).copied().flatten().map(|t| t as usize)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterates `(motion index, skeleton index)` pairs of mapped bones.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.targets
            .iter()
            .enumerate()
            .filter_map(|(idx, target)| target.map(|t| (idx, t as usize)))
    }
}
