//!
//! Base types, traits and utils.
//!

use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::BuildHasher;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// Animator error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimError {
    /// Block handle is stale or out of range. The graph is corrupted or the
    /// caller kept a handle of a removed block.
    #[error("Invalid block")]
    InvalidBlock,
    /// Layer index out of range.
    #[error("Invalid layer")]
    InvalidLayer,
    /// Motion index out of range.
    #[error("Invalid motion")]
    InvalidMotion,
    /// The root state machine of a layer can't be removed.
    #[error("Root state machine")]
    RootStateMachine,
    /// Block exists but isn't a state machine.
    #[error("Not a state machine")]
    NotStateMachine,

    /// Unknown parameter name.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Parameter name already in use.
    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(String),

    /// Wrap mode not supported by the block.
    #[error("Invalid wrap mode")]
    InvalidWrapMode,
    /// Motion key frames are inconsistent.
    #[error("Invalid motion data: {0}")]
    InvalidMotionData(String),
    /// Skeleton exceeds limits or has duplicated bone names.
    #[error("Invalid skeleton: {0}")]
    InvalidSkeleton(String),
    /// Settings out of range.
    #[error("Invalid settings")]
    InvalidSettings,

    /// Read archive tag error.
    #[error("Invalid tag")]
    InvalidTag,
    /// Read archive version error.
    #[error("Invalid version")]
    InvalidVersion,

    /// No callback registered for an event.
    #[error("Callback not found: {component}::{method}")]
    CallbackNotFound { component: String, method: String },
}

impl AnimError {
    pub fn is_invalid_block(&self) -> bool {
        matches!(self, AnimError::InvalidBlock)
    }

    pub fn is_invalid_layer(&self) -> bool {
        matches!(self, AnimError::InvalidLayer)
    }

    pub fn is_invalid_motion(&self) -> bool {
        matches!(self, AnimError::InvalidMotion)
    }

    pub fn is_root_state_machine(&self) -> bool {
        matches!(self, AnimError::RootStateMachine)
    }

    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, AnimError::InvalidParameter(_))
    }

    pub fn is_invalid_tag(&self) -> bool {
        matches!(self, AnimError::InvalidTag)
    }

    pub fn is_invalid_version(&self) -> bool {
        matches!(self, AnimError::InvalidVersion)
    }

    pub fn is_callback_not_found(&self) -> bool {
        matches!(self, AnimError::CallbackNotFound { .. })
    }
}

/// Defines the maximum number of bones.
/// Avatar masks are sized to this value, and a skeleton with more bones is
/// rejected.
pub const SKELETON_MAX_BONES: usize = 1024;

static_assertions::const_assert!(SKELETON_MAX_BONES <= u16::MAX as usize);

/// Weights below this value don't contribute to a blend.
pub const DEFAULT_WEIGHT_THRESHOLD: f32 = 1e-5;

/// A hasher builder that creates `DefaultHasher` with default keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeterministicState;

impl DeterministicState {
    /// Creates a new `DeterministicState` that builds `DefaultHasher` with default keys.
    pub const fn new() -> DeterministicState {
        DeterministicState
    }
}

impl BuildHasher for DeterministicState {
    type Hasher = DefaultHasher;

    fn build_hasher(&self) -> DefaultHasher {
        DefaultHasher::default()
    }
}

/// Represents a reference to a shared animator resource.
/// `T` usually is `AnimatorController` or `Skeleton`.
///
/// We use `AnimObj` to support `T`, `&T`, `Rc<T>` and `Arc<T>` at same time.
/// Or you can implement this trait to support your own reference type.
pub trait AnimObj<T: Debug> {
    fn obj(&self) -> &T;
}

impl<T: Debug> AnimObj<T> for T {
    #[inline(always)]
    fn obj(&self) -> &T {
        self
    }
}

impl<T: Debug> AnimObj<T> for &T {
    #[inline(always)]
    fn obj(&self) -> &T {
        self
    }
}

impl<T: Debug> AnimObj<T> for Rc<T> {
    #[inline(always)]
    fn obj(&self) -> &T {
        self.as_ref()
    }
}

impl<T: Debug> AnimObj<T> for Arc<T> {
    #[inline(always)]
    fn obj(&self) -> &T {
        self.as_ref()
    }
}
