mod animator;
mod archive;
mod base;
mod blend_tree;
mod block;
mod controller;
mod event;
mod layer;
mod math;
mod motion;
mod parameter;
mod playback;
mod pose;
mod runtime;
mod settings;
mod skeleton;
mod state;
mod state_machine;
mod transition;

pub use animator::Animator;
pub use archive::{
    BlockRecord, BlockVariant, ControllerArchive, LayerRecord, ParameterRecord, StateMachineRecord, TransitionRecord,
};
pub use base::*;
pub use blend_tree::{BlendChild, BlendTree, BlendType};
pub use block::{Block, BlockId, BlockKind};
pub use controller::AnimatorController;
pub use event::{AnimationEvent, Callback, CallbackTable, EventArg, EventCall, EventDispatcher, EventKind, NullDispatcher};
pub use layer::{AvatarMask, Layer, LayerBlendMode};
pub use math::{quat_abs_diff_eq, quat_div, quat_from_identity, quat_slerp, KeyData};
pub use motion::{FrameSpan, KeyFrame, Motion, MotionId, MotionSlot};
pub use parameter::{Parameter, ParameterTable, ParameterType};
pub use playback::{EventCursor, TimelineEvent, WrapMode};
pub use pose::Pose;
pub use settings::AnimatorSettings;
pub use skeleton::{BoneRemap, Skeleton};
pub use state::{State, TimeStep};
pub use state_machine::{MachinePhase, StateMachine};
pub use transition::{check_transitions, Condition, ConditionMode, InterruptionSource, Transition, TransitionHit};
