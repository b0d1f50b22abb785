//!
//! Animator, a per-instance player of a shared `AnimatorController`.
//!

use crate::base::{AnimError, AnimObj};
use crate::block::BlockId;
use crate::controller::AnimatorController;
use crate::event::{AnimationEvent, EventDispatcher};
use crate::layer::LayerBlendMode;
use crate::math::KeyData;
use crate::motion::BoundMotions;
use crate::parameter::ParameterTable;
use crate::pose::Pose;
use crate::runtime::{block_time, BlockRuntime, Evaluator, RuntimeMap};
use crate::settings::AnimatorSettings;
use crate::skeleton::{BoneRemap, Skeleton};
use crate::state_machine::MachinePhase;

///
/// Plays an `AnimatorController` for one skeleton instance.
///
/// The controller is shared and read-only, the animator owns everything that
/// changes while playing: parameter values, play cursors, scratch poses and
/// the output pose. Many animators can share one controller through `&T`,
/// `Rc<T>` or `Arc<T>`.
///
/// Controller edits are picked up on the next call: parameters are aligned
/// with the new definitions, cursors of removed blocks are dropped and state
/// machines playing a removed block restart from their entry.
///
/// # Example
///
/// ```
/// use animator_rs::*;
/// use std::rc::Rc;
///
/// let mut controller = AnimatorController::new();
/// controller.add_parameter("Speed", Parameter::float(0.0)).unwrap();
/// controller.add_layer("Base");
/// let controller = Rc::new(controller);
///
/// let skeleton = Skeleton::from_names(&["root"]).unwrap();
/// let mut animator = Animator::new(controller.clone());
/// animator.set_float("Speed", 1.0);
/// let mut events: Vec<AnimationEvent> = Vec::new();
/// let pose = animator.apply_animation_transform(1.0 / 30.0, &skeleton, &[], &mut events).unwrap();
/// assert_eq!(pose.len(), 1);
/// ```
///
#[derive(Debug)]
pub struct Animator<C: AnimObj<AnimatorController>> {
    controller: C,
    settings: AnimatorSettings,
    params: ParameterTable,
    revision: u64,
    runtimes: RuntimeMap,
    remaps: Vec<Option<BoneRemap>>,
    remap_key: Option<(u64, u64)>,
    layer_pose: Pose,
    scratch: Pose,
    output: Vec<KeyData>,
    events: Vec<AnimationEvent>,
}

impl<C: AnimObj<AnimatorController>> Animator<C> {
    /// Creates an `Animator` with default settings.
    pub fn new(controller: C) -> Animator<C> {
        let params = controller.obj().parameters.clone();
        let revision = controller.obj().revision();
        Animator {
            controller,
            settings: AnimatorSettings::default(),
            params,
            revision,
            runtimes: RuntimeMap::default(),
            remaps: Vec::new(),
            remap_key: None,
            layer_pose: Pose::default(),
            scratch: Pose::default(),
            output: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Creates an `Animator` with `settings`.
    pub fn with_settings(controller: C, settings: AnimatorSettings) -> Result<Animator<C>, AnimError> {
        settings.validate()?;
        let mut animator = Animator::new(controller);
        animator.settings = settings;
        Ok(animator)
    }

    /// Gets controller of `Animator`.
    #[inline]
    pub fn controller(&self) -> &AnimatorController {
        self.controller.obj()
    }

    /// Gets settings of `Animator`.
    #[inline]
    pub fn settings(&self) -> &AnimatorSettings {
        &self.settings
    }

    /// Sets settings of `Animator`.
    pub fn set_settings(&mut self, settings: AnimatorSettings) -> Result<(), AnimError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Forgets every play cursor and restores default parameter values.
    pub fn reset(&mut self) {
        let ctrl = self.controller.obj();
        self.params = ctrl.parameters.clone();
        self.revision = ctrl.revision();
        self.runtimes.clear();
        self.output.clear();
        self.events.clear();
    }

    /// Aligns the instance with the controller after edits.
    fn sync(&mut self) {
        let ctrl = self.controller.obj();
        if self.revision == ctrl.revision() {
            return;
        }
        log::debug!("Controller revision {} -> {}", self.revision, ctrl.revision());
        self.params.sync_with(&ctrl.parameters);
        self.runtimes.retain(|id, _| ctrl.blocks.contains(*id));
        for runtime in self.runtimes.values_mut() {
            if let BlockRuntime::Machine(cursor) = runtime {
                let stale = |id: Option<BlockId>| id.map(|id| !ctrl.blocks.contains(id)).unwrap_or(false);
                if stale(cursor.current) || stale(cursor.next) {
                    cursor.restart();
                }
            }
        }
        self.revision = ctrl.revision();
        self.remap_key = None;
    }

    /// Builds the bone remap of every loaded motion for `skeleton`.
    fn bind(&mut self, skeleton: &Skeleton) {
        let ctrl = self.controller.obj();
        let key = (ctrl.revision(), skeleton.fingerprint());
        if self.remap_key == Some(key) {
            return;
        }
        self.remaps.clear();
        self.remaps.extend(
            ctrl.motions
                .iter()
                .map(|slot| slot.data.as_ref().map(|motion| BoneRemap::new(motion, skeleton))),
        );
        self.remap_key = Some(key);
    }

    ///
    /// Evaluates every layer for `elapsed` seconds and returns the resulting
    /// pose, one `KeyData` per skeleton bone.
    ///
    /// * `enabled_bones` - Bones layers may write, empty to allow every bone.
    /// * `dispatcher` - Receives the enter, exit and timeline events of this
    ///   evaluation, in emission order. Dispatch failures are logged.
    ///
    /// Layers whose state machine has nothing to play leave the pose
    /// untouched. Errors are only returned for a corrupted graph or a
    /// skeleton exceeding `max_bones`.
    ///
    pub fn apply_animation_transform<D: EventDispatcher>(
        &mut self,
        elapsed: f32,
        skeleton: &Skeleton,
        enabled_bones: &[bool],
        dispatcher: &mut D,
    ) -> Result<&[KeyData], AnimError> {
        let num_bones = skeleton.num_bones();
        if num_bones > self.settings.max_bones {
            return Err(AnimError::InvalidSkeleton(format!("{} bones", num_bones)));
        }
        let elapsed = if elapsed.is_finite() {
            elapsed
        } else {
            log::warn!("Non-finite elapsed time {}, evaluating as 0", elapsed);
            0.0
        };
        self.sync();
        self.bind(skeleton);

        if self.settings.reset_to_rest_pose || self.output.len() != num_bones {
            self.output.clear();
            self.output.extend_from_slice(skeleton.rest_poses());
        }
        self.events.clear();

        let ctrl = self.controller.obj();
        let motions = BoundMotions::new(&ctrl.motions, &self.remaps);
        for (index, layer) in ctrl.layers.iter().enumerate() {
            let root = index == 0;
            let root_machine = layer.root_state_machine;
            let mut ev = Evaluator {
                blocks: &ctrl.blocks,
                motions,
                params: &mut self.params,
                settings: &self.settings,
                runtimes: &mut self.runtimes,
                events: &mut self.events,
                scratch: &mut self.scratch,
                layer: index,
                additive: !root && layer.blend_mode == LayerBlendMode::Additive,
                num_bones,
            };
            ev.advance(root_machine, elapsed)?;
            if !ev.sample(root_machine, &mut self.layer_pose)? {
                log::trace!("Layer {} produced no pose", layer.name);
                continue;
            }

            let weight = if root {
                1.0
            } else {
                layer.effective_weight(&self.params)
            };
            layer.compose(
                root,
                &self.layer_pose,
                weight,
                self.settings.weight_threshold,
                enabled_bones,
                &mut self.output,
            );
        }

        for event in &self.events {
            if let Err(err) = dispatcher.dispatch(event) {
                log::warn!("Dispatch {} failed: {}", event, err);
            }
        }
        Ok(self.output.as_slice())
    }

    /// Output of the last evaluation.
    #[inline]
    pub fn output(&self) -> &[KeyData] {
        &self.output
    }

    /// Events emitted by the last evaluation.
    #[inline]
    pub fn events(&self) -> &[AnimationEvent] {
        &self.events
    }

    //
    // parameters
    //

    /// Parameter values of this instance.
    #[inline]
    pub fn parameters(&self) -> &ParameterTable {
        &self.params
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.sync();
        self.params.set_bool(name, value);
    }

    pub fn set_integer(&mut self, name: &str, value: i32) {
        self.sync();
        self.params.set_integer(name, value);
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.sync();
        self.params.set_float(name, value);
    }

    pub fn set_trigger(&mut self, name: &str) {
        self.sync();
        self.params.set_trigger(name);
    }

    pub fn reset_trigger(&mut self, name: &str) {
        self.sync();
        self.params.reset_trigger(name);
    }

    #[inline]
    pub fn get_bool(&self, name: &str) -> bool {
        self.params.get_bool(name)
    }

    #[inline]
    pub fn get_integer(&self, name: &str) -> i32 {
        self.params.get_integer(name)
    }

    #[inline]
    pub fn get_float(&self, name: &str) -> f32 {
        self.params.get_float(name)
    }

    //
    // introspection
    //

    fn machine_root(&self, layer: usize) -> Option<BlockId> {
        self.controller
            .obj()
            .layers
            .get(layer)
            .map(|layer| layer.root_state_machine)
    }

    /// Block played by the state machine `machine`.
    pub fn active_block(&self, machine: BlockId) -> Option<BlockId> {
        match self.runtimes.get(&machine) {
            Some(BlockRuntime::Machine(cursor)) => cursor.current,
            _ => None,
        }
    }

    /// Block the state machine `machine` transitions to, if transitioning.
    pub fn incoming_block(&self, machine: BlockId) -> Option<BlockId> {
        match self.runtimes.get(&machine) {
            Some(BlockRuntime::Machine(cursor)) => cursor.next,
            _ => None,
        }
    }

    /// Current block of the root state machine of `layer`.
    pub fn current_block(&self, layer: usize) -> Option<BlockId> {
        self.active_block(self.machine_root(layer)?)
    }

    /// Next block of the root state machine of `layer`, if transitioning.
    pub fn next_block(&self, layer: usize) -> Option<BlockId> {
        self.incoming_block(self.machine_root(layer)?)
    }

    /// Phase of the root state machine of `layer`.
    pub fn phase(&self, layer: usize) -> MachinePhase {
        let root = match self.machine_root(layer) {
            Some(root) => root,
            None => return MachinePhase::Entry,
        };
        match self.runtimes.get(&root) {
            Some(BlockRuntime::Machine(cursor)) => cursor.phase,
            _ => MachinePhase::Entry,
        }
    }

    /// Transition progress of the root state machine of `layer`, in `[0, 1]`.
    /// 0 when not transitioning.
    pub fn transition_progress(&self, layer: usize) -> f32 {
        let root = match self.machine_root(layer) {
            Some(root) => root,
            None => return 0.0,
        };
        match self.runtimes.get(&root) {
            Some(BlockRuntime::Machine(cursor)) if cursor.phase.is_transitioning() && cursor.duration_start > 0.0 => {
                (1.0 - cursor.duration_timer / cursor.duration_start).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Normalized time of the current block of `layer`.
    pub fn normalized_time(&self, layer: usize) -> f32 {
        match self.machine_root(layer) {
            Some(root) => block_time(&self.runtimes, root),
            None => 0.0,
        }
    }

    /// Normalized time of block `id`, 0 if it never played.
    #[inline]
    pub fn block_time(&self, id: BlockId) -> f32 {
        block_time(&self.runtimes, id)
    }

    /// Child weights of the blend tree `id`, computed by the last evaluation.
    pub fn blend_weights(&self, id: BlockId) -> Option<&[f32]> {
        match self.runtimes.get(&id) {
            Some(BlockRuntime::Clip(cursor)) => Some(cursor.weights.as_slice()),
            _ => None,
        }
    }
}

impl Animator<AnimatorController> {
    /// Mutable access to an owned controller. Edits are picked up by the next
    /// evaluation.
    #[inline]
    pub fn controller_mut(&mut self) -> &mut AnimatorController {
        &mut self.controller
    }
}
