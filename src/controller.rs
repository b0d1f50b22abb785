//!
//! Animator controller, the shared definition of an animation graph.
//!

use std::collections::HashSet;
use std::sync::Arc;

use crate::base::{AnimError, DeterministicState};
use crate::blend_tree::BlendTree;
use crate::block::{Block, BlockArena, BlockId, BlockKind};
use crate::event::EventCall;
use crate::layer::Layer;
use crate::motion::{Motion, MotionId, MotionSlot};
use crate::parameter::{Parameter, ParameterTable};
use crate::state::State;
use crate::state_machine::StateMachine;
use crate::transition::Transition;

///
/// The definition of an animation graph: motions, parameters with their
/// default values, blocks and layers.
///
/// A controller is read-only during evaluation and can be shared by many
/// `Animator` instances. Every edit bumps `revision()`, animators pick the
/// changes up on their next evaluation.
///
/// # Example
///
/// ```
/// use animator_rs::*;
///
/// let mut controller = AnimatorController::new();
/// let idle = controller.add_motion("idle");
/// let walk = controller.add_motion("walk");
/// controller.add_parameter("Speed", Parameter::float(0.0)).unwrap();
///
/// let layer = controller.add_layer("Base");
/// let root = controller.layer(layer).unwrap().root_state_machine();
/// let a = controller.add_state(root, "Idle", State::new(Some(idle))).unwrap();
/// let b = controller.add_state(root, "Walk", State::new(Some(walk))).unwrap();
/// controller
///     .add_transition(a, Transition::new(b).with_condition(Condition::new(ConditionMode::Greater, 0.1, "Speed")))
///     .unwrap();
/// assert_eq!(controller.block_index(b), Some(2));
/// ```
///
#[derive(Debug, Clone, Default)]
pub struct AnimatorController {
    pub(crate) motions: Vec<MotionSlot>,
    pub(crate) blocks: BlockArena,
    pub(crate) layers: Vec<Layer>,
    pub(crate) parameters: ParameterTable,
    revision: u64,
}

impl AnimatorController {
    pub fn new() -> AnimatorController {
        AnimatorController::default()
    }

    /// Incremented by every edit.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    //
    // motions
    //

    /// Registers a motion slot, its data is supplied later by `load_motion()`.
    pub fn add_motion(&mut self, name: &str) -> MotionId {
        self.motions.push(MotionSlot::new(name));
        self.touch();
        MotionId((self.motions.len() - 1) as u32)
    }

    /// Supplies (or replaces) the data of a motion slot.
    pub fn load_motion(&mut self, id: MotionId, motion: Arc<Motion>) -> Result<(), AnimError> {
        let slot = self.motions.get_mut(id.index()).ok_or(AnimError::InvalidMotion)?;
        log::debug!("Load motion {} ({}s)", slot.name, motion.length());
        slot.data = Some(motion);
        self.touch();
        Ok(())
    }

    /// Drops the data of a motion slot. Blocks using it stop producing a pose.
    pub fn unload_motion(&mut self, id: MotionId) -> Result<(), AnimError> {
        let slot = self.motions.get_mut(id.index()).ok_or(AnimError::InvalidMotion)?;
        slot.data = None;
        self.touch();
        Ok(())
    }

    #[inline]
    pub fn motion_slot(&self, id: MotionId) -> Option<&MotionSlot> {
        self.motions.get(id.index())
    }

    #[inline]
    pub fn motions(&self) -> &[MotionSlot] {
        &self.motions
    }

    pub fn motion_by_name(&self, name: &str) -> Option<MotionId> {
        self.motions
            .iter()
            .position(|slot| slot.name == name)
            .map(|idx| MotionId(idx as u32))
    }

    fn check_motion(&self, motion: Option<MotionId>) -> Result<(), AnimError> {
        match motion {
            Some(id) if id.index() >= self.motions.len() => Err(AnimError::InvalidMotion),
            _ => Ok(()),
        }
    }

    //
    // parameters
    //

    pub fn add_parameter(&mut self, name: &str, param: Parameter) -> Result<(), AnimError> {
        self.parameters.add(name, param)?;
        self.touch();
        Ok(())
    }

    /// Removes a parameter. Conditions referencing it are kept and evaluate to false.
    pub fn remove_parameter(&mut self, name: &str) -> Result<Parameter, AnimError> {
        let param = self.parameters.remove(name)?;
        self.touch();
        Ok(param)
    }

    /// Parameters with their default values.
    #[inline]
    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    //
    // layers
    //

    /// Adds a layer with an empty root state machine, returns its index.
    /// The first layer is the root layer.
    pub fn add_layer(&mut self, name: &str) -> usize {
        let root = self
            .blocks
            .insert(name, None, BlockKind::StateMachine(StateMachine::new()));
        self.layers.push(Layer::new(name, root));
        self.touch();
        log::debug!("Add layer {} (root {})", name, root);
        self.layers.len() - 1
    }

    #[inline]
    pub fn layer(&self, index: usize) -> Result<&Layer, AnimError> {
        self.layers.get(index).ok_or(AnimError::InvalidLayer)
    }

    pub fn layer_mut(&mut self, index: usize) -> Result<&mut Layer, AnimError> {
        if index >= self.layers.len() {
            return Err(AnimError::InvalidLayer);
        }
        self.touch();
        Ok(&mut self.layers[index])
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Removes a layer with its whole state machine. Layers above it move
    /// down by one, removing layer 0 makes layer 1 the root layer.
    pub fn remove_layer(&mut self, index: usize) -> Result<(), AnimError> {
        let root = self.layer(index)?.root_state_machine;
        let removed = self.subtree(root)?;
        self.remove_blocks(&removed);
        let layer = self.layers.remove(index);
        self.touch();
        log::debug!("Remove layer {} ({} blocks)", layer.name, removed.len());
        Ok(())
    }

    //
    // blocks
    //

    /// Adds a state to the state machine `owner`.
    ///
    /// The first child of a state machine becomes its default entry.
    pub fn add_state(&mut self, owner: BlockId, name: &str, state: State) -> Result<BlockId, AnimError> {
        self.check_motion(state.motion)?;
        self.add_child(owner, name, BlockKind::State(state))
    }

    /// Adds a blend tree to the state machine `owner`.
    pub fn add_blend_tree(&mut self, owner: BlockId, name: &str, tree: BlendTree) -> Result<BlockId, AnimError> {
        if !tree.wrap_mode().is_blend_tree_mode() {
            return Err(AnimError::InvalidWrapMode);
        }
        for child in &tree.children {
            self.check_motion(child.motion)?;
        }
        self.add_child(owner, name, BlockKind::BlendTree(tree))
    }

    /// Adds a nested state machine to the state machine `owner`.
    pub fn add_state_machine(&mut self, owner: BlockId, name: &str) -> Result<BlockId, AnimError> {
        self.add_child(owner, name, BlockKind::StateMachine(StateMachine::new()))
    }

    fn machine_mut(&mut self, id: BlockId) -> Result<&mut StateMachine, AnimError> {
        self.blocks
            .get_mut(id)?
            .as_state_machine_mut()
            .ok_or(AnimError::NotStateMachine)
    }

    fn add_child(&mut self, owner: BlockId, name: &str, kind: BlockKind) -> Result<BlockId, AnimError> {
        if !self.blocks.get(owner)?.is_state_machine() {
            return Err(AnimError::NotStateMachine);
        }
        let type_name = kind.type_name();
        let id = self.blocks.insert(name, Some(owner), kind);
        let machine = self.machine_mut(owner)?;
        machine.children.push(id);
        if machine.entry.is_none() {
            machine.entry = Some(id);
        }
        self.touch();
        log::debug!("Add {} {} ({}) to {}", type_name, name, id, owner);
        Ok(id)
    }

    /// Adds an outgoing transition to `from`. The destination must be a
    /// sibling: another block of the same state machine.
    pub fn add_transition(&mut self, from: BlockId, transition: Transition) -> Result<(), AnimError> {
        let owner = self.blocks.get(from)?.owner.ok_or(AnimError::InvalidBlock)?;
        let dest = self.blocks.get(transition.destination)?;
        if dest.owner != Some(owner) || dest.id == from {
            return Err(AnimError::InvalidBlock);
        }
        self.blocks.get_mut(from)?.transitions.push(transition);
        self.touch();
        Ok(())
    }

    /// Adds an entry transition to `machine`. The destination must be one of
    /// its children, exit time is ignored.
    pub fn add_entry_transition(&mut self, machine: BlockId, mut transition: Transition) -> Result<(), AnimError> {
        let def = self.machine_mut(machine)?;
        if !def.contains(transition.destination) {
            return Err(AnimError::InvalidBlock);
        }
        transition.has_exit_time = false;
        def.entry_transitions.push(transition);
        self.touch();
        Ok(())
    }

    /// Sets the default entry of `machine`, one of its children.
    pub fn set_default_entry(&mut self, machine: BlockId, entry: BlockId) -> Result<(), AnimError> {
        let def = self.machine_mut(machine)?;
        if !def.contains(entry) {
            return Err(AnimError::InvalidBlock);
        }
        def.entry = Some(entry);
        self.touch();
        Ok(())
    }

    /// Sets the calls fired when `id` starts and stops playing.
    pub fn set_callbacks(
        &mut self,
        id: BlockId,
        on_enter: Option<EventCall>,
        on_exit: Option<EventCall>,
    ) -> Result<(), AnimError> {
        let block = self.blocks.get_mut(id)?;
        block.on_enter = on_enter;
        block.on_exit = on_exit;
        self.touch();
        Ok(())
    }

    pub fn state_mut(&mut self, id: BlockId) -> Result<&mut State, AnimError> {
        if !matches!(self.blocks.get(id)?.kind, BlockKind::State(_)) {
            return Err(AnimError::InvalidBlock);
        }
        self.touch();
        match &mut self.blocks.get_mut(id)?.kind {
            BlockKind::State(state) => Ok(state),
            _ => Err(AnimError::InvalidBlock),
        }
    }

    pub fn blend_tree_mut(&mut self, id: BlockId) -> Result<&mut BlendTree, AnimError> {
        if !matches!(self.blocks.get(id)?.kind, BlockKind::BlendTree(_)) {
            return Err(AnimError::InvalidBlock);
        }
        self.touch();
        match &mut self.blocks.get_mut(id)?.kind {
            BlockKind::BlendTree(tree) => Ok(tree),
            _ => Err(AnimError::InvalidBlock),
        }
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> Result<&Block, AnimError> {
        self.blocks.get(id)
    }

    #[inline]
    pub fn contains_block(&self, id: BlockId) -> bool {
        self.blocks.contains(id)
    }

    /// Dense index of `id`: its position among living blocks in creation
    /// order. Removing a block shifts later indices down by one.
    #[inline]
    pub fn block_index(&self, id: BlockId) -> Option<usize> {
        self.blocks.index_of(id)
    }

    /// Block at dense index `index`.
    #[inline]
    pub fn block_at(&self, index: usize) -> Option<BlockId> {
        self.blocks.at(index)
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks in dense index order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> + '_ {
        self.blocks.iter()
    }

    /// Finds a direct child of `machine` by name.
    pub fn find_block(&self, machine: BlockId, name: &str) -> Option<BlockId> {
        let def = self.blocks.find(machine)?.as_state_machine()?;
        def.children
            .iter()
            .copied()
            .find(|child| self.blocks.find(*child).map(|block| block.name == name).unwrap_or(false))
    }

    ///
    /// Removes a block, and recursively the children of a state machine.
    ///
    /// The block leaves its owner's children (and default entry), every
    /// transition toward a removed block is dropped. Layer roots can't be
    /// removed, use `remove_layer()`. The graph is left untouched on error.
    ///
    pub fn remove_block(&mut self, id: BlockId) -> Result<(), AnimError> {
        self.blocks.get(id)?;
        if self.layers.iter().any(|layer| layer.root_state_machine == id) {
            return Err(AnimError::RootStateMachine);
        }
        let removed = self.subtree(id)?;
        self.remove_blocks(&removed);
        self.touch();
        log::debug!("Remove block {} ({} blocks)", id, removed.len());
        Ok(())
    }

    /// `id` and every block it owns, directly or not.
    fn subtree(&self, id: BlockId) -> Result<Vec<BlockId>, AnimError> {
        let mut removed = Vec::new();
        let mut visited: HashSet<BlockId, DeterministicState> = HashSet::with_hasher(DeterministicState::new());
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let block = self.blocks.get(current)?;
            if let Some(machine) = block.as_state_machine() {
                stack.extend(machine.children.iter().copied());
            }
            removed.push(current);
        }
        Ok(removed)
    }

    fn remove_blocks(&mut self, removed: &[BlockId]) {
        for block in self.blocks.iter_mut() {
            if removed.contains(&block.id) {
                continue;
            }
            block
                .transitions
                .retain(|transition| !removed.contains(&transition.destination));
            if let BlockKind::StateMachine(machine) = &mut block.kind {
                machine.children.retain(|child| !removed.contains(child));
                machine
                    .entry_transitions
                    .retain(|transition| !removed.contains(&transition.destination));
                if machine.entry.map(|entry| removed.contains(&entry)).unwrap_or(false) {
                    machine.entry = None;
                }
            }
        }
        for id in removed {
            self.blocks.remove(*id);
        }
    }
}
