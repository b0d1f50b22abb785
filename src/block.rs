//!
//! Graph blocks and the arena storing them.
//!

use std::fmt;

use crate::base::AnimError;
use crate::blend_tree::BlendTree;
use crate::event::EventCall;
use crate::state::State;
use crate::state_machine::StateMachine;
use crate::transition::Transition;

///
/// Stable handle of a block.
///
/// A handle never changes while its block lives. Once the block is removed the
/// slot may be reused, but with another generation, so stale handles are
/// detected instead of silently aliasing a new block.
///
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockId {
    index: u32,
    generation: u32,
}

impl BlockId {
    #[inline]
    pub const fn new(index: u32, generation: u32) -> BlockId {
        BlockId { index, generation }
    }

    /// Arena slot of the block. Not the dense index, see `AnimatorController::block_index()`.
    #[inline]
    pub fn slot(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Block variants.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    State(State),
    BlendTree(BlendTree),
    StateMachine(StateMachine),
}

impl BlockKind {
    /// Name of the variant, for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            BlockKind::State(_) => "State",
            BlockKind::BlendTree(_) => "BlendTree",
            BlockKind::StateMachine(_) => "StateMachine",
        }
    }
}

///
/// A node of the animation graph.
///
/// Every block except layer roots belongs to one state machine, its owner.
/// Outgoing transitions point at siblings (blocks of the same owner).
///
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) name: String,
    pub(crate) owner: Option<BlockId>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) on_enter: Option<EventCall>,
    pub(crate) on_exit: Option<EventCall>,
    pub(crate) kind: BlockKind,
}

impl Block {
    pub(crate) fn new(id: BlockId, name: &str, owner: Option<BlockId>, kind: BlockKind) -> Block {
        Block {
            id,
            name: name.to_string(),
            owner,
            transitions: Vec::new(),
            on_enter: None,
            on_exit: None,
            kind,
        }
    }

    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning state machine, `None` for layer roots.
    #[inline]
    pub fn owner(&self) -> Option<BlockId> {
        self.owner
    }

    /// Outgoing transitions, in priority order.
    #[inline]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[inline]
    pub fn on_enter(&self) -> Option<&EventCall> {
        self.on_enter.as_ref()
    }

    #[inline]
    pub fn on_exit(&self) -> Option<&EventCall> {
        self.on_exit.as_ref()
    }

    #[inline]
    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    pub fn as_state(&self) -> Option<&State> {
        match &self.kind {
            BlockKind::State(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_blend_tree(&self) -> Option<&BlendTree> {
        match &self.kind {
            BlockKind::BlendTree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_state_machine(&self) -> Option<&StateMachine> {
        match &self.kind {
            BlockKind::StateMachine(machine) => Some(machine),
            _ => None,
        }
    }

    pub(crate) fn as_state_machine_mut(&mut self) -> Option<&mut StateMachine> {
        match &mut self.kind {
            BlockKind::StateMachine(machine) => Some(machine),
            _ => None,
        }
    }

    #[inline]
    pub fn is_state_machine(&self) -> bool {
        matches!(self.kind, BlockKind::StateMachine(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Slot {
    generation: u32,
    block: Option<Block>,
}

///
/// Generational arena of blocks.
///
/// Besides the slots, the arena keeps blocks in creation order. The position
/// in that order is the dense index: removing a block shifts every later
/// index down by one, while `BlockId` handles stay untouched.
///
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct BlockArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: Vec<BlockId>,
}

impl BlockArena {
    pub(crate) fn new() -> BlockArena {
        BlockArena::default()
    }

    pub(crate) fn insert(&mut self, name: &str, owner: Option<BlockId>, kind: BlockKind) -> BlockId {
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                BlockId::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot::default());
                BlockId::new((self.slots.len() - 1) as u32, 0)
            }
        };
        self.slots[id.slot()].block = Some(Block::new(id, name, owner, kind));
        self.order.push(id);
        id
    }

    pub(crate) fn remove(&mut self, id: BlockId) -> Option<Block> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.generation != id.generation || slot.block.is_none() {
            return None;
        }
        let block = slot.block.take();
        self.free.push(id.index);
        self.order.retain(|other| *other != id);
        block
    }

    #[inline]
    pub(crate) fn contains(&self, id: BlockId) -> bool {
        self.find(id).is_some()
    }

    #[inline]
    pub(crate) fn find(&self, id: BlockId) -> Option<&Block> {
        self.slots
            .get(id.slot())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.block.as_ref())
    }

    #[inline]
    pub(crate) fn get(&self, id: BlockId) -> Result<&Block, AnimError> {
        self.find(id).ok_or(AnimError::InvalidBlock)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: BlockId) -> Result<&mut Block, AnimError> {
        self.slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.block.as_mut())
            .ok_or(AnimError::InvalidBlock)
    }

    /// Dense index of `id`.
    pub(crate) fn index_of(&self, id: BlockId) -> Option<usize> {
        self.order.iter().position(|other| *other == id)
    }

    /// Block at dense index `index`.
    #[inline]
    pub(crate) fn at(&self, index: usize) -> Option<BlockId> {
        self.order.get(index).copied()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    /// Blocks in dense index order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Block> + '_ {
        self.order.iter().filter_map(|id| self.find(*id))
    }

    pub(crate) fn ids(&self) -> &[BlockId] {
        &self.order
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Block> + '_ {
        self.slots.iter_mut().filter_map(|slot| slot.block.as_mut())
    }
}
