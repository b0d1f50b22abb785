//!
//! Persisted form of an `AnimatorController`.
//!
//! Blocks are stored in dense index order and reference each other by dense
//! index. Loading rebuilds identical indices, child sets and transitions.
//! Motion data isn't part of the archive, only motion slot names.
//!

use std::collections::HashMap;

use crate::base::{AnimError, DeterministicState};
use crate::blend_tree::BlendTree;
use crate::block::{BlockArena, BlockId, BlockKind};
use crate::controller::AnimatorController;
use crate::event::EventCall;
use crate::layer::{AvatarMask, Layer, LayerBlendMode};
use crate::motion::{MotionId, MotionSlot};
use crate::parameter::{Parameter, ParameterTable};
use crate::state::State;
use crate::state_machine::StateMachine;
use crate::transition::{Condition, InterruptionSource, Transition};

/// Version of `TransitionRecord`.
pub const TRANSITION_RECORD_VERSION: u32 = 1;
/// Version of `BlockRecord`.
pub const BLOCK_RECORD_VERSION: u32 = 1;
/// Version of `LayerRecord`.
pub const LAYER_RECORD_VERSION: u32 = 1;
/// Version of `ParameterRecord`.
pub const PARAMETER_RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterRecord {
    pub version: u32,
    pub name: String,
    pub parameter: Parameter,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransitionRecord {
    pub version: u32,
    pub destination: u32,
    pub conditions: Vec<Condition>,
    pub has_exit_time: bool,
    pub exit_time: f32,
    pub duration: f32,
    pub offset: f32,
    pub interruption_source: InterruptionSource,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateMachineRecord {
    pub entry: Option<u32>,
    pub entry_transitions: Vec<TransitionRecord>,
    pub children: Vec<u32>,
}

/// Tagged block variant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockVariant {
    State(State),
    BlendTree(BlendTree),
    StateMachine(StateMachineRecord),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockRecord {
    pub version: u32,
    pub name: String,
    pub owner: Option<u32>,
    pub transitions: Vec<TransitionRecord>,
    pub on_enter: Option<EventCall>,
    pub on_exit: Option<EventCall>,
    pub variant: BlockVariant,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerRecord {
    pub version: u32,
    pub name: String,
    pub mask: AvatarMask,
    pub blend_mode: LayerBlendMode,
    pub weight: f32,
    pub weight_parameter: Option<String>,
    pub root_state_machine: u32,
}

///
/// Persisted animator controller graph.
///
/// Produced by `AnimatorController::to_archive()`, consumed by
/// `AnimatorController::from_archive()`. Serialize it with serde or rkyv.
///
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerArchive {
    pub tag: String,
    pub version: u32,
    pub motions: Vec<String>,
    pub parameters: Vec<ParameterRecord>,
    pub blocks: Vec<BlockRecord>,
    pub layers: Vec<LayerRecord>,
}

impl ControllerArchive {
    /// `ControllerArchive` resource file tag.
    #[inline]
    pub fn tag() -> &'static str {
        "animator-controller"
    }

    /// `ControllerArchive` resource file version.
    #[inline]
    pub fn version() -> u32 {
        1
    }
}

type DenseMap = HashMap<BlockId, u32, DeterministicState>;

fn dense(map: &DenseMap, id: BlockId) -> Result<u32, AnimError> {
    map.get(&id).copied().ok_or(AnimError::InvalidBlock)
}

fn resolve(ids: &[BlockId], index: u32) -> Result<BlockId, AnimError> {
    ids.get(index as usize).copied().ok_or(AnimError::InvalidBlock)
}

impl TransitionRecord {
    fn from_transition(transition: &Transition, map: &DenseMap) -> Result<TransitionRecord, AnimError> {
        Ok(TransitionRecord {
            version: TRANSITION_RECORD_VERSION,
            destination: dense(map, transition.destination)?,
            conditions: transition.conditions.clone(),
            has_exit_time: transition.has_exit_time,
            exit_time: transition.exit_time,
            duration: transition.duration,
            offset: transition.offset,
            interruption_source: transition.interruption_source,
        })
    }

    fn to_transition(&self, ids: &[BlockId]) -> Result<Transition, AnimError> {
        if self.version != TRANSITION_RECORD_VERSION {
            return Err(AnimError::InvalidVersion);
        }
        Ok(Transition {
            destination: resolve(ids, self.destination)?,
            conditions: self.conditions.clone(),
            has_exit_time: self.has_exit_time,
            exit_time: self.exit_time,
            duration: self.duration,
            offset: self.offset,
            interruption_source: self.interruption_source,
        })
    }
}

fn to_transitions(records: &[TransitionRecord], ids: &[BlockId]) -> Result<Vec<Transition>, AnimError> {
    records.iter().map(|record| record.to_transition(ids)).collect()
}

fn from_transitions(transitions: &[Transition], map: &DenseMap) -> Result<Vec<TransitionRecord>, AnimError> {
    transitions
        .iter()
        .map(|transition| TransitionRecord::from_transition(transition, map))
        .collect()
}

impl AnimatorController {
    /// Writes the graph into a `ControllerArchive`.
    pub fn to_archive(&self) -> Result<ControllerArchive, AnimError> {
        let map: DenseMap = self
            .blocks
            .ids()
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index as u32))
            .collect();

        let mut blocks = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.iter() {
            let variant = match &block.kind {
                BlockKind::State(state) => BlockVariant::State(state.clone()),
                BlockKind::BlendTree(tree) => BlockVariant::BlendTree(tree.clone()),
                BlockKind::StateMachine(machine) => BlockVariant::StateMachine(StateMachineRecord {
                    entry: machine.entry.map(|entry| dense(&map, entry)).transpose()?,
                    entry_transitions: from_transitions(&machine.entry_transitions, &map)?,
                    children: machine
                        .children
                        .iter()
                        .map(|child| dense(&map, *child))
                        .collect::<Result<_, _>>()?,
                }),
            };
            blocks.push(BlockRecord {
                version: BLOCK_RECORD_VERSION,
                name: block.name.clone(),
                owner: block.owner.map(|owner| dense(&map, owner)).transpose()?,
                transitions: from_transitions(&block.transitions, &map)?,
                on_enter: block.on_enter.clone(),
                on_exit: block.on_exit.clone(),
                variant,
            });
        }

        let layers = self
            .layers
            .iter()
            .map(|layer| {
                Ok(LayerRecord {
                    version: LAYER_RECORD_VERSION,
                    name: layer.name.clone(),
                    mask: layer.mask.clone(),
                    blend_mode: layer.blend_mode,
                    weight: layer.weight,
                    weight_parameter: layer.weight_parameter.clone(),
                    root_state_machine: dense(&map, layer.root_state_machine)?,
                })
            })
            .collect::<Result<_, AnimError>>()?;

        Ok(ControllerArchive {
            tag: ControllerArchive::tag().to_string(),
            version: ControllerArchive::version(),
            motions: self.motions.iter().map(|slot| slot.name.clone()).collect(),
            parameters: self
                .parameters
                .iter()
                .map(|(name, parameter)| ParameterRecord {
                    version: PARAMETER_RECORD_VERSION,
                    name: name.to_string(),
                    parameter: *parameter,
                })
                .collect(),
            blocks,
            layers,
        })
    }

    ///
    /// Rebuilds a controller from a `ControllerArchive`.
    ///
    /// Fails on a wrong tag or version, and on any dangling or inconsistent
    /// reference. Motion slots come back unloaded.
    ///
    pub fn from_archive(archive: &ControllerArchive) -> Result<AnimatorController, AnimError> {
        if archive.tag != ControllerArchive::tag() {
            return Err(AnimError::InvalidTag);
        }
        if archive.version != ControllerArchive::version() {
            return Err(AnimError::InvalidVersion);
        }

        let motions: Vec<MotionSlot> = archive.motions.iter().map(|name| MotionSlot::new(name)).collect();
        let check_motion = |motion: Option<MotionId>| match motion {
            Some(id) if id.index() >= motions.len() => Err(AnimError::InvalidMotion),
            _ => Ok(()),
        };

        let mut parameters = ParameterTable::new();
        for record in &archive.parameters {
            if record.version != PARAMETER_RECORD_VERSION {
                return Err(AnimError::InvalidVersion);
            }
            parameters.add(&record.name, record.parameter)?;
        }

        // first pass creates blocks, second pass links them
        let mut blocks = BlockArena::new();
        let mut ids = Vec::with_capacity(archive.blocks.len());
        for record in &archive.blocks {
            if record.version != BLOCK_RECORD_VERSION {
                return Err(AnimError::InvalidVersion);
            }
            let kind = match &record.variant {
                BlockVariant::State(state) => {
                    check_motion(state.motion)?;
                    BlockKind::State(state.clone())
                }
                BlockVariant::BlendTree(tree) => {
                    if !tree.wrap_mode().is_blend_tree_mode() {
                        return Err(AnimError::InvalidWrapMode);
                    }
                    for child in &tree.children {
                        check_motion(child.motion)?;
                    }
                    BlockKind::BlendTree(tree.clone())
                }
                BlockVariant::StateMachine(_) => BlockKind::StateMachine(StateMachine::new()),
            };
            ids.push(blocks.insert(&record.name, None, kind));
        }

        for (index, (record, id)) in archive.blocks.iter().zip(ids.iter()).enumerate() {
            let owner = record.owner.map(|owner| resolve(&ids, owner)).transpose()?;
            if let Some(owner_index) = record.owner {
                let is_child = match &archive.blocks[owner_index as usize].variant {
                    BlockVariant::StateMachine(machine) => machine.children.contains(&(index as u32)),
                    _ => false,
                };
                if !is_child {
                    return Err(AnimError::InvalidBlock);
                }
            }
            if let BlockVariant::StateMachine(machine) = &record.variant {
                for child in &machine.children {
                    let child_record = archive.blocks.get(*child as usize).ok_or(AnimError::InvalidBlock)?;
                    if child_record.owner != Some(index as u32) {
                        return Err(AnimError::InvalidBlock);
                    }
                }
            }

            let transitions = to_transitions(&record.transitions, &ids)?;
            for transition in &record.transitions {
                let dest = archive
                    .blocks
                    .get(transition.destination as usize)
                    .ok_or(AnimError::InvalidBlock)?;
                if record.owner.is_none() || dest.owner != record.owner || transition.destination == index as u32 {
                    return Err(AnimError::InvalidBlock);
                }
            }

            let machine = match &record.variant {
                BlockVariant::StateMachine(machine) => Some(StateMachine {
                    entry: machine.entry.map(|entry| resolve(&ids, entry)).transpose()?,
                    entry_transitions: to_transitions(&machine.entry_transitions, &ids)?,
                    children: machine
                        .children
                        .iter()
                        .map(|child| resolve(&ids, *child))
                        .collect::<Result<_, _>>()?,
                }),
                _ => None,
            };
            if let Some(machine) = &machine {
                let entries = machine.entry.iter().chain(
                    machine
                        .entry_transitions
                        .iter()
                        .map(|transition| &transition.destination),
                );
                for entry in entries {
                    if !machine.contains(*entry) {
                        return Err(AnimError::InvalidBlock);
                    }
                }
            }

            let block = blocks.get_mut(*id)?;
            block.owner = owner;
            block.transitions = transitions;
            block.on_enter = record.on_enter.clone();
            block.on_exit = record.on_exit.clone();
            if let (Some(machine), Some(slot)) = (machine, block.as_state_machine_mut()) {
                *slot = machine;
            }
        }

        let mut layers = Vec::with_capacity(archive.layers.len());
        for record in &archive.layers {
            if record.version != LAYER_RECORD_VERSION {
                return Err(AnimError::InvalidVersion);
            }
            let root = resolve(&ids, record.root_state_machine)?;
            let block = blocks.get(root)?;
            if !block.is_state_machine() || block.owner.is_some() {
                return Err(AnimError::InvalidBlock);
            }
            let mut layer = Layer::new(&record.name, root);
            layer.mask = record.mask.clone();
            layer.blend_mode = record.blend_mode;
            layer.weight = record.weight;
            layer.weight_parameter = record.weight_parameter.clone();
            layers.push(layer);
        }

        // every block hangs below exactly one layer root, no ownership cycles
        let mut reached = vec![false; archive.blocks.len()];
        let mut stack: Vec<u32> = archive.layers.iter().map(|layer| layer.root_state_machine).collect();
        while let Some(index) = stack.pop() {
            let seen = reached.get_mut(index as usize).ok_or(AnimError::InvalidBlock)?;
            if *seen {
                return Err(AnimError::InvalidBlock);
            }
            *seen = true;
            if let BlockVariant::StateMachine(machine) = &archive.blocks[index as usize].variant {
                stack.extend(machine.children.iter().copied());
            }
        }
        if reached.contains(&false) {
            return Err(AnimError::InvalidBlock);
        }

        let mut controller = AnimatorController::new();
        controller.motions = motions;
        controller.blocks = blocks;
        controller.layers = layers;
        controller.parameters = parameters;
        Ok(controller)
    }
}
