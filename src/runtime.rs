//!
//! Per-instance play cursors, and the evaluator driving blocks through them.
//!

use std::collections::HashMap;

use crate::base::{AnimError, DeterministicState};
use crate::block::{BlockArena, BlockId, BlockKind};
use crate::event::{AnimationEvent, EventCall, EventKind};
use crate::motion::BoundMotions;
use crate::parameter::ParameterTable;
use crate::playback::EventCursor;
use crate::pose::Pose;
use crate::settings::AnimatorSettings;
use crate::state::TimeStep;
use crate::state_machine::MachineCursor;

/// Play cursor of a state or a blend tree.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct ClipCursor {
    pub(crate) time: f32,
    pub(crate) events: EventCursor,
    pub(crate) weights: Vec<f32>,
}

#[derive(Debug, Clone)]
pub(crate) enum BlockRuntime {
    Clip(ClipCursor),
    Machine(Box<MachineCursor>),
}

pub(crate) type RuntimeMap = HashMap<BlockId, BlockRuntime, DeterministicState>;

/// Normalized time of a block, 0 for blocks that never played.
///
/// A state machine reports the time of its current block.
pub(crate) fn block_time(runtimes: &RuntimeMap, id: BlockId) -> f32 {
    match runtimes.get(&id) {
        Some(BlockRuntime::Clip(cursor)) => cursor.time,
        Some(BlockRuntime::Machine(cursor)) => cursor.current.map(|current| block_time(runtimes, current)).unwrap_or(0.0),
        None => 0.0,
    }
}

fn emit(events: &mut Vec<AnimationEvent>, kind: EventKind, layer: usize, block: BlockId, call: &EventCall) {
    events.push(AnimationEvent {
        kind,
        layer,
        block,
        call: call.clone(),
    });
}

///
/// Evaluates blocks of one layer for one frame.
///
/// Holds everything a block needs: the shared graph and motions, and the
/// mutable per-instance state (parameters, cursors, pending events).
///
pub(crate) struct Evaluator<'t> {
    pub(crate) blocks: &'t BlockArena,
    pub(crate) motions: BoundMotions<'t>,
    pub(crate) params: &'t mut ParameterTable,
    pub(crate) settings: &'t AnimatorSettings,
    pub(crate) runtimes: &'t mut RuntimeMap,
    pub(crate) events: &'t mut Vec<AnimationEvent>,
    pub(crate) scratch: &'t mut Pose,
    pub(crate) layer: usize,
    pub(crate) additive: bool,
    pub(crate) num_bones: usize,
}

impl<'t> Evaluator<'t> {
    /// Removes the clip cursor of `id` from the map, creating it if needed.
    fn take_clip(&mut self, id: BlockId) -> ClipCursor {
        match self.runtimes.remove(&id) {
            Some(BlockRuntime::Clip(cursor)) => cursor,
            _ => ClipCursor::default(),
        }
    }

    /// Removes the machine cursor of `id` from the map, creating it if needed.
    /// Must be put back with `put_machine()`.
    fn take_machine(&mut self, id: BlockId) -> Box<MachineCursor> {
        match self.runtimes.remove(&id) {
            Some(BlockRuntime::Machine(cursor)) => cursor,
            _ => Box::default(),
        }
    }

    fn put_machine(&mut self, id: BlockId, cursor: Box<MachineCursor>) {
        self.runtimes.insert(id, BlockRuntime::Machine(cursor));
    }

    /// Starts playing `id` at normalized time `offset` and fires its enter callback.
    pub(crate) fn enter(&mut self, id: BlockId, offset: f32) -> Result<(), AnimError> {
        let blocks = self.blocks;
        let block = blocks.get(id)?;
        match &block.kind {
            BlockKind::State(state) => {
                let mut cursor = self.take_clip(id);
                cursor.time = offset;
                cursor.events.reset(&state.events, offset);
                self.runtimes.insert(id, BlockRuntime::Clip(cursor));
            }
            BlockKind::BlendTree(tree) => {
                let mut cursor = self.take_clip(id);
                cursor.time = offset;
                cursor.events.reset(&tree.events, offset);
                cursor.weights.clear();
                self.runtimes.insert(id, BlockRuntime::Clip(cursor));
            }
            BlockKind::StateMachine(_) => {
                let mut cursor = self.take_machine(id);
                cursor.restart();
                self.put_machine(id, cursor);
            }
        }
        if let Some(call) = &block.on_enter {
            emit(self.events, EventKind::Enter, self.layer, id, call);
        }
        Ok(())
    }

    /// Fires the exit callback of `id`.
    pub(crate) fn exit(&mut self, id: BlockId) -> Result<(), AnimError> {
        let block = self.blocks.get(id)?;
        if let Some(call) = &block.on_exit {
            emit(self.events, EventKind::Exit, self.layer, id, call);
        }
        Ok(())
    }

    /// Advances `id` by `dt` seconds, firing crossed timeline events.
    pub(crate) fn advance(&mut self, id: BlockId, dt: f32) -> Result<TimeStep, AnimError> {
        let blocks = self.blocks;
        let block = blocks.get(id)?;
        let layer = self.layer;
        match &block.kind {
            BlockKind::State(state) => {
                let step = state.time_step(dt, &self.motions, self.params);
                let events = &mut *self.events;
                let runtime = self
                    .runtimes
                    .entry(id)
                    .or_insert_with(|| BlockRuntime::Clip(ClipCursor::default()));
                let cursor = match runtime {
                    BlockRuntime::Clip(cursor) => cursor,
                    BlockRuntime::Machine(_) => return Err(AnimError::InvalidBlock),
                };
                if step.weighted.is_finite() {
                    cursor.time += step.weighted;
                }
                cursor
                    .events
                    .advance(&state.events, cursor.time, |call| emit(events, EventKind::Timeline, layer, id, call));
                Ok(step)
            }
            BlockKind::BlendTree(tree) => {
                let threshold = self.settings.weight_threshold;
                let events = &mut *self.events;
                let runtime = self
                    .runtimes
                    .entry(id)
                    .or_insert_with(|| BlockRuntime::Clip(ClipCursor::default()));
                let cursor = match runtime {
                    BlockRuntime::Clip(cursor) => cursor,
                    BlockRuntime::Machine(_) => return Err(AnimError::InvalidBlock),
                };
                tree.compute_weights(self.params, &self.motions, &mut cursor.weights);
                let step = tree.time_step(dt, &cursor.weights, threshold, &self.motions, self.params);
                if step.weighted.is_finite() {
                    cursor.time += step.weighted;
                }
                cursor
                    .events
                    .advance(&tree.events, cursor.time, |call| emit(events, EventKind::Timeline, layer, id, call));
                Ok(step)
            }
            BlockKind::StateMachine(machine) => {
                let mut cursor = self.take_machine(id);
                let result = cursor.update(self, id, machine, dt);
                self.put_machine(id, cursor);
                result
            }
        }
    }

    /// Samples `id` at its current time into `out`. Returns false if the
    /// block produced no pose.
    pub(crate) fn sample(&mut self, id: BlockId, out: &mut Pose) -> Result<bool, AnimError> {
        let blocks = self.blocks;
        let block = blocks.get(id)?;
        if out.len() != self.num_bones {
            out.reset(self.num_bones);
        }
        let sampled = match (&block.kind, self.runtimes.get(&id)) {
            (BlockKind::State(state), Some(BlockRuntime::Clip(cursor))) => {
                state.sample(cursor.time, &self.motions, self.additive, out)
            }
            (BlockKind::BlendTree(tree), Some(BlockRuntime::Clip(cursor))) => tree.sample(
                cursor.time,
                &cursor.weights,
                self.settings.weight_threshold,
                &self.motions,
                self.additive,
                self.scratch,
                out,
            ),
            (BlockKind::StateMachine(_), Some(BlockRuntime::Machine(cursor))) if cursor.has_pose => {
                out.copy_from(&cursor.pose);
                true
            }
            _ => {
                out.clear();
                false
            }
        };
        Ok(sampled)
    }

    #[inline]
    pub(crate) fn normalized_time(&self, id: BlockId) -> f32 {
        block_time(self.runtimes, id)
    }
}
