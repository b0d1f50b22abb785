//!
//! State machine, the container block running the crossfade protocol.
//!

use crate::base::AnimError;
use crate::block::BlockId;
use crate::pose::Pose;
use crate::runtime::Evaluator;
use crate::state::TimeStep;
use crate::transition::{check_transitions, Transition, TransitionHit};

/// Play phase of a state machine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachinePhase {
    /// Nothing selected yet, resolved on the next update.
    #[default]
    Entry,
    /// Only the current block plays.
    Play,
    /// Crossfading from the current block to the next one.
    Transition,
    /// Crossfading from a frozen pose toward the next block, after an
    /// in-flight transition was interrupted.
    InterruptTransition,
}

impl MachinePhase {
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, MachinePhase::Transition | MachinePhase::InterruptTransition)
    }
}

///
/// Definition of a state machine: its children and how it picks the first one.
///
/// On entry, entry transitions are checked in order (exit time never applies),
/// and the default entry block is used if none passes.
///
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StateMachine {
    pub(crate) entry: Option<BlockId>,
    pub(crate) entry_transitions: Vec<Transition>,
    pub(crate) children: Vec<BlockId>,
}

impl StateMachine {
    pub fn new() -> StateMachine {
        StateMachine::default()
    }

    /// Default entry block.
    #[inline]
    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    #[inline]
    pub fn entry_transitions(&self) -> &[Transition] {
        &self.entry_transitions
    }

    /// Child blocks, in creation order.
    #[inline]
    pub fn children(&self) -> &[BlockId] {
        &self.children
    }

    #[inline]
    pub fn contains(&self, child: BlockId) -> bool {
        self.children.contains(&child)
    }
}

///
/// Per-instance play cursor of a state machine.
///
/// `next` is set only while transitioning. `pose` keeps the output of the last
/// update, it's the frozen source of an interruption.
///
#[derive(Debug, Default, Clone)]
pub(crate) struct MachineCursor {
    pub(crate) phase: MachinePhase,
    pub(crate) current: Option<BlockId>,
    pub(crate) next: Option<BlockId>,
    pub(crate) duration_timer: f32,
    pub(crate) duration_start: f32,
    pub(crate) pose: Pose,
    pub(crate) has_pose: bool,
    current_pose: Pose,
    next_pose: Pose,
    interrupted: Pose,
}

impl MachineCursor {
    /// Goes back to `Entry`, forgetting the played blocks.
    pub(crate) fn restart(&mut self) {
        self.phase = MachinePhase::Entry;
        self.current = None;
        self.next = None;
        self.duration_timer = 0.0;
        self.duration_start = 0.0;
        self.has_pose = false;
        self.pose.clear();
    }

    fn resize(&mut self, num_bones: usize) {
        for pose in [
            &mut self.pose,
            &mut self.current_pose,
            &mut self.next_pose,
            &mut self.interrupted,
        ] {
            if pose.len() != num_bones {
                pose.reset(num_bones);
            }
        }
    }

    ///
    /// Advances the machine by `dt` seconds and composes its pose.
    ///
    /// Returns the time step of the current block, which parent machines use
    /// to run their own transition timers.
    ///
    pub(crate) fn update(
        &mut self,
        ev: &mut Evaluator,
        id: BlockId,
        machine: &StateMachine,
        dt: f32,
    ) -> Result<TimeStep, AnimError> {
        self.resize(ev.num_bones);

        if self.phase == MachinePhase::Entry && !self.resolve_entry(ev, id, machine)? {
            self.has_pose = false;
            self.pose.clear();
            return Ok(TimeStep::idle(dt));
        }

        match self.phase {
            MachinePhase::Play => self.play(ev, id, dt),
            MachinePhase::Transition | MachinePhase::InterruptTransition => self.transition(ev, id, dt),
            MachinePhase::Entry => Ok(TimeStep::idle(dt)),
        }
    }

    fn resolve_entry(&mut self, ev: &mut Evaluator, id: BlockId, machine: &StateMachine) -> Result<bool, AnimError> {
        let hit = check_transitions(&machine.entry_transitions, true, false, 0.0, &[], ev.params);
        let (dest, offset) = match (hit, machine.entry) {
            (Some(hit), _) => (hit.destination, hit.offset),
            (None, Some(entry)) => (entry, 0.0),
            (None, None) => {
                log::trace!("State machine {} has no entry", id);
                return Ok(false);
            }
        };

        ev.enter(dest, offset)?;
        self.current = Some(dest);
        self.next = None;
        self.phase = MachinePhase::Play;
        log::debug!("State machine {} enters {}", id, dest);
        Ok(true)
    }

    fn play(&mut self, ev: &mut Evaluator, id: BlockId, dt: f32) -> Result<TimeStep, AnimError> {
        let current = self.current.ok_or(AnimError::InvalidBlock)?;
        let step = ev.advance(current, dt)?;

        let blocks = ev.blocks;
        let time = ev.normalized_time(current);
        let hit = check_transitions(
            blocks.get(current)?.transitions(),
            true,
            false,
            time,
            &[current],
            ev.params,
        );

        match hit {
            Some(hit) => {
                log::debug!("State machine {} transits {} -> {}", id, current, hit.destination);
                self.start_transition(ev, id, hit, MachinePhase::Transition)?;
                if self.phase == MachinePhase::Play {
                    self.sample_current(ev)?;
                } else {
                    self.blend(ev, 0.0)?;
                }
            }
            None => self.sample_current(ev)?,
        }
        Ok(step)
    }

    fn transition(&mut self, ev: &mut Evaluator, id: BlockId, dt: f32) -> Result<TimeStep, AnimError> {
        let current = self.current.ok_or(AnimError::InvalidBlock)?;
        let next = self.next.ok_or(AnimError::InvalidBlock)?;
        let step = ev.advance(current, dt)?;
        ev.advance(next, dt)?;
        self.duration_timer -= step.raw;

        let blocks = ev.blocks;
        let exclude = [current, next];
        let mut hit = check_transitions(
            blocks.get(current)?.transitions(),
            true,
            true,
            ev.normalized_time(current),
            &exclude,
            ev.params,
        );
        if hit.is_none() {
            hit = check_transitions(
                blocks.get(next)?.transitions(),
                false,
                true,
                ev.normalized_time(next),
                &exclude,
                ev.params,
            );
        }

        if let Some(hit) = hit {
            log::debug!(
                "State machine {} interrupts {} -> {} with {}",
                id,
                current,
                next,
                hit.destination
            );
            // the last output is the frozen source, and stays the output this frame
            self.interrupted.copy_from(&self.pose);
            ev.exit(next)?;
            self.start_transition(ev, id, hit, MachinePhase::InterruptTransition)?;
            if self.phase == MachinePhase::Play {
                self.sample_current(ev)?;
            }
            return Ok(step);
        }

        if self.duration_timer <= 0.0 {
            self.complete(ev, id)?;
            self.sample_current(ev)?;
        } else {
            let ratio = (1.0 - self.duration_timer / self.duration_start).clamp(0.0, 1.0);
            self.blend(ev, ratio)?;
        }
        Ok(step)
    }

    fn start_transition(
        &mut self,
        ev: &mut Evaluator,
        id: BlockId,
        hit: TransitionHit,
        phase: MachinePhase,
    ) -> Result<(), AnimError> {
        ev.enter(hit.destination, hit.offset)?;
        // resolves nested entries and blend weights before the first sample
        ev.advance(hit.destination, 0.0)?;
        self.next = Some(hit.destination);
        self.duration_start = hit.duration.max(0.0);
        self.duration_timer = self.duration_start;
        self.phase = phase;
        if hit.duration <= 0.0 {
            self.complete(ev, id)?;
        }
        Ok(())
    }

    fn complete(&mut self, ev: &mut Evaluator, id: BlockId) -> Result<(), AnimError> {
        if let Some(current) = self.current {
            ev.exit(current)?;
        }
        self.current = self.next.take();
        self.phase = MachinePhase::Play;
        self.duration_timer = 0.0;
        self.duration_start = 0.0;
        log::debug!("Transition completed, {} plays {:?}", id, self.current);
        Ok(())
    }

    fn sample_current(&mut self, ev: &mut Evaluator) -> Result<(), AnimError> {
        self.has_pose = match self.current {
            Some(current) => ev.sample(current, &mut self.pose)?,
            None => false,
        };
        if !self.has_pose {
            self.pose.clear();
        }
        Ok(())
    }

    /// Blends the transition source toward `next` by `ratio` into `pose`.
    fn blend(&mut self, ev: &mut Evaluator, ratio: f32) -> Result<(), AnimError> {
        if let Some(next) = self.next {
            ev.sample(next, &mut self.next_pose)?;
        } else {
            self.next_pose.clear();
        }

        if self.phase == MachinePhase::InterruptTransition {
            self.pose.blend(&self.interrupted, &self.next_pose, ratio);
        } else {
            let sampled = match self.current {
                Some(current) => ev.sample(current, &mut self.current_pose)?,
                None => false,
            };
            if !sampled {
                self.current_pose.clear();
            }
            self.pose.blend(&self.current_pose, &self.next_pose, ratio);
        }
        self.has_pose = self.pose.has_any();
        Ok(())
    }
}
