//!
//! Transition edges and their guard conditions.
//!

use crate::block::BlockId;
use crate::parameter::{ParameterTable, ParameterType};

/// Comparison applied by a `Condition`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionMode {
    /// Bool or trigger is set.
    #[default]
    If,
    /// Bool is cleared.
    IfNot,
    Greater,
    Less,
    Equal,
    NotEqual,
}

/// A guard over one parameter. Stateless, re-evaluated on every check.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Condition {
    pub mode: ConditionMode,
    pub threshold: f32,
    pub parameter: String,
}

impl Condition {
    pub fn new(mode: ConditionMode, threshold: f32, parameter: &str) -> Condition {
        Condition {
            mode,
            threshold,
            parameter: parameter.to_string(),
        }
    }

    /// Shortcut of `If` on a bool or trigger parameter.
    pub fn when(parameter: &str) -> Condition {
        Condition::new(ConditionMode::If, 0.0, parameter)
    }

    /// Evaluates the condition. Unknown parameters and modes that don't apply
    /// to the parameter type evaluate to false.
    pub fn evaluate(&self, params: &ParameterTable) -> bool {
        let param = match params.get(&self.parameter) {
            Some(param) => param,
            None => return false,
        };
        match (param.kind, self.mode) {
            (ParameterType::Bool, ConditionMode::If) => param.default_bool,
            (ParameterType::Bool, ConditionMode::IfNot) => !param.default_bool,
            (ParameterType::Trigger, ConditionMode::If) => param.default_bool,
            (ParameterType::Int, ConditionMode::Equal) => param.default_int == self.threshold as i32,
            (ParameterType::Int, ConditionMode::NotEqual) => param.default_int != self.threshold as i32,
            (ParameterType::Int, ConditionMode::Greater) => param.default_int as f32 > self.threshold,
            (ParameterType::Int, ConditionMode::Less) => (param.default_int as f32) < self.threshold,
            (ParameterType::Float, ConditionMode::Greater) => param.default_float > self.threshold,
            (ParameterType::Float, ConditionMode::Less) => param.default_float < self.threshold,
            _ => false,
        }
    }
}

/// Which side of an in-flight transition may interrupt it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterruptionSource {
    /// Never interrupts.
    #[default]
    None,
    /// Only transitions of the currently playing block.
    Current,
    /// Only transitions of the incoming block.
    Next,
}

///
/// A directed edge toward another block of the same state machine.
///
/// `duration` and `offset` are normalized times of the destination: 1.0 is one
/// loop of the destination's nominal length, whatever its playback speed.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub destination: BlockId,
    pub conditions: Vec<Condition>,
    pub has_exit_time: bool,
    pub exit_time: f32,
    pub duration: f32,
    pub offset: f32,
    pub interruption_source: InterruptionSource,
}

/// A satisfied transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionHit {
    pub destination: BlockId,
    pub duration: f32,
    pub offset: f32,
}

impl Transition {
    pub fn new(destination: BlockId) -> Transition {
        Transition {
            destination,
            conditions: Vec::new(),
            has_exit_time: false,
            exit_time: 1.0,
            duration: 0.25,
            offset: 0.0,
            interruption_source: InterruptionSource::None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Transition {
        self.conditions.push(condition);
        self
    }

    pub fn with_exit_time(mut self, exit_time: f32) -> Transition {
        self.has_exit_time = true;
        self.exit_time = exit_time;
        self
    }

    pub fn with_duration(mut self, duration: f32) -> Transition {
        self.duration = duration;
        self
    }

    pub fn with_offset(mut self, offset: f32) -> Transition {
        self.offset = offset;
        self
    }

    pub fn with_interruption(mut self, source: InterruptionSource) -> Transition {
        self.interruption_source = source;
        self
    }

    /// Returns true once `normalized_time` crossed the exit time.
    ///
    /// Exit times below 1 are compared with the fractional part (every loop),
    /// larger ones with the absolute elapsed normalized time.
    #[inline]
    pub fn exit_time_reached(&self, normalized_time: f32) -> bool {
        if self.exit_time < 1.0 {
            normalized_time.rem_euclid(1.0) >= self.exit_time
        } else {
            normalized_time >= self.exit_time
        }
    }

    ///
    /// Checks the transition.
    ///
    /// * `is_current_side` - The transition belongs to the currently playing block
    ///   (as opposed to the incoming one).
    /// * `already_transitioning` - The owning state machine is mid-crossfade.
    /// * `normalized_time` - Normalized time of the block owning the transition.
    ///
    /// On success, trigger parameters referenced by the conditions are reset.
    ///
    pub fn check(
        &self,
        is_current_side: bool,
        already_transitioning: bool,
        normalized_time: f32,
        params: &mut ParameterTable,
    ) -> Option<TransitionHit> {
        if already_transitioning {
            let allowed = match self.interruption_source {
                InterruptionSource::None => false,
                InterruptionSource::Current => is_current_side,
                InterruptionSource::Next => !is_current_side,
            };
            if !allowed {
                return None;
            }
        } else if self.has_exit_time && !self.exit_time_reached(normalized_time) {
            return None;
        }

        if self.conditions.is_empty() {
            if already_transitioning {
                return None;
            }
        } else if !self.conditions.iter().all(|cond| cond.evaluate(params)) {
            return None;
        }

        for cond in &self.conditions {
            let is_trigger = params
                .get(&cond.parameter)
                .map(|param| param.kind == ParameterType::Trigger)
                .unwrap_or(false);
            if is_trigger {
                params.reset_trigger(&cond.parameter);
            }
        }

        Some(TransitionHit {
            destination: self.destination,
            duration: self.duration,
            offset: self.offset,
        })
    }
}

/// Checks `transitions` in declaration order and returns the first success.
///
/// Transitions toward a block of `exclude` are skipped without evaluating
/// their conditions, so their triggers are left untouched.
pub fn check_transitions(
    transitions: &[Transition],
    is_current_side: bool,
    already_transitioning: bool,
    normalized_time: f32,
    exclude: &[BlockId],
    params: &mut ParameterTable,
) -> Option<TransitionHit> {
    transitions
        .iter()
        .filter(|transition| !exclude.contains(&transition.destination))
        .find_map(|transition| transition.check(is_current_side, already_transitioning, normalized_time, params))
}
