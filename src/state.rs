//!
//! State, the leaf block playing one motion clip.
//!

use crate::motion::{BoundMotions, MotionId};
use crate::parameter::ParameterTable;
use crate::playback::{TimelineEvent, WrapMode};
use crate::pose::Pose;

/// Normalized time advance of a block for one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TimeStep {
    /// Advance including speed and speed parameter.
    pub weighted: f32,
    /// Advance at nominal speed. Drives transition timers.
    pub raw: f32,
}

impl TimeStep {
    /// A block that can't play still lets transition timers run.
    #[inline]
    pub fn idle(dt: f32) -> TimeStep {
        TimeStep { weighted: 0.0, raw: dt }
    }
}

/// Speed multiplier of a clip block.
pub(crate) fn speed_factor(speed: f32, speed_parameter: Option<&str>, params: &ParameterTable) -> f32 {
    match speed_parameter {
        Some(name) => speed * params.numeric(name),
        None => speed,
    }
}

///
/// A block playing one motion.
///
/// Normalized time 1.0 is one loop of the motion. A state without loaded
/// motion data still advances (one normalized unit per second) but produces
/// no pose.
///
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct State {
    pub motion: Option<MotionId>,
    pub speed: f32,
    /// Numeric parameter multiplied into `speed`.
    pub speed_parameter: Option<String>,
    pub wrap_mode: WrapMode,
    pub events: Vec<TimelineEvent>,
}

impl Default for State {
    fn default() -> State {
        State::new(None)
    }
}

impl State {
    pub fn new(motion: Option<MotionId>) -> State {
        State {
            motion,
            speed: 1.0,
            speed_parameter: None,
            wrap_mode: WrapMode::Loop,
            events: Vec::new(),
        }
    }

    pub fn with_speed(mut self, speed: f32) -> State {
        self.speed = speed;
        self
    }

    pub fn with_speed_parameter(mut self, parameter: &str) -> State {
        self.speed_parameter = Some(parameter.to_string());
        self
    }

    pub fn with_wrap_mode(mut self, wrap_mode: WrapMode) -> State {
        self.wrap_mode = wrap_mode;
        self
    }

    pub fn with_event(mut self, event: TimelineEvent) -> State {
        self.events.push(event);
        self
    }

    /// Nominal length in seconds, `None` if the motion isn't loaded.
    pub(crate) fn length(&self, motions: &BoundMotions) -> Option<f32> {
        self.motion.and_then(|id| motions.length(id)).filter(|len| *len > 0.0)
    }

    /// Normalized advance for `dt` seconds.
    pub(crate) fn time_step(&self, dt: f32, motions: &BoundMotions, params: &ParameterTable) -> TimeStep {
        let raw = match self.length(motions) {
            Some(len) => dt / len,
            None => dt,
        };
        TimeStep {
            weighted: raw * speed_factor(self.speed, self.speed_parameter.as_deref(), params),
            raw,
        }
    }

    /// Samples the motion at `normalized` time into `out`.
    ///
    /// Returns false, leaving `out` invalidated, if the motion isn't loaded.
    pub(crate) fn sample(&self, normalized: f32, motions: &BoundMotions, additive: bool, out: &mut Pose) -> bool {
        out.clear();
        let (motion, remap) = match self.motion.and_then(|id| motions.get(id)) {
            Some(bound) => bound,
            None => return false,
        };
        let time = self.wrap_mode.clip_time(normalized, motion.length());
        out.sample_motion(motion, remap, time, additive);
        true
    }
}
