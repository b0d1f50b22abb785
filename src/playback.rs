//!
//! Playback policies: wrap modes mapping normalized time onto clip time, and
//! timeline events fired as normalized time crosses them.
//!

use crate::event::EventCall;

/// How normalized time maps onto a clip once it leaves `[0, 1)`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapMode {
    /// Plays once, then holds the first frame.
    Once,
    #[default]
    Loop,
    /// Holds the last frame.
    Clamp,
    /// Alternates forward and backward every loop.
    PingPong,
    /// Loops backward.
    RevLoop,
    /// Plays backward once, then holds the first frame.
    RevClamp,
}

impl WrapMode {
    /// Wrap modes a blend tree accepts.
    #[inline]
    pub fn is_blend_tree_mode(&self) -> bool {
        matches!(self, WrapMode::Loop | WrapMode::Clamp)
    }

    /// Maps `normalized` time onto clip-local seconds for a clip of `length` seconds.
    pub fn clip_time(&self, normalized: f32, length: f32) -> f32 {
        if length <= 0.0 {
            return 0.0;
        }
        let ratio = match self {
            WrapMode::Once => {
                if (0.0..1.0).contains(&normalized) {
                    normalized
                } else {
                    0.0
                }
            }
            WrapMode::Loop => normalized.rem_euclid(1.0),
            WrapMode::Clamp => normalized.clamp(0.0, 1.0),
            WrapMode::PingPong => {
                let loops = normalized.floor();
                let frac = normalized - loops;
                if (loops as i64).rem_euclid(2) == 1 {
                    1.0 - frac
                } else {
                    frac
                }
            }
            WrapMode::RevLoop => 1.0 - normalized.rem_euclid(1.0),
            WrapMode::RevClamp => 1.0 - normalized.clamp(0.0, 1.0),
        };
        ratio * length
    }
}

/// A call fired when playback crosses `time`, a fraction of one loop in `[0, 1]`.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimelineEvent {
    pub time: f32,
    pub call: EventCall,
}

impl TimelineEvent {
    pub fn new(time: f32, call: EventCall) -> TimelineEvent {
        TimelineEvent { time, call }
    }
}

///
/// Tracks which timeline events already fired during the current loop.
///
/// An event fires once its time is crossed. When the fractional time
/// decreases (a wrap), events left in the previous loop fire first, then all
/// events are re-armed.
///
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventCursor {
    fired: Vec<bool>,
    last: f32,
}

impl EventCursor {
    /// Re-arms every event, events strictly before `normalized` count as fired.
    pub fn reset(&mut self, events: &[TimelineEvent], normalized: f32) {
        self.last = normalized.rem_euclid(1.0);
        self.fired.clear();
        self.fired.extend(events.iter().map(|event| event.time < self.last));
    }

    /// Moves the cursor to `normalized`, calling `emit` for every crossed event.
    pub fn advance<F>(&mut self, events: &[TimelineEvent], normalized: f32, mut emit: F)
    where
        F: FnMut(&EventCall),
    {
        if self.fired.len() != events.len() {
            self.fired.resize(events.len(), false);
        }

        let frac = normalized.rem_euclid(1.0);
        if frac < self.last {
            for (event, fired) in events.iter().zip(self.fired.iter_mut()) {
                if !*fired && event.time >= self.last {
                    emit(&event.call);
                }
                *fired = false;
            }
        }

        for (event, fired) in events.iter().zip(self.fired.iter_mut()) {
            if !*fired && event.time <= frac {
                *fired = true;
                emit(&event.call);
            }
        }
        self.last = frac;
    }
}
