//!
//! Event calls emitted by the animator: block enter/exit callbacks and
//! timeline events. The animator names the method to invoke, it never
//! resolves or executes it; a dispatcher does.
//!

use std::collections::HashMap;
use std::fmt;

use crate::base::{AnimError, DeterministicState};
use crate::block::BlockId;

/// Optional argument of an event call.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventArg {
    #[default]
    None,
    Int(i32),
    Float(f32),
}

/// A named method on a named component, with an optional argument.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventCall {
    pub component: String,
    pub method: String,
    pub arg: EventArg,
}

impl EventCall {
    pub fn new(component: &str, method: &str) -> EventCall {
        EventCall {
            component: component.to_string(),
            method: method.to_string(),
            arg: EventArg::None,
        }
    }

    pub fn with_int(component: &str, method: &str, arg: i32) -> EventCall {
        EventCall {
            arg: EventArg::Int(arg),
            ..EventCall::new(component, method)
        }
    }

    pub fn with_float(component: &str, method: &str, arg: f32) -> EventCall {
        EventCall {
            arg: EventArg::Float(arg),
            ..EventCall::new(component, method)
        }
    }
}

/// Why an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Enter,
    Exit,
    Timeline,
}

/// An event emitted during one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationEvent {
    pub kind: EventKind,
    pub layer: usize,
    pub block: BlockId,
    pub call: EventCall,
}

impl fmt::Display for AnimationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {}::{} (layer {}, block {})",
            self.kind, self.call.component, self.call.method, self.layer, self.block
        )
    }
}

/// Receives the events of an evaluation, in emission order.
pub trait EventDispatcher {
    fn dispatch(&mut self, event: &AnimationEvent) -> Result<(), AnimError>;
}

/// Collects events.
impl EventDispatcher for Vec<AnimationEvent> {
    fn dispatch(&mut self, event: &AnimationEvent) -> Result<(), AnimError> {
        self.push(event.clone());
        Ok(())
    }
}

/// Drops events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDispatcher;

impl EventDispatcher for NullDispatcher {
    fn dispatch(&mut self, _event: &AnimationEvent) -> Result<(), AnimError> {
        Ok(())
    }
}

pub type Callback = Box<dyn FnMut(&AnimationEvent)>;

///
/// Callback table keyed by `(component, method)`, populated at startup.
///
/// Dispatching an event with no registered callback returns
/// `AnimError::CallbackNotFound`.
///
#[derive(Default)]
pub struct CallbackTable {
    callbacks: HashMap<String, HashMap<String, Callback, DeterministicState>, DeterministicState>,
}

impl fmt::Debug for CallbackTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTable").field("len", &self.len()).finish()
    }
}

impl CallbackTable {
    pub fn new() -> CallbackTable {
        CallbackTable::default()
    }

    /// Registers (or replaces) the callback of `component::method`.
    pub fn register<F>(&mut self, component: &str, method: &str, callback: F)
    where
        F: FnMut(&AnimationEvent) + 'static,
    {
        self.callbacks
            .entry(component.to_string())
            .or_default()
            .insert(method.to_string(), Box::new(callback));
    }

    /// Removes the callback of `component::method`, returns true if it existed.
    pub fn unregister(&mut self, component: &str, method: &str) -> bool {
        match self.callbacks.get_mut(component) {
            Some(methods) => methods.remove(method).is_some(),
            None => false,
        }
    }

    #[inline]
    pub fn contains(&self, component: &str, method: &str) -> bool {
        self.callbacks
            .get(component)
            .map(|methods| methods.contains_key(method))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.callbacks.values().map(|methods| methods.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventDispatcher for CallbackTable {
    fn dispatch(&mut self, event: &AnimationEvent) -> Result<(), AnimError> {
        let callback = self
            .callbacks
            .get_mut(&event.call.component)
            .and_then(|methods| methods.get_mut(&event.call.method));
        match callback {
            Some(callback) => {
                callback(event);
                Ok(())
            }
            None => Err(AnimError::CallbackNotFound {
                component: event.call.component.clone(),
                method: event.call.method.clone(),
            }),
        }
    }
}
