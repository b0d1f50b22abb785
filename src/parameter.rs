//!
//! Named, typed animator parameters.
//!

use std::collections::BTreeMap;

use crate::base::AnimError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParameterType {
    #[default]
    Float,
    Int,
    Bool,
    /// One-shot bool, cleared once a satisfied condition consumes it.
    Trigger,
}

/// A typed parameter value.
///
/// In an `AnimatorController` the values are the defaults, an `Animator`
/// copies them and mutates its own copy.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "rkyv", derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Parameter {
    pub kind: ParameterType,
    pub default_bool: bool,
    pub default_int: i32,
    pub default_float: f32,
}

impl Parameter {
    pub fn new(kind: ParameterType) -> Parameter {
        Parameter {
            kind,
            ..Default::default()
        }
    }

    pub fn float(value: f32) -> Parameter {
        Parameter {
            default_float: value,
            ..Parameter::new(ParameterType::Float)
        }
    }

    pub fn int(value: i32) -> Parameter {
        Parameter {
            default_int: value,
            ..Parameter::new(ParameterType::Int)
        }
    }

    pub fn bool(value: bool) -> Parameter {
        Parameter {
            default_bool: value,
            ..Parameter::new(ParameterType::Bool)
        }
    }

    pub fn trigger() -> Parameter {
        Parameter::new(ParameterType::Trigger)
    }

    #[inline]
    fn is_boolean(&self) -> bool {
        matches!(self.kind, ParameterType::Bool | ParameterType::Trigger)
    }
}

///
/// Parameters keyed by name.
///
/// Unknown names never fail at runtime: setters are no-ops, getters return
/// the type's zero value. Setting a value of the wrong type is a no-op too.
///
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterTable {
    params: BTreeMap<String, Parameter>,
}

impl ParameterTable {
    pub fn new() -> ParameterTable {
        ParameterTable::default()
    }

    /// Adds a parameter, names are unique.
    pub fn add(&mut self, name: &str, param: Parameter) -> Result<(), AnimError> {
        if self.params.contains_key(name) {
            return Err(AnimError::DuplicateParameter(name.to_string()));
        }
        self.params.insert(name.to_string(), param);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Parameter, AnimError> {
        self.params
            .remove(name)
            .ok_or_else(|| AnimError::InvalidParameter(name.to_string()))
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.params.iter().map(|(name, param)| (name.as_str(), param))
    }

    /// Aligns this table with `defaults`: parameters missing from `defaults`
    /// are dropped, new ones are added with their default value, and
    /// parameters whose type changed are reset.
    pub fn sync_with(&mut self, defaults: &ParameterTable) {
        self.params.retain(|name, param| {
            defaults
                .params
                .get(name)
                .map(|default| default.kind == param.kind)
                .unwrap_or(false)
        });
        for (name, default) in &defaults.params {
            self.params.entry(name.clone()).or_insert(*default);
        }
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        let param = self.params.get_mut(name);
        if param.is_none() {
            log::warn!("Unknown parameter {}", name);
        }
        param
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        if let Some(param) = self.lookup_mut(name) {
            if param.is_boolean() {
                param.default_bool = value;
            }
        }
    }

    pub fn set_integer(&mut self, name: &str, value: i32) {
        if let Some(param) = self.lookup_mut(name) {
            if param.kind == ParameterType::Int {
                param.default_int = value;
            }
        }
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        if let Some(param) = self.lookup_mut(name) {
            if param.kind == ParameterType::Float {
                param.default_float = value;
            }
        }
    }

    pub fn set_trigger(&mut self, name: &str) {
        if let Some(param) = self.lookup_mut(name) {
            if param.kind == ParameterType::Trigger {
                param.default_bool = true;
            }
        }
    }

    pub fn reset_trigger(&mut self, name: &str) {
        if let Some(param) = self.lookup_mut(name) {
            if param.kind == ParameterType::Trigger {
                param.default_bool = false;
            }
        }
    }

    pub fn get_bool(&self, name: &str) -> bool {
        match self.params.get(name) {
            Some(param) if param.is_boolean() => param.default_bool,
            _ => false,
        }
    }

    pub fn get_integer(&self, name: &str) -> i32 {
        match self.params.get(name) {
            Some(param) if param.kind == ParameterType::Int => param.default_int,
            _ => 0,
        }
    }

    pub fn get_float(&self, name: &str) -> f32 {
        match self.params.get(name) {
            Some(param) if param.kind == ParameterType::Float => param.default_float,
            _ => 0.0,
        }
    }

    /// Numeric view used by blend trees and speed/weight multipliers:
    /// floats as is (non-finite ones read as 0), ints converted, bools as 0/1.
    pub fn numeric(&self, name: &str) -> f32 {
        match self.params.get(name) {
            Some(param) => match param.kind {
                ParameterType::Float if param.default_float.is_finite() => param.default_float,
                ParameterType::Float => 0.0,
                ParameterType::Int => param.default_int as f32,
                ParameterType::Bool | ParameterType::Trigger => param.default_bool as i32 as f32,
            },
            None => 0.0,
        }
    }
}
