#![allow(unused_imports)]
#![allow(dead_code)]

use animator_rs::*;
use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn key(x: f32) -> KeyData {
    KeyData::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE)
}

pub fn skeleton(names: &[&str]) -> Skeleton {
    Skeleton::from_names(names).unwrap()
}

/// A motion of `length` seconds moving every bone along x from `from` to `to`.
pub fn linear_motion(name: &str, bones: &[&str], length: f32, from: f32, to: f32) -> Arc<Motion> {
    let samples = vec![vec![key(from); bones.len()], vec![key(to); bones.len()]];
    Arc::new(Motion::from_samples(name, 1.0 / length, bones, samples).unwrap())
}

/// A motion of `length` seconds holding every bone at `x`.
pub fn constant_motion(name: &str, bones: &[&str], length: f32, x: f32) -> Arc<Motion> {
    linear_motion(name, bones, length, x, x)
}

/// Registers and loads a motion, returns its id.
pub fn load(ctrl: &mut AnimatorController, motion: Arc<Motion>) -> MotionId {
    let id = ctrl.add_motion(motion.name());
    ctrl.load_motion(id, motion).unwrap();
    id
}

/// Root state machine of layer `index`.
pub fn root(ctrl: &AnimatorController, index: usize) -> BlockId {
    ctrl.layer(index).unwrap().root_state_machine()
}

/// Evaluates one frame and returns the x translation of every bone.
pub fn step<C: AnimObj<AnimatorController>>(animator: &mut Animator<C>, skeleton: &Skeleton, dt: f32) -> Vec<f32> {
    animator
        .apply_animation_transform(dt, skeleton, &[], &mut NullDispatcher)
        .unwrap()
        .iter()
        .map(|key| key.translation.x)
        .collect()
}

/// A callback table recording `component::method` of every dispatched call.
pub fn recording_table(calls: &[(&str, &str)]) -> (CallbackTable, Rc<RefCell<Vec<String>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut table = CallbackTable::new();
    for (component, method) in calls {
        let log = log.clone();
        table.register(component, method, move |event: &AnimationEvent| {
            log.borrow_mut()
                .push(format!("{}::{}", event.call.component, event.call.method));
        });
    }
    (table, log)
}
