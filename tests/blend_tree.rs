use animator_rs::*;
use rand::{Rng, SeedableRng};

mod common;
use common::*;

const BONES: [&str; 1] = ["root"];

fn assert_near(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "actual: {}, expected: {}",
        actual,
        expected
    );
}

fn simple_1d(slow_len: f32, fast_len: f32) -> (AnimatorController, BlockId) {
    let mut ctrl = AnimatorController::new();
    let slow = load(&mut ctrl, constant_motion("slow", &BONES, slow_len, 0.0));
    let fast = load(&mut ctrl, constant_motion("fast", &BONES, fast_len, 10.0));
    ctrl.add_parameter("Speed", Parameter::float(0.0)).unwrap();
    ctrl.add_layer("Base");
    let tree = BlendTree::new(BlendType::Simple1D, &["Speed"])
        .with_child_1d(slow, 0.0)
        .with_child_1d(fast, 1.0);
    let id = ctrl.add_blend_tree(root(&ctrl, 0), "Move", tree).unwrap();
    (ctrl, id)
}

#[test]
fn test_simple_1d() {
    init_log();
    let (ctrl, tree) = simple_1d(1.0, 1.0);
    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    assert_eq!(animator.blend_weights(tree), None);

    animator.set_float("Speed", 0.5);
    assert_near(step(&mut animator, &skeleton, 0.0)[0], 5.0);
    assert_eq!(animator.blend_weights(tree), Some(&[0.5, 0.5][..]));

    animator.set_float("Speed", 0.0);
    assert_near(step(&mut animator, &skeleton, 0.1)[0], 0.0);
    assert_eq!(animator.blend_weights(tree), Some(&[1.0, 0.0][..]));

    animator.set_float("Speed", 1.2);
    assert_near(step(&mut animator, &skeleton, 0.1)[0], 10.0);
    assert_eq!(animator.blend_weights(tree), Some(&[0.0, 1.0][..]));

    animator.set_float("Speed", -3.0);
    step(&mut animator, &skeleton, 0.1);
    assert_eq!(animator.blend_weights(tree), Some(&[1.0, 0.0][..]));
}

#[test]
fn test_time_sync() {
    init_log();
    let (ctrl, tree) = simple_1d(1.0, 3.0);
    let skeleton = skeleton(&BONES);

    let mut animator = Animator::new(&ctrl);
    animator.set_float("Speed", 0.5);
    step(&mut animator, &skeleton, 0.3);
    assert_near(animator.block_time(tree), 0.2);

    let mut animator = Animator::new(&ctrl);
    animator.set_float("Speed", 1.0);
    step(&mut animator, &skeleton, 0.3);
    assert_near(animator.block_time(tree), 0.1);
}

#[test]
fn test_unloaded_child() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let slow = load(&mut ctrl, constant_motion("slow", &BONES, 1.0, 0.0));
    let pending = ctrl.add_motion("pending");
    ctrl.add_parameter("Speed", Parameter::float(0.5)).unwrap();
    ctrl.add_layer("Base");
    let tree = BlendTree::new(BlendType::Simple1D, &["Speed"])
        .with_child_1d(slow, 0.0)
        .with_child_1d(pending, 1.0);
    let id = ctrl.add_blend_tree(root(&ctrl, 0), "Move", tree).unwrap();

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    step(&mut animator, &skeleton, 0.1);
    assert_eq!(animator.blend_weights(id), Some(&[1.0, 0.0][..]));
}

#[test]
fn test_simple_2d() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let center = load(&mut ctrl, constant_motion("center", &BONES, 1.0, 0.0));
    let right = load(&mut ctrl, constant_motion("right", &BONES, 1.0, 10.0));
    let forward = load(&mut ctrl, constant_motion("forward", &BONES, 1.0, -10.0));
    ctrl.add_parameter("X", Parameter::float(0.8)).unwrap();
    ctrl.add_parameter("Y", Parameter::float(0.1)).unwrap();
    ctrl.add_layer("Base");
    let tree = BlendTree::new(BlendType::Simple2D, &["X", "Y"])
        .with_child_2d(center, 0.0, 0.0)
        .with_child_2d(right, 1.0, 0.0)
        .with_child_2d(forward, 0.0, 1.0);
    let id = ctrl.add_blend_tree(root(&ctrl, 0), "Strafe", tree).unwrap();

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    let pose = step(&mut animator, &skeleton, 0.0);
    let weights = animator.blend_weights(id).unwrap();
    assert_near(weights[0], 0.2);
    assert_near(weights[1], 0.8);
    assert_eq!(weights[2], 0.0);
    assert_near(pose[0], 8.0);
}

#[test]
fn test_freeform_weights() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let mut tree = BlendTree::new(BlendType::FreeformCartesian2D, &["X", "Y"]);
    for (idx, (x, y)) in [(0.0, 0.0), (1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)]
        .iter()
        .enumerate()
    {
        let motion = load(&mut ctrl, constant_motion(&format!("m{}", idx), &BONES, 1.0, idx as f32));
        tree = tree.with_child_2d(motion, *x, *y);
    }
    ctrl.add_parameter("X", Parameter::float(0.0)).unwrap();
    ctrl.add_parameter("Y", Parameter::float(0.0)).unwrap();
    ctrl.add_layer("Base");
    let id = ctrl.add_blend_tree(root(&ctrl, 0), "Move", tree).unwrap();

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);

    animator.set_float("X", 1.0);
    step(&mut animator, &skeleton, 0.0);
    let weights = animator.blend_weights(id).unwrap();
    assert_near(weights[1], 1.0);

    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        animator.set_float("X", rng.gen_range(-2.0..2.0));
        animator.set_float("Y", rng.gen_range(-2.0..2.0));
        step(&mut animator, &skeleton, 0.016);
        let weights = animator.blend_weights(id).unwrap();
        assert_eq!(weights.len(), 5);
        assert!(weights.iter().all(|weight| *weight >= 0.0));
        assert_near(weights.iter().sum::<f32>(), 1.0);
    }
}

#[test]
fn test_freeform_3d_weights() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let mut tree = BlendTree::new(BlendType::FreeformCartesian3D, &["X", "Y", "Z"]);
    let points = [
        (0.0, 0.0, 0.0),
        (1.0, 0.0, 0.0),
        (0.0, 1.0, 0.0),
        (0.0, 0.0, 1.0),
        (0.0, 0.0, -1.0),
    ];
    for (idx, (x, y, z)) in points.iter().enumerate() {
        let motion = load(&mut ctrl, constant_motion(&format!("m{}", idx), &BONES, 1.0, idx as f32));
        tree = tree.with_child_3d(motion, *x, *y, *z);
    }
    let pending = ctrl.add_motion("pending");
    tree = tree.with_child_3d(pending, 0.0, -1.0, 0.0);
    for name in ["X", "Y", "Z"] {
        ctrl.add_parameter(name, Parameter::float(0.0)).unwrap();
    }
    ctrl.add_layer("Base");
    let id = ctrl.add_blend_tree(root(&ctrl, 0), "Fly", tree).unwrap();

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);

    animator.set_float("Z", 1.0);
    assert_near(step(&mut animator, &skeleton, 0.0)[0], 3.0);
    assert_near(animator.blend_weights(id).unwrap()[3], 1.0);

    let mut rng = rand::rngs::StdRng::seed_from_u64(0x3d);
    for _ in 0..200 {
        animator.set_float("X", rng.gen_range(-2.0..2.0));
        animator.set_float("Y", rng.gen_range(-2.0..2.0));
        animator.set_float("Z", rng.gen_range(-2.0..2.0));
        step(&mut animator, &skeleton, 0.016);
        let weights = animator.blend_weights(id).unwrap();
        assert_eq!(weights.len(), 6);
        assert_eq!(weights[5], 0.0);
        assert!(weights.iter().all(|weight| *weight >= 0.0));
        assert_near(weights.iter().sum::<f32>(), 1.0);
    }
}

#[test]
fn test_blend_tree_wrap_mode() {
    let mut tree = BlendTree::new(BlendType::Simple1D, &["Speed"]);
    assert_eq!(tree.wrap_mode(), WrapMode::Loop);
    assert!(tree.set_wrap_mode(WrapMode::Clamp).is_ok());
    assert_eq!(tree.set_wrap_mode(WrapMode::PingPong), Err(AnimError::InvalidWrapMode));
    assert_eq!(tree.wrap_mode(), WrapMode::Clamp);
}
