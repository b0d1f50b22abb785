use animator_rs::*;

mod common;
use common::*;

const BONES: [&str; 2] = ["hips", "spine"];

fn assert_near(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "actual: {}, expected: {}",
        actual,
        expected
    );
}

#[test]
fn test_loop_periodicity() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let run = load(&mut ctrl, linear_motion("run", &BONES, 2.0, 0.0, 1.0));
    ctrl.add_layer("Base");
    ctrl.add_state(root(&ctrl, 0), "Run", State::new(Some(run))).unwrap();

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    let first = step(&mut animator, &skeleton, 0.5);
    assert_near(first[0], 0.25);
    assert_near(animator.normalized_time(0), 0.25);

    let looped = step(&mut animator, &skeleton, 2.0);
    assert_near(animator.normalized_time(0), 1.25);
    assert_near(looped[0], first[0]);
    assert_near(looped[1], first[1]);
}

#[test]
fn test_wrap_and_speed() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let run = load(&mut ctrl, linear_motion("run", &BONES, 1.0, 0.0, 1.0));
    ctrl.add_parameter("Speed", Parameter::float(1.0)).unwrap();
    ctrl.add_layer("Base");
    ctrl.add_state(
        root(&ctrl, 0),
        "Run",
        State::new(Some(run))
            .with_wrap_mode(WrapMode::Clamp)
            .with_speed_parameter("Speed"),
    )
    .unwrap();

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    animator.set_float("Speed", 2.0);
    assert_near(step(&mut animator, &skeleton, 0.25)[0], 0.5);
    assert_near(step(&mut animator, &skeleton, 1.0)[0], 1.0);
    assert_near(animator.normalized_time(0), 2.5);
}

#[test]
fn test_non_finite_input() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let run = load(&mut ctrl, linear_motion("run", &BONES, 1.0, 0.0, 1.0));
    ctrl.add_parameter("Speed", Parameter::float(1.0)).unwrap();
    ctrl.add_layer("Base");
    let rt = root(&ctrl, 0);
    ctrl.add_state(rt, "Run", State::new(Some(run)).with_speed_parameter("Speed"))
        .unwrap();

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    assert_near(step(&mut animator, &skeleton, 0.25)[0], 0.25);

    animator.set_float("Speed", f32::INFINITY);
    assert_near(step(&mut animator, &skeleton, 0.1)[0], 0.25);
    animator.set_float("Speed", f32::NAN);
    assert_near(step(&mut animator, &skeleton, 0.1)[0], 0.25);

    animator.set_float("Speed", 1.0);
    assert_near(step(&mut animator, &skeleton, f32::NAN)[0], 0.25);
    assert_near(step(&mut animator, &skeleton, f32::INFINITY)[0], 0.25);
    assert_near(step(&mut animator, &skeleton, 0.25)[0], 0.5);
    assert_near(animator.normalized_time(0), 0.5);

    // a constant infinite speed never moves the clip either
    let mut ctrl = AnimatorController::new();
    let run = load(&mut ctrl, linear_motion("run", &BONES, 1.0, 0.0, 1.0));
    ctrl.add_layer("Base");
    ctrl.add_state(root(&ctrl, 0), "Run", State::new(Some(run)).with_speed(f32::INFINITY))
        .unwrap();
    let mut animator = Animator::new(&ctrl);
    assert_near(step(&mut animator, &skeleton, 0.1)[0], 0.0);
    assert_near(animator.normalized_time(0), 0.0);
}

#[test]
fn test_transition_continuity() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let idle = load(&mut ctrl, constant_motion("idle", &BONES, 1.0, 1.0));
    let walk = load(&mut ctrl, constant_motion("walk", &BONES, 1.0, 2.0));
    ctrl.add_parameter("Walk", Parameter::bool(false)).unwrap();
    ctrl.add_layer("Base");
    let a = ctrl.add_state(root(&ctrl, 0), "Idle", State::new(Some(idle))).unwrap();
    let b = ctrl.add_state(root(&ctrl, 0), "Walk", State::new(Some(walk))).unwrap();
    ctrl.add_transition(
        a,
        Transition::new(b)
            .with_condition(Condition::when("Walk"))
            .with_duration(0.3)
            .with_offset(0.0),
    )
    .unwrap();

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    assert_near(step(&mut animator, &skeleton, 0.0)[0], 1.0);
    assert_eq!(animator.current_block(0), Some(a));
    assert_near(animator.normalized_time(0), 0.0);

    animator.set_bool("Walk", true);
    let mut prev = step(&mut animator, &skeleton, 0.0);
    assert_eq!(animator.phase(0), MachinePhase::Transition);
    assert_eq!(animator.next_block(0), Some(b));

    let mut frames = 0;
    while animator.phase(0) != MachinePhase::Play {
        let pose = step(&mut animator, &skeleton, 0.001);
        assert!((pose[0] - prev[0]).abs() < 0.01, "jump at frame {}", frames);
        assert!(pose[0] >= prev[0] - 1e-6);
        prev = pose;
        frames += 1;
        assert!(frames < 1000);
    }
    assert!((299..=301).contains(&frames));
    assert_eq!(animator.current_block(0), Some(b));
    assert_eq!(animator.next_block(0), None);
    assert_near(prev[0], 2.0);
}

#[test]
fn test_trigger_and_exit_time() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let m = load(&mut ctrl, constant_motion("m", &BONES, 1.0, 0.0));
    ctrl.add_parameter("Jump", Parameter::trigger()).unwrap();
    ctrl.add_layer("Base");
    let rt = root(&ctrl, 0);
    let a = ctrl.add_state(rt, "A", State::new(Some(m))).unwrap();
    let b = ctrl.add_state(rt, "B", State::new(Some(m))).unwrap();
    let c = ctrl.add_state(rt, "C", State::new(Some(m))).unwrap();
    ctrl.add_transition(
        a,
        Transition::new(b)
            .with_condition(Condition::when("Jump"))
            .with_duration(0.0),
    )
    .unwrap();
    ctrl.add_transition(b, Transition::new(c).with_exit_time(0.5).with_duration(0.0))
        .unwrap();

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    step(&mut animator, &skeleton, 0.1);
    assert_eq!(animator.current_block(0), Some(a));

    animator.set_trigger("Jump");
    assert!(animator.get_bool("Jump"));
    step(&mut animator, &skeleton, 0.1);
    assert_eq!(animator.current_block(0), Some(b));
    assert_eq!(animator.phase(0), MachinePhase::Play);
    assert!(!animator.get_bool("Jump"));

    step(&mut animator, &skeleton, 0.4);
    assert_eq!(animator.current_block(0), Some(b));
    step(&mut animator, &skeleton, 0.2);
    assert_eq!(animator.current_block(0), Some(c));

    // an unused trigger stays set until reset
    animator.set_trigger("Jump");
    step(&mut animator, &skeleton, 0.1);
    assert!(animator.get_bool("Jump"));
    animator.reset_trigger("Jump");
    assert!(!animator.get_bool("Jump"));
}

#[test]
fn test_interruption() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let ma = load(&mut ctrl, constant_motion("a", &BONES, 1.0, 0.0));
    let mb = load(&mut ctrl, constant_motion("b", &BONES, 1.0, 10.0));
    let mc = load(&mut ctrl, constant_motion("c", &BONES, 1.0, -10.0));
    ctrl.add_parameter("ToB", Parameter::bool(false)).unwrap();
    ctrl.add_parameter("ToC", Parameter::bool(false)).unwrap();
    ctrl.add_layer("Base");
    let rt = root(&ctrl, 0);
    let a = ctrl.add_state(rt, "A", State::new(Some(ma))).unwrap();
    let b = ctrl.add_state(rt, "B", State::new(Some(mb))).unwrap();
    let c = ctrl.add_state(rt, "C", State::new(Some(mc))).unwrap();
    ctrl.add_transition(
        a,
        Transition::new(b)
            .with_condition(Condition::when("ToB"))
            .with_duration(0.5),
    )
    .unwrap();
    ctrl.add_transition(
        a,
        Transition::new(c)
            .with_condition(Condition::when("ToC"))
            .with_duration(0.5)
            .with_interruption(InterruptionSource::Current),
    )
    .unwrap();

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    step(&mut animator, &skeleton, 0.1);

    animator.set_bool("ToB", true);
    assert_near(step(&mut animator, &skeleton, 0.0)[0], 0.0);
    let before = step(&mut animator, &skeleton, 0.1);
    assert_near(before[0], 2.0);

    animator.set_bool("ToC", true);
    let frozen = step(&mut animator, &skeleton, 0.1);
    assert_eq!(animator.phase(0), MachinePhase::InterruptTransition);
    assert_eq!(animator.current_block(0), Some(a));
    assert_eq!(animator.next_block(0), Some(c));
    assert_near(frozen[0], before[0]);

    let blended = step(&mut animator, &skeleton, 0.1);
    assert_near(blended[0], 2.0 + 0.2 * (-10.0 - 2.0));
    assert_eq!(animator.phase(0), MachinePhase::InterruptTransition);

    let done = step(&mut animator, &skeleton, 0.5);
    assert_eq!(animator.phase(0), MachinePhase::Play);
    assert_eq!(animator.current_block(0), Some(c));
    assert_near(done[0], -10.0);
}

#[test]
fn test_nested_state_machine() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let idle = load(&mut ctrl, constant_motion("idle", &BONES, 1.0, 0.0));
    let walk = load(&mut ctrl, linear_motion("walk", &BONES, 1.0, 10.0, 11.0));
    ctrl.add_parameter("Stop", Parameter::bool(false)).unwrap();
    ctrl.add_layer("Base");
    let rt = root(&ctrl, 0);
    let loco = ctrl.add_state_machine(rt, "Locomotion").unwrap();
    let rest = ctrl.add_state(rt, "Idle", State::new(Some(idle))).unwrap();
    let inner = ctrl.add_state(loco, "Walk", State::new(Some(walk))).unwrap();
    ctrl.add_transition(
        loco,
        Transition::new(rest)
            .with_condition(Condition::when("Stop"))
            .with_duration(0.0),
    )
    .unwrap();
    ctrl.add_transition(
        rest,
        Transition::new(loco)
            .with_condition(Condition::new(ConditionMode::IfNot, 0.0, "Stop"))
            .with_duration(0.0),
    )
    .unwrap();
    ctrl.set_callbacks(loco, None, Some(EventCall::new("Loco", "Exit"))).unwrap();
    ctrl.set_callbacks(inner, None, Some(EventCall::new("Walk", "Exit"))).unwrap();

    let skeleton = skeleton(&BONES);
    let (mut table, log) = recording_table(&[("Loco", "Exit"), ("Walk", "Exit")]);
    let mut animator = Animator::new(&ctrl);

    let pose = step(&mut animator, &skeleton, 0.5);
    assert_near(pose[0], 10.5);
    assert_eq!(animator.current_block(0), Some(loco));
    assert_eq!(animator.active_block(loco), Some(inner));
    assert_near(animator.normalized_time(0), 0.5);

    animator.set_bool("Stop", true);
    animator
        .apply_animation_transform(0.1, &skeleton, &[], &mut table)
        .unwrap();
    assert_eq!(animator.current_block(0), Some(rest));
    assert_near(animator.output()[0].translation.x, 0.0);
    assert_eq!(*log.borrow(), vec!["Loco::Exit".to_string()]);

    // re-entering restarts the nested machine from its entry
    animator.set_bool("Stop", false);
    let pose = step(&mut animator, &skeleton, 0.0);
    assert_eq!(animator.current_block(0), Some(loco));
    assert_eq!(animator.active_block(loco), Some(inner));
    assert_near(animator.block_time(inner), 0.0);
    assert_near(pose[0], 10.0);
}

#[test]
fn test_entry_transition() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let ma = load(&mut ctrl, constant_motion("a", &BONES, 1.0, 1.0));
    let mb = load(&mut ctrl, constant_motion("b", &BONES, 1.0, 2.0));
    ctrl.add_parameter("Mode", Parameter::int(0)).unwrap();
    ctrl.add_layer("Base");
    let rt = root(&ctrl, 0);
    let a = ctrl.add_state(rt, "A", State::new(Some(ma))).unwrap();
    let b = ctrl.add_state(rt, "B", State::new(Some(mb))).unwrap();
    ctrl.add_entry_transition(
        rt,
        Transition::new(b)
            .with_condition(Condition::new(ConditionMode::Equal, 2.0, "Mode"))
            .with_exit_time(0.9)
            .with_offset(0.5),
    )
    .unwrap();
    assert!(!ctrl.block(rt).unwrap().as_state_machine().unwrap().entry_transitions()[0].has_exit_time);

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    assert_near(step(&mut animator, &skeleton, 0.0)[0], 1.0);
    assert_eq!(animator.current_block(0), Some(a));

    let mut animator = Animator::new(&ctrl);
    animator.set_integer("Mode", 2);
    assert_near(step(&mut animator, &skeleton, 0.0)[0], 2.0);
    assert_eq!(animator.current_block(0), Some(b));
    assert_near(animator.normalized_time(0), 0.5);
}

#[test]
fn test_events() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let m = load(&mut ctrl, constant_motion("m", &BONES, 1.0, 0.0));
    ctrl.add_parameter("Go", Parameter::trigger()).unwrap();
    ctrl.add_layer("Base");
    let rt = root(&ctrl, 0);
    let a = ctrl
        .add_state(
            rt,
            "A",
            State::new(Some(m)).with_event(TimelineEvent::new(0.5, EventCall::with_int("A", "Half", 1))),
        )
        .unwrap();
    let b = ctrl.add_state(rt, "B", State::new(Some(m))).unwrap();
    ctrl.set_callbacks(a, Some(EventCall::new("A", "Enter")), Some(EventCall::new("A", "Exit")))
        .unwrap();
    ctrl.set_callbacks(b, Some(EventCall::new("B", "Enter")), None).unwrap();
    ctrl.add_transition(
        a,
        Transition::new(b)
            .with_condition(Condition::when("Go"))
            .with_duration(0.0),
    )
    .unwrap();

    let skeleton = skeleton(&BONES);
    // B::Enter isn't registered, its dispatch fails without failing the evaluation
    let (mut table, log) = recording_table(&[("A", "Enter"), ("A", "Exit"), ("A", "Half")]);
    let mut animator = Animator::new(&ctrl);
    animator
        .apply_animation_transform(0.25, &skeleton, &[], &mut table)
        .unwrap();
    animator
        .apply_animation_transform(0.5, &skeleton, &[], &mut table)
        .unwrap();
    assert_eq!(animator.events().len(), 1);
    assert_eq!(animator.events()[0].kind, EventKind::Timeline);
    assert_eq!(animator.events()[0].call.arg, EventArg::Int(1));
    animator
        .apply_animation_transform(0.8, &skeleton, &[], &mut table)
        .unwrap();

    animator.set_trigger("Go");
    animator
        .apply_animation_transform(0.0, &skeleton, &[], &mut table)
        .unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["A::Enter", "A::Half", "A::Half", "A::Exit"]
    );
    let kinds: Vec<EventKind> = animator.events().iter().map(|event| event.kind).collect();
    assert_eq!(kinds, vec![EventKind::Enter, EventKind::Exit]);
    assert!(animator.events().iter().all(|event| event.layer == 0));
}

#[test]
fn test_trigger_consumed_once() {
    init_log();
    let mut ctrl = AnimatorController::new();
    let m = load(&mut ctrl, constant_motion("m", &BONES, 1.0, 0.0));
    ctrl.add_parameter("Fire", Parameter::trigger()).unwrap();
    let mut targets = Vec::new();
    for name in ["Base", "Upper"] {
        let layer = ctrl.add_layer(name);
        let rt = root(&ctrl, layer);
        let idle = ctrl.add_state(rt, "Idle", State::new(Some(m))).unwrap();
        let shoot = ctrl.add_state(rt, "Shoot", State::new(Some(m))).unwrap();
        ctrl.add_transition(idle, Transition::new(shoot).with_condition(Condition::when("Fire")))
            .unwrap();
        targets.push((idle, shoot));
    }

    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(&ctrl);
    step(&mut animator, &skeleton, 0.1);
    animator.set_trigger("Fire");
    step(&mut animator, &skeleton, 0.1);
    assert!(!animator.get_bool("Fire"));
    assert_eq!(animator.next_block(0), Some(targets[0].1));
    assert_eq!(animator.next_block(1), None);
    assert_eq!(animator.current_block(1), Some(targets[1].0));
}
