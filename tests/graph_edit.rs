use animator_rs::*;

mod common;
use common::*;

const BONES: [&str; 1] = ["root"];

fn graph() -> (AnimatorController, Vec<BlockId>) {
    let mut ctrl = AnimatorController::new();
    let m = load(&mut ctrl, constant_motion("m", &BONES, 1.0, 0.0));
    ctrl.add_parameter("Go", Parameter::bool(false)).unwrap();
    ctrl.add_layer("Base");
    let rt = root(&ctrl, 0);
    let a = ctrl.add_state(rt, "A", State::new(Some(m))).unwrap();
    let b = ctrl.add_state(rt, "B", State::new(Some(m))).unwrap();
    let c = ctrl.add_state(rt, "C", State::new(Some(m))).unwrap();
    let go = || Condition::when("Go");
    ctrl.add_transition(a, Transition::new(b).with_condition(go())).unwrap();
    ctrl.add_transition(a, Transition::new(c).with_condition(go())).unwrap();
    ctrl.add_transition(c, Transition::new(b).with_condition(go())).unwrap();
    ctrl.add_transition(b, Transition::new(a).with_condition(go())).unwrap();
    (ctrl, vec![rt, a, b, c])
}

fn destinations(ctrl: &AnimatorController, id: BlockId) -> Vec<BlockId> {
    ctrl.block(id)
        .unwrap()
        .transitions()
        .iter()
        .map(|transition| transition.destination)
        .collect()
}

#[test]
fn test_remove_renumbers_blocks() {
    init_log();
    let (mut ctrl, ids) = graph();
    let (rt, a, b, c) = (ids[0], ids[1], ids[2], ids[3]);
    for (index, id) in ids.iter().enumerate() {
        assert_eq!(ctrl.block_index(*id), Some(index));
        assert_eq!(ctrl.block_at(index), Some(*id));
    }

    ctrl.remove_block(b).unwrap();
    assert_eq!(ctrl.num_blocks(), 3);
    assert!(!ctrl.contains_block(b));
    assert!(ctrl.block(b).unwrap_err().is_invalid_block());
    assert_eq!(ctrl.block_index(b), None);
    assert_eq!(ctrl.block_index(rt), Some(0));
    assert_eq!(ctrl.block_index(a), Some(1));
    assert_eq!(ctrl.block_index(c), Some(2));
    assert_eq!(ctrl.block_at(3), None);

    assert_eq!(destinations(&ctrl, a), vec![c]);
    assert_eq!(destinations(&ctrl, c), Vec::<BlockId>::new());
    assert_eq!(ctrl.block(rt).unwrap().as_state_machine().unwrap().children(), &[a, c]);

    // handles of removed blocks stay invalid after their slot is reused
    let d = ctrl.add_state(rt, "D", State::new(None)).unwrap();
    assert_ne!(d, b);
    assert!(!ctrl.contains_block(b));
    assert_eq!(ctrl.block_index(d), Some(3));
    assert!(ctrl.add_transition(a, Transition::new(b)).is_err());
}

#[test]
fn test_remove_state_machine_subtree() {
    init_log();
    let (mut ctrl, ids) = graph();
    let rt = ids[0];
    let sub = ctrl.add_state_machine(rt, "Sub").unwrap();
    let inner = ctrl.add_state(sub, "Inner", State::new(None)).unwrap();
    let nested = ctrl.add_state_machine(sub, "Nested").unwrap();
    let deep = ctrl.add_state(nested, "Deep", State::new(None)).unwrap();
    ctrl.add_transition(ids[1], Transition::new(sub)).unwrap();
    assert_eq!(ctrl.num_blocks(), 8);

    ctrl.remove_block(sub).unwrap();
    assert_eq!(ctrl.num_blocks(), 4);
    for id in [sub, inner, nested, deep] {
        assert!(!ctrl.contains_block(id));
    }
    assert_eq!(destinations(&ctrl, ids[1]), vec![ids[2], ids[3]]);
    assert_eq!(ctrl.find_block(rt, "Sub"), None);
}

#[test]
fn test_remove_entry() {
    init_log();
    let (mut ctrl, ids) = graph();
    let (rt, a, b) = (ids[0], ids[1], ids[2]);
    ctrl.add_entry_transition(rt, Transition::new(b).with_condition(Condition::when("Go")))
        .unwrap();

    ctrl.remove_block(a).unwrap();
    let machine = ctrl.block(rt).unwrap().as_state_machine().unwrap();
    assert_eq!(machine.entry(), None);
    assert_eq!(machine.entry_transitions().len(), 1);

    ctrl.remove_block(b).unwrap();
    let machine = ctrl.block(rt).unwrap().as_state_machine().unwrap();
    assert!(machine.entry_transitions().is_empty());

    assert_eq!(ctrl.remove_block(rt), Err(AnimError::RootStateMachine));
    assert_eq!(ctrl.remove_block(a), Err(AnimError::InvalidBlock));
}

#[test]
fn test_remove_parameter() {
    init_log();
    let (mut ctrl, ids) = graph();
    let skeleton = skeleton(&BONES);
    ctrl.remove_parameter("Go").unwrap();
    assert!(ctrl.remove_parameter("Go").unwrap_err().is_invalid_parameter());
    // conditions on a removed parameter never pass
    assert_eq!(ctrl.block(ids[1]).unwrap().transitions().len(), 2);

    let mut animator = Animator::new(&ctrl);
    animator.set_bool("Go", true);
    assert!(!animator.get_bool("Go"));
    step(&mut animator, &skeleton, 0.5);
    assert_eq!(animator.current_block(0), Some(ids[1]));
}

#[test]
fn test_edit_while_playing() {
    init_log();
    let (ctrl, ids) = graph();
    let (a, b, c) = (ids[1], ids[2], ids[3]);
    let skeleton = skeleton(&BONES);
    let mut animator = Animator::new(ctrl);

    animator.set_bool("Go", true);
    step(&mut animator, &skeleton, 0.1);
    assert_eq!(animator.current_block(0), Some(a));
    assert_eq!(animator.next_block(0), Some(b));

    // the incoming block disappears mid-transition, the machine restarts
    animator.controller_mut().remove_block(b).unwrap();
    animator.set_bool("Go", false);
    step(&mut animator, &skeleton, 0.1);
    assert_eq!(animator.phase(0), MachinePhase::Play);
    assert_eq!(animator.current_block(0), Some(a));
    assert_eq!(animator.next_block(0), None);
    assert!((animator.normalized_time(0) - 0.1).abs() < 1e-5);

    animator.set_bool("Go", true);
    step(&mut animator, &skeleton, 0.1);
    assert_eq!(animator.next_block(0), Some(c));
}

#[test]
fn test_archive_after_edit() {
    init_log();
    let (mut ctrl, ids) = graph();
    ctrl.remove_block(ids[2]).unwrap();
    let sub = ctrl.add_state_machine(ids[0], "Sub").unwrap();
    ctrl.add_state(sub, "Inner", State::new(Some(MotionId(0)))).unwrap();
    ctrl.add_transition(ids[3], Transition::new(sub)).unwrap();

    let archive = ctrl.to_archive().unwrap();
    assert_eq!(archive.blocks.len(), ctrl.num_blocks());
    let restored = AnimatorController::from_archive(&archive).unwrap();
    assert_eq!(restored.num_blocks(), ctrl.num_blocks());
    for index in 0..ctrl.num_blocks() {
        let original = ctrl.block(ctrl.block_at(index).unwrap()).unwrap();
        let copy = restored.block(restored.block_at(index).unwrap()).unwrap();
        assert_eq!(original.name(), copy.name());
        assert_eq!(original.kind().type_name(), copy.kind().type_name());
        assert_eq!(original.transitions().len(), copy.transitions().len());
        for (lhs, rhs) in original.transitions().iter().zip(copy.transitions()) {
            assert_eq!(ctrl.block_index(lhs.destination), restored.block_index(rhs.destination));
        }
    }
    // motion data isn't archived, only the slot names
    assert!(!restored.motion_slot(MotionId(0)).unwrap().is_loaded());
    assert_eq!(restored.motion_by_name("m"), Some(MotionId(0)));
}
