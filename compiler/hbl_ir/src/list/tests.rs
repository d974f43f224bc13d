use super::*;
use crate::{Jump, Opcode};
use pretty_assertions::assert_eq;

fn three_formulas() -> InstructionList {
    let mut list = InstructionList::new("a=1;b=2;c=3;", None);
    for text in ["a=1", "b=2", "c=3"] {
        list.push(Command::new(Opcode::Formula, text).with_text(text));
    }
    list
}

#[test]
fn test_pc_clamps_to_terminal() {
    let list = three_formulas();
    list.set_pc(10);
    assert_eq!(list.pc(), 3);
    assert!(list.is_finished());
}

#[test]
fn test_enter_leave_restores_counter() {
    let list = three_formulas();
    list.enter();
    list.advance();
    list.advance();
    assert_eq!(list.pc(), 2);

    // a recursive run of the same list
    list.enter();
    assert_eq!(list.pc(), 0);
    assert_eq!(list.active_runs(), 2);
    list.finish();
    list.leave();

    assert_eq!(list.pc(), 2);
    list.leave();
    assert_eq!(list.active_runs(), 0);
}

#[test]
fn test_enter_clears_result() {
    let list = three_formulas();
    list.set_result(Value::Number(4.0));
    list.enter();
    assert!(list.result().is_undefined());
}

#[test]
fn test_disassembly() {
    let mut list = three_formulas();
    list.push(Command::jump(Jump::to(0), "loop"));
    assert_eq!(
        list.to_string(),
        "Step 0. a=1\nStep 1. b=2\nStep 2. c=3\nStep 3. Go to step 0"
    );
}

#[test]
fn test_qualify_uses_namespace() {
    let list = InstructionList::new("", Some("ns".into()));
    assert_eq!(list.qualify("x"), "ns.x");
    assert_eq!(list.qualify_with("x", Some("_lf1")), "ns._lf1.x");
    assert_eq!(list.trim_namespace("ns.x"), "x");
    assert_eq!(InstructionList::new("", Some(String::new())).namespace(), None);
}

#[test]
fn test_profile_counters() {
    let list = three_formulas();
    assert!(!list.is_profiling());
    list.start_profile();
    list.record_profile(1, 0.5);
    list.record_profile(1, 0.25);
    list.set_profile_active(false);
    list.record_profile(7, 1.0);
    let profile = list.profile().unwrap_or_default();
    assert_eq!(profile.hits, vec![0, 2, 0]);
    assert_eq!(profile.seconds[1], 0.75);
    assert!(!list.is_profiling());
}

#[test]
fn test_input_queue() {
    let list = three_formulas();
    assert_eq!(list.next_input(), None);
    let queue: InputQueue = Rc::new(RefCell::new(VecDeque::from(vec!["one".to_string()])));
    list.set_input(Some(queue));
    assert_eq!(list.next_input(), Some(Some("one".to_string())));
    assert_eq!(list.next_input(), Some(None));
}
