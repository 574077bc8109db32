use std::cell::RefCell;
use std::rc::Rc;

use ai_bt::nodes::{
    Atan2, Compare, CompareOp, Condition, CopyVariable, Cosine, FnAction, FnCondition, Inverter,
    Loop, LoopKind, MakeVector2, Selector, Sequence,
};
use ai_bt::{BehaviorTree, NodeContext, NodeGraph, NodeId, NodeStatus, TreeConfig};
use ai_core::{NumberField, Value, Vec2, VariableId, Variables};

type Log = Rc<RefCell<Vec<&'static str>>>;

fn leaf(graph: &mut NodeGraph, log: &Log, name: &'static str, status: NodeStatus) -> NodeId {
    let log = log.clone();
    graph.add(
        name,
        FnAction::new(move |_ctx: &mut NodeContext<'_>| {
            log.borrow_mut().push(name);
            status
        }),
    )
}

/// Run the tree once to completion, without restarts.
fn run_once(graph: NodeGraph, root: NodeId, variables: Variables) -> BehaviorTree {
    let mut tree = BehaviorTree::new(graph, root, variables)
        .expect("valid tree")
        .with_config(TreeConfig {
            restart_on_end: false,
            ..TreeConfig::default()
        });
    tree.start().expect("start");
    tree
}

#[test]
fn sequence_reports_the_last_childs_result() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let a = leaf(&mut graph, &log, "a", NodeStatus::Success);
    let b = leaf(&mut graph, &log, "b", NodeStatus::Success);
    let c = leaf(&mut graph, &log, "c", NodeStatus::Failed);
    let root = graph.add("seq", Sequence::new(vec![a, b, c]));

    let tree = run_once(graph, root, Variables::new());

    assert_eq!(log.borrow().as_slice(), &["a", "b", "c"]);
    assert_eq!(tree.completed_runs(), 1);
    assert_eq!(tree.last_result(), Some(false));
}

#[test]
fn sequence_keeps_going_after_a_failure() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let a = leaf(&mut graph, &log, "a", NodeStatus::Failed);
    let b = leaf(&mut graph, &log, "b", NodeStatus::Success);
    let root = graph.add("seq", Sequence::new(vec![a, b]));

    let tree = run_once(graph, root, Variables::new());

    assert_eq!(log.borrow().as_slice(), &["a", "b"]);
    assert_eq!(tree.last_result(), Some(true));
}

#[test]
fn empty_sequence_fails() {
    let mut graph = NodeGraph::new();
    let root = graph.add("seq", Sequence::new(Vec::new()));

    let tree = run_once(graph, root, Variables::new());

    assert_eq!(tree.last_result(), Some(false));
}

#[test]
fn selector_stops_on_first_success() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let a = leaf(&mut graph, &log, "a", NodeStatus::Failed);
    let b = leaf(&mut graph, &log, "b", NodeStatus::Success);
    let c = leaf(&mut graph, &log, "c", NodeStatus::Success);
    let root = graph.add("sel", Selector::new(vec![a, b, c]));

    let tree = run_once(graph, root, Variables::new());

    assert_eq!(log.borrow().as_slice(), &["a", "b"]);
    assert_eq!(tree.last_result(), Some(true));
}

#[test]
fn selector_fails_when_every_child_fails() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let a = leaf(&mut graph, &log, "a", NodeStatus::Failed);
    let b = leaf(&mut graph, &log, "b", NodeStatus::Failed);
    let root = graph.add("sel", Selector::new(vec![a, b]));

    let tree = run_once(graph, root, Variables::new());

    assert_eq!(log.borrow().as_slice(), &["a", "b"]);
    assert_eq!(tree.last_result(), Some(false));
}

#[test]
fn for_loop_reads_its_count_from_a_variable() {
    let count = VariableId(1);
    let mut variables = Variables::new();
    variables.declare(count, 3i32).expect("declare");

    let log = Log::default();
    let mut graph = NodeGraph::new();
    let a = leaf(&mut graph, &log, "a", NodeStatus::Failed);
    let b = leaf(&mut graph, &log, "b", NodeStatus::Success);
    let root = graph.add("loop", Loop::new(LoopKind::For(count.into()), vec![a, b]));

    let tree = run_once(graph, root, variables);

    assert_eq!(log.borrow().as_slice(), &["a", "b", "a", "b", "a", "b"]);
    assert_eq!(tree.last_result(), Some(true));
}

#[test]
fn for_loop_rounds_fractional_counts_up() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let a = leaf(&mut graph, &log, "a", NodeStatus::Success);
    let root = graph.add("loop", Loop::new(LoopKind::For(NumberField::Const(1.5)), vec![a]));

    run_once(graph, root, Variables::new());

    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn while_loop_checks_before_and_do_while_after_each_iteration() {
    let remaining = VariableId(7);

    for (kind, expected) in [("while", 0usize), ("do_while", 1)] {
        let mut variables = Variables::new();
        variables.declare(remaining, 0i32).expect("declare");

        let log = Log::default();
        let mut graph = NodeGraph::new();
        let body = leaf(&mut graph, &log, "body", NodeStatus::Success);
        let check = graph.add(
            "check",
            Compare::new(remaining, CompareOp::Greater, 0.0f32),
        );
        let loop_kind = if kind == "while" {
            LoopKind::While(check)
        } else {
            LoopKind::DoWhile(check)
        };
        let root = graph.add(kind, Loop::new(loop_kind, vec![body]));

        let tree = run_once(graph, root, variables);

        assert_eq!(log.borrow().len(), expected, "{kind}");
        assert_eq!(tree.last_result(), Some(true));
    }
}

#[test]
fn while_loop_runs_until_its_condition_fails() {
    let remaining = VariableId(7);
    let mut variables = Variables::new();
    variables.declare(remaining, 3i32).expect("declare");

    let mut graph = NodeGraph::new();
    let body = graph.add(
        "decrement",
        FnAction::new(move |ctx: &mut NodeContext<'_>| {
            let vars = ctx.variables_mut();
            let Some(Value::Int(left)) = vars.get(remaining).cloned() else {
                return NodeStatus::Error;
            };
            NodeStatus::of(vars.set(remaining, left - 1).is_ok())
        }),
    );
    let check = graph.add("check", Compare::new(remaining, CompareOp::Greater, 0.0f32));
    let root = graph.add("loop", Loop::new(LoopKind::While(check), vec![body]));

    let tree = run_once(graph, root, variables);

    assert_eq!(tree.variables().get(remaining), Some(&Value::Int(0)));
    assert_eq!(tree.last_result(), Some(true));
}

#[test]
fn condition_takes_the_matching_branch() {
    for (flag, expected) in [(true, "then"), (false, "else")] {
        let log = Log::default();
        let mut graph = NodeGraph::new();
        let check = graph.add("check", FnCondition::new(move |_vars: &Variables| flag));
        let then = leaf(&mut graph, &log, "then", NodeStatus::Success);
        let otherwise = leaf(&mut graph, &log, "else", NodeStatus::Failed);
        let root = graph.add("if", Condition::new(check, Some(then), Some(otherwise)));

        let tree = run_once(graph, root, Variables::new());

        assert_eq!(log.borrow().as_slice(), &[expected]);
        assert_eq!(tree.last_result(), Some(flag));
    }
}

#[test]
fn condition_without_a_branch_reports_the_condition() {
    let mut graph = NodeGraph::new();
    let check = graph.add("check", FnCondition::new(|_vars: &Variables| false));
    let root = graph.add("if", Condition::new(check, None, None));

    let tree = run_once(graph, root, Variables::new());

    assert_eq!(tree.last_result(), Some(false));
}

#[test]
fn inverter_flips_its_child() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let child = leaf(&mut graph, &log, "child", NodeStatus::Success);
    let root = graph.add("not", Inverter::new(child));

    let tree = run_once(graph, root, Variables::new());

    assert_eq!(tree.last_result(), Some(false));
}

#[test]
fn arithmetic_nodes_write_their_outputs() {
    let angle = VariableId(1);
    let cosine = VariableId(2);
    let heading = VariableId(3);
    let label = VariableId(4);
    let point = VariableId(5);

    let mut variables = Variables::new();
    variables.declare(angle, 0i32).expect("declare");
    variables.declare(cosine, 0.0f32).expect("declare");
    variables.declare(heading, 0.0f32).expect("declare");
    variables.declare(label, String::new()).expect("declare");
    variables.declare(point, Vec2::ZERO).expect("declare");

    let mut graph = NodeGraph::new();
    let cos = graph.add("cos", Cosine::new(angle, cosine));
    let atan = graph.add("atan", Atan2::new(-2.0f32, 0.0f32, heading));
    let copy = graph.add("copy", CopyVariable::new(cosine, label));
    let make = graph.add("make", MakeVector2::new(cosine, 4.0f32, point));
    let root = graph.add("seq", Sequence::new(vec![cos, atan, copy, make]));

    let tree = run_once(graph, root, variables);
    let vars = tree.variables();

    assert_eq!(tree.last_result(), Some(true));
    assert_eq!(vars.get(cosine), Some(&Value::Float(1.0)));
    assert_eq!(
        vars.get(heading),
        Some(&Value::Float(-core::f32::consts::FRAC_PI_2))
    );
    assert_eq!(vars.get(label), Some(&Value::String("1".to_string())));
    assert_eq!(vars.get(point), Some(&Value::Vector2(Vec2::new(1.0, 4.0))));
}

#[test]
fn atan2_at_the_origin_fails() {
    let heading = VariableId(3);
    let mut variables = Variables::new();
    variables.declare(heading, 0i32).expect("declare");

    let mut graph = NodeGraph::new();
    let root = graph.add("atan", Atan2::new(0.0f32, 0.0f32, heading));

    let tree = run_once(graph, root, variables);

    assert_eq!(tree.last_result(), Some(false));
    assert_eq!(tree.variables().get(heading), Some(&Value::Int(0)));
}

#[test]
fn copy_without_a_conversion_fails() {
    let from = VariableId(1);
    let to = VariableId(2);
    let mut variables = Variables::new();
    variables.declare(from, Vec2::new(1.0, 2.0)).expect("declare");
    variables.declare(to, 0i32).expect("declare");

    let mut graph = NodeGraph::new();
    let root = graph.add("copy", CopyVariable::new(from, to));

    let tree = run_once(graph, root, variables);

    assert_eq!(tree.last_result(), Some(false));
}
