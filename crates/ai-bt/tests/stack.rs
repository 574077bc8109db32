use std::cell::RefCell;
use std::rc::Rc;

use ai_bt::nodes::{FnAction, FnCondition, Loop, LoopKind, Sequence};
use ai_bt::{
    Diagnostic, DiagnosticKind, ExecutionStack, Node, NodeContext, NodeGraph, NodeId, NodeStatus,
    Runtime, StackError, StackLabel, StackState, TreeConfig,
};
use ai_core::Variables;

type Log = Rc<RefCell<Vec<String>>>;

/// Leaf that plays back a script of results (the last one repeats) and records every call.
struct Scripted {
    name: &'static str,
    script: Vec<NodeStatus>,
    runs: usize,
    log: Log,
}

impl Scripted {
    fn new(name: &'static str, log: &Log, script: &[NodeStatus]) -> Self {
        Self {
            name,
            script: script.to_vec(),
            runs: 0,
            log: log.clone(),
        }
    }
}

impl Node for Scripted {
    fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> NodeStatus {
        self.log.borrow_mut().push(format!("{}.execute", self.name));
        let status = self
            .script
            .get(self.runs)
            .or(self.script.last())
            .copied()
            .unwrap_or(NodeStatus::Success);
        self.runs += 1;
        status
    }

    fn stop(&mut self, _ctx: &mut NodeContext<'_>) {
        self.log.borrow_mut().push(format!("{}.stop", self.name));
    }
}

/// Composite with a single child that passes the child's result through.
struct Link {
    name: &'static str,
    child: NodeId,
    log: Log,
}

impl Link {
    fn new(name: &'static str, child: NodeId, log: &Log) -> Self {
        Self {
            name,
            child,
            log: log.clone(),
        }
    }
}

impl Node for Link {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        self.log.borrow_mut().push(format!("{}.execute", self.name));
        ctx.call(self.child)
    }

    fn receive_return_from_child(&mut self, _ctx: &mut NodeContext<'_>, success: bool) -> NodeStatus {
        self.log
            .borrow_mut()
            .push(format!("{}.receive({success})", self.name));
        NodeStatus::of(success)
    }

    fn stop(&mut self, _ctx: &mut NodeContext<'_>) {
        self.log.borrow_mut().push(format!("{}.stop", self.name));
    }

    fn children(&self) -> Vec<NodeId> {
        vec![self.child]
    }
}

/// a -> b -> c -> d, where `d` waits.
fn chain(log: &Log) -> (NodeGraph, [NodeId; 4]) {
    let mut graph = NodeGraph::new();
    let d = graph.add("d", Scripted::new("d", log, &[NodeStatus::Wait]));
    let c = graph.add("c", Link::new("c", d, log));
    let b = graph.add("b", Link::new("b", c, log));
    let a = graph.add("a", Link::new("a", b, log));
    (graph, [a, b, c, d])
}

fn stops(log: &Log) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|entry| entry.ends_with(".stop"))
        .cloned()
        .collect()
}

#[test]
fn start_drives_down_to_the_first_suspension() {
    let log = Log::default();
    let (graph, [a, b, c, d]) = chain(&log);
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);

    stack.start(a, &mut rt).expect("start");

    assert_eq!(stack.nodes(), &[a, b, c, d]);
    assert_eq!(stack.state(), StackState::Waiting);
    assert_eq!(stack.current(), None);
    assert!(stack.is_waiting_on(d));
}

#[test]
fn start_requires_an_empty_ready_stack() {
    let log = Log::default();
    let (graph, [a, ..]) = chain(&log);
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);
    stack.start(a, &mut rt).expect("start");

    let err = stack.start(a, &mut rt).unwrap_err();
    assert_eq!(
        err,
        StackError::NotReady {
            stack: StackLabel::Main,
            state: StackState::Waiting,
            len: 4,
        }
    );
}

#[test]
fn break_to_none_empties_the_stack_and_stops_each_node_once() {
    let log = Log::default();
    let (graph, [a, ..]) = chain(&log);
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);
    stack.start(a, &mut rt).expect("start");

    stack.break_to(None, &mut rt).expect("break");

    assert_eq!(stack.len(), 0);
    assert_eq!(stack.state(), StackState::Ready);
    assert_eq!(stops(&log), vec!["d.stop", "c.stop", "b.stop", "a.stop"]);

    // Breaking again touches nothing.
    stack.break_to(None, &mut rt).expect("second break");
    assert_eq!(stack.len(), 0);
    assert_eq!(stack.state(), StackState::Ready);
    assert_eq!(stops(&log).len(), 4);
}

#[test]
fn break_to_none_on_an_ended_stack_is_a_no_op() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let leaf = graph.add("leaf", Scripted::new("leaf", &log, &[NodeStatus::Success]));
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);

    stack.start(leaf, &mut rt).expect("start");
    assert_eq!(stack.state(), StackState::End);
    assert_eq!(stops(&log), vec!["leaf.stop"]);

    stack.break_to(None, &mut rt).expect("break");
    assert_eq!(stack.len(), 0);
    assert_eq!(stack.state(), StackState::Ready);
    assert_eq!(stops(&log), vec!["leaf.stop"]);
}

#[test]
fn break_to_a_node_two_levels_below_the_top_stops_only_the_nodes_above_it() {
    let log = Log::default();
    let (graph, [a, b, ..]) = chain(&log);
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);
    stack.start(a, &mut rt).expect("start");

    stack.break_to(Some(b), &mut rt).expect("break");

    assert_eq!(stops(&log), vec!["d.stop", "c.stop"]);
    assert_eq!(stack.top(), Some(b));
    assert_eq!(stack.len(), 2);
    assert_eq!(stack.state(), StackState::Ready);

    // The next pass executes `b` from scratch.
    log.borrow_mut().clear();
    stack.run(&mut rt).expect("run");
    assert_eq!(
        log.borrow().as_slice(),
        &["b.execute", "c.execute", "d.execute"]
    );
    assert_eq!(stack.state(), StackState::Waiting);
}

#[test]
fn break_to_a_node_not_on_the_stack_is_rejected() {
    let log = Log::default();
    let (mut graph, [a, ..]) = chain(&log);
    let stray = graph.add("stray", Scripted::new("stray", &log, &[]));
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);
    stack.start(a, &mut rt).expect("start");

    let err = stack.break_to(Some(stray), &mut rt).unwrap_err();

    assert_eq!(
        err,
        StackError::BreakTargetNotOnStack {
            stack: StackLabel::Main,
            node: stray,
        }
    );
    assert_eq!(stack.len(), 4);
    assert_eq!(stack.state(), StackState::Waiting);
    assert!(stops(&log).is_empty());
}

#[test]
fn receive_return_while_nothing_waits_is_rejected() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let leaf = graph.add("leaf", Scripted::new("leaf", &log, &[NodeStatus::Success]));
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);

    let err = stack.receive_return(true, &mut rt).unwrap_err();
    assert_eq!(
        err,
        StackError::NotWaiting {
            stack: StackLabel::Main,
            state: StackState::Ready,
        }
    );

    stack.start(leaf, &mut rt).expect("start");
    let err = stack.receive_return(false, &mut rt).unwrap_err();
    assert_eq!(
        err,
        StackError::NotWaiting {
            stack: StackLabel::Main,
            state: StackState::End,
        }
    );
}

#[test]
fn composite_result_pops_it_and_hands_the_value_to_its_parent() {
    let log = Log::default();
    let (graph, [a, ..]) = chain(&log);
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);
    stack.start(a, &mut rt).expect("start");
    log.borrow_mut().clear();

    stack.receive_return(false, &mut rt).expect("receive");

    assert_eq!(
        log.borrow().as_slice(),
        &[
            "d.stop",
            "c.receive(false)",
            "c.stop",
            "b.receive(false)",
            "b.stop",
            "a.receive(false)",
            "a.stop",
        ]
    );
    assert_eq!(stack.len(), 0);
    assert_eq!(stack.state(), StackState::End);
}

#[test]
fn pause_after_single_execution_stops_before_the_next_call() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let x = graph.add("x", Scripted::new("x", &log, &[NodeStatus::Success]));
    let y = graph.add("y", Scripted::new("y", &log, &[NodeStatus::Success]));
    let root = graph.add("root", Sequence::new(vec![x, y]));
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);
    stack.apply_config(&TreeConfig {
        pause_after_single_execution: true,
        ..TreeConfig::default()
    });

    stack.start(root, &mut rt).expect("start");

    // `x` finished and its result was still delivered; `y` was pushed but not executed.
    assert!(stack.is_paused());
    assert_eq!(stack.nodes(), &[root, y]);
    assert_eq!(stack.state(), StackState::Calling);
    assert_eq!(log.borrow().as_slice(), &["x.execute", "x.stop"]);

    stack.resume();
    stack.run(&mut rt).expect("run");
    assert_eq!(stack.state(), StackState::End);
    assert_eq!(
        log.borrow().as_slice(),
        &["x.execute", "x.stop", "y.execute", "y.stop"]
    );
}

#[test]
fn repeated_receive_returns_reach_the_end() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let leaves: Vec<NodeId> = ["x", "y", "z"]
        .into_iter()
        .map(|name| graph.add(name, Scripted::new(name, &log, &[NodeStatus::Wait])))
        .collect();
    let root = graph.add("root", Sequence::new(leaves));
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);
    stack.start(root, &mut rt).expect("start");

    let mut deliveries = 0;
    while stack.state() != StackState::End {
        assert!(deliveries < 10, "stack never ended");
        stack.receive_return(true, &mut rt).expect("receive");
        deliveries += 1;
    }

    assert_eq!(deliveries, 3);
    assert!(stack.is_empty());
}

#[test]
fn no_return_without_a_pushed_child_is_a_recursion_fault() {
    let mut graph = NodeGraph::new();
    let stuck = graph.add("stuck", FnAction::new(|_ctx: &mut NodeContext<'_>| NodeStatus::NoReturn));
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);

    let err = stack.start(stuck, &mut rt).unwrap_err();

    assert!(matches!(
        err,
        StackError::RecursiveExecution { node, .. } if node == stuck
    ));
    assert_eq!(stack.state(), StackState::Invalid);
    assert_eq!(
        stack.run(&mut rt).unwrap_err(),
        StackError::Invalid {
            stack: StackLabel::Main
        }
    );

    // Only a break recovers the stack.
    stack.break_to(None, &mut rt).expect("break");
    assert_eq!(stack.state(), StackState::Ready);
    assert!(stack.is_empty());
}

#[test]
fn calling_two_children_in_one_step_is_rejected() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let x = graph.add("x", Scripted::new("x", &log, &[]));
    let y = graph.add("y", Scripted::new("y", &log, &[]));
    let greedy = graph.add(
        "greedy",
        FnAction::new(move |ctx: &mut NodeContext<'_>| {
            ctx.call(x);
            ctx.call(y)
        }),
    );
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);

    let err = stack.start(greedy, &mut rt).unwrap_err();

    assert_eq!(err, StackError::MultipleCalls { node: greedy });
    assert!(log.borrow().is_empty());
}

#[test]
fn interrupt_observers_run_on_rollback_but_not_on_completion() {
    let log = Log::default();
    let mut graph = NodeGraph::new();
    let observed = log.clone();
    let leaf = graph.add(
        "leaf",
        FnAction::new(move |ctx: &mut NodeContext<'_>| {
            let observed = observed.clone();
            ctx.on_interrupt(move |node| observed.borrow_mut().push(format!("interrupted {node}")));
            NodeStatus::Wait
        }),
    );
    let mut rt = Runtime::new(graph, Variables::new());
    let mut stack = ExecutionStack::new(StackLabel::Main);

    stack.start(leaf, &mut rt).expect("start");
    stack.receive_return(true, &mut rt).expect("receive");
    assert!(log.borrow().is_empty());

    stack.restart(leaf, &mut rt).expect("restart");
    stack.break_to(None, &mut rt).expect("break");
    assert_eq!(log.borrow().as_slice(), &[format!("interrupted {leaf}")]);
}

#[test]
fn error_result_pauses_the_stack_and_reports_a_diagnostic() {
    let reports: Rc<RefCell<Vec<Diagnostic>>> = Rc::default();
    let sink = reports.clone();
    let mut attempts = 0;
    let mut graph = NodeGraph::new();
    let flaky = graph.add(
        "flaky",
        FnAction::new(move |_ctx: &mut NodeContext<'_>| {
            attempts += 1;
            if attempts == 1 {
                NodeStatus::Error
            } else {
                NodeStatus::Success
            }
        }),
    );
    let mut rt = Runtime::new(graph, Variables::new());
    rt.set_diagnostics(move |diagnostic: Diagnostic| sink.borrow_mut().push(diagnostic));
    let mut stack = ExecutionStack::new(StackLabel::Main);

    stack.start(flaky, &mut rt).expect("error results are not protocol faults");

    assert!(stack.is_paused());
    assert_eq!(stack.top(), Some(flaky));
    assert_eq!(stack.result(), None);
    {
        let reports = reports.borrow();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, DiagnosticKind::ErrorResult);
        assert_eq!(reports[0].node, Some(flaky));
        assert_eq!(reports[0].name.as_deref(), Some("flaky"));
    }

    // Nothing moves until the host intervenes.
    stack.run(&mut rt).expect("run");
    assert_eq!(stack.top(), Some(flaky));

    stack.resume();
    stack.run(&mut rt).expect("run");
    assert_eq!(stack.state(), StackState::End);
}

#[test]
fn step_budget_pauses_a_loop_that_never_yields() {
    let reports: Rc<RefCell<Vec<Diagnostic>>> = Rc::default();
    let sink = reports.clone();
    let mut graph = NodeGraph::new();
    let always = graph.add("always", FnCondition::new(|_vars: &Variables| true));
    let body = graph.add("body", FnCondition::new(|_vars: &Variables| true));
    let forever = graph.add("forever", Loop::new(LoopKind::While(always), vec![body]));
    let mut rt = Runtime::new(graph, Variables::new());
    rt.set_diagnostics(move |diagnostic: Diagnostic| sink.borrow_mut().push(diagnostic));
    let mut stack = ExecutionStack::new(StackLabel::Main);
    stack.apply_config(&TreeConfig {
        max_steps_per_pass: 100,
        ..TreeConfig::default()
    });

    stack.start(forever, &mut rt).expect("start");

    assert!(stack.is_paused());
    assert!(stack.contains(forever));
    let reports = reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, DiagnosticKind::StepBudgetExceeded);
}
