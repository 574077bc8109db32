use core::fmt;

use ai_core::TickPhase;
use tracing::{debug, trace, warn};

use crate::config::TreeConfig;
use crate::diagnostics::DiagnosticKind;
use crate::error::StackError;
use crate::node::{HookOutcome, NodeId, NodeStatus};
use crate::runtime::{Dispatch, Runtime, StackEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackState {
    /// A protocol fault was raised; only a break recovers the stack.
    Invalid,
    /// The top node (if any) is executed from scratch on the next pass.
    Ready,
    /// Calling down: the top node was just pushed.
    Calling,
    /// Delivering the pending child result to the top node.
    Receiving,
    WaitUntilNextUpdate,
    Waiting,
    End,
}

impl StackState {
    pub fn is_waiting(self) -> bool {
        matches!(self, StackState::Waiting | StackState::WaitUntilNextUpdate)
    }
}

/// Which stack of a tree an event or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackLabel {
    Main,
    /// The stack running the subtree of this service node.
    Service(NodeId),
}

impl StackLabel {
    /// Trace encoding: `None` for the main stack, the service node id otherwise.
    pub fn trace_id(self) -> Option<u32> {
        match self {
            StackLabel::Main => None,
            StackLabel::Service(id) => Some(id.raw()),
        }
    }
}

impl fmt::Display for StackLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackLabel::Main => f.write_str("main"),
            StackLabel::Service(id) => write!(f, "service {id}"),
        }
    }
}

/// The interpreter: a LIFO of active nodes plus the state machine that drives them.
///
/// Every transition happens synchronously inside [`run`](Self::run),
/// [`receive_return`](Self::receive_return) or [`break_to`](Self::break_to). The only
/// suspension points are the two wait results.
#[derive(Debug)]
pub struct ExecutionStack {
    label: StackLabel,
    nodes: Vec<NodeId>,
    state: StackState,
    result: Option<bool>,
    current: Option<NodeId>,
    last: Option<NodeId>,
    paused: bool,
    pause_after_single_execution: bool,
    step_budget: u32,
    parked_at: Option<u64>,
}

impl ExecutionStack {
    pub fn new(label: StackLabel) -> Self {
        let config = TreeConfig::default();
        Self {
            label,
            nodes: Vec::new(),
            state: StackState::Ready,
            result: None,
            current: None,
            last: None,
            paused: false,
            pause_after_single_execution: config.pause_after_single_execution,
            step_budget: config.max_steps_per_pass,
            parked_at: None,
        }
    }

    pub fn apply_config(&mut self, config: &TreeConfig) {
        self.pause_after_single_execution = config.pause_after_single_execution;
        self.step_budget = config.max_steps_per_pass;
    }

    pub fn label(&self) -> StackLabel {
        self.label
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn state(&self) -> StackState {
        self.state
    }

    /// Pending child result; only present while `Receiving`.
    pub fn result(&self) -> Option<bool> {
        self.result
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn last(&self) -> Option<NodeId> {
        self.last
    }

    pub fn top(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    /// Bottom first.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_waiting(&self) -> bool {
        self.state.is_waiting()
    }

    /// Whether `node` is the suspended top of this stack.
    pub fn is_waiting_on(&self, node: NodeId) -> bool {
        self.is_waiting() && self.top() == Some(node)
    }

    /// Push `head` onto an empty, ready stack and drive it.
    pub fn start(&mut self, head: NodeId, rt: &mut Runtime) -> Result<(), StackError> {
        if self.state != StackState::Ready || !self.nodes.is_empty() || self.current.is_some() {
            return Err(StackError::NotReady {
                stack: self.label,
                state: self.state,
                len: self.nodes.len(),
            });
        }
        if !rt.graph().contains(head) {
            return Err(StackError::UnknownNode { node: head });
        }

        self.result = None;
        self.parked_at = None;
        self.push(head, rt);
        self.run(rt)
    }

    /// [`start`](Self::start) that also accepts an ended stack.
    pub fn restart(&mut self, head: NodeId, rt: &mut Runtime) -> Result<(), StackError> {
        if self.state == StackState::End {
            self.state = StackState::Ready;
        }
        self.start(head, rt)
    }

    /// Drive from the current state until the stack empties, suspends, pauses or faults.
    ///
    /// A protocol fault moves the stack to [`StackState::Invalid`] before the error is returned.
    pub fn run(&mut self, rt: &mut Runtime) -> Result<(), StackError> {
        self.last = None;
        let driven = self.drive(rt);
        self.current = None;

        if let Err(err) = driven {
            self.state = StackState::Invalid;
            self.result = None;
            warn!(stack = %self.label, error = %err, "stack fault");
            rt.trace("bt.stack.error", self.label, err.node(), -1);
            return Err(err);
        }

        if self.nodes.is_empty() && self.state != StackState::End {
            self.finish(rt);
        }
        Ok(())
    }

    /// Deliver the result of the suspended top node and continue driving.
    pub fn receive_return(&mut self, success: bool, rt: &mut Runtime) -> Result<(), StackError> {
        let Some(node) = self.top().filter(|_| self.is_waiting()) else {
            return Err(StackError::NotWaiting {
                stack: self.label,
                state: self.state,
            });
        };

        rt.stop(node)?;
        self.pop(rt);
        self.parked_at = None;
        self.state = StackState::Receiving;
        self.result = Some(success);
        rt.trace("bt.stack.receive", self.label, Some(node), i64::from(success));
        self.run(rt)
    }

    /// [`receive_return`](Self::receive_return) for a full status, as produced by tick hooks.
    pub fn receive_status(&mut self, status: NodeStatus, rt: &mut Runtime) -> Result<(), StackError> {
        if let Some(success) = status.outcome() {
            return self.receive_return(success, rt);
        }
        let Some(node) = self.top().filter(|_| self.is_waiting()) else {
            return Err(StackError::NotWaiting {
                stack: self.label,
                state: self.state,
            });
        };

        match status {
            NodeStatus::Wait => self.state = StackState::Waiting,
            NodeStatus::WaitUntilNextUpdate => {
                self.state = StackState::WaitUntilNextUpdate;
                self.parked_at = Some(rt.tick().tick);
            }
            NodeStatus::Error => self.fault(node, "node ended with an error result", rt),
            _ => {
                return Err(StackError::RecursiveExecution {
                    stack: self.label,
                    node,
                    state: self.state,
                })
            }
        }
        Ok(())
    }

    /// Resume a stack parked in `WaitUntilNextUpdate` once the tick counter moved past the
    /// tick it parked on. Returns whether the stack was resumed.
    pub fn resume_next_update(&mut self, rt: &mut Runtime) -> Result<bool, StackError> {
        if self.state != StackState::WaitUntilNextUpdate || self.paused {
            return Ok(false);
        }
        if self.parked_at.is_some_and(|parked| rt.tick().tick <= parked) {
            return Ok(false);
        }

        self.parked_at = None;
        self.state = StackState::Calling;
        self.run(rt)?;
        Ok(true)
    }

    /// Roll back: interrupt and pop nodes from the top until `stop_at` is the top, or until
    /// the stack is empty when `stop_at` is `None`. Leaves the stack `Ready`.
    pub fn break_to(&mut self, stop_at: Option<NodeId>, rt: &mut Runtime) -> Result<(), StackError> {
        if let Some(target) = stop_at {
            if !self.nodes.contains(&target) {
                return Err(StackError::BreakTargetNotOnStack {
                    stack: self.label,
                    node: target,
                });
            }
        }

        let mut stopped = 0;
        while let Some(top) = self.top() {
            if Some(top) == stop_at {
                break;
            }
            rt.interrupt(top)?;
            self.pop(rt);
            stopped += 1;
        }

        self.state = StackState::Ready;
        self.result = None;
        self.current = None;
        self.last = None;
        self.paused = false;
        self.parked_at = None;
        debug!(stack = %self.label, target = ?stop_at, stopped, "stack break");
        rt.trace("bt.stack.break", self.label, stop_at, stopped);
        Ok(())
    }

    /// Forced end: break everything, then mark the stack `End` without a result.
    pub fn end(&mut self, rt: &mut Runtime) -> Result<(), StackError> {
        let ended = self.state == StackState::End;
        self.break_to(None, rt)?;
        self.state = StackState::End;
        if !ended {
            rt.trace("bt.stack.end", self.label, None, -1);
        }
        Ok(())
    }

    /// Forward the phase hook to the suspended top node and act on what it returns.
    pub fn forward_hook(&mut self, phase: TickPhase, rt: &mut Runtime) -> Result<(), StackError> {
        if self.paused || !self.is_waiting() {
            return Ok(());
        }
        let Some(top) = self.top() else {
            return Ok(());
        };

        match rt.hook(top, phase)? {
            Some(HookOutcome::Return(status)) => self.receive_status(status, rt),
            _ => Ok(()),
        }
    }

    fn drive(&mut self, rt: &mut Runtime) -> Result<(), StackError> {
        let mut steps = 0u32;
        while let Some(top) = self.top() {
            if self.paused && self.state != StackState::Receiving {
                break;
            }
            match self.state {
                StackState::Waiting | StackState::WaitUntilNextUpdate | StackState::End => break,
                StackState::Invalid => return Err(StackError::Invalid { stack: self.label }),
                StackState::Ready | StackState::Calling | StackState::Receiving => {}
            }
            if steps >= self.step_budget {
                self.paused = true;
                warn!(stack = %self.label, node = %top, steps, "step budget exhausted; stack paused");
                rt.diagnose(
                    self.label,
                    DiagnosticKind::StepBudgetExceeded,
                    Some(top),
                    format!("{steps} steps in a single pass without suspending"),
                );
                break;
            }
            steps += 1;

            self.current = Some(top);
            if self.last == Some(top) {
                return Err(StackError::RecursiveExecution {
                    stack: self.label,
                    node: top,
                    state: self.state,
                });
            }

            let dispatch = if self.state == StackState::Receiving {
                let success = self.result.take().ok_or(StackError::MissingResult {
                    stack: self.label,
                    node: top,
                })?;
                rt.receive(top, success)?
            } else {
                self.state = StackState::Calling;
                rt.execute(top)?
            };
            self.apply(top, dispatch, rt)?;

            if matches!(
                self.state,
                StackState::Waiting | StackState::WaitUntilNextUpdate | StackState::End
            ) {
                break;
            }
            self.last = self.current.take();
            if self.state == StackState::Receiving && self.pause_after_single_execution {
                self.paused = true;
            }
        }
        Ok(())
    }

    fn apply(&mut self, node: NodeId, dispatch: Dispatch, rt: &mut Runtime) -> Result<(), StackError> {
        if let Some(err) = dispatch.init_error {
            self.result = None;
            self.paused = true;
            self.state = StackState::Calling;
            warn!(stack = %self.label, node = %node, error = %err, "node failed to initialize; stack paused");
            rt.diagnose(
                self.label,
                DiagnosticKind::InitializeFailed,
                Some(node),
                err.to_string(),
            );
            rt.trace("bt.stack.error", self.label, Some(node), 0);
            return Ok(());
        }
        if dispatch.extra_calls > 0 {
            return Err(StackError::MultipleCalls { node });
        }

        if let Some(child) = dispatch.call {
            if dispatch.status != NodeStatus::NoReturn {
                return Err(StackError::CallWithoutNoReturn {
                    node,
                    child,
                    status: dispatch.status,
                });
            }
            if !rt.graph().contains(child) {
                return Err(StackError::UnknownNode { node: child });
            }
            if self.nodes.contains(&child) {
                return Err(StackError::RecursiveExecution {
                    stack: self.label,
                    node: child,
                    state: self.state,
                });
            }
            self.push(child, rt);
            self.state = StackState::Calling;
        }

        self.handle_result(node, dispatch.status, rt)
    }

    fn handle_result(
        &mut self,
        node: NodeId,
        status: NodeStatus,
        rt: &mut Runtime,
    ) -> Result<(), StackError> {
        match status {
            NodeStatus::NoReturn => {
                if self.top() == Some(node) {
                    return Err(StackError::RecursiveExecution {
                        stack: self.label,
                        node,
                        state: self.state,
                    });
                }
            }
            NodeStatus::Success | NodeStatus::Failed => {
                let success = status == NodeStatus::Success;
                rt.stop(node)?;
                self.pop(rt);
                self.state = StackState::Receiving;
                self.result = Some(success);
                rt.trace("bt.stack.receive", self.label, Some(node), i64::from(success));
            }
            NodeStatus::WaitUntilNextUpdate => {
                self.result = None;
                self.state = StackState::WaitUntilNextUpdate;
                self.parked_at = Some(rt.tick().tick);
                trace!(stack = %self.label, node = %node, "wait until next update");
                rt.trace("bt.stack.wait_next_update", self.label, Some(node), 0);
            }
            NodeStatus::Wait => {
                self.result = None;
                self.state = StackState::Waiting;
                trace!(stack = %self.label, node = %node, "wait");
                rt.trace("bt.stack.wait", self.label, Some(node), 0);
            }
            NodeStatus::Error => self.fault(node, "node returned an error result", rt),
        }
        Ok(())
    }

    /// Error result: pause, keep the node on top for a retry, and tell the host.
    fn fault(&mut self, node: NodeId, message: &str, rt: &mut Runtime) {
        self.result = None;
        self.paused = true;
        self.parked_at = None;
        self.state = StackState::Calling;
        warn!(stack = %self.label, node = %node, "{message}; stack paused");
        rt.diagnose(self.label, DiagnosticKind::ErrorResult, Some(node), message);
        rt.trace("bt.stack.error", self.label, Some(node), 0);
    }

    fn push(&mut self, node: NodeId, rt: &mut Runtime) {
        self.nodes.push(node);
        trace!(stack = %self.label, node = %node, depth = self.nodes.len(), "push");
        rt.trace("bt.stack.push", self.label, Some(node), self.nodes.len() as i64);
        rt.push_event(StackEvent::Pushed(node));
    }

    fn pop(&mut self, rt: &mut Runtime) -> Option<NodeId> {
        let node = self.nodes.pop()?;
        trace!(stack = %self.label, node = %node, depth = self.nodes.len(), "pop");
        rt.trace("bt.stack.pop", self.label, Some(node), self.nodes.len() as i64);
        rt.push_event(StackEvent::Popped(node));
        Some(node)
    }

    fn finish(&mut self, rt: &mut Runtime) {
        let result = self.result.take();
        self.state = StackState::End;
        self.parked_at = None;
        debug!(stack = %self.label, result = ?result, "stack ended");
        rt.trace(
            "bt.stack.end",
            self.label,
            None,
            result.map_or(-1, i64::from),
        );
        rt.push_event(StackEvent::Ended {
            stack: self.label,
            result,
        });
    }
}
