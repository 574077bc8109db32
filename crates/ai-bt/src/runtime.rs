use std::collections::VecDeque;
use std::mem;

use ai_core::{TickContext, TickPhase, VariableError, Variables};
use ai_tools::{TraceEvent, TraceSink};

use crate::context::{NodeContext, Progress, Requests};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsSink, LogDiagnostics};
use crate::error::StackError;
use crate::graph::NodeGraph;
use crate::node::{HookOutcome, NodeId, NodeStatus};
use crate::scheduler::{DeferredTask, Scheduler};
use crate::stack::StackLabel;

/// Stack membership changes, drained by the tree after every stack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StackEvent {
    Pushed(NodeId),
    Popped(NodeId),
    Ended {
        stack: StackLabel,
        result: Option<bool>,
    },
}

/// What a single dispatch into a node produced.
#[derive(Debug)]
pub(crate) struct Dispatch {
    pub status: NodeStatus,
    pub call: Option<NodeId>,
    pub extra_calls: usize,
    pub init_error: Option<VariableError>,
}

/// Everything the stacks of one tree share: the node arena, the variable environment, the tick
/// context, the deferred-task scheduler and the outward-facing sinks.
///
/// Stacks never hold node references; they dispatch into nodes through the runtime by id.
pub struct Runtime {
    graph: NodeGraph,
    variables: Variables,
    tick: TickContext,
    scheduler: Scheduler,
    diagnostics: Box<dyn DiagnosticsSink>,
    trace: Option<Box<dyn TraceSink>>,
    events: VecDeque<StackEvent>,
}

impl Runtime {
    pub fn new(graph: NodeGraph, variables: Variables) -> Self {
        Self {
            graph,
            variables,
            tick: TickContext::default(),
            scheduler: Scheduler::default(),
            diagnostics: Box::new(LogDiagnostics),
            trace: None,
            events: VecDeque::new(),
        }
    }

    pub fn set_diagnostics(&mut self, sink: impl DiagnosticsSink + 'static) {
        self.diagnostics = Box::new(sink);
    }

    pub fn set_trace(&mut self, sink: impl TraceSink + 'static) {
        self.trace = Some(Box::new(sink));
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    pub fn tick(&self) -> &TickContext {
        &self.tick
    }

    pub fn set_tick(&mut self, tick: TickContext) {
        self.tick = tick;
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Whether `progress` still refers to the node's current execution.
    pub fn is_current(&self, progress: Progress) -> bool {
        self.graph
            .slot(progress.node())
            .is_some_and(|slot| slot.activation == progress.activation())
    }

    /// Token for the node's current activation.
    pub fn progress_of(&self, node: NodeId) -> Option<Progress> {
        self.graph
            .slot(node)
            .map(|slot| Progress::new(node, slot.activation))
    }

    pub(crate) fn execute(&mut self, id: NodeId) -> Result<Dispatch, StackError> {
        let tick = self.tick;
        let slot = self
            .graph
            .slot_mut(id)
            .ok_or(StackError::UnknownNode { node: id })?;
        slot.activation += 1;
        if !slot.initialized {
            if let Err(err) = slot.node.initialize(&self.variables) {
                return Ok(Dispatch {
                    status: NodeStatus::Error,
                    call: None,
                    extra_calls: 0,
                    init_error: Some(err),
                });
            }
            slot.initialized = true;
        }

        let activation = slot.activation;
        let mut ctx = NodeContext::new(id, activation, tick, &mut self.variables);
        let status = slot.node.execute(&mut ctx);
        let requests = ctx.into_requests();
        Ok(self.absorb(id, activation, status, requests))
    }

    pub(crate) fn receive(&mut self, id: NodeId, success: bool) -> Result<Dispatch, StackError> {
        let tick = self.tick;
        let slot = self
            .graph
            .slot_mut(id)
            .ok_or(StackError::UnknownNode { node: id })?;
        let activation = slot.activation;
        let mut ctx = NodeContext::new(id, activation, tick, &mut self.variables);
        let status = slot.node.receive_return_from_child(&mut ctx, success);
        let requests = ctx.into_requests();
        Ok(self.absorb(id, activation, status, requests))
    }

    /// Normal exit from a stack. Invalidates every outstanding [`Progress`] of the node.
    pub(crate) fn stop(&mut self, id: NodeId) -> Result<(), StackError> {
        let tick = self.tick;
        let slot = self
            .graph
            .slot_mut(id)
            .ok_or(StackError::UnknownNode { node: id })?;
        let mut ctx = NodeContext::new(id, slot.activation, tick, &mut self.variables);
        slot.node.stop(&mut ctx);
        slot.observers.clear();
        slot.activation += 1;
        self.scheduler.cancel_node(id);
        Ok(())
    }

    /// Rollback exit: interrupt observers first, then the regular stop.
    pub(crate) fn interrupt(&mut self, id: NodeId) -> Result<(), StackError> {
        let slot = self
            .graph
            .slot_mut(id)
            .ok_or(StackError::UnknownNode { node: id })?;
        let mut observers = mem::take(&mut slot.observers);
        for observer in observers.iter_mut() {
            observer(id);
        }
        self.stop(id)
    }

    /// Forward the phase hook to `id`. `None` when the node has no hooks.
    pub(crate) fn hook(
        &mut self,
        id: NodeId,
        phase: TickPhase,
    ) -> Result<Option<HookOutcome>, StackError> {
        let tick = self.tick;
        let slot = self
            .graph
            .slot_mut(id)
            .ok_or(StackError::UnknownNode { node: id })?;
        let activation = slot.activation;
        let Some(hooks) = slot.node.hooks() else {
            return Ok(None);
        };

        let mut ctx = NodeContext::new(id, activation, tick, &mut self.variables);
        let outcome = match phase {
            TickPhase::Update => hooks.update(&mut ctx),
            TickPhase::FixedUpdate => hooks.fixed_update(&mut ctx),
            TickPhase::LateUpdate => hooks.late_update(&mut ctx),
        };
        let requests = ctx.into_requests();

        let status = match outcome {
            HookOutcome::Running => NodeStatus::Wait,
            HookOutcome::Return(status) => status,
        };
        let dispatch = self.absorb(id, activation, status, requests);
        match dispatch.call {
            Some(child) => Err(StackError::CallWithoutNoReturn {
                node: id,
                child,
                status,
            }),
            None => Ok(Some(outcome)),
        }
    }

    pub(crate) fn service_ready(&mut self, id: NodeId) -> bool {
        let tick = self.tick;
        self.graph
            .slot_mut(id)
            .and_then(|slot| slot.node.service().map(|s| s.is_ready(&tick)))
            .unwrap_or(false)
    }

    pub(crate) fn service_preempts(&mut self, id: NodeId) -> bool {
        self.graph
            .slot_mut(id)
            .and_then(|slot| slot.node.service().map(|s| s.preempts_running()))
            .unwrap_or(false)
    }

    pub(crate) fn service_registered(&mut self, id: NodeId) {
        if let Some(service) = self.graph.slot_mut(id).and_then(|s| s.node.service()) {
            service.on_registered();
        }
    }

    pub(crate) fn service_unregistered(&mut self, id: NodeId) {
        if let Some(service) = self.graph.slot_mut(id).and_then(|s| s.node.service()) {
            service.on_unregistered();
        }
    }

    pub(crate) fn take_due(&mut self) -> Vec<DeferredTask> {
        self.scheduler.take_due(self.tick.tick, self.tick.phase)
    }

    pub(crate) fn diagnose(
        &mut self,
        stack: StackLabel,
        kind: DiagnosticKind,
        node: Option<NodeId>,
        message: impl Into<String>,
    ) {
        let mut diagnostic = Diagnostic::new(stack, kind, message);
        if let Some(node) = node {
            diagnostic = diagnostic.with_node(node, self.graph.name(node));
        }
        self.diagnostics.report(diagnostic);
    }

    pub(crate) fn report(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.name.is_none() {
            diagnostic.name = diagnostic
                .node
                .and_then(|node| self.graph.name(node))
                .map(str::to_string);
        }
        self.diagnostics.report(diagnostic);
    }

    pub(crate) fn trace(
        &mut self,
        tag: &'static str,
        stack: StackLabel,
        node: Option<NodeId>,
        value: i64,
    ) {
        let Some(sink) = self.trace.as_mut() else {
            return;
        };
        let mut event = TraceEvent::new(self.tick.tick, tag)
            .with_stack(stack.trace_id())
            .with_value(value);
        if let Some(node) = node {
            event = event.with_node(node.raw());
        }
        sink.emit(event);
    }

    pub(crate) fn push_event(&mut self, event: StackEvent) {
        self.events.push_back(event);
    }

    pub(crate) fn next_event(&mut self) -> Option<StackEvent> {
        self.events.pop_front()
    }

    fn absorb(
        &mut self,
        id: NodeId,
        activation: u64,
        status: NodeStatus,
        requests: Requests,
    ) -> Dispatch {
        let Requests {
            call,
            extra_calls,
            deferred,
            observers,
        } = requests;

        if let Some(slot) = self.graph.slot_mut(id) {
            slot.observers.extend(observers);
        }
        for (ticks, success) in deferred {
            let task = DeferredTask::new(
                Progress::new(id, activation),
                self.tick.tick + u64::from(ticks),
                self.tick.phase,
                success,
            );
            self.scheduler.schedule(task);
        }

        Dispatch {
            status,
            call,
            extra_calls,
            init_error: None,
        }
    }
}
