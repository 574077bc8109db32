use ai_core::{TickContext, TickPhase, Variables};
use ai_tools::TraceSink;
use tracing::debug;

use crate::config::TreeConfig;
use crate::context::Progress;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::error::{StackError, TreeError};
use crate::graph::NodeGraph;
use crate::node::NodeId;
use crate::runtime::{Runtime, StackEvent};
use crate::service::ServiceStack;
use crate::stack::{ExecutionStack, StackLabel, StackState};

/// One loaded tree bound to one agent: the root, the primary stack, the active service stacks
/// and the variable environment.
///
/// The host calls [`update`](Self::update), [`fixed_update`](Self::fixed_update) and
/// [`late_update`](Self::late_update) once each per frame, in that order. Within a phase the
/// primary stack is driven to a stable point before service stacks advance, and service stacks
/// advance in registration order.
pub struct BehaviorTree {
    root: NodeId,
    config: TreeConfig,
    rt: Runtime,
    main: ExecutionStack,
    services: Vec<ServiceStack>,
    running: bool,
    ended_at: Option<u64>,
    completed_runs: u64,
    last_result: Option<bool>,
}

impl BehaviorTree {
    pub fn new(graph: NodeGraph, root: NodeId, variables: Variables) -> Result<Self, TreeError> {
        graph.validate(root)?;
        Ok(Self {
            root,
            config: TreeConfig::default(),
            rt: Runtime::new(graph, variables),
            main: ExecutionStack::new(StackLabel::Main),
            services: Vec::new(),
            running: false,
            ended_at: None,
            completed_runs: 0,
            last_result: None,
        })
    }

    pub fn with_config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self.main.apply_config(&config);
        for service in &mut self.services {
            service.stack_mut().apply_config(&config);
        }
        self
    }

    pub fn with_diagnostics(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.rt.set_diagnostics(sink);
        self
    }

    pub fn with_trace(mut self, sink: impl TraceSink + 'static) -> Self {
        self.rt.set_trace(sink);
        self
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn graph(&self) -> &NodeGraph {
        self.rt.graph()
    }

    pub fn variables(&self) -> &Variables {
        self.rt.variables()
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        self.rt.variables_mut()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    pub fn main_stack(&self) -> &ExecutionStack {
        &self.main
    }

    /// Active service stacks, in registration order.
    pub fn services(&self) -> &[ServiceStack] {
        &self.services
    }

    pub fn service_stack(&self, service: NodeId) -> Option<&ServiceStack> {
        self.services.iter().find(|s| s.service() == service)
    }

    /// Ticks seen so far; advanced by every [`update`](Self::update).
    pub fn tick_count(&self) -> u64 {
        self.rt.tick().tick
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// How many times the primary stack ran to completion.
    pub fn completed_runs(&self) -> u64 {
        self.completed_runs
    }

    /// Root result of the last completed run.
    pub fn last_result(&self) -> Option<bool> {
        self.last_result
    }

    /// Push the root onto the primary stack and drive it until it first suspends.
    pub fn start(&mut self) -> Result<(), TreeError> {
        self.running = true;
        self.ended_at = None;
        debug!(root = %self.root, "tree start");
        let started = self.main.restart(self.root, &mut self.rt);
        self.conclude(StackLabel::Main, started)
    }

    pub fn update(&mut self, dt_seconds: f32) -> Result<(), TreeError> {
        let tick = self.rt.tick().tick + 1;
        self.run_phase(TickContext::new(tick, dt_seconds, TickPhase::Update))
    }

    pub fn fixed_update(&mut self, dt_seconds: f32) -> Result<(), TreeError> {
        let tick = self.rt.tick().tick;
        self.run_phase(TickContext::new(tick, dt_seconds, TickPhase::FixedUpdate))
    }

    pub fn late_update(&mut self, dt_seconds: f32) -> Result<(), TreeError> {
        let tick = self.rt.tick().tick;
        self.run_phase(TickContext::new(tick, dt_seconds, TickPhase::LateUpdate))
    }

    /// All three phases in order. Every phase runs even if an earlier one reported a fault;
    /// the first fault is returned.
    pub fn tick(&mut self, dt_seconds: f32) -> Result<(), TreeError> {
        let update = self.update(dt_seconds);
        let fixed = self.fixed_update(dt_seconds);
        let late = self.late_update(dt_seconds);
        update.and(fixed).and(late)
    }

    /// Deliver an external completion. `Ok(false)` when the token is stale or the node is not
    /// the suspended top of any stack.
    pub fn end_action(&mut self, progress: Progress, success: bool) -> Result<bool, TreeError> {
        let (label, outcome) = match self.deliver(progress, success) {
            None => return Ok(false),
            Some(delivered) => delivered,
        };
        self.conclude(label, outcome)?;
        Ok(true)
    }

    /// [`end_action`](Self::end_action) for whatever activation `node` is currently in.
    pub fn end_node(&mut self, node: NodeId, success: bool) -> Result<bool, TreeError> {
        match self.rt.progress_of(node) {
            Some(progress) => self.end_action(progress, success),
            None => Err(StackError::UnknownNode { node }.into()),
        }
    }

    /// Result delivery straight into the primary stack.
    pub fn receive_return(&mut self, success: bool) -> Result<(), TreeError> {
        let received = self.main.receive_return(success, &mut self.rt);
        self.conclude(StackLabel::Main, received)
    }

    /// Roll the primary stack back to `stop_at`, or empty it when `None`. The stack restarts
    /// from the node left on top (or from the root) on the next pass.
    pub fn break_main(&mut self, stop_at: Option<NodeId>) -> Result<(), TreeError> {
        let broken = self.main.break_to(stop_at, &mut self.rt);
        self.conclude(StackLabel::Main, broken)
    }

    pub fn pause(&mut self) {
        self.main.pause();
    }

    pub fn resume(&mut self) {
        self.main.resume();
    }

    /// Roll an active service stack back to `stop_at`, or empty it when `None`.
    ///
    /// A stack left with nodes on it continues from the new top on its next advance. An emptied
    /// stack starts a fresh run once the service reports ready again.
    pub fn break_service(
        &mut self,
        service: NodeId,
        stop_at: Option<NodeId>,
    ) -> Result<(), TreeError> {
        let Some(stack) = self.services.iter_mut().find(|s| s.service() == service) else {
            return Err(TreeError::ServiceNotActive { service });
        };
        let label = stack.label();
        let broken = stack.stack_mut().break_to(stop_at, &mut self.rt);
        self.conclude(label, broken)
    }

    pub fn pause_service(&mut self, service: NodeId) -> Result<(), TreeError> {
        self.service_stack_mut(service)?.stack_mut().pause();
        Ok(())
    }

    /// Lift a pause on a service stack, including one set by an `Error` result, a failed
    /// initialize or an exhausted step budget. The stack continues on its next advance.
    pub fn resume_service(&mut self, service: NodeId) -> Result<(), TreeError> {
        self.service_stack_mut(service)?.stack_mut().resume();
        Ok(())
    }

    /// Force-end the primary stack and every service stack. The tree stays idle until
    /// [`start`](Self::start) is called again.
    pub fn end(&mut self) -> Result<(), TreeError> {
        self.running = false;
        let ended = self.main.end(&mut self.rt);
        let settled = self.settle();
        let mut outcome = ended.and(settled);
        while let Some(mut service) = self.services.pop() {
            let torn = service.teardown(&mut self.rt);
            self.rt.service_unregistered(service.service());
            outcome = outcome.and(torn).and(self.settle());
        }
        debug!(root = %self.root, "tree end");
        self.conclude(StackLabel::Main, outcome)
    }

    fn service_stack_mut(&mut self, service: NodeId) -> Result<&mut ServiceStack, TreeError> {
        self.services
            .iter_mut()
            .find(|s| s.service() == service)
            .ok_or(TreeError::ServiceNotActive { service })
    }

    fn run_phase(&mut self, ctx: TickContext) -> Result<(), TreeError> {
        self.rt.set_tick(ctx);
        let mut first = None;

        for task in self.rt.take_due() {
            let fired = self.deliver(task.progress, task.success);
            self.rt.trace(
                "bt.deferred.fire",
                fired.as_ref().map_or(StackLabel::Main, |(label, _)| *label),
                Some(task.progress.node()),
                i64::from(fired.is_some()),
            );
            if let Some((label, outcome)) = fired {
                self.note(label, outcome, &mut first);
            }
        }

        let driven = self.drive_main(ctx.phase);
        self.note(StackLabel::Main, driven, &mut first);
        self.drive_services(ctx.phase, &mut first);

        match first {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn drive_main(&mut self, phase: TickPhase) -> Result<(), StackError> {
        if !self.running || self.main.is_paused() {
            return Ok(());
        }
        let tick = self.rt.tick().tick;
        let main = &mut self.main;
        let rt = &mut self.rt;

        let driven = match main.state() {
            StackState::Invalid | StackState::Waiting => Ok(()),
            StackState::End => {
                let due = self.ended_at.is_some_and(|ended| tick > ended);
                if phase == TickPhase::Update && self.config.restart_on_end && due {
                    main.restart(self.root, rt)
                } else {
                    Ok(())
                }
            }
            StackState::Ready if main.is_empty() => {
                if phase == TickPhase::Update {
                    main.start(self.root, rt)
                } else {
                    Ok(())
                }
            }
            StackState::Ready | StackState::Calling | StackState::Receiving => main.run(rt),
            StackState::WaitUntilNextUpdate => main.resume_next_update(rt).map(|_| ()),
        };
        driven.and(self.settle())?;

        let hooked = self.main.forward_hook(phase, &mut self.rt);
        hooked.and(self.settle())
    }

    fn drive_services(&mut self, phase: TickPhase, first: &mut Option<StackError>) {
        let order: Vec<NodeId> = self.services.iter().map(ServiceStack::service).collect();
        for id in order {
            // An earlier stack in this pass may have torn this one down.
            let Some(service) = self.services.iter_mut().find(|s| s.service() == id) else {
                continue;
            };
            let label = service.label();
            let advanced = service.advance(&mut self.rt);
            let outcome = advanced.and(self.settle());
            self.note(label, outcome, first);

            let Some(service) = self.services.iter_mut().find(|s| s.service() == id) else {
                continue;
            };
            let hooked = service.stack_mut().forward_hook(phase, &mut self.rt);
            let outcome = hooked.and(self.settle());
            self.note(label, outcome, first);
        }
    }

    fn deliver(
        &mut self,
        progress: Progress,
        success: bool,
    ) -> Option<(StackLabel, Result<(), StackError>)> {
        if !self.rt.is_current(progress) {
            return None;
        }
        let node = progress.node();

        if self.main.is_waiting_on(node) {
            let received = self.main.receive_return(success, &mut self.rt);
            return Some((StackLabel::Main, received.and(self.settle())));
        }
        let service = self
            .services
            .iter_mut()
            .find(|s| s.stack().is_waiting_on(node))?;
        let label = service.label();
        let received = service.stack_mut().receive_return(success, &mut self.rt);
        Some((label, received.and(self.settle())))
    }

    /// Drain stack events: register and unregister services, record main stack ends.
    fn settle(&mut self) -> Result<(), StackError> {
        let mut first = None;
        while let Some(event) = self.rt.next_event() {
            let handled = match event {
                StackEvent::Pushed(node) => {
                    self.register_services(node);
                    Ok(())
                }
                StackEvent::Popped(node) => self.unregister_services(node),
                StackEvent::Ended {
                    stack: StackLabel::Main,
                    result,
                } => {
                    self.ended_at = Some(self.rt.tick().tick);
                    self.completed_runs += 1;
                    self.last_result = result;
                    debug!(result = ?result, runs = self.completed_runs, "tree run complete");
                    Ok(())
                }
                StackEvent::Ended { .. } => Ok(()),
            };
            if let Err(err) = handled {
                first.get_or_insert(err);
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn register_services(&mut self, owner: NodeId) {
        let attached = self.rt.graph().services_of(owner).to_vec();
        for service in attached {
            if self.services.iter().any(|s| s.service() == service) {
                continue;
            }
            self.rt.service_registered(service);
            debug!(service = %service, owner = %owner, "service registered");
            self.rt.trace(
                "bt.service.register",
                StackLabel::Service(service),
                Some(owner),
                0,
            );
            self.services
                .push(ServiceStack::new(service, owner, &self.config));
        }
    }

    fn unregister_services(&mut self, owner: NodeId) -> Result<(), StackError> {
        let attached = self.rt.graph().services_of(owner).to_vec();
        let mut outcome = Ok(());
        for service in attached {
            let Some(index) = self.services.iter().position(|s| s.service() == service) else {
                continue;
            };
            let mut stack = self.services.remove(index);
            let torn = stack.teardown(&mut self.rt);
            self.rt.service_unregistered(service);
            debug!(service = %service, owner = %owner, runs = stack.runs(), "service unregistered");
            self.rt.trace(
                "bt.service.unregister",
                StackLabel::Service(service),
                Some(owner),
                i64::from(stack.runs()),
            );
            outcome = outcome.and(torn);
        }
        outcome
    }

    fn note(
        &mut self,
        label: StackLabel,
        outcome: Result<(), StackError>,
        first: &mut Option<StackError>,
    ) {
        if let Err(err) = outcome {
            self.rt.report(Diagnostic::protocol(label, &err));
            first.get_or_insert(err);
        }
    }

    /// Report a protocol fault to the diagnostics sink, then hand it to the caller.
    fn conclude(&mut self, label: StackLabel, outcome: Result<(), StackError>) -> Result<(), TreeError> {
        let settled = self.settle();
        let mut first = None;
        self.note(label, outcome.and(settled), &mut first);
        match first {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
