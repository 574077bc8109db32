use tracing::debug;

use crate::config::TreeConfig;
use crate::error::StackError;
use crate::node::NodeId;
use crate::runtime::Runtime;
use crate::stack::{ExecutionStack, StackLabel, StackState};

/// An auxiliary stack running one service node's subtree while the service's owner is on a
/// stack.
///
/// The service node itself is the head of its stack; [`Service::is_ready`](crate::Service)
/// gates every fresh run, and at most one run starts per tick.
#[derive(Debug)]
pub struct ServiceStack {
    service: NodeId,
    owner: NodeId,
    stack: ExecutionStack,
    last_started: Option<u64>,
    runs: u32,
}

impl ServiceStack {
    pub(crate) fn new(service: NodeId, owner: NodeId, config: &TreeConfig) -> Self {
        let mut stack = ExecutionStack::new(StackLabel::Service(service));
        stack.apply_config(config);
        Self {
            service,
            owner,
            stack,
            last_started: None,
            runs: 0,
        }
    }

    pub fn service(&self) -> NodeId {
        self.service
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn label(&self) -> StackLabel {
        self.stack.label()
    }

    pub fn stack(&self) -> &ExecutionStack {
        &self.stack
    }

    pub(crate) fn stack_mut(&mut self) -> &mut ExecutionStack {
        &mut self.stack
    }

    /// Runs started since registration.
    pub fn runs(&self) -> u32 {
        self.runs
    }

    pub fn last_started(&self) -> Option<u64> {
        self.last_started
    }

    /// One driver step, independent of the main stack's state. A paused stack neither runs
    /// nor starts over until it is resumed; a pending `Receiving` value stays pending.
    pub(crate) fn advance(&mut self, rt: &mut Runtime) -> Result<(), StackError> {
        if self.stack.is_paused() {
            return Ok(());
        }
        if self.due_for_preemption(rt) {
            return self.preempt(rt);
        }
        match self.stack.state() {
            StackState::Invalid | StackState::Waiting => Ok(()),
            StackState::WaitUntilNextUpdate => self.stack.resume_next_update(rt).map(|_| ()),
            StackState::End => self.try_start(rt),
            StackState::Ready if self.stack.is_empty() => self.try_start(rt),
            StackState::Ready | StackState::Calling | StackState::Receiving => self.stack.run(rt),
        }
    }

    /// Force-stop whatever is still running on the stack.
    pub(crate) fn teardown(&mut self, rt: &mut Runtime) -> Result<(), StackError> {
        self.stack.end(rt)
    }

    fn due_for_preemption(&self, rt: &mut Runtime) -> bool {
        !self.stack.is_empty()
            && !matches!(self.stack.state(), StackState::Invalid | StackState::End)
            && self.last_started != Some(rt.tick().tick)
            && rt.service_preempts(self.service)
            && rt.service_ready(self.service)
    }

    /// Roll back the unfinished run and start the next one in the same step.
    fn preempt(&mut self, rt: &mut Runtime) -> Result<(), StackError> {
        debug!(service = %self.service, depth = self.stack.len(), "service run preempted");
        rt.trace("bt.service.preempt", self.label(), Some(self.service), self.stack.len() as i64);
        self.stack.break_to(None, rt)?;
        self.try_start(rt)
    }

    fn try_start(&mut self, rt: &mut Runtime) -> Result<(), StackError> {
        let tick = rt.tick().tick;
        if self.last_started == Some(tick) || !rt.service_ready(self.service) {
            return Ok(());
        }

        self.last_started = Some(tick);
        self.runs += 1;
        rt.trace(
            "bt.service.start",
            self.label(),
            Some(self.service),
            i64::from(self.runs),
        );
        self.stack.restart(self.service, rt)
    }
}
