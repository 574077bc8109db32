use ai_core::{Field, NumberField, TickPhase, VariableError, Variables};

use crate::context::NodeContext;
use crate::node::{HookOutcome, Node, NodeStatus, TickHooks};

/// Suspends until ended from outside or rolled back.
#[derive(Debug, Default)]
pub struct Idle;

impl Node for Idle {
    fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> NodeStatus {
        NodeStatus::Wait
    }
}

/// Suspends, then ends itself with success after `ticks` ticks (rounded up).
pub struct WaitTicks {
    ticks: NumberField,
}

impl WaitTicks {
    pub fn new(ticks: impl Into<NumberField>) -> Self {
        Self {
            ticks: ticks.into(),
        }
    }
}

impl Node for WaitTicks {
    fn initialize(&mut self, variables: &Variables) -> Result<(), VariableError> {
        self.ticks.bind(variables)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        let Some(ticks) = self.ticks.read(ctx.variables()) else {
            return NodeStatus::Error;
        };
        if ticks <= 0.0 {
            return NodeStatus::Success;
        }
        ctx.end_after(ticks.ceil() as u32, true);
        NodeStatus::Wait
    }
}

/// Suspends until `predicate` holds, polled from one tick phase.
pub struct WaitUntil<F> {
    predicate: F,
    phase: TickPhase,
}

impl<F> WaitUntil<F>
where
    F: FnMut(&Variables) -> bool + 'static,
{
    /// Polls on the physics step.
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            phase: TickPhase::FixedUpdate,
        }
    }

    pub fn in_phase(mut self, phase: TickPhase) -> Self {
        self.phase = phase;
        self
    }

    fn poll(&mut self, ctx: &mut NodeContext<'_>, phase: TickPhase) -> HookOutcome {
        if phase != self.phase {
            return HookOutcome::Running;
        }
        if (self.predicate)(ctx.variables()) {
            HookOutcome::end(true)
        } else {
            HookOutcome::Running
        }
    }
}

impl<F> Node for WaitUntil<F>
where
    F: FnMut(&Variables) -> bool + 'static,
{
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        if (self.predicate)(ctx.variables()) {
            NodeStatus::Success
        } else {
            NodeStatus::Wait
        }
    }

    fn hooks(&mut self) -> Option<&mut dyn TickHooks> {
        Some(self)
    }
}

impl<F> TickHooks for WaitUntil<F>
where
    F: FnMut(&Variables) -> bool + 'static,
{
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> HookOutcome {
        self.poll(ctx, TickPhase::Update)
    }

    fn fixed_update(&mut self, ctx: &mut NodeContext<'_>) -> HookOutcome {
        self.poll(ctx, TickPhase::FixedUpdate)
    }

    fn late_update(&mut self, ctx: &mut NodeContext<'_>) -> HookOutcome {
        self.poll(ctx, TickPhase::LateUpdate)
    }
}

/// Writes `message` to the log and returns a fixed result.
pub struct Log {
    message: Field<String>,
    result: bool,
}

impl Log {
    pub fn new(message: impl Into<Field<String>>) -> Self {
        Self {
            message: message.into(),
            result: true,
        }
    }

    pub fn returning(mut self, result: bool) -> Self {
        self.result = result;
        self
    }
}

impl Node for Log {
    fn initialize(&mut self, variables: &Variables) -> Result<(), VariableError> {
        self.message.bind(variables)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        let Some(message) = self.message.read(ctx.variables()) else {
            return NodeStatus::Error;
        };
        tracing::info!(node = %ctx.node(), tick = ctx.tick().tick, "{message}");
        NodeStatus::of(self.result)
    }
}

/// Leaf backed by a closure that gets the full node context.
pub struct FnAction<F> {
    action: F,
}

impl<F> FnAction<F>
where
    F: FnMut(&mut NodeContext<'_>) -> NodeStatus + 'static,
{
    pub fn new(action: F) -> Self {
        Self { action }
    }
}

impl<F> Node for FnAction<F>
where
    F: FnMut(&mut NodeContext<'_>) -> NodeStatus + 'static,
{
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        (self.action)(ctx)
    }
}

/// Succeeds when the predicate holds, fails otherwise.
pub struct FnCondition<F> {
    predicate: F,
}

impl<F> FnCondition<F>
where
    F: FnMut(&Variables) -> bool + 'static,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> Node for FnCondition<F>
where
    F: FnMut(&Variables) -> bool + 'static,
{
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        NodeStatus::of((self.predicate)(ctx.variables()))
    }
}
