use ai_core::TickContext;

use crate::context::NodeContext;
use crate::node::{Node, NodeId, NodeStatus, Service};

/// Runs its subtree once per registration, alongside whatever its owner does.
pub struct Parallel {
    subtree: NodeId,
    started: bool,
}

impl Parallel {
    pub fn new(subtree: NodeId) -> Self {
        Self {
            subtree,
            started: false,
        }
    }
}

impl Node for Parallel {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        self.started = true;
        ctx.call(self.subtree)
    }

    fn receive_return_from_child(&mut self, _ctx: &mut NodeContext<'_>, success: bool) -> NodeStatus {
        NodeStatus::of(success)
    }

    fn children(&self) -> Vec<NodeId> {
        vec![self.subtree]
    }

    fn service(&mut self) -> Option<&mut dyn Service> {
        Some(self)
    }
}

impl Service for Parallel {
    fn is_ready(&self, _tick: &TickContext) -> bool {
        !self.started
    }

    fn on_registered(&mut self) {
        self.started = false;
    }

    fn on_unregistered(&mut self) {
        self.started = false;
    }
}

/// Re-runs its subtree for as long as it stays registered.
///
/// A new run starts once the previous one finished and at least `interval_ticks` ticks passed
/// since the previous start. With [`forcing_restart`](Self::forcing_restart) only the interval
/// counts, and a run still in progress is stopped when the next one is due.
pub struct Repeat {
    subtree: NodeId,
    interval_ticks: u64,
    force_restart: bool,
    running: bool,
    last_started: Option<u64>,
}

impl Repeat {
    pub fn new(subtree: NodeId, interval_ticks: u64) -> Self {
        Self {
            subtree,
            interval_ticks,
            force_restart: false,
            running: false,
            last_started: None,
        }
    }

    pub fn forcing_restart(mut self) -> Self {
        self.force_restart = true;
        self
    }
}

impl Node for Repeat {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        self.running = true;
        self.last_started = Some(ctx.tick().tick);
        ctx.call(self.subtree)
    }

    fn receive_return_from_child(&mut self, _ctx: &mut NodeContext<'_>, success: bool) -> NodeStatus {
        self.running = false;
        NodeStatus::of(success)
    }

    fn stop(&mut self, _ctx: &mut NodeContext<'_>) {
        self.running = false;
    }

    fn children(&self) -> Vec<NodeId> {
        vec![self.subtree]
    }

    fn service(&mut self) -> Option<&mut dyn Service> {
        Some(self)
    }
}

impl Service for Repeat {
    fn is_ready(&self, tick: &TickContext) -> bool {
        let elapsed = self
            .last_started
            .map_or(true, |started| tick.tick >= started + self.interval_ticks);
        elapsed && (self.force_restart || !self.running)
    }

    fn preempts_running(&self) -> bool {
        self.force_restart
    }

    fn on_registered(&mut self) {
        self.running = false;
        self.last_started = None;
    }

    fn on_unregistered(&mut self) {
        self.running = false;
    }
}
