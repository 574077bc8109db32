use ai_core::TickPhase;

use crate::context::Progress;
use crate::node::NodeId;

/// "End this node after N ticks", fired by the tree at the start of a tick phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredTask {
    pub progress: Progress,
    pub due_tick: u64,
    pub phase: TickPhase,
    pub success: bool,
    pub cancelled: bool,
}

impl DeferredTask {
    pub fn new(progress: Progress, due_tick: u64, phase: TickPhase, success: bool) -> Self {
        Self {
            progress,
            due_tick,
            phase,
            success,
            cancelled: false,
        }
    }

    fn is_due(&self, tick: u64, phase: TickPhase) -> bool {
        (self.due_tick, self.phase) <= (tick, phase)
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<DeferredTask>,
}

impl Scheduler {
    pub fn schedule(&mut self, task: DeferredTask) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &DeferredTask> {
        self.tasks.iter().filter(|t| !t.cancelled)
    }

    /// Flag every task of `node`; flagged tasks are dropped at the next phase.
    pub fn cancel_node(&mut self, node: NodeId) -> usize {
        let mut cancelled = 0;
        for task in self.tasks.iter_mut() {
            if task.progress.node() == node && !task.cancelled {
                task.cancelled = true;
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Remove and return the tasks due at `(tick, phase)`, in scheduling order.
    pub fn take_due(&mut self, tick: u64, phase: TickPhase) -> Vec<DeferredTask> {
        self.tasks.retain(|t| !t.cancelled);
        let (due, pending): (Vec<_>, Vec<_>) = self
            .tasks
            .drain(..)
            .partition(|t| t.is_due(tick, phase));
        self.tasks = pending;
        due
    }
}
