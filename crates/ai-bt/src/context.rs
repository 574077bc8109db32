use ai_core::{TickContext, Variables};

use crate::node::{NodeId, NodeStatus};

pub type InterruptObserver = Box<dyn FnMut(NodeId)>;

/// Token for ending a suspended node from outside the tree (timers, callbacks, device events).
///
/// Valid only for the execution that issued it: once the node finishes, is rolled back, or is
/// executed again, [`BehaviorTree::end_action`](crate::BehaviorTree::end_action) rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Progress {
    node: NodeId,
    activation: u64,
}

impl Progress {
    pub(crate) fn new(node: NodeId, activation: u64) -> Self {
        Self { node, activation }
    }

    pub fn node(self) -> NodeId {
        self.node
    }

    pub fn activation(self) -> u64 {
        self.activation
    }
}

#[derive(Default)]
pub(crate) struct Requests {
    pub call: Option<NodeId>,
    pub extra_calls: usize,
    pub deferred: Vec<(u32, bool)>,
    pub observers: Vec<InterruptObserver>,
}

/// Everything a node may touch while the stack dispatches into it.
pub struct NodeContext<'a> {
    node: NodeId,
    activation: u64,
    tick: TickContext,
    variables: &'a mut Variables,
    requests: Requests,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        node: NodeId,
        activation: u64,
        tick: TickContext,
        variables: &'a mut Variables,
    ) -> Self {
        Self {
            node,
            activation,
            tick,
            variables,
            requests: Requests::default(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn tick(&self) -> &TickContext {
        &self.tick
    }

    pub fn variables(&self) -> &Variables {
        &*self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut *self.variables
    }

    /// Push `child` on top of this node once the current step returns.
    ///
    /// Returns [`NodeStatus::NoReturn`] so composites can `return ctx.call(child)`. Calling more
    /// than one child in a single step is a protocol violation.
    pub fn call(&mut self, child: NodeId) -> NodeStatus {
        if self.requests.call.is_some() {
            self.requests.extra_calls += 1;
        } else {
            self.requests.call = Some(child);
        }
        NodeStatus::NoReturn
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.node, self.activation)
    }

    /// End this node with `success` after `ticks` ticks, in the current phase.
    pub fn end_after(&mut self, ticks: u32, success: bool) {
        self.requests.deferred.push((ticks, success));
    }

    /// Run `observer` if this node gets rolled back before it finishes.
    pub fn on_interrupt(&mut self, observer: impl FnMut(NodeId) + 'static) {
        self.requests.observers.push(Box::new(observer));
    }

    pub(crate) fn into_requests(self) -> Requests {
        self.requests
    }
}
