use core::fmt;

use ai_core::{TickContext, VariableError, Variables};

use crate::context::NodeContext;

/// Dense index of a node inside its tree's [`NodeGraph`](crate::NodeGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node hands back to the stack after one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    Success,
    Failed,
    /// Suspend until the node is ended from outside (see [`Progress`](crate::Progress)).
    Wait,
    /// Suspend for exactly one tick, then execute again.
    WaitUntilNextUpdate,
    /// The node pushed a child through [`NodeContext::call`] and has no value of its own yet.
    NoReturn,
    /// Invariant violation inside the node. Pauses the stack.
    Error,
}

impl NodeStatus {
    pub fn of(success: bool) -> Self {
        if success {
            NodeStatus::Success
        } else {
            NodeStatus::Failed
        }
    }

    /// `Some` for `Success`/`Failed`.
    pub fn outcome(self) -> Option<bool> {
        match self {
            NodeStatus::Success => Some(true),
            NodeStatus::Failed => Some(false),
            _ => None,
        }
    }

    pub fn is_suspended(self) -> bool {
        matches!(self, NodeStatus::Wait | NodeStatus::WaitUntilNextUpdate)
    }
}

/// Result of a per-tick hook on a suspended leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookOutcome {
    /// Keep waiting.
    Running,
    /// End the node out-of-band with this status.
    Return(NodeStatus),
}

impl HookOutcome {
    pub fn end(success: bool) -> Self {
        HookOutcome::Return(NodeStatus::of(success))
    }
}

/// The execution contract every node implements.
///
/// Nodes never touch the stack directly. A composite asks for a child through
/// [`NodeContext::call`] and returns [`NodeStatus::NoReturn`]; the child's result comes back
/// through [`Node::receive_return_from_child`].
pub trait Node: 'static {
    /// Bind variable references. Runs once, the first time a stack reaches the node.
    fn initialize(&mut self, _variables: &Variables) -> Result<(), VariableError> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus;

    /// Only composites are child-aware; everything else reports an invariant violation.
    fn receive_return_from_child(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        _success: bool,
    ) -> NodeStatus {
        NodeStatus::Error
    }

    /// Called exactly once each time the node leaves a stack, whether it finished or was
    /// rolled back.
    fn stop(&mut self, _ctx: &mut NodeContext<'_>) {}

    /// Child references, used by the graph to derive parent back-references.
    fn children(&self) -> Vec<NodeId> {
        Vec::new()
    }

    fn hooks(&mut self) -> Option<&mut dyn TickHooks> {
        None
    }

    fn service(&mut self) -> Option<&mut dyn Service> {
        None
    }
}

/// Per-tick hooks of a leaf action. Forwarded only while the leaf is the suspended top of its
/// stack.
pub trait TickHooks {
    fn update(&mut self, _ctx: &mut NodeContext<'_>) -> HookOutcome {
        HookOutcome::Running
    }

    fn fixed_update(&mut self, _ctx: &mut NodeContext<'_>) -> HookOutcome {
        HookOutcome::Running
    }

    fn late_update(&mut self, _ctx: &mut NodeContext<'_>) -> HookOutcome {
        HookOutcome::Running
    }
}

/// A node that runs on its own service stack while its owner is on a stack.
pub trait Service {
    /// Whether a fresh run of the service may start on this tick.
    fn is_ready(&self, tick: &TickContext) -> bool;

    /// Whether a ready service may cut its unfinished run short and start over.
    fn preempts_running(&self) -> bool {
        false
    }

    fn on_registered(&mut self) {}

    fn on_unregistered(&mut self) {}
}
