use crate::node::{NodeId, NodeStatus};
use crate::stack::{StackLabel, StackState};

/// A tree definition handed over by the loader does not hold together.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("root {root} is not in the graph")]
    UnknownRoot { root: NodeId },

    #[error("node {node} is not in the graph")]
    UnknownNode { node: NodeId },

    #[error("node {parent} references child {child} which was not added before it")]
    UnknownChild { parent: NodeId, child: NodeId },

    #[error("node {child} is claimed by both {first} and {second}")]
    MultipleParents {
        child: NodeId,
        first: NodeId,
        second: NodeId,
    },

    #[error("node {node} does not implement the service contract")]
    NotAService { node: NodeId },

    #[error("service {service} is already attached to {owner}")]
    ServiceAlreadyAttached { service: NodeId, owner: NodeId },
}

/// Protocol violations. Fatal to the operation that raised them; never corrected silently.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    #[error("{stack} stack cannot start: state {state:?} with {len} node(s) on it")]
    NotReady {
        stack: StackLabel,
        state: StackState,
        len: usize,
    },

    #[error(
        "{stack} stack started repeating execution of {node} in state {state:?} \
         (did the node forget to return a result?)"
    )]
    RecursiveExecution {
        stack: StackLabel,
        node: NodeId,
        state: StackState,
    },

    #[error("{stack} stack has no pending result to deliver to {node}")]
    MissingResult { stack: StackLabel, node: NodeId },

    #[error("{stack} stack received a return while {state:?}; nothing is waiting for one")]
    NotWaiting { stack: StackLabel, state: StackState },

    #[error("{stack} stack cannot break to {node}: it is not on the stack")]
    BreakTargetNotOnStack { stack: StackLabel, node: NodeId },

    #[error("{stack} stack is in an invalid state")]
    Invalid { stack: StackLabel },

    #[error("node {node} is not in the graph")]
    UnknownNode { node: NodeId },

    #[error("node {node} called more than one child in a single step")]
    MultipleCalls { node: NodeId },

    #[error("node {node} called child {child} but returned {status:?} instead of NoReturn")]
    CallWithoutNoReturn {
        node: NodeId,
        child: NodeId,
        status: NodeStatus,
    },
}

impl StackError {
    /// The node the violation is attributed to, when there is one.
    pub fn node(&self) -> Option<NodeId> {
        match *self {
            StackError::RecursiveExecution { node, .. }
            | StackError::MissingResult { node, .. }
            | StackError::BreakTargetNotOnStack { node, .. }
            | StackError::UnknownNode { node }
            | StackError::MultipleCalls { node }
            | StackError::CallWithoutNoReturn { node, .. } => Some(node),
            StackError::NotReady { .. } | StackError::NotWaiting { .. } | StackError::Invalid { .. } => {
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Stack(#[from] StackError),

    #[error("service {service} has no active stack")]
    ServiceNotActive { service: NodeId },
}
