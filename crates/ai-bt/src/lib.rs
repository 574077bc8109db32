//! Stack-based behavior tree interpreter built on `ai-core`.
//!
//! A [`BehaviorTree`] owns the nodes of one loaded tree in a [`NodeGraph`], a primary
//! [`ExecutionStack`] and one [`ServiceStack`] per active service node. Nodes never recurse into
//! their children: they ask the stack to push a child and receive its result later, so any node
//! may suspend across ticks and any branch may be rolled back with a break.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod runtime;
pub mod scheduler;
pub mod service;
pub mod stack;
pub mod tree;

pub use config::TreeConfig;
pub use context::{InterruptObserver, NodeContext, Progress};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsSink, LogDiagnostics};
pub use error::{GraphError, StackError, TreeError};
pub use graph::NodeGraph;
pub use node::{HookOutcome, Node, NodeId, NodeStatus, Service, TickHooks};
pub use runtime::Runtime;
pub use scheduler::{DeferredTask, Scheduler};
pub use service::ServiceStack;
pub use stack::{ExecutionStack, StackLabel, StackState};
pub use tree::BehaviorTree;
