use crate::error::StackError;
use crate::node::NodeId;
use crate::stack::StackLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A node returned [`NodeStatus::Error`](crate::NodeStatus::Error); the stack paused.
    ErrorResult,
    /// A node failed to bind its variables; the stack paused.
    InitializeFailed,
    /// A single pass dispatched more steps than the configured budget; the stack paused.
    StepBudgetExceeded,
    /// A protocol violation was returned to the host.
    ProtocolViolation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub stack: StackLabel,
    pub node: Option<NodeId>,
    pub name: Option<String>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stack: StackLabel, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            stack,
            node: None,
            name: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_node(mut self, node: NodeId, name: Option<&str>) -> Self {
        self.node = Some(node);
        self.name = name.map(str::to_string);
        self
    }

    pub(crate) fn protocol(stack: StackLabel, err: &StackError) -> Self {
        Self {
            stack,
            node: err.node(),
            name: None,
            kind: DiagnosticKind::ProtocolViolation,
            message: err.to_string(),
        }
    }
}

/// Where the interpreter reports conditions that need outside intervention.
pub trait DiagnosticsSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl<F> DiagnosticsSink for F
where
    F: FnMut(Diagnostic),
{
    fn report(&mut self, diagnostic: Diagnostic) {
        self(diagnostic)
    }
}

/// Default sink: one `tracing` error event per diagnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl DiagnosticsSink for LogDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::error!(
            stack = %diagnostic.stack,
            node = ?diagnostic.node,
            name = diagnostic.name.as_deref().unwrap_or("-"),
            kind = ?diagnostic.kind,
            "{}",
            diagnostic.message
        );
    }
}
