use ai_core::{NumberField, VariableError, Variables};

use crate::context::NodeContext;
use crate::node::{Node, NodeId, NodeStatus};

/// Runs every child in order, whatever each one returns, and reports the last child's result.
/// An empty sequence fails.
pub struct Sequence {
    children: Vec<NodeId>,
    cursor: usize,
}

impl Sequence {
    pub fn new(children: Vec<NodeId>) -> Self {
        Self {
            children,
            cursor: 0,
        }
    }
}

impl Node for Sequence {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        self.cursor = 0;
        match self.children.first() {
            Some(&first) => ctx.call(first),
            None => NodeStatus::Failed,
        }
    }

    fn receive_return_from_child(&mut self, ctx: &mut NodeContext<'_>, success: bool) -> NodeStatus {
        self.cursor += 1;
        match self.children.get(self.cursor) {
            Some(&next) => ctx.call(next),
            None => NodeStatus::of(success),
        }
    }

    fn stop(&mut self, _ctx: &mut NodeContext<'_>) {
        self.cursor = 0;
    }

    fn children(&self) -> Vec<NodeId> {
        self.children.clone()
    }
}

/// Tries children in order until one succeeds.
pub struct Selector {
    children: Vec<NodeId>,
    cursor: usize,
}

impl Selector {
    pub fn new(children: Vec<NodeId>) -> Self {
        Self {
            children,
            cursor: 0,
        }
    }
}

impl Node for Selector {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        self.cursor = 0;
        match self.children.first() {
            Some(&first) => ctx.call(first),
            None => NodeStatus::Failed,
        }
    }

    fn receive_return_from_child(&mut self, ctx: &mut NodeContext<'_>, success: bool) -> NodeStatus {
        if success {
            return NodeStatus::Success;
        }
        self.cursor += 1;
        match self.children.get(self.cursor) {
            Some(&next) => ctx.call(next),
            None => NodeStatus::Failed,
        }
    }

    fn stop(&mut self, _ctx: &mut NodeContext<'_>) {
        self.cursor = 0;
    }

    fn children(&self) -> Vec<NodeId> {
        self.children.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopKind {
    /// Run the body a fixed number of times (rounded up).
    For(NumberField),
    /// Check the condition node before every iteration.
    While(NodeId),
    /// Check the condition node after every iteration.
    DoWhile(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopStep {
    Condition,
    Body(usize),
}

/// Repeats its body; body results are ignored and the loop succeeds once it finishes.
///
/// An empty body succeeds immediately. A `While` whose condition never fails and whose body
/// never suspends is caught by the stack's step budget.
pub struct Loop {
    kind: LoopKind,
    body: Vec<NodeId>,
    step: LoopStep,
    iteration: u32,
    count: u32,
}

impl Loop {
    pub fn new(kind: LoopKind, body: Vec<NodeId>) -> Self {
        Self {
            kind,
            body,
            step: LoopStep::Body(0),
            iteration: 0,
            count: 0,
        }
    }

    /// Iterations completed by the current (or last) run.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    fn enter_body(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        self.step = LoopStep::Body(0);
        ctx.call(self.body[0])
    }

    fn check(&mut self, ctx: &mut NodeContext<'_>, condition: NodeId) -> NodeStatus {
        self.step = LoopStep::Condition;
        ctx.call(condition)
    }

    fn next_iteration(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        self.iteration += 1;
        match self.kind {
            LoopKind::For(_) if self.iteration < self.count => self.enter_body(ctx),
            LoopKind::For(_) => NodeStatus::Success,
            LoopKind::While(condition) | LoopKind::DoWhile(condition) => {
                self.check(ctx, condition)
            }
        }
    }
}

impl Node for Loop {
    fn initialize(&mut self, variables: &Variables) -> Result<(), VariableError> {
        if let LoopKind::For(count) = &mut self.kind {
            count.bind(variables)?;
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        self.iteration = 0;
        if self.body.is_empty() {
            return NodeStatus::Success;
        }

        match self.kind {
            LoopKind::For(count) => {
                let Some(count) = count.read(ctx.variables()) else {
                    return NodeStatus::Error;
                };
                self.count = count.max(0.0).ceil() as u32;
                if self.count == 0 {
                    return NodeStatus::Success;
                }
                self.enter_body(ctx)
            }
            LoopKind::While(condition) => self.check(ctx, condition),
            LoopKind::DoWhile(_) => self.enter_body(ctx),
        }
    }

    fn receive_return_from_child(&mut self, ctx: &mut NodeContext<'_>, success: bool) -> NodeStatus {
        match self.step {
            LoopStep::Condition if success => self.enter_body(ctx),
            LoopStep::Condition => NodeStatus::Success,
            LoopStep::Body(i) if i + 1 < self.body.len() => {
                self.step = LoopStep::Body(i + 1);
                ctx.call(self.body[i + 1])
            }
            LoopStep::Body(_) => self.next_iteration(ctx),
        }
    }

    fn children(&self) -> Vec<NodeId> {
        let mut children = self.body.clone();
        if let LoopKind::While(condition) | LoopKind::DoWhile(condition) = self.kind {
            children.insert(0, condition);
        }
        children
    }
}

/// If/else on a condition node. Without a branch for the outcome, the condition's result is
/// reported as-is.
pub struct Condition {
    condition: NodeId,
    on_true: Option<NodeId>,
    on_false: Option<NodeId>,
    branching: bool,
}

impl Condition {
    pub fn new(condition: NodeId, on_true: Option<NodeId>, on_false: Option<NodeId>) -> Self {
        Self {
            condition,
            on_true,
            on_false,
            branching: false,
        }
    }
}

impl Node for Condition {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        self.branching = false;
        ctx.call(self.condition)
    }

    fn receive_return_from_child(&mut self, ctx: &mut NodeContext<'_>, success: bool) -> NodeStatus {
        if self.branching {
            return NodeStatus::of(success);
        }
        let branch = if success { self.on_true } else { self.on_false };
        match branch {
            Some(branch) => {
                self.branching = true;
                ctx.call(branch)
            }
            None => NodeStatus::of(success),
        }
    }

    fn stop(&mut self, _ctx: &mut NodeContext<'_>) {
        self.branching = false;
    }

    fn children(&self) -> Vec<NodeId> {
        let mut children = vec![self.condition];
        children.extend(self.on_true);
        children.extend(self.on_false);
        children
    }
}

pub struct Inverter {
    child: NodeId,
}

impl Inverter {
    pub fn new(child: NodeId) -> Self {
        Self { child }
    }
}

impl Node for Inverter {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        ctx.call(self.child)
    }

    fn receive_return_from_child(&mut self, _ctx: &mut NodeContext<'_>, success: bool) -> NodeStatus {
        NodeStatus::of(!success)
    }

    fn children(&self) -> Vec<NodeId> {
        vec![self.child]
    }
}
