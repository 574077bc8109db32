use core::f32::consts::FRAC_PI_2;

use ai_core::{NumberField, NumberRef, VarRef, Vec2, VariableError, VariableId, Variables};

use crate::context::NodeContext;
use crate::node::{Node, NodeStatus};

/// Copies one variable into another, converting to the target's declared type. Fails when no
/// conversion exists.
pub struct CopyVariable {
    from: VariableId,
    to: VariableId,
}

impl CopyVariable {
    pub fn new(from: VariableId, to: VariableId) -> Self {
        Self { from, to }
    }
}

impl Node for CopyVariable {
    fn initialize(&mut self, variables: &Variables) -> Result<(), VariableError> {
        for id in [self.from, self.to] {
            if !variables.contains(id) {
                return Err(VariableError::Unknown { id });
            }
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        let variables = ctx.variables_mut();
        let converted = variables
            .value_type(self.to)
            .and_then(|target| variables.get(self.from)?.convert(target));
        match converted {
            Some(value) => NodeStatus::of(variables.set(self.to, value).is_ok()),
            None => NodeStatus::Failed,
        }
    }
}

/// Numeric output slot: an int or float variable, bound at initialize.
#[derive(Debug, Clone, PartialEq)]
struct NumberOut {
    id: VariableId,
    bound: Option<NumberRef>,
}

impl NumberOut {
    fn new(id: VariableId) -> Self {
        Self { id, bound: None }
    }

    fn bind(&mut self, variables: &Variables) -> Result<(), VariableError> {
        self.bound = Some(variables.bind_number(self.id)?);
        Ok(())
    }

    fn write(&self, variables: &mut Variables, value: f32) -> bool {
        match self.bound {
            Some(var) => {
                variables.write_number(var, value);
                true
            }
            None => false,
        }
    }
}

/// `output = cos(input)`, radians.
pub struct Cosine {
    input: NumberField,
    output: NumberOut,
}

impl Cosine {
    pub fn new(input: impl Into<NumberField>, output: VariableId) -> Self {
        Self {
            input: input.into(),
            output: NumberOut::new(output),
        }
    }
}

impl Node for Cosine {
    fn initialize(&mut self, variables: &Variables) -> Result<(), VariableError> {
        self.input.bind(variables)?;
        self.output.bind(variables)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        let Some(input) = self.input.read(ctx.variables()) else {
            return NodeStatus::Error;
        };
        if self.output.write(ctx.variables_mut(), input.cos()) {
            NodeStatus::Success
        } else {
            NodeStatus::Error
        }
    }
}

/// `output = atan2(y, x)`. On the y axis the result is `±π/2` by the sign of `y`; the origin
/// has no angle and fails.
pub struct Atan2 {
    y: NumberField,
    x: NumberField,
    output: NumberOut,
}

impl Atan2 {
    pub fn new(y: impl Into<NumberField>, x: impl Into<NumberField>, output: VariableId) -> Self {
        Self {
            y: y.into(),
            x: x.into(),
            output: NumberOut::new(output),
        }
    }
}

impl Node for Atan2 {
    fn initialize(&mut self, variables: &Variables) -> Result<(), VariableError> {
        self.y.bind(variables)?;
        self.x.bind(variables)?;
        self.output.bind(variables)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        let (Some(y), Some(x)) = (self.y.read(ctx.variables()), self.x.read(ctx.variables())) else {
            return NodeStatus::Error;
        };
        let angle = if x != 0.0 {
            y.atan2(x)
        } else if y > 0.0 {
            FRAC_PI_2
        } else if y < 0.0 {
            -FRAC_PI_2
        } else {
            return NodeStatus::Failed;
        };
        if self.output.write(ctx.variables_mut(), angle) {
            NodeStatus::Success
        } else {
            NodeStatus::Error
        }
    }
}

pub struct MakeVector2 {
    x: NumberField,
    y: NumberField,
    output: VariableId,
    bound: Option<VarRef<Vec2>>,
}

impl MakeVector2 {
    pub fn new(x: impl Into<NumberField>, y: impl Into<NumberField>, output: VariableId) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            output,
            bound: None,
        }
    }
}

impl Node for MakeVector2 {
    fn initialize(&mut self, variables: &Variables) -> Result<(), VariableError> {
        self.x.bind(variables)?;
        self.y.bind(variables)?;
        self.bound = Some(variables.bind(self.output)?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        let variables = ctx.variables_mut();
        match (self.x.read(variables), self.y.read(variables), self.bound) {
            (Some(x), Some(y), Some(out)) => {
                variables.write(out, Vec2::new(x, y));
                NodeStatus::Success
            }
            _ => NodeStatus::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    pub fn apply(self, left: f32, right: f32) -> bool {
        match self {
            CompareOp::Equal => left == right,
            CompareOp::NotEqual => left != right,
            CompareOp::Less => left < right,
            CompareOp::LessOrEqual => left <= right,
            CompareOp::Greater => left > right,
            CompareOp::GreaterOrEqual => left >= right,
        }
    }
}

/// Numeric comparison as a condition: succeeds when `left op right` holds.
pub struct Compare {
    left: NumberField,
    op: CompareOp,
    right: NumberField,
}

impl Compare {
    pub fn new(left: impl Into<NumberField>, op: CompareOp, right: impl Into<NumberField>) -> Self {
        Self {
            left: left.into(),
            op,
            right: right.into(),
        }
    }
}

impl Node for Compare {
    fn initialize(&mut self, variables: &Variables) -> Result<(), VariableError> {
        self.left.bind(variables)?;
        self.right.bind(variables)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> NodeStatus {
        match (self.left.read(ctx.variables()), self.right.read(ctx.variables())) {
            (Some(left), Some(right)) => NodeStatus::of(self.op.apply(left, right)),
            _ => NodeStatus::Error,
        }
    }
}
