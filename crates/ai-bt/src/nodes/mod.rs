//! Built-in node library.

mod arithmetic;
mod flow;
mod leaf;
mod services;

pub use arithmetic::{Atan2, Compare, CompareOp, CopyVariable, Cosine, MakeVector2};
pub use flow::{Condition, Inverter, Loop, LoopKind, Selector, Sequence};
pub use leaf::{FnAction, FnCondition, Idle, Log, WaitTicks, WaitUntil};
pub use services::{Parallel, Repeat};
