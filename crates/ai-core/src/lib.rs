//! Engine-agnostic primitives for tick-driven behavior trees.
//!
//! The interpreter (`ai-bt`) builds on three things defined here: the tick context handed to
//! every node, the closed set of value types a tree can store, and the variable environment
//! nodes read and write.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod error;
pub mod math;
pub mod tick;
pub mod value;
pub mod variables;

pub use error::VariableError;
pub use math::{Vec2, Vec3};
pub use tick::{TickContext, TickPhase};
pub use value::{ObjectHandle, Value, ValueType, VariableKind};
pub use variables::{Field, NumberField, NumberRef, VarRef, VariableId, Variables};
