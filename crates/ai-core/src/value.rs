use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Vec2, Vec3};

/// Opaque handle to a host-side object (entity, component, asset...).
///
/// The interpreter never dereferences it; it only stores and compares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueType {
    Int,
    Float,
    Bool,
    String,
    Vector2,
    Vector3,
    Object,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    String(String),
    Vector2(Vec2),
    Vector3(Vec3),
    Object(ObjectHandle),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Bool,
            Value::String(_) => ValueType::String,
            Value::Vector2(_) => ValueType::Vector2,
            Value::Vector3(_) => ValueType::Vector3,
            Value::Object(_) => ValueType::Object,
        }
    }

    /// Numeric view of `Int`/`Float` values.
    pub fn as_number(&self) -> Option<f32> {
        match *self {
            Value::Int(v) => Some(v as f32),
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to `target`, returning `None` when no sensible conversion exists.
    ///
    /// Numbers and booleans convert into each other (`0` is `false`), floats truncate toward
    /// zero, vectors widen with `z = 0` or drop `z`, and every value renders into a string.
    /// Object handles only convert to themselves.
    pub fn convert(&self, target: ValueType) -> Option<Value> {
        if self.value_type() == target {
            return Some(self.clone());
        }

        match (self, target) {
            (_, ValueType::String) => Some(Value::String(self.to_string())),
            (Value::Int(v), ValueType::Float) => Some(Value::Float(*v as f32)),
            (Value::Float(v), ValueType::Int) => Some(Value::Int(v.trunc() as i32)),
            (Value::Int(v), ValueType::Bool) => Some(Value::Bool(*v != 0)),
            (Value::Float(v), ValueType::Bool) => Some(Value::Bool(*v != 0.0)),
            (Value::Bool(v), ValueType::Int) => Some(Value::Int(*v as i32)),
            (Value::Bool(v), ValueType::Float) => Some(Value::Float(if *v { 1.0 } else { 0.0 })),
            (Value::String(s), ValueType::Int) => s.trim().parse().ok().map(Value::Int),
            (Value::String(s), ValueType::Float) => s.trim().parse().ok().map(Value::Float),
            (Value::String(s), ValueType::Bool) => s.trim().parse().ok().map(Value::Bool),
            (Value::Vector2(v), ValueType::Vector3) => Some(Value::Vector3(v.extend(0.0))),
            (Value::Vector3(v), ValueType::Vector2) => Some(Value::Vector2(v.truncate())),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Vector2(v) => write!(f, "({}, {})", v.x, v.y),
            Value::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Value::Object(h) => write!(f, "object#{}", h.0),
        }
    }
}

/// Rust types that map one-to-one onto a [`ValueType`].
pub trait VariableKind: Clone + 'static {
    const TYPE: ValueType;

    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

macro_rules! variable_kind {
    ($ty:ty, $variant:ident) => {
        impl VariableKind for $ty {
            const TYPE: ValueType = ValueType::$variant;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

variable_kind!(i32, Int);
variable_kind!(f32, Float);
variable_kind!(bool, Bool);
variable_kind!(String, String);
variable_kind!(Vec2, Vector2);
variable_kind!(Vec3, Vector3);
variable_kind!(ObjectHandle, Object);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}
