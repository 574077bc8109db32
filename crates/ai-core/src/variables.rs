use core::fmt;
use std::collections::BTreeMap;
use std::marker::PhantomData;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Value, ValueType, VariableError, VariableKind};

/// Stable variable id, assigned by the tree loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariableId(pub u64);

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// A variable binding whose type was checked when it was created.
///
/// Reads and writes through a `VarRef` skip per-access type checks.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarRef<T: 'static> {
    id: VariableId,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: 'static> Copy for VarRef<T> {}

impl<T: 'static> Clone for VarRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> VarRef<T> {
    pub fn id(self) -> VariableId {
        self.id
    }
}

/// A binding to an `Int` or `Float` variable, read as `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumberRef {
    id: VariableId,
}

impl NumberRef {
    pub fn id(self) -> VariableId {
        self.id
    }
}

/// The variable environment of one behavior tree.
#[derive(Debug, Default, Clone)]
pub struct Variables {
    values: BTreeMap<VariableId, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, id: VariableId) -> bool {
        self.values.contains_key(&id)
    }

    /// Declare a variable with its initial value. The value's type is the variable's type for
    /// the lifetime of the environment.
    pub fn declare(&mut self, id: VariableId, value: impl Into<Value>) -> Result<(), VariableError> {
        if self.values.contains_key(&id) {
            return Err(VariableError::Duplicate { id });
        }
        self.values.insert(id, value.into());
        Ok(())
    }

    pub fn value_type(&self, id: VariableId) -> Option<ValueType> {
        self.values.get(&id).map(Value::value_type)
    }

    pub fn get(&self, id: VariableId) -> Option<&Value> {
        self.values.get(&id)
    }

    /// Untyped write; the value must match the declared type.
    pub fn set(&mut self, id: VariableId, value: impl Into<Value>) -> Result<(), VariableError> {
        let value = value.into();
        let slot = self
            .values
            .get_mut(&id)
            .ok_or(VariableError::Unknown { id })?;
        let expected = slot.value_type();
        let found = value.value_type();
        if expected != found {
            return Err(VariableError::TypeMismatch {
                id,
                expected,
                found,
            });
        }
        *slot = value;
        Ok(())
    }

    pub fn bind<T: VariableKind>(&self, id: VariableId) -> Result<VarRef<T>, VariableError> {
        let found = self
            .value_type(id)
            .ok_or(VariableError::Unknown { id })?;
        if found != T::TYPE {
            return Err(VariableError::TypeMismatch {
                id,
                expected: T::TYPE,
                found,
            });
        }
        Ok(VarRef {
            id,
            _phantom: PhantomData,
        })
    }

    pub fn bind_number(&self, id: VariableId) -> Result<NumberRef, VariableError> {
        let found = self
            .value_type(id)
            .ok_or(VariableError::Unknown { id })?;
        if !found.is_numeric() {
            return Err(VariableError::NotNumeric { id, found });
        }
        Ok(NumberRef { id })
    }

    pub fn read<T: VariableKind>(&self, var: VarRef<T>) -> T {
        self.values
            .get(&var.id)
            .and_then(T::from_value)
            .unwrap_or_else(|| {
                panic!(
                    "variable type mismatch for id={} (bound as {:?})",
                    var.id,
                    T::TYPE
                )
            })
    }

    pub fn write<T: VariableKind>(&mut self, var: VarRef<T>, value: T) {
        match self.values.get_mut(&var.id) {
            Some(slot) => *slot = value.into_value(),
            None => panic!("variable {} disappeared after binding", var.id),
        }
    }

    pub fn read_number(&self, var: NumberRef) -> f32 {
        self.values
            .get(&var.id)
            .and_then(Value::as_number)
            .unwrap_or_else(|| panic!("variable type mismatch for id={} (bound as number)", var.id))
    }

    /// Write a number through a numeric binding; `Int` variables truncate toward zero.
    pub fn write_number(&mut self, var: NumberRef, value: f32) {
        match self.values.get_mut(&var.id) {
            Some(Value::Int(slot)) => *slot = value.trunc() as i32,
            Some(Value::Float(slot)) => *slot = value,
            _ => panic!("variable type mismatch for id={} (bound as number)", var.id),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Value)> {
        self.values.iter().map(|(id, v)| (*id, v))
    }
}

/// A node parameter that is either a constant or a reference to a variable.
///
/// `Var` is the unresolved form produced by a tree loader; [`Field::bind`] turns it into a
/// checked `Bound` reference during node initialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T: VariableKind> {
    Const(T),
    Var(VariableId),
    Bound(VarRef<T>),
}

impl<T: VariableKind> Field<T> {
    pub fn bind(&mut self, variables: &Variables) -> Result<(), VariableError> {
        if let Field::Var(id) = *self {
            *self = Field::Bound(variables.bind(id)?);
        }
        Ok(())
    }

    /// `None` only for a `Var` that was never bound.
    pub fn read(&self, variables: &Variables) -> Option<T> {
        match self {
            Field::Const(v) => Some(v.clone()),
            Field::Var(_) => None,
            Field::Bound(var) => Some(variables.read(*var)),
        }
    }
}

impl<T: VariableKind> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Const(value)
    }
}

/// Like [`Field`], but accepts either numeric variable type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberField {
    Const(f32),
    Var(VariableId),
    Bound(NumberRef),
}

impl NumberField {
    pub fn bind(&mut self, variables: &Variables) -> Result<(), VariableError> {
        if let NumberField::Var(id) = *self {
            *self = NumberField::Bound(variables.bind_number(id)?);
        }
        Ok(())
    }

    pub fn read(&self, variables: &Variables) -> Option<f32> {
        match *self {
            NumberField::Const(v) => Some(v),
            NumberField::Var(_) => None,
            NumberField::Bound(var) => Some(variables.read_number(var)),
        }
    }
}

impl From<f32> for NumberField {
    fn from(value: f32) -> Self {
        NumberField::Const(value)
    }
}

impl From<VariableId> for NumberField {
    fn from(id: VariableId) -> Self {
        NumberField::Var(id)
    }
}
