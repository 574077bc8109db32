use crate::{ValueType, VariableId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    #[error("unknown variable {id}")]
    Unknown { id: VariableId },

    #[error("variable {id} is already declared")]
    Duplicate { id: VariableId },

    #[error("variable {id} holds {found:?}, expected {expected:?}")]
    TypeMismatch {
        id: VariableId,
        expected: ValueType,
        found: ValueType,
    },

    #[error("variable {id} holds {found:?}, expected a numeric type")]
    NotNumeric { id: VariableId, found: ValueType },
}
