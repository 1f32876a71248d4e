use thiserror::Error;

use crate::ids::Id;

pub type RnResult<T> = Result<T, RnError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RnError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown {what} id {id}")]
    UnknownId { what: &'static str, id: Id },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Invariant violated: {what}")]
    Invariant { what: &'static str },
}
