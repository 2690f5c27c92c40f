use crate::{Key, TypeTag};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The parent of this node currently holds a value that has no
    /// assignable properties (a scalar, null, or nothing at all).
    #[error("cannot assign `{key}`: value of type {actual} holds no properties")]
    Unassignable { key: Key, actual: TypeTag },

    /// An array-mutating method was invoked on a node whose current value
    /// is not an array.
    #[error("{method}() requires an array, found {actual}")]
    NotAnArray { method: &'static str, actual: TypeTag },
}
