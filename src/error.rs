//! Error taxonomy shared by every public operation.

use core::fmt;
use thiserror::Error;

/// Which argument of an operation failed type validation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ArgRole {
    Key,
    Value,
}

impl fmt::Display for ArgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgRole::Key => f.write_str("key"),
            ArgRole::Value => f.write_str("value"),
        }
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// A key or value was not a string. Raised before any mutation.
    #[error("{role} must be a string, found {found}")]
    WrongType { role: ArgRole, found: &'static str },

    #[error("key not found")]
    KeyNotFound,

    /// The map changed structurally since the cursor was created.
    #[error("map changed size during iteration")]
    IteratorInvalidated,

    #[error("cursor belongs to a different map")]
    ForeignCursor,

    /// The string arena or the slot table would outgrow its addressable
    /// size. Raised before any mutation.
    #[error("capacity overflow")]
    CapacityOverflow,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn wrong_type(role: ArgRole, found: &'static str) -> Self {
        Error::WrongType { role, found }
    }

    /// True for the TypeError-class failures.
    pub fn is_type_error(&self) -> bool {
        matches!(self, Error::WrongType { .. })
    }
}

pub type Result<T> = core::result::Result<T, Error>;
