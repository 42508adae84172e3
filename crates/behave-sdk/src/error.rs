//! Error types for reflected calls and registration

use crate::types::TypeKey;

/// Result type for reflected calls
pub type CallResult<T = ()> = Result<T, CallError>;

/// Failure to reach the payload of a [`crate::Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Cell holds no value
    #[error("value is null")]
    Null,

    /// Backing storage is already borrowed (reentrant call)
    #[error("value is already borrowed")]
    Borrowed,

    /// Recorded projection did not match the stored type
    #[error("value projection failed")]
    Projection,

    /// Mutable access through a const cell
    #[error("value is const")]
    Const,

    /// Stored value is not of the requested type
    #[error("value type mismatch")]
    TypeMismatch,
}

/// Call-time failures of a reflected method
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    /// More arguments than parameters
    #[error("too many arguments: expected at most {expected}, got {got}")]
    TooManyArguments {
        /// Declared argument count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// Fewer arguments than required, or a trailing slot has no default
    #[error("insufficient arguments: expected at least {expected}, got {got}")]
    InsufficientArguments {
        /// Minimum argument count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// Receiver could not be converted to the class type
    #[error("invalid this pointer: expected {expected}, got {actual}")]
    InvalidThis {
        /// Class type
        expected: TypeKey,
        /// Type of the supplied receiver
        actual: TypeKey,
    },

    /// Positional argument could not be converted
    #[error("argument {index}: expected {expected}, got {actual}")]
    ArgumentMismatch {
        /// Argument index (receiver / bus id included)
        index: usize,
        /// Declared type
        expected: TypeKey,
        /// Supplied type
        actual: TypeKey,
    },

    /// Value-shaped argument was null
    #[error("argument {index} is null")]
    NullArgument {
        /// Argument index
        index: usize,
    },

    /// Argument payload could not be accessed
    #[error("argument {index}: {source}")]
    Access {
        /// Argument index
        index: usize,
        /// Underlying access failure
        source: AccessError,
    },

    /// Result could not be stored into the result cell
    #[error("cannot store {produced} into result of type {expected}")]
    ResultMismatch {
        /// Result cell type
        expected: TypeKey,
        /// Produced type
        produced: TypeKey,
    },

    /// Operation is not supported by the target
    #[error("{0} is not supported")]
    Unsupported(String),
}

/// Registration-time contract violations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistrationError {
    /// Name already registered in this table
    #[error("'{0}' is already registered")]
    DuplicateName(String),

    /// Type already has a reflected class
    #[error("type {0} is already reflected")]
    DuplicateType(TypeKey),

    /// Builder was disabled by an earlier failure
    #[error("builder for '{0}' is disabled")]
    Disabled(String),

    /// Nothing registered under this name
    #[error("'{0}' is not registered")]
    NotFound(String),

    /// Default value type does not match the parameter
    #[error("default value for argument {index}: expected {expected}, got {actual}")]
    DefaultValueType {
        /// Argument index
        index: usize,
        /// Parameter type
        expected: TypeKey,
        /// Default value type
        actual: TypeKey,
    },

    /// Default value index past the last argument, or on the receiver
    #[error("no argument {0} accepts a default value")]
    DefaultValueIndex(usize),

    /// Default value would leave an argument without default after it
    #[error("default value for argument {0} leaves a gap before the end")]
    DefaultValueGap(usize),

    /// Getter / setter signatures do not compose into a property
    #[error("property '{name}': {reason}")]
    PropertySignature {
        /// Property name
        name: String,
        /// What did not match
        reason: String,
    },

    /// Hook signature does not match the declared event
    #[error("hook for '{event}': {reason}")]
    HookSignature {
        /// Event name
        event: String,
        /// What did not match
        reason: String,
    },

    /// Unknown forwarder / bus event
    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    /// Virtual property events have the wrong shape
    #[error("virtual property '{name}': {reason}")]
    VirtualProperty {
        /// Property name
        name: String,
        /// What did not match
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_mismatch_message() {
        let err = CallError::ArgumentMismatch {
            index: 1,
            expected: TypeKey::of::<i32>(),
            actual: TypeKey::of::<String>(),
        };
        assert_eq!(err.to_string(), "argument 1: expected i32, got alloc::string::String");
    }

    #[test]
    fn test_access_error_source() {
        let err = CallError::Access {
            index: 0,
            source: AccessError::Borrowed,
        };
        assert_eq!(err.to_string(), "argument 0: value is already borrowed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
