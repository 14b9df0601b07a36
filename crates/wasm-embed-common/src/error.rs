//! Error types for wasm-embed.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`RuntimeError`]: Top-level errors raised at every native-call boundary
//! - [`HostFunctionError`]: Failures of host callbacks invoked by the engine
//! - [`TrapCode`]: Classification of engine-raised traps

use std::fmt;

use thiserror::Error;

use crate::kind::{ExternKind, ValKind};

/// Top-level runtime errors.
///
/// Every failure observed at a native-call boundary is converted into one of
/// these variants at the call site that crossed into native code.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A native constructor returned a null pointer.
    #[error("Construction failed: native {what} constructor returned null")]
    NullHandle {
        /// The kind of native object that could not be created.
        what: &'static str,
    },

    /// A released or consumed handle was passed where a live one is required.
    #[error("Invalid handle: {what} has been released or consumed")]
    InvalidHandle {
        /// The kind of native object.
        what: &'static str,
    },

    /// The engine configuration was already handed to an engine.
    #[error("Configuration already consumed by engine construction")]
    ConfigConsumed,

    /// Fuel operations on a store whose engine was built without fuel.
    #[error("Fuel accounting is not enabled for this engine")]
    FuelNotEnabled,

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Module bytes were rejected before compilation.
    #[error("Validation failed: {reason}")]
    Validation {
        /// Description of the validation failure.
        reason: String,
    },

    /// WebAssembly compilation failed.
    #[error("Compilation failed: {reason}")]
    CompilationFailed {
        /// Description of the compilation failure.
        reason: String,
    },

    /// The supplied imports do not match the module's import descriptors.
    #[error("Linkage failed: {reason}")]
    Linkage {
        /// Description of the mismatch.
        reason: String,
    },

    /// An object from one store was used with another store.
    #[error("Store mismatch: object belongs to a different store")]
    StoreMismatch,

    /// The engine produced an extern with a kind this layer does not model.
    #[error("Unknown extern kind tag: {tag}")]
    UnknownExternKind {
        /// The raw native kind tag.
        tag: u8,
    },

    /// A WebAssembly trap occurred during execution.
    #[error("Wasm trap: {message}")]
    Trap {
        /// Human-readable message extracted from the native trap.
        message: String,
        /// Trap code if the engine reported one.
        code: Option<TrapCode>,
    },

    /// A value's kind does not match the kind declared at its position.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The declared kind.
        expected: String,
        /// The kind actually supplied.
        found: String,
    },

    /// Wrong number of arguments supplied to a function.
    #[error("Arity mismatch: expected {expected} arguments, got {got}")]
    ArityMismatch {
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        got: usize,
    },

    /// No export with the requested name.
    #[error("Export '{name}' not found")]
    ExportNotFound {
        /// The export name.
        name: String,
    },

    /// An export exists but is not of the requested kind.
    #[error("Export '{name}' is a {found}, not a {expected}")]
    WrongExternKind {
        /// The export name.
        name: String,
        /// The requested kind.
        expected: ExternKind,
        /// The actual kind.
        found: ExternKind,
    },

    /// Attempted to write an immutable global.
    #[error("Global is immutable")]
    ImmutableGlobal,

    /// A memory or table access fell outside the current bounds.
    #[error("Out of bounds: offset {offset} + length {len} exceeds size {size}")]
    OutOfBounds {
        /// Start of the access.
        offset: u64,
        /// Length of the access.
        len: u64,
        /// Current size of the accessed object.
        size: u64,
    },

    /// Any other failure reported by the native engine.
    #[error("Engine error: {reason}")]
    Engine {
        /// Message extracted from the native error.
        reason: String,
    },

    /// A host function failed while preparing its results.
    #[error("Host function error: {0}")]
    HostFunction(#[from] HostFunctionError),
}

/// Errors from host function implementations.
///
/// These are raised inside the callback trampoline and turned into traps
/// before control returns to the engine.
#[derive(Error, Debug)]
pub enum HostFunctionError {
    /// The engine passed a different number of arguments than declared.
    #[error("expected {expected} arguments, engine passed {got}")]
    ArgumentArity {
        /// Declared parameter count.
        expected: usize,
        /// Count passed by the engine.
        got: usize,
    },

    /// An argument could not be decoded as its declared kind.
    #[error("argument {index}: {message}")]
    Argument {
        /// Position of the offending argument.
        index: usize,
        /// Decoding failure.
        message: String,
    },

    /// The host function returned the wrong number of results.
    #[error("expected {expected} results, host function returned {got}")]
    ResultArity {
        /// Declared result count.
        expected: usize,
        /// Returned result count.
        got: usize,
    },

    /// A returned value does not match the declared result kind.
    #[error("result {index} should be {expected}, host function returned {found}")]
    ResultType {
        /// Position of the offending result.
        index: usize,
        /// Declared kind.
        expected: ValKind,
        /// Returned kind.
        found: ValKind,
    },

    /// The host function panicked.
    #[error("host function panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// The host function returned an error.
    #[error("{message}")]
    Failed {
        /// The error rendered with its causes.
        message: String,
    },
}

/// Classification of an engine-raised trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapCode {
    /// The call stack was exhausted.
    StackOverflow,
    /// Out-of-bounds linear memory access.
    MemoryOutOfBounds,
    /// Misaligned atomic access.
    HeapMisaligned,
    /// Out-of-bounds table access.
    TableOutOfBounds,
    /// `call_indirect` hit a null entry.
    IndirectCallToNull,
    /// `call_indirect` signature check failed.
    BadSignature,
    /// Integer overflow in a trapping arithmetic instruction.
    IntegerOverflow,
    /// Integer division by zero.
    IntegerDivisionByZero,
    /// Float-to-int conversion of an unrepresentable value.
    BadConversionToInteger,
    /// An `unreachable` instruction executed.
    UnreachableCodeReached,
    /// The epoch deadline was exceeded.
    Interrupt,
    /// All fuel was consumed.
    OutOfFuel,
}

impl fmt::Display for TrapCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TrapCode::StackOverflow => "call stack exhausted",
            TrapCode::MemoryOutOfBounds => "out of bounds memory access",
            TrapCode::HeapMisaligned => "misaligned memory access",
            TrapCode::TableOutOfBounds => "undefined element: out of bounds table access",
            TrapCode::IndirectCallToNull => "uninitialized element",
            TrapCode::BadSignature => "indirect call type mismatch",
            TrapCode::IntegerOverflow => "integer overflow",
            TrapCode::IntegerDivisionByZero => "integer divide by zero",
            TrapCode::BadConversionToInteger => "invalid conversion to integer",
            TrapCode::UnreachableCodeReached => "unreachable instruction executed",
            TrapCode::Interrupt => "interrupt",
            TrapCode::OutOfFuel => "all fuel consumed",
        };
        f.write_str(text)
    }
}

impl RuntimeError {
    /// Create a new `NullHandle` error.
    pub fn null_handle(what: &'static str) -> Self {
        Self::NullHandle { what }
    }

    /// Create a new `Validation` error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `Linkage` error.
    pub fn linkage(reason: impl Into<String>) -> Self {
        Self::Linkage {
            reason: reason.into(),
        }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>) -> Self {
        Self::Trap {
            message: message.into(),
            code: None,
        }
    }

    /// Create a new `Trap` error carrying a code.
    pub fn trap_with_code(message: impl Into<String>, code: Option<TrapCode>) -> Self {
        Self::Trap {
            message: message.into(),
            code,
        }
    }

    /// Create a new `TypeMismatch` error.
    pub fn type_mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Create a new `Engine` error.
    pub fn engine(reason: impl Into<String>) -> Self {
        Self::Engine {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is an engine-raised trap.
    pub fn is_trap(&self) -> bool {
        matches!(self, Self::Trap { .. })
    }

    /// Returns the trap code, if this is a trap that carried one.
    pub fn trap_code(&self) -> Option<TrapCode> {
        match self {
            Self::Trap { code, .. } => *code,
            _ => None,
        }
    }

    /// Returns `true` if this error indicates a resource limit was exceeded.
    pub fn is_resource_limit(&self) -> bool {
        matches!(
            self.trap_code(),
            Some(TrapCode::OutOfFuel | TrapCode::Interrupt | TrapCode::StackOverflow)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuntimeError::linkage("expected 1 imports, got 0");
        assert_eq!(err.to_string(), "Linkage failed: expected 1 imports, got 0");

        let err = RuntimeError::ArityMismatch {
            expected: 2,
            got: 3,
        };
        assert_eq!(
            err.to_string(),
            "Arity mismatch: expected 2 arguments, got 3"
        );
    }

    #[test]
    fn test_error_from_host_function() {
        let host_err = HostFunctionError::ResultArity {
            expected: 1,
            got: 0,
        };
        let runtime_err: RuntimeError = host_err.into();

        assert!(matches!(runtime_err, RuntimeError::HostFunction(_)));
    }

    #[test]
    fn test_type_mismatch_uses_kind_names() {
        let err = RuntimeError::type_mismatch(ValKind::I32, ValKind::F64);
        assert_eq!(err.to_string(), "Type mismatch: expected i32, found f64");
    }

    #[test]
    fn test_is_resource_limit() {
        let fuel = RuntimeError::trap_with_code("fuel", Some(TrapCode::OutOfFuel));
        let epoch = RuntimeError::trap_with_code("interrupt", Some(TrapCode::Interrupt));
        let div = RuntimeError::trap_with_code("div", Some(TrapCode::IntegerDivisionByZero));

        assert!(fuel.is_resource_limit());
        assert!(epoch.is_resource_limit());
        assert!(!div.is_resource_limit());
        assert!(!RuntimeError::ConfigConsumed.is_resource_limit());
    }

    #[test]
    fn test_trap_accessors() {
        let err = RuntimeError::trap("host said no");
        assert!(err.is_trap());
        assert_eq!(err.trap_code(), None);
        assert!(!RuntimeError::StoreMismatch.is_trap());
    }

    #[test]
    fn test_trap_code_display() {
        assert_eq!(
            TrapCode::IntegerDivisionByZero.to_string(),
            "integer divide by zero"
        );
        assert_eq!(
            TrapCode::MemoryOutOfBounds.to_string(),
            "out of bounds memory access"
        );
    }
}
