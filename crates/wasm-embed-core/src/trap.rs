//! Native traps and errors.
//!
//! Every native call that can fail hands back either a `wasm_trap_t` (a
//! WebAssembly trap) or a `wasmtime_error_t` (anything else). Both are owned
//! by the receiver. This module wraps them, extracts their messages and turns
//! them into [`RuntimeError`] values at the call site that observed them.

use std::ffi::c_char;
use std::fmt;

use wasm_embed_common::{RuntimeError, TrapCode};
use wasm_embed_sys as sys;

use crate::handle::{ErrorHandle, TrapHandle};
use crate::vec::ByteVec;

/// An owned WebAssembly trap.
///
/// The message and code are read from the engine once, when the trap is
/// received. Converting into [`RuntimeError`] releases the native handle.
pub struct Trap {
    handle: TrapHandle,
    message: String,
    code: Option<TrapCode>,
}

impl Trap {
    /// Take ownership of a trap returned by the engine.
    ///
    /// # Safety
    ///
    /// `ptr` must be an owned, non-deleted trap (or null).
    pub(crate) unsafe fn from_raw(ptr: *mut sys::wasm_trap_t) -> Result<Self, RuntimeError> {
        // SAFETY: guaranteed by the caller.
        let handle = unsafe { TrapHandle::from_raw(ptr) }?;
        let raw = handle.as_ptr()?;

        let mut message = ByteVec::empty();
        // SAFETY: `raw` is a live trap; the message vector is owned by us.
        unsafe { sys::wasm_trap_message(raw, message.as_out_ptr()) };

        let mut native_code: sys::wasmtime_trap_code_t = 0;
        // SAFETY: `raw` is a live trap.
        let code = if unsafe { sys::wasmtime_trap_code(raw, &raw mut native_code) } {
            trap_code_from_native(native_code)
        } else {
            None
        };

        Ok(Self {
            handle,
            message: message.to_string_lossy().into_owned(),
            code,
        })
    }

    /// Create a trap carrying `message`.
    pub fn new(message: &str) -> Result<Self, RuntimeError> {
        // SAFETY: the text is valid for `message.len()` bytes and is copied.
        let ptr = unsafe { sys::wasmtime_trap_new(message.as_ptr().cast::<c_char>(), message.len()) };
        // SAFETY: the constructor returns an owned trap.
        unsafe { Self::from_raw(ptr) }
    }

    /// The engine's description of the trap.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The trap code, if the engine classified the trap.
    pub fn code(&self) -> Option<TrapCode> {
        self.code
    }

    /// Hand the native trap to the engine, which takes ownership.
    pub(crate) fn into_raw(mut self) -> Result<*mut sys::wasm_trap_t, RuntimeError> {
        self.handle.take()
    }
}

impl fmt::Debug for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trap")
            .field("message", &self.message)
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}

impl From<Trap> for RuntimeError {
    fn from(trap: Trap) -> Self {
        let Trap {
            mut handle,
            message,
            code,
        } = trap;
        handle.release();
        RuntimeError::trap_with_code(message, code)
    }
}

/// An owned `wasmtime_error_t` with its message extracted.
pub(crate) struct NativeError {
    _handle: ErrorHandle,
    message: String,
}

impl NativeError {
    /// Wrap an error out-value. Null means the call succeeded.
    ///
    /// # Safety
    ///
    /// `ptr` must be an owned, non-deleted error (or null).
    pub(crate) unsafe fn from_raw(ptr: *mut sys::wasmtime_error_t) -> Option<Self> {
        // SAFETY: guaranteed by the caller.
        let handle = unsafe { ErrorHandle::from_raw(ptr) }.ok()?;
        let mut message = ByteVec::empty();
        // SAFETY: `ptr` is a live error; the message vector is owned by us.
        unsafe { sys::wasmtime_error_message(ptr, message.as_out_ptr()) };
        Some(Self {
            _handle: handle,
            message: message.to_string_lossy().into_owned(),
        })
    }

    pub(crate) fn into_message(self) -> String {
        self.message
    }
}

/// Convert a native error out-value into `Ok(())` or a categorized error.
///
/// # Safety
///
/// Same as [`NativeError::from_raw`].
pub(crate) unsafe fn check(
    err: *mut sys::wasmtime_error_t,
    category: impl FnOnce(String) -> RuntimeError,
) -> Result<(), RuntimeError> {
    // SAFETY: guaranteed by the caller.
    match unsafe { NativeError::from_raw(err) } {
        None => Ok(()),
        Some(err) => Err(category(err.into_message())),
    }
}

/// Convert the outcome of a call that reports both traps and errors.
///
/// A trap wins over an error; an error is categorized by `category`.
///
/// # Safety
///
/// Both pointers must be owned (or null) and not deleted elsewhere.
pub(crate) unsafe fn check_call(
    err: *mut sys::wasmtime_error_t,
    trap: *mut sys::wasm_trap_t,
    category: impl FnOnce(String) -> RuntimeError,
) -> Result<(), RuntimeError> {
    if !trap.is_null() {
        // SAFETY: guaranteed by the caller; `err` is freed as well.
        drop(unsafe { NativeError::from_raw(err) });
        return Err(unsafe { Trap::from_raw(trap) }?.into());
    }
    // SAFETY: guaranteed by the caller.
    unsafe { check(err, category) }
}

/// Map a `wasmtime_trap_code_t` to a [`TrapCode`].
pub(crate) fn trap_code_from_native(code: sys::wasmtime_trap_code_t) -> Option<TrapCode> {
    let code = match code {
        sys::WASMTIME_TRAP_CODE_STACK_OVERFLOW => TrapCode::StackOverflow,
        sys::WASMTIME_TRAP_CODE_MEMORY_OUT_OF_BOUNDS => TrapCode::MemoryOutOfBounds,
        sys::WASMTIME_TRAP_CODE_HEAP_MISALIGNED => TrapCode::HeapMisaligned,
        sys::WASMTIME_TRAP_CODE_TABLE_OUT_OF_BOUNDS => TrapCode::TableOutOfBounds,
        sys::WASMTIME_TRAP_CODE_INDIRECT_CALL_TO_NULL => TrapCode::IndirectCallToNull,
        sys::WASMTIME_TRAP_CODE_BAD_SIGNATURE => TrapCode::BadSignature,
        sys::WASMTIME_TRAP_CODE_INTEGER_OVERFLOW => TrapCode::IntegerOverflow,
        sys::WASMTIME_TRAP_CODE_INTEGER_DIVISION_BY_ZERO => TrapCode::IntegerDivisionByZero,
        sys::WASMTIME_TRAP_CODE_BAD_CONVERSION_TO_INTEGER => TrapCode::BadConversionToInteger,
        sys::WASMTIME_TRAP_CODE_UNREACHABLE_CODE_REACHED => TrapCode::UnreachableCodeReached,
        sys::WASMTIME_TRAP_CODE_INTERRUPT => TrapCode::Interrupt,
        sys::WASMTIME_TRAP_CODE_OUT_OF_FUEL => TrapCode::OutOfFuel,
        _ => return None,
    };
    Some(code)
}
