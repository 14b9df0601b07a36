//! WebAssembly text format support.

use std::ffi::c_char;

use wasm_embed_common::RuntimeError;
use wasm_embed_sys as sys;

use crate::trap;
use crate::vec::ByteVec;

/// Convert WAT source into a binary module.
///
/// # Errors
///
/// Returns [`RuntimeError::CompilationFailed`] with the parser's message on
/// a syntax error.
pub fn wat2wasm(wat: &str) -> Result<Vec<u8>, RuntimeError> {
    let mut out = ByteVec::empty();
    // SAFETY: the text is valid for `wat.len()` bytes; `out` receives an
    // owned byte vector.
    let err = unsafe { sys::wasmtime_wat2wasm(wat.as_ptr().cast::<c_char>(), wat.len(), out.as_out_ptr()) };
    // SAFETY: the error, if any, is owned by us.
    unsafe { trap::check(err, RuntimeError::compilation_failed) }?;
    Ok(out.to_vec())
}
