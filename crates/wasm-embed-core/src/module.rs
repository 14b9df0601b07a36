//! WebAssembly module validation and compilation.
//!
//! This module provides [`Module`], an owned compiled module bound to the
//! engine that compiled it. Modules can be:
//!
//! - **Validated** without compiling ([`Module::validate`])
//! - **Compiled** from binary or text format
//! - **Serialized** for ahead-of-time caching and loaded back with
//!   [`Module::deserialize`]

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::ptr;
use std::time::Instant;

use tracing::{debug, info, instrument};

use wasm_embed_common::RuntimeError;
use wasm_embed_sys as sys;

use crate::engine::{AsEngine, Engine};
use crate::handle::ModuleHandle;
use crate::trap;
use crate::types::{ExportType, ImportType};
use crate::vec::{ByteVec, ExportTypeVec, ImportTypeVec};
use crate::wat::wat2wasm;

/// A compiled WebAssembly module.
///
/// # Thread Safety
///
/// `Module` is thread-safe and can be shared across stores of its engine.
/// The handle is declared before the engine so it is released first.
pub struct Module {
    handle: ModuleHandle,
    content_hash: String,
    engine: Engine,
}

// SAFETY: compiled modules are immutable and internally reference counted by
// the engine.
unsafe impl Send for Module {}
// SAFETY: as above.
unsafe impl Sync for Module {}

impl Module {
    /// Check whether `bytes` is a valid module for `engine`.
    ///
    /// An empty buffer is invalid and never reaches the engine. This never
    /// fails; any engine problem reads as "invalid".
    pub fn validate(engine: &Engine, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return false;
        }
        let Ok(raw) = engine.raw() else {
            return false;
        };
        // SAFETY: `bytes` is valid for `bytes.len()` reads.
        let err = unsafe { sys::wasmtime_module_validate(raw, bytes.as_ptr(), bytes.len()) };
        // SAFETY: the error, if any, is owned by us and freed here.
        unsafe { trap::check(err, RuntimeError::validation) }.is_ok()
    }

    /// Compile a module from WebAssembly bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Validation`] for an empty buffer, or
    /// [`RuntimeError::CompilationFailed`] with the engine's message.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn new(engine: &impl AsEngine, bytes: &[u8]) -> Result<Self, RuntimeError> {
        let engine = engine.engine();
        let start = Instant::now();

        if bytes.is_empty() {
            return Err(RuntimeError::validation("module bytes are empty"));
        }

        let mut raw = ptr::null_mut();
        // SAFETY: `bytes` is valid for `bytes.len()` reads; `raw` receives an
        // owned module on success.
        let err = unsafe {
            sys::wasmtime_module_new(engine.raw()?, bytes.as_ptr(), bytes.len(), &raw mut raw)
        };
        // SAFETY: the error, if any, is owned by us.
        unsafe { trap::check(err, RuntimeError::compilation_failed) }?;
        // SAFETY: success means `raw` is an owned module.
        let handle = unsafe { ModuleHandle::from_raw(raw) }?;

        let content_hash = compute_hash(bytes);
        let duration = start.elapsed();

        info!(
            content_hash = %content_hash,
            duration_ms = duration.as_millis(),
            "Module compiled"
        );

        Ok(Self {
            handle,
            content_hash,
            engine: engine.clone(),
        })
    }

    /// Compile a module from WAT (WebAssembly Text Format).
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::CompilationFailed`] on a syntax or
    /// compilation error.
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &impl AsEngine, wat: &str) -> Result<Self, RuntimeError> {
        let bytes = wat2wasm(wat)?;
        Self::new(engine, &bytes)
    }

    /// Load a module previously produced by [`Module::serialize`].
    ///
    /// # Safety
    ///
    /// The bytes are trusted machine code. Only load artifacts produced by
    /// the same engine version and configuration.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub unsafe fn deserialize(engine: &Engine, bytes: &[u8]) -> Result<Self, RuntimeError> {
        let start = Instant::now();

        if bytes.is_empty() {
            return Err(RuntimeError::validation("serialized module is empty"));
        }

        let mut raw = ptr::null_mut();
        // SAFETY: guaranteed by the caller; `bytes` is readable.
        let err = unsafe {
            sys::wasmtime_module_deserialize(engine.raw()?, bytes.as_ptr(), bytes.len(), &raw mut raw)
        };
        // SAFETY: the error, if any, is owned by us.
        unsafe { trap::check(err, RuntimeError::compilation_failed) }?;
        // SAFETY: success means `raw` is an owned module.
        let handle = unsafe { ModuleHandle::from_raw(raw) }?;

        let content_hash = compute_hash(bytes);
        debug!(
            content_hash = %content_hash,
            duration_us = start.elapsed().as_micros(),
            "Precompiled module loaded"
        );

        Ok(Self {
            handle,
            content_hash,
            engine: engine.clone(),
        })
    }

    /// Serialize the compiled module for AOT caching.
    pub fn serialize(&self) -> Result<Vec<u8>, RuntimeError> {
        let mut out = ByteVec::empty();
        // SAFETY: the module is live; `out` receives an owned byte vector.
        let err = unsafe { sys::wasmtime_module_serialize(self.raw()?, out.as_out_ptr()) };
        // SAFETY: the error, if any, is owned by us.
        unsafe { trap::check(err, RuntimeError::engine) }?;
        Ok(out.to_vec())
    }

    /// Import descriptors, in declaration order.
    pub fn imports(&self) -> Result<Vec<ImportType>, RuntimeError> {
        let mut vec = ImportTypeVec::empty();
        // SAFETY: the module is live; `vec` receives an owned vector.
        unsafe { sys::wasmtime_module_imports(self.raw()?, vec.as_out_ptr()) };
        vec.as_slice()
            .iter()
            // SAFETY: every element is a live import type owned by `vec`.
            .map(|ty| unsafe { ImportType::from_native(*ty) })
            .collect()
    }

    /// Export descriptors, in declaration order.
    pub fn exports(&self) -> Result<Vec<ExportType>, RuntimeError> {
        let mut vec = ExportTypeVec::empty();
        // SAFETY: the module is live; `vec` receives an owned vector.
        unsafe { sys::wasmtime_module_exports(self.raw()?, vec.as_out_ptr()) };
        vec.as_slice()
            .iter()
            // SAFETY: every element is a live export type owned by `vec`.
            .map(|ty| unsafe { ExportType::from_native(*ty) })
            .collect()
    }

    /// The engine that compiled this module.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Get the content hash of the original Wasm bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub(crate) fn raw(&self) -> Result<*mut sys::wasmtime_module_t, RuntimeError> {
        self.handle.as_ptr()
    }
}

impl Clone for Module {
    /// Clones share compiled code but own independent native handles.
    fn clone(&self) -> Self {
        let raw = match self.handle.as_ptr() {
            // SAFETY: the module is live.
            Ok(raw) => unsafe { sys::wasmtime_module_clone(raw) },
            Err(_) => ptr::null_mut(),
        };
        Self {
            // SAFETY: the clone is an owned module; null yields an invalid handle.
            handle: unsafe { ModuleHandle::adopt(raw) },
            content_hash: self.content_hash.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_embed_common::ExternKind;

    // Minimal valid Wasm module (empty module)
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    #[test]
    fn test_validate() {
        let engine = Engine::new().unwrap();

        assert!(Module::validate(&engine, MINIMAL_WASM));
        assert!(!Module::validate(&engine, &[]));
        assert!(!Module::validate(&engine, &[0, 0, 0, 0]));
    }

    #[test]
    fn test_empty_bytes_rejected() {
        let engine = Engine::new().unwrap();
        assert!(matches!(
            Module::new(&engine, &[]),
            Err(RuntimeError::Validation { .. })
        ));
    }

    #[test]
    fn test_garbage_fails_compilation() {
        let engine = Engine::new().unwrap();
        assert!(matches!(
            Module::new(&engine, &[0, 0, 0, 0]),
            Err(RuntimeError::CompilationFailed { .. })
        ));
    }

    #[test]
    fn test_compute_hash() {
        let hash1 = compute_hash(b"hello");
        let hash2 = compute_hash(b"hello");
        let hash3 = compute_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16); // 64-bit hex
    }

    #[test]
    fn test_module_compilation() {
        let engine = Engine::new().unwrap();

        let module = Module::new(&engine, MINIMAL_WASM);
        assert!(module.is_ok());

        let module = module.unwrap();
        assert!(!module.content_hash().is_empty());
        assert!(module.imports().unwrap().is_empty());
        assert!(module.exports().unwrap().is_empty());
    }

    #[test]
    fn test_descriptors() {
        let engine = Engine::new().unwrap();
        let module = Module::from_wat(
            &engine,
            r#"
            (module
                (import "env" "log" (func $log (param i32)))
                (memory (export "memory") 1)
                (func (export "run") (result i32) i32.const 1)
            )
            "#,
        )
        .unwrap();

        let imports = module.imports().unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].module(), "env");
        assert_eq!(imports[0].name(), "log");
        assert_eq!(imports[0].ty().kind(), ExternKind::Func);

        let exports = module.exports().unwrap();
        let names: Vec<_> = exports.iter().map(ExportType::name).collect();
        assert_eq!(names, ["memory", "run"]);
        assert_eq!(exports[0].ty().kind(), ExternKind::Memory);
    }

    #[test]
    fn test_serialize_round_trip() {
        let engine = Engine::new().unwrap();
        let module = Module::from_wat(&engine, r#"(module (func (export "f")))"#).unwrap();

        let bytes = module.serialize().unwrap();
        let loaded = unsafe { Module::deserialize(&engine, &bytes) }.unwrap();
        assert_eq!(loaded.exports().unwrap().len(), 1);
    }

    #[test]
    fn test_module_clone() {
        let engine = Engine::new().unwrap();
        let module = Module::new(&engine, MINIMAL_WASM).unwrap();
        let copy = module.clone();
        drop(module);

        assert!(copy.exports().is_ok());
        assert!(copy.engine().same(&engine));
    }

    #[test]
    fn test_module_debug() {
        let engine = Engine::new().unwrap();
        let module = Module::new(&engine, MINIMAL_WASM).unwrap();

        let debug_str = format!("{module:?}");
        assert!(debug_str.contains("Module"));
        assert!(debug_str.contains("content_hash"));
    }
}
