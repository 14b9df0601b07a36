//! WebAssembly instantiation and export lookup.
//!
//! This module provides [`Instance`], which handles the complete
//! instantiation of a module in a store:
//!
//! 1. Check the module and store share an engine
//! 2. Check each import, by position, against the module's descriptors
//! 3. Instantiate with the imports in order (running the start function,
//!    if any)
//! 4. Bind every export to a store-scoped [`Extern`]

use std::ffi::c_char;
use std::ptr;
use std::time::Instant;

use tracing::{debug, instrument};

use wasm_embed_common::{ExternKind, RuntimeError};
use wasm_embed_sys as sys;

use crate::externals::{Extern, Func, Global, Memory, Table, empty_extern};
use crate::module::Module;
use crate::store::Store;
use crate::trap;

/// An instantiated module.
///
/// Borrows the store it was instantiated in, like every object it exports.
#[derive(Debug)]
pub struct Instance<'s> {
    store: &'s Store,
    exports: Exports<'s>,
}

impl<'s> Instance<'s> {
    /// Instantiate `module` in `store`.
    ///
    /// `imports` are matched to the module's import descriptors by position,
    /// so a module importing the same name twice gets each item separately.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Linkage`] if the engines differ, the import count
    ///   is wrong, an import has the wrong kind, or the engine rejects the
    ///   import set
    /// - [`RuntimeError::StoreMismatch`] if an import lives in another store
    /// - [`RuntimeError::Trap`] if the start function traps, including
    ///   through a failing host function
    #[instrument(skip_all, fields(module = %module.content_hash(), imports = imports.len()))]
    pub fn new(store: &'s Store, module: &Module, imports: &[Extern<'s>]) -> Result<Self, RuntimeError> {
        let start = Instant::now();

        if !module.engine().same(store.engine()) {
            return Err(RuntimeError::linkage(
                "module was compiled by a different engine than the store's",
            ));
        }

        let descriptors = module.imports()?;
        if descriptors.len() != imports.len() {
            return Err(RuntimeError::linkage(format!(
                "module expects {} imports, got {}",
                descriptors.len(),
                imports.len()
            )));
        }

        for (index, (descriptor, import)) in descriptors.iter().zip(imports).enumerate() {
            if !ptr::eq(import.store(), store) {
                return Err(RuntimeError::StoreMismatch);
            }
            let expected = descriptor.ty().kind();
            if import.kind() != expected {
                return Err(RuntimeError::linkage(format!(
                    "import {index} ({}::{}) expects a {expected}, got a {}",
                    descriptor.module(),
                    descriptor.name(),
                    import.kind()
                )));
            }
        }

        let natives: Vec<sys::wasmtime_extern_t> = imports.iter().map(Extern::as_raw).collect();
        let mut raw = sys::wasmtime_instance_t {
            store_id: 0,
            __private: 0,
        };
        let mut trap_out = ptr::null_mut();
        store.take_host_failure();
        // SAFETY: store and module are live; the imports are items of this
        // store, in descriptor order; out-values are owned by us.
        let err = unsafe {
            sys::wasmtime_instance_new(
                store.context(),
                module.raw()?,
                natives.as_ptr(),
                natives.len(),
                &raw mut raw,
                &raw mut trap_out,
            )
        };
        // A host function trapping in the start function comes back as an
        // error rather than a trap.
        let category: fn(String) -> RuntimeError = if store.take_host_failure() {
            RuntimeError::trap
        } else {
            RuntimeError::linkage
        };
        // SAFETY: both out-values are owned by us.
        unsafe { trap::check_call(err, trap_out, category) }?;
        store.note_id(raw.store_id);

        let exports = Exports::collect(store, module, &raw)?;

        debug!(
            exports = exports.len(),
            duration_us = start.elapsed().as_micros(),
            "Module instantiated"
        );

        Ok(Self { store, exports })
    }

    /// The store this instance lives in.
    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// All exports, in declaration order.
    pub fn exports(&self) -> &Exports<'s> {
        &self.exports
    }

    /// Look up an export by name.
    pub fn get_export(&self, name: &str) -> Option<Extern<'s>> {
        self.exports.get(name).cloned()
    }

    /// Look up an exported function.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ExportNotFound`] or
    /// [`RuntimeError::WrongExternKind`].
    pub fn get_func(&self, name: &str) -> Result<Func<'s>, RuntimeError> {
        self.typed_export(name, ExternKind::Func, Extern::into_func)
    }

    /// Look up an exported global.
    pub fn get_global(&self, name: &str) -> Result<Global<'s>, RuntimeError> {
        self.typed_export(name, ExternKind::Global, Extern::into_global)
    }

    /// Look up an exported table.
    pub fn get_table(&self, name: &str) -> Result<Table<'s>, RuntimeError> {
        self.typed_export(name, ExternKind::Table, Extern::into_table)
    }

    /// Look up an exported memory.
    pub fn get_memory(&self, name: &str) -> Result<Memory<'s>, RuntimeError> {
        self.typed_export(name, ExternKind::Memory, Extern::into_memory)
    }

    fn typed_export<T>(
        &self,
        name: &str,
        expected: ExternKind,
        convert: impl FnOnce(Extern<'s>) -> Option<T>,
    ) -> Result<T, RuntimeError> {
        let ext = self.get_export(name).ok_or_else(|| RuntimeError::ExportNotFound {
            name: name.to_string(),
        })?;
        let found = ext.kind();
        convert(ext).ok_or_else(|| RuntimeError::WrongExternKind {
            name: name.to_string(),
            expected,
            found,
        })
    }
}

/// The bound exports of an instance: names paired with store objects.
#[derive(Debug, Clone, Default)]
pub struct Exports<'s> {
    entries: Vec<(String, Extern<'s>)>,
}

impl<'s> Exports<'s> {
    fn collect(
        store: &'s Store,
        module: &Module,
        instance: &sys::wasmtime_instance_t,
    ) -> Result<Self, RuntimeError> {
        let descriptors = module.exports()?;
        let mut entries = Vec::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let mut item = empty_extern();
            let mut name: *mut c_char = ptr::null_mut();
            let mut name_len = 0;
            // SAFETY: the instance belongs to this store; the name is
            // borrowed from the instance and not retained.
            let found = unsafe {
                sys::wasmtime_instance_export_nth(
                    store.context(),
                    instance,
                    index,
                    &raw mut name,
                    &raw mut name_len,
                    &raw mut item,
                )
            };
            if !found {
                return Err(RuntimeError::engine(format!(
                    "instance has no export at position {index} ('{}')",
                    descriptor.name()
                )));
            }
            // SAFETY: the engine just produced `item` for this store.
            let ext = unsafe { Extern::from_raw(store, item) }?;
            entries.push((descriptor.name().to_string(), ext));
        }

        debug!(count = entries.len(), "Exports bound");
        Ok(Self { entries })
    }

    /// The export named `name`.
    pub fn get(&self, name: &str) -> Option<&Extern<'s>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ext)| ext)
    }

    /// Exports in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Extern<'s>)> {
        self.entries.iter().map(|(n, ext)| (n.as_str(), ext))
    }

    /// Export names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of exports.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the instance exports nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
