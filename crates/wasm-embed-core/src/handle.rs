//! Exclusive ownership of native engine objects.
//!
//! Every pointer returned by the C ABI that must eventually be deleted is
//! wrapped in a [`Handle`]. The handle's resource marker ties the pointer
//! type to its delete function at compile time, so a module pointer can
//! never be released through the engine delete function.
//!
//! A handle is in exactly one of two states:
//! - **valid**: it owns a non-null pointer and will delete it once
//! - **invalid**: it was released, or its ownership was handed to native
//!   code with [`Handle::take`]

use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use wasm_embed_common::RuntimeError;
use wasm_embed_sys as sys;

/// A native object kind with a dedicated delete function.
pub trait NativeResource {
    /// The opaque native type.
    type Raw;

    /// Human-readable name used in error messages.
    const NAME: &'static str;

    /// Free the native object.
    ///
    /// # Safety
    ///
    /// `ptr` must be non-null, owned by the caller and not used afterwards.
    unsafe fn delete(ptr: *mut Self::Raw);
}

/// Owner of exactly one native pointer.
pub struct Handle<R: NativeResource> {
    ptr: *mut R::Raw,
    _marker: PhantomData<R>,
}

impl<R: NativeResource> Handle<R> {
    /// Take ownership of a pointer returned by a native constructor.
    ///
    /// A null pointer means the constructor failed and is reported as
    /// [`RuntimeError::NullHandle`].
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must be an owned `R::Raw` that nothing else deletes.
    pub unsafe fn from_raw(ptr: *mut R::Raw) -> Result<Self, RuntimeError> {
        if ptr.is_null() {
            return Err(RuntimeError::null_handle(R::NAME));
        }
        Ok(Self {
            ptr,
            _marker: PhantomData,
        })
    }

    /// Take ownership of a pointer that may be null.
    ///
    /// A null pointer yields an already-invalid handle; every later use
    /// reports [`RuntimeError::InvalidHandle`].
    ///
    /// # Safety
    ///
    /// Same as [`Handle::from_raw`].
    pub unsafe fn adopt(ptr: *mut R::Raw) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Returns `true` while the handle owns a live pointer.
    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null()
    }

    /// Borrow the native pointer for a call.
    pub fn as_ptr(&self) -> Result<*mut R::Raw, RuntimeError> {
        if self.ptr.is_null() {
            return Err(RuntimeError::InvalidHandle { what: R::NAME });
        }
        Ok(self.ptr)
    }

    /// Free the native object. Calling this again is a no-op.
    pub fn release(&mut self) {
        let ptr = std::mem::replace(&mut self.ptr, ptr::null_mut());
        if !ptr.is_null() {
            // SAFETY: the pointer was owned by this handle and is now detached
            // from it, so it is deleted exactly once.
            unsafe { R::delete(ptr) };
        }
    }

    /// Hand ownership of the pointer to native code.
    ///
    /// The handle becomes invalid without deleting anything.
    pub fn take(&mut self) -> Result<*mut R::Raw, RuntimeError> {
        let ptr = self.as_ptr()?;
        self.ptr = ptr::null_mut();
        Ok(ptr)
    }
}

impl<R: NativeResource> Drop for Handle<R> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<R: NativeResource> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &R::NAME)
            .field("ptr", &self.ptr)
            .finish()
    }
}

macro_rules! native_resources {
    ($($(#[$meta:meta])* $marker:ident, $alias:ident => $raw:ty, $name:literal, $delete:path;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug)]
            pub enum $marker {}

            impl NativeResource for $marker {
                type Raw = $raw;
                const NAME: &'static str = $name;

                unsafe fn delete(ptr: *mut Self::Raw) {
                    // SAFETY: forwarded from the trait contract.
                    unsafe { $delete(ptr) }
                }
            }

            #[doc = concat!("Owned native ", $name, ".")]
            pub type $alias = Handle<$marker>;
        )*
    };
}

native_resources! {
    /// `wasm_config_t`.
    ConfigResource, ConfigHandle => sys::wasm_config_t, "config", sys::wasm_config_delete;
    /// `wasm_engine_t`.
    EngineResource, EngineHandle => sys::wasm_engine_t, "engine", sys::wasm_engine_delete;
    /// `wasmtime_store_t`.
    StoreResource, StoreHandle => sys::wasmtime_store_t, "store", sys::wasmtime_store_delete;
    /// `wasmtime_module_t`.
    ModuleResource, ModuleHandle => sys::wasmtime_module_t, "module", sys::wasmtime_module_delete;
    /// `wasm_trap_t`.
    TrapResource, TrapHandle => sys::wasm_trap_t, "trap", sys::wasm_trap_delete;
    /// `wasmtime_error_t`.
    ErrorResource, ErrorHandle => sys::wasmtime_error_t, "error", sys::wasmtime_error_delete;
    /// `wasm_valtype_t`.
    ValTypeResource, ValTypeHandle => sys::wasm_valtype_t, "valtype", sys::wasm_valtype_delete;
    /// `wasm_functype_t`.
    FuncTypeResource, FuncTypeHandle => sys::wasm_functype_t, "functype", sys::wasm_functype_delete;
    /// `wasm_globaltype_t`.
    GlobalTypeResource, GlobalTypeHandle => sys::wasm_globaltype_t, "globaltype", sys::wasm_globaltype_delete;
    /// `wasm_tabletype_t`.
    TableTypeResource, TableTypeHandle => sys::wasm_tabletype_t, "tabletype", sys::wasm_tabletype_delete;
    /// `wasm_memorytype_t`.
    MemoryTypeResource, MemoryTypeHandle => sys::wasm_memorytype_t, "memorytype", sys::wasm_memorytype_delete;
}
