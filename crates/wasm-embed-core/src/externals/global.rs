//! Global variables.

use wasm_embed_common::{Mutability, RuntimeError};
use wasm_embed_sys as sys;

use crate::handle::GlobalTypeHandle;
use crate::store::Store;
use crate::trap;
use crate::types::GlobalType;
use crate::val::{Codec, Val};
use crate::vec::ValBuffer;

/// A global variable living in a store.
#[derive(Debug, Clone)]
pub struct Global<'s> {
    store: &'s Store,
    raw: sys::wasmtime_global_t,
    ty: GlobalType,
}

impl<'s> Global<'s> {
    /// Create a global initialized to `init`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::TypeMismatch`] if `init` does not match the
    /// declared content kind.
    pub fn new(store: &'s Store, ty: GlobalType, init: Val) -> Result<Self, RuntimeError> {
        if init.kind() != ty.content() {
            return Err(RuntimeError::type_mismatch(ty.content(), init.kind()));
        }

        let native_ty = ty.to_native()?;
        let context = store.context();
        let mut value = ValBuffer::with_capacity(context, 1);
        value.push(Codec::new(store).encode(&init)?);

        let mut raw = empty_item();
        // SAFETY: the type and the value are borrowed for the call.
        let err = unsafe {
            sys::wasmtime_global_new(context, native_ty.as_ptr()?, value.as_ptr(), &raw mut raw)
        };
        // SAFETY: the error, if any, is owned by us.
        unsafe { trap::check(err, RuntimeError::engine) }?;

        store.note_id(raw.store_id);
        Ok(Self { store, raw, ty })
    }

    pub(crate) fn from_raw(store: &'s Store, raw: sys::wasmtime_global_t) -> Result<Self, RuntimeError> {
        // SAFETY: `raw` belongs to `store`; the returned type is owned by us.
        let native_ty = unsafe {
            GlobalTypeHandle::from_raw(sys::wasmtime_global_type(store.context(), &raw const raw))
        }?;
        // SAFETY: the handle is live until the end of this function.
        let ty = unsafe { GlobalType::from_native(native_ty.as_ptr()?) }?;
        store.note_id(raw.store_id);
        Ok(Self { store, raw, ty })
    }

    /// The global's type.
    pub fn ty(&self) -> GlobalType {
        self.ty
    }

    /// The store this global lives in.
    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// Read the current value.
    pub fn get(&self) -> Result<Val, RuntimeError> {
        let mut out = ValBuffer::zeroed(self.store.context(), 1);
        // SAFETY: `out` has room for one value.
        unsafe { sys::wasmtime_global_get(self.store.context(), &raw const self.raw, out.as_mut_ptr()) };
        let codec = Codec::new(self.store);
        out.as_slice()
            .first()
            .ok_or_else(|| RuntimeError::engine("global read produced no value"))
            .and_then(|raw| codec.decode(raw, self.ty.content()))
    }

    /// Write a new value.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ImmutableGlobal`] for a `const` global and
    /// [`RuntimeError::TypeMismatch`] for a value of the wrong kind. Neither
    /// reaches the engine.
    pub fn set(&self, val: Val) -> Result<(), RuntimeError> {
        if self.ty.mutability() == Mutability::Const {
            return Err(RuntimeError::ImmutableGlobal);
        }
        if val.kind() != self.ty.content() {
            return Err(RuntimeError::type_mismatch(self.ty.content(), val.kind()));
        }

        let context = self.store.context();
        let mut value = ValBuffer::with_capacity(context, 1);
        value.push(Codec::new(self.store).encode(&val)?);
        // SAFETY: the value is borrowed for the call.
        let err = unsafe { sys::wasmtime_global_set(context, &raw const self.raw, value.as_ptr()) };
        // SAFETY: the error, if any, is owned by us.
        unsafe { trap::check(err, RuntimeError::engine) }
    }

    pub(crate) fn raw(&self) -> sys::wasmtime_global_t {
        self.raw
    }
}

/// A zeroed item used as an out-parameter.
pub(crate) fn empty_item() -> sys::wasmtime_item_t {
    sys::wasmtime_item_t {
        store_id: 0,
        __private: [0; 4],
    }
}
