//! Tables of references.

use wasm_embed_common::RuntimeError;
use wasm_embed_sys as sys;

use super::global::empty_item;
use crate::handle::TableTypeHandle;
use crate::store::Store;
use crate::trap;
use crate::types::TableType;
use crate::val::{Codec, Val};
use crate::vec::ValBuffer;

/// A table living in a store.
#[derive(Debug, Clone)]
pub struct Table<'s> {
    store: &'s Store,
    raw: sys::wasmtime_table_t,
    ty: TableType,
}

impl<'s> Table<'s> {
    /// Create a table with every slot set to `init`.
    pub fn new(store: &'s Store, ty: TableType, init: Val) -> Result<Self, RuntimeError> {
        if init.kind() != ty.element() {
            return Err(RuntimeError::type_mismatch(ty.element(), init.kind()));
        }

        let native_ty = ty.to_native()?;
        let init = encode_one(store, &init)?;
        let mut raw = empty_item();
        // SAFETY: the type and the initial value are borrowed for the call.
        let err = unsafe {
            sys::wasmtime_table_new(store.context(), native_ty.as_ptr()?, init.as_ptr(), &raw mut raw)
        };
        // SAFETY: the error, if any, is owned by us.
        unsafe { trap::check(err, RuntimeError::engine) }?;

        store.note_id(raw.store_id);
        Ok(Self { store, raw, ty })
    }

    pub(crate) fn from_raw(store: &'s Store, raw: sys::wasmtime_table_t) -> Result<Self, RuntimeError> {
        // SAFETY: `raw` belongs to `store`; the returned type is owned by us.
        let native_ty = unsafe {
            TableTypeHandle::from_raw(sys::wasmtime_table_type(store.context(), &raw const raw))
        }?;
        // SAFETY: the handle is live until the end of this function.
        let ty = unsafe { TableType::from_native(native_ty.as_ptr()?) }?;
        store.note_id(raw.store_id);
        Ok(Self { store, raw, ty })
    }

    /// The table's declared type.
    ///
    /// `limits().min` is the initial size and does not follow [`grow`];
    /// use [`size`] for the current number of slots.
    ///
    /// [`grow`]: Table::grow
    /// [`size`]: Table::size
    pub fn ty(&self) -> TableType {
        self.ty
    }

    /// The store this table lives in.
    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// Current number of slots.
    pub fn size(&self) -> u64 {
        // SAFETY: the table belongs to this store.
        unsafe { sys::wasmtime_table_size(self.store.context(), &raw const self.raw) }
    }

    /// The value at `index`, or `None` if the index is out of bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored reference cannot be decoded.
    pub fn get(&self, index: u64) -> Result<Option<Val>, RuntimeError> {
        let mut out = ValBuffer::zeroed(self.store.context(), 1);
        // SAFETY: `out` has room for one value.
        let found = unsafe {
            sys::wasmtime_table_get(self.store.context(), &raw const self.raw, index, out.as_mut_ptr())
        };
        if !found {
            return Ok(None);
        }
        let raw = out
            .as_slice()
            .first()
            .ok_or_else(|| RuntimeError::engine("table read produced no value"))?;
        Codec::new(self.store).decode(raw, self.ty.element()).map(Some)
    }

    /// Store `val` at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::OutOfBounds`] past the end of the table and
    /// [`RuntimeError::TypeMismatch`] for a value of the wrong kind.
    pub fn set(&self, index: u64, val: Val) -> Result<(), RuntimeError> {
        if val.kind() != self.ty.element() {
            return Err(RuntimeError::type_mismatch(self.ty.element(), val.kind()));
        }
        let size = self.size();
        if index >= size {
            return Err(RuntimeError::OutOfBounds {
                offset: index,
                len: 1,
                size,
            });
        }

        let val = encode_one(self.store, &val)?;
        // SAFETY: the value is borrowed for the call.
        let err = unsafe {
            sys::wasmtime_table_set(self.store.context(), &raw const self.raw, index, val.as_ptr())
        };
        // SAFETY: the error, if any, is owned by us.
        unsafe { trap::check(err, RuntimeError::engine) }
    }

    /// Grow the table by `delta` slots set to `init`, returning the
    /// previous size.
    pub fn grow(&self, delta: u64, init: Val) -> Result<u64, RuntimeError> {
        if init.kind() != self.ty.element() {
            return Err(RuntimeError::type_mismatch(self.ty.element(), init.kind()));
        }

        let init = encode_one(self.store, &init)?;
        let mut prev = 0;
        // SAFETY: the value is borrowed for the call.
        let err = unsafe {
            sys::wasmtime_table_grow(
                self.store.context(),
                &raw const self.raw,
                delta,
                init.as_ptr(),
                &raw mut prev,
            )
        };
        // SAFETY: the error, if any, is owned by us.
        unsafe { trap::check(err, RuntimeError::engine) }?;
        Ok(prev)
    }

    pub(crate) fn raw(&self) -> sys::wasmtime_table_t {
        self.raw
    }
}

fn encode_one(store: &Store, val: &Val) -> Result<ValBuffer, RuntimeError> {
    let mut buffer = ValBuffer::with_capacity(store.context(), 1);
    buffer.push(Codec::new(store).encode(val)?);
    Ok(buffer)
}
