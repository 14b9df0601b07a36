//! Store-scoped WebAssembly objects.
//!
//! - [`Func`]: a guest or host function
//! - [`Global`]: a global variable
//! - [`Table`]: a table of references
//! - [`Memory`]: a linear memory
//!
//! Each object borrows the [`Store`] it lives in, so the borrow checker
//! rejects any object that would outlive its store. [`Extern`] is the closed
//! sum of the four, used for imports and exports.

mod func;
mod global;
mod memory;
mod table;

pub use func::{Func, TypedFunc};
pub use global::Global;
pub use memory::{Memory, PAGE_SIZE};
pub use table::Table;

use wasm_embed_common::{ExternKind, RuntimeError};
use wasm_embed_sys as sys;

use crate::store::Store;
use crate::types::ExternType;

/// Any importable or exportable object.
#[derive(Debug, Clone)]
pub enum Extern<'s> {
    /// A function.
    Func(Func<'s>),
    /// A global variable.
    Global(Global<'s>),
    /// A table.
    Table(Table<'s>),
    /// A linear memory.
    Memory(Memory<'s>),
}

impl<'s> Extern<'s> {
    /// Wrap a native extern, dispatching on its kind tag.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownExternKind`] for kinds without a
    /// host-side counterpart (shared memories included).
    ///
    /// # Safety
    ///
    /// `raw` must describe a live item of `store`.
    pub unsafe fn from_raw(store: &'s Store, raw: sys::wasmtime_extern_t) -> Result<Self, RuntimeError> {
        // SAFETY: each union field is read only under its matching tag and
        // the item belongs to `store` as guaranteed by the caller.
        unsafe {
            match raw.kind {
                sys::WASMTIME_EXTERN_FUNC => Ok(Extern::Func(Func::from_raw(store, raw.of.func)?)),
                sys::WASMTIME_EXTERN_GLOBAL => {
                    Ok(Extern::Global(Global::from_raw(store, raw.of.global)?))
                }
                sys::WASMTIME_EXTERN_TABLE => Ok(Extern::Table(Table::from_raw(store, raw.of.table)?)),
                sys::WASMTIME_EXTERN_MEMORY => {
                    Ok(Extern::Memory(Memory::from_raw(store, raw.of.memory)?))
                }
                tag => Err(RuntimeError::UnknownExternKind { tag }),
            }
        }
    }

    /// The native extern, as used in import lists.
    pub fn into_raw(self) -> sys::wasmtime_extern_t {
        self.as_raw()
    }

    pub(crate) fn as_raw(&self) -> sys::wasmtime_extern_t {
        match self {
            Extern::Func(f) => sys::wasmtime_extern_t {
                kind: sys::WASMTIME_EXTERN_FUNC,
                of: sys::wasmtime_extern_union_t { func: f.raw() },
            },
            Extern::Global(g) => sys::wasmtime_extern_t {
                kind: sys::WASMTIME_EXTERN_GLOBAL,
                of: sys::wasmtime_extern_union_t { global: g.raw() },
            },
            Extern::Table(t) => sys::wasmtime_extern_t {
                kind: sys::WASMTIME_EXTERN_TABLE,
                of: sys::wasmtime_extern_union_t { table: t.raw() },
            },
            Extern::Memory(m) => sys::wasmtime_extern_t {
                kind: sys::WASMTIME_EXTERN_MEMORY,
                of: sys::wasmtime_extern_union_t { memory: m.raw() },
            },
        }
    }

    /// The kind of this object.
    pub fn kind(&self) -> ExternKind {
        match self {
            Extern::Func(_) => ExternKind::Func,
            Extern::Global(_) => ExternKind::Global,
            Extern::Table(_) => ExternKind::Table,
            Extern::Memory(_) => ExternKind::Memory,
        }
    }

    /// The type of this object.
    pub fn ty(&self) -> ExternType {
        match self {
            Extern::Func(f) => ExternType::Func(f.ty().clone()),
            Extern::Global(g) => ExternType::Global(g.ty()),
            Extern::Table(t) => ExternType::Table(t.ty()),
            Extern::Memory(m) => ExternType::Memory(m.ty()),
        }
    }

    /// The store this object lives in.
    pub fn store(&self) -> &'s Store {
        match self {
            Extern::Func(f) => f.store(),
            Extern::Global(g) => g.store(),
            Extern::Table(t) => t.store(),
            Extern::Memory(m) => m.store(),
        }
    }

    /// The function, if this is one.
    pub fn into_func(self) -> Option<Func<'s>> {
        match self {
            Extern::Func(f) => Some(f),
            _ => None,
        }
    }

    /// The global, if this is one.
    pub fn into_global(self) -> Option<Global<'s>> {
        match self {
            Extern::Global(g) => Some(g),
            _ => None,
        }
    }

    /// The table, if this is one.
    pub fn into_table(self) -> Option<Table<'s>> {
        match self {
            Extern::Table(t) => Some(t),
            _ => None,
        }
    }

    /// The memory, if this is one.
    pub fn into_memory(self) -> Option<Memory<'s>> {
        match self {
            Extern::Memory(m) => Some(m),
            _ => None,
        }
    }
}

impl<'s> From<Func<'s>> for Extern<'s> {
    fn from(f: Func<'s>) -> Self {
        Extern::Func(f)
    }
}

impl<'s> From<Global<'s>> for Extern<'s> {
    fn from(g: Global<'s>) -> Self {
        Extern::Global(g)
    }
}

impl<'s> From<Table<'s>> for Extern<'s> {
    fn from(t: Table<'s>) -> Self {
        Extern::Table(t)
    }
}

impl<'s> From<Memory<'s>> for Extern<'s> {
    fn from(m: Memory<'s>) -> Self {
        Extern::Memory(m)
    }
}

/// A zeroed native extern used as an out-parameter.
pub(crate) fn empty_extern() -> sys::wasmtime_extern_t {
    sys::wasmtime_extern_t {
        kind: sys::WASMTIME_EXTERN_FUNC,
        of: sys::wasmtime_extern_union_t {
            global: sys::wasmtime_item_t {
                store_id: 0,
                __private: [0; 4],
            },
        },
    }
}
