//! Linear memories.

use std::ptr;

use wasm_embed_common::RuntimeError;
use wasm_embed_sys as sys;

use super::global::empty_item;
use crate::handle::MemoryTypeHandle;
use crate::store::Store;
use crate::trap;
use crate::types::MemoryType;

/// Size of a WebAssembly page in bytes.
pub const PAGE_SIZE: usize = 64 * 1024;

/// A linear memory living in a store.
///
/// Access goes through bounds-checked copies; the memory may move when it
/// grows, so no reference into it is handed out.
#[derive(Debug, Clone)]
pub struct Memory<'s> {
    store: &'s Store,
    raw: sys::wasmtime_memory_t,
    ty: MemoryType,
}

impl<'s> Memory<'s> {
    /// Create a memory.
    pub fn new(store: &'s Store, ty: MemoryType) -> Result<Self, RuntimeError> {
        let native_ty = ty.to_native()?;
        let mut raw = empty_item();
        // SAFETY: the type is borrowed for the call.
        let err = unsafe { sys::wasmtime_memory_new(store.context(), native_ty.as_ptr()?, &raw mut raw) };
        // SAFETY: the error, if any, is owned by us.
        unsafe { trap::check(err, RuntimeError::engine) }?;

        store.note_id(raw.store_id);
        Ok(Self { store, raw, ty })
    }

    pub(crate) fn from_raw(store: &'s Store, raw: sys::wasmtime_memory_t) -> Result<Self, RuntimeError> {
        // SAFETY: `raw` belongs to `store`; the returned type is owned by us.
        let native_ty = unsafe {
            MemoryTypeHandle::from_raw(sys::wasmtime_memory_type(store.context(), &raw const raw))
        }?;
        // SAFETY: the handle is live until the end of this function.
        let ty = unsafe { MemoryType::from_native(native_ty.as_ptr()?) };
        store.note_id(raw.store_id);
        Ok(Self { store, raw, ty })
    }

    /// The memory's declared type.
    ///
    /// `limits().min` is the initial size and does not follow [`grow`];
    /// use [`size`] for the current number of pages.
    ///
    /// [`grow`]: Memory::grow
    /// [`size`]: Memory::size
    pub fn ty(&self) -> MemoryType {
        self.ty
    }

    /// The store this memory lives in.
    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// Current size in pages.
    pub fn size(&self) -> u64 {
        // SAFETY: the memory belongs to this store.
        unsafe { sys::wasmtime_memory_size(self.store.context(), &raw const self.raw) }
    }

    /// Current size in bytes.
    pub fn data_size(&self) -> usize {
        // SAFETY: the memory belongs to this store.
        unsafe { sys::wasmtime_memory_data_size(self.store.context(), &raw const self.raw) }
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), RuntimeError> {
        let base = self.checked_base(offset, buf.len())?;
        // SAFETY: the range was bounds-checked against the current size and
        // host buffers never alias guest memory.
        unsafe { ptr::copy_nonoverlapping(base, buf.as_mut_ptr(), buf.len()) };
        Ok(())
    }

    /// Copy `data` into memory starting at `offset`.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<(), RuntimeError> {
        let base = self.checked_base(offset, data.len())?;
        // SAFETY: as in `read`.
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), base, data.len()) };
        Ok(())
    }

    /// Grow by `delta` pages, returning the previous size in pages.
    pub fn grow(&self, delta: u64) -> Result<u64, RuntimeError> {
        let mut prev = 0;
        // SAFETY: the memory belongs to this store.
        let err = unsafe {
            sys::wasmtime_memory_grow(self.store.context(), &raw const self.raw, delta, &raw mut prev)
        };
        // SAFETY: the error, if any, is owned by us.
        unsafe { trap::check(err, RuntimeError::engine) }?;
        Ok(prev)
    }

    /// Pointer to `offset` after checking that `len` bytes fit.
    fn checked_base(&self, offset: usize, len: usize) -> Result<*mut u8, RuntimeError> {
        let size = self.data_size();
        let out_of_bounds = || RuntimeError::OutOfBounds {
            offset: offset as u64,
            len: len as u64,
            size: size as u64,
        };
        let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > size {
            return Err(out_of_bounds());
        }
        if len == 0 {
            return Ok(ptr::NonNull::dangling().as_ptr());
        }
        // SAFETY: the memory belongs to this store.
        let data = unsafe { sys::wasmtime_memory_data(self.store.context(), &raw const self.raw) };
        if data.is_null() {
            return Err(RuntimeError::engine("memory has no backing storage"));
        }
        // SAFETY: `offset + len <= size`, so the result stays in bounds.
        Ok(unsafe { data.add(offset) })
    }

    pub(crate) fn raw(&self) -> sys::wasmtime_memory_t {
        self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::types::Limits;

    #[test]
    fn test_memory_read_write() {
        let engine = Engine::new().unwrap();
        let store = Store::new(&engine).unwrap();
        let memory = Memory::new(&store, MemoryType::new(Limits::new(1, None))).unwrap();

        assert_eq!(memory.size(), 1);
        assert_eq!(memory.data_size(), PAGE_SIZE);

        memory.write(100, b"hello").unwrap();
        let mut buf = [0u8; 5];
        memory.read(100, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_memory_out_of_bounds() {
        let engine = Engine::new().unwrap();
        let store = Store::new(&engine).unwrap();
        let memory = Memory::new(&store, MemoryType::new(Limits::new(1, Some(1)))).unwrap();

        let mut buf = [0u8; 8];
        assert!(matches!(
            memory.read(PAGE_SIZE - 4, &mut buf),
            Err(RuntimeError::OutOfBounds { len: 8, .. })
        ));
        assert!(matches!(
            memory.write(usize::MAX, b"x"),
            Err(RuntimeError::OutOfBounds { .. })
        ));
        memory.read(PAGE_SIZE, &mut []).unwrap();
    }

    #[test]
    fn test_memory_grow() {
        let engine = Engine::new().unwrap();
        let store = Store::new(&engine).unwrap();
        let memory = Memory::new(&store, MemoryType::new(Limits::new(1, Some(3)))).unwrap();

        assert_eq!(memory.grow(2).unwrap(), 1);
        assert_eq!(memory.size(), 3);
        assert!(memory.grow(1).is_err());
        assert_eq!(memory.ty().limits(), Limits::new(1, Some(3)));

        memory.write(2 * PAGE_SIZE, &[7]).unwrap();
    }
}
