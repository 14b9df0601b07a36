//! Owned `wasm_*_vec_t` vectors.
//!
//! The C ABI passes sequences as a `(size, data)` pair whose storage is
//! allocated and freed by the engine. [`NativeVec`] owns one such vector and
//! calls the matching delete function exactly once. Vectors handed to native
//! code by value (for example the parameter list of a new function type) are
//! detached with [`NativeVec::into_native`] and never deleted here.
//!
//! [`ValBuffer`] is the one host-allocated sequence: a flat array of
//! `wasmtime_val_t` used for call arguments and results.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::slice;

use wasm_embed_common::{RuntimeError, ValKind};
use wasm_embed_sys as sys;

use crate::handle::ValTypeHandle;
use crate::val::kind_to_valtype;

/// Element type and delete function of one native vector family.
pub trait VecKind {
    /// Element stored in the vector.
    type Elem;

    /// Free the vector's storage, and its elements if they are owned.
    ///
    /// # Safety
    ///
    /// `vec` must point to a vector created by the engine that has not been
    /// deleted yet.
    unsafe fn delete(vec: *mut sys::wasm_vec_t<Self::Elem>);
}

macro_rules! vec_kinds {
    ($($(#[$meta:meta])* $marker:ident, $alias:ident => $elem:ty, $delete:path;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug)]
            pub enum $marker {}

            impl VecKind for $marker {
                type Elem = $elem;

                unsafe fn delete(vec: *mut sys::wasm_vec_t<$elem>) {
                    // SAFETY: forwarded from the trait contract.
                    unsafe { $delete(vec) }
                }
            }

            #[doc = concat!("Owned [`", stringify!($marker), "`] vector.")]
            pub type $alias = NativeVec<$marker>;
        )*
    };
}

vec_kinds! {
    /// Raw bytes (`wasm_byte_vec_t`, also names and messages).
    Bytes, ByteVec => sys::wasm_byte_t, sys::wasm_byte_vec_delete;
    /// Value types (`wasm_valtype_vec_t`).
    ValTypes, ValTypeVec => *mut sys::wasm_valtype_t, sys::wasm_valtype_vec_delete;
    /// Import descriptors (`wasm_importtype_vec_t`).
    ImportTypes, ImportTypeVec => *mut sys::wasm_importtype_t, sys::wasm_importtype_vec_delete;
    /// Export descriptors (`wasm_exporttype_vec_t`).
    ExportTypes, ExportTypeVec => *mut sys::wasm_exporttype_t, sys::wasm_exporttype_vec_delete;
}

/// Owner of one native vector.
pub struct NativeVec<K: VecKind> {
    raw: sys::wasm_vec_t<K::Elem>,
    _marker: PhantomData<K>,
}

impl<K: VecKind> NativeVec<K> {
    /// An empty vector, typically filled through [`NativeVec::as_out_ptr`].
    pub fn empty() -> Self {
        Self {
            raw: sys::wasm_vec_t::empty(),
            _marker: PhantomData,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        if self.raw.data.is_null() {
            0
        } else {
            self.raw.size
        }
    }

    /// Returns `true` if the vector holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bounds-checked element access.
    pub fn get(&self, index: usize) -> Option<&K::Elem> {
        self.as_slice().get(index)
    }

    /// View the elements as a slice.
    pub fn as_slice(&self) -> &[K::Elem] {
        if self.raw.data.is_null() {
            return &[];
        }
        // SAFETY: a non-null `data` points to `size` initialized elements
        // owned by this vector.
        unsafe { slice::from_raw_parts(self.raw.data, self.raw.size) }
    }

    /// Out-parameter for native functions that fill a vector.
    ///
    /// Any previous contents are released first, so the native writer
    /// always starts from an empty vector.
    pub fn as_out_ptr(&mut self) -> *mut sys::wasm_vec_t<K::Elem> {
        self.release();
        &raw mut self.raw
    }

    /// Borrow the vector for native functions taking `const wasm_*_vec_t*`.
    pub fn as_ptr(&self) -> *const sys::wasm_vec_t<K::Elem> {
        &raw const self.raw
    }

    /// Detach the vector for a native call that takes ownership of it.
    pub fn into_native(self) -> sys::wasm_vec_t<K::Elem> {
        let this = ManuallyDrop::new(self);
        sys::wasm_vec_t {
            size: this.raw.size,
            data: this.raw.data,
        }
    }

    fn release(&mut self) {
        if !self.raw.data.is_null() {
            // SAFETY: the storage was produced by the engine and is released
            // once; the fields are reset right after.
            unsafe { K::delete(&raw mut self.raw) };
        }
        self.raw = sys::wasm_vec_t::empty();
    }
}

impl<K: VecKind> NativeVec<K>
where
    K::Elem: Clone,
{
    /// Copy the elements into a host vector.
    pub fn to_vec(&self) -> Vec<K::Elem> {
        self.as_slice().to_vec()
    }
}

impl<K: VecKind> Drop for NativeVec<K> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<K: VecKind> fmt::Debug for NativeVec<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeVec").field("len", &self.len()).finish()
    }
}

impl ByteVec {
    /// Copy `bytes` into a natively allocated vector of exactly that size.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut vec = Self::empty();
        if bytes.is_empty() {
            // SAFETY: writes an empty vector into the out-parameter.
            unsafe { sys::wasm_byte_vec_new_empty(vec.as_out_ptr()) };
        } else {
            // SAFETY: `bytes` is valid for `bytes.len()` reads; the engine
            // copies them into fresh storage.
            unsafe { sys::wasm_byte_vec_new(vec.as_out_ptr(), bytes.len(), bytes.as_ptr()) };
        }
        vec
    }

    /// Decode the bytes as UTF-8 text, dropping trailing NUL terminators.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        let bytes = self.as_slice();
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        String::from_utf8_lossy(&bytes[..end])
    }
}

impl ValTypeVec {
    /// Build a value type vector. Each element handle moves into the vector.
    pub fn from_kinds(kinds: &[ValKind]) -> Result<Self, RuntimeError> {
        let mut owned = Vec::with_capacity(kinds.len());
        for kind in kinds {
            // SAFETY: the valtype constructor returns an owned pointer.
            let handle = unsafe {
                ValTypeHandle::from_raw(sys::wasm_valtype_new(kind_to_valtype(*kind)))
            }?;
            owned.push(handle);
        }

        let mut raw = Vec::with_capacity(owned.len());
        for handle in &mut owned {
            raw.push(handle.take()?);
        }

        let mut vec = Self::empty();
        // SAFETY: `raw` holds `raw.len()` owned valtype pointers whose
        // ownership passes to the new vector.
        unsafe { sys::wasm_valtype_vec_new(vec.as_out_ptr(), raw.len(), raw.as_ptr()) };
        Ok(vec)
    }

    /// Read the kinds of the elements.
    pub fn kinds(&self) -> Result<Vec<ValKind>, RuntimeError> {
        // SAFETY: every element is a live valtype owned by this vector.
        unsafe { valtype_kinds(self.as_ptr()) }
    }
}

/// Borrow the elements of a vector owned elsewhere.
///
/// # Safety
///
/// `vec` must point to a live vector that outlives `'a`.
pub(crate) unsafe fn borrowed_slice<'a, T>(vec: *const sys::wasm_vec_t<T>) -> &'a [T] {
    // SAFETY: guaranteed by the caller.
    let vec = unsafe { &*vec };
    if vec.data.is_null() || vec.size == 0 {
        return &[];
    }
    // SAFETY: a non-null `data` points to `size` initialized elements.
    unsafe { slice::from_raw_parts(vec.data, vec.size) }
}

/// Read a borrowed `wasm_name_t` as a string.
///
/// # Safety
///
/// `name` must point to a live name vector.
pub(crate) unsafe fn name_to_string(name: *const sys::wasm_name_t) -> String {
    if name.is_null() {
        return String::new();
    }
    // SAFETY: guaranteed by the caller.
    let bytes = unsafe { borrowed_slice(name) };
    String::from_utf8_lossy(bytes).into_owned()
}

/// Read the kinds of a borrowed valtype vector.
///
/// # Safety
///
/// `vec` must point to a live vector of live valtypes.
pub(crate) unsafe fn valtype_kinds(
    vec: *const sys::wasm_valtype_vec_t,
) -> Result<Vec<ValKind>, RuntimeError> {
    // SAFETY: guaranteed by the caller.
    let elems = unsafe { borrowed_slice(vec) };
    elems
        .iter()
        // SAFETY: each element is a live valtype.
        .map(|ty| crate::val::kind_from_valtype(unsafe { sys::wasm_valtype_kind(*ty) }))
        .collect()
}

/// Host-allocated array of native values bound to one store context.
///
/// Dropping the buffer unroots any references the engine rooted for it.
pub(crate) struct ValBuffer {
    context: *mut sys::wasmtime_context_t,
    vals: Vec<sys::wasmtime_val_t>,
}

impl ValBuffer {
    pub(crate) fn with_capacity(context: *mut sys::wasmtime_context_t, capacity: usize) -> Self {
        Self {
            context,
            vals: Vec::with_capacity(capacity),
        }
    }

    /// `len` zero-initialized `i32` slots, used for results.
    pub(crate) fn zeroed(context: *mut sys::wasmtime_context_t, len: usize) -> Self {
        Self {
            context,
            vals: vec![crate::val::zero_val(); len],
        }
    }

    pub(crate) fn push(&mut self, val: sys::wasmtime_val_t) {
        self.vals.push(val);
    }

    pub(crate) fn len(&self) -> usize {
        self.vals.len()
    }

    pub(crate) fn as_ptr(&self) -> *const sys::wasmtime_val_t {
        self.vals.as_ptr()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut sys::wasmtime_val_t {
        self.vals.as_mut_ptr()
    }

    pub(crate) fn as_slice(&self) -> &[sys::wasmtime_val_t] {
        &self.vals
    }
}

impl Drop for ValBuffer {
    fn drop(&mut self) {
        if self.context.is_null() {
            return;
        }
        for val in &mut self.vals {
            // SAFETY: the values were produced for this context; unrooting a
            // non-reference value is a no-op.
            unsafe { sys::wasmtime_val_unroot(self.context, val) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_vector() {
        let vec = ByteVec::empty();
        assert!(vec.is_empty());
        assert_eq!(vec.len(), 0);
        assert!(vec.get(0).is_none());
        assert!(vec.as_slice().is_empty());
    }

    #[test]
    fn test_byte_vec_copy() {
        let vec = ByteVec::from_bytes(b"\0asm");
        assert_eq!(vec.len(), 4);
        assert_eq!(vec.get(1), Some(&b'a'));
        assert_eq!(vec.get(4), None);
        assert_eq!(vec.to_vec(), b"\0asm".to_vec());
    }

    #[test]
    fn test_byte_vec_from_empty_slice() {
        let vec = ByteVec::from_bytes(&[]);
        assert!(vec.is_empty());
    }

    #[test]
    fn test_to_string_lossy_strips_nul() {
        let vec = ByteVec::from_bytes(b"wasm trap\0");
        assert_eq!(vec.to_string_lossy(), "wasm trap");
    }

    #[test]
    fn test_valtype_vec_kinds() {
        let kinds = [ValKind::I32, ValKind::F64, ValKind::ExternRef];
        let vec = ValTypeVec::from_kinds(&kinds).unwrap();

        assert_eq!(vec.len(), 3);
        assert_eq!(vec.kinds().unwrap(), kinds.to_vec());
    }

    #[test]
    fn test_into_native_detaches() {
        let vec = ByteVec::from_bytes(b"abc");
        let mut raw = vec.into_native();
        assert_eq!(raw.size, 3);
        unsafe { sys::wasm_byte_vec_delete(&raw mut raw) };
    }
}
