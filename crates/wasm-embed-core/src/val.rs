//! WebAssembly values and their native encoding.
//!
//! [`Val`] is the host-side sum of every value kind. [`Codec`] converts
//! between `Val` and the tagged-union `wasmtime_val_t`:
//!
//! - encoding writes the tag and the matching union field and leaves every
//!   other union byte zero
//! - decoding checks the native tag against the kind declared for that
//!   position before reading the union
//!
//! Floats travel as raw bits, so NaN payloads survive a round trip.
//! Reference values need a store context; [`Codec::detached`] handles
//! scalars and null references only.

use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use wasm_embed_common::{RuntimeError, ValKind};
use wasm_embed_sys as sys;

use crate::store::Store;

/// A 128-bit SIMD value, stored little-endian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct V128([u8; 16]);

impl V128 {
    /// Wrap raw little-endian bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// The raw little-endian bytes.
    pub const fn bytes(&self) -> [u8; 16] {
        self.0
    }

    /// The value as an unsigned 128-bit integer.
    pub const fn as_u128(&self) -> u128 {
        u128::from_le_bytes(self.0)
    }
}

impl From<u128> for V128 {
    fn from(value: u128) -> Self {
        Self(value.to_le_bytes())
    }
}

/// A non-null function reference scoped to the store that created it.
///
/// Turn it back into a callable with [`Func::from_funcref`](crate::Func::from_funcref).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncRef {
    raw: sys::wasmtime_func_t,
}

impl FuncRef {
    pub(crate) fn from_raw(raw: sys::wasmtime_func_t) -> Self {
        Self { raw }
    }

    pub(crate) fn raw(&self) -> sys::wasmtime_func_t {
        self.raw
    }

    /// Identifier of the owning store.
    pub fn store_id(&self) -> u64 {
        self.raw.store_id
    }
}

/// A non-null host reference carrying an arbitrary payload.
///
/// Two `ExternRef`s are equal when they share the same payload allocation.
#[derive(Clone)]
pub struct ExternRef {
    data: Arc<dyn Any + Send + Sync>,
}

impl ExternRef {
    /// Wrap a host value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            data: Arc::new(value),
        }
    }

    /// Wrap an already shared payload.
    pub fn from_arc(data: Arc<dyn Any + Send + Sync>) -> Self {
        Self { data }
    }

    /// The payload.
    pub fn data(&self) -> &(dyn Any + Send + Sync) {
        &*self.data
    }

    /// The payload, if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Returns `true` if both references point at the same payload.
    pub fn ptr_eq(&self, other: &ExternRef) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for ExternRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternRef")
            .field("data", &Arc::as_ptr(&self.data))
            .finish()
    }
}

/// A WebAssembly value.
#[derive(Debug, Clone)]
pub enum Val {
    /// 32-bit integer.
    I32(i32),
    /// 64-bit integer.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// 128-bit vector.
    V128(V128),
    /// Nullable function reference.
    FuncRef(Option<FuncRef>),
    /// Nullable host reference.
    ExternRef(Option<ExternRef>),
}

impl Val {
    /// The kind of this value.
    pub fn kind(&self) -> ValKind {
        match self {
            Val::I32(_) => ValKind::I32,
            Val::I64(_) => ValKind::I64,
            Val::F32(_) => ValKind::F32,
            Val::F64(_) => ValKind::F64,
            Val::V128(_) => ValKind::V128,
            Val::FuncRef(_) => ValKind::FuncRef,
            Val::ExternRef(_) => ValKind::ExternRef,
        }
    }

    /// The zero (or null) value of `kind`.
    pub fn default_for(kind: ValKind) -> Self {
        match kind {
            ValKind::I32 => Val::I32(0),
            ValKind::I64 => Val::I64(0),
            ValKind::F32 => Val::F32(0.0),
            ValKind::F64 => Val::F64(0.0),
            ValKind::V128 => Val::V128(V128::default()),
            ValKind::FuncRef => Val::FuncRef(None),
            ValKind::ExternRef => Val::ExternRef(None),
        }
    }

    /// The value as `i32`, if it is one.
    pub fn i32(&self) -> Option<i32> {
        match self {
            Val::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `i64`, if it is one.
    pub fn i64(&self) -> Option<i64> {
        match self {
            Val::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `f32`, if it is one.
    pub fn f32(&self) -> Option<f32> {
        match self {
            Val::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `f64`, if it is one.
    pub fn f64(&self) -> Option<f64> {
        match self {
            Val::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `v128`, if it is one.
    pub fn v128(&self) -> Option<V128> {
        match self {
            Val::V128(v) => Some(*v),
            _ => None,
        }
    }

    /// The host reference, if this is a non-null externref.
    pub fn externref(&self) -> Option<&ExternRef> {
        match self {
            Val::ExternRef(Some(r)) => Some(r),
            _ => None,
        }
    }

    /// The function reference, if this is a non-null funcref.
    pub fn funcref(&self) -> Option<FuncRef> {
        match self {
            Val::FuncRef(r) => *r,
            _ => None,
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::I32(a), Val::I32(b)) => a == b,
            (Val::I64(a), Val::I64(b)) => a == b,
            (Val::F32(a), Val::F32(b)) => a.to_bits() == b.to_bits(),
            (Val::F64(a), Val::F64(b)) => a.to_bits() == b.to_bits(),
            (Val::V128(a), Val::V128(b)) => a == b,
            (Val::FuncRef(a), Val::FuncRef(b)) => a == b,
            (Val::ExternRef(None), Val::ExternRef(None)) => true,
            (Val::ExternRef(Some(a)), Val::ExternRef(Some(b))) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<i32> for Val {
    fn from(v: i32) -> Self {
        Val::I32(v)
    }
}

impl From<i64> for Val {
    fn from(v: i64) -> Self {
        Val::I64(v)
    }
}

impl From<f32> for Val {
    fn from(v: f32) -> Self {
        Val::F32(v)
    }
}

impl From<f64> for Val {
    fn from(v: f64) -> Self {
        Val::F64(v)
    }
}

impl From<V128> for Val {
    fn from(v: V128) -> Self {
        Val::V128(v)
    }
}

impl From<ExternRef> for Val {
    fn from(r: ExternRef) -> Self {
        Val::ExternRef(Some(r))
    }
}

impl From<FuncRef> for Val {
    fn from(r: FuncRef) -> Self {
        Val::FuncRef(Some(r))
    }
}

/// Converts values to and from their native representation.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    context: *mut sys::wasmtime_context_t,
    store_id: Option<u64>,
}

impl Codec {
    /// A codec for values living in `store`.
    pub fn new(store: &Store) -> Self {
        Self::from_context(store.context(), store.id())
    }

    /// A codec without a store; references other than null are rejected.
    pub fn detached() -> Self {
        Self {
            context: std::ptr::null_mut(),
            store_id: None,
        }
    }

    pub(crate) fn from_context(context: *mut sys::wasmtime_context_t, store_id: Option<u64>) -> Self {
        Self { context, store_id }
    }

    fn require_context(&self) -> Result<*mut sys::wasmtime_context_t, RuntimeError> {
        if self.context.is_null() {
            return Err(RuntimeError::engine(
                "reference values require a store context",
            ));
        }
        Ok(self.context)
    }

    /// Encode `val` into a native value.
    ///
    /// An encoded non-null externref is rooted in the store; release it with
    /// `wasmtime_val_unroot` once the engine no longer needs it.
    #[allow(clippy::cast_possible_wrap)]
    pub fn encode(&self, val: &Val) -> Result<sys::wasmtime_val_t, RuntimeError> {
        let mut raw = zero_val();
        raw.kind = kind_to_native(val.kind());
        match val {
            Val::I32(v) => raw.of.i32 = *v,
            Val::I64(v) => raw.of.i64 = *v,
            Val::F32(v) => raw.of.i32 = v.to_bits() as i32,
            Val::F64(v) => raw.of.i64 = v.to_bits() as i64,
            Val::V128(v) => raw.of.v128 = v.bytes(),
            Val::FuncRef(None) => raw.of.funcref = null_func(),
            Val::FuncRef(Some(func)) => {
                self.require_context()?;
                if self.store_id != Some(func.store_id()) {
                    return Err(RuntimeError::StoreMismatch);
                }
                raw.of.funcref = func.raw();
            }
            Val::ExternRef(None) => raw.of.externref = null_externref(),
            Val::ExternRef(Some(r)) => {
                let context = self.require_context()?;
                let data = Box::into_raw(Box::new(Arc::clone(&r.data))).cast::<c_void>();
                let mut out = null_externref();
                // SAFETY: `data` is a leaked box reclaimed by the finalizer,
                // which the engine also runs if allocation fails.
                let ok = unsafe {
                    sys::wasmtime_externref_new(
                        context,
                        data,
                        Some(drop_externref_data),
                        &raw mut out,
                    )
                };
                if !ok {
                    return Err(RuntimeError::engine("failed to allocate externref"));
                }
                raw.of.externref = out;
            }
        }
        Ok(raw)
    }

    /// Decode a native value expected to be of kind `expected`.
    #[allow(clippy::cast_sign_loss)]
    pub fn decode(
        &self,
        raw: &sys::wasmtime_val_t,
        expected: ValKind,
    ) -> Result<Val, RuntimeError> {
        let found = kind_from_native(raw.kind)?;
        if found != expected {
            return Err(RuntimeError::type_mismatch(expected, found));
        }

        // SAFETY: the tag was checked, so the matching union field is the
        // one the engine initialized.
        let val = unsafe {
            match found {
                ValKind::I32 => Val::I32(raw.of.i32),
                ValKind::I64 => Val::I64(raw.of.i64),
                ValKind::F32 => Val::F32(f32::from_bits(raw.of.i32 as u32)),
                ValKind::F64 => Val::F64(f64::from_bits(raw.of.i64 as u64)),
                ValKind::V128 => Val::V128(V128::from_bytes(raw.of.v128)),
                ValKind::FuncRef => {
                    let func = raw.of.funcref;
                    if func.store_id == 0 {
                        Val::FuncRef(None)
                    } else {
                        Val::FuncRef(Some(FuncRef::from_raw(func)))
                    }
                }
                ValKind::ExternRef => {
                    let r = raw.of.externref;
                    if r.store_id == 0 {
                        Val::ExternRef(None)
                    } else {
                        Val::ExternRef(Some(self.externref_payload(&r)?))
                    }
                }
            }
        };
        Ok(val)
    }

    fn externref_payload(
        &self,
        r: &sys::wasmtime_externref_t,
    ) -> Result<ExternRef, RuntimeError> {
        let context = self.require_context()?;
        // SAFETY: `r` is a live, rooted reference in this context.
        let data = unsafe { sys::wasmtime_externref_data(context, r) };
        if data.is_null() {
            return Err(RuntimeError::engine("externref has no host payload"));
        }
        // SAFETY: every externref created here carries a boxed payload Arc.
        let payload = unsafe { &*data.cast::<Arc<dyn Any + Send + Sync>>() };
        Ok(ExternRef::from_arc(Arc::clone(payload)))
    }
}

unsafe extern "C" fn drop_externref_data(data: *mut c_void) {
    // SAFETY: `data` is the box leaked by `Codec::encode`, freed once here.
    drop(unsafe { Box::from_raw(data.cast::<Arc<dyn Any + Send + Sync>>()) });
}

/// An `i32` zero with every union byte cleared.
pub(crate) fn zero_val() -> sys::wasmtime_val_t {
    sys::wasmtime_val_t {
        kind: sys::WASMTIME_I32,
        of: sys::wasmtime_valunion_t { v128: [0; 16] },
    }
}

fn null_func() -> sys::wasmtime_func_t {
    sys::wasmtime_func_t {
        store_id: 0,
        __private: 0,
    }
}

fn null_externref() -> sys::wasmtime_externref_t {
    sys::wasmtime_externref_t {
        store_id: 0,
        __private1: 0,
        __private2: 0,
    }
}

/// Map a kind to its `wasmtime_valkind_t` tag.
pub(crate) fn kind_to_native(kind: ValKind) -> sys::wasmtime_valkind_t {
    match kind {
        ValKind::I32 => sys::WASMTIME_I32,
        ValKind::I64 => sys::WASMTIME_I64,
        ValKind::F32 => sys::WASMTIME_F32,
        ValKind::F64 => sys::WASMTIME_F64,
        ValKind::V128 => sys::WASMTIME_V128,
        ValKind::FuncRef => sys::WASMTIME_FUNCREF,
        ValKind::ExternRef => sys::WASMTIME_EXTERNREF,
    }
}

/// Map a `wasmtime_valkind_t` tag to a kind.
pub(crate) fn kind_from_native(tag: sys::wasmtime_valkind_t) -> Result<ValKind, RuntimeError> {
    let kind = match tag {
        sys::WASMTIME_I32 => ValKind::I32,
        sys::WASMTIME_I64 => ValKind::I64,
        sys::WASMTIME_F32 => ValKind::F32,
        sys::WASMTIME_F64 => ValKind::F64,
        sys::WASMTIME_V128 => ValKind::V128,
        sys::WASMTIME_FUNCREF => ValKind::FuncRef,
        sys::WASMTIME_EXTERNREF => ValKind::ExternRef,
        other => {
            return Err(RuntimeError::type_mismatch(
                "a known value kind",
                format!("native tag {other}"),
            ));
        }
    };
    Ok(kind)
}

/// Map a kind to its `wasm_valkind_t` (type descriptor) tag.
pub(crate) fn kind_to_valtype(kind: ValKind) -> sys::wasm_valkind_t {
    match kind {
        ValKind::I32 => sys::WASM_I32,
        ValKind::I64 => sys::WASM_I64,
        ValKind::F32 => sys::WASM_F32,
        ValKind::F64 => sys::WASM_F64,
        ValKind::V128 => sys::WASM_V128,
        ValKind::FuncRef => sys::WASM_FUNCREF,
        ValKind::ExternRef => sys::WASM_EXTERNREF,
    }
}

/// Map a `wasm_valkind_t` tag to a kind.
pub(crate) fn kind_from_valtype(tag: sys::wasm_valkind_t) -> Result<ValKind, RuntimeError> {
    let kind = match tag {
        sys::WASM_I32 => ValKind::I32,
        sys::WASM_I64 => ValKind::I64,
        sys::WASM_F32 => ValKind::F32,
        sys::WASM_F64 => ValKind::F64,
        sys::WASM_V128 => ValKind::V128,
        sys::WASM_FUNCREF => ValKind::FuncRef,
        sys::WASM_EXTERNREF => ValKind::ExternRef,
        other => {
            return Err(RuntimeError::type_mismatch(
                "a known value type",
                format!("native valtype {other}"),
            ));
        }
    };
    Ok(kind)
}

// ============================================================================
// Typed values
// ============================================================================

/// A Rust type with a fixed WebAssembly value kind.
pub trait WasmTy: Sized + Send + 'static {
    /// The kind this type maps to.
    const KIND: ValKind;

    /// Convert into a [`Val`].
    fn into_val(self) -> Val;

    /// Convert from a [`Val`] of kind [`Self::KIND`].
    fn from_val(val: &Val) -> Option<Self>;
}

macro_rules! wasm_ty {
    ($($ty:ty => $kind:ident, $variant:ident, $into:expr, $from:expr;)*) => {
        $(
            #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
            impl WasmTy for $ty {
                const KIND: ValKind = ValKind::$kind;

                fn into_val(self) -> Val {
                    let into: fn($ty) -> _ = $into;
                    Val::$variant(into(self))
                }

                fn from_val(val: &Val) -> Option<Self> {
                    let from: fn(_) -> $ty = $from;
                    match val {
                        Val::$variant(v) => Some(from(*v)),
                        _ => None,
                    }
                }
            }
        )*
    };
}

wasm_ty! {
    i32 => I32, I32, |v| v, |v| v;
    i64 => I64, I64, |v| v, |v| v;
    u32 => I32, I32, |v| v as i32, |v| v as u32;
    u64 => I64, I64, |v| v as i64, |v| v as u64;
    f32 => F32, F32, |v| v, |v| v;
    f64 => F64, F64, |v| v, |v| v;
    V128 => V128, V128, |v| v, |v| v;
}

/// A list of values passed as function parameters.
pub trait WasmParams: Sized {
    /// Kinds of the list, in order.
    fn kinds() -> Vec<ValKind>;

    /// Convert into values.
    fn into_vals(self) -> Vec<Val>;

    /// Convert from values; `None` on a count or kind mismatch.
    fn from_vals(vals: &[Val]) -> Option<Self>;
}

/// A list of values returned as function results.
pub trait WasmResults: Sized {
    /// Kinds of the list, in order.
    fn kinds() -> Vec<ValKind>;

    /// Convert into values.
    fn into_vals(self) -> Vec<Val>;

    /// Convert from values; `None` on a count or kind mismatch.
    fn from_vals(vals: &[Val]) -> Option<Self>;
}

macro_rules! single_ty_list {
    ($($trait:ident),*) => {
        $(
            impl<T: WasmTy> $trait for T {
                fn kinds() -> Vec<ValKind> {
                    vec![T::KIND]
                }

                fn into_vals(self) -> Vec<Val> {
                    vec![self.into_val()]
                }

                fn from_vals(vals: &[Val]) -> Option<Self> {
                    match vals {
                        [v] => T::from_val(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

single_ty_list!(WasmParams, WasmResults);

macro_rules! tuple_ty_list {
    ($trait:ident; $($t:ident),*) => {
        #[allow(non_snake_case, unused_variables, unused_mut)]
        impl<$($t: WasmTy),*> $trait for ($($t,)*) {
            fn kinds() -> Vec<ValKind> {
                vec![$($t::KIND),*]
            }

            fn into_vals(self) -> Vec<Val> {
                let ($($t,)*) = self;
                vec![$($t.into_val()),*]
            }

            fn from_vals(vals: &[Val]) -> Option<Self> {
                let mut iter = vals.iter();
                let list = ($($t::from_val(iter.next()?)?,)*);
                if iter.next().is_some() {
                    return None;
                }
                Some(list)
            }
        }
    };
}

tuple_ty_list!(WasmParams;);
tuple_ty_list!(WasmParams; A1);
tuple_ty_list!(WasmParams; A1, A2);
tuple_ty_list!(WasmParams; A1, A2, A3);
tuple_ty_list!(WasmParams; A1, A2, A3, A4);
tuple_ty_list!(WasmParams; A1, A2, A3, A4, A5);
tuple_ty_list!(WasmParams; A1, A2, A3, A4, A5, A6);
tuple_ty_list!(WasmResults;);
tuple_ty_list!(WasmResults; A1);
tuple_ty_list!(WasmResults; A1, A2);
tuple_ty_list!(WasmResults; A1, A2, A3);

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(val: &Val) -> Val {
        let codec = Codec::detached();
        let raw = codec.encode(val).unwrap();
        codec.decode(&raw, val.kind()).unwrap()
    }

    #[test]
    fn test_scalar_round_trip() {
        for val in [
            Val::I32(-7),
            Val::I64(i64::MIN),
            Val::F32(1.5),
            Val::F64(-0.0),
            Val::V128(V128::from(0x0102_0304_0506_0708_090a_0b0c_0d0e_0f10)),
        ] {
            assert_eq!(round_trip(&val), val);
        }
    }

    #[test]
    fn test_nan_payload_preserved() {
        let quiet = f32::from_bits(0x7fc0_1234);
        let signalling = f64::from_bits(0x7ff0_0000_0000_0001);

        let Val::F32(back) = round_trip(&Val::F32(quiet)) else {
            panic!("expected f32");
        };
        assert_eq!(back.to_bits(), 0x7fc0_1234);

        let Val::F64(back) = round_trip(&Val::F64(signalling)) else {
            panic!("expected f64");
        };
        assert_eq!(back.to_bits(), 0x7ff0_0000_0000_0001);
    }

    #[test]
    fn test_null_references_detached() {
        assert_eq!(round_trip(&Val::FuncRef(None)), Val::FuncRef(None));
        assert_eq!(round_trip(&Val::ExternRef(None)), Val::ExternRef(None));
    }

    #[test]
    fn test_detached_rejects_externref() {
        let val = Val::from(ExternRef::new(42u32));
        assert!(Codec::detached().encode(&val).is_err());
    }

    #[test]
    fn test_encode_clears_union_bytes() {
        let raw = Codec::detached().encode(&Val::I32(-1)).unwrap();
        let bytes = unsafe { raw.of.v128 };
        assert_eq!(&bytes[..4], &[0xff; 4]);
        assert_eq!(&bytes[4..], &[0; 12]);
    }

    #[test]
    fn test_decode_kind_mismatch() {
        let codec = Codec::detached();
        let raw = codec.encode(&Val::I32(1)).unwrap();

        let err = codec.decode(&raw, ValKind::I64).unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
        assert_eq!(err.to_string(), "Type mismatch: expected i64, found i32");
    }

    #[test]
    fn test_decode_unknown_tag() {
        let mut raw = zero_val();
        raw.kind = 42;
        let err = Codec::detached().decode(&raw, ValKind::I32).unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_kind_tag_maps() {
        for kind in [
            ValKind::I32,
            ValKind::I64,
            ValKind::F32,
            ValKind::F64,
            ValKind::V128,
            ValKind::FuncRef,
            ValKind::ExternRef,
        ] {
            assert_eq!(kind_from_native(kind_to_native(kind)).unwrap(), kind);
            assert_eq!(kind_from_valtype(kind_to_valtype(kind)).unwrap(), kind);
        }
        assert!(kind_from_valtype(7).is_err());
    }

    #[test]
    fn test_externref_identity() {
        let a = ExternRef::new(String::from("payload"));
        let b = a.clone();
        let c = ExternRef::new(String::from("payload"));

        assert_eq!(Val::from(a.clone()), Val::from(b));
        assert_ne!(Val::from(a.clone()), Val::from(c));
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("payload"));
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Val::F64(f64::NAN), Val::F64(f64::NAN));
        assert_ne!(Val::F32(0.0), Val::F32(-0.0));
    }

    #[test]
    fn test_typed_lists() {
        assert_eq!(
            <(i32, f64) as WasmParams>::kinds(),
            vec![ValKind::I32, ValKind::F64]
        );
        assert_eq!(<() as WasmResults>::kinds(), Vec::<ValKind>::new());

        let vals = WasmParams::into_vals((7u32, -1i64));
        assert_eq!(vals, vec![Val::I32(7), Val::I64(-1)]);

        let back = <(u32, i64) as WasmParams>::from_vals(&vals);
        assert_eq!(back, Some((7, -1)));
        assert_eq!(<(i32,) as WasmParams>::from_vals(&vals), None);
        assert_eq!(<i32 as WasmResults>::from_vals(&[Val::I32(3)]), Some(3));
    }
}
