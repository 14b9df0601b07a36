//! Guest and host functions.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use tracing::{debug, instrument};

use wasm_embed_common::RuntimeError;
use wasm_embed_sys as sys;

use crate::handle::FuncTypeHandle;
use crate::store::Store;
use crate::trampoline::{Caller, HostFuncState, host_trampoline};
use crate::trap;
use crate::types::FuncType;
use crate::val::{Codec, FuncRef, Val, WasmParams, WasmResults};
use crate::vec::ValBuffer;

/// A function living in a store.
///
/// The signature is captured once, when the function is created or looked
/// up, and every call is checked against it before reaching the engine.
#[derive(Clone)]
pub struct Func<'s> {
    store: &'s Store,
    raw: sys::wasmtime_func_t,
    ty: FuncType,
}

impl<'s> Func<'s> {
    /// Create a host function with an explicit signature.
    ///
    /// The callback receives arguments already checked against `ty.params()`
    /// and must return values matching `ty.results()`. An `Err` or a panic
    /// becomes a trap in the calling WebAssembly code.
    ///
    /// The callback state is owned by `store` and lives until it is dropped.
    pub fn new<F>(store: &'s Store, ty: FuncType, callback: F) -> Result<Self, RuntimeError>
    where
        F: Fn(&mut Caller<'_>, &[Val]) -> anyhow::Result<Vec<Val>> + Send + Sync + 'static,
    {
        let native_ty = ty.to_native()?;
        let state = Box::new(HostFuncState::new(
            ty.clone(),
            Box::new(callback),
            store.host_failure_flag(),
        ));
        let env = ptr::from_ref(state.as_ref()).cast_mut().cast::<c_void>();

        let mut raw = sys::wasmtime_func_t {
            store_id: 0,
            __private: 0,
        };
        // SAFETY: the type is borrowed for the call; `env` stays valid because
        // the boxed state is registered with the store below and never moves.
        unsafe {
            sys::wasmtime_func_new(
                store.context(),
                native_ty.as_ptr()?,
                Some(host_trampoline),
                env,
                None,
                &raw mut raw,
            );
        }

        state.set_store_id(raw.store_id);
        store.register_host_func(state);
        store.note_id(raw.store_id);

        debug!(ty = %ty, "Host function registered");
        Ok(Self { store, raw, ty })
    }

    /// Create a host function from a typed closure.
    ///
    /// The signature is derived from `P` and `R`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let add = Func::wrap(&store, |(a, b): (i32, i32)| a + b)?;
    /// ```
    pub fn wrap<P, R, F>(store: &'s Store, func: F) -> Result<Self, RuntimeError>
    where
        P: WasmParams,
        R: WasmResults,
        F: Fn(P) -> R + Send + Sync + 'static,
    {
        let ty = FuncType::new(P::kinds(), R::kinds());
        Self::new(store, ty, move |_, args| {
            let params = P::from_vals(args)
                .ok_or_else(|| anyhow::anyhow!("arguments do not match the wrapped signature"))?;
            Ok(func(params).into_vals())
        })
    }

    /// Wrap a native function of `store`, reading its signature.
    pub(crate) fn from_raw(store: &'s Store, raw: sys::wasmtime_func_t) -> Result<Self, RuntimeError> {
        // SAFETY: `raw` belongs to `store`; the returned type is owned by us.
        let native_ty = unsafe {
            FuncTypeHandle::from_raw(sys::wasmtime_func_type(store.context(), &raw const raw))
        }?;
        // SAFETY: the handle is live until the end of this function.
        let ty = unsafe { FuncType::from_native(native_ty.as_ptr()?) }?;
        store.note_id(raw.store_id);
        Ok(Self { store, raw, ty })
    }

    /// Turn a function reference back into a callable function.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::StoreMismatch`] if the reference belongs to
    /// another store.
    pub fn from_funcref(store: &'s Store, funcref: FuncRef) -> Result<Self, RuntimeError> {
        if store.id() != Some(funcref.store_id()) {
            return Err(RuntimeError::StoreMismatch);
        }
        Self::from_raw(store, funcref.raw())
    }

    /// The function's signature.
    pub fn ty(&self) -> &FuncType {
        &self.ty
    }

    /// The store this function lives in.
    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// A reference to this function, usable as a `funcref` value.
    pub fn to_funcref(&self) -> FuncRef {
        FuncRef::from_raw(self.raw)
    }

    /// Call the function.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::ArityMismatch`] or [`RuntimeError::TypeMismatch`]
    ///   if `args` do not match the signature (no native call is made)
    /// - [`RuntimeError::Trap`] if execution trapped or a host function failed
    #[instrument(skip(self, args), fields(ty = %self.ty))]
    pub fn call(&self, args: &[Val]) -> Result<Vec<Val>, RuntimeError> {
        let params = self.ty.params();
        if args.len() != params.len() {
            return Err(RuntimeError::ArityMismatch {
                expected: params.len(),
                got: args.len(),
            });
        }
        for (arg, kind) in args.iter().zip(params) {
            if arg.kind() != *kind {
                return Err(RuntimeError::type_mismatch(kind, arg.kind()));
            }
        }

        let context = self.store.context();
        let codec = Codec::new(self.store);

        let mut native_args = ValBuffer::with_capacity(context, args.len());
        for arg in args {
            native_args.push(codec.encode(arg)?);
        }
        let mut results = ValBuffer::zeroed(context, self.ty.results().len());

        let mut trap_out = ptr::null_mut();
        // SAFETY: both buffers are valid for their lengths and the function
        // belongs to this store.
        let err = unsafe {
            sys::wasmtime_func_call(
                context,
                &raw const self.raw,
                native_args.as_ptr(),
                native_args.len(),
                results.as_mut_ptr(),
                results.len(),
                &raw mut trap_out,
            )
        };
        // Every failure of a call is a trap; the flag only matters to
        // instantiation.
        self.store.take_host_failure();
        // SAFETY: both out-values are owned by us.
        unsafe { trap::check_call(err, trap_out, RuntimeError::trap) }?;

        results
            .as_slice()
            .iter()
            .zip(self.ty.results())
            .map(|(raw, kind)| codec.decode(raw, *kind))
            .collect()
    }

    /// A statically typed view of this function.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::TypeMismatch`] if `P` and `R` do not match
    /// the function's signature.
    pub fn typed<P, R>(&self) -> Result<TypedFunc<'s, P, R>, RuntimeError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let expected = FuncType::new(P::kinds(), R::kinds());
        if expected != self.ty {
            return Err(RuntimeError::type_mismatch(&expected, &self.ty));
        }
        Ok(TypedFunc {
            func: self.clone(),
            _marker: PhantomData,
        })
    }

    pub(crate) fn raw(&self) -> sys::wasmtime_func_t {
        self.raw
    }
}

impl fmt::Debug for Func<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func")
            .field("ty", &self.ty)
            .field("store_id", &self.raw.store_id)
            .finish()
    }
}

/// A function whose signature was checked against `P -> R` once.
pub struct TypedFunc<'s, P, R> {
    func: Func<'s>,
    _marker: PhantomData<fn(P) -> R>,
}

impl<'s, P, R> TypedFunc<'s, P, R>
where
    P: WasmParams,
    R: WasmResults,
{
    /// Call the function.
    pub fn call(&self, params: P) -> Result<R, RuntimeError> {
        let results = self.func.call(&params.into_vals())?;
        R::from_vals(&results).ok_or_else(|| {
            RuntimeError::type_mismatch(
                FuncType::new([], R::kinds()),
                FuncType::new([], results.iter().map(Val::kind)),
            )
        })
    }

    /// The untyped function.
    pub fn func(&self) -> &Func<'s> {
        &self.func
    }
}

impl<P, R> Clone for TypedFunc<'_, P, R> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
            _marker: PhantomData,
        }
    }
}

impl<P, R> fmt::Debug for TypedFunc<'_, P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedFunc").field("func", &self.func).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use wasm_embed_common::ValKind;

    #[test]
    fn test_host_func_call() {
        let engine = Engine::new().unwrap();
        let store = Store::new(&engine).unwrap();

        let ty = FuncType::new([ValKind::I32, ValKind::I32], [ValKind::I32]);
        let add = Func::new(&store, ty, |_, args| {
            let a = args[0].i32().unwrap_or_default();
            let b = args[1].i32().unwrap_or_default();
            Ok(vec![Val::I32(a + b)])
        })
        .unwrap();

        assert_eq!(add.call(&[Val::I32(5), Val::I32(3)]).unwrap(), vec![Val::I32(8)]);
        assert_eq!(store.host_func_count(), 1);
    }

    #[test]
    fn test_arity_checked_before_call() {
        let engine = Engine::new().unwrap();
        let store = Store::new(&engine).unwrap();
        let f = Func::wrap(&store, |(a, b): (i32, i32)| a * b).unwrap();

        assert!(matches!(
            f.call(&[Val::I32(1)]),
            Err(RuntimeError::ArityMismatch { expected: 2, got: 1 })
        ));
        assert!(matches!(
            f.call(&[Val::I32(1), Val::I64(2)]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_host_error_becomes_trap() {
        let engine = Engine::new().unwrap();
        let store = Store::new(&engine).unwrap();
        let f = Func::new(&store, FuncType::new([], []), |_, _| {
            Err(anyhow::anyhow!("denied by host"))
        })
        .unwrap();

        let err = f.call(&[]).unwrap_err();
        assert!(err.is_trap());
        assert!(err.to_string().contains("denied by host"));
    }

    #[test]
    fn test_wrong_result_kind_traps() {
        let engine = Engine::new().unwrap();
        let store = Store::new(&engine).unwrap();
        let f = Func::new(&store, FuncType::new([], [ValKind::I64]), |_, _| {
            Ok(vec![Val::I32(1)])
        })
        .unwrap();

        let err = f.call(&[]).unwrap_err();
        assert!(err.is_trap());
        assert!(err.to_string().contains("result 0"));
    }

    #[test]
    fn test_panic_becomes_trap() {
        let engine = Engine::new().unwrap();
        let store = Store::new(&engine).unwrap();
        let f = Func::new(&store, FuncType::new([], []), |_, _| panic!("host exploded")).unwrap();

        let err = f.call(&[]).unwrap_err();
        assert!(err.is_trap());
        assert!(err.to_string().contains("host exploded"));
    }

    #[test]
    fn test_typed_func() {
        let engine = Engine::new().unwrap();
        let store = Store::new(&engine).unwrap();
        let f = Func::wrap(&store, |x: i64| x * 2).unwrap();

        let typed = f.typed::<i64, i64>().unwrap();
        assert_eq!(typed.call(21).unwrap(), 42);
        assert!(matches!(
            f.typed::<i32, i64>(),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_funcref_round_trip() {
        let engine = Engine::new().unwrap();
        let store = Store::new(&engine).unwrap();
        let other = Store::new(&engine).unwrap();
        let f = Func::wrap(&store, |(): ()| 7_i32).unwrap();
        let _ = Func::wrap(&other, |(): ()| 0_i32).unwrap();

        let funcref = f.to_funcref();
        let back = Func::from_funcref(&store, funcref).unwrap();
        assert_eq!(back.ty(), f.ty());
        assert_eq!(back.call(&[]).unwrap(), vec![Val::I32(7)]);

        assert!(matches!(
            Func::from_funcref(&other, funcref),
            Err(RuntimeError::StoreMismatch)
        ));
    }
}
