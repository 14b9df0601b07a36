//! The native entry point for host functions.
//!
//! Every host function registered with the engine shares one
//! `extern "C"` callback, [`host_trampoline`]. The per-function state (the
//! captured signature and the Rust closure) travels through the `env`
//! pointer. The trampoline never unwinds into native code: argument
//! problems, callback errors and panics all come back as traps.

use std::cell::Cell;
use std::ffi::{c_char, c_void};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::ptr;
use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, warn};

use wasm_embed_common::{HostFunctionError, RuntimeError};
use wasm_embed_sys as sys;

use crate::trap::Trap;
use crate::types::FuncType;
use crate::val::{Codec, Val};

/// Boxed host closure invoked by the trampoline.
pub(crate) type HostCallback =
    Box<dyn Fn(&mut Caller<'_>, &[Val]) -> anyhow::Result<Vec<Val>> + Send + Sync>;

/// Everything the trampoline needs to run one host function.
///
/// Owned by the store that registered it; the engine only borrows it.
pub(crate) struct HostFuncState {
    ty: FuncType,
    callback: HostCallback,
    store_id: Cell<u64>,
    failed: Arc<AtomicBool>,
}

impl HostFuncState {
    /// `failed` is the owning store's flag, raised whenever this function
    /// hands a trap back to the engine.
    pub(crate) fn new(ty: FuncType, callback: HostCallback, failed: Arc<AtomicBool>) -> Self {
        Self {
            ty,
            callback,
            store_id: Cell::new(0),
            failed,
        }
    }

    pub(crate) fn set_store_id(&self, id: u64) {
        self.store_id.set(id);
    }

    fn store_id(&self) -> Option<u64> {
        match self.store_id.get() {
            0 => None,
            id => Some(id),
        }
    }

    /// Decode arguments, run the closure and encode its results.
    fn invoke(
        &self,
        caller: *mut sys::wasmtime_caller_t,
        args: &[sys::wasmtime_val_t],
        results: &mut [sys::wasmtime_val_t],
    ) -> Result<(), RuntimeError> {
        let params = self.ty.params();
        if args.len() != params.len() {
            return Err(HostFunctionError::ArgumentArity {
                expected: params.len(),
                got: args.len(),
            }
            .into());
        }

        // SAFETY: `caller` is live for the duration of the callback.
        let context = unsafe { sys::wasmtime_caller_context(caller) };
        let codec = Codec::from_context(context, self.store_id());

        let decoded = args
            .iter()
            .zip(params)
            .enumerate()
            .map(|(index, (raw, kind))| {
                codec
                    .decode(raw, *kind)
                    .map_err(|e| HostFunctionError::Argument {
                        index,
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut host_caller = Caller {
            raw: caller,
            context,
            _marker: PhantomData,
        };
        let values = (self.callback)(&mut host_caller, &decoded).map_err(|e| {
            HostFunctionError::Failed {
                message: format!("{e:#}"),
            }
        })?;

        let declared = self.ty.results();
        if values.len() != declared.len() || results.len() != declared.len() {
            return Err(HostFunctionError::ResultArity {
                expected: declared.len(),
                got: values.len(),
            }
            .into());
        }

        for (index, (val, kind)) in values.iter().zip(declared).enumerate() {
            if val.kind() != *kind {
                return Err(HostFunctionError::ResultType {
                    index,
                    expected: *kind,
                    found: val.kind(),
                }
                .into());
            }
        }

        for (slot, val) in results.iter_mut().zip(&values) {
            *slot = codec.encode(val)?;
        }
        Ok(())
    }
}

/// The single native callback shared by all host functions.
///
/// # Safety
///
/// Called by the engine only. `env` is the `HostFuncState` registered with
/// the function; `args` and `results` are valid for their lengths.
pub(crate) unsafe extern "C" fn host_trampoline(
    env: *mut c_void,
    caller: *mut sys::wasmtime_caller_t,
    args: *const sys::wasmtime_val_t,
    nargs: usize,
    results: *mut sys::wasmtime_val_t,
    nresults: usize,
) -> *mut sys::wasm_trap_t {
    // SAFETY: the state is kept alive by the owning store.
    let state = unsafe { &*env.cast::<HostFuncState>() };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: the engine passes arrays valid for the given lengths.
        let args = unsafe { native_slice(args, nargs) };
        // SAFETY: as above; the result slots are exclusively ours.
        let results = unsafe { native_slice_mut(results, nresults) };
        state.invoke(caller, args, results)
    }));

    let message = match outcome {
        Ok(Ok(())) => return ptr::null_mut(),
        Ok(Err(err)) => err.to_string(),
        Err(payload) => HostFunctionError::Panicked {
            message: panic_message(payload.as_ref()),
        }
        .to_string(),
    };

    warn!(error = %message, "Host function failed, raising trap");
    state.failed.store(true, Ordering::Relaxed);
    match Trap::new(&message).and_then(Trap::into_raw) {
        Ok(trap) => trap,
        // A null return would report success with unwritten results.
        Err(err) => {
            error!(error = %err, "Cannot allocate trap for failed host function");
            process::abort()
        }
    }
}

unsafe fn native_slice<'a>(ptr: *const sys::wasmtime_val_t, len: usize) -> &'a [sys::wasmtime_val_t] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        // SAFETY: guaranteed by the caller.
        unsafe { slice::from_raw_parts(ptr, len) }
    }
}

unsafe fn native_slice_mut<'a>(
    ptr: *mut sys::wasmtime_val_t,
    len: usize,
) -> &'a mut [sys::wasmtime_val_t] {
    if ptr.is_null() || len == 0 {
        &mut []
    } else {
        // SAFETY: guaranteed by the caller.
        unsafe { slice::from_raw_parts_mut(ptr, len) }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The calling context of a host function.
///
/// Valid only for the duration of one callback.
pub struct Caller<'a> {
    raw: *mut sys::wasmtime_caller_t,
    context: *mut sys::wasmtime_context_t,
    _marker: PhantomData<&'a mut ()>,
}

impl Caller<'_> {
    /// Contents of the calling instance's exported memory `name`.
    pub fn memory_data(&self, name: &str) -> Option<&[u8]> {
        let (data, len) = self.memory(name)?;
        // SAFETY: memory stays mapped while the callback runs and cannot
        // grow while this borrow of `self` is alive.
        Some(unsafe { slice::from_raw_parts(data, len) })
    }

    /// Mutable contents of the calling instance's exported memory `name`.
    pub fn memory_data_mut(&mut self, name: &str) -> Option<&mut [u8]> {
        let (data, len) = self.memory(name)?;
        // SAFETY: as in `memory_data`; `&mut self` makes the borrow unique.
        Some(unsafe { slice::from_raw_parts_mut(data, len) })
    }

    /// Fuel left in the calling store, when the engine meters fuel.
    pub fn fuel_remaining(&self) -> Option<u64> {
        let mut fuel = 0;
        // SAFETY: the context is live for the duration of the callback.
        let err = unsafe { sys::wasmtime_context_get_fuel(self.context, &raw mut fuel) };
        // SAFETY: the error, if any, is owned by us.
        unsafe { crate::trap::check(err, RuntimeError::engine) }
            .ok()
            .map(|()| fuel)
    }

    fn memory(&self, name: &str) -> Option<(*mut u8, usize)> {
        let mut item = crate::externals::empty_extern();
        // SAFETY: the caller is live; `name` is valid for its length.
        let found = unsafe {
            sys::wasmtime_caller_export_get(
                self.raw,
                name.as_ptr().cast::<c_char>(),
                name.len(),
                &raw mut item,
            )
        };
        if !found || item.kind != sys::WASMTIME_EXTERN_MEMORY {
            return None;
        }
        // SAFETY: the tag says the union holds a memory.
        let memory = unsafe { item.of.memory };
        // SAFETY: the memory belongs to the caller's store.
        let (data, len) = unsafe {
            (
                sys::wasmtime_memory_data(self.context, &memory),
                sys::wasmtime_memory_data_size(self.context, &memory),
            )
        };
        if data.is_null() && len > 0 {
            return None;
        }
        Some((if len == 0 { ptr::NonNull::dangling().as_ptr() } else { data }, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_native_slices_accept_null() {
        assert!(unsafe { native_slice(ptr::null(), 3) }.is_empty());
        assert!(unsafe { native_slice_mut(ptr::null_mut(), 0) }.is_empty());
    }

    #[test]
    fn test_state_store_id() {
        let state = HostFuncState::new(
            FuncType::new([], []),
            Box::new(|_, _| Ok(Vec::new())),
            Arc::default(),
        );
        assert_eq!(state.store_id(), None);
        state.set_store_id(7);
        assert_eq!(state.store_id(), Some(7));
    }

    #[test]
    fn test_extra_argument_returns_trap_and_raises_flag() {
        let failed = Arc::new(AtomicBool::new(false));
        let state = HostFuncState::new(
            FuncType::new([], []),
            Box::new(|_, _| Ok(Vec::new())),
            Arc::clone(&failed),
        );
        let env = ptr::from_ref(&state).cast_mut().cast::<c_void>();
        // SAFETY: an all-zero value is a valid `i32` 0.
        let extra: sys::wasmtime_val_t = unsafe { std::mem::zeroed() };

        // The arity check runs before the caller is touched.
        let raw = unsafe {
            host_trampoline(env, ptr::null_mut(), &raw const extra, 1, ptr::null_mut(), 0)
        };
        assert!(!raw.is_null());
        assert!(failed.load(Ordering::Relaxed));

        let trap = unsafe { Trap::from_raw(raw) }.unwrap();
        assert!(trap.message().contains("expected 0 arguments, engine passed 1"));
    }
}
