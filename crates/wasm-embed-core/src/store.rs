//! Store creation and per-store execution state.
//!
//! This module provides [`Store`], the unit of isolation: every function,
//! global, table, memory and instance lives in exactly one store and borrows
//! it for its whole lifetime. A store also owns:
//! - The callback states of host functions registered in it
//! - Fuel accounting (when the engine meters fuel)
//! - The epoch deadline (when the engine supports epoch interruption)

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use wasm_embed_common::{ExecutionConfig, RuntimeError};
use wasm_embed_sys as sys;

use crate::engine::{AsEngine, Engine};
use crate::handle::StoreHandle;
use crate::trampoline::HostFuncState;
use crate::trap;

/// Deadline used when epochs are enabled but no deadline was asked for.
///
/// The engine adds the delta to its current epoch, so this leaves headroom
/// for the counter instead of using `u64::MAX`.
pub const NO_EPOCH_DEADLINE: u64 = u64::MAX / 2;

/// An isolated collection of WebAssembly objects.
///
/// Fields are declared in release order: the native store goes first, then
/// the host callback states it may still reference, and the engine last.
///
/// # Thread Safety
///
/// `Store` can move between threads but is not shared: all objects created in
/// it borrow it immutably and native calls are made one at a time.
pub struct Store {
    handle: StoreHandle,
    context: *mut sys::wasmtime_context_t,
    host_funcs: RefCell<Vec<Box<HostFuncState>>>,
    host_failed: Arc<AtomicBool>,
    id: Cell<Option<u64>>,
    fuel_added: Cell<u64>,
    engine: Engine,
}

// SAFETY: the native store has no thread affinity, host callback states are
// `Send`, and `&Store` never crosses threads because `Store` is not `Sync`.
unsafe impl Send for Store {}

impl Store {
    /// Create a new store for `engine`.
    ///
    /// # Errors
    ///
    /// Returns a construction error if the engine handle is invalid or the
    /// native store could not be created.
    pub fn new(engine: &Engine) -> Result<Self, RuntimeError> {
        // SAFETY: `raw` is a live engine; no host data or finalizer is attached.
        let handle = unsafe {
            StoreHandle::from_raw(sys::wasmtime_store_new(engine.raw()?, ptr::null_mut(), None))
        }?;
        // SAFETY: the context lives exactly as long as the store.
        let context = unsafe { sys::wasmtime_store_context(handle.as_ptr()?) };
        if context.is_null() {
            return Err(RuntimeError::null_handle("store context"));
        }

        if engine.epoch_enabled() {
            // SAFETY: the context was just checked to be live.
            unsafe { sys::wasmtime_context_set_epoch_deadline(context, NO_EPOCH_DEADLINE) };
        }

        debug!(
            fuel = engine.fuel_enabled(),
            epoch = engine.epoch_enabled(),
            "Store created"
        );

        Ok(Self {
            handle,
            context,
            host_funcs: RefCell::new(Vec::new()),
            host_failed: Arc::new(AtomicBool::new(false)),
            id: Cell::new(None),
            fuel_added: Cell::new(0),
            engine: engine.clone(),
        })
    }

    /// Create a store and apply the execution limits in `config`.
    ///
    /// Limits the engine does not support are skipped. Without an
    /// `epoch_deadline`, an epoch-enabled store is never interrupted.
    pub fn with_limits(engine: &Engine, config: &ExecutionConfig) -> Result<Self, RuntimeError> {
        let store = Self::new(engine)?;

        if let Some(fuel) = config.initial_fuel {
            if engine.fuel_enabled() {
                store.add_fuel(fuel)?;
            }
        }

        if let Some(ticks) = config.epoch_deadline {
            if engine.epoch_enabled() {
                store.set_epoch_deadline(ticks)?;
            }
        }

        Ok(store)
    }

    /// The engine this store belongs to.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Add `fuel` units to the remaining budget.
    pub fn add_fuel(&self, fuel: u64) -> Result<(), RuntimeError> {
        let remaining = self.fuel_remaining()?;
        // SAFETY: `context` is live for the store's lifetime.
        unsafe {
            trap::check(
                sys::wasmtime_context_set_fuel(self.context, remaining.saturating_add(fuel)),
                RuntimeError::engine,
            )
        }?;
        self.fuel_added.set(self.fuel_added.get().saturating_add(fuel));
        Ok(())
    }

    /// Fuel still available to executions in this store.
    pub fn fuel_remaining(&self) -> Result<u64, RuntimeError> {
        self.require_fuel()?;
        let mut fuel = 0;
        // SAFETY: `context` is live for the store's lifetime.
        unsafe {
            trap::check(
                sys::wasmtime_context_get_fuel(self.context, &raw mut fuel),
                RuntimeError::engine,
            )
        }?;
        Ok(fuel)
    }

    /// Fuel consumed since the store was created.
    pub fn fuel_consumed(&self) -> Result<u64, RuntimeError> {
        let remaining = self.fuel_remaining()?;
        Ok(self.fuel_added.get().saturating_sub(remaining))
    }

    /// Interrupt execution once the engine epoch advances `ticks` beyond
    /// its current value.
    ///
    /// Until this is called, stores of an epoch-enabled engine run with
    /// [`NO_EPOCH_DEADLINE`], so guest code is not interrupted.
    pub fn set_epoch_deadline(&self, ticks: u64) -> Result<(), RuntimeError> {
        if !self.engine.epoch_enabled() {
            return Err(RuntimeError::invalid_config(
                "epoch interruption is not enabled for this engine",
            ));
        }
        // SAFETY: `context` is live for the store's lifetime.
        unsafe { sys::wasmtime_context_set_epoch_deadline(self.context, ticks) };
        Ok(())
    }

    /// Run a garbage collection of unreachable references.
    pub fn gc(&self) {
        // SAFETY: `context` is live for the store's lifetime.
        unsafe { sys::wasmtime_context_gc(self.context) };
    }

    /// Number of host functions registered in this store.
    pub fn host_func_count(&self) -> usize {
        self.host_funcs.borrow().len()
    }

    fn require_fuel(&self) -> Result<(), RuntimeError> {
        if self.engine.fuel_enabled() {
            Ok(())
        } else {
            Err(RuntimeError::FuelNotEnabled)
        }
    }

    pub(crate) fn context(&self) -> *mut sys::wasmtime_context_t {
        self.context
    }

    /// Keep a host callback state alive for as long as the store.
    pub(crate) fn register_host_func(&self, state: Box<HostFuncState>) {
        self.host_funcs.borrow_mut().push(state);
    }

    /// Flag shared with every host function of this store.
    pub(crate) fn host_failure_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.host_failed)
    }

    /// Whether a host function raised a trap since the last call, clearing
    /// the flag.
    pub(crate) fn take_host_failure(&self) -> bool {
        self.host_failed.swap(false, Ordering::Relaxed)
    }

    /// The native store identifier, once any item has revealed it.
    pub(crate) fn id(&self) -> Option<u64> {
        self.id.get()
    }

    /// Record the identifier carried by an item created in this store.
    pub(crate) fn note_id(&self, id: u64) {
        if id != 0 && self.id.get().is_none() {
            self.id.set(Some(id));
        }
    }
}

impl AsEngine for Store {
    fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id.get())
            .field("host_funcs", &self.host_func_count())
            .field("fuel_added", &self.fuel_added.get())
            .finish_non_exhaustive()
    }
}
