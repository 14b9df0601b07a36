//! Engine configuration and creation.
//!
//! The [`Engine`] is the foundation of the runtime. It is:
//! - Thread-safe and shared by every store and module created from it
//! - Built once from a [`Config`], which it consumes
//! - The owner of the epoch counter used for time-based interruption

use std::fmt;
use std::sync::Arc;

use tracing::info;

use wasm_embed_common::{EngineConfig, OptLevel, ProfilingMode, RuntimeError};
use wasm_embed_sys as sys;

use crate::handle::{ConfigHandle, EngineHandle};

/// Builder of engine options.
///
/// A configuration is consumed by [`Engine::with_config`]. Afterwards every
/// setter, and any second engine construction, reports
/// [`RuntimeError::ConfigConsumed`] without touching native code.
pub struct Config {
    handle: ConfigHandle,
    consume_fuel: bool,
    epoch_interruption: bool,
}

impl Config {
    /// Create a configuration with engine defaults.
    pub fn new() -> Result<Self, RuntimeError> {
        // SAFETY: the constructor returns an owned config.
        let handle = unsafe { ConfigHandle::from_raw(sys::wasm_config_new()) }?;
        Ok(Self {
            handle,
            consume_fuel: false,
            epoch_interruption: false,
        })
    }

    /// Create a configuration from serde settings.
    pub fn from_settings(settings: &EngineConfig) -> Result<Self, RuntimeError> {
        let mut config = Self::new()?;
        config
            .debug_info(settings.debug_info)?
            .cranelift_opt_level(settings.opt_level)?
            .profiler(settings.profiling)?
            .consume_fuel(settings.consume_fuel)?
            .epoch_interruption(settings.epoch_interruption)?
            .max_wasm_stack(settings.max_wasm_stack)?;
        Ok(config)
    }

    /// Returns `true` once an engine has taken this configuration.
    pub fn is_consumed(&self) -> bool {
        !self.handle.is_valid()
    }

    /// Emit DWARF debug information for compiled code.
    pub fn debug_info(&mut self, enable: bool) -> Result<&mut Self, RuntimeError> {
        // SAFETY: `raw` is a live config.
        unsafe { sys::wasmtime_config_debug_info_set(self.raw()?, enable) };
        Ok(self)
    }

    /// Optimization level of the code generator.
    pub fn cranelift_opt_level(&mut self, level: OptLevel) -> Result<&mut Self, RuntimeError> {
        let level = match level {
            OptLevel::None => sys::WASMTIME_OPT_LEVEL_NONE,
            OptLevel::Speed => sys::WASMTIME_OPT_LEVEL_SPEED,
            OptLevel::SpeedAndSize => sys::WASMTIME_OPT_LEVEL_SPEED_AND_SIZE,
        };
        // SAFETY: `raw` is a live config.
        unsafe { sys::wasmtime_config_cranelift_opt_level_set(self.raw()?, level) };
        Ok(self)
    }

    /// Profiler integration strategy.
    pub fn profiler(&mut self, mode: ProfilingMode) -> Result<&mut Self, RuntimeError> {
        let strategy = match mode {
            ProfilingMode::None => sys::WASMTIME_PROFILING_STRATEGY_NONE,
            ProfilingMode::JitDump => sys::WASMTIME_PROFILING_STRATEGY_JITDUMP,
            ProfilingMode::VTune => sys::WASMTIME_PROFILING_STRATEGY_VTUNE,
            ProfilingMode::PerfMap => sys::WASMTIME_PROFILING_STRATEGY_PERFMAP,
        };
        // SAFETY: `raw` is a live config.
        unsafe { sys::wasmtime_config_profiler_set(self.raw()?, strategy) };
        Ok(self)
    }

    /// Enable fuel metering for stores of this engine.
    pub fn consume_fuel(&mut self, enable: bool) -> Result<&mut Self, RuntimeError> {
        // SAFETY: `raw` is a live config.
        unsafe { sys::wasmtime_config_consume_fuel_set(self.raw()?, enable) };
        self.consume_fuel = enable;
        Ok(self)
    }

    /// Enable epoch-based interruption.
    pub fn epoch_interruption(&mut self, enable: bool) -> Result<&mut Self, RuntimeError> {
        // SAFETY: `raw` is a live config.
        unsafe { sys::wasmtime_config_epoch_interruption_set(self.raw()?, enable) };
        self.epoch_interruption = enable;
        Ok(self)
    }

    /// Maximum native stack available to WebAssembly, in bytes.
    pub fn max_wasm_stack(&mut self, size: usize) -> Result<&mut Self, RuntimeError> {
        if size == 0 {
            return Err(RuntimeError::invalid_config("max_wasm_stack must be non-zero"));
        }
        // SAFETY: `raw` is a live config.
        unsafe { sys::wasmtime_config_max_wasm_stack_set(self.raw()?, size) };
        Ok(self)
    }

    fn raw(&self) -> Result<*mut sys::wasm_config_t, RuntimeError> {
        self.handle.as_ptr().map_err(|_| RuntimeError::ConfigConsumed)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("consumed", &self.is_consumed())
            .field("consume_fuel", &self.consume_fuel)
            .field("epoch_interruption", &self.epoch_interruption)
            .finish()
    }
}

struct EngineInner {
    handle: EngineHandle,
    consume_fuel: bool,
    epoch_interruption: bool,
}

// SAFETY: the native engine is internally synchronized; the handle is only
// released when the last `Arc` is dropped.
unsafe impl Send for EngineInner {}
// SAFETY: as above; shared access never mutates the handle.
unsafe impl Sync for EngineInner {}

/// Thread-safe WebAssembly engine.
///
/// Cloning is cheap and shares the same native engine. The native engine is
/// deleted when the last clone, store or module referring to it is dropped.
///
/// # Example
///
/// ```ignore
/// use wasm_embed_core::{Config, Engine};
///
/// let mut config = Config::new()?;
/// config.consume_fuel(true)?;
/// let engine = Engine::with_config(&mut config)?;
/// assert!(config.is_consumed());
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine with the default configuration.
    pub fn new() -> Result<Self, RuntimeError> {
        // SAFETY: the constructor returns an owned engine.
        let handle = unsafe { EngineHandle::from_raw(sys::wasm_engine_new()) }?;
        info!("Engine initialized with default configuration");
        Ok(Self::from_handle(handle, false, false))
    }

    /// Create an engine, consuming `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ConfigConsumed`] if `config` was already used,
    /// or [`RuntimeError::NullHandle`] if the engine rejected it.
    pub fn with_config(config: &mut Config) -> Result<Self, RuntimeError> {
        let raw = config.handle.take().map_err(|_| RuntimeError::ConfigConsumed)?;
        // SAFETY: ownership of `raw` passes to the engine constructor.
        let handle = unsafe { EngineHandle::from_raw(sys::wasm_engine_new_with_config(raw)) }?;

        info!(
            consume_fuel = config.consume_fuel,
            epoch_interruption = config.epoch_interruption,
            "Engine initialized"
        );

        Ok(Self::from_handle(
            handle,
            config.consume_fuel,
            config.epoch_interruption,
        ))
    }

    /// Create an engine from serde settings.
    pub fn from_settings(settings: &EngineConfig) -> Result<Self, RuntimeError> {
        let mut config = Config::from_settings(settings)?;
        Self::with_config(&mut config)
    }

    fn from_handle(handle: EngineHandle, consume_fuel: bool, epoch_interruption: bool) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                handle,
                consume_fuel,
                epoch_interruption,
            }),
        }
    }

    /// Returns `true` if stores of this engine meter fuel.
    pub fn fuel_enabled(&self) -> bool {
        self.inner.consume_fuel
    }

    /// Returns `true` if this engine supports epoch interruption.
    pub fn epoch_enabled(&self) -> bool {
        self.inner.epoch_interruption
    }

    /// Returns `true` if both values share one native engine.
    pub fn same(&self, other: &Engine) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Increment the epoch counter.
    ///
    /// This should be called periodically (e.g., from a ticker thread) to
    /// let epoch deadlines interrupt long-running executions. Safe to call
    /// from any thread.
    pub fn increment_epoch(&self) {
        if let Ok(raw) = self.inner.handle.as_ptr() {
            // SAFETY: `raw` is a live engine; the call is thread-safe.
            unsafe { sys::wasmtime_engine_increment_epoch(raw) };
        }
    }

    pub(crate) fn raw(&self) -> Result<*mut sys::wasm_engine_t, RuntimeError> {
        self.inner.handle.as_ptr()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("consume_fuel", &self.inner.consume_fuel)
            .field("epoch_interruption", &self.inner.epoch_interruption)
            .finish_non_exhaustive()
    }
}

/// Anything that can provide an engine: an [`Engine`] or a store of it.
pub trait AsEngine {
    /// The engine.
    fn engine(&self) -> &Engine;
}

impl AsEngine for Engine {
    fn engine(&self) -> &Engine {
        self
    }
}
