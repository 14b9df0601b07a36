//! Configuration structures for wasm-embed.
//!
//! This module defines configuration options for the embedding layer:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Engine construction settings (optimization, fuel, epochs)
//! - [`ExecutionConfig`]: Per-store execution limits (fuel budget, epoch deadline)

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// It can be loaded from TOML or JSON; every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Engine construction settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-store execution settings.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Code generator optimization level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No optimizations.
    None,
    /// Optimize for execution speed.
    #[default]
    Speed,
    /// Optimize for speed and code size.
    SpeedAndSize,
}

/// Profiler integration strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfilingMode {
    /// No profiler integration.
    #[default]
    None,
    /// Linux `perf` jitdump files.
    JitDump,
    /// Intel VTune.
    VTune,
    /// Linux `perf` map files.
    PerfMap,
}

/// Engine configuration.
///
/// These settings are applied to a native configuration object before it is
/// consumed by engine construction. They cannot change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Emit DWARF debug information for compiled code.
    #[serde(default)]
    pub debug_info: bool,

    /// Optimization level used by the code generator.
    #[serde(default)]
    pub opt_level: OptLevel,

    /// Profiler integration.
    #[serde(default)]
    pub profiling: ProfilingMode,

    /// Enable fuel metering.
    ///
    /// Required for [`ExecutionConfig::initial_fuel`] to have any effect.
    #[serde(default)]
    pub consume_fuel: bool,

    /// Enable epoch-based interruption.
    ///
    /// This allows interrupting long-running WebAssembly execution
    /// based on time rather than fuel consumption.
    #[serde(default)]
    pub epoch_interruption: bool,

    /// Maximum native stack available to WebAssembly, in bytes.
    #[serde(default = "defaults::max_wasm_stack")]
    pub max_wasm_stack: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug_info: false,
            opt_level: OptLevel::default(),
            profiling: ProfilingMode::default(),
            consume_fuel: false,
            epoch_interruption: false,
            max_wasm_stack: defaults::max_wasm_stack(),
        }
    }
}

/// Per-store execution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Fuel granted to each new store.
    ///
    /// A typical simple function consumes a few hundred units.
    #[serde(default)]
    pub initial_fuel: Option<u64>,

    /// Epoch deadline, in ticks, set on each new store.
    #[serde(default)]
    pub epoch_deadline: Option<u64>,

    /// Interval between epoch ticks in milliseconds.
    #[serde(default = "defaults::epoch_tick_ms")]
    pub epoch_tick_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            initial_fuel: None,
            epoch_deadline: None,
            epoch_tick_ms: defaults::epoch_tick_ms(),
        }
    }
}

impl ExecutionConfig {
    /// Get the epoch tick interval as a `Duration`.
    pub fn epoch_tick(&self) -> Duration {
        Duration::from_millis(self.epoch_tick_ms)
    }

    /// Number of ticks needed to cover `timeout` at the configured interval.
    ///
    /// Always at least one tick.
    pub fn ticks_for(&self, timeout: Duration) -> u64 {
        let tick = self.epoch_tick_ms.max(1);
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        millis.div_ceil(tick).max(1)
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn max_wasm_stack() -> usize {
        512 * 1024
    }

    pub const fn epoch_tick_ms() -> u64 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert!(!config.engine.debug_info);
        assert_eq!(config.engine.opt_level, OptLevel::Speed);
        assert_eq!(config.engine.profiling, ProfilingMode::None);
        assert!(!config.engine.consume_fuel);
        assert!(!config.engine.epoch_interruption);
        assert_eq!(config.engine.max_wasm_stack, 512 * 1024);

        assert_eq!(config.execution.initial_fuel, None);
        assert_eq!(config.execution.epoch_deadline, None);
        assert_eq!(config.execution.epoch_tick_ms, 10);
    }

    #[test]
    fn test_config_serialization() {
        let config = RuntimeConfig {
            engine: EngineConfig {
                consume_fuel: true,
                opt_level: OptLevel::SpeedAndSize,
                ..Default::default()
            },
            execution: ExecutionConfig {
                initial_fuel: Some(1_000),
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RuntimeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_epoch_tick() {
        let config = ExecutionConfig {
            epoch_tick_ms: 25,
            ..Default::default()
        };

        assert_eq!(config.epoch_tick(), Duration::from_millis(25));
        assert_eq!(config.ticks_for(Duration::from_millis(100)), 4);
        assert_eq!(config.ticks_for(Duration::from_millis(101)), 5);
        assert_eq!(config.ticks_for(Duration::ZERO), 1);
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"engine": {"consume_fuel": true, "opt_level": "none"}}"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();

        // Explicitly set values
        assert!(config.engine.consume_fuel);
        assert_eq!(config.engine.opt_level, OptLevel::None);
        // Default values for unspecified fields
        assert!(!config.engine.epoch_interruption);
        assert_eq!(config.execution.epoch_tick_ms, 10);
    }

    #[test]
    fn test_profiling_mode_names() {
        let mode: ProfilingMode = serde_json::from_str(r#""jitdump""#).unwrap();
        assert_eq!(mode, ProfilingMode::JitDump);
        let mode: ProfilingMode = serde_json::from_str(r#""perfmap""#).unwrap();
        assert_eq!(mode, ProfilingMode::PerfMap);
    }
}
