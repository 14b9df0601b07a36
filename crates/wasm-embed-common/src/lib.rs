//! Common types, errors, and configuration for wasm-embed.
//!
//! This crate provides shared functionality used across the wasm-embed workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for engine and store settings
//! - The value/extern kind vocabulary

pub mod config;
pub mod config_file;
pub mod error;
pub mod kind;

pub use config::{EngineConfig, ExecutionConfig, OptLevel, ProfilingMode, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError, LoggingConfig};
pub use error::{HostFunctionError, RuntimeError, TrapCode};
pub use kind::{ExternKind, Mutability, ValKind};
