//! Safe embedding layer over the native WebAssembly engine.
//!
//! This crate wraps the engine's C ABI in owned, lifetime-checked types:
//! - [`Engine`]: Configured engine, shared by stores and modules
//! - [`Store`]: Isolated collection of instances and objects
//! - [`Module`]: Validated, compiled WebAssembly module
//! - [`Instance`]: Module instantiated in a store, with bound exports
//! - [`Func`], [`Global`], [`Table`], [`Memory`]: Store-scoped objects
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Engine                           │
//! │  (Shared, thread-safe, built once from a Config)        │
//! │  - Compilation settings                                 │
//! │  - Epoch counter                                        │
//! └─────────────────────────────────────────────────────────┘
//!                │                           │
//!                ▼                           ▼
//! ┌───────────────────────────┐ ┌───────────────────────────┐
//! │          Module           │ │           Store           │
//! │  (Compiled, Send + Sync)  │ │  (Isolated, not shared)   │
//! │  - Import/export types    │ │  - Host callback states   │
//! └───────────────────────────┘ │  - Fuel / epoch deadline  │
//!                │              └───────────────────────────┘
//!                │                           │
//!                ▼                           ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │          Instance<'s> / Func<'s> / Memory<'s> ...       │
//! │  (Borrow the store; cannot outlive it)                  │
//! │  - Calls checked against the captured signature         │
//! │  - Traps surfaced as RuntimeError::Trap                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Native handles are released in dependency order: objects before their
//! store, stores and modules before their engine.

#![allow(unsafe_code)]

pub mod engine;
pub mod externals;
pub mod handle;
pub mod instance;
pub mod module;
pub mod store;
pub mod trap;
pub mod types;
pub mod val;
pub mod vec;
pub mod wat;

mod trampoline;

pub use engine::{AsEngine, Config, Engine};
pub use externals::{Extern, Func, Global, Memory, PAGE_SIZE, Table, TypedFunc};
pub use instance::{Exports, Instance};
pub use module::Module;
pub use store::{NO_EPOCH_DEADLINE, Store};
pub use trampoline::Caller;
pub use trap::Trap;
pub use types::{ExportType, ExternType, FuncType, GlobalType, ImportType, Limits, MemoryType, TableType};
pub use val::{Codec, ExternRef, FuncRef, V128, Val, WasmParams, WasmResults, WasmTy};
pub use wat::wat2wasm;

pub use wasm_embed_common::{
    EngineConfig, ExecutionConfig, ExternKind, HostFunctionError, Mutability, OptLevel,
    ProfilingMode, RuntimeError, TrapCode, ValKind,
};
pub use wasm_embed_sys as sys;
