//! Raw declarations for the native WebAssembly engine C ABI.
//!
//! This crate mirrors the subset of `wasm.h` and `wasmtime.h` used by
//! `wasm-embed-core`. Everything here is unsafe and unchecked; ownership
//! rules follow the C headers (`own` parameters are consumed, returned
//! pointers are owned by the caller unless documented as borrowed).
//!
//! The symbols themselves are exported by the `wasmtime-c-api-impl` crate,
//! which is linked in below.

#![allow(non_camel_case_types, non_upper_case_globals, unsafe_code)]

use std::ffi::{c_char, c_void};
use std::marker::{PhantomData, PhantomPinned};

// Linking the C API crate is what provides the `wasm_*`/`wasmtime_*` symbols.
extern crate wasmtime_c_api as _;
use wasmtime as _;

macro_rules! opaque {
    ($($name:ident),* $(,)?) => {
        $(
            #[repr(C)]
            pub struct $name {
                _data: [u8; 0],
                _marker: PhantomData<(*mut u8, PhantomPinned)>,
            }
        )*
    };
}

opaque!(
    wasm_config_t,
    wasm_engine_t,
    wasm_valtype_t,
    wasm_functype_t,
    wasm_globaltype_t,
    wasm_tabletype_t,
    wasm_memorytype_t,
    wasm_externtype_t,
    wasm_importtype_t,
    wasm_exporttype_t,
    wasm_trap_t,
    wasmtime_error_t,
    wasmtime_store_t,
    wasmtime_context_t,
    wasmtime_module_t,
    wasmtime_caller_t,
    wasmtime_sharedmemory_t,
);

// ============================================================================
// Vectors
// ============================================================================

/// The `(size, data)` vector shape shared by every `wasm_*_vec_t`.
#[repr(C)]
#[derive(Debug)]
pub struct wasm_vec_t<T> {
    pub size: usize,
    pub data: *mut T,
}

impl<T> wasm_vec_t<T> {
    /// An empty vector suitable as an out-parameter.
    pub const fn empty() -> Self {
        Self {
            size: 0,
            data: std::ptr::null_mut(),
        }
    }
}

pub type wasm_byte_t = u8;
pub type wasm_byte_vec_t = wasm_vec_t<wasm_byte_t>;
pub type wasm_name_t = wasm_byte_vec_t;
pub type wasm_message_t = wasm_name_t;
pub type wasm_valtype_vec_t = wasm_vec_t<*mut wasm_valtype_t>;
pub type wasm_importtype_vec_t = wasm_vec_t<*mut wasm_importtype_t>;
pub type wasm_exporttype_vec_t = wasm_vec_t<*mut wasm_exporttype_t>;

// ============================================================================
// Kinds and small structs
// ============================================================================

pub type wasm_valkind_t = u8;
pub const WASM_I32: wasm_valkind_t = 0;
pub const WASM_I64: wasm_valkind_t = 1;
pub const WASM_F32: wasm_valkind_t = 2;
pub const WASM_F64: wasm_valkind_t = 3;
pub const WASM_V128: wasm_valkind_t = 4;
pub const WASM_EXTERNREF: wasm_valkind_t = 128;
pub const WASM_FUNCREF: wasm_valkind_t = 129;

pub type wasm_externkind_t = u8;
pub const WASM_EXTERN_FUNC: wasm_externkind_t = 0;
pub const WASM_EXTERN_GLOBAL: wasm_externkind_t = 1;
pub const WASM_EXTERN_TABLE: wasm_externkind_t = 2;
pub const WASM_EXTERN_MEMORY: wasm_externkind_t = 3;

pub type wasm_mutability_t = u8;
pub const WASM_CONST: wasm_mutability_t = 0;
pub const WASM_VAR: wasm_mutability_t = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct wasm_limits_t {
    pub min: u32,
    pub max: u32,
}

pub const wasm_limits_max_default: u32 = 0xffff_ffff;

pub type wasmtime_valkind_t = u8;
pub const WASMTIME_I32: wasmtime_valkind_t = 0;
pub const WASMTIME_I64: wasmtime_valkind_t = 1;
pub const WASMTIME_F32: wasmtime_valkind_t = 2;
pub const WASMTIME_F64: wasmtime_valkind_t = 3;
pub const WASMTIME_V128: wasmtime_valkind_t = 4;
pub const WASMTIME_FUNCREF: wasmtime_valkind_t = 5;
pub const WASMTIME_EXTERNREF: wasmtime_valkind_t = 6;
pub const WASMTIME_ANYREF: wasmtime_valkind_t = 7;

pub type wasmtime_extern_kind_t = u8;
pub const WASMTIME_EXTERN_FUNC: wasmtime_extern_kind_t = 0;
pub const WASMTIME_EXTERN_GLOBAL: wasmtime_extern_kind_t = 1;
pub const WASMTIME_EXTERN_TABLE: wasmtime_extern_kind_t = 2;
pub const WASMTIME_EXTERN_MEMORY: wasmtime_extern_kind_t = 3;
pub const WASMTIME_EXTERN_SHAREDMEMORY: wasmtime_extern_kind_t = 4;

pub type wasmtime_trap_code_t = u8;
pub const WASMTIME_TRAP_CODE_STACK_OVERFLOW: wasmtime_trap_code_t = 0;
pub const WASMTIME_TRAP_CODE_MEMORY_OUT_OF_BOUNDS: wasmtime_trap_code_t = 1;
pub const WASMTIME_TRAP_CODE_HEAP_MISALIGNED: wasmtime_trap_code_t = 2;
pub const WASMTIME_TRAP_CODE_TABLE_OUT_OF_BOUNDS: wasmtime_trap_code_t = 3;
pub const WASMTIME_TRAP_CODE_INDIRECT_CALL_TO_NULL: wasmtime_trap_code_t = 4;
pub const WASMTIME_TRAP_CODE_BAD_SIGNATURE: wasmtime_trap_code_t = 5;
pub const WASMTIME_TRAP_CODE_INTEGER_OVERFLOW: wasmtime_trap_code_t = 6;
pub const WASMTIME_TRAP_CODE_INTEGER_DIVISION_BY_ZERO: wasmtime_trap_code_t = 7;
pub const WASMTIME_TRAP_CODE_BAD_CONVERSION_TO_INTEGER: wasmtime_trap_code_t = 8;
pub const WASMTIME_TRAP_CODE_UNREACHABLE_CODE_REACHED: wasmtime_trap_code_t = 9;
pub const WASMTIME_TRAP_CODE_INTERRUPT: wasmtime_trap_code_t = 10;
pub const WASMTIME_TRAP_CODE_OUT_OF_FUEL: wasmtime_trap_code_t = 11;

pub type wasmtime_opt_level_t = u8;
pub const WASMTIME_OPT_LEVEL_NONE: wasmtime_opt_level_t = 0;
pub const WASMTIME_OPT_LEVEL_SPEED: wasmtime_opt_level_t = 1;
pub const WASMTIME_OPT_LEVEL_SPEED_AND_SIZE: wasmtime_opt_level_t = 2;

pub type wasmtime_profiling_strategy_t = u8;
pub const WASMTIME_PROFILING_STRATEGY_NONE: wasmtime_profiling_strategy_t = 0;
pub const WASMTIME_PROFILING_STRATEGY_JITDUMP: wasmtime_profiling_strategy_t = 1;
pub const WASMTIME_PROFILING_STRATEGY_VTUNE: wasmtime_profiling_strategy_t = 2;
pub const WASMTIME_PROFILING_STRATEGY_PERFMAP: wasmtime_profiling_strategy_t = 3;

// ============================================================================
// Store-scoped items (plain data, no destructor)
// ============================================================================

/// A function living in a store. `store_id == 0` encodes a null funcref.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct wasmtime_func_t {
    pub store_id: u64,
    pub __private: usize,
}

/// Tables, memories and globals share an opaque 24-byte shape.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct wasmtime_item_t {
    pub store_id: u64,
    pub __private: [u32; 4],
}

pub type wasmtime_global_t = wasmtime_item_t;
pub type wasmtime_table_t = wasmtime_item_t;
pub type wasmtime_memory_t = wasmtime_item_t;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct wasmtime_instance_t {
    pub store_id: u64,
    pub __private: usize,
}

/// A rooted reference; `store_id == 0` encodes null.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct wasmtime_externref_t {
    pub store_id: u64,
    pub __private1: u32,
    pub __private2: u32,
}

pub type wasmtime_anyref_t = wasmtime_externref_t;
pub type wasmtime_v128 = [u8; 16];

#[repr(C)]
#[derive(Clone, Copy)]
pub union wasmtime_valunion_t {
    pub i32: i32,
    pub i64: i64,
    pub f32: f32,
    pub f64: f64,
    pub anyref: wasmtime_anyref_t,
    pub externref: wasmtime_externref_t,
    pub funcref: wasmtime_func_t,
    pub v128: wasmtime_v128,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct wasmtime_val_t {
    pub kind: wasmtime_valkind_t,
    pub of: wasmtime_valunion_t,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union wasmtime_extern_union_t {
    pub func: wasmtime_func_t,
    pub global: wasmtime_global_t,
    pub table: wasmtime_table_t,
    pub memory: wasmtime_memory_t,
    pub sharedmemory: *mut wasmtime_sharedmemory_t,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct wasmtime_extern_t {
    pub kind: wasmtime_extern_kind_t,
    pub of: wasmtime_extern_union_t,
}

const _: () = {
    assert!(size_of::<wasmtime_valunion_t>() == 16);
    assert!(align_of::<wasmtime_valunion_t>() == 8);
    assert!(size_of::<wasmtime_val_t>() == 24);
    assert!(size_of::<wasmtime_func_t>() == 16);
};

pub type wasmtime_func_callback_t = Option<
    unsafe extern "C" fn(
        env: *mut c_void,
        caller: *mut wasmtime_caller_t,
        args: *const wasmtime_val_t,
        nargs: usize,
        results: *mut wasmtime_val_t,
        nresults: usize,
    ) -> *mut wasm_trap_t,
>;

pub type wasm_finalizer_t = Option<unsafe extern "C" fn(data: *mut c_void)>;

// ============================================================================
// Functions
// ============================================================================

unsafe extern "C" {
    // --- vectors -----------------------------------------------------------
    pub fn wasm_byte_vec_new(out: *mut wasm_byte_vec_t, size: usize, data: *const wasm_byte_t);
    pub fn wasm_byte_vec_new_empty(out: *mut wasm_byte_vec_t);
    pub fn wasm_byte_vec_delete(vec: *mut wasm_byte_vec_t);
    pub fn wasm_valtype_vec_new(
        out: *mut wasm_valtype_vec_t,
        size: usize,
        data: *const *mut wasm_valtype_t,
    );
    pub fn wasm_valtype_vec_new_empty(out: *mut wasm_valtype_vec_t);
    pub fn wasm_valtype_vec_delete(vec: *mut wasm_valtype_vec_t);
    pub fn wasm_importtype_vec_delete(vec: *mut wasm_importtype_vec_t);
    pub fn wasm_exporttype_vec_delete(vec: *mut wasm_exporttype_vec_t);

    // --- config / engine ---------------------------------------------------
    pub fn wasm_config_new() -> *mut wasm_config_t;
    pub fn wasm_config_delete(config: *mut wasm_config_t);
    pub fn wasmtime_config_debug_info_set(config: *mut wasm_config_t, enable: bool);
    pub fn wasmtime_config_consume_fuel_set(config: *mut wasm_config_t, enable: bool);
    pub fn wasmtime_config_epoch_interruption_set(config: *mut wasm_config_t, enable: bool);
    pub fn wasmtime_config_max_wasm_stack_set(config: *mut wasm_config_t, size: usize);
    pub fn wasmtime_config_cranelift_opt_level_set(
        config: *mut wasm_config_t,
        level: wasmtime_opt_level_t,
    );
    pub fn wasmtime_config_profiler_set(
        config: *mut wasm_config_t,
        strategy: wasmtime_profiling_strategy_t,
    );

    pub fn wasm_engine_new() -> *mut wasm_engine_t;
    pub fn wasm_engine_new_with_config(config: *mut wasm_config_t) -> *mut wasm_engine_t;
    pub fn wasm_engine_delete(engine: *mut wasm_engine_t);
    pub fn wasmtime_engine_increment_epoch(engine: *mut wasm_engine_t);

    // --- errors / traps ----------------------------------------------------
    pub fn wasmtime_error_message(error: *const wasmtime_error_t, message: *mut wasm_name_t);
    pub fn wasmtime_error_delete(error: *mut wasmtime_error_t);
    pub fn wasmtime_trap_new(msg: *const c_char, msg_len: usize) -> *mut wasm_trap_t;
    pub fn wasmtime_trap_code(trap: *const wasm_trap_t, code: *mut wasmtime_trap_code_t) -> bool;
    pub fn wasm_trap_message(trap: *const wasm_trap_t, out: *mut wasm_message_t);
    pub fn wasm_trap_delete(trap: *mut wasm_trap_t);

    // --- store / context ---------------------------------------------------
    pub fn wasmtime_store_new(
        engine: *mut wasm_engine_t,
        data: *mut c_void,
        finalizer: wasm_finalizer_t,
    ) -> *mut wasmtime_store_t;
    pub fn wasmtime_store_context(store: *mut wasmtime_store_t) -> *mut wasmtime_context_t;
    pub fn wasmtime_store_delete(store: *mut wasmtime_store_t);
    pub fn wasmtime_context_set_fuel(
        context: *mut wasmtime_context_t,
        fuel: u64,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_context_get_fuel(
        context: *const wasmtime_context_t,
        fuel: *mut u64,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_context_set_epoch_deadline(
        context: *mut wasmtime_context_t,
        ticks_beyond_current: u64,
    );
    pub fn wasmtime_context_gc(context: *mut wasmtime_context_t);

    // --- types -------------------------------------------------------------
    pub fn wasm_valtype_new(kind: wasm_valkind_t) -> *mut wasm_valtype_t;
    pub fn wasm_valtype_kind(ty: *const wasm_valtype_t) -> wasm_valkind_t;
    pub fn wasm_valtype_delete(ty: *mut wasm_valtype_t);

    pub fn wasm_functype_new(
        params: *mut wasm_valtype_vec_t,
        results: *mut wasm_valtype_vec_t,
    ) -> *mut wasm_functype_t;
    pub fn wasm_functype_params(ty: *const wasm_functype_t) -> *const wasm_valtype_vec_t;
    pub fn wasm_functype_results(ty: *const wasm_functype_t) -> *const wasm_valtype_vec_t;
    pub fn wasm_functype_delete(ty: *mut wasm_functype_t);

    pub fn wasm_globaltype_new(
        content: *mut wasm_valtype_t,
        mutability: wasm_mutability_t,
    ) -> *mut wasm_globaltype_t;
    pub fn wasm_globaltype_content(ty: *const wasm_globaltype_t) -> *const wasm_valtype_t;
    pub fn wasm_globaltype_mutability(ty: *const wasm_globaltype_t) -> wasm_mutability_t;
    pub fn wasm_globaltype_delete(ty: *mut wasm_globaltype_t);

    pub fn wasm_tabletype_new(
        element: *mut wasm_valtype_t,
        limits: *const wasm_limits_t,
    ) -> *mut wasm_tabletype_t;
    pub fn wasm_tabletype_element(ty: *const wasm_tabletype_t) -> *const wasm_valtype_t;
    pub fn wasm_tabletype_limits(ty: *const wasm_tabletype_t) -> *const wasm_limits_t;
    pub fn wasm_tabletype_delete(ty: *mut wasm_tabletype_t);

    pub fn wasm_memorytype_new(limits: *const wasm_limits_t) -> *mut wasm_memorytype_t;
    pub fn wasm_memorytype_limits(ty: *const wasm_memorytype_t) -> *const wasm_limits_t;
    pub fn wasm_memorytype_delete(ty: *mut wasm_memorytype_t);

    pub fn wasm_externtype_kind(ty: *const wasm_externtype_t) -> wasm_externkind_t;
    pub fn wasm_externtype_as_functype_const(
        ty: *const wasm_externtype_t,
    ) -> *const wasm_functype_t;
    pub fn wasm_externtype_as_globaltype_const(
        ty: *const wasm_externtype_t,
    ) -> *const wasm_globaltype_t;
    pub fn wasm_externtype_as_tabletype_const(
        ty: *const wasm_externtype_t,
    ) -> *const wasm_tabletype_t;
    pub fn wasm_externtype_as_memorytype_const(
        ty: *const wasm_externtype_t,
    ) -> *const wasm_memorytype_t;

    pub fn wasm_importtype_module(ty: *const wasm_importtype_t) -> *const wasm_name_t;
    pub fn wasm_importtype_name(ty: *const wasm_importtype_t) -> *const wasm_name_t;
    pub fn wasm_importtype_type(ty: *const wasm_importtype_t) -> *const wasm_externtype_t;
    pub fn wasm_exporttype_name(ty: *const wasm_exporttype_t) -> *const wasm_name_t;
    pub fn wasm_exporttype_type(ty: *const wasm_exporttype_t) -> *const wasm_externtype_t;

    // --- modules -----------------------------------------------------------
    pub fn wasmtime_module_new(
        engine: *mut wasm_engine_t,
        wasm: *const u8,
        wasm_len: usize,
        ret: *mut *mut wasmtime_module_t,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_module_validate(
        engine: *mut wasm_engine_t,
        wasm: *const u8,
        wasm_len: usize,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_module_clone(module: *mut wasmtime_module_t) -> *mut wasmtime_module_t;
    pub fn wasmtime_module_delete(module: *mut wasmtime_module_t);
    pub fn wasmtime_module_imports(
        module: *const wasmtime_module_t,
        out: *mut wasm_importtype_vec_t,
    );
    pub fn wasmtime_module_exports(
        module: *const wasmtime_module_t,
        out: *mut wasm_exporttype_vec_t,
    );
    pub fn wasmtime_module_serialize(
        module: *mut wasmtime_module_t,
        ret: *mut wasm_byte_vec_t,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_module_deserialize(
        engine: *mut wasm_engine_t,
        bytes: *const u8,
        bytes_len: usize,
        ret: *mut *mut wasmtime_module_t,
    ) -> *mut wasmtime_error_t;

    // --- instances ---------------------------------------------------------
    pub fn wasmtime_instance_new(
        store: *mut wasmtime_context_t,
        module: *const wasmtime_module_t,
        imports: *const wasmtime_extern_t,
        nimports: usize,
        instance: *mut wasmtime_instance_t,
        trap: *mut *mut wasm_trap_t,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_instance_export_get(
        store: *mut wasmtime_context_t,
        instance: *const wasmtime_instance_t,
        name: *const c_char,
        name_len: usize,
        item: *mut wasmtime_extern_t,
    ) -> bool;
    pub fn wasmtime_instance_export_nth(
        store: *mut wasmtime_context_t,
        instance: *const wasmtime_instance_t,
        index: usize,
        name: *mut *mut c_char,
        name_len: *mut usize,
        item: *mut wasmtime_extern_t,
    ) -> bool;

    // --- functions ---------------------------------------------------------
    pub fn wasmtime_func_new(
        store: *mut wasmtime_context_t,
        ty: *const wasm_functype_t,
        callback: wasmtime_func_callback_t,
        env: *mut c_void,
        finalizer: wasm_finalizer_t,
        ret: *mut wasmtime_func_t,
    );
    pub fn wasmtime_func_call(
        store: *mut wasmtime_context_t,
        func: *const wasmtime_func_t,
        args: *const wasmtime_val_t,
        nargs: usize,
        results: *mut wasmtime_val_t,
        nresults: usize,
        trap: *mut *mut wasm_trap_t,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_func_type(
        store: *const wasmtime_context_t,
        func: *const wasmtime_func_t,
    ) -> *mut wasm_functype_t;
    pub fn wasmtime_caller_context(caller: *mut wasmtime_caller_t) -> *mut wasmtime_context_t;
    pub fn wasmtime_caller_export_get(
        caller: *mut wasmtime_caller_t,
        name: *const c_char,
        name_len: usize,
        item: *mut wasmtime_extern_t,
    ) -> bool;

    // --- globals -----------------------------------------------------------
    pub fn wasmtime_global_new(
        store: *mut wasmtime_context_t,
        ty: *const wasm_globaltype_t,
        val: *const wasmtime_val_t,
        ret: *mut wasmtime_global_t,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_global_type(
        store: *const wasmtime_context_t,
        global: *const wasmtime_global_t,
    ) -> *mut wasm_globaltype_t;
    pub fn wasmtime_global_get(
        store: *mut wasmtime_context_t,
        global: *const wasmtime_global_t,
        out: *mut wasmtime_val_t,
    );
    pub fn wasmtime_global_set(
        store: *mut wasmtime_context_t,
        global: *const wasmtime_global_t,
        val: *const wasmtime_val_t,
    ) -> *mut wasmtime_error_t;

    // --- tables ------------------------------------------------------------
    pub fn wasmtime_table_new(
        store: *mut wasmtime_context_t,
        ty: *const wasm_tabletype_t,
        init: *const wasmtime_val_t,
        table: *mut wasmtime_table_t,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_table_type(
        store: *const wasmtime_context_t,
        table: *const wasmtime_table_t,
    ) -> *mut wasm_tabletype_t;
    pub fn wasmtime_table_get(
        store: *mut wasmtime_context_t,
        table: *const wasmtime_table_t,
        index: u64,
        val: *mut wasmtime_val_t,
    ) -> bool;
    pub fn wasmtime_table_set(
        store: *mut wasmtime_context_t,
        table: *const wasmtime_table_t,
        index: u64,
        val: *const wasmtime_val_t,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_table_size(
        store: *const wasmtime_context_t,
        table: *const wasmtime_table_t,
    ) -> u64;
    pub fn wasmtime_table_grow(
        store: *mut wasmtime_context_t,
        table: *const wasmtime_table_t,
        delta: u64,
        init: *const wasmtime_val_t,
        prev_size: *mut u64,
    ) -> *mut wasmtime_error_t;

    // --- memories ----------------------------------------------------------
    pub fn wasmtime_memory_new(
        store: *mut wasmtime_context_t,
        ty: *const wasm_memorytype_t,
        ret: *mut wasmtime_memory_t,
    ) -> *mut wasmtime_error_t;
    pub fn wasmtime_memory_type(
        store: *const wasmtime_context_t,
        memory: *const wasmtime_memory_t,
    ) -> *mut wasm_memorytype_t;
    pub fn wasmtime_memory_data(
        store: *const wasmtime_context_t,
        memory: *const wasmtime_memory_t,
    ) -> *mut u8;
    pub fn wasmtime_memory_data_size(
        store: *const wasmtime_context_t,
        memory: *const wasmtime_memory_t,
    ) -> usize;
    pub fn wasmtime_memory_size(
        store: *const wasmtime_context_t,
        memory: *const wasmtime_memory_t,
    ) -> u64;
    pub fn wasmtime_memory_grow(
        store: *mut wasmtime_context_t,
        memory: *const wasmtime_memory_t,
        delta: u64,
        prev_size: *mut u64,
    ) -> *mut wasmtime_error_t;

    // --- references --------------------------------------------------------
    pub fn wasmtime_externref_new(
        context: *mut wasmtime_context_t,
        data: *mut c_void,
        finalizer: wasm_finalizer_t,
        out: *mut wasmtime_externref_t,
    ) -> bool;
    pub fn wasmtime_externref_data(
        context: *mut wasmtime_context_t,
        data: *const wasmtime_externref_t,
    ) -> *mut c_void;
    pub fn wasmtime_val_unroot(context: *mut wasmtime_context_t, val: *mut wasmtime_val_t);

    // --- text format -------------------------------------------------------
    pub fn wasmtime_wat2wasm(
        wat: *const c_char,
        wat_len: usize,
        ret: *mut wasm_byte_vec_t,
    ) -> *mut wasmtime_error_t;
}
