//! Integration tests for wasm-embed-core.
//!
//! These tests verify the complete embedding pipeline:
//! - WAT compilation to module
//! - Store creation with fuel and epoch limits
//! - Host function registration and trap propagation
//! - Instantiation, export lookup and calls
//! - Store isolation and handle ownership

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use wasm_embed_core::handle::ConfigHandle;
use wasm_embed_core::{
    Config, Engine, EngineConfig, ExecutionConfig, Extern, ExternKind, ExternRef, Func, FuncType,
    Instance, Module, RuntimeError, Store, TrapCode, Val, ValKind, sys,
};

const ADD_WAT: &str = r#"
    (module
        (func (export "add") (param i32 i32) (result i32)
            local.get 0
            local.get 1
            i32.add)
    )
"#;

fn instantiate<'s>(store: &'s Store, wat: &str) -> Instance<'s> {
    let module = Module::from_wat(store, wat).unwrap();
    Instance::new(store, &module, &[]).unwrap()
}

// ============================================================================
// Test: Basic Execution
// ============================================================================

#[test]
fn test_add_returns_sum() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let instance = instantiate(&store, ADD_WAT);

    let add = instance.get_func("add").unwrap();
    let results = add.call(&[Val::I32(5), Val::I32(3)]).unwrap();

    assert_eq!(results, vec![Val::I32(8)]);
}

#[test]
fn test_typed_call() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let instance = instantiate(&store, ADD_WAT);

    let add = instance
        .get_func("add")
        .unwrap()
        .typed::<(i32, i32), i32>()
        .unwrap();

    assert_eq!(add.call((40, 2)).unwrap(), 42);
    assert_eq!(add.call((i32::MAX, 1)).unwrap(), i32::MIN);
}

// ============================================================================
// Test: Validation vs Compilation
// ============================================================================

#[test]
fn test_validate_and_compile_agree() {
    let engine = Engine::new().unwrap();

    assert!(!Module::validate(&engine, &[]));
    assert!(matches!(
        Module::new(&engine, &[]),
        Err(RuntimeError::Validation { .. })
    ));

    assert!(!Module::validate(&engine, &[0; 4]));
    assert!(matches!(
        Module::new(&engine, &[0; 4]),
        Err(RuntimeError::CompilationFailed { .. })
    ));

    let bytes = wasm_embed_core::wat2wasm(ADD_WAT).unwrap();
    assert!(Module::validate(&engine, &bytes));
    assert!(Module::new(&engine, &bytes).is_ok());
}

// ============================================================================
// Test: Arity Checking
// ============================================================================

#[test]
fn test_call_arity_checked() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let instance = instantiate(&store, ADD_WAT);
    let add = instance.get_func("add").unwrap();

    for args in [vec![], vec![Val::I32(1)], vec![Val::I32(1), Val::I32(2), Val::I32(3)]] {
        let err = add.call(&args).unwrap_err();
        assert!(
            matches!(err, RuntimeError::ArityMismatch { expected: 2, got } if got == args.len()),
            "unexpected error: {err}"
        );
    }

    assert!(matches!(
        add.call(&[Val::I32(1), Val::F32(2.0)]),
        Err(RuntimeError::TypeMismatch { .. })
    ));
}

// ============================================================================
// Test: Trap Surfacing
// ============================================================================

#[test]
fn test_divide_by_zero_traps() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let instance = instantiate(
        &store,
        r#"
        (module
            (func (export "div") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.div_s)
        )
        "#,
    );
    let div = instance.get_func("div").unwrap();

    let err = div.call(&[Val::I32(1), Val::I32(0)]).unwrap_err();
    assert!(err.is_trap());
    assert_eq!(err.trap_code(), Some(TrapCode::IntegerDivisionByZero));
    assert!(
        err.to_string().contains("integer divide by zero"),
        "unexpected message: {err}"
    );

    // The store stays usable after a trap.
    assert_eq!(div.call(&[Val::I32(9), Val::I32(3)]).unwrap(), vec![Val::I32(3)]);
}

#[test]
fn test_out_of_bounds_load_traps() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let instance = instantiate(
        &store,
        r#"
        (module
            (memory 1)
            (func (export "load") (param i32) (result i32)
                local.get 0
                i32.load)
        )
        "#,
    );
    let load = instance.get_func("load").unwrap();

    let err = load.call(&[Val::I32(0x10000)]).unwrap_err();
    assert_eq!(err.trap_code(), Some(TrapCode::MemoryOutOfBounds));
    assert!(
        err.to_string().contains("out of bounds memory access"),
        "unexpected message: {err}"
    );
    assert!(!err.is_resource_limit());
}

#[test]
fn test_start_function_trap() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let module = Module::from_wat(
        &engine,
        r#"(module (func $start unreachable) (start $start))"#,
    )
    .unwrap();

    let err = Instance::new(&store, &module, &[]).unwrap_err();
    assert_eq!(err.trap_code(), Some(TrapCode::UnreachableCodeReached));
}

#[test]
fn test_host_failure_in_start_function_is_trap() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let module = Module::from_wat(
        &engine,
        r#"(module (import "env" "boom" (func $boom)) (start $boom))"#,
    )
    .unwrap();
    let boom = Func::new(&store, FuncType::new([], []), |_, _| {
        Err(anyhow::anyhow!("host refused"))
    })
    .unwrap();

    let err = Instance::new(&store, &module, &[Extern::from(boom)]).unwrap_err();
    assert!(err.is_trap(), "expected a trap, got {err:?}");
    assert!(err.to_string().contains("host refused"));

    // A later linkage failure in the same store is still reported as such.
    let other = Module::from_wat(&engine, r#"(module (import "env" "g" (func (param i32))))"#)
        .unwrap();
    let wrong = Func::wrap(&store, |(): ()| ()).unwrap();
    assert!(matches!(
        Instance::new(&store, &other, &[Extern::from(wrong)]),
        Err(RuntimeError::Linkage { .. })
    ));
}

// ============================================================================
// Test: Store Isolation
// ============================================================================

#[test]
fn test_stores_do_not_share_state() {
    let wat = r#"
        (module
            (global $count (mut i32) (i32.const 0))
            (func (export "incr") (result i32)
                global.get $count
                i32.const 1
                i32.add
                global.set $count
                global.get $count)
            (export "count" (global $count))
        )
    "#;

    let engine = Engine::new().unwrap();
    let module = Module::from_wat(&engine, wat).unwrap();
    let store_a = Store::new(&engine).unwrap();
    let store_b = Store::new(&engine).unwrap();
    let a = Instance::new(&store_a, &module, &[]).unwrap();
    let b = Instance::new(&store_b, &module, &[]).unwrap();

    let incr_a = a.get_func("incr").unwrap();
    incr_a.call(&[]).unwrap();
    incr_a.call(&[]).unwrap();

    assert_eq!(a.get_global("count").unwrap().get().unwrap(), Val::I32(2));
    assert_eq!(b.get_global("count").unwrap().get().unwrap(), Val::I32(0));

    // Writing the exported global of one instance leaves the other alone.
    a.get_global("count").unwrap().set(Val::I32(100)).unwrap();
    assert_eq!(b.get_global("count").unwrap().get().unwrap(), Val::I32(0));
    assert_eq!(b.get_func("incr").unwrap().call(&[]).unwrap(), vec![Val::I32(1)]);
    assert_eq!(incr_a.call(&[]).unwrap(), vec![Val::I32(101)]);
}

#[test]
fn test_import_from_other_store_rejected() {
    let engine = Engine::new().unwrap();
    let module = Module::from_wat(&engine, r#"(module (import "env" "f" (func)))"#).unwrap();
    let store = Store::new(&engine).unwrap();
    let other = Store::new(&engine).unwrap();

    let foreign = Func::wrap(&other, |(): ()| ()).unwrap();
    assert!(matches!(
        Instance::new(&store, &module, &[Extern::from(foreign)]),
        Err(RuntimeError::StoreMismatch)
    ));
}

// ============================================================================
// Test: Import / Export Shape
// ============================================================================

#[test]
fn test_import_export_descriptors() {
    let engine = Engine::new().unwrap();
    let module = Module::from_wat(
        &engine,
        r#"
        (module
            (import "env" "add" (func $add (param i32 i32) (result i32)))
            (func (export "sum") (param i32 i32 i32) (result i32)
                local.get 0
                local.get 1
                call $add
                local.get 2
                call $add)
        )
        "#,
    )
    .unwrap();

    let imports = module.imports().unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].module(), "env");
    assert_eq!(imports[0].name(), "add");
    assert_eq!(
        imports[0].ty().func(),
        Some(&FuncType::new([ValKind::I32, ValKind::I32], [ValKind::I32]))
    );

    let exports = module.exports().unwrap();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].name(), "sum");
    assert_eq!(exports[0].ty().kind(), ExternKind::Func);
    assert_eq!(
        exports[0].ty().func().map(ToString::to_string).as_deref(),
        Some("(i32, i32, i32) -> (i32)")
    );

    let store = Store::new(&engine).unwrap();
    let add = Func::wrap(&store, |(a, b): (i32, i32)| a + b).unwrap();
    let instance = Instance::new(&store, &module, &[Extern::from(add)]).unwrap();

    let sum = instance.get_func("sum").unwrap();
    assert_eq!(
        sum.call(&[Val::I32(1), Val::I32(2), Val::I32(3)]).unwrap(),
        vec![Val::I32(6)]
    );
}

#[test]
fn test_duplicate_imports_bound_by_position() {
    let engine = Engine::new().unwrap();
    let module = Module::from_wat(
        &engine,
        r#"
        (module
            (import "env" "f" (func $f1 (result i32)))
            (import "env" "f" (func $f2 (result i32)))
            (func (export "a") (result i32) call $f1)
            (func (export "b") (result i32) call $f2)
        )
        "#,
    )
    .unwrap();
    let store = Store::new(&engine).unwrap();
    let one = Func::wrap(&store, |(): ()| 1_i32).unwrap();
    let two = Func::wrap(&store, |(): ()| 2_i32).unwrap();

    let instance = Instance::new(&store, &module, &[Extern::from(one), Extern::from(two)]).unwrap();
    assert_eq!(instance.get_func("a").unwrap().call(&[]).unwrap(), vec![Val::I32(1)]);
    assert_eq!(instance.get_func("b").unwrap().call(&[]).unwrap(), vec![Val::I32(2)]);
}

#[test]
fn test_duplicate_imports_with_different_signatures() {
    let engine = Engine::new().unwrap();
    let module = Module::from_wat(
        &engine,
        r#"
        (module
            (import "env" "f" (func (param i32)))
            (import "env" "f" (func (param i64)))
        )
        "#,
    )
    .unwrap();
    let store = Store::new(&engine).unwrap();
    let narrow = Func::wrap(&store, |_: i32| ()).unwrap();
    let wide = Func::wrap(&store, |_: i64| ()).unwrap();

    let imports = [Extern::from(narrow.clone()), Extern::from(wide.clone())];
    assert!(Instance::new(&store, &module, &imports).is_ok());

    // Same kinds in the wrong order is a linkage error, not a trap.
    let swapped = [Extern::from(wide), Extern::from(narrow)];
    let err = Instance::new(&store, &module, &swapped).unwrap_err();
    assert!(matches!(err, RuntimeError::Linkage { .. }), "unexpected error: {err:?}");
}

// ============================================================================
// Test: Ownership
// ============================================================================

#[test]
fn test_config_consumed_once() {
    let mut config = Config::new().unwrap();
    config.consume_fuel(true).unwrap();

    let engine = Engine::with_config(&mut config).unwrap();
    assert!(engine.fuel_enabled());
    assert!(config.is_consumed());

    assert!(matches!(
        Engine::with_config(&mut config),
        Err(RuntimeError::ConfigConsumed)
    ));
    assert!(matches!(
        config.epoch_interruption(true),
        Err(RuntimeError::ConfigConsumed)
    ));
}

#[test]
fn test_handle_release_is_idempotent() {
    let mut handle = unsafe { ConfigHandle::from_raw(sys::wasm_config_new()) }.unwrap();
    assert!(handle.is_valid());

    handle.release();
    handle.release();

    assert!(!handle.is_valid());
    assert!(matches!(
        handle.as_ptr(),
        Err(RuntimeError::InvalidHandle { what: "config" })
    ));
}

#[test]
fn test_module_outlives_engine_value() {
    let module = {
        let engine = Engine::new().unwrap();
        Module::from_wat(&engine, ADD_WAT).unwrap()
    };

    let store = Store::new(module.engine()).unwrap();
    let instance = Instance::new(&store, &module, &[]).unwrap();
    assert_eq!(instance.exports().len(), 1);
}

// ============================================================================
// Test: Resource Limits
// ============================================================================

const SPIN_WAT: &str = r#"
    (module
        (func (export "spin")
            (loop $forever
                br $forever))
    )
"#;

#[test]
fn test_fuel_exhaustion() {
    let engine = Engine::from_settings(&EngineConfig {
        consume_fuel: true,
        ..Default::default()
    })
    .unwrap();
    let store = Store::new(&engine).unwrap();
    store.add_fuel(10_000).unwrap();

    let instance = instantiate(&store, SPIN_WAT);
    let err = instance.get_func("spin").unwrap().call(&[]).unwrap_err();

    assert_eq!(err.trap_code(), Some(TrapCode::OutOfFuel));
    assert!(err.is_resource_limit());
    assert_eq!(store.fuel_remaining().unwrap(), 0);
    assert_eq!(store.fuel_consumed().unwrap(), 10_000);
}

#[test]
fn test_epoch_interruption() {
    let engine = Engine::from_settings(&EngineConfig {
        epoch_interruption: true,
        ..Default::default()
    })
    .unwrap();
    let store = Store::new(&engine).unwrap();
    let instance = instantiate(&store, SPIN_WAT);
    store.set_epoch_deadline(1).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let ticker = {
        let engine = engine.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(10));
                engine.increment_epoch();
            }
        })
    };

    let err = instance.get_func("spin").unwrap().call(&[]).unwrap_err();
    done.store(true, Ordering::Relaxed);
    ticker.join().unwrap();

    assert_eq!(err.trap_code(), Some(TrapCode::Interrupt));
    assert!(err.is_resource_limit());
}

#[test]
fn test_epoch_store_without_deadline_runs() {
    let engine = Engine::from_settings(&EngineConfig {
        epoch_interruption: true,
        ..Default::default()
    })
    .unwrap();
    let wat = r#"
        (module
            (func (export "count") (result i32)
                (local $i i32)
                (loop $again
                    local.get $i
                    i32.const 1
                    i32.add
                    local.tee $i
                    i32.const 1000
                    i32.lt_u
                    br_if $again)
                local.get $i)
        )
    "#;

    let limited = Store::with_limits(&engine, &ExecutionConfig::default()).unwrap();
    let instance = instantiate(&limited, wat);
    assert_eq!(instance.get_func("count").unwrap().call(&[]).unwrap(), vec![Val::I32(1000)]);

    let plain = Store::new(&engine).unwrap();
    let instance = instantiate(&plain, wat);
    assert_eq!(instance.get_func("count").unwrap().call(&[]).unwrap(), vec![Val::I32(1000)]);
}

// ============================================================================
// Test: Host Functions
// ============================================================================

#[test]
fn test_host_error_propagates_as_trap() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let module = Module::from_wat(
        &engine,
        r#"
        (module
            (import "env" "check" (func $check (param i32) (result i32)))
            (func (export "run") (param i32) (result i32)
                local.get 0
                call $check)
        )
        "#,
    )
    .unwrap();

    let check = Func::new(
        &store,
        FuncType::new([ValKind::I32], [ValKind::I32]),
        |_, args| match args[0].i32() {
            Some(v) if v >= 0 => Ok(vec![Val::I32(v * 10)]),
            _ => Err(anyhow::anyhow!("negative input rejected")),
        },
    )
    .unwrap();
    let instance = Instance::new(&store, &module, &[Extern::from(check)]).unwrap();
    let run = instance.get_func("run").unwrap();

    assert_eq!(run.call(&[Val::I32(4)]).unwrap(), vec![Val::I32(40)]);

    let err = run.call(&[Val::I32(-1)]).unwrap_err();
    assert!(err.is_trap());
    assert!(err.to_string().contains("negative input rejected"));
}

#[test]
fn test_host_reads_guest_memory() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let module = Module::from_wat(
        &engine,
        r#"
        (module
            (import "env" "log" (func $log (param i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 16) "hello from wasm")
            (func (export "run")
                i32.const 16
                i32.const 15
                call $log)
        )
        "#,
    )
    .unwrap();

    let captured = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&captured);
    let log = Func::new(
        &store,
        FuncType::new([ValKind::I32, ValKind::I32], []),
        move |caller, args| {
            let offset = usize::try_from(args[0].i32().unwrap_or_default())?;
            let len = usize::try_from(args[1].i32().unwrap_or_default())?;
            let memory = caller
                .memory_data("memory")
                .ok_or_else(|| anyhow::anyhow!("no exported memory"))?;
            let bytes = memory
                .get(offset..offset + len)
                .ok_or_else(|| anyhow::anyhow!("range out of bounds"))?;
            *sink.lock().unwrap() = String::from_utf8_lossy(bytes).into_owned();
            Ok(Vec::new())
        },
    )
    .unwrap();

    let instance = Instance::new(&store, &module, &[Extern::from(log)]).unwrap();
    instance.get_func("run").unwrap().call(&[]).unwrap();

    assert_eq!(*captured.lock().unwrap(), "hello from wasm");
}

#[test]
fn test_externref_round_trip() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let instance = instantiate(
        &store,
        r#"
        (module
            (func (export "id") (param externref) (result externref)
                local.get 0)
        )
        "#,
    );
    let id = instance.get_func("id").unwrap();

    let payload = ExternRef::new(vec![1u8, 2, 3]);
    let results = id.call(&[Val::from(payload.clone())]).unwrap();
    let back = results[0].externref().unwrap();
    assert!(back.ptr_eq(&payload));
    assert_eq!(back.downcast_ref::<Vec<u8>>().unwrap(), &[1, 2, 3]);

    assert_eq!(
        id.call(&[Val::ExternRef(None)]).unwrap(),
        vec![Val::ExternRef(None)]
    );
}

// ============================================================================
// Test: Memory, Table and Global Exports
// ============================================================================

#[test]
fn test_exported_memory_access() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let instance = instantiate(
        &store,
        r#"
        (module
            (memory (export "memory") 1 2)
            (func (export "peek") (param i32) (result i32)
                local.get 0
                i32.load8_u)
        )
        "#,
    );

    let memory = instance.get_memory("memory").unwrap();
    memory.write(8, &[0xab]).unwrap();
    let peek = instance.get_func("peek").unwrap();
    assert_eq!(peek.call(&[Val::I32(8)]).unwrap(), vec![Val::I32(0xab)]);

    assert_eq!(memory.grow(1).unwrap(), 1);
    assert!(memory.grow(1).is_err());
    assert!(matches!(
        memory.write(memory.data_size(), &[1]),
        Err(RuntimeError::OutOfBounds { .. })
    ));
}

#[test]
fn test_exported_table_call_indirect() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let instance = instantiate(
        &store,
        r#"
        (module
            (type $unary (func (param i32) (result i32)))
            (table (export "table") 2 funcref)
            (func $double (param i32) (result i32)
                local.get 0
                i32.const 2
                i32.mul)
            (elem (i32.const 0) $double)
            (func (export "apply") (param i32 i32) (result i32)
                local.get 1
                local.get 0
                call_indirect (type $unary))
        )
        "#,
    );

    let table = instance.get_table("table").unwrap();
    let apply = instance.get_func("apply").unwrap();
    assert_eq!(table.size(), 2);
    assert_eq!(apply.call(&[Val::I32(0), Val::I32(21)]).unwrap(), vec![Val::I32(42)]);

    let err = apply.call(&[Val::I32(1), Val::I32(1)]).unwrap_err();
    assert_eq!(err.trap_code(), Some(TrapCode::IndirectCallToNull));

    let triple = Func::wrap(&store, |x: i32| x * 3).unwrap();
    table.set(1, Val::from(triple.to_funcref())).unwrap();
    assert_eq!(apply.call(&[Val::I32(1), Val::I32(5)]).unwrap(), vec![Val::I32(15)]);
}

#[test]
fn test_exported_const_global() {
    let engine = Engine::new().unwrap();
    let store = Store::new(&engine).unwrap();
    let instance = instantiate(
        &store,
        r#"(module (global (export "answer") i64 (i64.const 42)))"#,
    );

    let answer = instance.get_global("answer").unwrap();
    assert_eq!(answer.get().unwrap(), Val::I64(42));
    assert!(matches!(
        answer.set(Val::I64(0)),
        Err(RuntimeError::ImmutableGlobal)
    ));
}
