//! wasm-embed CLI entry point.
//!
//! Validates, inspects and invokes WebAssembly modules through the
//! embedding layer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wasm_embed_common::{ConfigFile, LoggingConfig};
use wasm_embed_core::{Engine, Instance, Module, Store, V128, Val, ValKind, wat2wasm};

/// Run WebAssembly modules on the native engine.
#[derive(Debug, Parser)]
#[command(name = "wasm-embed", version, about)]
struct Cli {
    /// Module to load (`.wasm` binary or `.wat` text).
    module: PathBuf,

    /// Exported function to invoke.
    #[arg(long, value_name = "NAME")]
    invoke: Option<String>,

    /// Arguments for the invoked function, parsed by its parameter types.
    #[arg(allow_hyphen_values = true, requires = "invoke")]
    args: Vec<String>,

    /// TOML configuration file.
    #[arg(long, env = "WASM_EMBED_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fuel budget for the invocation (enables fuel metering).
    #[arg(long)]
    fuel: Option<u64>,

    /// Wall-clock limit for the invocation (enables epoch interruption).
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Only check that the module is valid.
    #[arg(long, conflicts_with_all = ["invoke", "inspect"])]
    validate: bool,

    /// Print the module's imports and exports.
    #[arg(long)]
    inspect: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    init_tracing(&config.logging, cli.json_logs);

    let mut engine_settings = config.runtime.engine.clone();
    engine_settings.consume_fuel |= cli.fuel.is_some();
    engine_settings.epoch_interruption |= cli.timeout_ms.is_some();
    let engine = Engine::from_settings(&engine_settings).context("Failed to create engine")?;

    let bytes = load_module_bytes(&cli.module)?;

    if cli.validate {
        if Module::validate(&engine, &bytes) {
            println!("{}: valid", cli.module.display());
            return Ok(());
        }
        bail!("{}: invalid module", cli.module.display());
    }

    let module = Module::new(&engine, &bytes)
        .with_context(|| format!("Failed to compile {}", cli.module.display()))?;

    if cli.inspect {
        print_descriptors(&module)?;
    }

    if let Some(name) = &cli.invoke {
        invoke(&cli, &config, &engine, &module, name)?;
    }

    Ok(())
}

/// Initialize tracing, preferring `RUST_LOG` over the configured filter.
fn init_tracing(logging: &LoggingConfig, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    if json || logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_module_bytes(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path.extension().is_some_and(|ext| ext == "wat") {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return wat2wasm(&text).with_context(|| format!("Failed to parse {}", path.display()));
    }
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_descriptors(module: &Module) -> anyhow::Result<()> {
    println!("imports:");
    for import in module.imports()? {
        println!("  {}::{}: {}", import.module(), import.name(), import.ty());
    }
    println!("exports:");
    for export in module.exports()? {
        println!("  {}: {}", export.name(), export.ty());
    }
    Ok(())
}

fn invoke(
    cli: &Cli,
    config: &ConfigFile,
    engine: &Engine,
    module: &Module,
    name: &str,
) -> anyhow::Result<()> {
    let mut execution = config.runtime.execution.clone();
    if let Some(fuel) = cli.fuel {
        execution.initial_fuel = Some(fuel);
    }
    let timeout = cli.timeout_ms.map(Duration::from_millis);
    if let Some(timeout) = timeout {
        execution.epoch_deadline = Some(execution.ticks_for(timeout));
    }

    let store = Store::with_limits(engine, &execution).context("Failed to create store")?;
    let instance = Instance::new(&store, module, &[]).context("Failed to instantiate module")?;
    let func = instance
        .get_func(name)
        .with_context(|| format!("Cannot invoke '{name}'"))?;

    let params = func.ty().params();
    if params.len() != cli.args.len() {
        bail!(
            "'{name}' takes {} arguments ({}), got {}",
            params.len(),
            func.ty(),
            cli.args.len()
        );
    }
    let args = params
        .iter()
        .zip(&cli.args)
        .map(|(kind, text)| parse_arg(*kind, text))
        .collect::<anyhow::Result<Vec<_>>>()?;

    debug!(function = name, args = ?args, "Invoking export");

    let ticker = engine
        .epoch_enabled()
        .then(|| EpochTicker::start(engine.clone(), execution.epoch_tick()));
    let outcome = func.call(&args);
    if let Some(ticker) = ticker {
        ticker.stop();
    }

    let results = outcome.with_context(|| format!("'{name}' failed"))?;
    for val in &results {
        println!("{}", format_val(val));
    }

    if engine.fuel_enabled() {
        info!(fuel_consumed = store.fuel_consumed()?, "Invocation finished");
    }

    Ok(())
}

/// Parse a command-line argument as a value of `kind`.
fn parse_arg(kind: ValKind, text: &str) -> anyhow::Result<Val> {
    let val = match kind {
        ValKind::I32 => Val::I32(parse_i32(text)?),
        ValKind::I64 => Val::I64(parse_i64(text)?),
        ValKind::F32 => Val::F32(text.parse().with_context(|| format!("'{text}' is not an f32"))?),
        ValKind::F64 => Val::F64(text.parse().with_context(|| format!("'{text}' is not an f64"))?),
        ValKind::V128 => {
            let bits: u128 = text.parse().with_context(|| format!("'{text}' is not a v128"))?;
            Val::V128(V128::from(bits))
        }
        ValKind::FuncRef | ValKind::ExternRef => {
            if text == "null" {
                Val::default_for(kind)
            } else {
                bail!("{kind} arguments can only be 'null'");
            }
        }
    };
    Ok(val)
}

/// Parse an `i32`, also accepting unsigned values of the same width
/// (`4294967295` reads as `-1`).
#[allow(clippy::cast_possible_wrap)]
fn parse_i32(text: &str) -> anyhow::Result<i32> {
    text.parse::<i32>()
        .or_else(|_| text.parse::<u32>().map(|v| v as i32))
        .with_context(|| format!("'{text}' is not an i32"))
}

#[allow(clippy::cast_possible_wrap)]
fn parse_i64(text: &str) -> anyhow::Result<i64> {
    text.parse::<i64>()
        .or_else(|_| text.parse::<u64>().map(|v| v as i64))
        .with_context(|| format!("'{text}' is not an i64"))
}

fn format_val(val: &Val) -> String {
    match val {
        Val::I32(v) => v.to_string(),
        Val::I64(v) => v.to_string(),
        Val::F32(v) => v.to_string(),
        Val::F64(v) => v.to_string(),
        Val::V128(v) => format!("{:#034x}", v.as_u128()),
        Val::FuncRef(None) | Val::ExternRef(None) => "null".to_string(),
        Val::FuncRef(Some(_)) => "<funcref>".to_string(),
        Val::ExternRef(Some(_)) => "<externref>".to_string(),
    }
}

/// Background thread advancing the engine epoch at a fixed interval.
struct EpochTicker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl EpochTicker {
    fn start(engine: Engine, tick: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                thread::sleep(tick);
                engine.increment_epoch();
            }
        });
        Self { stop, handle }
    }

    fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            tracing::warn!("Epoch ticker thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arg_numbers() {
        assert_eq!(parse_arg(ValKind::I32, "-5").unwrap(), Val::I32(-5));
        assert_eq!(parse_arg(ValKind::I32, "4294967295").unwrap(), Val::I32(-1));
        assert_eq!(parse_arg(ValKind::I64, "42").unwrap(), Val::I64(42));
        assert_eq!(parse_arg(ValKind::F64, "1.5").unwrap(), Val::F64(1.5));
        assert_eq!(
            parse_arg(ValKind::V128, "1").unwrap(),
            Val::V128(V128::from(1))
        );
    }

    #[test]
    fn test_parse_arg_errors() {
        assert!(parse_arg(ValKind::I32, "4294967296").is_err());
        assert!(parse_arg(ValKind::I32, "abc").is_err());
        assert!(parse_arg(ValKind::ExternRef, "0").is_err());
        assert_eq!(
            parse_arg(ValKind::FuncRef, "null").unwrap(),
            Val::FuncRef(None)
        );
    }

    #[test]
    fn test_format_val() {
        assert_eq!(format_val(&Val::I32(-3)), "-3");
        assert_eq!(format_val(&Val::ExternRef(None)), "null");
        assert_eq!(
            format_val(&Val::V128(V128::from(255))),
            "0x000000000000000000000000000000ff"
        );
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "wasm-embed",
            "add.wat",
            "--invoke",
            "add",
            "--fuel",
            "1000",
            "5",
            "-3",
        ])
        .unwrap();
        assert_eq!(cli.invoke.as_deref(), Some("add"));
        assert_eq!(cli.args, ["5", "-3"]);
        assert_eq!(cli.fuel, Some(1000));

        assert!(Cli::try_parse_from(["wasm-embed", "m.wasm", "--validate", "--inspect"]).is_err());
    }
}
