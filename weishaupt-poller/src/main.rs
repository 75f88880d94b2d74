//! Command-line host polling a Weishaupt heat pump.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use weishaupt_modbus::item::Kind;
use weishaupt_modbus::{Catalog, Config, CycleOutcome, HeatPump, ModbusTcpTransport, Value};

/// Poll a Weishaupt heat pump over Modbus TCP.
#[derive(Parser, Debug)]
#[command(name = "weishaupt-poller")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file.
    #[arg(short, long, global = true, default_value = "weishaupt.toml")]
    config: PathBuf,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe all registers, then poll forever.
    Run,
    /// Refresh once and print one value.
    Get { name: String },
    /// Write a number or a select option.
    Set {
        name: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Print the catalog.
    List,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "weishaupt=debug" } else { "weishaupt=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

async fn connect(config: &Config) -> Result<HeatPump> {
    let socket_addr = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("resolving {}", config.host))?
        .next()
        .with_context(|| format!("no address for {}", config.host))?;
    let transport = ModbusTcpTransport::new(socket_addr, config.request_timeout());

    Ok(HeatPump::new(
        config.load_catalog()?,
        Arc::new(transport),
        config.load_power_map()?,
        config.availability()?,
        config.cycle_timeout(),
    ))
}

/// Index of `name` followed by the indices of the entries it references.
fn related_indices(catalog: &Catalog, name: &str) -> Result<Vec<usize>> {
    let Some(entry) = catalog.get(name) else {
        bail!("unknown entry {name}");
    };
    Ok(std::iter::once(name)
        .chain(entry.references())
        .filter_map(|name| catalog.index_of(name))
        .collect())
}

fn report(heat_pump: &HeatPump, outcome: CycleOutcome) {
    info!(
        read = outcome.read,
        failed = outcome.failed,
        skipped = outcome.skipped,
        timed_out = outcome.timed_out,
        "refresh cycle"
    );
    for entry in heat_pump.catalog().entries() {
        if let Some(value) = heat_pump.current_value(&entry.name) {
            info!(entry = %entry.name, %value, unit = entry.format.unit());
        }
    }
}

async fn run(heat_pump: Arc<HeatPump>, config: &Config) -> Result<()> {
    let probed = heat_pump.probe().await;
    if probed.read == 0 {
        warn!(host = %config.host, "no register answered, polling anyway");
    }

    let mut cycles = heat_pump.subscribe();
    let polling = heat_pump.spawn_polling(config.scan_interval());
    loop {
        tokio::select! {
            changed = cycles.changed() => {
                if changed.is_err() {
                    break;
                }
                let outcome = *cycles.borrow_and_update();
                if let Some(outcome) = outcome {
                    report(&heat_pump, outcome);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
    polling.abort();
    Ok(())
}

async fn get(heat_pump: &HeatPump, name: &str) -> Result<()> {
    let indices = related_indices(heat_pump.catalog(), name)?;
    heat_pump.refresh_cycle(Some(&indices)).await;

    match heat_pump.current_value(name) {
        Some(value) => {
            let unit = heat_pump.catalog().get(name).map_or("", |entry| entry.format.unit());
            println!("{name} = {value} {unit}");
        }
        None => println!("{name} unavailable"),
    }
    Ok(())
}

async fn set(heat_pump: &HeatPump, name: &str, value: String) -> Result<()> {
    // bounds may depend on other entries
    let indices = related_indices(heat_pump.catalog(), name)?;
    heat_pump.refresh_cycle(Some(&indices)).await;

    let value = match value.parse::<f64>() {
        Ok(number) => Value::Number(number),
        Err(_) => Value::State(value),
    };
    match heat_pump
        .write_value(name, value)
        .await
        .with_context(|| format!("writing {name}"))?
    {
        Some(raw) => println!("{name} <- {raw}"),
        None => println!("{name} is read-only, nothing written"),
    }
    Ok(())
}

fn kind_name(kind: &Kind) -> &'static str {
    match kind {
        Kind::Sensor => "sensor",
        Kind::NumberReadOnly => "number_ro",
        Kind::Calculated(_) => "sensor_calc",
        Kind::Number(_) => "number",
        Kind::Select => "select",
    }
}

fn list(catalog: &Catalog) {
    for device in catalog.devices() {
        println!("[{device}]");
        for entry in catalog.by_device(device) {
            println!(
                "{:>7}  {:<12} {:<46} {}",
                entry.address,
                kind_name(&entry.kind),
                entry.name,
                entry.format.unit()
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    if let Command::List = args.command {
        list(&config.load_catalog()?);
        return Ok(());
    }

    let heat_pump = Arc::new(connect(&config).await?);
    match args.command {
        Command::Run => run(heat_pump, &config).await,
        Command::Get { name } => get(&heat_pump, &name).await,
        Command::Set { name, value } => set(&heat_pump, &name, value).await,
        Command::List => Ok(()),
    }
}
