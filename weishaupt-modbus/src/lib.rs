//! Polling and caching core for Weishaupt heat pumps, based on [tokio-modbus](https://github.com/slowtec/tokio-modbus).

//! ## Overview
//!
//! The heat pump exposes its state as single 16-bit registers. This library
//!
//! - describes them in a [`catalog::Catalog`] of named entries grouped by device,
//! - reads them periodically through a [`transport::Transport`] into a [`cache::ValueCache`],
//! - derives higher-level values (heating power, temperature spread, performance factor) from cached values, and
//! - validates writes against bounds that may follow other entries' current values.
//!
//! [`heatpump::HeatPump`] ties everything together and is the only type a host needs.
//!
//! ## Catalog entries
//!
//! Entries are built in code with [`item::CatalogEntry`] constructors or loaded from a TOML file.
//! Each `[[entry]]` table **must** contain
//! - `address` - register address, `u16` integer,
//! - `name` - unique name, also used to reference the entry from other entries,
//! - `format` - one of `"temperature"`, `"energy"`, `"power"`, `"percentage"`, `"flow"`, `"time_minutes"`, `"time_hours"`, `"status"`, `"number"` or `"unitless"`,
//! - `kind` - one of `"sensor"`, `"number_ro"`, `"sensor_calc"`, `"number"` or `"select"`,
//! - `device` - logical device, e.g. `"hot_water"` or `"heating_circuit_2"`.
//!
//! Status and select entries **must** also carry `states`, a list of `{ number, key, text }` tables.
//!
//! The optional `params` table **can** contain
//! - `divider` - divide the stored value by it to get the actual value (default `1`),
//! - `step` and `precision` - presentation hints (default `1` and `2`),
//! - `min`, `max` - fixed limits of a `number` entry,
//! - `dynamic_min`, `dynamic_max` - names of entries whose current value is the limit,
//! - `calculation_type` - `"power"` (with `x` and `y`), `"quotient"` (with `denominator`) or `"difference"` (with `diff_val`).

/// Effective limits of writable numbers
pub mod bounds;
mod builtin;
/// Last-known raw value of every entry
pub mod cache;
/// Register map
pub mod catalog;
/// Register word conversion
pub mod codec;
/// Host configuration
pub mod config;
/// Register-level reads and writes over any tokio-modbus client
pub mod core;
/// Derived-value engine
pub mod derived;
pub mod error;
/// Host-facing facade
pub mod heatpump;
/// Catalog entry definitions
pub mod item;
/// Refresh cycles and availability probing
pub mod poller;
/// Heating power map
pub mod powermap;
/// Transport abstraction and the Modbus TCP implementation
pub mod transport;

/// Simulated heat pump serving a catalog over Modbus TCP, for tests and local development.
#[cfg(feature = "simulator")]
pub mod simulator;

pub use catalog::Catalog;
pub use config::Config;
pub use error::{ConfigError, Error, Result, TransportError};
pub use heatpump::{HeatPump, Value};
pub use poller::{Availability, CycleOutcome};
pub use transport::{ModbusTcpTransport, Transport};
