use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::prelude::*;
use tracing::debug;

use crate::codec::{Address, RawValue};
use crate::core;
use crate::error::TransportError;
use crate::item::CatalogEntry;

/// Unit id of the heat pump on the bus.
pub const UNIT_ID: u8 = 1;

#[async_trait]
/// Single-register access to the heat pump.
pub trait Transport: Send + Sync {
    async fn read_raw(&self, entry: &CatalogEntry) -> Result<RawValue, TransportError>;

    /// Silently ignored for read-only kinds.
    async fn write_raw(&self, entry: &CatalogEntry, value: RawValue) -> Result<(), TransportError>;
}

/// Modbus TCP transport opening a fresh connection for every request.
///
/// Requests are serialised; the device is not asked to handle concurrent clients.
#[derive(Debug)]
pub struct ModbusTcpTransport {
    socket_addr: SocketAddr,
    timeout: Duration,
    bus: Mutex<()>,
}

impl ModbusTcpTransport {
    pub fn new(socket_addr: SocketAddr, timeout: Duration) -> Self {
        Self {
            socket_addr,
            timeout,
            bus: Mutex::new(()),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.socket_addr
    }

    async fn connect(&self, address: Address) -> Result<Context, TransportError> {
        match timeout(self.timeout, tcp::connect_slave(self.socket_addr, Slave(UNIT_ID))).await {
            Ok(Ok(ctx)) => Ok(ctx),
            Ok(Err(err)) => Err(TransportError::new(
                address,
                format!("connect to {}: {err}", self.socket_addr),
            )),
            Err(_) => Err(TransportError::new(address, "connect timed out")),
        }
    }
}

async fn close(mut ctx: Context) {
    if let Err(err) = ctx.disconnect().await {
        debug!(%err, "disconnect failed");
    }
}

#[async_trait]
impl Transport for ModbusTcpTransport {
    async fn read_raw(&self, entry: &CatalogEntry) -> Result<RawValue, TransportError> {
        let _bus = self.bus.lock().await;
        let mut ctx = self.connect(entry.address).await?;
        let result = match timeout(self.timeout, core::read_entry(&mut ctx, entry)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::new(entry.address, "request timed out")),
        };
        close(ctx).await;

        debug!(entry = %entry.name, address = entry.address, ?result, "read");
        result
    }

    async fn write_raw(&self, entry: &CatalogEntry, value: RawValue) -> Result<(), TransportError> {
        if !entry.kind.is_writable() {
            debug!(entry = %entry.name, "ignoring write to read-only entry");
            return Ok(());
        }

        let _bus = self.bus.lock().await;
        let mut ctx = self.connect(entry.address).await?;
        let result = match timeout(self.timeout, core::write_entry(&mut ctx, entry, value)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::new(entry.address, "request timed out")),
        };
        close(ctx).await;

        debug!(entry = %entry.name, address = entry.address, value, ?result, "write");
        result
    }
}
