use tokio_modbus::client::{Reader, Writer};

use crate::codec::{self, Address, RawValue};
use crate::error::TransportError;
use crate::item::{CatalogEntry, RegisterType};

/// Read the single register backing `entry`.
///
/// Input registers back the read-only kinds, holding registers the writable ones.
pub async fn read_entry(client: &mut dyn Reader, entry: &CatalogEntry) -> Result<RawValue, TransportError> {
    let address = entry.address;
    let response = match entry.kind.register_type() {
        RegisterType::Input => client.read_input_registers(address, 1).await,
        RegisterType::Holding => client.read_holding_registers(address, 1).await,
    };
    let words = flatten(address, response)?;

    codec::decode(&words)
        .map_err(|err| TransportError::new(address, format!("expected 1 word, got {}", err.found)))
}

/// Write `value` into the holding register backing `entry`.
pub async fn write_entry(client: &mut dyn Writer, entry: &CatalogEntry, value: RawValue) -> Result<(), TransportError> {
    let address = entry.address;
    let response = client.write_single_register(address, codec::encode(value)).await;

    flatten(address, response)
}

fn flatten<T>(address: Address, response: tokio_modbus::Result<T>) -> Result<T, TransportError> {
    match response {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(exception)) => Err(TransportError::new(address, format!("exception response {exception:?}"))),
        Err(err) => Err(TransportError::new(address, err.to_string())),
    }
}
