use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use futures::future;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};
use tokio_modbus::{ExceptionCode, Request, Response};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::codec::{self, Address, Quantity, RawValue, Word};
use crate::item::RegisterType;

#[derive(Debug, Clone, Default)]
/// One register table of the simulated device.
pub struct Registers(HashMap<Address, Word>);

impl Registers {
    /// Insert consecutive registers with `words` starting at `addr`.
    pub fn insert(&mut self, addr: Address, words: Vec<Word>) {
        self.0
            .extend(words.into_iter().enumerate().map(|(i, word)| (addr + i as Address, word)));
    }

    pub fn get(&self, addr: Address) -> Option<Word> {
        self.0.get(&addr).copied()
    }

    /// Read `cnt` consecutive registers; any missing one fails the whole request.
    pub fn read(&self, addr: Address, cnt: Quantity) -> Result<Vec<Word>, ExceptionCode> {
        (0..cnt)
            .map(|offset| {
                addr.checked_add(offset)
                    .and_then(|addr| self.get(addr))
                    .ok_or(ExceptionCode::IllegalDataAddress)
            })
            .collect()
    }

    /// Overwrite existing consecutive registers; nothing is written if one is missing.
    pub fn write(&mut self, addr: Address, words: &[Word]) -> Result<(), ExceptionCode> {
        let addrs = (0..words.len())
            .map(|offset| {
                Address::try_from(offset)
                    .ok()
                    .and_then(|offset| addr.checked_add(offset))
                    .filter(|addr| self.0.contains_key(addr))
                    .ok_or(ExceptionCode::IllegalDataAddress)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.0.extend(addrs.into_iter().zip(words.iter().copied()));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    input: Registers,
    holding: Registers,
    failing: HashSet<Address>,
}

impl State {
    fn touches_failing(&self, addr: Address, cnt: usize) -> bool {
        (0..cnt).any(|offset| {
            Address::try_from(offset)
                .ok()
                .and_then(|offset| addr.checked_add(offset))
                .is_some_and(|addr| self.failing.contains(&addr))
        })
    }

    fn handle(&mut self, req: Request<'static>) -> Result<Response, ExceptionCode> {
        match req {
            Request::ReadInputRegisters(addr, cnt) => {
                self.check(addr, cnt.into())?;
                self.input.read(addr, cnt).map(Response::ReadInputRegisters)
            }
            Request::ReadHoldingRegisters(addr, cnt) => {
                self.check(addr, cnt.into())?;
                self.holding.read(addr, cnt).map(Response::ReadHoldingRegisters)
            }
            Request::WriteSingleRegister(addr, word) => {
                self.check(addr, 1)?;
                self.holding
                    .write(addr, std::slice::from_ref(&word))
                    .map(|_| Response::WriteSingleRegister(addr, word))
            }
            _ => {
                warn!(?req, "unsupported function code");
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }

    fn check(&self, addr: Address, cnt: usize) -> Result<(), ExceptionCode> {
        if self.touches_failing(addr, cnt) {
            Err(ExceptionCode::ServerDeviceFailure)
        } else {
            Ok(())
        }
    }
}

/// In-process Modbus device exposing the registers of a catalog.
///
/// Clones share the same register tables, so a test can keep one handle to
/// change values while the server owns another.
#[derive(Debug, Clone, Default)]
pub struct HeatPumpSimulator(Arc<Mutex<State>>);

impl HeatPumpSimulator {
    /// Every catalog entry gets a zeroed register in the table it is read from.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut state = State::default();
        for entry in catalog.entries() {
            let table = match entry.kind.register_type() {
                RegisterType::Input => &mut state.input,
                RegisterType::Holding => &mut state.holding,
            };
            table.insert(entry.address, vec![0]);
        }
        Self(Arc::new(Mutex::new(state)))
    }

    pub fn set_input(&self, addr: Address, value: RawValue) {
        self.0.lock().input.insert(addr, vec![codec::encode(value)]);
    }

    pub fn set_holding(&self, addr: Address, value: RawValue) {
        self.0.lock().holding.insert(addr, vec![codec::encode(value)]);
    }

    pub fn input(&self, addr: Address) -> Option<RawValue> {
        let word = self.0.lock().input.get(addr)?;
        codec::decode(&[word]).ok()
    }

    pub fn holding(&self, addr: Address) -> Option<RawValue> {
        let word = self.0.lock().holding.get(addr)?;
        codec::decode(&[word]).ok()
    }

    /// Answer every request touching `addr` with a device failure exception.
    pub fn fail(&self, addr: Address) {
        self.0.lock().failing.insert(addr);
    }

    pub fn recover(&self, addr: Address) {
        self.0.lock().failing.remove(&addr);
    }
}

impl tokio_modbus::server::Service for HeatPumpSimulator {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        debug!(?req, "simulator request");
        future::ready(self.0.lock().handle(req))
    }
}

/// Serve `simulator` over Modbus TCP until the handle is aborted.
///
/// Binding to port 0 picks a free port; the bound address is returned.
pub async fn spawn_tcp_simulator(
    socket_addr: SocketAddr,
    simulator: HeatPumpSimulator,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(socket_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(%local_addr, "simulator listening");

    let handle = tokio::spawn(async move {
        let server = Server::new(listener);
        let new_service = |_socket_addr| Ok(Some(simulator.clone()));
        let on_connected = |stream, socket_addr| async move {
            accept_tcp_connection(stream, socket_addr, new_service)
        };
        let on_process_error = |err| {
            warn!(%err, "simulator connection failed");
        };
        if let Err(err) = server.serve(&on_connected, on_process_error).await {
            warn!(%err, "simulator stopped");
        }
    });
    Ok((local_addr, handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_read_and_write_whole_blocks() {
        let mut registers = Registers::default();
        registers.insert(100, vec![1, 2, 3]);

        assert_eq!(registers.read(100, 3), Ok(vec![1, 2, 3]));
        assert_eq!(registers.read(102, 2), Err(ExceptionCode::IllegalDataAddress));

        assert_eq!(registers.write(101, &[7, 8]), Ok(()));
        assert_eq!(registers.read(100, 3), Ok(vec![1, 7, 8]));
        assert_eq!(registers.write(102, &[9, 9]), Err(ExceptionCode::IllegalDataAddress));
        assert_eq!(registers.get(102), Some(8));
    }

    #[test]
    fn negative_values_survive_the_register_table() {
        let simulator = HeatPumpSimulator::default();
        simulator.set_input(30001, -35);
        assert_eq!(simulator.input(30001), Some(-35));
        assert_eq!(simulator.holding(30001), None);
    }

    #[test]
    fn failing_addresses_raise_device_failure() {
        let simulator = HeatPumpSimulator::default();
        simulator.set_holding(40001, 1);
        simulator.fail(40001);

        let mut state = simulator.0.lock();
        assert_eq!(
            state.handle(Request::ReadHoldingRegisters(40001, 1)),
            Err(ExceptionCode::ServerDeviceFailure)
        );
        state.failing.clear();
        assert_eq!(
            state.handle(Request::WriteSingleRegister(40001, 3)),
            Ok(Response::WriteSingleRegister(40001, 3))
        );
        assert_eq!(state.holding.get(40001), Some(3));
    }

    #[test]
    fn only_single_register_functions_are_served() {
        let simulator = HeatPumpSimulator::default();
        simulator.set_holding(40001, 1);

        let mut state = simulator.0.lock();
        assert_eq!(
            state.handle(Request::WriteMultipleRegisters(40001, vec![2].into())),
            Err(ExceptionCode::IllegalFunction)
        );
        assert_eq!(state.holding.get(40001), Some(1));
    }
}
