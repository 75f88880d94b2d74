use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use weishaupt_modbus::poller::DEFAULT_CYCLE_TIMEOUT;
use weishaupt_modbus::simulator::{spawn_tcp_simulator, HeatPumpSimulator};
use weishaupt_modbus::{Availability, Catalog, HeatPump, ModbusTcpTransport, Transport, Value};

const TIMEOUT: Duration = Duration::from_millis(500);

async fn start(simulator: &HeatPumpSimulator) -> (ModbusTcpTransport, tokio::task::JoinHandle<()>) {
    let any_port: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let (socket_addr, handle) = spawn_tcp_simulator(any_port, simulator.clone()).await.unwrap();
    (ModbusTcpTransport::new(socket_addr, TIMEOUT), handle)
}

#[tokio::test]
async fn reads_input_and_holding_registers() {
    let catalog = Catalog::load().unwrap();
    let simulator = HeatPumpSimulator::from_catalog(&catalog);
    simulator.set_input(30001, -35);
    simulator.set_holding(42103, 500);
    let (transport, server) = start(&simulator).await;

    let outside = catalog.get("outside_temperature").unwrap();
    assert_eq!(transport.read_raw(outside).await.unwrap(), -35);
    let normal = catalog.get("hot_water_normal").unwrap();
    assert_eq!(transport.read_raw(normal).await.unwrap(), 500);

    server.abort();
}

#[tokio::test]
async fn writes_holding_register() {
    let catalog = Catalog::load().unwrap();
    let simulator = HeatPumpSimulator::from_catalog(&catalog);
    let (transport, server) = start(&simulator).await;

    let push = catalog.get("hot_water_push").unwrap();
    transport.write_raw(push, 1).await.unwrap();
    assert_eq!(simulator.holding(42102), Some(1));

    let outside = catalog.get("outside_temperature").unwrap();
    transport.write_raw(outside, 100).await.unwrap();
    assert_eq!(simulator.input(30001), Some(0));

    server.abort();
}

#[tokio::test]
async fn exception_response_is_a_transport_error() {
    let catalog = Catalog::load().unwrap();
    let simulator = HeatPumpSimulator::from_catalog(&catalog);
    simulator.fail(30002);
    let (transport, server) = start(&simulator).await;

    let intake = catalog.get("air_intake_temperature").unwrap();
    let err = transport.read_raw(intake).await.unwrap_err();
    assert_eq!(err.address, 30002);

    server.abort();
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let socket_addr = listener.local_addr().unwrap();
    drop(listener);

    let catalog = Catalog::load().unwrap();
    let transport = ModbusTcpTransport::new(socket_addr, TIMEOUT);
    let outside = catalog.get("outside_temperature").unwrap();
    assert!(transport.read_raw(outside).await.is_err());
}

#[tokio::test]
async fn heat_pump_round_trip_over_tcp() {
    let catalog = Catalog::load().unwrap();
    let simulator = HeatPumpSimulator::from_catalog(&catalog);
    simulator.set_input(30001, -35);
    simulator.set_input(30006, 5);
    simulator.set_input(33104, 352);
    simulator.set_input(33105, 301);
    simulator.set_holding(42103, 500);
    simulator.set_holding(42104, 400);
    simulator.fail(30002);
    let (transport, server) = start(&simulator).await;

    let heat_pump = HeatPump::new(
        catalog,
        Arc::new(transport),
        None,
        Availability::default(),
        DEFAULT_CYCLE_TIMEOUT,
    );
    heat_pump.probe().await;
    let outcome = heat_pump.refresh_cycle(None).await;
    assert_eq!(outcome.failed, 1);
    assert!(!outcome.timed_out);

    assert_eq!(heat_pump.current_value("outside_temperature"), Some(Value::Number(-3.5)));
    assert_eq!(heat_pump.current_value("operating_display"), Some(Value::from("heating")));
    assert_eq!(heat_pump.current_value("temperature_spread"), Some(Value::Number(5.1)));
    assert!(!heat_pump.is_available("air_intake_temperature"));
    assert!(!heat_pump.is_available("heating_circuit_2_room_setpoint"));

    let applied = heat_pump
        .write_value("hot_water_normal", Value::Number(55.0))
        .await
        .unwrap();
    assert_eq!(applied, Some(550));
    assert_eq!(simulator.holding(42103), Some(550));

    server.abort();
}
