//! Register map of the Weishaupt WBB heat pumps.

use crate::item::{Calculation, CatalogEntry, Device, Format, Range, StatusItem};

fn states(items: &[(i16, &str, &str)]) -> Vec<StatusItem> {
    items
        .iter()
        .map(|(number, key, text)| StatusItem::new(*number, *key, *text))
        .collect()
}

fn off_on() -> Vec<StatusItem> {
    states(&[(0, "off", "Aus"), (1, "on", "An")])
}

fn temperature(address: u16, name: &str, device: Device) -> CatalogEntry {
    CatalogEntry::sensor(address, name, Format::Temperature, device)
        .with_divider(10.0)
        .with_precision(1)
}

fn setpoint(address: u16, name: impl Into<String>, device: Device, range: Range) -> CatalogEntry {
    CatalogEntry::number(address, name, Format::Temperature, device, range)
        .with_divider(10.0)
        .with_step(0.5)
        .with_precision(1)
}

fn system() -> Vec<CatalogEntry> {
    let device = Device::System;
    vec![
        temperature(30001, "outside_temperature", device),
        temperature(30002, "air_intake_temperature", device),
        CatalogEntry::sensor(30003, "error", Format::Status, device)
            .with_states(states(&[(-1, "no_error", "Kein Fehler")])),
        CatalogEntry::sensor(30004, "warning", Format::Status, device)
            .with_states(states(&[(-1, "no_warning", "Keine Warnung")])),
        CatalogEntry::sensor(30005, "error_free", Format::Status, device).with_states(states(&[
            (0, "error", "Fehler"),
            (1, "no_error", "Fehlerfrei"),
        ])),
        CatalogEntry::sensor(30006, "operating_display", Format::Status, device).with_states(states(&[
            (0, "undefined", "Undefiniert"),
            (1, "relay_test", "Relaistest"),
            (2, "emergency_stop", "Notaus"),
            (3, "diagnostics", "Diagnose"),
            (4, "manual_mode", "Handmodus"),
            (5, "heating", "Heizen"),
            (6, "cooling", "Kühlen"),
            (7, "hot_water", "Warmwasser"),
            (8, "pool", "Schwimmbad"),
            (9, "defrost", "Abtauen"),
            (10, "standby", "Standby"),
        ])),
        CatalogEntry::select(
            40001,
            "system_operating_mode",
            device,
            states(&[
                (0, "automatic", "Automatik"),
                (1, "heating", "Heizen"),
                (2, "cooling", "Kühlen"),
                (3, "summer", "Sommer"),
                (4, "standby", "Standby"),
                (5, "second_heat_generator", "2. WEZ"),
            ]),
        ),
    ]
}

fn heat_pump() -> Vec<CatalogEntry> {
    let device = Device::HeatPump;
    vec![
        CatalogEntry::sensor(33101, "heat_pump_operation", Format::Status, device).with_states(states(&[
            (0, "off", "Aus"),
            (1, "heating", "Heizen"),
            (2, "hot_water", "Warmwasser"),
            (3, "cooling", "Kühlen"),
            (4, "defrost", "Abtauen"),
        ])),
        CatalogEntry::sensor(33102, "heat_pump_fault", Format::Status, device).with_states(off_on()),
        CatalogEntry::sensor(33103, "power_request", Format::Percentage, device),
        temperature(33104, "flow_temperature", device),
        temperature(33105, "return_temperature", device),
        CatalogEntry::calculated(
            33103,
            "heating_power",
            Format::Power,
            device,
            Calculation::Power {
                x: "outside_temperature".to_string(),
                y: "flow_temperature".to_string(),
            },
        )
        .with_precision(0),
        CatalogEntry::calculated(
            33104,
            "temperature_spread",
            Format::Temperature,
            device,
            Calculation::Difference {
                diff_val: "return_temperature".to_string(),
            },
        )
        .with_divider(10.0)
        .with_precision(1),
        CatalogEntry::select(
            43101,
            "heat_pump_configuration",
            device,
            states(&[(0, "off", "Aus"), (1, "automatic", "Automatik")]),
        ),
    ]
}

fn hot_water() -> Vec<CatalogEntry> {
    let device = Device::HotWater;
    vec![
        temperature(32101, "hot_water_setpoint", device),
        temperature(32102, "hot_water_temperature", device),
        CatalogEntry::select(
            42101,
            "hot_water_configuration",
            device,
            states(&[
                (0, "off", "Aus"),
                (1, "sensor", "Temperaturfühler"),
                (2, "thermostat", "Thermostat"),
            ]),
        ),
        CatalogEntry::select(42102, "hot_water_push", device, off_on()),
        setpoint(
            42103,
            "hot_water_normal",
            device,
            Range {
                dynamic_min: Some("hot_water_reduced".to_string()),
                ..Range::new(30.0, 65.0)
            },
        ),
        setpoint(
            42104,
            "hot_water_reduced",
            device,
            Range {
                dynamic_max: Some("hot_water_normal".to_string()),
                ..Range::new(10.0, 65.0)
            },
        ),
    ]
}

/// Entries of heating circuit `n`; register blocks repeat every hundred addresses.
fn heating_circuit(n: u8) -> Vec<CatalogEntry> {
    let device = Device::HeatingCircuit(n);
    let input = 31001 + 100 * u16::from(n);
    let holding = 41001 + 100 * u16::from(n);
    let name = |suffix: &str| format!("{device}_{suffix}");
    let comfort = name("comfort_temperature");
    let normal = name("normal_temperature");
    let setback = name("setback_temperature");

    vec![
        temperature(input, &name("room_setpoint"), device),
        temperature(input + 1, &name("room_temperature"), device),
        CatalogEntry::sensor(input + 2, name("room_humidity"), Format::Percentage, device),
        temperature(input + 3, &name("flow_setpoint"), device),
        temperature(input + 4, &name("flow_temperature"), device),
        CatalogEntry::select(
            holding,
            name("operating_mode"),
            device,
            states(&[
                (0, "automatic", "Automatik"),
                (1, "comfort", "Komfort"),
                (2, "normal", "Normal"),
                (3, "setback", "Absenkbetrieb"),
                (4, "standby", "Standby"),
            ]),
        ),
        setpoint(
            holding + 2,
            comfort.clone(),
            device,
            Range {
                dynamic_min: Some(normal.clone()),
                ..Range::new(10.0, 35.0)
            },
        ),
        setpoint(
            holding + 3,
            normal.clone(),
            device,
            Range {
                dynamic_min: Some(setback.clone()),
                dynamic_max: Some(comfort),
                ..Range::new(10.0, 35.0)
            },
        ),
        setpoint(
            holding + 4,
            setback,
            device,
            Range {
                dynamic_max: Some(normal),
                ..Range::new(10.0, 35.0)
            },
        ),
        CatalogEntry::number(
            holding + 5,
            name("heating_curve"),
            Format::Unitless,
            device,
            Range::new(0.2, 3.5),
        )
        .with_divider(100.0)
        .with_step(0.05),
    ]
}

fn second_heat_generator() -> Vec<CatalogEntry> {
    let device = Device::SecondHeatGenerator;
    vec![
        CatalogEntry::sensor(34101, "second_heat_generator_status", Format::Status, device)
            .with_states(off_on()),
        CatalogEntry::number_ro(34102, "electric_heater_hours", Format::TimeHours, device),
        CatalogEntry::select(
            44101,
            "second_heat_generator_configuration",
            device,
            states(&[
                (0, "off", "Aus"),
                (1, "electric", "Elektrisch"),
                (2, "boiler", "Kessel"),
            ]),
        ),
        CatalogEntry::number(
            44102,
            "bivalence_temperature",
            Format::Temperature,
            device,
            Range::new(-20.0, 10.0),
        )
        .with_divider(10.0)
        .with_step(0.5),
    ]
}

fn inputs_outputs() -> Vec<CatalogEntry> {
    let device = Device::InputsOutputs;
    vec![
        CatalogEntry::sensor(37101, "utility_lock", Format::Status, device).with_states(off_on()),
        CatalogEntry::sensor(37102, "circulation_pump", Format::Status, device).with_states(off_on()),
        CatalogEntry::sensor(37103, "heating_pump_flow", Format::Flow, device).with_divider(100.0),
    ]
}

fn statistics() -> Vec<CatalogEntry> {
    let device = Device::Statistics;
    vec![
        CatalogEntry::sensor(36101, "total_energy_today", Format::Energy, device),
        CatalogEntry::sensor(36102, "total_energy_year", Format::Energy, device),
        CatalogEntry::sensor(36201, "heating_energy_today", Format::Energy, device),
        CatalogEntry::sensor(36301, "hot_water_energy_today", Format::Energy, device),
        CatalogEntry::sensor(36701, "electric_energy_today", Format::Energy, device),
        CatalogEntry::calculated(
            36101,
            "performance_factor_today",
            Format::Number,
            device,
            Calculation::Quotient {
                denominator: "electric_energy_today".to_string(),
            },
        ),
        CatalogEntry::number_ro(36801, "compressor_runtime", Format::TimeHours, device),
    ]
}

/// All entries grouped by device.
pub fn entries() -> Vec<CatalogEntry> {
    let mut entries = system();
    entries.extend(heat_pump());
    entries.extend(hot_water());
    for n in 1..=5 {
        entries.extend(heating_circuit(n));
    }
    entries.extend(second_heat_generator());
    entries.extend(inputs_outputs());
    entries.extend(statistics());
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuits_use_their_own_register_block() {
        let second = heating_circuit(2);
        assert_eq!(second[0].address, 31201);
        assert_eq!(second[0].name, "heating_circuit_2_room_setpoint");
        assert_eq!(second[5].address, 41201);
        assert_eq!(heating_circuit(1)[1].name, "heating_circuit_room_temperature");
    }

    #[test]
    fn setback_is_bounded_by_normal() {
        let circuit = heating_circuit(3);
        let setback = circuit
            .iter()
            .find(|entry| entry.name == "heating_circuit_3_setback_temperature")
            .unwrap();
        assert_eq!(
            setback.references(),
            vec!["heating_circuit_3_normal_temperature"]
        );
    }
}
