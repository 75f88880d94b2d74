use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::codec::{Address, RawValue};
use crate::error::ConfigError;

/// Physical meaning of a register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Temperature,
    Energy,
    Power,
    Percentage,
    Flow,
    TimeMinutes,
    TimeHours,
    Status,
    Number,
    Unitless,
}

impl Format {
    pub fn unit(&self) -> &'static str {
        match self {
            Format::Temperature => "°C",
            Format::Energy => "kWh",
            Format::Power => "W",
            Format::Percentage => "%",
            Format::Flow => "m³/h",
            Format::TimeMinutes => "min",
            Format::TimeHours => "h",
            Format::Status | Format::Number | Format::Unitless => "",
        }
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "temperature" => Format::Temperature,
            "energy" => Format::Energy,
            "power" => Format::Power,
            "percentage" => Format::Percentage,
            "flow" => Format::Flow,
            "time_minutes" => Format::TimeMinutes,
            "time_hours" => Format::TimeHours,
            "status" => Format::Status,
            "number" => Format::Number,
            "unitless" => Format::Unitless,
            _ => {
                return Err(ConfigError::UnknownVariant {
                    what: "format",
                    value: s.to_string(),
                })
            }
        })
    }
}

/// Logical device an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Device {
    System,
    HeatPump,
    HotWater,
    /// Heating circuit 1..=5. Circuits 2..=5 are optional.
    HeatingCircuit(u8),
    SecondHeatGenerator,
    Statistics,
    InputsOutputs,
    Unknown,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::System => write!(f, "system"),
            Device::HeatPump => write!(f, "heat_pump"),
            Device::HotWater => write!(f, "hot_water"),
            Device::HeatingCircuit(1) => write!(f, "heating_circuit"),
            Device::HeatingCircuit(n) => write!(f, "heating_circuit_{n}"),
            Device::SecondHeatGenerator => write!(f, "second_heat_generator"),
            Device::Statistics => write!(f, "statistics"),
            Device::InputsOutputs => write!(f, "inputs_outputs"),
            Device::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for Device {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ConfigError::UnknownVariant {
            what: "device",
            value: s.to_string(),
        };
        Ok(match s {
            "system" => Device::System,
            "heat_pump" => Device::HeatPump,
            "hot_water" => Device::HotWater,
            "heating_circuit" => Device::HeatingCircuit(1),
            "second_heat_generator" => Device::SecondHeatGenerator,
            "statistics" => Device::Statistics,
            "inputs_outputs" => Device::InputsOutputs,
            "unknown" => Device::Unknown,
            other => {
                let n = other
                    .strip_prefix("heating_circuit_")
                    .and_then(|n| n.parse::<u8>().ok())
                    .filter(|n| (1..=5).contains(n))
                    .ok_or_else(unknown)?;
                Device::HeatingCircuit(n)
            }
        })
    }
}

/// One row of an enumeration table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusItem {
    pub number: RawValue,
    pub translation_key: String,
    pub text: String,
}

impl StatusItem {
    pub fn new(number: RawValue, translation_key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            number,
            translation_key: translation_key.into(),
            text: text.into(),
        }
    }
}

/// Closed set of derived-value transforms.
///
/// Operands are names of other catalog entries, resolved through the value cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Calculation {
    Power { x: String, y: String },
    Quotient { denominator: String },
    Difference { diff_val: String },
}

impl Calculation {
    pub fn name(&self) -> &'static str {
        match self {
            Calculation::Power { .. } => "power",
            Calculation::Quotient { .. } => "quotient",
            Calculation::Difference { .. } => "difference",
        }
    }

    pub fn operands(&self) -> Vec<&str> {
        match self {
            Calculation::Power { x, y } => vec![x.as_str(), y.as_str()],
            Calculation::Quotient { denominator } => vec![denominator.as_str()],
            Calculation::Difference { diff_val } => vec![diff_val.as_str()],
        }
    }
}

/// Fixed and dynamic limits of a writable number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Entry whose current value is the minimum.
    pub dynamic_min: Option<String>,
    /// Entry whose current value is the maximum.
    pub dynamic_max: Option<String>,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Default::default()
        }
    }
}

/// How an entry is accessed and presented.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Sensor,
    NumberReadOnly,
    Calculated(Option<Calculation>),
    Number(Range),
    Select,
}

/// Which register table backs an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterType {
    Input,
    Holding,
}

impl Kind {
    pub fn is_writable(&self) -> bool {
        matches!(self, Kind::Number(_) | Kind::Select)
    }

    pub fn register_type(&self) -> RegisterType {
        if self.is_writable() {
            RegisterType::Holding
        } else {
            RegisterType::Input
        }
    }
}

/// Scaling and presentation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    /// Raw value divided by this gives the display value.
    pub divider: f64,
    pub step: f64,
    /// Decimals kept by derived values.
    pub precision: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            divider: 1.0,
            step: 1.0,
            precision: 2,
        }
    }
}

/// Static definition of one addressable quantity of the heat pump.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub address: Address,
    pub name: String,
    pub format: Format,
    pub kind: Kind,
    pub device: Device,
    pub states: Option<Vec<StatusItem>>,
    pub params: Params,
}

impl CatalogEntry {
    pub fn new(address: Address, name: impl Into<String>, format: Format, kind: Kind, device: Device) -> Self {
        Self {
            address,
            name: name.into(),
            format,
            kind,
            device,
            states: None,
            params: Params::default(),
        }
    }

    /// Read-only input register.
    pub fn sensor(address: Address, name: impl Into<String>, format: Format, device: Device) -> Self {
        Self::new(address, name, format, Kind::Sensor, device)
    }

    /// Read-only number shown like a setting.
    pub fn number_ro(address: Address, name: impl Into<String>, format: Format, device: Device) -> Self {
        Self::new(address, name, format, Kind::NumberReadOnly, device)
    }

    /// Input register combined with other entries.
    pub fn calculated(
        address: Address,
        name: impl Into<String>,
        format: Format,
        device: Device,
        calculation: Calculation,
    ) -> Self {
        Self::new(address, name, format, Kind::Calculated(Some(calculation)), device)
    }

    /// Writable holding register.
    pub fn number(address: Address, name: impl Into<String>, format: Format, device: Device, range: Range) -> Self {
        Self::new(address, name, format, Kind::Number(range), device)
    }

    /// Writable holding register with an enumeration of options.
    pub fn select(address: Address, name: impl Into<String>, device: Device, states: Vec<StatusItem>) -> Self {
        Self::new(address, name, Format::Status, Kind::Select, device).with_states(states)
    }

    pub fn with_states(mut self, states: Vec<StatusItem>) -> Self {
        self.states = Some(states);
        self
    }

    pub fn with_divider(mut self, divider: f64) -> Self {
        self.params.divider = divider;
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.params.step = step;
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.params.precision = precision;
        self
    }

    /// Whether raw values translate to symbolic states.
    pub fn is_enumerated(&self) -> bool {
        self.format == Format::Status || self.kind == Kind::Select
    }

    /// Translation key of `raw`, or `unknown <raw>` when the table lacks it.
    pub fn state_of(&self, raw: RawValue) -> Cow<'_, str> {
        self.states
            .iter()
            .flatten()
            .find(|item| item.number == raw)
            .map(|item| Cow::Borrowed(item.translation_key.as_str()))
            .unwrap_or_else(|| Cow::Owned(format!("unknown <{raw}>")))
    }

    /// Raw value of a translation key.
    pub fn number_of(&self, translation_key: &str) -> Option<RawValue> {
        self.states
            .iter()
            .flatten()
            .find(|item| item.translation_key == translation_key)
            .map(|item| item.number)
    }

    /// Names of other entries this one reads at use time.
    pub fn references(&self) -> Vec<&str> {
        match &self.kind {
            Kind::Calculated(Some(calculation)) => calculation.operands(),
            Kind::Number(range) => range
                .dynamic_min
                .iter()
                .chain(range.dynamic_max.iter())
                .map(String::as_str)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn scale(&self, raw: RawValue) -> f64 {
        f64::from(raw) / self.params.divider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operating_mode() -> CatalogEntry {
        CatalogEntry::select(
            41103,
            "heating_circuit_mode",
            Device::HeatingCircuit(1),
            vec![
                StatusItem::new(0, "automatic", "Automatik"),
                StatusItem::new(1, "comfort", "Komfort"),
                StatusItem::new(2, "normal", "Normal"),
            ],
        )
    }

    #[test]
    fn translates_known_states_both_ways() {
        let entry = operating_mode();
        assert_eq!(entry.state_of(1), "comfort");
        assert_eq!(entry.number_of("normal"), Some(2));
        assert_eq!(entry.number_of("party"), None);
    }

    #[test]
    fn unknown_raw_falls_back_to_sentinel() {
        let entry = operating_mode();
        assert_eq!(entry.state_of(42), "unknown <42>");
    }

    #[test]
    fn writable_kinds_use_holding_registers() {
        assert_eq!(operating_mode().kind.register_type(), RegisterType::Holding);
        let sensor = CatalogEntry::sensor(30001, "outside_temperature", Format::Temperature, Device::System);
        assert_eq!(sensor.kind.register_type(), RegisterType::Input);
        let calc = CatalogEntry::new(33104, "spread", Format::Temperature, Kind::Calculated(None), Device::HeatPump);
        assert_eq!(calc.kind.register_type(), RegisterType::Input);
    }

    #[test]
    fn device_names_round_trip() {
        for device in [
            Device::System,
            Device::HeatingCircuit(1),
            Device::HeatingCircuit(4),
            Device::SecondHeatGenerator,
        ] {
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
        assert!("heating_circuit_9".parse::<Device>().is_err());
    }

    #[test]
    fn references_cover_bounds_and_operands() {
        let range = Range {
            dynamic_min: Some("hot_water_reduced".to_string()),
            dynamic_max: Some("hot_water_max".to_string()),
            ..Default::default()
        };
        let entry = CatalogEntry::number(42103, "hot_water_normal", Format::Temperature, Device::HotWater, range);
        assert_eq!(entry.references(), vec!["hot_water_reduced", "hot_water_max"]);
    }
}
