use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::builtin;
use crate::codec::{Address, RawValue};
use crate::error::ConfigError;
use crate::item::{Calculation, CatalogEntry, Device, Format, Kind, Params, Range, StatusItem};

/// Immutable, validated set of catalog entries in device order.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Validate `entries` and build the name index.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateName(entry.name.clone()));
            }
        }

        for entry in &entries {
            if entry.states.is_some() != entry.is_enumerated() {
                return Err(ConfigError::Enumeration(entry.name.clone()));
            }
            if entry.params.divider == 0.0 || !entry.params.divider.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    entry: entry.name.clone(),
                    parameter: "divider",
                });
            }
            for reference in entry.references() {
                if !index.contains_key(reference) {
                    return Err(ConfigError::UnknownReference {
                        entry: entry.name.clone(),
                        reference: reference.to_string(),
                    });
                }
            }
        }

        Ok(Self { entries, index })
    }

    /// Built-in register map of the Weishaupt WBB heat pumps.
    pub fn load() -> Result<Self, ConfigError> {
        let catalog = Self::new(builtin::entries())?;
        info!(entries = catalog.len(), "loaded built-in catalog");
        Ok(catalog)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_toml_str(&content)?;
        info!(entries = catalog.len(), path = %path.display(), "loaded catalog file");
        Ok(catalog)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = toml::from_str(content)?;
        let entries = file
            .entries
            .into_iter()
            .map(CatalogEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.index_of(name).map(|i| &self.entries[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Devices in the order they first appear.
    pub fn devices(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = Vec::new();
        for entry in &self.entries {
            if !devices.contains(&entry.device) {
                devices.push(entry.device);
            }
        }
        devices
    }

    pub fn by_device(&self, device: Device) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |entry| entry.device == device)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(rename = "entry", default)]
    entries: Vec<EntryDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryDef {
    address: Address,
    name: String,
    format: String,
    kind: String,
    device: String,
    #[serde(default)]
    states: Vec<StateDef>,
    #[serde(default)]
    params: ParamsDef,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StateDef {
    number: RawValue,
    key: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamsDef {
    divider: Option<f64>,
    step: Option<f64>,
    precision: Option<u32>,
    min: Option<f64>,
    max: Option<f64>,
    dynamic_min: Option<String>,
    dynamic_max: Option<String>,
    calculation_type: Option<String>,
    x: Option<String>,
    y: Option<String>,
    denominator: Option<String>,
    diff_val: Option<String>,
}

impl ParamsDef {
    fn calculation(&mut self, entry: &str) -> Result<Option<Calculation>, ConfigError> {
        let Some(calculation) = self.calculation_type.take() else {
            return Ok(None);
        };
        let operand = |value: Option<String>, operand: &'static str| {
            value.ok_or_else(|| ConfigError::MissingOperand {
                entry: entry.to_string(),
                calculation: calculation.clone(),
                operand,
            })
        };
        let parsed = match calculation.as_str() {
            "power" => Calculation::Power {
                x: operand(self.x.take(), "x")?,
                y: operand(self.y.take(), "y")?,
            },
            "quotient" => Calculation::Quotient {
                denominator: operand(self.denominator.take(), "denominator")?,
            },
            "difference" => Calculation::Difference {
                diff_val: operand(self.diff_val.take(), "diff_val")?,
            },
            _ => {
                return Err(ConfigError::UnknownCalculation {
                    entry: entry.to_string(),
                    calculation: calculation.clone(),
                })
            }
        };
        Ok(Some(parsed))
    }

    fn has_range(&self) -> bool {
        self.min.is_some() || self.max.is_some() || self.dynamic_min.is_some() || self.dynamic_max.is_some()
    }
}

impl TryFrom<EntryDef> for CatalogEntry {
    type Error = ConfigError;

    fn try_from(def: EntryDef) -> Result<Self, Self::Error> {
        let EntryDef {
            address,
            name,
            format,
            kind,
            device,
            states,
            mut params,
        } = def;
        let invalid = |parameter: &'static str| ConfigError::InvalidParameter {
            entry: name.clone(),
            parameter,
        };

        let calculation = params.calculation(&name)?;
        if calculation.is_some() && kind != "sensor_calc" {
            return Err(invalid("calculation_type"));
        }
        if params.has_range() && kind != "number" {
            return Err(invalid("min/max"));
        }

        let kind = match kind.as_str() {
            "sensor" => Kind::Sensor,
            "number_ro" => Kind::NumberReadOnly,
            "sensor_calc" => Kind::Calculated(calculation),
            "number" => Kind::Number(Range {
                min: params.min,
                max: params.max,
                dynamic_min: params.dynamic_min.take(),
                dynamic_max: params.dynamic_max.take(),
            }),
            "select" => Kind::Select,
            _ => {
                return Err(ConfigError::UnknownVariant {
                    what: "kind",
                    value: kind.clone(),
                })
            }
        };

        let defaults = Params::default();
        let states = (!states.is_empty()).then(|| {
            states
                .into_iter()
                .map(|state| StatusItem::new(state.number, state.key, state.text))
                .collect()
        });

        Ok(CatalogEntry {
            address,
            format: format.parse::<Format>()?,
            kind,
            device: device.parse::<Device>()?,
            states,
            params: Params {
                divider: params.divider.unwrap_or(defaults.divider),
                step: params.step.unwrap_or(defaults.step),
                precision: params.precision.unwrap_or(defaults.precision),
            },
            name,
        })
    }
}
