use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;

/// Two-dimensional heating power table.
pub trait PowerMap: Send + Sync {
    /// Power available at raw operands `x` (outside temperature) and `y` (flow temperature).
    fn map(&self, x: f64, y: f64) -> f64;
}

fn default_axis_divider() -> f64 {
    10.0
}

/// Power grid sampled over outside and flow temperature.
///
/// `power[j][i]` is the power at `x[i]`, `y[j]`. Lookups between samples are
/// interpolated bilinearly; lookups outside the grid use the nearest edge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridPowerMap {
    x: Vec<f64>,
    y: Vec<f64>,
    power: Vec<Vec<f64>>,
    /// Operands are divided by this before the lookup.
    #[serde(default = "default_axis_divider")]
    axis_divider: f64,
}

impl GridPowerMap {
    pub fn new(x: Vec<f64>, y: Vec<f64>, power: Vec<Vec<f64>>, axis_divider: f64) -> Result<Self, ConfigError> {
        let map = Self {
            x,
            y,
            power,
            axis_divider,
        };
        map.validate()?;
        Ok(map)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let map: Self = serde_json::from_str(content)?;
        map.validate()?;
        Ok(map)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let map = Self::from_json_str(&content)?;
        info!(x = map.x.len(), y = map.y.len(), path = %path.display(), "loaded power map");
        Ok(map)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ascending = |axis: &[f64]| !axis.is_empty() && axis.windows(2).all(|w| w[0] < w[1]);
        if !ascending(&self.x) {
            return Err(ConfigError::PowerMap("x axis must be non-empty and strictly ascending"));
        }
        if !ascending(&self.y) {
            return Err(ConfigError::PowerMap("y axis must be non-empty and strictly ascending"));
        }
        if self.power.len() != self.y.len() || self.power.iter().any(|row| row.len() != self.x.len()) {
            return Err(ConfigError::PowerMap("power grid must have one row per y and one column per x"));
        }
        if self.axis_divider == 0.0 || !self.axis_divider.is_finite() {
            return Err(ConfigError::PowerMap("axis_divider must be non-zero"));
        }
        Ok(())
    }
}

/// Lower and upper sample index around `value` and the weight of the upper one.
fn locate(axis: &[f64], value: f64) -> (usize, usize, f64) {
    let last = axis.len() - 1;
    if value.is_nan() || value <= axis[0] {
        return (0, 0, 0.0);
    }
    if value >= axis[last] {
        return (last, last, 0.0);
    }
    let upper = axis.partition_point(|&sample| sample <= value);
    let lower = upper - 1;
    (lower, upper, (value - axis[lower]) / (axis[upper] - axis[lower]))
}

impl PowerMap for GridPowerMap {
    fn map(&self, x: f64, y: f64) -> f64 {
        let (x0, x1, tx) = locate(&self.x, x / self.axis_divider);
        let (y0, y1, ty) = locate(&self.y, y / self.axis_divider);
        let at = |i: usize, j: usize| self.power[j][i];

        let low = at(x0, y0) + (at(x1, y0) - at(x0, y0)) * tx;
        let high = at(x0, y1) + (at(x1, y1) - at(x0, y1)) * tx;
        low + (high - low) * ty
    }
}
