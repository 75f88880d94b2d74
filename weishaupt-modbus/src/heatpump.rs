use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bounds::{self, Bounds};
use crate::cache::ValueCache;
use crate::catalog::Catalog;
use crate::codec::RawValue;
use crate::derived;
use crate::error::{Error, Result};
use crate::item::Kind;
use crate::poller::{Availability, CycleOutcome, Poller};
use crate::powermap::PowerMap;
use crate::transport::Transport;

const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Display value of an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    /// Translation key of an enumerated entry.
    State(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(value) => write!(f, "{value}"),
            Value::State(key) => f.write_str(key),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(key: &str) -> Self {
        Value::State(key.to_string())
    }
}

/// Caching core of one heat pump, as seen by the host.
///
/// Reads go through the poller into the value cache; the host only ever sees
/// cached values. Writes are validated against the current bounds, sent to the
/// device, and reflected in the cache once acknowledged.
pub struct HeatPump {
    catalog: Arc<Catalog>,
    cache: Arc<ValueCache>,
    transport: Arc<dyn Transport>,
    power_map: Option<Arc<dyn PowerMap>>,
    poller: Poller,
    cycles: watch::Sender<Option<CycleOutcome>>,
}

impl HeatPump {
    pub fn new(
        catalog: Catalog,
        transport: Arc<dyn Transport>,
        power_map: Option<Arc<dyn PowerMap>>,
        availability: Availability,
        cycle_timeout: Duration,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let cache = Arc::new(ValueCache::new(&catalog));
        let poller = Poller::new(
            catalog.clone(),
            cache.clone(),
            transport.clone(),
            availability,
            cycle_timeout,
        );
        let (cycles, _) = watch::channel(None);
        Self {
            catalog,
            cache,
            transport,
            power_map,
            poller,
            cycles,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cache(&self) -> &ValueCache {
        &self.cache
    }

    /// Notified with the outcome of every finished refresh cycle.
    pub fn subscribe(&self) -> watch::Receiver<Option<CycleOutcome>> {
        self.cycles.subscribe()
    }

    pub async fn refresh_cycle(&self, subset: Option<&[usize]>) -> CycleOutcome {
        let outcome = self.poller.refresh_cycle(subset).await;
        self.cycles.send_replace(Some(outcome));
        outcome
    }

    pub async fn probe(&self) -> CycleOutcome {
        self.poller.probe().await
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.poller.is_available(name)
    }

    /// Current limits of a writable number.
    pub fn bounds(&self, name: &str) -> Option<Bounds> {
        bounds::resolve(self.catalog.get(name)?, &self.cache)
    }

    /// Cached display value; `None` while unknown, unavailable or not computable.
    pub fn current_value(&self, name: &str) -> Option<Value> {
        let entry = self.catalog.get(name)?;
        if !self.is_available(name) {
            return None;
        }
        let raw = self.cache.get(name)?;
        if entry.is_enumerated() {
            return Some(Value::State(entry.state_of(raw).into_owned()));
        }
        derived::evaluate(entry, raw, &self.cache, self.power_map.as_deref()).map(Value::Number)
    }

    /// Write a display value and return the raw value sent to the device.
    ///
    /// Numbers must lie within the bounds resolved right now; selects take a
    /// translation key. Writes to read-only entries do nothing and return `Ok(None)`.
    pub async fn write_value(&self, name: &str, value: Value) -> Result<Option<RawValue>> {
        let entry = self
            .catalog
            .get(name)
            .ok_or_else(|| Error::UnknownEntry(name.to_string()))?;

        let raw = match (&entry.kind, value) {
            (Kind::Number(_), Value::Number(value)) => {
                if let Some(Bounds { min, max }) = bounds::resolve(entry, &self.cache)
                    .filter(|bounds| !bounds.contains(value))
                {
                    return Err(Error::OutOfRange {
                        name: name.to_string(),
                        value,
                        min,
                        max,
                    });
                }
                to_raw(name, value, entry.params.divider)?
            }
            (Kind::Select, Value::State(option)) => {
                entry
                    .number_of(&option)
                    .ok_or_else(|| Error::UnknownOption {
                        name: name.to_string(),
                        option,
                    })?
            }
            (Kind::Number(_) | Kind::Select, _) => return Err(Error::TypeMismatch(name.to_string())),
            (Kind::Sensor | Kind::NumberReadOnly | Kind::Calculated(_), _) => {
                debug!(entry = name, "ignoring write to read-only entry");
                return Ok(None);
            }
        };

        if let Err(err) = self.transport.write_raw(entry, raw).await {
            warn!(entry = name, raw, %err, "write failed");
            return Err(err.into());
        }
        self.cache.set(name, Some(raw), false);
        info!(entry = name, raw, "value written");
        Ok(Some(raw))
    }

    /// Run a refresh cycle every `period` until the handle is aborted.
    ///
    /// Cycles that overrun the period delay the next one instead of piling up.
    pub fn spawn_polling(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let heat_pump = Arc::clone(self);
        // interval() panics on a zero period
        let period = period.max(MIN_POLL_PERIOD);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_ms = period.as_millis() as u64, "polling started");

            loop {
                ticker.tick().await;
                let outcome = heat_pump.refresh_cycle(None).await;
                debug!(?outcome, "refresh cycle finished");
            }
        })
    }
}

/// Scale `value` into register units, rounding to the nearest unit.
fn to_raw(name: &str, value: f64, divider: f64) -> Result<RawValue> {
    let scaled = (value * divider).round();
    if scaled < f64::from(RawValue::MIN) || scaled > f64::from(RawValue::MAX) {
        return Err(Error::OutOfRange {
            name: name.to_string(),
            value,
            min: f64::from(RawValue::MIN) / divider,
            max: f64::from(RawValue::MAX) / divider,
        });
    }
    Ok(scaled as RawValue)
}
