use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::ValueCache;
use crate::catalog::Catalog;
use crate::error::ConfigError;
use crate::item::{CatalogEntry, Device};
use crate::transport::Transport;

/// Default bound on a whole refresh cycle.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Which optional sub-devices are installed.
///
/// Heating circuit 1 is always present; circuits 2..=5 are polled only when enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Availability {
    heating_circuits: BTreeSet<u8>,
}

impl Availability {
    pub fn new(heating_circuits: impl IntoIterator<Item = u8>) -> Result<Self, ConfigError> {
        let heating_circuits = heating_circuits
            .into_iter()
            .map(|n| {
                if (2..=5).contains(&n) {
                    Ok(n)
                } else {
                    Err(ConfigError::InvalidCircuit(n))
                }
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { heating_circuits })
    }

    /// Every optional circuit enabled.
    pub fn all() -> Self {
        Self {
            heating_circuits: (2..=5).collect(),
        }
    }

    pub fn is_enabled(&self, device: Device) -> bool {
        match device {
            Device::HeatingCircuit(n) if n >= 2 => self.heating_circuits.contains(&n),
            _ => true,
        }
    }
}

/// Tally of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub read: usize,
    pub failed: usize,
    /// Disabled sub-devices and unknown indices.
    pub skipped: usize,
    /// The cycle hit its timeout; entries not reached keep their previous value.
    pub timed_out: bool,
}

/// Drives the transport over the catalog and stores results in the cache.
pub struct Poller {
    catalog: Arc<Catalog>,
    cache: Arc<ValueCache>,
    transport: Arc<dyn Transport>,
    availability: Availability,
    cycle_timeout: Duration,
}

impl Poller {
    pub fn new(
        catalog: Arc<Catalog>,
        cache: Arc<ValueCache>,
        transport: Arc<dyn Transport>,
        availability: Availability,
        cycle_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            cache,
            transport,
            availability,
            cycle_timeout,
        }
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    /// Known, on an enabled sub-device and not refused by the device.
    pub fn is_available(&self, name: &str) -> bool {
        self.catalog
            .get(name)
            .is_some_and(|entry| self.availability.is_enabled(entry.device) && !self.cache.is_invalid(name))
    }

    /// Read the entries at `subset` (all entries when `None` or empty) in catalog order.
    ///
    /// A failed read leaves the entry's cached value untouched and does not stop
    /// the cycle. The whole cycle is bounded by the cycle timeout.
    pub async fn refresh_cycle(&self, subset: Option<&[usize]>) -> CycleOutcome {
        let indices: Vec<usize> = match subset {
            Some(subset) if !subset.is_empty() => subset.to_vec(),
            _ => (0..self.catalog.len()).collect(),
        };
        let mut outcome = CycleOutcome::default();

        if timeout(self.cycle_timeout, self.refresh_entries(&indices, &mut outcome))
            .await
            .is_err()
        {
            outcome.timed_out = true;
            warn!(
                timeout_ms = self.cycle_timeout.as_millis() as u64,
                read = outcome.read,
                failed = outcome.failed,
                "refresh cycle timed out"
            );
        }
        outcome
    }

    async fn refresh_entries(&self, indices: &[usize], outcome: &mut CycleOutcome) {
        for &index in indices {
            let Some(entry) = self.catalog.entry(index) else {
                warn!(index, "no catalog entry at index");
                outcome.skipped += 1;
                continue;
            };
            if !self.availability.is_enabled(entry.device) {
                outcome.skipped += 1;
                continue;
            }
            match self.transport.read_raw(entry).await {
                Ok(raw) => {
                    self.cache.set(&entry.name, Some(raw), false);
                    outcome.read += 1;
                }
                Err(err) => {
                    debug!(entry = %entry.name, %err, "read failed, keeping last value");
                    outcome.failed += 1;
                }
            }
        }
    }

    /// Read every enabled entry once and mark the ones the device refuses as invalid.
    pub async fn probe(&self) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();
        for entry in self.catalog.entries() {
            if !self.availability.is_enabled(entry.device) {
                outcome.skipped += 1;
                continue;
            }
            self.probe_entry(entry, &mut outcome).await;
        }
        info!(
            available = outcome.read,
            unavailable = outcome.failed,
            "probed registers"
        );
        outcome
    }

    async fn probe_entry(&self, entry: &CatalogEntry, outcome: &mut CycleOutcome) {
        match self.transport.read_raw(entry).await {
            Ok(raw) => {
                self.cache.set(&entry.name, Some(raw), false);
                outcome.read += 1;
            }
            Err(err) => {
                warn!(entry = %entry.name, %err, "register unavailable");
                self.cache.set(&entry.name, None, true);
                outcome.failed += 1;
            }
        }
    }
}
