use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

use crate::catalog::Catalog;
use crate::codec::RawValue;

/// Last observation of one catalog entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheEntry {
    /// `None` until the first successful read.
    pub raw_value: Option<RawValue>,
    /// The device refused the register when it was last probed.
    pub invalid: bool,
}

/// Last-known raw value per catalog entry, keyed by entry name.
///
/// Slots are created for every entry when the cache is built and are never
/// removed. Locks are held only for the duration of a single map access.
#[derive(Debug, Default)]
pub struct ValueCache {
    slots: RwLock<HashMap<String, CacheEntry>>,
}

impl ValueCache {
    pub fn new(catalog: &Catalog) -> Self {
        let slots = catalog
            .entries()
            .iter()
            .map(|entry| (entry.name.clone(), CacheEntry::default()))
            .collect();
        Self {
            slots: RwLock::new(slots),
        }
    }

    pub fn get(&self, name: &str) -> Option<RawValue> {
        self.entry(name).and_then(|entry| entry.raw_value)
    }

    /// Raw value used by derived values and dynamic bounds.
    pub fn get_raw(&self, name: &str) -> Option<RawValue> {
        self.get(name)
    }

    pub fn entry(&self, name: &str) -> Option<CacheEntry> {
        self.slots.read().get(name).copied()
    }

    pub fn is_invalid(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|entry| entry.invalid)
    }

    /// Overwrite the slot of `name`. Unknown names are ignored.
    pub fn set(&self, name: &str, raw_value: Option<RawValue>, invalid: bool) {
        if let Some(slot) = self.slots.write().get_mut(name) {
            trace!(entry = name, ?raw_value, invalid, "cache update");
            *slot = CacheEntry { raw_value, invalid };
        }
    }

    /// Copy of every slot.
    pub fn snapshot(&self) -> HashMap<String, CacheEntry> {
        self.slots.read().clone()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{CatalogEntry, Device, Format};
    use std::sync::Arc;

    fn cache() -> ValueCache {
        let catalog = Catalog::new(vec![
            CatalogEntry::sensor(30001, "outside_temperature", Format::Temperature, Device::System),
            CatalogEntry::sensor(30002, "air_intake_temperature", Format::Temperature, Device::System),
        ])
        .unwrap();
        ValueCache::new(&catalog)
    }

    #[test]
    fn slots_start_empty() {
        let cache = cache();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("outside_temperature"), None);
        assert!(!cache.is_invalid("outside_temperature"));
    }

    #[test]
    fn set_and_get() {
        let cache = cache();
        cache.set("outside_temperature", Some(-35), false);
        assert_eq!(cache.get("outside_temperature"), Some(-35));
        assert_eq!(cache.get_raw("outside_temperature"), Some(-35));

        cache.set("outside_temperature", None, true);
        assert_eq!(cache.get("outside_temperature"), None);
        assert!(cache.is_invalid("outside_temperature"));
    }

    #[test]
    fn unknown_names_are_ignored() {
        let cache = cache();
        cache.set("missing", Some(1), false);
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_writers_do_not_corrupt_slots() {
        let cache = Arc::new(cache());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for value in 0..500 {
                        cache.set("outside_temperature", Some(value), false);
                        cache.set("air_intake_temperature", Some(i), false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.get("outside_temperature"), Some(499));
        assert!(cache.get("air_intake_temperature").is_some_and(|v| (0..8).contains(&v)));
    }
}
