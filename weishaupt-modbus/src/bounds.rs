use crate::cache::ValueCache;
use crate::item::{CatalogEntry, Kind};

/// Minimum used when neither a dynamic nor a fixed minimum is available.
pub const DEFAULT_MIN: f64 = -999_999.0;
/// Maximum used when neither a dynamic nor a fixed maximum is available.
pub const DEFAULT_MAX: f64 = 999_999.0;

/// Effective limits of a writable number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Resolve the limits of `entry` from the current cache contents.
///
/// A dynamic reference with a cached value wins; otherwise the fixed limit or
/// its default applies. Returns `None` for entries without a range.
pub fn resolve(entry: &CatalogEntry, cache: &ValueCache) -> Option<Bounds> {
    let Kind::Number(range) = &entry.kind else {
        return None;
    };
    let dynamic = |reference: &Option<String>| {
        reference
            .as_deref()
            .and_then(|name| cache.get_raw(name))
            .map(|raw| entry.scale(raw))
    };

    Some(Bounds {
        min: dynamic(&range.dynamic_min).or(range.min).unwrap_or(DEFAULT_MIN),
        max: dynamic(&range.dynamic_max).or(range.max).unwrap_or(DEFAULT_MAX),
    })
}
