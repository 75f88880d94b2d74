use crate::cache::ValueCache;
use crate::codec::RawValue;
use crate::item::{Calculation, CatalogEntry, Format, Kind};
use crate::powermap::PowerMap;

/// Round half away from zero to `precision` decimals.
pub fn round(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Display value of `entry` given its own raw register value.
///
/// Calculated entries combine `raw` with operands looked up in `cache`; any
/// other kind is simply scaled. `None` means the value cannot be computed yet
/// (missing operand, zero denominator, no power map) and is not an error.
pub fn evaluate(
    entry: &CatalogEntry,
    raw: RawValue,
    cache: &ValueCache,
    power_map: Option<&dyn PowerMap>,
) -> Option<f64> {
    let v0 = entry.scale(raw);
    let calculation = match &entry.kind {
        Kind::Calculated(Some(calculation)) => calculation,
        Kind::Calculated(None) => return None,
        _ => return Some(v0),
    };
    let precision = entry.params.precision;

    let value = match calculation {
        Calculation::Power { x, y } => {
            let x = cache.get_raw(x)?;
            let y = cache.get_raw(y)?;
            if entry.format == Format::Power {
                (v0 / 100.0) * power_map?.map(f64::from(x), f64::from(y))
            } else {
                v0
            }
        }
        Calculation::Quotient { denominator } => match cache.get_raw(denominator)? {
            0 => return None,
            denominator => v0 / f64::from(denominator),
        },
        Calculation::Difference { diff_val } => {
            let diff = cache.get_raw(diff_val)?;
            v0 - entry.scale(diff)
        }
    };
    Some(round(value, precision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::item::Device;

    struct Flat(f64);

    impl PowerMap for Flat {
        fn map(&self, _x: f64, _y: f64) -> f64 {
            self.0
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            CatalogEntry::sensor(30001, "outside_temperature", Format::Temperature, Device::System)
                .with_divider(10.0),
            CatalogEntry::sensor(33104, "flow_temperature", Format::Temperature, Device::HeatPump)
                .with_divider(10.0),
            CatalogEntry::sensor(33105, "return_temperature", Format::Temperature, Device::HeatPump)
                .with_divider(10.0),
            CatalogEntry::sensor(36701, "electric_energy_today", Format::Energy, Device::Statistics),
            CatalogEntry::calculated(
                33103,
                "heating_power",
                Format::Power,
                Device::HeatPump,
                Calculation::Power {
                    x: "outside_temperature".to_string(),
                    y: "flow_temperature".to_string(),
                },
            )
            .with_precision(0),
            CatalogEntry::calculated(
                36101,
                "performance_factor",
                Format::Number,
                Device::Statistics,
                Calculation::Quotient {
                    denominator: "electric_energy_today".to_string(),
                },
            )
            .with_divider(10.0),
            CatalogEntry::calculated(
                33104,
                "temperature_spread",
                Format::Temperature,
                Device::HeatPump,
                Calculation::Difference {
                    diff_val: "return_temperature".to_string(),
                },
            )
            .with_divider(10.0),
            CatalogEntry::new(33106, "unconfigured", Format::Number, Kind::Calculated(None), Device::HeatPump),
        ])
        .unwrap()
    }

    #[test]
    fn rounds_to_precision() {
        assert_eq!(round(3.14159, 2), 3.14);
        assert_eq!(round(2.5, 0), 3.0);
        assert_eq!(round(-1.25, 1), -1.3);
    }

    #[test]
    fn quotient() {
        let catalog = catalog();
        let cache = ValueCache::new(&catalog);
        let entry = catalog.get("performance_factor").unwrap();

        assert_eq!(evaluate(entry, 500, &cache, None), None);
        cache.set("electric_energy_today", Some(5), false);
        assert_eq!(evaluate(entry, 500, &cache, None), Some(10.0));
        cache.set("electric_energy_today", Some(0), false);
        assert_eq!(evaluate(entry, 500, &cache, None), None);
    }

    #[test]
    fn difference() {
        let catalog = catalog();
        let cache = ValueCache::new(&catalog);
        let entry = catalog.get("temperature_spread").unwrap();

        assert_eq!(evaluate(entry, 300, &cache, None), None);
        cache.set("return_temperature", Some(100), false);
        assert_eq!(evaluate(entry, 300, &cache, None), Some(20.0));
    }

    #[test]
    fn power_needs_both_operands_and_a_map() {
        let catalog = catalog();
        let cache = ValueCache::new(&catalog);
        let entry = catalog.get("heating_power").unwrap();
        let map = Flat(8000.0);

        cache.set("outside_temperature", Some(-50), false);
        assert_eq!(evaluate(entry, 50, &cache, Some(&map)), None);
        cache.set("flow_temperature", Some(350), false);
        assert_eq!(evaluate(entry, 50, &cache, None), None);
        assert_eq!(evaluate(entry, 50, &cache, Some(&map)), Some(4000.0));
    }

    #[test]
    fn power_without_power_format_passes_value_through() {
        let catalog = catalog();
        let cache = ValueCache::new(&catalog);
        let mut entry = catalog.get("heating_power").unwrap().clone();
        entry.format = Format::Percentage;
        cache.set("outside_temperature", Some(-50), false);
        cache.set("flow_temperature", Some(350), false);

        assert_eq!(evaluate(&entry, 42, &cache, None), Some(42.0));
    }

    #[test]
    fn unconfigured_calculation_is_always_unavailable() {
        let catalog = catalog();
        let cache = ValueCache::new(&catalog);
        assert_eq!(evaluate(catalog.get("unconfigured").unwrap(), 7, &cache, None), None);
    }

    #[test]
    fn plain_entries_are_scaled() {
        let catalog = catalog();
        let cache = ValueCache::new(&catalog);
        assert_eq!(
            evaluate(catalog.get("outside_temperature").unwrap(), -35, &cache, None),
            Some(-3.5)
        );
    }
}
