//! Per-source adapters. Each adapter owns its API key, base URL, and HTTP
//! client, classifies raw upstream responses into `models::Outcome`, and
//! exposes `is_available()` for the availability reporter. Fetch method
//! shapes differ per source (series lookup, symbol overview, table query),
//! so adapters are plain structs rather than implementations of one forced
//! uniform trait.

pub mod alpha_vantage;
pub mod bls;
pub mod census;
pub mod fred;
pub mod imf;
pub mod nasdaq;
pub mod oecd;
pub mod world_bank;

use std::collections::BTreeMap;

/// Availability metadata every adapter exposes, independent of its
/// source-specific fetch methods.
pub trait AdapterAvailability {
    fn is_available(&self) -> bool;
    /// Env var names this adapter needs but doesn't have. Empty when
    /// available or when the source needs no secret at all.
    fn missing_keys(&self) -> Vec<String>;
    /// Soft constraints worth surfacing even when the adapter is available
    /// (e.g. "anonymous access, series cap applies").
    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Builds a stable cache key from an operation name and a flat set of
/// parameters, sorting parameter keys so insertion order never changes the
/// key. Every adapter and `DataService` entry point that hits the cache goes
/// through this one builder.
pub fn cache_key(op: &str, params: &[(&str, &str)]) -> String {
    let sorted: BTreeMap<&str, &str> = params.iter().copied().collect();
    let mut key = String::from(op);
    for (k, v) in sorted {
        key.push(':');
        key.push_str(k);
        key.push('=');
        key.push_str(v);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_regardless_of_param_order() {
        let a = cache_key("fred:series", &[("series_id", "GDPC1"), ("units", "lin")]);
        let b = cache_key("fred:series", &[("units", "lin"), ("series_id", "GDPC1")]);
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_differs_by_op() {
        let a = cache_key("fred:series", &[("series_id", "GDPC1")]);
        let b = cache_key("bls:series", &[("series_id", "GDPC1")]);
        assert_ne!(a, b);
    }
}
