//! At startup (and on every `tools/list`), cross-references each tool's
//! declared adapter dependencies against `DataService`'s live
//! `isAvailable()`/`missingKeys()`/`warnings()` to produce per-tool
//! availability metadata.

use crate::adapters::AdapterAvailability;
use crate::data_service::DataService;
use crate::models::ToolAvailability;
use crate::tools::registry::{self, ToolSpec};

pub struct AvailabilityReporter<'a> {
    service: &'a DataService,
}

impl<'a> AvailabilityReporter<'a> {
    pub fn new(service: &'a DataService) -> Self {
        Self { service }
    }

    fn adapter_availability(&self, name: &str) -> (bool, Vec<String>, Vec<String>) {
        macro_rules! probe {
            ($adapter:expr) => {
                ($adapter.is_available(), $adapter.missing_keys(), $adapter.warnings())
            };
        }
        match name {
            "AlphaVantage" => probe!(self.service.alpha_vantage),
            "Bls" => probe!(self.service.bls),
            "Census" => probe!(self.service.census),
            "Fred" => probe!(self.service.fred),
            "Imf" => probe!(self.service.imf),
            "Nasdaq" => probe!(self.service.nasdaq),
            "Oecd" => probe!(self.service.oecd),
            "WorldBank" => probe!(self.service.world_bank),
            other => {
                tracing::warn!(adapter = other, "unknown adapter name in tool registry");
                (false, vec![format!("unknown adapter {other}")], Vec::new())
            }
        }
    }

    pub fn tool_availability(&self, spec: &ToolSpec) -> ToolAvailability {
        if spec.adapters.is_empty() {
            return ToolAvailability {
                tool_name: spec.name.to_string(),
                available: true,
                missing_keys: Vec::new(),
                warnings: Vec::new(),
            };
        }

        let mut available = true;
        let mut missing_keys = Vec::new();
        let mut warnings = Vec::new();
        for name in spec.adapters {
            let (adapter_available, missing, warn) = self.adapter_availability(name);
            available &= adapter_available;
            missing_keys.extend(missing);
            warnings.extend(warn);
        }

        ToolAvailability {
            tool_name: spec.name.to_string(),
            available,
            missing_keys,
            warnings,
        }
    }

    pub fn report_all(&self) -> Vec<ToolAvailability> {
        registry::all().iter().map(|spec| self.tool_availability(spec)).collect()
    }

    /// Describes a tool's availability as a human-readable suffix for
    /// `tools/list` descriptions, e.g. `" (unavailable: missing FRED_API_KEY)"`.
    pub fn description_suffix(availability: &ToolAvailability) -> String {
        if availability.available {
            if availability.warnings.is_empty() {
                String::new()
            } else {
                format!(" ({})", availability.warnings.join("; "))
            }
        } else {
            format!(" (unavailable: missing {})", availability.missing_keys.join(", "))
        }
    }

    pub fn log_startup_summary(&self) {
        let report = self.report_all();
        let enabled = report.iter().filter(|t| t.available).count();
        let total = report.len();
        tracing::info!(enabled, total, "{enabled}/{total} services enabled");
        for tool in report.iter().filter(|t| !t.available) {
            tracing::warn!(tool = tool.tool_name, missing_keys = ?tool.missing_keys, "tool unavailable at startup");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::config::Settings;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn pure_analytical_tool_is_always_available() {
        let settings = Settings::from_map(HashMap::new());
        let service = DataService::new(&settings, Arc::new(Cache::new()));
        let reporter = AvailabilityReporter::new(&service);
        let spec = registry::find("tam_calculator").unwrap();
        let availability = reporter.tool_availability(spec);
        assert!(availability.available);
        assert!(availability.missing_keys.is_empty());
    }

    #[test]
    fn tool_depending_on_missing_key_is_unavailable() {
        let settings = Settings::from_map(HashMap::new());
        let service = DataService::new(&settings, Arc::new(Cache::new()));
        let reporter = AvailabilityReporter::new(&service);
        let spec = registry::find("fred_getSeriesObservations").unwrap();
        let availability = reporter.tool_availability(spec);
        assert!(!availability.available);
        assert_eq!(availability.missing_keys, vec!["FRED_API_KEY"]);
    }

    #[test]
    fn description_suffix_names_missing_keys() {
        let availability = ToolAvailability {
            tool_name: "fred_getSeriesObservations".to_string(),
            available: false,
            missing_keys: vec!["FRED_API_KEY".to_string()],
            warnings: Vec::new(),
        };
        let suffix = AvailabilityReporter::description_suffix(&availability);
        assert!(suffix.contains("FRED_API_KEY"));
    }

    #[test]
    fn multi_adapter_tool_is_unavailable_if_any_dependency_is_missing() {
        let settings = Settings::from_map(HashMap::new());
        let service = DataService::new(&settings, Arc::new(Cache::new()));
        let reporter = AvailabilityReporter::new(&service);
        let spec = registry::find("industry_search").unwrap();
        let availability = reporter.tool_availability(spec);
        // AlphaVantage needs a key; Census/WorldBank don't. Any missing
        // dependency makes the whole tool unavailable.
        assert!(!availability.available);
    }
}
