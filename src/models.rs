//! Internal data-model types shared across adapters, `DataService`, and the
//! tool registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A normalized market observation produced by adapters for TAM/market-size
/// consumers. Raw pass-through is also permitted for data-source-direct tools
/// (those return `serde_json::Value` verbatim instead).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketObservation {
    pub value: Option<f64>,
    pub period: String,
    pub units: Option<String>,
    pub region: Option<String>,
    pub source_name: String,
    pub raw_source_key: String,
    pub confidence: Option<f64>,
}

/// Segmentation adjustment applied to a TAM calculation's final-year value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationAdjustment {
    pub factor: f64,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TamInput {
    pub base_market_size: f64,
    pub annual_growth_rate: f64,
    pub projection_years: u32,
    pub segmentation_adjustments: Option<SegmentationAdjustment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TamOutput {
    pub calculated_tam: f64,
    pub year_by_year: Vec<(u32, f64)>,
    pub assumptions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryCodes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub naics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Industry {
    pub industry_id: String,
    pub name: String,
    pub description: String,
    pub codes: IndustryCodes,
    pub geography: Option<String>,
    pub market_size: Option<f64>,
    pub currency: Option<String>,
    pub year: Option<i32>,
    pub source_details: Vec<String>,
    pub last_updated: Option<String>,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceError {
    pub source_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndustrySearchResult {
    pub results: Vec<Industry>,
    pub errors: Vec<SourceError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSizeEstimate {
    pub estimated_market_size: Option<f64>,
    pub currency: Option<String>,
    pub year: Option<i32>,
    pub data_sources_used: Vec<String>,
    pub confidence_score: Option<f64>,
    pub methodology_used: String,
}

/// Per-tool availability metadata computed at startup (and refreshed on
/// every `tools/list` call) by the `AvailabilityReporter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAvailability {
    pub tool_name: String,
    pub available: bool,
    pub missing_keys: Vec<String>,
    pub warnings: Vec<String>,
}

/// Outcome of classifying a raw upstream response. `NoData` and
/// `RateLimited` are cached with the null-sentinel; transport failures are
/// propagated but also cached with the null-sentinel. `TransportTimeout` is
/// split out from `TransportError` only because Alpha Vantage caches the
/// two under different TTLs — every other source treats them the same.
#[derive(Debug)]
pub enum Outcome {
    Success(Value),
    NoData,
    RateLimited,
    TransportError(anyhow::Error),
    TransportTimeout(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tam_output_serializes_year_by_year_as_pairs() {
        let out = TamOutput {
            calculated_tam: 100.0,
            year_by_year: vec![(1, 50.0), (2, 100.0)],
            assumptions: vec!["base=50".into()],
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["yearByYear"][0][0], 1);
        assert_eq!(json["yearByYear"][1][1], 100.0);
    }
}
