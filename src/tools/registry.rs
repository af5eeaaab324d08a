//! The build-time-constant tool catalog: one `ToolSpec` per tool name,
//! carrying its description, argument schema, and the adapters it depends
//! on (used by the availability reporter). Schemas are declared once here
//! and shared by `tools/list` projection and the dispatcher's validation
//! pass.

use crate::tools::schema::{ArgumentSchema, FieldSpec};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolId {
    AlphaVantageGetCompanyOverview,
    AlphaVantageSearchSymbols,
    BlsGetSeriesData,
    CensusFetchIndustryData,
    CensusFetchMarketSize,
    FredGetSeriesObservations,
    ImfGetDataset,
    ImfGetLatestObservation,
    NasdaqGetDatasetTimeSeries,
    NasdaqGetLatestDatasetValue,
    OecdGetDataset,
    OecdGetLatestObservation,
    WorldBankGetIndicatorData,

    IndustrySearch,
    TamCalculator,
    MarketSizeCalculator,
    CompanyFinancialsRetriever,

    IndustryAnalysis,
    IndustryData,
    MarketSize,
    TamAnalysis,
    SamCalculator,
    MarketSegments,
    MarketForecasting,
    MarketComparison,
    DataValidation,
    MarketOpportunities,
    GenericDataQuery,
}

pub struct ToolSpec {
    pub id: ToolId,
    pub name: &'static str,
    pub description: &'static str,
    pub schema: ArgumentSchema,
    /// Adapter names this tool depends on; empty means always available
    /// (pure analytical tools with no upstream dependency).
    pub adapters: &'static [&'static str],
}

pub fn find(name: &str) -> Option<&'static ToolSpec> {
    REGISTRY.iter().find(|t| t.name == name)
}

pub fn all() -> &'static [ToolSpec] {
    &REGISTRY
}

fn obj(fields: Vec<FieldSpec>) -> ArgumentSchema {
    ArgumentSchema::object(fields)
}

fn field(name: &'static str, schema: ArgumentSchema, required: bool) -> FieldSpec {
    FieldSpec { name, schema, required }
}

static REGISTRY: LazyLock<Vec<ToolSpec>> = LazyLock::new(|| {
    vec![
        ToolSpec {
            id: ToolId::AlphaVantageGetCompanyOverview,
            name: "alphaVantage_getCompanyOverview",
            description: "Fetch Alpha Vantage company overview (market cap, sector, industry).",
            schema: obj(vec![field("symbol", ArgumentSchema::string(Some("AAPL")), false)]),
            adapters: &["AlphaVantage"],
        },
        ToolSpec {
            id: ToolId::AlphaVantageSearchSymbols,
            name: "alphaVantage_searchSymbols",
            description: "Search for ticker symbols by company name or keyword.",
            schema: obj(vec![field("keywords", ArgumentSchema::string(None), true)]),
            adapters: &["AlphaVantage"],
        },
        ToolSpec {
            id: ToolId::BlsGetSeriesData,
            name: "bls_getSeriesData",
            description: "Fetch one or more BLS time series by series ID.",
            schema: obj(vec![
                field("seriesIds", ArgumentSchema::string_array(None), true),
                field("startYear", ArgumentSchema::string(None), false),
                field("endYear", ArgumentSchema::string(None), false),
            ]),
            adapters: &["Bls"],
        },
        ToolSpec {
            id: ToolId::CensusFetchIndustryData,
            name: "census_fetchIndustryData",
            description: "Fetch raw Census variables for a geography and year.",
            schema: obj(vec![
                field("year", ArgumentSchema::integer(Some(2022)), false),
                field("datasetPath", ArgumentSchema::string(Some("cbp")), false),
                field("variables", ArgumentSchema::string_array(None), true),
                field("forGeography", ArgumentSchema::string(Some("us:*")), false),
            ]),
            adapters: &["Census"],
        },
        ToolSpec {
            id: ToolId::CensusFetchMarketSize,
            name: "census_fetchMarketSize",
            description: "Fetch County Business Patterns employment/payroll/establishment counts for a NAICS code.",
            schema: obj(vec![
                field("year", ArgumentSchema::integer(Some(2022)), false),
                field("naicsCode", ArgumentSchema::string(None), true),
                field("variable", ArgumentSchema::string_enum("EMP", &["EMP", "PAYANN", "ESTAB"]), false),
                field("forGeography", ArgumentSchema::string(Some("us:*")), false),
            ]),
            adapters: &["Census"],
        },
        ToolSpec {
            id: ToolId::FredGetSeriesObservations,
            name: "fred_getSeriesObservations",
            description: "Fetch FRED economic time series observations.",
            schema: obj(vec![
                field("seriesId", ArgumentSchema::string(Some("GDP")), false),
                field("observationStart", ArgumentSchema::string(None), false),
                field("observationEnd", ArgumentSchema::string(None), false),
                field("limit", ArgumentSchema::integer_range(Some(100), 1, 100_000), false),
                field("sortOrder", ArgumentSchema::string_enum("desc", &["asc", "desc"]), false),
            ]),
            adapters: &["Fred"],
        },
        ToolSpec {
            id: ToolId::ImfGetDataset,
            name: "imf_getDataset",
            description: "Fetch an IMF SDMX dataset by dataflow and key.",
            schema: obj(vec![
                field("dataflowId", ArgumentSchema::string(Some("IFS")), false),
                field("key", ArgumentSchema::string(None), true),
                field("startPeriod", ArgumentSchema::string(None), false),
                field("endPeriod", ArgumentSchema::string(None), false),
            ]),
            adapters: &["Imf"],
        },
        ToolSpec {
            id: ToolId::ImfGetLatestObservation,
            name: "imf_getLatestObservation",
            description: "Fetch the most recent observation from an IMF SDMX dataset.",
            schema: obj(vec![
                field("dataflowId", ArgumentSchema::string(Some("IFS")), false),
                field("key", ArgumentSchema::string(None), true),
            ]),
            adapters: &["Imf"],
        },
        ToolSpec {
            id: ToolId::NasdaqGetDatasetTimeSeries,
            name: "nasdaq_getDatasetTimeSeries",
            description: "Fetch a Nasdaq Data Link dataset time series.",
            schema: obj(vec![
                field("databaseCode", ArgumentSchema::string(Some("WIKI")), false),
                field("datasetCode", ArgumentSchema::string(None), true),
                field("limit", ArgumentSchema::integer(None), false),
                field("order", ArgumentSchema::string_enum("desc", &["asc", "desc"]), false),
                field("startDate", ArgumentSchema::string(None), false),
                field("endDate", ArgumentSchema::string(None), false),
                field("collapse", ArgumentSchema::string(None), false),
            ]),
            adapters: &["Nasdaq"],
        },
        ToolSpec {
            id: ToolId::NasdaqGetLatestDatasetValue,
            name: "nasdaq_getLatestDatasetValue",
            description: "Fetch the most recent row of a Nasdaq Data Link dataset.",
            schema: obj(vec![
                field("databaseCode", ArgumentSchema::string(Some("WIKI")), false),
                field("datasetCode", ArgumentSchema::string(None), true),
            ]),
            adapters: &["Nasdaq"],
        },
        ToolSpec {
            id: ToolId::OecdGetDataset,
            name: "oecd_getDataset",
            description: "Fetch an OECD SDMX dataset by dataset ID and filter expression.",
            schema: obj(vec![
                field("datasetId", ArgumentSchema::string(Some("QNA")), false),
                field("filterExpression", ArgumentSchema::string(None), true),
                field("startPeriod", ArgumentSchema::string(None), false),
                field("endPeriod", ArgumentSchema::string(None), false),
            ]),
            adapters: &["Oecd"],
        },
        ToolSpec {
            id: ToolId::OecdGetLatestObservation,
            name: "oecd_getLatestObservation",
            description: "Fetch the most recent observation from an OECD SDMX dataset.",
            schema: obj(vec![
                field("datasetId", ArgumentSchema::string(Some("QNA")), false),
                field("filterExpression", ArgumentSchema::string(None), true),
            ]),
            adapters: &["Oecd"],
        },
        ToolSpec {
            id: ToolId::WorldBankGetIndicatorData,
            name: "worldBank_getIndicatorData",
            description: "Fetch a World Bank indicator series for a country.",
            schema: obj(vec![
                field("countryCode", ArgumentSchema::string(Some("US")), false),
                field("indicator", ArgumentSchema::string(Some("NY.GDP.MKTP.CD")), false),
                field("dateRange", ArgumentSchema::string(None), false),
                field("perPage", ArgumentSchema::integer(Some(20)), false),
            ]),
            adapters: &["WorldBank"],
        },
        ToolSpec {
            id: ToolId::IndustrySearch,
            name: "industry_search",
            description: "Search industries by name/description across configured sources.",
            schema: obj(vec![
                field("query", ArgumentSchema::string(None), true),
                field("sources", ArgumentSchema::string_array(None), false),
                field("limit", ArgumentSchema::integer_range(Some(10), 1, 100), false),
                field("minRelevanceScore", ArgumentSchema::number_range(Some(0.1), 0.0, 1.0), false),
                field("geographyFilter", ArgumentSchema::string(None), false),
            ]),
            adapters: &["AlphaVantage", "Census", "WorldBank"],
        },
        ToolSpec {
            id: ToolId::TamCalculator,
            name: "tam_calculator",
            description: "Compute total addressable market projections from a base size and growth rate.",
            schema: tam_input_schema(),
            adapters: &[],
        },
        ToolSpec {
            id: ToolId::MarketSizeCalculator,
            name: "market_size_calculator",
            description: "Estimate market size by routing to the best-fit upstream source.",
            schema: market_size_input_schema(),
            adapters: &["AlphaVantage", "Census", "WorldBank", "Fred"],
        },
        ToolSpec {
            id: ToolId::CompanyFinancialsRetriever,
            name: "company_financials_retriever",
            description: "Retrieve company financial statements (overview, income, balance sheet, cash flow).",
            schema: obj(vec![
                field("companySymbol", ArgumentSchema::string(Some("AAPL")), false),
                field("statementType", ArgumentSchema::string_enum("overview", &["overview", "income_statement", "balance_sheet", "cash_flow"]), false),
                field("period", ArgumentSchema::string_enum("annual", &["annual", "quarterly"]), false),
                field("limit", ArgumentSchema::integer_range(Some(5), 1, 50), false),
            ]),
            adapters: &["AlphaVantage"],
        },
        ToolSpec {
            id: ToolId::IndustryAnalysis,
            name: "industry_analysis",
            description: "Deeper industry search with codes and source attribution, for analyst workflows.",
            schema: obj(vec![
                field("query", ArgumentSchema::string(None), true),
                field("sources", ArgumentSchema::string_array(None), false),
                field("limit", ArgumentSchema::integer_range(Some(10), 1, 100), false),
                field("minRelevanceScore", ArgumentSchema::number_range(Some(0.1), 0.0, 1.0), false),
            ]),
            adapters: &["AlphaVantage", "Census", "WorldBank"],
        },
        ToolSpec {
            id: ToolId::IndustryData,
            name: "industry_data",
            description: "Fetch County Business Patterns counts for a NAICS industry code.",
            schema: obj(vec![
                field("industryCode", ArgumentSchema::string(None), true),
                field("year", ArgumentSchema::integer(Some(2022)), false),
                field("forGeography", ArgumentSchema::string(Some("us:*")), false),
            ]),
            adapters: &["Census"],
        },
        ToolSpec {
            id: ToolId::MarketSize,
            name: "market_size",
            description: "Alias of market_size_calculator for business-analyst tool naming.",
            schema: market_size_input_schema(),
            adapters: &["AlphaVantage", "Census", "WorldBank", "Fred"],
        },
        ToolSpec {
            id: ToolId::TamAnalysis,
            name: "tam_analysis",
            description: "Alias of tam_calculator that additionally surfaces intermediate assumptions for review.",
            schema: tam_input_schema(),
            adapters: &[],
        },
        ToolSpec {
            id: ToolId::SamCalculator,
            name: "sam_calculator",
            description: "Compute serviceable addressable market from TAM and a target segment percentage.",
            schema: obj(vec![
                field("totalAddressableMarket", ArgumentSchema::number(Some(10_000_000_000.0)), true),
                field("targetSegmentPercentage", ArgumentSchema::number_range(Some(0.2), 0.0, 1.0), false),
            ]),
            adapters: &[],
        },
        ToolSpec {
            id: ToolId::MarketSegments,
            name: "market_segments",
            description: "Split a total market value across named segments by percentage share.",
            schema: obj(vec![
                field("totalMarket", ArgumentSchema::number(None), true),
                field("segments", ArgumentSchema::string_array(None), true),
            ]),
            adapters: &[],
        },
        ToolSpec {
            id: ToolId::MarketForecasting,
            name: "market_forecasting",
            description: "Project a current market value forward at a constant growth rate.",
            schema: obj(vec![
                field("currentValue", ArgumentSchema::number(None), true),
                field("growthRate", ArgumentSchema::number_range(Some(0.1), -1.0, 10.0), false),
                field("years", ArgumentSchema::integer_range(Some(5), 1, 50), false),
            ]),
            adapters: &[],
        },
        ToolSpec {
            id: ToolId::MarketComparison,
            name: "market_comparison",
            description: "Compare two market size values and report their ratio and absolute difference.",
            schema: obj(vec![
                field("marketAValue", ArgumentSchema::number(None), true),
                field("marketBValue", ArgumentSchema::number(None), true),
                field("marketALabel", ArgumentSchema::string(Some("Market A")), false),
                field("marketBLabel", ArgumentSchema::string(Some("Market B")), false),
            ]),
            adapters: &[],
        },
        ToolSpec {
            id: ToolId::DataValidation,
            name: "data_validation",
            description: "Validate a numeric value against optional minimum/maximum bounds.",
            schema: obj(vec![
                field("value", ArgumentSchema::number(None), true),
                field("minimum", ArgumentSchema::number(None), false),
                field("maximum", ArgumentSchema::number(None), false),
            ]),
            adapters: &[],
        },
        ToolSpec {
            id: ToolId::MarketOpportunities,
            name: "market_opportunities",
            description: "Combine industry search and market size estimation into ranked opportunity candidates.",
            schema: obj(vec![
                field("query", ArgumentSchema::string(None), true),
                field("geographyCodes", ArgumentSchema::string_array(None), false),
                field("limit", ArgumentSchema::integer_range(Some(5), 1, 50), false),
            ]),
            adapters: &["AlphaVantage", "Census", "WorldBank"],
        },
        ToolSpec {
            id: ToolId::GenericDataQuery,
            name: "generic_data_query",
            description: "Dispatch a raw query to a named upstream source and operation.",
            schema: obj(vec![
                field("source", ArgumentSchema::string_enum("fred", &["alphaVantage", "bls", "census", "fred", "imf", "nasdaq", "oecd", "worldBank"]), true),
                field("operation", ArgumentSchema::string(None), true),
                field("params", ArgumentSchema::object(Vec::new()), false),
            ]),
            adapters: &[],
        },
    ]
});

fn tam_input_schema() -> ArgumentSchema {
    obj(vec![
        field("baseMarketSize", ArgumentSchema::number(Some(10e9)), false),
        field("annualGrowthRate", ArgumentSchema::number_range(Some(0.15), -1.0, 10.0), false),
        field("projectionYears", ArgumentSchema::integer_range(Some(5), 1, 50), false),
        field(
            "segmentationAdjustments",
            ArgumentSchema::object(vec![
                field("factor", ArgumentSchema::number(Some(0.8)), false),
                field("rationale", ArgumentSchema::string(None), false),
            ]),
            false,
        ),
    ])
}

fn market_size_input_schema() -> ArgumentSchema {
    obj(vec![
        field("industryQuery", ArgumentSchema::string(None), true),
        field("geographyCodes", ArgumentSchema::string_array(None), false),
        field("indicatorCodes", ArgumentSchema::string_array(None), false),
        field("year", ArgumentSchema::integer(None), false),
        field("methodology", ArgumentSchema::string(Some("heuristic-routing")), false),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_all_28_documented_tools() {
        assert_eq!(all().len(), 28);
    }

    #[test]
    fn every_tool_name_is_unique() {
        let mut names: Vec<&str> = all().iter().map(|t| t.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn find_looks_up_by_exact_name() {
        let spec = find("tam_calculator").unwrap();
        assert_eq!(spec.id, ToolId::TamCalculator);
    }

    #[test]
    fn unknown_tool_name_returns_none() {
        assert!(find("does_not_exist").is_none());
    }
}
