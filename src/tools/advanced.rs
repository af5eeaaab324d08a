//! Handlers for the "advanced business" tools. These compose
//! `DataService`'s core operations (or, for the purely numeric ones, just
//! arithmetic) rather than adding new upstream integrations.

use crate::data_service::DataService;
use crate::models::SegmentationAdjustment;
use serde_json::{json, Value};

fn str_field<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str())
}

fn f64_field(args: &Value, name: &str) -> Option<f64> {
    args.get(name).and_then(|v| v.as_f64())
}

fn string_list(args: &Value, name: &str) -> Option<Vec<String>> {
    args.get(name)?.as_array().map(|arr| {
        arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
    })
}

pub async fn industry_analysis(service: &DataService, args: &Value) -> anyhow::Result<Value> {
    let query = str_field(args, "query").ok_or_else(|| anyhow::anyhow!("query is required"))?;
    let sources = string_list(args, "sources");
    let limit = args.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize;
    let min_relevance = f64_field(args, "minRelevanceScore").unwrap_or(0.1);
    let result = service
        .search_industries(query, sources.as_deref(), limit, min_relevance, None)
        .await;
    Ok(serde_json::to_value(result)?)
}

pub async fn industry_data(service: &DataService, args: &Value) -> anyhow::Result<Value> {
    let code = str_field(args, "industryCode").ok_or_else(|| anyhow::anyhow!("industryCode is required"))?;
    let year = args.get("year").and_then(|v| v.as_u64()).unwrap_or(2022) as u32;
    let geography = str_field(args, "forGeography").unwrap_or("us:*");
    let variables = ["EMP".to_string(), "PAYANN".to_string(), "ESTAB".to_string()];
    let result = service
        .census
        .fetch_industry_data(year, "cbp", &variables, geography, &[("NAICS2017".to_string(), code.to_string())])
        .await?;
    Ok(result.unwrap_or(Value::Null))
}

pub async fn market_size(service: &DataService, args: &Value) -> anyhow::Result<Value> {
    let query = str_field(args, "industryQuery").ok_or_else(|| anyhow::anyhow!("industryQuery is required"))?;
    let geography_codes = string_list(args, "geographyCodes");
    let indicator_codes = string_list(args, "indicatorCodes");
    let year = args.get("year").and_then(|v| v.as_i64()).map(|y| y as i32);
    let methodology = str_field(args, "methodology").unwrap_or("heuristic-routing");
    let result = service
        .calculate_market_size(query, geography_codes.as_deref(), indicator_codes.as_deref(), year, methodology)
        .await;
    Ok(serde_json::to_value(result)?)
}

pub fn tam_analysis(service: &DataService, args: &Value) -> anyhow::Result<Value> {
    let base = f64_field(args, "baseMarketSize").unwrap_or(10e9);
    let growth = f64_field(args, "annualGrowthRate").unwrap_or(0.15);
    let years = args.get("projectionYears").and_then(|v| v.as_u64()).unwrap_or(5) as u32;
    let segmentation = args.get("segmentationAdjustments").and_then(|s| {
        Some(SegmentationAdjustment {
            factor: s.get("factor")?.as_f64()?,
            rationale: s.get("rationale").and_then(|v| v.as_str()).map(str::to_string),
        })
    });
    let result = service.calculate_tam(base, growth, years, segmentation);
    Ok(serde_json::to_value(result)?)
}

pub fn sam_calculator(args: &Value) -> anyhow::Result<Value> {
    let tam = f64_field(args, "totalAddressableMarket").ok_or_else(|| anyhow::anyhow!("totalAddressableMarket is required"))?;
    let percentage = f64_field(args, "targetSegmentPercentage").unwrap_or(0.2);
    let sam = tam * percentage;
    Ok(json!({
        "serviceableAddressableMarket": sam,
        "totalAddressableMarket": tam,
        "targetSegmentPercentage": percentage,
        "assumptions": [format!("TAM = {tam}"), format!("target segment percentage = {percentage}")],
    }))
}

pub fn market_segments(args: &Value) -> anyhow::Result<Value> {
    let total = f64_field(args, "totalMarket").ok_or_else(|| anyhow::anyhow!("totalMarket is required"))?;
    let segments = args.get("segments").and_then(|v| v.as_array()).ok_or_else(|| anyhow::anyhow!("segments is required"))?;

    let breakdown: Vec<Value> = segments
        .iter()
        .filter_map(|s| {
            let name = s.get("name")?.as_str()?;
            let percentage = s.get("percentage")?.as_f64()?;
            Some(json!({
                "name": name,
                "percentage": percentage,
                "value": total * percentage,
            }))
        })
        .collect();

    Ok(json!({ "totalMarket": total, "segments": breakdown }))
}

pub fn market_forecasting(args: &Value) -> anyhow::Result<Value> {
    let current = f64_field(args, "currentValue").ok_or_else(|| anyhow::anyhow!("currentValue is required"))?;
    let growth_rate = f64_field(args, "growthRate").unwrap_or(0.1);
    let years = args.get("years").and_then(|v| v.as_u64()).unwrap_or(5) as u32;

    let forecast: Vec<(u32, f64)> = (1..=years)
        .map(|i| (i, current * (1.0 + growth_rate).powi(i as i32)))
        .collect();

    Ok(json!({
        "currentValue": current,
        "growthRate": growth_rate,
        "forecast": forecast,
        "compoundAnnualGrowthRate": growth_rate,
    }))
}

pub fn market_comparison(args: &Value) -> anyhow::Result<Value> {
    let a = f64_field(args, "marketAValue").ok_or_else(|| anyhow::anyhow!("marketAValue is required"))?;
    let b = f64_field(args, "marketBValue").ok_or_else(|| anyhow::anyhow!("marketBValue is required"))?;
    let label_a = str_field(args, "marketALabel").unwrap_or("Market A");
    let label_b = str_field(args, "marketBLabel").unwrap_or("Market B");

    let larger = if a >= b { label_a } else { label_b };
    Ok(json!({
        "difference": (a - b).abs(),
        "ratio": if b != 0.0 { Some(a / b) } else { None },
        "larger": larger,
        "marketA": {"label": label_a, "value": a},
        "marketB": {"label": label_b, "value": b},
    }))
}

pub fn data_validation(args: &Value) -> anyhow::Result<Value> {
    let value = f64_field(args, "value").ok_or_else(|| anyhow::anyhow!("value is required"))?;
    let minimum = f64_field(args, "minimum");
    let maximum = f64_field(args, "maximum");

    let mut issues = Vec::new();
    if let Some(min) = minimum {
        if value < min {
            issues.push(format!("value {value} is below minimum {min}"));
        }
    }
    if let Some(max) = maximum {
        if value > max {
            issues.push(format!("value {value} exceeds maximum {max}"));
        }
    }

    Ok(json!({ "valid": issues.is_empty(), "issues": issues, "value": value }))
}

pub async fn market_opportunities(service: &DataService, args: &Value) -> anyhow::Result<Value> {
    let query = str_field(args, "query").ok_or_else(|| anyhow::anyhow!("query is required"))?;
    let geography_codes = string_list(args, "geographyCodes");
    let limit = args.get("limit").and_then(|v| v.as_u64()).unwrap_or(5) as usize;

    let search = service.search_industries(query, None, limit, 0.0, None).await;
    let sizing = service
        .calculate_market_size(query, geography_codes.as_deref(), None, None, "heuristic-routing")
        .await;

    Ok(json!({
        "candidates": search.results,
        "searchErrors": search.errors,
        "marketSizeEstimate": sizing,
    }))
}

pub async fn generic_data_query(service: &DataService, args: &Value) -> anyhow::Result<Value> {
    let source = str_field(args, "source").ok_or_else(|| anyhow::anyhow!("source is required"))?;
    let operation = str_field(args, "operation").ok_or_else(|| anyhow::anyhow!("operation is required"))?;
    let empty = json!({});
    let params = args.get("params").unwrap_or(&empty);

    match (source, operation) {
        ("alphaVantage", "getCompanyOverview") => {
            let symbol = str_field(params, "symbol").unwrap_or("AAPL");
            Ok(service.alpha_vantage.get_company_overview(symbol).await?.unwrap_or(Value::Null))
        }
        ("bls", "getSeriesData") => {
            let ids = string_list(params, "seriesIds").ok_or_else(|| anyhow::anyhow!("params.seriesIds is required"))?;
            Ok(service
                .bls
                .get_series_data(&ids, str_field(params, "startYear"), str_field(params, "endYear"))
                .await?
                .unwrap_or(Value::Null))
        }
        ("census", "fetchMarketSize") => {
            let naics = str_field(params, "naicsCode").ok_or_else(|| anyhow::anyhow!("params.naicsCode is required"))?;
            let year = params.get("year").and_then(|v| v.as_u64()).unwrap_or(2022) as u32;
            let variable = str_field(params, "variable").unwrap_or("EMP");
            let geography = str_field(params, "forGeography").unwrap_or("us:*");
            Ok(service.census.fetch_market_size(year, naics, variable, geography).await?.unwrap_or(Value::Null))
        }
        ("fred", "getSeriesObservations") => {
            let series_id = str_field(params, "seriesId").ok_or_else(|| anyhow::anyhow!("params.seriesId is required"))?;
            Ok(service
                .fred
                .get_series_observations(series_id, None, None, Some(100), None, Some("desc"))
                .await?
                .unwrap_or(Value::Null))
        }
        ("imf", "getDataset") => {
            let dataflow = str_field(params, "dataflowId").unwrap_or("IFS");
            let key = str_field(params, "key").ok_or_else(|| anyhow::anyhow!("params.key is required"))?;
            Ok(service
                .imf
                .get_dataset(dataflow, key, str_field(params, "startPeriod"), str_field(params, "endPeriod"))
                .await?
                .unwrap_or(Value::Null))
        }
        ("nasdaq", "getDatasetTimeSeries") => {
            let db = str_field(params, "databaseCode").unwrap_or("WIKI");
            let ds = str_field(params, "datasetCode").ok_or_else(|| anyhow::anyhow!("params.datasetCode is required"))?;
            let limit = params.get("limit").and_then(|v| v.as_u64()).map(|v| v as u32);
            Ok(service
                .nasdaq
                .get_dataset_time_series(
                    db,
                    ds,
                    limit,
                    str_field(params, "order"),
                    str_field(params, "startDate"),
                    str_field(params, "endDate"),
                    str_field(params, "collapse"),
                )
                .await?
                .unwrap_or(Value::Null))
        }
        ("oecd", "getDataset") => {
            let dataset = str_field(params, "datasetId").unwrap_or("QNA");
            let filter = str_field(params, "filterExpression").ok_or_else(|| anyhow::anyhow!("params.filterExpression is required"))?;
            Ok(service
                .oecd
                .get_dataset(dataset, filter, str_field(params, "startPeriod"), str_field(params, "endPeriod"))
                .await?
                .unwrap_or(Value::Null))
        }
        ("worldBank", "getIndicatorData") => {
            let country = str_field(params, "countryCode").unwrap_or("US");
            let indicator = str_field(params, "indicator").unwrap_or("NY.GDP.MKTP.CD");
            Ok(service
                .world_bank
                .get_indicator_data(country, indicator, None, None)
                .await?
                .unwrap_or(Value::Null))
        }
        (source, operation) => anyhow::bail!("unsupported generic query: {source}.{operation}"),
    }
}
