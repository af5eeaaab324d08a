//! Single-tool-invocation state machine:
//!
//! ```text
//!   RECEIVED → {unknown tool}            → ERROR
//!            → lookup → {bad arguments}  → ERROR
//!            → {rate limit denies}       → RATE_LIMITED
//!            → handler.invoke → {throws} → ERROR
//!                             → {returns} → FORMATTED → RESPONSE
//! ```
//!
//! Notifications are dispatched onto a spawned task so a slow or blocking
//! sink implementation never delays the caller's response.

use crate::data_service::DataService;
use crate::errors::{FieldErrors, OrchestratorError};
use crate::notifications::{
    NotificationSink, LARGE_CAGR_THRESHOLD, LARGE_TAM_THRESHOLD, LOW_CONFIDENCE_THRESHOLD,
};
use crate::rate_limiter::RateLimiter;
use crate::tools::registry::{self, ToolId};
use crate::tools::advanced;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Dispatcher {
    service: DataService,
    rate_limiter: RateLimiter,
    rate_limit_requests: u32,
    rate_limit_window: Duration,
    notifications: Arc<dyn NotificationSink>,
}

#[derive(Debug, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl Dispatcher {
    pub fn new(
        service: DataService,
        rate_limit_requests: u32,
        rate_limit_window: Duration,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            service,
            rate_limiter: RateLimiter::new(),
            rate_limit_requests,
            rate_limit_window,
            notifications,
        }
    }

    pub fn service(&self) -> &DataService {
        &self.service
    }

    pub async fn dispatch(&self, tool_name: &str, arguments: Value, client_id: &str) -> ToolResponse {
        let Some(spec) = registry::find(tool_name) else {
            return self.error_response(tool_name, OrchestratorError::UnknownTool(tool_name.to_string()));
        };

        let decision = self.rate_limiter.check(client_id, self.rate_limit_requests, self.rate_limit_window);
        if !decision.allowed {
            return self.error_response(
                tool_name,
                OrchestratorError::RateLimitedByServer { retry_after_secs: decision.reset_after.as_secs() },
            );
        }

        let mut args = arguments;
        let mut errors = FieldErrors::default();
        spec.schema.validate_and_fill(&mut args, "", &mut errors);
        if !errors.0.is_empty() {
            return self.error_response(tool_name, OrchestratorError::InvalidArguments(errors));
        }

        self.notify_start(tool_name);
        let start = Instant::now();

        match self.invoke(spec.id, &args).await {
            Ok(result) => {
                let elapsed = start.elapsed();
                self.notify_success(tool_name, elapsed);
                self.emit_business_events(tool_name, &result);
                ToolResponse {
                    content: vec![ContentBlock { kind: "text", text: result.to_string() }],
                    is_error: false,
                }
            }
            Err(e) => {
                let err = OrchestratorError::Internal(e);
                self.notify_error(tool_name, err.kind());
                ToolResponse {
                    content: vec![ContentBlock { kind: "text", text: err.to_string() }],
                    is_error: true,
                }
            }
        }
    }

    fn error_response(&self, tool_name: &str, err: OrchestratorError) -> ToolResponse {
        self.notify_error(tool_name, err.kind());
        ToolResponse {
            content: vec![ContentBlock { kind: "text", text: err.to_string() }],
            is_error: true,
        }
    }

    fn notify_start(&self, tool_name: &str) {
        let sink = self.notifications.clone();
        let tool_name = tool_name.to_string();
        tokio::spawn(async move { sink.on_start(&tool_name) });
    }

    fn notify_success(&self, tool_name: &str, elapsed: Duration) {
        let sink = self.notifications.clone();
        let tool_name = tool_name.to_string();
        tokio::spawn(async move { sink.on_success(&tool_name, elapsed) });
    }

    fn notify_error(&self, tool_name: &str, error_kind: &'static str) {
        let sink = self.notifications.clone();
        let tool_name = tool_name.to_string();
        tokio::spawn(async move { sink.on_error(&tool_name, error_kind) });
    }

    fn notify_business_event(&self, event: &'static str, detail: String) {
        let sink = self.notifications.clone();
        tokio::spawn(async move { sink.on_business_event(event, &detail) });
    }

    fn emit_business_events(&self, tool_name: &str, result: &Value) {
        if let Some(tam) = result.get("calculatedTam").and_then(|v| v.as_f64()) {
            if tam >= LARGE_TAM_THRESHOLD {
                self.notify_business_event("large_tam", format!("{tool_name}: calculatedTam={tam}"));
            }
        }
        if let Some(cagr) = result.get("compoundAnnualGrowthRate").and_then(|v| v.as_f64()) {
            if cagr.abs() >= LARGE_CAGR_THRESHOLD {
                self.notify_business_event("large_cagr", format!("{tool_name}: cagr={cagr}"));
            }
        }
        if let Some(confidence) = result.get("confidenceScore").and_then(|v| v.as_f64()) {
            if confidence < LOW_CONFIDENCE_THRESHOLD {
                self.notify_business_event("low_confidence", format!("{tool_name}: confidence={confidence}"));
            }
        }
    }

    async fn invoke(&self, id: ToolId, args: &Value) -> anyhow::Result<Value> {
        let s = &self.service;
        let str_arg = |name: &str, default: &str| -> String {
            args.get(name).and_then(|v| v.as_str()).unwrap_or(default).to_string()
        };
        let opt_str = |name: &str| -> Option<String> { args.get(name).and_then(|v| v.as_str()).map(str::to_string) };
        let int_arg = |name: &str, default: u64| -> u64 { args.get(name).and_then(|v| v.as_u64()).unwrap_or(default) };
        let string_list = |name: &str| -> Option<Vec<String>> {
            args.get(name)?.as_array().map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        };

        match id {
            ToolId::AlphaVantageGetCompanyOverview => {
                Ok(s.alpha_vantage.get_company_overview(&str_arg("symbol", "AAPL")).await?.unwrap_or(Value::Null))
            }
            ToolId::AlphaVantageSearchSymbols => {
                let keywords = str_arg("keywords", "");
                Ok(s.alpha_vantage.search_symbols(&keywords).await?.unwrap_or(Value::Null))
            }
            ToolId::BlsGetSeriesData => {
                let ids = string_list("seriesIds").unwrap_or_default();
                Ok(s.bls.get_series_data(&ids, opt_str("startYear").as_deref(), opt_str("endYear").as_deref()).await?.unwrap_or(Value::Null))
            }
            ToolId::CensusFetchIndustryData => {
                let variables = string_list("variables").unwrap_or_default();
                let year = int_arg("year", 2022) as u32;
                let dataset_path = str_arg("datasetPath", "cbp");
                let for_geography = str_arg("forGeography", "us:*");
                Ok(s.census.fetch_industry_data(year, &dataset_path, &variables, &for_geography, &[]).await?.unwrap_or(Value::Null))
            }
            ToolId::CensusFetchMarketSize => {
                let year = int_arg("year", 2022) as u32;
                let naics = str_arg("naicsCode", "");
                let variable = str_arg("variable", "EMP");
                let for_geography = str_arg("forGeography", "us:*");
                Ok(s.census.fetch_market_size(year, &naics, &variable, &for_geography).await?.unwrap_or(Value::Null))
            }
            ToolId::FredGetSeriesObservations => {
                let series_id = str_arg("seriesId", "GDP");
                let limit = args.get("limit").and_then(|v| v.as_u64()).map(|v| v as u32);
                Ok(s.fred
                    .get_series_observations(&series_id, opt_str("observationStart").as_deref(), opt_str("observationEnd").as_deref(), limit, None, opt_str("sortOrder").as_deref())
                    .await?
                    .unwrap_or(Value::Null))
            }
            ToolId::ImfGetDataset => {
                let dataflow = str_arg("dataflowId", "IFS");
                let key = str_arg("key", "");
                Ok(s.imf.get_dataset(&dataflow, &key, opt_str("startPeriod").as_deref(), opt_str("endPeriod").as_deref()).await?.unwrap_or(Value::Null))
            }
            ToolId::ImfGetLatestObservation => {
                let dataflow = str_arg("dataflowId", "IFS");
                let key = str_arg("key", "");
                Ok(s.imf.get_latest_observation(&dataflow, &key).await?.unwrap_or(Value::Null))
            }
            ToolId::NasdaqGetDatasetTimeSeries => {
                let db = str_arg("databaseCode", "WIKI");
                let ds = str_arg("datasetCode", "");
                let limit = args.get("limit").and_then(|v| v.as_u64()).map(|v| v as u32);
                Ok(s.nasdaq
                    .get_dataset_time_series(&db, &ds, limit, opt_str("order").as_deref(), opt_str("startDate").as_deref(), opt_str("endDate").as_deref(), opt_str("collapse").as_deref())
                    .await?
                    .unwrap_or(Value::Null))
            }
            ToolId::NasdaqGetLatestDatasetValue => {
                let db = str_arg("databaseCode", "WIKI");
                let ds = str_arg("datasetCode", "");
                Ok(s.nasdaq_get_latest_dataset_value(&db, &ds).await?.unwrap_or(Value::Null))
            }
            ToolId::OecdGetDataset => {
                let dataset = str_arg("datasetId", "QNA");
                let filter = str_arg("filterExpression", "");
                Ok(s.oecd.get_dataset(&dataset, &filter, opt_str("startPeriod").as_deref(), opt_str("endPeriod").as_deref()).await?.unwrap_or(Value::Null))
            }
            ToolId::OecdGetLatestObservation => {
                let dataset = str_arg("datasetId", "QNA");
                let filter = str_arg("filterExpression", "");
                Ok(s.oecd_get_latest_observation(&dataset, &filter).await?.unwrap_or(Value::Null))
            }
            ToolId::WorldBankGetIndicatorData => {
                let country = str_arg("countryCode", "US");
                let indicator = str_arg("indicator", "NY.GDP.MKTP.CD");
                let per_page = args.get("perPage").and_then(|v| v.as_u64()).map(|v| v as u32);
                Ok(s.world_bank.get_indicator_data(&country, &indicator, opt_str("dateRange").as_deref(), per_page).await?.unwrap_or(Value::Null))
            }

            ToolId::IndustrySearch => {
                let query = str_arg("query", "");
                let sources = string_list("sources");
                let limit = int_arg("limit", 10) as usize;
                let min_relevance = args.get("minRelevanceScore").and_then(|v| v.as_f64()).unwrap_or(0.1);
                let result = s.search_industries(&query, sources.as_deref(), limit, min_relevance, opt_str("geographyFilter").as_deref()).await;
                Ok(serde_json::to_value(result)?)
            }
            ToolId::TamCalculator => advanced::tam_analysis(s, args),
            ToolId::MarketSizeCalculator => advanced::market_size(s, args).await,
            ToolId::CompanyFinancialsRetriever => {
                let symbol = str_arg("companySymbol", "AAPL");
                let statement_type = str_arg("statementType", "overview");
                let period = str_arg("period", "annual");
                let limit = int_arg("limit", 5) as usize;
                s.get_company_financials(&symbol, &statement_type, &period, limit).await
            }

            ToolId::IndustryAnalysis => advanced::industry_analysis(s, args).await,
            ToolId::IndustryData => advanced::industry_data(s, args).await,
            ToolId::MarketSize => advanced::market_size(s, args).await,
            ToolId::TamAnalysis => advanced::tam_analysis(s, args),
            ToolId::SamCalculator => advanced::sam_calculator(args),
            ToolId::MarketSegments => advanced::market_segments(args),
            ToolId::MarketForecasting => advanced::market_forecasting(args),
            ToolId::MarketComparison => advanced::market_comparison(args),
            ToolId::DataValidation => advanced::data_validation(args),
            ToolId::MarketOpportunities => advanced::market_opportunities(s, args).await,
            ToolId::GenericDataQuery => advanced::generic_data_query(s, args).await,
        }
    }
}
