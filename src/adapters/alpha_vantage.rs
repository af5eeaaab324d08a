use crate::adapters::{cache_key, AdapterAvailability};
use crate::cache::Cache;
use crate::config::{Settings, Source, TtlClass};
use crate::models::Outcome;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantageAdapter {
    api_key: Option<String>,
    base_url: String,
    client: Client,
    cache: Arc<Cache>,
    ttl_success: Duration,
    ttl_nodata: Duration,
    ttl_rate_limited: Duration,
}

impl AlphaVantageAdapter {
    pub fn new(settings: &Settings, cache: Arc<Cache>) -> Self {
        Self {
            api_key: settings.alpha_vantage_api_key().map(str::to_string),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: crate::utils::http::default_http_client(),
            cache,
            ttl_success: settings.cache_ttl_for(Source::AlphaVantage, TtlClass::Success),
            ttl_nodata: settings.cache_ttl_for(Source::AlphaVantage, TtlClass::NoData),
            ttl_rate_limited: settings.cache_ttl_for(Source::AlphaVantage, TtlClass::RateLimited),
        }
    }

    #[cfg(test)]
    fn with_base_url(api_key: Option<String>, base_url: String, cache: Arc<Cache>) -> Self {
        Self {
            api_key,
            base_url,
            client: Client::new(),
            cache,
            ttl_success: Duration::from_secs(86_400),
            ttl_nodata: Duration::from_secs(3_600),
            ttl_rate_limited: Duration::from_secs(300),
        }
    }

    pub async fn get_company_overview(&self, symbol: &str) -> anyhow::Result<Option<Value>> {
        self.fetch("OVERVIEW", symbol).await
    }

    pub async fn get_income_statement(&self, symbol: &str) -> anyhow::Result<Option<Value>> {
        self.fetch("INCOME_STATEMENT", symbol).await
    }

    pub async fn get_balance_sheet(&self, symbol: &str) -> anyhow::Result<Option<Value>> {
        self.fetch("BALANCE_SHEET", symbol).await
    }

    pub async fn get_cash_flow(&self, symbol: &str) -> anyhow::Result<Option<Value>> {
        self.fetch("CASH_FLOW", symbol).await
    }

    pub async fn get_time_series(
        &self,
        function: &str,
        symbol: &str,
    ) -> anyhow::Result<Option<Value>> {
        self.fetch(function, symbol).await
    }

    pub async fn search_symbols(&self, keywords: &str) -> anyhow::Result<Option<Value>> {
        if !self.is_available() {
            anyhow::bail!("Alpha Vantage API key not configured");
        }
        let key = cache_key(
            "alpha_vantage:SYMBOL_SEARCH",
            &[("keywords", keywords)],
        );
        let api_key = self.api_key.clone().unwrap();
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let keywords = keywords.to_string();

        self.cache
            .get_or_fetch(
                &key,
                self.ttl_success,
                self.ttl_nodata,
                self.ttl_rate_limited,
                self.ttl_nodata,
                self.ttl_success,
                move || async move {
                    let resp = match client
                        .get(&base_url)
                        .query(&[
                            ("function", "SYMBOL_SEARCH"),
                            ("keywords", keywords.as_str()),
                            ("apikey", api_key.as_str()),
                        ])
                        .send()
                        .await
                    {
                        Ok(r) => r,
                        Err(e) if e.is_timeout() => return Outcome::TransportTimeout(e.into()),
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    let json: Value = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    if let Some(obj) = json.as_object() {
                        if obj.contains_key("Note") {
                            return Outcome::RateLimited;
                        }
                        if let Some(msg) = obj.get("Error Message").and_then(|v| v.as_str()) {
                            return Outcome::TransportError(anyhow::anyhow!(
                                "Alpha Vantage error: {msg}"
                            ));
                        }
                        let no_matches = obj
                            .get("bestMatches")
                            .and_then(|v| v.as_array())
                            .map(|a| a.is_empty())
                            .unwrap_or(true);
                        if no_matches {
                            return Outcome::NoData;
                        }
                    }
                    Outcome::Success(json)
                },
            )
            .await
    }

    async fn fetch(&self, function: &str, symbol: &str) -> anyhow::Result<Option<Value>> {
        if !self.is_available() {
            anyhow::bail!("Alpha Vantage API key not configured");
        }
        let key = cache_key("alpha_vantage", &[("function", function), ("symbol", symbol)]);
        let api_key = self.api_key.clone().unwrap();
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let function = function.to_string();
        let symbol = symbol.to_string();

        self.cache
            .get_or_fetch(
                &key,
                self.ttl_success,
                self.ttl_nodata,
                self.ttl_rate_limited,
                self.ttl_nodata,
                // Timeouts use the success TTL, a deliberate asymmetry: an
                // unreachable endpoint backs off as long as a real answer.
                self.ttl_success,
                move || async move {
                    let resp = match client
                        .get(&base_url)
                        .query(&[
                            ("function", function.as_str()),
                            ("symbol", symbol.as_str()),
                            ("apikey", api_key.as_str()),
                        ])
                        .send()
                        .await
                    {
                        Ok(r) => r,
                        Err(e) if e.is_timeout() => return Outcome::TransportTimeout(e.into()),
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    let json: Value = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    classify_response(&function, json)
                },
            )
            .await
    }
}

fn is_time_series_function(function: &str) -> bool {
    function.starts_with("TIME_SERIES_")
}

fn classify_response(function: &str, json: Value) -> Outcome {
    let Some(obj) = json.as_object() else {
        return Outcome::Success(json);
    };

    if obj.contains_key("Note") {
        return Outcome::RateLimited;
    }
    if let Some(msg) = obj.get("Error Message").and_then(|v| v.as_str()) {
        return Outcome::TransportError(anyhow::anyhow!("Alpha Vantage error: {msg}"));
    }
    if obj.is_empty() {
        return Outcome::NoData;
    }

    if function == "OVERVIEW" {
        if obj.get("MarketCapitalization").and_then(|v| v.as_str()) == Some("None") {
            return Outcome::NoData;
        }
        return Outcome::Success(project_overview(obj));
    }

    if is_time_series_function(function) {
        let has_series_key = obj
            .keys()
            .any(|k| k.contains("Time Series") || k.contains("Weekly") || k.contains("Monthly"));
        if !has_series_key {
            return Outcome::NoData;
        }
    }

    Outcome::Success(json.clone())
}

fn project_overview(obj: &Map<String, Value>) -> Value {
    let parse_f64 = |field: &str| obj.get(field).and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok());
    json!({
        "symbol": obj.get("Symbol").and_then(|v| v.as_str()),
        "marketCapitalization": parse_f64("MarketCapitalization"),
        "name": obj.get("Name").and_then(|v| v.as_str()),
        "sector": obj.get("Sector").and_then(|v| v.as_str()),
        "industry": obj.get("Industry").and_then(|v| v.as_str()),
        "description": obj.get("Description").and_then(|v| v.as_str()),
        "currency": "USD",
        "country": obj.get("Country").and_then(|v| v.as_str()),
        "exchange": obj.get("Exchange").and_then(|v| v.as_str()),
        "EPS": parse_f64("EPS"),
        "PERatio": parse_f64("PERatio"),
    })
}

impl AdapterAvailability for AlphaVantageAdapter {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn missing_keys(&self) -> Vec<String> {
        if self.api_key.is_some() {
            Vec::new()
        } else {
            vec!["ALPHA_VANTAGE_API_KEY".to_string()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(base_url: String) -> AlphaVantageAdapter {
        AlphaVantageAdapter::with_base_url(
            Some("test_key".to_string()),
            base_url,
            Arc::new(Cache::new()),
        )
    }

    #[tokio::test]
    async fn unavailable_without_api_key() {
        let adapter = AlphaVantageAdapter::with_base_url(None, "http://unused".into(), Arc::new(Cache::new()));
        assert!(!adapter.is_available());
        assert_eq!(adapter.missing_keys(), vec!["ALPHA_VANTAGE_API_KEY"]);
        let err = adapter.get_company_overview("AAPL").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn overview_success_projects_market_cap_as_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("function", "OVERVIEW"))
            .and(query_param("symbol", "AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Symbol": "AAPL",
                "Name": "Apple Inc",
                "MarketCapitalization": "2500000000000",
                "Sector": "TECHNOLOGY",
                "Industry": "Consumer Electronics",
                "Description": "Apple designs phones.",
                "Country": "USA",
                "Exchange": "NASDAQ",
                "EPS": "6.1",
                "PERatio": "28.5"
            })))
            .mount(&server)
            .await;

        let result = adapter(server.uri())
            .get_company_overview("AAPL")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["marketCapitalization"], 2_500_000_000_000.0);
        assert_eq!(result["currency"], "USD");
        assert_eq!(result["symbol"], "AAPL");
    }

    #[tokio::test]
    async fn overview_market_cap_none_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("function", "OVERVIEW"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Symbol": "ZZZZ",
                "MarketCapitalization": "None"
            })))
            .mount(&server)
            .await;

        let result = adapter(server.uri())
            .get_company_overview("ZZZZ")
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn rate_limit_note_classifies_as_rate_limited_and_returns_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is..."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(server.uri());
        let first = adapter.get_company_overview("AAPL").await.unwrap();
        assert_eq!(first, None);
        // second call within the rate-limit TTL must not hit the network again
        let second = adapter.get_company_overview("AAPL").await.unwrap();
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn error_message_field_is_a_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Error Message": "Invalid API call"
            })))
            .mount(&server)
            .await;

        let err = adapter(server.uri())
            .get_company_overview("AAPL")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid API call"));
    }

    #[tokio::test]
    async fn empty_object_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let result = adapter(server.uri())
            .get_company_overview("AAPL")
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn time_series_without_series_key_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("function", "TIME_SERIES_DAILY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Meta Data": {"1. Information": "Daily"}
            })))
            .mount(&server)
            .await;

        let result = adapter(server.uri())
            .get_time_series("TIME_SERIES_DAILY", "AAPL")
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn time_series_with_series_key_returns_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("function", "TIME_SERIES_DAILY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Meta Data": {"1. Information": "Daily"},
                "Time Series (Daily)": {"2026-07-24": {"4. close": "150.00"}}
            })))
            .mount(&server)
            .await;

        let result = adapter(server.uri())
            .get_time_series("TIME_SERIES_DAILY", "AAPL")
            .await
            .unwrap()
            .unwrap();
        assert!(result.get("Time Series (Daily)").is_some());
        assert!(result.get("Meta Data").is_some());
    }

    #[tokio::test]
    async fn search_symbols_empty_matches_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("function", "SYMBOL_SEARCH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"bestMatches": []})))
            .mount(&server)
            .await;

        let result = adapter(server.uri()).search_symbols("apple").await.unwrap();
        assert_eq!(result, None);
    }
}
