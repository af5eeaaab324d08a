use crate::adapters::{cache_key, AdapterAvailability};
use crate::cache::Cache;
use crate::config::{Settings, Source, TtlClass};
use crate::models::Outcome;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2/country";
const DEFAULT_INDICATOR: &str = "NY.GDP.MKTP.CD";

pub struct WorldBankAdapter {
    base_url: String,
    client: Client,
    cache: Arc<Cache>,
    ttl_success: Duration,
    ttl_nodata: Duration,
}

impl WorldBankAdapter {
    pub fn new(settings: &Settings, cache: Arc<Cache>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client: crate::utils::http::default_http_client(),
            cache,
            ttl_success: settings.cache_ttl_for(Source::WorldBank, TtlClass::Success),
            ttl_nodata: settings.cache_ttl_for(Source::WorldBank, TtlClass::NoData),
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: String, cache: Arc<Cache>) -> Self {
        Self {
            base_url,
            client: Client::new(),
            cache,
            ttl_success: Duration::from_secs(86_400),
            ttl_nodata: Duration::from_secs(3_600),
        }
    }

    pub async fn get_indicator_data(
        &self,
        country_code: &str,
        indicator: &str,
        date_range: Option<&str>,
        per_page: Option<u32>,
    ) -> anyhow::Result<Option<Value>> {
        let per_page_str = per_page.map(|p| p.to_string()).unwrap_or_default();
        let key = cache_key(
            "world_bank:indicator",
            &[
                ("country_code", country_code),
                ("indicator", indicator),
                ("date_range", date_range.unwrap_or("")),
                ("per_page", &per_page_str),
            ],
        );

        let client = self.client.clone();
        let url = format!("{}/{}/indicator/{}", self.base_url, country_code, indicator);
        let date_range = date_range.map(str::to_string);

        self.cache
            .get_or_fetch(
                &key,
                self.ttl_success,
                self.ttl_nodata,
                self.ttl_nodata,
                self.ttl_nodata,
                self.ttl_nodata,
                move || async move {
                    let mut query: Vec<(String, String)> =
                        vec![("format".to_string(), "json".to_string())];
                    if let Some(v) = date_range {
                        query.push(("date".to_string(), v));
                    }
                    if let Some(v) = per_page {
                        query.push(("per_page".to_string(), v.to_string()));
                    }

                    let resp = match client.get(&url).query(&query).send().await {
                        Ok(r) => r,
                        Err(e) if e.is_timeout() => return Outcome::TransportTimeout(e.into()),
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    let status = resp.status();
                    if !status.is_success() {
                        return Outcome::TransportError(anyhow::anyhow!("World Bank HTTP {status}"));
                    }
                    let json: Value = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => return Outcome::TransportError(e.into()),
                    };

                    let data = unwrap_paginated(&json);
                    match data.as_array() {
                        Some(arr) if arr.iter().all(|v| v.is_null()) || arr.is_empty() => {
                            Outcome::NoData
                        }
                        _ => Outcome::Success(data),
                    }
                },
            )
            .await
    }

    pub async fn fetch_market_size(
        &self,
        country_code: &str,
        industry: Option<&str>,
    ) -> anyhow::Result<Option<Value>> {
        let indicator = indicator_for_industry(industry);
        let result = self
            .get_indicator_data(country_code, indicator, None, Some(5))
            .await?;
        let Some(data) = result else { return Ok(None) };
        let Some(arr) = data.as_array() else { return Ok(None) };

        Ok(arr.iter().find(|row| !row["value"].is_null()).cloned())
    }
}

/// World Bank wraps the indicator payload in a two-element array
/// `[metadata, data]`. When the response doesn't have at least two elements
/// the adapter returns the raw payload rather than indexing into it.
fn unwrap_paginated(json: &Value) -> Value {
    match json.as_array() {
        Some(arr) if arr.len() >= 2 => arr[1].clone(),
        _ => json.clone(),
    }
}

fn indicator_for_industry(industry: Option<&str>) -> &'static str {
    match industry.map(str::to_lowercase).as_deref() {
        Some("technology") | Some("tech") => "IC.BUS.EASE.XQ",
        Some("manufacturing") => "NV.IND.MANF.ZS",
        Some("agriculture") => "NV.AGR.TOTL.ZS",
        Some("energy") => "EG.USE.COMM.GD.PP.KD",
        Some("finance") | Some("financial services") => "FB.AST.NPER.ZS",
        _ => DEFAULT_INDICATOR,
    }
}

impl AdapterAvailability for WorldBankAdapter {
    fn is_available(&self) -> bool {
        true
    }

    fn missing_keys(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn unwraps_two_element_pagination_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"page": 1, "pages": 1, "total": 1},
                [{"date": "2025", "value": 27_000_000_000_000.0}]
            ])))
            .mount(&server)
            .await;

        let adapter = WorldBankAdapter::with_base_url(server.uri(), Arc::new(Cache::new()));
        let result = adapter
            .get_indicator_data("US", "NY.GDP.MKTP.CD", None, None)
            .await
            .unwrap()
            .unwrap();
        let arr = result.as_array().unwrap();
        assert_eq!(arr[0]["date"], "2025");
    }

    #[tokio::test]
    async fn short_array_response_returns_raw_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"message": "bad request"}])))
            .mount(&server)
            .await;

        let adapter = WorldBankAdapter::with_base_url(server.uri(), Arc::new(Cache::new()));
        let result = adapter
            .get_indicator_data("ZZ", "NY.GDP.MKTP.CD", None, None)
            .await
            .unwrap();
        assert_eq!(result, Some(json!([{"message": "bad request"}])));
    }

    #[tokio::test]
    async fn market_size_picks_first_non_null_value_and_maps_industry_alias() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"page": 1},
                [
                    {"date": "2025", "value": null},
                    {"date": "2024", "value": 55.2}
                ]
            ])))
            .mount(&server)
            .await;

        let adapter = WorldBankAdapter::with_base_url(server.uri(), Arc::new(Cache::new()));
        let result = adapter
            .fetch_market_size("US", Some("technology"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["date"], "2024");
        assert_eq!(result["value"], 55.2);
    }

    #[tokio::test]
    async fn all_null_values_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"page": 1},
                [{"date": "2025", "value": null}]
            ])))
            .mount(&server)
            .await;

        let adapter = WorldBankAdapter::with_base_url(server.uri(), Arc::new(Cache::new()));
        let result = adapter.fetch_market_size("US", None).await.unwrap();
        assert_eq!(result, None);
    }
}
