use crate::adapters::{cache_key, AdapterAvailability};
use crate::cache::Cache;
use crate::config::{Settings, Source, TtlClass};
use crate::models::Outcome;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://data.nasdaq.com/api/v3/datasets";

pub struct NasdaqAdapter {
    api_key: Option<String>,
    base_url: String,
    client: Client,
    cache: Arc<Cache>,
    ttl_success: Duration,
    ttl_nodata: Duration,
}

impl NasdaqAdapter {
    pub fn new(settings: &Settings, cache: Arc<Cache>) -> Self {
        Self {
            api_key: settings.nasdaq_data_link_api_key().map(str::to_string),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: crate::utils::http::default_http_client(),
            cache,
            ttl_success: settings.cache_ttl_for(Source::Nasdaq, TtlClass::Success),
            ttl_nodata: settings.cache_ttl_for(Source::Nasdaq, TtlClass::NoData),
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
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn get_dataset_time_series(
        &self,
        database_code: &str,
        dataset_code: &str,
        limit: Option<u32>,
        order: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        collapse: Option<&str>,
    ) -> anyhow::Result<Option<Value>> {
        let limit_str = limit.map(|l| l.to_string()).unwrap_or_default();
        let key = cache_key(
            "nasdaq:dataset",
            &[
                ("database_code", database_code),
                ("dataset_code", dataset_code),
                ("limit", &limit_str),
                ("order", order.unwrap_or("")),
                ("start_date", start_date.unwrap_or("")),
                ("end_date", end_date.unwrap_or("")),
                ("collapse", collapse.unwrap_or("")),
            ],
        );

        let client = self.client.clone();
        let url = format!(
            "{}/{}/{}/data.json",
            self.base_url, database_code, dataset_code
        );
        let api_key = self.api_key.clone();
        let order = order.map(str::to_string);
        let start_date = start_date.map(str::to_string);
        let end_date = end_date.map(str::to_string);
        let collapse = collapse.map(str::to_string);

        self.cache
            .get_or_fetch(
                &key,
                self.ttl_success,
                self.ttl_nodata,
                self.ttl_nodata,
                self.ttl_nodata,
                self.ttl_nodata,
                move || async move {
                    let mut query: Vec<(String, String)> = Vec::new();
                    if let Some(v) = limit {
                        query.push(("limit".to_string(), v.to_string()));
                    }
                    if let Some(v) = order {
                        query.push(("order".to_string(), v));
                    }
                    if let Some(v) = start_date {
                        query.push(("start_date".to_string(), v));
                    }
                    if let Some(v) = end_date {
                        query.push(("end_date".to_string(), v));
                    }
                    if let Some(v) = collapse {
                        query.push(("collapse".to_string(), v));
                    }
                    if let Some(k) = api_key {
                        query.push(("api_key".to_string(), k));
                    }

                    let resp = match client.get(&url).query(&query).send().await {
                        Ok(r) => r,
                        Err(e) if e.is_timeout() => return Outcome::TransportTimeout(e.into()),
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    let status = resp.status();
                    if !status.is_success() {
                        return Outcome::TransportError(anyhow::anyhow!("Nasdaq HTTP {status}"));
                    }
                    let json: Value = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => return Outcome::TransportError(e.into()),
                    };

                    let rows_empty = json
                        .pointer("/dataset_data/data")
                        .and_then(|v| v.as_array())
                        .map(|a| a.is_empty())
                        .unwrap_or(true);
                    if rows_empty {
                        return Outcome::NoData;
                    }
                    Outcome::Success(json.pointer("/dataset_data").cloned().unwrap_or(json))
                },
            )
            .await
    }

    /// Picks the latest row and the named value column. Finds the date
    /// column by name (first column whose name contains "date") rather than
    /// assuming it sits at index 0, since real datasets place it elsewhere.
    pub async fn fetch_market_size(
        &self,
        database_code: &str,
        dataset_code: &str,
        value_column_name: &str,
    ) -> anyhow::Result<Option<Value>> {
        let result = self
            .get_dataset_time_series(
                database_code,
                dataset_code,
                Some(1),
                Some("desc"),
                None,
                None,
                None,
            )
            .await?;
        let Some(dataset) = result else { return Ok(None) };

        let columns: Vec<String> = dataset
            .get("column_names")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|c| c.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let Some(row) = dataset
            .get("data")
            .and_then(|v| v.as_array())
            .and_then(|rows| rows.first())
        else {
            return Ok(None);
        };

        let date_idx = columns
            .iter()
            .position(|c| c.to_lowercase().contains("date"))
            .unwrap_or(0);
        let value_idx = columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(value_column_name))
            .unwrap_or(1);

        Ok(Some(json!({
            "date": row.get(date_idx),
            "value": row.get(value_idx),
            "databaseCode": database_code,
            "datasetCode": dataset_code,
        })))
    }
}

impl AdapterAvailability for NasdaqAdapter {
    fn is_available(&self) -> bool {
        true
    }

    fn missing_keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn warnings(&self) -> Vec<String> {
        if self.api_key.is_none() {
            vec!["Nasdaq Data Link: using anonymous access, subject to tighter provider rate limits".to_string()]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn empty_data_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dataset_data": {"column_names": ["Date", "Value"], "data": []}
            })))
            .mount(&server)
            .await;

        let adapter = NasdaqAdapter::with_base_url(None, server.uri(), Arc::new(Cache::new()));
        let result = adapter
            .get_dataset_time_series("WIKI", "AAPL", None, None, None, None, None)
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn market_size_finds_date_column_when_not_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dataset_data": {
                    "column_names": ["Value", "TradeDate"],
                    "data": [[42.0, "2026-07-24"]]
                }
            })))
            .mount(&server)
            .await;

        let adapter = NasdaqAdapter::with_base_url(None, server.uri(), Arc::new(Cache::new()));
        let result = adapter
            .fetch_market_size("WIKI", "AAPL", "Value")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["date"], "2026-07-24");
        assert_eq!(result["value"], 42.0);
    }
}
