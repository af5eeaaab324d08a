use crate::adapters::{cache_key, AdapterAvailability};
use crate::cache::Cache;
use crate::config::{Settings, Source, TtlClass};
use crate::models::Outcome;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data";
const ANONYMOUS_SERIES_CAP: usize = 25;
const KEYED_SERIES_CAP: usize = 50;

pub struct BlsAdapter {
    api_key: Option<String>,
    base_url: String,
    client: Client,
    cache: Arc<Cache>,
    ttl_success: Duration,
    ttl_nodata: Duration,
}

impl BlsAdapter {
    pub fn new(settings: &Settings, cache: Arc<Cache>) -> Self {
        Self {
            api_key: settings.bls_api_key().map(str::to_string),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: crate::utils::http::default_http_client(),
            cache,
            ttl_success: settings.cache_ttl_for(Source::Bls, TtlClass::Success),
            ttl_nodata: settings.cache_ttl_for(Source::Bls, TtlClass::NoData),
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

    pub async fn get_series_data(
        &self,
        series_ids: &[String],
        start_year: Option<&str>,
        end_year: Option<&str>,
    ) -> anyhow::Result<Option<Value>> {
        let cap = if self.api_key.is_some() {
            KEYED_SERIES_CAP
        } else {
            ANONYMOUS_SERIES_CAP
        };
        if series_ids.len() > cap {
            tracing::warn!(
                requested = series_ids.len(),
                cap,
                "BLS series request exceeds the documented cap; issuing anyway"
            );
        }

        let key = cache_key(
            "bls:series",
            &[
                ("series_ids", &series_ids.join(",")),
                ("start_year", start_year.unwrap_or("")),
                ("end_year", end_year.unwrap_or("")),
            ],
        );

        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let api_key = self.api_key.clone();
        let series_ids = series_ids.to_vec();
        let start_year = start_year.map(str::to_string);
        let end_year = end_year.map(str::to_string);

        self.cache
            .get_or_fetch(
                &key,
                self.ttl_success,
                self.ttl_nodata,
                self.ttl_nodata,
                self.ttl_nodata,
                self.ttl_nodata,
                move || async move {
                    let mut body = json!({ "seriesid": series_ids });
                    if let Some(y) = &start_year {
                        body["startyear"] = json!(y);
                    }
                    if let Some(y) = &end_year {
                        body["endyear"] = json!(y);
                    }
                    if let Some(k) = &api_key {
                        body["registrationkey"] = json!(k);
                    }

                    let resp = match client.post(&base_url).json(&body).send().await {
                        Ok(r) => r,
                        Err(e) if e.is_timeout() => return Outcome::TransportTimeout(e.into()),
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    let json: Value = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => return Outcome::TransportError(e.into()),
                    };

                    let status = json.get("status").and_then(|v| v.as_str()).unwrap_or("");
                    if status != "REQUEST_SUCCEEDED" {
                        let messages = json
                            .get("message")
                            .and_then(|v| v.as_array())
                            .map(|arr| {
                                arr.iter()
                                    .filter_map(|m| m.as_str())
                                    .collect::<Vec<_>>()
                                    .join("; ")
                            })
                            .unwrap_or_else(|| "unknown BLS error".to_string());
                        return Outcome::TransportError(anyhow::anyhow!("BLS: {messages}"));
                    }

                    let results = json.get("Results").cloned();
                    match results {
                        Some(Value::Null) | None => Outcome::NoData,
                        Some(v) => Outcome::Success(v),
                    }
                },
            )
            .await
    }
}

impl AdapterAvailability for BlsAdapter {
    fn is_available(&self) -> bool {
        true
    }

    fn missing_keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn warnings(&self) -> Vec<String> {
        if self.api_key.is_none() {
            vec!["BLS: using anonymous access, 25-series cap".to_string()]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn always_available_even_without_key() {
        let adapter = BlsAdapter::with_base_url(None, "http://unused".into(), Arc::new(Cache::new()));
        assert!(adapter.is_available());
        assert!(!adapter.warnings().is_empty());
    }

    #[tokio::test]
    async fn success_returns_results_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"seriesid": ["LNS14000000"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "REQUEST_SUCCEEDED",
                "Results": {"series": [{"seriesID": "LNS14000000", "data": []}]}
            })))
            .mount(&server)
            .await;

        let adapter = BlsAdapter::with_base_url(None, server.uri(), Arc::new(Cache::new()));
        let result = adapter
            .get_series_data(&["LNS14000000".to_string()], None, None)
            .await
            .unwrap()
            .unwrap();
        assert!(result["series"].is_array());
    }

    #[tokio::test]
    async fn non_succeeded_status_is_transport_error_with_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "REQUEST_NOT_PROCESSED",
                "message": ["series does not exist"]
            })))
            .mount(&server)
            .await;

        let adapter = BlsAdapter::with_base_url(None, server.uri(), Arc::new(Cache::new()));
        let err = adapter
            .get_series_data(&["BOGUS".to_string()], None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("series does not exist"));
    }

    #[tokio::test]
    async fn exceeding_anonymous_cap_still_issues_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "REQUEST_SUCCEEDED",
                "Results": {"series": []}
            })))
            .mount(&server)
            .await;

        let ids: Vec<String> = (0..30).map(|i| format!("SERIES{i}")).collect();
        let adapter = BlsAdapter::with_base_url(None, server.uri(), Arc::new(Cache::new()));
        let result = adapter.get_series_data(&ids, None, None).await.unwrap();
        assert!(result.is_some());
    }
}
