use crate::adapters::{cache_key, AdapterAvailability};
use crate::cache::Cache;
use crate::config::{Settings, Source, TtlClass};
use crate::models::Outcome;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

pub struct FredAdapter {
    api_key: Option<String>,
    base_url: String,
    client: Client,
    cache: Arc<Cache>,
    ttl_success: Duration,
    ttl_nodata: Duration,
}

impl FredAdapter {
    pub fn new(settings: &Settings, cache: Arc<Cache>) -> Self {
        Self {
            api_key: settings.fred_api_key().map(str::to_string),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: crate::utils::http::default_http_client(),
            cache,
            ttl_success: settings.cache_ttl_for(Source::Fred, TtlClass::Success),
            ttl_nodata: settings.cache_ttl_for(Source::Fred, TtlClass::NoData),
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

    pub async fn get_series_observations(
        &self,
        series_id: &str,
        observation_start: Option<&str>,
        observation_end: Option<&str>,
        limit: Option<u32>,
        offset: Option<u32>,
        sort_order: Option<&str>,
    ) -> anyhow::Result<Option<Value>> {
        if !self.is_available() {
            anyhow::bail!("FRED API key not configured");
        }
        let limit_str = limit.map(|l| l.to_string()).unwrap_or_default();
        let offset_str = offset.map(|o| o.to_string()).unwrap_or_default();
        let key = cache_key(
            "fred:series",
            &[
                ("series_id", series_id),
                ("observation_start", observation_start.unwrap_or("")),
                ("observation_end", observation_end.unwrap_or("")),
                ("limit", &limit_str),
                ("offset", &offset_str),
                ("sort_order", sort_order.unwrap_or("")),
            ],
        );

        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let api_key = self.api_key.clone().unwrap();
        let series_id = series_id.to_string();
        let observation_start = observation_start.map(str::to_string);
        let observation_end = observation_end.map(str::to_string);
        let sort_order = sort_order.map(str::to_string);

        self.cache
            .get_or_fetch(
                &key,
                self.ttl_success,
                self.ttl_nodata,
                self.ttl_nodata,
                self.ttl_nodata,
                self.ttl_nodata,
                move || async move {
                    let mut query: Vec<(String, String)> = vec![
                        ("series_id".to_string(), series_id),
                        ("api_key".to_string(), api_key),
                        ("file_type".to_string(), "json".to_string()),
                    ];
                    if let Some(v) = observation_start {
                        query.push(("observation_start".to_string(), v));
                    }
                    if let Some(v) = observation_end {
                        query.push(("observation_end".to_string(), v));
                    }
                    if let Some(v) = limit {
                        query.push(("limit".to_string(), v.to_string()));
                    }
                    if let Some(v) = offset {
                        query.push(("offset".to_string(), v.to_string()));
                    }
                    if let Some(v) = sort_order {
                        query.push(("sort_order".to_string(), v));
                    }

                    let resp = match client.get(&base_url).query(&query).send().await {
                        Ok(r) => r,
                        Err(e) if e.is_timeout() => return Outcome::TransportTimeout(e.into()),
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    let status = resp.status();
                    let json: Value = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    if !status.is_success() {
                        let msg = json
                            .get("error_message")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown FRED error");
                        return Outcome::TransportError(anyhow::anyhow!("FRED: {msg}"));
                    }

                    let observations = json.get("observations").and_then(|v| v.as_array());
                    match observations {
                        Some(obs) if !obs.is_empty() => Outcome::Success(json.clone()),
                        _ => Outcome::NoData,
                    }
                },
            )
            .await
    }

    pub async fn fetch_market_size(
        &self,
        series_id: &str,
        region: Option<&str>,
    ) -> anyhow::Result<Option<Value>> {
        let result = self
            .get_series_observations(series_id, None, None, Some(1), None, Some("desc"))
            .await?;
        let Some(payload) = result else {
            return Ok(None);
        };
        let Some(obs) = payload
            .get("observations")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
        else {
            return Ok(None);
        };

        let value = obs
            .get("value")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok());

        Ok(Some(json!({
            "value": value,
            "date": obs.get("date"),
            "seriesId": series_id,
            "region": region,
            "source": "FRED",
            "realtimeStart": obs.get("realtime_start"),
            "realtimeEnd": obs.get("realtime_end"),
        })))
    }
}

impl AdapterAvailability for FredAdapter {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn missing_keys(&self) -> Vec<String> {
        if self.api_key.is_some() {
            Vec::new()
        } else {
            vec!["FRED_API_KEY".to_string()]
        }
    }
}
