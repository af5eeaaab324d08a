use crate::adapters::{cache_key, AdapterAvailability};
use crate::cache::Cache;
use crate::config::{Settings, Source, TtlClass};
use crate::models::Outcome;
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://sdmx.oecd.org/public/rest/data";

pub struct OecdAdapter {
    base_url: String,
    client: Client,
    cache: Arc<Cache>,
    ttl_success: Duration,
    ttl_nodata: Duration,
}

impl OecdAdapter {
    pub fn new(settings: &Settings, cache: Arc<Cache>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client: crate::utils::http::default_http_client(),
            cache,
            ttl_success: settings.cache_ttl_for(Source::Oecd, TtlClass::Success),
            ttl_nodata: settings.cache_ttl_for(Source::Oecd, TtlClass::NoData),
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

    pub async fn get_dataset(
        &self,
        dataset_id: &str,
        filter_expression: &str,
        start_period: Option<&str>,
        end_period: Option<&str>,
    ) -> anyhow::Result<Option<Value>> {
        let cache_key = cache_key(
            "oecd:dataset",
            &[
                ("dataset_id", dataset_id),
                ("filter_expression", filter_expression),
                ("start_period", start_period.unwrap_or("")),
                ("end_period", end_period.unwrap_or("")),
            ],
        );

        let client = self.client.clone();
        let url = format!("{}/{}/{}", self.base_url, dataset_id, filter_expression);
        let start_period = start_period.map(str::to_string);
        let end_period = end_period.map(str::to_string);

        self.cache
            .get_or_fetch(
                &cache_key,
                self.ttl_success,
                self.ttl_nodata,
                self.ttl_nodata,
                self.ttl_nodata,
                self.ttl_nodata,
                move || async move {
                    let mut query: Vec<(String, String)> =
                        vec![("format".to_string(), "jsondata".to_string())];
                    if let Some(v) = start_period {
                        query.push(("startPeriod".to_string(), v));
                    }
                    if let Some(v) = end_period {
                        query.push(("endPeriod".to_string(), v));
                    }

                    let resp = match client.get(&url).query(&query).send().await {
                        Ok(r) => r,
                        Err(e) if e.is_timeout() => return Outcome::TransportTimeout(e.into()),
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    let status = resp.status();
                    if !status.is_success() {
                        return Outcome::TransportError(anyhow::anyhow!("OECD HTTP {status}"));
                    }
                    let json: Value = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => return Outcome::TransportError(e.into()),
                    };

                    match parse_sdmx(&json) {
                        None => Outcome::NoData,
                        Some(records) if records.is_empty() => Outcome::NoData,
                        Some(records) => Outcome::Success(Value::Array(records)),
                    }
                },
            )
            .await
    }
}

/// Flattens an OECD SDMX-JSON payload into labeled observation records,
/// supporting both the observation-centric shape (`dataSets[0].observations`,
/// keyed by a single combined dimension index) and the series-centric shape
/// (`dataSets[0].series`, same structure IMF uses). Returns `None` when
/// neither shape's structure section is present.
fn parse_sdmx(json: &Value) -> Option<Vec<Value>> {
    let obs_dims = json
        .pointer("/structure/dimensions/observation")
        .and_then(|v| v.as_array());

    if let Some(series_obj) = json.pointer("/dataSets/0/series").and_then(|v| v.as_object()) {
        let series_dims = json.pointer("/structure/dimensions/series")?.as_array()?;
        let time_period_values = obs_dims
            .and_then(|dims| dims.first())
            .and_then(|d| d.get("values"))
            .and_then(|v| v.as_array());
        return Some(flatten_series(series_obj, series_dims, time_period_values));
    }

    if let Some(observations) = json
        .pointer("/dataSets/0/observations")
        .and_then(|v| v.as_object())
    {
        let dims = obs_dims?;
        return Some(flatten_observations(observations, dims));
    }

    None
}

fn flatten_series(
    series_obj: &Map<String, Value>,
    series_dims: &[Value],
    time_period_values: Option<&Vec<Value>>,
) -> Vec<Value> {
    let mut records = Vec::new();
    for (series_key, series_val) in series_obj {
        let indices: Vec<usize> = series_key.split(':').filter_map(|s| s.parse().ok()).collect();
        let mut labels = Map::new();
        for (dim, &idx) in series_dims.iter().zip(indices.iter()) {
            let dim_id = dim.get("id").and_then(|v| v.as_str()).unwrap_or("DIM");
            if let Some(entry) = dim.get("values").and_then(|v| v.as_array()).and_then(|a| a.get(idx)) {
                labels.insert(dim_id.to_string(), entry.get("name").cloned().unwrap_or(Value::Null));
                labels.insert(format!("{dim_id}_ID"), entry.get("id").cloned().unwrap_or(Value::Null));
            }
        }

        let Some(observations) = series_val.get("observations").and_then(|v| v.as_object()) else {
            continue;
        };
        for (obs_key, obs_val) in observations {
            let Some(obs_arr) = obs_val.as_array() else { continue };
            let mut record = labels.clone();
            let time_period = obs_key
                .parse::<usize>()
                .ok()
                .and_then(|idx| time_period_values.and_then(|tv| tv.get(idx)))
                .and_then(|v| v.get("id").cloned())
                .unwrap_or_else(|| Value::String(obs_key.clone()));
            record.insert("TIME_PERIOD".to_string(), time_period);
            record.insert("value".to_string(), obs_arr.first().cloned().unwrap_or(Value::Null));
            records.push(Value::Object(record));
        }
    }
    records
}

/// Observation-centric keys combine every dimension index into one colon
/// string, e.g. `"0:2:1"` against `structure.dimensions.observation`.
fn flatten_observations(observations: &Map<String, Value>, dims: &[Value]) -> Vec<Value> {
    let mut records = Vec::new();
    for (obs_key, obs_val) in observations {
        let Some(obs_arr) = obs_val.as_array() else { continue };
        let indices: Vec<usize> = obs_key.split(':').filter_map(|s| s.parse().ok()).collect();
        let mut record = Map::new();
        for (dim, &idx) in dims.iter().zip(indices.iter()) {
            let dim_id = dim.get("id").and_then(|v| v.as_str()).unwrap_or("DIM");
            if let Some(entry) = dim.get("values").and_then(|v| v.as_array()).and_then(|a| a.get(idx)) {
                let label = entry.get("id").cloned().unwrap_or(Value::Null);
                if dim_id == "TIME_PERIOD" {
                    record.insert("TIME_PERIOD".to_string(), label);
                } else {
                    record.insert(dim_id.to_string(), entry.get("name").cloned().unwrap_or(Value::Null));
                    record.insert(format!("{dim_id}_ID"), label);
                }
            }
        }
        record.insert("value".to_string(), obs_arr.first().cloned().unwrap_or(Value::Null));
        records.push(Value::Object(record));
    }
    records
}

impl AdapterAvailability for OecdAdapter {
    fn is_available(&self) -> bool {
        true
    }

    fn missing_keys(&self) -> Vec<String> {
        Vec::new()
    }
}
