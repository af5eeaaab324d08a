use crate::adapters::{cache_key, AdapterAvailability};
use crate::cache::Cache;
use crate::config::{Settings, Source, TtlClass};
use crate::models::Outcome;
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://dataservices.imf.org/REST/SDMX_JSON.svc/CompactData";

pub struct ImfAdapter {
    base_url: String,
    client: Client,
    cache: Arc<Cache>,
    ttl_success: Duration,
    ttl_nodata: Duration,
}

impl ImfAdapter {
    pub fn new(settings: &Settings, cache: Arc<Cache>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client: crate::utils::http::default_http_client(),
            cache,
            ttl_success: settings.cache_ttl_for(Source::Imf, TtlClass::Success),
            ttl_nodata: settings.cache_ttl_for(Source::Imf, TtlClass::NoData),
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
        dataflow_id: &str,
        key: &str,
        start_period: Option<&str>,
        end_period: Option<&str>,
    ) -> anyhow::Result<Option<Value>> {
        let cache_key = cache_key(
            "imf:dataset",
            &[
                ("dataflow_id", dataflow_id),
                ("key", key),
                ("start_period", start_period.unwrap_or("")),
                ("end_period", end_period.unwrap_or("")),
            ],
        );

        let client = self.client.clone();
        let url = format!("{}/{}/{}", self.base_url, dataflow_id, key);
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
                    let mut query: Vec<(String, String)> = Vec::new();
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
                        return Outcome::TransportError(anyhow::anyhow!("IMF HTTP {status}"));
                    }
                    let json: Value = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => return Outcome::TransportError(e.into()),
                    };

                    match parse_compact_sdmx(&json) {
                        None => Outcome::NoData,
                        Some(records) if records.is_empty() => Outcome::NoData,
                        Some(records) => Outcome::Success(Value::Array(records)),
                    }
                },
            )
            .await
    }

    /// Convenience wrapper returning only the most recent observation.
    pub async fn get_latest_observation(
        &self,
        dataflow_id: &str,
        key: &str,
    ) -> anyhow::Result<Option<Value>> {
        let result = self.get_dataset(dataflow_id, key, None, None).await?;
        Ok(result.and_then(|records| {
            records
                .as_array()
                .and_then(|arr| arr.iter().max_by_key(|r| r["TIME_PERIOD"].to_string()))
                .cloned()
        }))
    }
}

/// Parses an SDMX-JSON Compact payload into a flat array of records, one per
/// observation, each carrying its resolved dimension/attribute labels plus
/// `TIME_PERIOD` and `value`. Returns `None` (not an error) when the
/// structure section IMF requires is absent.
fn parse_compact_sdmx(json: &Value) -> Option<Vec<Value>> {
    let series_dims = json.pointer("/structure/dimensions/series")?.as_array()?;
    let obs_dims = json
        .pointer("/structure/dimensions/observation")
        .and_then(|v| v.as_array());
    let series_attrs = json
        .pointer("/structure/attributes/series")
        .and_then(|v| v.as_array());
    let obs_attrs = json
        .pointer("/structure/attributes/observation")
        .and_then(|v| v.as_array());
    let time_period_values = obs_dims
        .and_then(|dims| dims.first())
        .and_then(|d| d.get("values"))
        .and_then(|v| v.as_array());

    let series_obj = json.pointer("/dataSets/0/series")?.as_object()?;

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
        if let (Some(attr_indices), Some(attr_defs)) =
            (series_val.get("attributes").and_then(|v| v.as_array()), series_attrs)
        {
            for (attr_def, idx) in attr_defs.iter().zip(attr_indices.iter()) {
                let Some(idx) = idx.as_u64() else { continue };
                let attr_id = attr_def.get("id").and_then(|v| v.as_str()).unwrap_or("ATTR");
                if let Some(entry) = attr_def.get("values").and_then(|v| v.as_array()).and_then(|a| a.get(idx as usize)) {
                    labels.insert(attr_id.to_string(), entry.get("name").cloned().unwrap_or(Value::Null));
                }
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

            if let Some(obs_attr_defs) = obs_attrs {
                for (i, attr_def) in obs_attr_defs.iter().enumerate() {
                    let Some(idx) = obs_arr.get(i + 1).and_then(|v| v.as_u64()) else { continue };
                    let attr_id = attr_def.get("id").and_then(|v| v.as_str()).unwrap_or("ATTR");
                    if let Some(entry) = attr_def.get("values").and_then(|v| v.as_array()).and_then(|a| a.get(idx as usize)) {
                        record.insert(attr_id.to_string(), entry.get("name").cloned().unwrap_or(Value::Null));
                        record.insert(format!("{attr_id}_ID"), entry.get("id").cloned().unwrap_or(Value::Null));
                    }
                }
            }

            records.push(Value::Object(record));
        }
    }
    Some(records)
}

impl AdapterAvailability for ImfAdapter {
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

    fn sample_payload() -> Value {
        json!({
            "structure": {
                "dimensions": {
                    "series": [
                        {"id": "FREQ", "values": [{"id": "A", "name": "Annual"}]},
                        {"id": "REF_AREA", "values": [{"id": "US", "name": "United States"}]}
                    ],
                    "observation": [
                        {"id": "TIME_PERIOD", "values": [{"id": "2024", "name": "2024"}, {"id": "2025", "name": "2025"}]}
                    ]
                },
                "attributes": {"series": [], "observation": []}
            },
            "dataSets": [{
                "series": {
                    "0:0": {
                        "attributes": [],
                        "observations": {"0": [1.5], "1": [2.5]}
                    }
                }
            }]
        })
    }

    #[tokio::test]
    async fn missing_dimensions_series_is_no_data_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"structure": {}})))
            .mount(&server)
            .await;

        let adapter = ImfAdapter::with_base_url(server.uri(), Arc::new(Cache::new()));
        let result = adapter.get_dataset("IFS", "A.US.NGDP", None, None).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn flattens_series_into_labeled_observation_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
            .mount(&server)
            .await;

        let adapter = ImfAdapter::with_base_url(server.uri(), Arc::new(Cache::new()));
        let result = adapter
            .get_dataset("IFS", "A.US.NGDP", None, None)
            .await
            .unwrap()
            .unwrap();
        let records = result.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["FREQ"], "Annual");
        assert_eq!(records[0]["REF_AREA"], "United States");
        assert!(records.iter().any(|r| r["TIME_PERIOD"] == "2024" && r["value"] == 1.5));
    }

    #[tokio::test]
    async fn latest_observation_picks_max_time_period() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
            .mount(&server)
            .await;

        let adapter = ImfAdapter::with_base_url(server.uri(), Arc::new(Cache::new()));
        let result = adapter
            .get_latest_observation("IFS", "A.US.NGDP")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["TIME_PERIOD"], "2025");
        assert_eq!(result["value"], 2.5);
    }
}
