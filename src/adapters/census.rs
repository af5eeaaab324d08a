use crate::adapters::{cache_key, AdapterAvailability};
use crate::cache::Cache;
use crate::config::{Settings, Source, TtlClass};
use crate::models::Outcome;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.census.gov/data";
const CBP_DATASET_PATH: &str = "cbp";

pub struct CensusAdapter {
    api_key: Option<String>,
    base_url: String,
    client: Client,
    cache: Arc<Cache>,
    ttl_success: Duration,
    ttl_nodata: Duration,
}

impl CensusAdapter {
    pub fn new(settings: &Settings, cache: Arc<Cache>) -> Self {
        Self {
            api_key: settings.census_api_key().map(str::to_string),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: crate::utils::http::default_http_client(),
            cache,
            ttl_success: settings.cache_ttl_for(Source::Census, TtlClass::Success),
            ttl_nodata: settings.cache_ttl_for(Source::Census, TtlClass::NoData),
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

    pub async fn fetch_industry_data(
        &self,
        year: u32,
        dataset_path: &str,
        variables: &[String],
        for_geography: &str,
        extra_filters: &[(String, String)],
    ) -> anyhow::Result<Option<Value>> {
        self.fetch(year, dataset_path, variables, for_geography, extra_filters)
            .await
    }

    pub async fn fetch_market_size(
        &self,
        year: u32,
        naics_code: &str,
        variable: &str,
        for_geography: &str,
    ) -> anyhow::Result<Option<Value>> {
        self.fetch(
            year,
            CBP_DATASET_PATH,
            &[variable.to_string()],
            for_geography,
            &[("NAICS2017".to_string(), naics_code.to_string())],
        )
        .await
    }

    async fn fetch(
        &self,
        year: u32,
        dataset_path: &str,
        variables: &[String],
        for_geography: &str,
        extra_filters: &[(String, String)],
    ) -> anyhow::Result<Option<Value>> {
        let get_param = variables.join(",");
        let mut key_params: Vec<(&str, &str)> = vec![
            ("dataset", dataset_path),
            ("get", &get_param),
            ("for", for_geography),
        ];
        for (k, v) in extra_filters {
            key_params.push((k.as_str(), v.as_str()));
        }
        let year_str = year.to_string();
        key_params.push(("year", &year_str));
        let key = cache_key("census", &key_params);

        let client = self.client.clone();
        let url = format!("{}/{}/{}", self.base_url, year, dataset_path);
        let api_key = self.api_key.clone();
        let extra_filters = extra_filters.to_vec();
        let for_geography = for_geography.to_string();

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
                        vec![("get".to_string(), get_param), ("for".to_string(), for_geography)];
                    query.extend(extra_filters);
                    if let Some(k) = api_key {
                        query.push(("key".to_string(), k));
                    }

                    let resp = match client.get(&url).query(&query).send().await {
                        Ok(r) => r,
                        Err(e) if e.is_timeout() => return Outcome::TransportTimeout(e.into()),
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    let status = resp.status();
                    if !status.is_success() {
                        let body = resp.text().await.unwrap_or_default();
                        return Outcome::TransportError(anyhow::anyhow!(
                            "Census HTTP {status}: {body}"
                        ));
                    }

                    let rows: Vec<Vec<String>> = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => return Outcome::TransportError(e.into()),
                    };
                    if rows.len() <= 1 {
                        return Outcome::NoData;
                    }
                    Outcome::Success(rows_to_objects(&rows))
                },
            )
            .await
    }
}

/// Census responses are a header row plus data rows of raw strings; turn
/// them into an array of objects, coercing purely-digit fields to integers.
fn rows_to_objects(rows: &[Vec<String>]) -> Value {
    let header = &rows[0];
    let records: Vec<Value> = rows[1..]
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (col, value) in header.iter().zip(row.iter()) {
                let parsed = if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                    value
                        .parse::<i64>()
                        .map(Value::from)
                        .unwrap_or_else(|_| Value::String(value.clone()))
                } else {
                    Value::String(value.clone())
                };
                obj.insert(col.clone(), parsed);
            }
            Value::Object(obj)
        })
        .collect();
    Value::Array(records)
}

impl AdapterAvailability for CensusAdapter {
    fn is_available(&self) -> bool {
        true
    }

    fn missing_keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn warnings(&self) -> Vec<String> {
        if self.api_key.is_none() {
            vec!["Census: using anonymous access, subject to tighter provider rate limits".to_string()]
        } else {
            Vec::new()
        }
    }
}
