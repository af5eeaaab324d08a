//! Central orchestrator. Holds one instance of every adapter and implements
//! the analytical and multi-source operations that sit above them. Adapters
//! themselves never call each other; only `DataService` composes them.

use crate::adapters::alpha_vantage::AlphaVantageAdapter;
use crate::adapters::bls::BlsAdapter;
use crate::adapters::census::CensusAdapter;
use crate::adapters::fred::FredAdapter;
use crate::adapters::imf::ImfAdapter;
use crate::adapters::nasdaq::NasdaqAdapter;
use crate::adapters::oecd::OecdAdapter;
use crate::adapters::world_bank::WorldBankAdapter;
use crate::adapters::AdapterAvailability;
use crate::cache::Cache;
use crate::config::Settings;
use crate::models::{
    Industry, IndustryCodes, IndustrySearchResult, MarketSizeEstimate, SegmentationAdjustment,
    SourceError, TamOutput,
};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::LazyLock;

pub struct DataService {
    pub alpha_vantage: AlphaVantageAdapter,
    pub bls: BlsAdapter,
    pub census: CensusAdapter,
    pub fred: FredAdapter,
    pub imf: ImfAdapter,
    pub nasdaq: NasdaqAdapter,
    pub oecd: OecdAdapter,
    pub world_bank: WorldBankAdapter,
}

impl DataService {
    pub fn new(settings: &Settings, cache: Arc<Cache>) -> Self {
        Self {
            alpha_vantage: AlphaVantageAdapter::new(settings, cache.clone()),
            bls: BlsAdapter::new(settings, cache.clone()),
            census: CensusAdapter::new(settings, cache.clone()),
            fred: FredAdapter::new(settings, cache.clone()),
            imf: ImfAdapter::new(settings, cache.clone()),
            nasdaq: NasdaqAdapter::new(settings, cache.clone()),
            oecd: OecdAdapter::new(settings, cache.clone()),
            world_bank: WorldBankAdapter::new(settings, cache),
        }
    }

    // ---- pass-through tool methods -------------------------------------

    pub async fn nasdaq_get_latest_dataset_value(
        &self,
        database_code: &str,
        dataset_code: &str,
    ) -> anyhow::Result<Option<Value>> {
        let result = self
            .nasdaq
            .get_dataset_time_series(database_code, dataset_code, Some(1), Some("desc"), None, None, None)
            .await?;
        Ok(result.and_then(|dataset| {
            let columns = dataset.get("column_names")?.as_array()?;
            let row = dataset.get("data")?.as_array()?.first()?;
            let mut obj = serde_json::Map::new();
            for (col, val) in columns.iter().zip(row.as_array()?.iter()) {
                obj.insert(col.as_str()?.to_string(), val.clone());
            }
            Some(Value::Object(obj))
        }))
    }

    pub async fn oecd_get_latest_observation(
        &self,
        dataset_id: &str,
        filter_expression: &str,
    ) -> anyhow::Result<Option<Value>> {
        let result = self.oecd.get_dataset(dataset_id, filter_expression, None, None).await?;
        Ok(result.and_then(|records| {
            records
                .as_array()
                .and_then(|arr| arr.iter().max_by_key(|r| r["TIME_PERIOD"].to_string()))
                .cloned()
        }))
    }

    // ---- analytical operations ------------------------------------------

    /// `yearByYear[i] = baseMarketSize * (1 + annualGrowthRate)^i` for
    /// `i` in `1..=projectionYears`. The final year's value is multiplied by
    /// the segmentation factor, if given, to produce `calculatedTam`.
    pub fn calculate_tam(
        &self,
        base_market_size: f64,
        annual_growth_rate: f64,
        projection_years: u32,
        segmentation_adjustments: Option<SegmentationAdjustment>,
    ) -> TamOutput {
        let year_by_year: Vec<(u32, f64)> = (1..=projection_years)
            .map(|i| (i, base_market_size * (1.0 + annual_growth_rate).powi(i as i32)))
            .collect();

        let final_value = year_by_year.last().map(|(_, v)| *v).unwrap_or(base_market_size);
        let factor = segmentation_adjustments.as_ref().map(|s| s.factor).unwrap_or(1.0);
        let calculated_tam = final_value * factor;

        let mut assumptions = vec![
            format!("base market size = {base_market_size}"),
            format!("annual growth rate = {annual_growth_rate}"),
            format!("projection years = {projection_years}"),
        ];
        if let Some(adj) = segmentation_adjustments {
            assumptions.push(format!("segmentation factor = {}", adj.factor));
            if let Some(rationale) = adj.rationale {
                assumptions.push(format!("segmentation rationale: {rationale}"));
            }
        }

        TamOutput { calculated_tam, year_by_year, assumptions }
    }

    pub async fn search_industries(
        &self,
        query: &str,
        sources: Option<&[String]>,
        limit: usize,
        min_relevance_score: f64,
        geography_filter: Option<&str>,
    ) -> IndustrySearchResult {
        let allowed = |name: &str| sources.map(|s| s.iter().any(|x| x.eq_ignore_ascii_case(name))).unwrap_or(true);

        let mut tasks: Vec<_> = Vec::new();
        if allowed("AlphaVantage") {
            tasks.push(("AlphaVantage", self.search_alpha_vantage(query)));
        }
        if allowed("Census") {
            tasks.push(("Census", self.search_census(query)));
        }
        if allowed("WorldBank") {
            tasks.push(("WorldBank", self.search_world_bank(query)));
        }

        let (names, futures): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let outcomes = futures_util::future::join_all(futures).await;

        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (name, outcome) in names.into_iter().zip(outcomes) {
            match outcome {
                Ok(mut industries) => results.append(&mut industries),
                Err(e) => errors.push(SourceError { source_name: name.to_string(), message: e.to_string() }),
            }
        }

        if let Some(geo) = geography_filter {
            results.retain(|i: &Industry| i.geography.as_deref() == Some(geo));
        }
        results.retain(|i| i.relevance_score >= min_relevance_score);
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_details.first().cmp(&b.source_details.first()))
                .then_with(|| a.industry_id.cmp(&b.industry_id))
        });
        results.truncate(limit);

        IndustrySearchResult { results, errors }
    }

    async fn search_alpha_vantage(&self, query: &str) -> anyhow::Result<Vec<Industry>> {
        if !self.alpha_vantage.is_available() {
            anyhow::bail!("AlphaVantage unavailable: {}", self.alpha_vantage.missing_keys().join(", "));
        }
        let result = self.alpha_vantage.search_symbols(query).await?;
        let Some(payload) = result else { return Ok(Vec::new()) };
        let matches = payload.get("bestMatches").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        Ok(matches
            .iter()
            .filter_map(|m| {
                let symbol = m.get("1. symbol")?.as_str()?;
                let name = m.get("2. name")?.as_str()?;
                let region = m.get("4. region").and_then(|v| v.as_str());
                let text = format!("{symbol} {name}");
                Some(Industry {
                    industry_id: format!("alpha_vantage:{symbol}"),
                    name: name.to_string(),
                    description: format!("Publicly traded company ({symbol})"),
                    codes: IndustryCodes { naics: None, isic: None },
                    geography: region.map(str::to_string),
                    market_size: None,
                    currency: None,
                    year: None,
                    source_details: vec!["AlphaVantage".to_string()],
                    last_updated: Some(now_timestamp()),
                    relevance_score: token_overlap_score(query, &text),
                })
            })
            .collect())
    }

    async fn search_census(&self, query: &str) -> anyhow::Result<Vec<Industry>> {
        Ok(NAICS_CATALOG
            .iter()
            .map(|entry| {
                let text = format!("{} {}", entry.name, entry.description);
                Industry {
                    industry_id: format!("census:{}", entry.naics),
                    name: entry.name.to_string(),
                    description: entry.description.to_string(),
                    codes: IndustryCodes { naics: Some(entry.naics.to_string()), isic: None },
                    geography: Some("US".to_string()),
                    market_size: None,
                    currency: Some("USD".to_string()),
                    year: None,
                    source_details: vec!["Census".to_string()],
                    last_updated: Some(now_timestamp()),
                    relevance_score: token_overlap_score(query, &text),
                }
            })
            .collect())
    }

    async fn search_world_bank(&self, query: &str) -> anyhow::Result<Vec<Industry>> {
        Ok(WORLD_BANK_CATALOG
            .iter()
            .map(|entry| {
                let text = format!("{} {}", entry.name, entry.description);
                Industry {
                    industry_id: format!("world_bank:{}", entry.indicator),
                    name: entry.name.to_string(),
                    description: entry.description.to_string(),
                    codes: IndustryCodes { naics: None, isic: Some(entry.indicator.to_string()) },
                    geography: None,
                    market_size: None,
                    currency: Some("USD".to_string()),
                    year: None,
                    source_details: vec!["WorldBank".to_string()],
                    last_updated: Some(now_timestamp()),
                    relevance_score: token_overlap_score(query, &text),
                }
            })
            .collect())
    }

    /// Routes by a heuristic on `industry_query`: a stock-symbol shape
    /// prefers Alpha Vantage market cap, a NAICS shape prefers Census, and
    /// anything else falls through World Bank then FRED in order.
    pub async fn calculate_market_size(
        &self,
        industry_query: &str,
        geography_codes: Option<&[String]>,
        indicator_codes: Option<&[String]>,
        year: Option<i32>,
        methodology: &str,
    ) -> MarketSizeEstimate {
        if STOCK_SYMBOL_RE.is_match(industry_query) && self.alpha_vantage.is_available() {
            if let Ok(Some(overview)) = self.alpha_vantage.get_company_overview(industry_query).await {
                if let Some(cap) = overview.get("marketCapitalization").and_then(|v| v.as_f64()) {
                    return MarketSizeEstimate {
                        estimated_market_size: Some(cap),
                        currency: Some("USD".to_string()),
                        year,
                        data_sources_used: vec!["AlphaVantage".to_string()],
                        confidence_score: Some(0.9),
                        methodology_used: methodology.to_string(),
                    };
                }
            }
        }

        if NAICS_RE.is_match(industry_query) {
            let geography = geography_codes.and_then(|g| g.first()).map(String::as_str).unwrap_or("us:*");
            if let Ok(Some(rows)) = self
                .census
                .fetch_market_size(year.unwrap_or(2022) as u32, industry_query, "EMP", geography)
                .await
            {
                if let Some(value) = rows.as_array().and_then(|a| a.first()).and_then(|r| r.get("EMP")).and_then(|v| v.as_f64()) {
                    return MarketSizeEstimate {
                        estimated_market_size: Some(value),
                        currency: Some("USD".to_string()),
                        year,
                        data_sources_used: vec!["Census".to_string()],
                        confidence_score: Some(0.75),
                        methodology_used: methodology.to_string(),
                    };
                }
            }
        }

        let country = geography_codes.and_then(|g| g.first()).map(String::as_str).unwrap_or("WLD");
        if let Ok(Some(row)) = self.world_bank.fetch_market_size(country, Some(industry_query)).await {
            if let Some(value) = row.get("value").and_then(|v| v.as_f64()) {
                return MarketSizeEstimate {
                    estimated_market_size: Some(value),
                    currency: Some("USD".to_string()),
                    year: row.get("date").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()).or(year),
                    data_sources_used: vec!["WorldBank".to_string()],
                    confidence_score: Some(0.6),
                    methodology_used: methodology.to_string(),
                };
            }
        }

        if let Some(series_id) = indicator_codes.and_then(|c| c.first()) {
            if self.fred.is_available() {
                if let Ok(Some(row)) = self.fred.fetch_market_size(series_id, geography_codes.and_then(|g| g.first()).map(String::as_str)).await {
                    if let Some(value) = row.get("value").and_then(|v| v.as_f64()) {
                        return MarketSizeEstimate {
                            estimated_market_size: Some(value),
                            currency: Some("USD".to_string()),
                            year,
                            data_sources_used: vec!["FRED".to_string()],
                            confidence_score: Some(0.65),
                            methodology_used: methodology.to_string(),
                        };
                    }
                }
            }
        }

        MarketSizeEstimate {
            estimated_market_size: None,
            currency: None,
            year,
            data_sources_used: Vec::new(),
            confidence_score: None,
            methodology_used: methodology.to_string(),
        }
    }

    pub async fn get_company_financials(
        &self,
        company_symbol: &str,
        statement_type: &str,
        period: &str,
        limit: usize,
    ) -> anyhow::Result<Value> {
        if statement_type.eq_ignore_ascii_case("overview") {
            let overview = self.alpha_vantage.get_company_overview(company_symbol).await?;
            return Ok(overview.unwrap_or(Value::Null));
        }

        let statement = match statement_type.to_lowercase().as_str() {
            "income_statement" => self.alpha_vantage.get_income_statement(company_symbol).await?,
            "balance_sheet" => self.alpha_vantage.get_balance_sheet(company_symbol).await?,
            "cash_flow" => self.alpha_vantage.get_cash_flow(company_symbol).await?,
            other => anyhow::bail!("unknown statement type '{other}'"),
        };
        let Some(statement) = statement else { return Ok(Value::Null) };

        let reports_key = if period.eq_ignore_ascii_case("quarterly") {
            "quarterlyReports"
        } else {
            "annualReports"
        };
        let reports = statement
            .get(reports_key)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let sliced: Vec<Value> = reports.into_iter().take(limit).collect();
        Ok(json!({ reports_key: sliced }))
    }
}

struct CatalogEntry {
    naics: &'static str,
    name: &'static str,
    description: &'static str,
}

/// Small curated industry/NAICS lookup table. Census exposes bulk tabular
/// data, not a search endpoint, so this is the knowledge `search_industries`
/// matches `query` against before delegating the actual numbers to
/// `fetch_industry_data`/`fetch_market_size`.
static NAICS_CATALOG: &[CatalogEntry] = &[
    CatalogEntry { naics: "541511", name: "Custom Computer Programming Services", description: "Software development and programming services" },
    CatalogEntry { naics: "334111", name: "Electronic Computer Manufacturing", description: "Manufacturing of computers and computing hardware" },
    CatalogEntry { naics: "621111", name: "Offices of Physicians", description: "Healthcare services provided by physicians" },
    CatalogEntry { naics: "522110", name: "Commercial Banking", description: "Deposit-taking and lending financial services" },
    CatalogEntry { naics: "311111", name: "Dog and Cat Food Manufacturing", description: "Pet food manufacturing industry" },
    CatalogEntry { naics: "221111", name: "Hydroelectric Power Generation", description: "Electric power generation from hydroelectric sources" },
];

struct WorldBankCatalogEntry {
    indicator: &'static str,
    name: &'static str,
    description: &'static str,
}

static WORLD_BANK_CATALOG: &[WorldBankCatalogEntry] = &[
    WorldBankCatalogEntry { indicator: "NY.GDP.MKTP.CD", name: "Gross Domestic Product", description: "Total economic output of a country" },
    WorldBankCatalogEntry { indicator: "IC.BUS.EASE.XQ", name: "Technology & Business Environment", description: "Ease of doing business, a proxy for the technology sector" },
    WorldBankCatalogEntry { indicator: "NV.IND.MANF.ZS", name: "Manufacturing", description: "Manufacturing value added as a share of GDP" },
    WorldBankCatalogEntry { indicator: "NV.AGR.TOTL.ZS", name: "Agriculture", description: "Agriculture, forestry, and fishing value added" },
    WorldBankCatalogEntry { indicator: "EG.USE.COMM.GD.PP.KD", name: "Energy", description: "Commercial energy use per unit of GDP" },
];

static STOCK_SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{1,5}$").unwrap());
static NAICS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2,6}$").unwrap());

/// RFC 3339 timestamp stamped onto search results at the moment they're
/// assembled, since neither the catalog entries nor Alpha Vantage's search
/// response carry their own "as of" date.
fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Jaccard overlap between the lowercased whitespace-tokenized `query` and
/// `haystack`. Zero shared tokens scores zero; identical token sets score 1.
fn token_overlap_score(query: &str, haystack: &str) -> f64 {
    use std::collections::HashSet;
    let tokenize = |s: &str| -> HashSet<String> {
        s.to_lowercase().split_whitespace().map(str::to_string).collect()
    };
    let q = tokenize(query);
    let h = tokenize(haystack);
    if q.is_empty() || h.is_empty() {
        return 0.0;
    }
    let intersection = q.intersection(&h).count();
    let union = q.union(&h).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::collections::HashMap;

    fn service() -> DataService {
        let settings = Settings::from_map(HashMap::new());
        DataService::new(&settings, Arc::new(Cache::new()))
    }

    #[test]
    fn tam_matches_documented_example_without_segmentation() {
        let result = service().calculate_tam(10_000.0, 0.05, 8, None);
        assert!((result.calculated_tam - 14_774.55).abs() < 1.0);
    }

    #[test]
    fn tam_applies_segmentation_factor_to_final_year_only() {
        let result = service().calculate_tam(
            1_000_000.0,
            0.1,
            3,
            Some(SegmentationAdjustment { factor: 0.5, rationale: None }),
        );
        let unsegmented_final = 1_000_000.0 * 1.1_f64.powi(3);
        assert!((result.calculated_tam - unsegmented_final * 0.5).abs() < 0.01);
    }

    #[test]
    fn token_overlap_scores_identical_text_as_one() {
        assert_eq!(token_overlap_score("software development", "software development"), 1.0);
    }

    #[test]
    fn token_overlap_scores_disjoint_text_as_zero() {
        assert_eq!(token_overlap_score("software", "agriculture livestock"), 0.0);
    }

    #[test]
    fn stock_symbol_regex_matches_short_uppercase_tickers() {
        assert!(STOCK_SYMBOL_RE.is_match("AAPL"));
        assert!(!STOCK_SYMBOL_RE.is_match("541511"));
    }

    #[test]
    fn naics_regex_matches_digit_codes() {
        assert!(NAICS_RE.is_match("541511"));
        assert!(!NAICS_RE.is_match("AAPL"));
    }
}
