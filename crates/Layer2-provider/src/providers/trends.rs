//! Trends data client
//!
//! Talks to a pytrends-style HTTP service:
//! `GET {base}/interest_over_time?kw=a,b&timeframe=..&geo=..&cat=..&gprop=..&tz=..&hl=en-US`
//! answering with an array of `{"date": .., "isPartial": .., "<keyword>": <value>}` rows.

use crate::{error::ProviderError, r#trait::TrendsSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use taskhook_foundation::{Error, Result, TrendsConfig};
use tracing::debug;

pub const DEFAULT_TIMEFRAME: &str = "today 5-y";
pub const DEFAULT_TZ: i32 = -300;
pub const MAX_KEYWORDS: usize = 5;

// ============================================================================
// Query
// ============================================================================

/// Search property a trends query is scoped to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendsProperty {
    #[default]
    Web,
    Youtube,
    News,
    Images,
}

impl TrendsProperty {
    /// Wire value; web search is the empty string
    pub fn as_param(&self) -> &'static str {
        match self {
            TrendsProperty::Web => "",
            TrendsProperty::Youtube => "youtube",
            TrendsProperty::News => "news",
            TrendsProperty::Images => "images",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Request payload for a `trends` task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendsQuery {
    /// One keyword or a list of keywords
    q: OneOrMany,
    #[serde(default)]
    pub geo: String,
    #[serde(default = "default_timeframe")]
    pub time: String,
    #[serde(default)]
    pub cat: u32,
    #[serde(default)]
    pub gprop: TrendsProperty,
    #[serde(default = "default_tz")]
    pub tz: i32,
}

fn default_timeframe() -> String {
    DEFAULT_TIMEFRAME.to_string()
}

fn default_tz() -> i32 {
    DEFAULT_TZ
}

impl TrendsQuery {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            q: OneOrMany::Many(keywords.into_iter().map(Into::into).collect()),
            geo: String::new(),
            time: default_timeframe(),
            cat: 0,
            gprop: TrendsProperty::default(),
            tz: DEFAULT_TZ,
        }
    }

    pub fn with_geo(mut self, geo: impl Into<String>) -> Self {
        self.geo = geo.into();
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = time.into();
        self
    }

    pub fn with_gprop(mut self, gprop: TrendsProperty) -> Self {
        self.gprop = gprop;
        self
    }

    /// Trimmed, non-empty keywords
    pub fn keywords(&self) -> Vec<String> {
        let raw: Vec<&String> = match &self.q {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v.iter().collect(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let keywords = self.keywords();
        if keywords.is_empty() {
            return Err(Error::InvalidInput(
                "q must contain at least one keyword".to_string(),
            ));
        }
        if keywords.len() > MAX_KEYWORDS {
            return Err(Error::InvalidInput(format!(
                "q accepts at most {} keywords",
                MAX_KEYWORDS
            )));
        }
        if self.time.trim().is_empty() {
            return Err(Error::InvalidInput("time must not be empty".to_string()));
        }
        Ok(())
    }

    fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("kw", self.keywords().join(",")),
            ("timeframe", self.time.clone()),
            ("geo", self.geo.clone()),
            ("cat", self.cat.to_string()),
            ("gprop", self.gprop.as_param().to_string()),
            ("tz", self.tz.to_string()),
            ("hl", "en-US".to_string()),
        ]
    }
}

// ============================================================================
// Result
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryValue {
    pub query: String,
    pub value: f64,
}

/// One row of an interest-over-time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub is_partial: bool,
    pub q_list: Vec<QueryValue>,
}

impl TrendPoint {
    /// Build from a raw record, keeping `keywords` order; missing values are 0
    fn from_record(record: &Map<String, Value>, keywords: &[String]) -> Self {
        let date = match record.get("date") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let is_partial = record
            .get("isPartial")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let q_list = keywords
            .iter()
            .map(|kw| QueryValue {
                query: kw.clone(),
                value: record.get(kw).and_then(Value::as_f64).unwrap_or(0.0),
            })
            .collect();

        Self {
            date,
            is_partial,
            q_list,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct TrendsClient {
    client: Client,
    base_url: String,
}

impl TrendsClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &TrendsConfig) -> std::result::Result<Self, ProviderError> {
        Self::new(&config.api_url, config.request_timeout())
    }
}

#[async_trait]
impl TrendsSource for TrendsClient {
    async fn interest_over_time(
        &self,
        query: &TrendsQuery,
    ) -> std::result::Result<Vec<TrendPoint>, ProviderError> {
        let keywords = query.keywords();
        debug!(keywords = ?keywords, timeframe = %query.time, "Fetching interest over time");

        let response = self
            .client
            .get(format!("{}/interest_over_time", self.base_url))
            .query(&query.query_params())
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_http_status(status.as_u16(), &body));
        }

        let records: Vec<Map<String, Value>> = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(records
            .iter()
            .map(|record| TrendPoint::from_record(record, &keywords))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_q_accepts_string_or_list() {
        let single: TrendsQuery = serde_json::from_value(json!({"q": " rust "})).unwrap();
        assert_eq!(single.keywords(), vec!["rust"]);
        assert_eq!(single.time, DEFAULT_TIMEFRAME);
        assert_eq!(single.tz, DEFAULT_TZ);
        assert_eq!(single.gprop, TrendsProperty::Web);

        let many: TrendsQuery =
            serde_json::from_value(json!({"q": ["rust", "", "go"], "gprop": "news"})).unwrap();
        assert_eq!(many.keywords(), vec!["rust", "go"]);
        assert_eq!(many.gprop.as_param(), "news");
    }

    #[test]
    fn test_validate() {
        assert!(TrendsQuery::new(["rust"]).validate().is_ok());
        assert!(TrendsQuery::new(Vec::<String>::new()).validate().is_err());
        assert!(TrendsQuery::new(["a", "b", "c", "d", "e", "f"])
            .validate()
            .is_err());
        assert!(TrendsQuery::new(["rust"]).with_time(" ").validate().is_err());
    }

    #[test]
    fn test_query_params() {
        let params = TrendsQuery::new(["rust", "go"]).with_geo("US").query_params();
        assert!(params.contains(&("kw", "rust,go".to_string())));
        assert!(params.contains(&("geo", "US".to_string())));
        assert!(params.contains(&("gprop", String::new())));
        assert!(params.contains(&("hl", "en-US".to_string())));
    }

    #[test]
    fn test_point_from_record() {
        let record = json!({"date": "2024-01-07", "isPartial": true, "rust": 42, "go": 17.5});
        let Value::Object(map) = record else {
            unreachable!()
        };
        let keywords = vec!["rust".to_string(), "go".to_string(), "zig".to_string()];
        let point = TrendPoint::from_record(&map, &keywords);

        assert_eq!(point.date, "2024-01-07");
        assert!(point.is_partial);
        assert_eq!(point.q_list[0].value, 42.0);
        assert_eq!(point.q_list[1].value, 17.5);
        assert_eq!(point.q_list[2].value, 0.0);
    }
}
