//! Ergast-compatible HTTP provider.
//!
//! Fetches `{base_url}{path}.json` and flattens the `MRData.*Table` row array
//! into a string-typed DataFrame. Nested objects become `_`-joined columns;
//! the first nested array of objects is exploded into one row per element
//! (e.g. each race's `Results`), other arrays are kept as JSON text.

use super::provider::{FetchError, FetchResponse, StatsProvider};
use crate::params::{ParamValue, Params};
use async_trait::async_trait;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Query parameters forwarded verbatim rather than encoded in the path.
const QUERY_PARAMS: [&str; 2] = ["limit", "offset"];

/// Connection settings for the HTTP provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErgastConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ErgastConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.jolpi.ca/ergast/f1".to_string(),
            timeout_secs: 30,
            user_agent: concat!("gridstats/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP provider for an Ergast-style motorsport API.
pub struct ErgastProvider {
    client: reqwest::Client,
    base_url: String,
}

impl ErgastProvider {
    pub fn new(config: &ErgastConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}.json", self.base_url)
    }
}

#[async_trait]
impl StatsProvider for ErgastProvider {
    fn name(&self) -> &str {
        "ergast"
    }

    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<FetchResponse, FetchError> {
        let url = self.url(endpoint);
        let query: Vec<(&str, String)> = QUERY_PARAMS
            .iter()
            .filter_map(|key| {
                params
                    .get(*key)
                    .and_then(ParamValue::as_scalar)
                    .map(|v| (*key, v.to_string()))
            })
            .collect();

        debug!(%url, ?query, "fetching");
        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(e.to_string())
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(FetchResponse::failed(format!("HTTP {status} for {endpoint}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read body: {e}")))?;
        let json: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::UnexpectedPayload(format!("body is not JSON: {e}")))?;

        parse_payload(&json)
    }
}

/// Turn a decoded response body into a fetch reply.
pub fn parse_payload(json: &Value) -> Result<FetchResponse, FetchError> {
    let Value::Object(root) = json else {
        return Err(FetchError::UnexpectedPayload(format!(
            "expected a JSON object, got {}",
            json_kind(json)
        )));
    };

    let table = root
        .get("MRData")
        .and_then(Value::as_object)
        .and_then(|mr| {
            mr.iter()
                .find(|(key, value)| key.ends_with("Table") && value.is_object())
                .and_then(|(_, value)| value.as_object())
        });
    let Some(table) = table else {
        return Ok(FetchResponse::failed("response has no MRData table"));
    };

    let Some(rows) = table.values().find_map(Value::as_array) else {
        return Ok(FetchResponse::failed("data table holds no rows"));
    };

    let df = rows_to_frame(rows).map_err(|e| FetchError::UnexpectedPayload(e.to_string()))?;
    Ok(FetchResponse::rows(df))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

type FlatRow = Vec<(String, Option<String>)>;

/// Flatten JSON rows into a DataFrame of nullable string columns, ordered by
/// first appearance.
pub fn rows_to_frame(rows: &[Value]) -> PolarsResult<DataFrame> {
    let flat: Vec<FlatRow> = rows.iter().flat_map(|row| explode(row, "")).collect();

    let mut names: Vec<String> = Vec::new();
    let cells: Vec<HashMap<String, Option<String>>> = flat
        .into_iter()
        .map(|row| {
            for (name, _) in &row {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            row.into_iter().collect()
        })
        .collect();

    let columns: Vec<Column> = names
        .iter()
        .map(|name| {
            let values: Vec<Option<&str>> = cells
                .iter()
                .map(|row| row.get(name).and_then(|v| v.as_deref()))
                .collect();
            Series::new(name.as_str().into(), values).into()
        })
        .collect();

    DataFrame::new(columns)
}

fn explode(value: &Value, prefix: &str) -> Vec<FlatRow> {
    match value {
        Value::Object(map) => {
            let mut fields = FlatRow::new();
            let mut children = None;
            flatten_object(map, prefix, &mut fields, &mut children);
            match children {
                Some(child_rows) if !child_rows.is_empty() => child_rows
                    .into_iter()
                    .map(|child| {
                        let mut row = fields.clone();
                        row.extend(child);
                        row
                    })
                    .collect(),
                _ => vec![fields],
            }
        }
        other => {
            let name = if prefix.is_empty() { "value" } else { prefix };
            vec![vec![(name.to_string(), scalar_text(other))]]
        }
    }
}

fn flatten_object(
    map: &Map<String, Value>,
    prefix: &str,
    fields: &mut FlatRow,
    children: &mut Option<Vec<FlatRow>>,
) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}_{key}")
        };
        match value {
            Value::Object(inner) => flatten_object(inner, &name, fields, children),
            Value::Array(items)
                if children.is_none()
                    && !items.is_empty()
                    && items.iter().all(Value::is_object) =>
            {
                *children = Some(items.iter().flat_map(|item| explode(item, "")).collect());
            }
            Value::Array(_) => fields.push((name, Some(value.to_string()))),
            other => fields.push((name, scalar_text(other))),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
