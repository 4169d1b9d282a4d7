//! Query shape classification.
//!
//! A best-effort heuristic over parameter content, not a grammar. The
//! priority order is fixed: historical, career, multi-entity, single.

use crate::normalize::SEASON_ALIAS;
use crate::params::{ParamValue, Params};
use serde::{Deserialize, Serialize};
use std::fmt;

const HISTORICAL_TERMS: [&str; 4] = ["since", "from", "decade", "between"];
const CAREER_TERMS: [&str; 4] = ["career", "all time", "lifetime", "overall"];

/// Processing strategy selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Historical,
    Career,
    MultiEntity,
    Single,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Historical => "historical",
            QueryType::Career => "career",
            QueryType::MultiEntity => "multi_entity",
            QueryType::Single => "single",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide which strategy applies. First match wins.
pub fn classify(params: &Params) -> QueryType {
    if is_historical(params) {
        QueryType::Historical
    } else if is_career(params) {
        QueryType::Career
    } else if is_multi_entity(params) {
        QueryType::MultiEntity
    } else {
        QueryType::Single
    }
}

fn is_multi_year_list(value: Option<&ParamValue>) -> bool {
    value
        .and_then(ParamValue::as_list)
        .is_some_and(|years| years.len() > 1)
}

fn stringified_lower(params: &Params, key: &str) -> String {
    params
        .get(key)
        .map(|v| v.to_string().to_lowercase())
        .unwrap_or_default()
}

fn is_historical(params: &Params) -> bool {
    if is_multi_year_list(params.get("year")) || is_multi_year_list(params.get(SEASON_ALIAS)) {
        return true;
    }
    let year = stringified_lower(params, "year");
    HISTORICAL_TERMS.iter().any(|term| year.contains(term))
}

fn is_career(params: &Params) -> bool {
    let query = stringified_lower(params, "query");
    CAREER_TERMS.iter().any(|term| query.contains(term))
}

fn is_multi_entity(params: &Params) -> bool {
    ["driver", "constructor"]
        .iter()
        .any(|key| params.get(*key).is_some_and(ParamValue::is_list))
}
