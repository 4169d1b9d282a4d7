//! Decomposition of compound requests into tagged atomic units.
//!
//! Historical requests become one unit per season in an inclusive year range.
//! Career requests become four fixed metric units. Multi-entity fan-out is
//! not handled here; the batch executor owns it together with batch width.

use crate::clock::{Clock, SystemClock};
use crate::normalize::SEASON_ALIAS;
use crate::params::{ParamValue, Params, Scalar};
use crate::requirements::{Requirements, SplitUnit, Tag};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Years covered when a historical request names no usable range.
pub const DEFAULT_LOOKBACK_YEARS: i32 = 5;
/// Years covered by a "last decade" request.
pub const DECADE_YEARS: i32 = 10;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SplitError {
    #[error("year value '{0}' is not an integer")]
    InvalidYear(String),

    #[error("cannot parse a start year from '{0}'")]
    InvalidSince(String),
}

/// Metric fetched by a career-wide request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareerMetric {
    CareerStats,
    RaceResults,
    QualifyingResults,
    ChampionshipStandings,
}

impl CareerMetric {
    pub const ALL: [CareerMetric; 4] = [
        CareerMetric::CareerStats,
        CareerMetric::RaceResults,
        CareerMetric::QualifyingResults,
        CareerMetric::ChampionshipStandings,
    ];

    /// Key used in keyed merges and error labels.
    pub fn key(&self) -> &'static str {
        match self {
            CareerMetric::CareerStats => "career_stats",
            CareerMetric::RaceResults => "race_results",
            CareerMetric::QualifyingResults => "qualifying_results",
            CareerMetric::ChampionshipStandings => "championship_standings",
        }
    }

    /// Upstream endpoint identifier for the metric.
    pub fn endpoint(&self) -> &'static str {
        match self {
            CareerMetric::CareerStats => "DRIVERS.specific",
            CareerMetric::RaceResults => "RESULTS.race",
            CareerMetric::QualifyingResults => "QUALIFYING.race",
            CareerMetric::ChampionshipStandings => "STANDINGS.driver_season",
        }
    }
}

impl fmt::Display for CareerMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Splits compound requirements. Holds the clock that supplies the default
/// end of a historical range.
#[derive(Clone)]
pub struct Splitter {
    clock: Arc<dyn Clock>,
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Splitter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Inclusive `[start, end]` season range for a historical request.
    ///
    /// Resolution order: a non-empty `year`/`season` list (min..max), then a
    /// `since <year>` phrase, then `last decade`, then the default lookback.
    /// The `since`/`last decade` checks are case-sensitive.
    pub fn year_range(&self, params: &Params) -> Result<(i32, i32), SplitError> {
        let mut end = self.clock.current_year();
        let mut start = None;

        let list = params
            .get("year")
            .and_then(ParamValue::as_list)
            .or_else(|| params.get(SEASON_ALIAS).and_then(ParamValue::as_list));

        if let Some(years) = list {
            if !years.is_empty() {
                let parsed = years
                    .iter()
                    .map(|y| y.as_year().ok_or_else(|| SplitError::InvalidYear(y.to_string())))
                    .collect::<Result<Vec<_>, _>>()?;
                // non-empty, so min/max exist
                start = parsed.iter().min().copied();
                end = parsed.iter().max().copied().unwrap_or(end);
            }
        } else {
            let year = params.get("year").map(ToString::to_string).unwrap_or_default();
            if let Some(idx) = year.rfind("since") {
                let tail = year[idx + "since".len()..].trim();
                let since = tail
                    .parse::<i32>()
                    .map_err(|_| SplitError::InvalidSince(year.clone()))?;
                start = Some(since);
            } else if year.contains("last decade") {
                start = Some(end - DECADE_YEARS);
            }
        }

        Ok((start.unwrap_or(end - DEFAULT_LOOKBACK_YEARS), end))
    }

    /// One unit per season in the range, each with `year` set to that season.
    pub fn split_historical(&self, requirements: &Requirements) -> Result<Vec<SplitUnit>, SplitError> {
        let (start, end) = self.year_range(&requirements.params)?;

        let base: Params = requirements
            .params
            .iter()
            .filter(|(k, _)| k.as_str() != "year" && k.as_str() != SEASON_ALIAS)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok((start..=end)
            .map(|year| {
                let mut params = base.clone();
                params.insert(
                    "year".to_string(),
                    ParamValue::Scalar(Scalar::Text(year.to_string())),
                );
                SplitUnit {
                    requirements: Requirements::with_params(requirements.endpoint.clone(), params),
                    tag: Tag::Year(year),
                }
            })
            .collect())
    }

    /// The four fixed career metrics, all sharing the request's parameters.
    pub fn split_career(requirements: &Requirements) -> Vec<SplitUnit> {
        CareerMetric::ALL
            .iter()
            .map(|metric| SplitUnit {
                requirements: Requirements::with_params(
                    metric.endpoint(),
                    requirements.params.clone(),
                ),
                tag: Tag::Metric(*metric),
            })
            .collect()
    }
}
