//! Combining settled units into one response payload.
//!
//! Row merges tag each non-empty dataset with its grouping value and stack
//! them in unit order. Keyed merges map each metric to its dataset. Both
//! collect a `"<context>: <message>"` entry per failed or panicked unit.

use crate::executor::{Settled, TaggedResult};
use crate::result::UnitResult;
use gridstats_core::dataset::{concat_rows, is_empty, tag_rows};
use gridstats_core::Tag;
use polars::prelude::{DataFrame, PolarsResult};
use std::collections::BTreeMap;
use tracing::warn;

/// Row-concatenation merge output.
#[derive(Debug, Clone)]
pub struct RowMerge {
    pub dataset: DataFrame,
    pub errors: Vec<String>,
}

impl RowMerge {
    /// No unit failed and at least one row was merged.
    pub fn success(&self) -> bool {
        self.errors.is_empty() && !is_empty(&self.dataset)
    }
}

/// Keyed merge output.
#[derive(Debug, Clone)]
pub struct KeyedMerge {
    pub datasets: BTreeMap<String, DataFrame>,
    pub errors: Vec<String>,
}

impl KeyedMerge {
    /// No unit failed and at least one metric dataset has rows.
    pub fn success(&self) -> bool {
        self.errors.is_empty() && self.datasets.values().any(|df| !is_empty(df))
    }
}

/// Stack every successful, non-empty dataset, tagging each row.
pub fn merge_rows(results: Vec<TaggedResult>) -> PolarsResult<RowMerge> {
    let mut dataset = DataFrame::empty();
    let mut errors = Vec::new();

    for TaggedResult { tag, result } in results {
        match into_dataset(&tag, result) {
            Ok(mut df) => {
                if is_empty(&df) {
                    continue;
                }
                tag_rows(&mut df, &tag)?;
                dataset = concat_rows(dataset, &df)?;
            }
            Err(message) => errors.push(message),
        }
    }

    Ok(RowMerge { dataset, errors })
}

/// Map each successful unit's key to its dataset, empty ones included.
pub fn merge_keyed(results: Vec<TaggedResult>) -> KeyedMerge {
    let mut datasets = BTreeMap::new();
    let mut errors = Vec::new();

    for TaggedResult { tag, result } in results {
        match into_dataset(&tag, result) {
            Ok(df) => {
                datasets.insert(tag.context(), df);
            }
            Err(message) => errors.push(message),
        }
    }

    KeyedMerge { datasets, errors }
}

fn into_dataset(tag: &Tag, result: Settled) -> Result<DataFrame, String> {
    let message = match result {
        Ok(UnitResult { outcome: Ok(df), .. }) => return Ok(df),
        Ok(UnitResult { outcome: Err(e), .. }) => e.to_string(),
        Err(panic) => panic.to_string(),
    };
    let context = tag.context();
    warn!(unit = %context, error = %message, "unit failed");
    Err(format!("{context}: {message}"))
}
