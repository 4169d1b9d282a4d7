//! Tabular dataset helpers over `polars::DataFrame`.

use crate::requirements::Tag;
use polars::prelude::*;

/// True when the frame has no rows or no columns.
pub fn is_empty(df: &DataFrame) -> bool {
    df.height() == 0 || df.width() == 0
}

/// Set the tag's column to the tag's value on every row.
///
/// An existing column of the same name is replaced.
pub fn tag_rows(df: &mut DataFrame, tag: &Tag) -> PolarsResult<()> {
    let height = df.height();
    let name: PlSmallStr = tag.column().into();
    let series = match tag {
        Tag::Year(year) => Series::new(name, vec![*year; height]),
        Tag::Metric(metric) => Series::new(name, vec![metric.key(); height]),
        Tag::Entity { value, .. } => Series::new(name, vec![value.as_str(); height]),
    };
    df.with_column(series)?;
    Ok(())
}

/// Stack `next` under `acc`, accumulator rows first.
///
/// Frames with different column sets are aligned on the union of columns,
/// missing cells filled with nulls. A dtype conflict on a shared column is
/// an error.
pub fn concat_rows(acc: DataFrame, next: &DataFrame) -> PolarsResult<DataFrame> {
    if acc.width() == 0 {
        return Ok(next.clone());
    }

    let acc_cols = column_names(&acc);
    let next_cols = column_names(next);
    if acc_cols == next_cols {
        return acc.vstack(next);
    }

    let mut union = acc_cols;
    for name in next_cols {
        if !union.contains(&name) {
            union.push(name);
        }
    }

    let left = pad_to(acc.clone(), &union, next)?;
    let right = pad_to(next.clone(), &union, &acc)?;
    left.vstack(&right)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Add null columns for every name in `union` that `df` lacks, typed after
/// the column in `other`, then order columns as in `union`.
fn pad_to(mut df: DataFrame, union: &[String], other: &DataFrame) -> PolarsResult<DataFrame> {
    let height = df.height();
    for name in union {
        if df.column(name).is_err() {
            let dtype = other.column(name)?.dtype().clone();
            df.with_column(Series::full_null(name.as_str().into(), height, &dtype))?;
        }
    }
    df.select(union.iter().map(String::as_str))
}
