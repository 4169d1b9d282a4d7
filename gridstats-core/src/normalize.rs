//! Parameter canonicalization applied before every dispatch.
//!
//! Rules, per key/value pair:
//! - null and empty-string values are dropped
//! - `season` is renamed to `year`
//! - `driver` text is lowercased with spaces replaced by underscores
//! - any other text is trimmed
//! - lists apply the text rule elementwise; non-text elements pass through
//!
//! A text value that ends up empty after its rule is dropped as well, which
//! keeps the function idempotent.

use crate::params::{ParamValue, Params, Scalar};
use tracing::trace;

/// Legacy alias for `year`.
pub const SEASON_ALIAS: &str = "season";

/// Canonicalize a raw parameter mapping. Total: never fails.
pub fn normalize(params: &Params) -> Params {
    let mut normalized = Params::new();

    for (key, value) in params {
        let key = if key == SEASON_ALIAS { "year" } else { key.as_str() };

        let value = match value {
            ParamValue::Null => None,
            ParamValue::Scalar(Scalar::Text(s)) => {
                let s = normalize_text(key, s);
                (!s.is_empty()).then(|| ParamValue::Scalar(Scalar::Text(s)))
            }
            ParamValue::Scalar(other) => Some(ParamValue::Scalar(other.clone())),
            ParamValue::List(items) => Some(ParamValue::List(
                items
                    .iter()
                    .map(|item| match item {
                        Scalar::Text(s) => Scalar::Text(normalize_text(key, s)),
                        other => other.clone(),
                    })
                    .collect(),
            )),
        };

        match value {
            Some(value) => {
                normalized.insert(key.to_string(), value);
            }
            None => trace!(key, "dropping empty parameter"),
        }
    }

    normalized
}

fn normalize_text(key: &str, value: &str) -> String {
    if key == "driver" {
        value.to_lowercase().replace(' ', "_")
    } else {
        value.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: Vec<(&str, ParamValue)>) -> Params {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn drops_null_and_empty_values() {
        let raw = params(vec![
            ("round", ParamValue::Null),
            ("circuit", ParamValue::from("")),
            ("year", ParamValue::from(2020)),
        ]);
        let out = normalize(&raw);
        assert_eq!(out.len(), 1);
        assert_eq!(out["year"], ParamValue::from(2020));
    }

    #[test]
    fn renames_season_to_year() {
        let out = normalize(&params(vec![("season", ParamValue::from(" 2019 "))]));
        assert_eq!(out.get("season"), None);
        assert_eq!(out["year"], ParamValue::from("2019"));
    }

    #[test]
    fn driver_names_are_slugged_without_trimming() {
        let out = normalize(&params(vec![("driver", ParamValue::from("Max Verstappen"))]));
        assert_eq!(out["driver"], ParamValue::from("max_verstappen"));

        let out = normalize(&params(vec![("driver", ParamValue::from(" Lewis "))]));
        assert_eq!(out["driver"], ParamValue::from("_lewis_"));
    }

    #[test]
    fn other_text_is_trimmed() {
        let out = normalize(&params(vec![("constructor", ParamValue::from("  Red Bull "))]));
        assert_eq!(out["constructor"], ParamValue::from("Red Bull"));
    }

    #[test]
    fn lists_apply_rule_elementwise() {
        let raw = params(vec![(
            "driver",
            ParamValue::List(vec![
                Scalar::from("Lewis Hamilton"),
                Scalar::from(44),
                Scalar::from("ALONSO"),
            ]),
        )]);
        let out = normalize(&raw);
        assert_eq!(
            out["driver"],
            ParamValue::List(vec![
                Scalar::from("lewis_hamilton"),
                Scalar::from(44),
                Scalar::from("alonso"),
            ])
        );
    }

    #[test]
    fn whitespace_only_text_is_dropped() {
        let out = normalize(&params(vec![("circuit", ParamValue::from("   "))]));
        assert!(out.is_empty());
    }

    #[test]
    fn non_text_scalars_pass_through() {
        let out = normalize(&params(vec![("round", ParamValue::from(3.0))]));
        assert_eq!(out["round"], ParamValue::from(3.0));
    }
}
