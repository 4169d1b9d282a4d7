//! Request parameter values.
//!
//! Parameters arrive as a loosely-typed mapping (JSON or CLI flags). Every
//! value is one of three closed shapes: null, a scalar, or an ordered list of
//! scalars. Normalization, classification and splitting branch on that tag
//! rather than on runtime type checks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Parameter mapping for one request.
pub type Params = BTreeMap<String, ParamValue>;

/// A single parameter scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the scalar as a calendar year.
    ///
    /// Floats truncate toward zero; text must parse as an integer after
    /// trimming surrounding whitespace.
    pub fn as_year(&self) -> Option<i32> {
        match self {
            Scalar::Int(i) => i32::try_from(*i).ok(),
            Scalar::Float(f) if f.is_finite() => {
                let t = f.trunc();
                if t >= i32::MIN as f64 && t <= i32::MAX as f64 {
                    Some(t as i32)
                } else {
                    None
                }
            }
            Scalar::Float(_) => None,
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i32> for Scalar {
    fn from(i: i32) -> Self {
        Scalar::Int(i64::from(i))
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

/// A parameter value: null, one scalar, or an ordered list of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl ParamValue {
    /// Build a list value from anything convertible to scalars.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Scalar>,
    {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            ParamValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ParamValue::List(_))
    }
}

/// The "stringified" form used by the query heuristics: scalars render bare,
/// lists render as `[a, b]`, null renders empty.
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => Ok(()),
            ParamValue::Scalar(s) => write!(f, "{s}"),
            ParamValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<Scalar> for ParamValue {
    fn from(value: Scalar) -> Self {
        ParamValue::Scalar(value)
    }
}

macro_rules! scalar_param_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ParamValue {
                fn from(value: $t) -> Self {
                    ParamValue::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_param_from!(&str, String, i32, i64, f64);

impl From<Vec<Scalar>> for ParamValue {
    fn from(items: Vec<Scalar>) -> Self {
        ParamValue::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_closed_shapes_from_json() {
        let params: Params = serde_json::from_str(
            r#"{"year": 2019, "driver": ["max_verstappen", "lewis_hamilton"], "round": null, "q": "x", "w": 1.5}"#,
        )
        .unwrap();

        assert_eq!(params["year"], ParamValue::Scalar(Scalar::Int(2019)));
        assert_eq!(
            params["driver"],
            ParamValue::list(["max_verstappen", "lewis_hamilton"])
        );
        assert_eq!(params["round"], ParamValue::Null);
        assert_eq!(params["q"], ParamValue::from("x"));
        assert_eq!(params["w"], ParamValue::Scalar(Scalar::Float(1.5)));
    }

    #[test]
    fn stringified_form() {
        assert_eq!(ParamValue::from("since 2015").to_string(), "since 2015");
        assert_eq!(ParamValue::list([2021, 2019]).to_string(), "[2021, 2019]");
        assert_eq!(ParamValue::Null.to_string(), "");
    }

    #[test]
    fn year_interpretation() {
        assert_eq!(Scalar::from(2019).as_year(), Some(2019));
        assert_eq!(Scalar::from(" 2020 ").as_year(), Some(2020));
        assert_eq!(Scalar::from(2018.9).as_year(), Some(2018));
        assert_eq!(Scalar::from("twenty").as_year(), None);
        assert_eq!(Scalar::from(f64::NAN).as_year(), None);
    }
}
