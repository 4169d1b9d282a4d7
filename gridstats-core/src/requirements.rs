//! Requirements (one logical data request) and the tagged atomic units a
//! compound request decomposes into.

use crate::params::{ParamValue, Params, Scalar};
use crate::split::CareerMetric;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why an inbound request could not be accepted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequirementsError {
    #[error("request must be a JSON object")]
    NotAnObject,

    #[error("request has no string `endpoint`")]
    MissingEndpoint,

    #[error("`params` must be an object")]
    ParamsNotAnObject,

    #[error("parameter '{key}' is not a scalar or a list of scalars")]
    UnsupportedValue { key: String },

    #[error("endpoint identifier '{0}' contains whitespace or control characters")]
    MalformedEndpoint(String),
}

/// One logical data request: an endpoint identifier plus parameters.
///
/// Immutable once built; decomposition always constructs new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    pub endpoint: String,
    #[serde(default)]
    pub params: Params,
}

impl Requirements {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(endpoint: impl Into<String>, params: Params) -> Self {
        Self {
            endpoint: endpoint.into(),
            params,
        }
    }

    /// Builder-style parameter insert.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    /// Parse a loosely-typed request object.
    pub fn from_json(value: serde_json::Value) -> Result<Self, RequirementsError> {
        let serde_json::Value::Object(mut obj) = value else {
            return Err(RequirementsError::NotAnObject);
        };

        let endpoint = match obj.remove("endpoint") {
            Some(serde_json::Value::String(s)) => s,
            _ => return Err(RequirementsError::MissingEndpoint),
        };

        let params = match obj.remove("params") {
            None | Some(serde_json::Value::Null) => Params::new(),
            Some(serde_json::Value::Object(map)) => {
                let mut params = Params::new();
                for (key, raw) in map {
                    let value = param_from_json(raw)
                        .ok_or_else(|| RequirementsError::UnsupportedValue { key: key.clone() })?;
                    params.insert(key, value);
                }
                params
            }
            Some(_) => return Err(RequirementsError::ParamsNotAnObject),
        };

        Ok(Self { endpoint, params })
    }

    /// Structural check performed before dispatch.
    ///
    /// An empty endpoint passes here; emptiness is reported separately as a
    /// missing parameter.
    pub fn validate(&self) -> Result<(), RequirementsError> {
        if self
            .endpoint
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(RequirementsError::MalformedEndpoint(self.endpoint.clone()));
        }
        Ok(())
    }
}

fn scalar_from_json(raw: &serde_json::Value) -> Option<Scalar> {
    match raw {
        serde_json::Value::String(s) => Some(Scalar::Text(s.clone())),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Scalar::Int)
            .or_else(|| n.as_f64().map(Scalar::Float)),
        _ => None,
    }
}

fn param_from_json(raw: serde_json::Value) -> Option<ParamValue> {
    match raw {
        serde_json::Value::Null => Some(ParamValue::Null),
        serde_json::Value::Array(items) => items
            .iter()
            .map(scalar_from_json)
            .collect::<Option<Vec<_>>>()
            .map(ParamValue::List),
        other => scalar_from_json(&other).map(ParamValue::Scalar),
    }
}

/// Kind of entity compared in a multi-entity request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Driver,
    Constructor,
}

impl EntityType {
    /// Parameter key, also used as the merge column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Driver => "driver",
            EntityType::Constructor => "constructor",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grouping key attached to a unit and later to its merged rows or keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Year(i32),
    Metric(CareerMetric),
    Entity { kind: EntityType, value: String },
}

impl Tag {
    /// Column the tag value is written into during row merges.
    pub fn column(&self) -> &'static str {
        match self {
            Tag::Year(_) => "year",
            Tag::Metric(_) => "metric",
            Tag::Entity { kind, .. } => kind.as_str(),
        }
    }

    /// Context used to label errors, e.g. `year 2019`.
    pub fn context(&self) -> String {
        match self {
            Tag::Year(y) => format!("year {y}"),
            Tag::Metric(m) => m.key().to_string(),
            Tag::Entity { value, .. } => value.clone(),
        }
    }
}

/// One atomic, independently fetchable request and its grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitUnit {
    pub requirements: Requirements,
    pub tag: Tag,
}
