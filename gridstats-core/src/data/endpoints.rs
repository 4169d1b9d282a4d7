//! Endpoint catalog: logical identifiers to Ergast-style API paths.
//!
//! Paths are composed as
//! `/{year}/{round}/circuits/{circuit}/constructors/{constructor}/drivers/{driver}/{resource}`.
//! Every filter segment is optional unless the endpoint requires it, and a
//! filter the resource already consumes (e.g. `drivers/{driver}`) is not
//! repeated.

use crate::params::{ParamValue, Params};

/// Resolves a logical endpoint identifier plus parameters into a path.
pub trait EndpointBuilder: Send + Sync {
    /// `None` means the path cannot be built from these parameters.
    fn build(&self, endpoint_id: &str, params: &Params) -> Option<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct EndpointSpec {
    pub id: &'static str,
    pub resource: &'static str,
    pub required: &'static [&'static str],
}

const ENDPOINTS: &[EndpointSpec] = &[
    EndpointSpec { id: "DRIVERS.list", resource: "drivers", required: &[] },
    EndpointSpec { id: "DRIVERS.specific", resource: "drivers/{driver}", required: &["driver"] },
    EndpointSpec { id: "CONSTRUCTORS.list", resource: "constructors", required: &[] },
    EndpointSpec {
        id: "CONSTRUCTORS.specific",
        resource: "constructors/{constructor}",
        required: &["constructor"],
    },
    EndpointSpec { id: "RACES.schedule", resource: "races", required: &["year"] },
    EndpointSpec { id: "RESULTS.race", resource: "results", required: &[] },
    EndpointSpec { id: "QUALIFYING.race", resource: "qualifying", required: &[] },
    EndpointSpec { id: "SPRINT.race", resource: "sprint", required: &["year"] },
    EndpointSpec { id: "LAPS.race", resource: "laps", required: &["year", "round"] },
    EndpointSpec { id: "PITSTOPS.race", resource: "pitstops", required: &["year", "round"] },
    EndpointSpec { id: "STANDINGS.driver_season", resource: "driverStandings", required: &[] },
    EndpointSpec {
        id: "STANDINGS.constructor_season",
        resource: "constructorStandings",
        required: &[],
    },
];

/// (parameter key, path prefix) for each optional filter, in path order.
const FILTERS: &[(&str, Option<&str>)] = &[
    ("year", None),
    ("round", None),
    ("circuit", Some("circuits")),
    ("constructor", Some("constructors")),
    ("driver", Some("drivers")),
];

/// The built-in catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointCatalog;

impl EndpointCatalog {
    pub fn entries(&self) -> &'static [EndpointSpec] {
        ENDPOINTS
    }

    pub fn spec(&self, endpoint_id: &str) -> Option<&'static EndpointSpec> {
        ENDPOINTS.iter().find(|s| s.id == endpoint_id)
    }
}

impl EndpointBuilder for EndpointCatalog {
    fn build(&self, endpoint_id: &str, params: &Params) -> Option<String> {
        let spec = self.spec(endpoint_id)?;

        if spec.required.iter().any(|key| segment(params, key).is_none()) {
            return None;
        }
        // round is only addressable within a season
        if params.contains_key("round") && !params.contains_key("year") {
            return None;
        }

        let mut path = String::new();
        for (key, prefix) in FILTERS {
            if spec.resource.contains(&format!("{{{key}}}")) || !params.contains_key(*key) {
                continue;
            }
            let value = segment(params, key)?;
            if let Some(prefix) = prefix {
                path.push('/');
                path.push_str(prefix);
            }
            path.push('/');
            path.push_str(&value);
        }

        let mut resource = spec.resource.to_string();
        for key in spec.required {
            let placeholder = format!("{{{key}}}");
            if resource.contains(&placeholder) {
                resource = resource.replace(&placeholder, &segment(params, key)?);
            }
        }
        path.push('/');
        path.push_str(&resource);

        Some(path)
    }
}

/// A parameter usable as one path segment: a non-empty scalar with no
/// separators or whitespace.
fn segment(params: &Params, key: &str) -> Option<String> {
    let value = match params.get(key)? {
        ParamValue::Scalar(s) => s.to_string(),
        ParamValue::Null | ParamValue::List(_) => return None,
    };
    let usable = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'));
    usable.then_some(value)
}
