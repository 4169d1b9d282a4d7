//! Unit results, the failure taxonomy and the response envelope.

use chrono::{DateTime, Utc};
use gridstats_core::{EntityType, Params, QueryType, Scalar};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Machine-readable failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidRequirements,
    MissingParameters,
    EndpointBuildFailed,
    InvalidResponseType,
    NoDataRetrieved,
    ProcessingError,
    MaxRetriesExceeded,
    NoEntitiesFound,
    UnexpectedError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidRequirements => "invalid_requirements",
            FailureKind::MissingParameters => "missing_parameters",
            FailureKind::EndpointBuildFailed => "endpoint_build_failed",
            FailureKind::InvalidResponseType => "invalid_response_type",
            FailureKind::NoDataRetrieved => "no_data_retrieved",
            FailureKind::ProcessingError => "processing_error",
            FailureKind::MaxRetriesExceeded => "max_retries_exceeded",
            FailureKind::NoEntitiesFound => "no_entities_found",
            FailureKind::UnexpectedError => "unexpected_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single unit produced no dataset.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("Invalid requirements format: {0}")]
    InvalidRequirements(String),

    #[error("Missing required parameters")]
    MissingParameters,

    #[error("Failed to build endpoint '{0}'")]
    EndpointBuildFailed(String),

    #[error("Invalid response type: {0}")]
    InvalidResponseType(String),

    /// Upstream error text, or a generic message when the provider gave none.
    #[error("{0}")]
    NoDataRetrieved(String),

    #[error("Processing error: {message}")]
    Processing { message: String, error_type: String },

    #[error("Max retries exceeded")]
    MaxRetriesExceeded,
}

impl DispatchError {
    pub fn no_data(upstream: Option<String>) -> Self {
        DispatchError::NoDataRetrieved(upstream.unwrap_or_else(|| "No data retrieved".into()))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            DispatchError::InvalidRequirements(_) => FailureKind::InvalidRequirements,
            DispatchError::MissingParameters => FailureKind::MissingParameters,
            DispatchError::EndpointBuildFailed(_) => FailureKind::EndpointBuildFailed,
            DispatchError::InvalidResponseType(_) => FailureKind::InvalidResponseType,
            DispatchError::NoDataRetrieved(_) => FailureKind::NoDataRetrieved,
            DispatchError::Processing { .. } => FailureKind::ProcessingError,
            DispatchError::MaxRetriesExceeded => FailureKind::MaxRetriesExceeded,
        }
    }
}

/// Per-unit bookkeeping. Unset fields are omitted when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitMetadata {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl UnitMetadata {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            endpoint: None,
            params: None,
            attempt: None,
            rows: None,
            max_retries: None,
            error_type: None,
        }
    }
}

/// Outcome of one dispatch. Both success and failure are values.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub outcome: Result<DataFrame, DispatchError>,
    pub metadata: UnitMetadata,
}

impl UnitResult {
    pub fn success(data: DataFrame, metadata: UnitMetadata) -> Self {
        Self {
            outcome: Ok(data),
            metadata,
        }
    }

    pub fn failure(error: DispatchError, metadata: UnitMetadata) -> Self {
        Self {
            outcome: Err(error),
            metadata,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&DataFrame> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&DispatchError> {
        self.outcome.as_ref().err()
    }
}

/// Merged payload of a response.
#[derive(Debug, Clone)]
pub enum ResponseData {
    /// Row-concatenated dataset (single, historical, multi-entity).
    Rows(DataFrame),
    /// One dataset per metric key (career).
    Keyed(BTreeMap<String, DataFrame>),
}

/// Envelope metadata. Only the fields a strategy sets are serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<QueryType>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Scalar>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ResponseMetadata {
    pub fn now() -> Self {
        Self {
            query_type: None,
            timestamp: Utc::now(),
            years_processed: None,
            metrics_processed: None,
            entity_type: None,
            entities: None,
            batch_size: None,
            total_batches: None,
            endpoint: None,
            params: None,
            attempt: None,
            rows: None,
            max_retries: None,
            error_kind: None,
            error_type: None,
        }
    }

    pub fn with_query_type(mut self, query_type: QueryType) -> Self {
        self.query_type = Some(query_type);
        self
    }

    /// Carry a unit's bookkeeping onto the envelope.
    pub fn with_unit(mut self, unit: &UnitMetadata) -> Self {
        self.endpoint = unit.endpoint.clone();
        self.params = unit.params.clone();
        self.attempt = unit.attempt;
        self.rows = unit.rows;
        self.max_retries = unit.max_retries;
        self.error_type = unit.error_type.clone();
        self
    }
}

/// The user-visible result of `Pipeline::process`.
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub success: bool,
    pub data: Option<ResponseData>,
    pub error: Option<String>,
    pub metadata: ResponseMetadata,
}

impl PipelineResponse {
    /// A failure with no data.
    pub fn failure(error: impl Into<String>, kind: FailureKind, metadata: ResponseMetadata) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: ResponseMetadata {
                error_kind: Some(kind),
                ..metadata
            },
        }
    }

    pub fn rows(&self) -> Option<&DataFrame> {
        match &self.data {
            Some(ResponseData::Rows(df)) => Some(df),
            _ => None,
        }
    }

    pub fn keyed(&self) -> Option<&BTreeMap<String, DataFrame>> {
        match &self.data {
            Some(ResponseData::Keyed(map)) => Some(map),
            _ => None,
        }
    }
}
