//! Statistics provider trait and structured fetch types.
//!
//! The `StatsProvider` trait abstracts over data sources (the Ergast-style
//! HTTP API, in-memory fixtures) so the dispatch layer can swap them and
//! tests never touch the network.

use crate::params::Params;
use async_trait::async_trait;
use polars::prelude::DataFrame;
use thiserror::Error;

/// Reply from one fetch that reached the provider and came back structured.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub success: bool,
    pub data: Option<DataFrame>,
    pub error: Option<String>,
}

impl FetchResponse {
    /// Successful fetch carrying a dataset (possibly with zero rows).
    pub fn rows(data: DataFrame) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Provider-reported failure.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Fetch failures that never produced a structured reply.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// The provider answered, but not with a structured mapping.
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),
}

impl FetchError {
    /// Short machine-readable name of the failure.
    pub fn error_type(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Timeout(_) => "timeout",
            FetchError::UnexpectedPayload(_) => "unexpected_payload",
        }
    }
}

/// Upstream statistics source.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch one fully-built endpoint path.
    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<FetchResponse, FetchError>;
}
