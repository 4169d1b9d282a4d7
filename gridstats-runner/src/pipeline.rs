//! Request pipeline: classify, split, dispatch and merge.
//!
//! `Pipeline::process` is the single entry point. It always returns a
//! well-formed `PipelineResponse`: unit failures are aggregated into the
//! response's error text, and anything escaping the strategy (a bad year
//! value, a merge conflict, a panic) is reported as `unexpected_error`.

use crate::config::{BatchConfig, PipelineConfig};
use crate::dispatch::Dispatcher;
use crate::executor::{entity_units, panic_message, run_batches, run_group};
use crate::merge::{merge_keyed, merge_rows, RowMerge};
use crate::result::{FailureKind, PipelineResponse, ResponseData, ResponseMetadata};
use futures::FutureExt;
use gridstats_core::data::{
    EndpointBuilder, EndpointCatalog, ErgastProvider, FetchError, StatsProvider,
};
use gridstats_core::dataset::is_empty;
use gridstats_core::{classify, Clock, QueryType, Requirements, SplitError, Splitter};
use polars::prelude::PolarsError;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Failures that escape a strategy rather than landing in a unit result.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Split(#[from] SplitError),

    #[error("failed to merge results: {0}")]
    Merge(#[from] PolarsError),

    #[error("pipeline panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    pub fn error_type(&self) -> &'static str {
        match self {
            PipelineError::Split(_) => "split_error",
            PipelineError::Merge(_) => "merge_error",
            PipelineError::Panicked(_) => "panic",
        }
    }
}

pub struct Pipeline {
    dispatcher: Dispatcher,
    splitter: Splitter,
    batch: BatchConfig,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn StatsProvider>,
        endpoints: Arc<dyn EndpointBuilder>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(provider, endpoints, config.retry),
            splitter: Splitter::default(),
            batch: config.batch,
        }
    }

    /// Pipeline against the live HTTP provider and the built-in catalog.
    pub fn ergast(config: &PipelineConfig) -> Result<Self, FetchError> {
        let provider = ErgastProvider::new(&config.provider)?;
        Ok(Self::new(Arc::new(provider), Arc::new(EndpointCatalog), config))
    }

    /// Replace the clock that supplies the current year for historical splits.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.splitter = Splitter::new(clock);
        self
    }

    pub async fn process(&self, requirements: &Requirements) -> PipelineResponse {
        let outcome = AssertUnwindSafe(self.run(requirements))
            .catch_unwind()
            .await;

        let err = match outcome {
            Ok(Ok(response)) => return response,
            Ok(Err(e)) => e,
            Err(payload) => PipelineError::Panicked(panic_message(payload)),
        };

        error!(endpoint = %requirements.endpoint, error = %err, "request failed unexpectedly");
        let metadata = ResponseMetadata {
            error_type: Some(err.error_type().to_string()),
            ..ResponseMetadata::now()
        };
        PipelineResponse::failure(err.to_string(), FailureKind::UnexpectedError, metadata)
    }

    async fn run(&self, requirements: &Requirements) -> Result<PipelineResponse, PipelineError> {
        let query_type = classify(&requirements.params);
        info!(endpoint = %requirements.endpoint, %query_type, "processing request");

        match query_type {
            QueryType::Historical => self.process_historical(requirements).await,
            QueryType::Career => Ok(self.process_career(requirements).await),
            QueryType::MultiEntity => self.process_multi_entity(requirements).await,
            QueryType::Single => Ok(self.process_single(requirements).await),
        }
    }

    async fn process_single(&self, requirements: &Requirements) -> PipelineResponse {
        let unit = self.dispatcher.dispatch(requirements).await;
        let metadata = ResponseMetadata::now()
            .with_query_type(QueryType::Single)
            .with_unit(&unit.metadata);

        match unit.outcome {
            Ok(df) => {
                let has_rows = !is_empty(&df);
                PipelineResponse {
                    success: has_rows,
                    data: has_rows.then_some(ResponseData::Rows(df)),
                    error: None,
                    metadata,
                }
            }
            Err(e) => PipelineResponse::failure(e.to_string(), e.kind(), metadata),
        }
    }

    async fn process_historical(
        &self,
        requirements: &Requirements,
    ) -> Result<PipelineResponse, PipelineError> {
        let units = self.splitter.split_historical(requirements)?;
        let years = units.len();
        info!(years, "split into seasons");

        let dispatcher = &self.dispatcher;
        let dispatch = move |req: Requirements| async move { dispatcher.dispatch(&req).await };
        let merged = merge_rows(run_group(units, &dispatch).await)?;

        let metadata = ResponseMetadata {
            years_processed: Some(years),
            ..ResponseMetadata::now().with_query_type(QueryType::Historical)
        };
        Ok(rows_response(merged, metadata))
    }

    async fn process_career(&self, requirements: &Requirements) -> PipelineResponse {
        let units = Splitter::split_career(requirements);
        let metrics = units.len();
        info!(metrics, "split into career metrics");

        let dispatcher = &self.dispatcher;
        let dispatch = move |req: Requirements| async move { dispatcher.dispatch(&req).await };
        let merged = merge_keyed(run_group(units, &dispatch).await);

        let success = merged.success();
        PipelineResponse {
            success,
            error: join_errors(&merged.errors),
            data: (!merged.datasets.is_empty()).then_some(ResponseData::Keyed(merged.datasets)),
            metadata: ResponseMetadata {
                metrics_processed: Some(metrics),
                ..ResponseMetadata::now().with_query_type(QueryType::Career)
            },
        }
    }

    async fn process_multi_entity(
        &self,
        requirements: &Requirements,
    ) -> Result<PipelineResponse, PipelineError> {
        let Some(fan_out) = entity_units(requirements) else {
            return Ok(PipelineResponse::failure(
                "No parallel entities found",
                FailureKind::NoEntitiesFound,
                ResponseMetadata::now(),
            ));
        };
        info!(
            entity_type = %fan_out.entity_type,
            entities = fan_out.entities.len(),
            width = self.batch.width,
            "fanning out entities"
        );

        let dispatcher = &self.dispatcher;
        let dispatch = move |req: Requirements| async move { dispatcher.dispatch(&req).await };
        let outcome = run_batches(
            fan_out.units,
            self.batch.width,
            self.batch.report_dropped,
            &dispatch,
        )
        .await;

        let mut merged = merge_rows(outcome.results)?;
        merged.errors.extend(outcome.dropped);

        let metadata = ResponseMetadata {
            entity_type: Some(fan_out.entity_type),
            entities: Some(fan_out.entities),
            batch_size: Some(self.batch.width),
            total_batches: Some(outcome.total_batches),
            ..ResponseMetadata::now()
        };
        Ok(rows_response(merged, metadata))
    }
}

fn rows_response(merged: RowMerge, metadata: ResponseMetadata) -> PipelineResponse {
    let success = merged.success();
    let error = join_errors(&merged.errors);
    let data = (!is_empty(&merged.dataset)).then_some(ResponseData::Rows(merged.dataset));
    PipelineResponse {
        success,
        data,
        error,
        metadata,
    }
}

fn join_errors(errors: &[String]) -> Option<String> {
    (!errors.is_empty()).then(|| errors.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridstats_core::data::{FixtureProvider, FixtureReply};
    use gridstats_core::{FixedClock, ParamValue};
    use polars::df;

    fn pipeline(provider: FixtureProvider) -> Pipeline {
        Pipeline::new(
            Arc::new(provider),
            Arc::new(EndpointCatalog),
            &PipelineConfig::default(),
        )
        .with_clock(Arc::new(FixedClock(2024)))
    }

    #[tokio::test]
    async fn single_request_forwards_unit_metadata() {
        let provider = FixtureProvider::new().route(
            "/2023/5/results",
            FixtureReply::Rows(df!("position" => &["1", "2", "3"]).unwrap()),
        );
        let req = Requirements::new("RESULTS.race")
            .param("year", 2023)
            .param("round", 5);
        let resp = pipeline(provider).process(&req).await;

        assert!(resp.success);
        assert_eq!(resp.rows().unwrap().height(), 3);
        assert_eq!(resp.metadata.query_type, Some(QueryType::Single));
        assert_eq!(resp.metadata.attempt, Some(1));
        assert_eq!(resp.metadata.rows, Some(3));
    }

    #[tokio::test]
    async fn single_empty_dataset_is_not_a_success() {
        let provider = FixtureProvider::new().route("/2023/results", FixtureReply::Empty);
        let resp = pipeline(provider)
            .process(&Requirements::new("RESULTS.race").param("year", 2023))
            .await;

        assert!(!resp.success);
        assert!(resp.error.is_none());
        assert!(resp.data.is_none());
    }

    #[tokio::test]
    async fn unparseable_since_year_is_unexpected_error() {
        let resp = pipeline(FixtureProvider::new())
            .process(&Requirements::new("RESULTS.race").param("year", "since last year"))
            .await;

        assert!(!resp.success);
        assert_eq!(resp.metadata.error_kind, Some(FailureKind::UnexpectedError));
        assert_eq!(resp.metadata.error_type.as_deref(), Some("split_error"));
    }

    #[tokio::test]
    async fn empty_entity_list_has_no_entities() {
        let req = Requirements::new("RESULTS.race").param("driver", ParamValue::List(vec![]));
        let resp = pipeline(FixtureProvider::new()).process(&req).await;

        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("No parallel entities found"));
        assert_eq!(resp.metadata.error_kind, Some(FailureKind::NoEntitiesFound));
    }

    #[tokio::test]
    async fn panicking_provider_is_captured_per_unit() {
        let provider = FixtureProvider::new()
            .with_fallback(FixtureReply::Rows(df!("position" => &["1"]).unwrap()))
            .route("/2020/results", FixtureReply::Panic("decoder bug".into()));
        let req =
            Requirements::new("RESULTS.race").param("year", ParamValue::list([2019, 2021]));
        let resp = pipeline(provider).process(&req).await;

        assert!(!resp.success);
        assert_eq!(resp.rows().unwrap().height(), 2);
        assert_eq!(
            resp.error.as_deref(),
            Some("year 2020: task panicked: decoder bug")
        );
    }
}
