//! Single-unit dispatch with bounded retry.
//!
//! One call validates and normalizes the request, builds the upstream path
//! and fetches it, retrying provider failures and transport errors with a
//! linear backoff. Every outcome is returned as a `UnitResult`.

use crate::config::RetryPolicy;
use crate::result::{DispatchError, UnitMetadata, UnitResult};
use gridstats_core::data::{EndpointBuilder, FetchError, FetchResponse, StatsProvider};
use gridstats_core::{normalize, Requirements};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Dispatcher {
    provider: Arc<dyn StatsProvider>,
    endpoints: Arc<dyn EndpointBuilder>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        provider: Arc<dyn StatsProvider>,
        endpoints: Arc<dyn EndpointBuilder>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            endpoints,
            retry,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch one atomic request. Never fails; errors are in the outcome.
    pub async fn dispatch(&self, requirements: &Requirements) -> UnitResult {
        if let Err(e) = requirements.validate() {
            warn!(error = %e, "rejecting malformed requirements");
            return UnitResult::failure(
                DispatchError::InvalidRequirements(e.to_string()),
                UnitMetadata::now(),
            );
        }

        let endpoint_id = requirements.endpoint.as_str();
        let params = normalize(&requirements.params);
        if endpoint_id.is_empty() || params.is_empty() {
            warn!(endpoint = endpoint_id, "missing endpoint or parameters");
            return UnitResult::failure(DispatchError::MissingParameters, UnitMetadata::now());
        }

        let max_attempts = self.retry.max_attempts;
        for attempt in 0..max_attempts {
            let number = attempt + 1;
            let exhausted = number >= max_attempts;

            let Some(path) = self.endpoints.build(endpoint_id, &params) else {
                warn!(endpoint = endpoint_id, "cannot build endpoint");
                let meta = UnitMetadata {
                    endpoint: Some(endpoint_id.to_string()),
                    params: Some(params),
                    ..UnitMetadata::now()
                };
                return UnitResult::failure(
                    DispatchError::EndpointBuildFailed(endpoint_id.to_string()),
                    meta,
                );
            };

            debug!(endpoint = %path, attempt = number, provider = self.provider.name(), "fetching");
            match self.provider.fetch(&path, &params).await {
                Ok(FetchResponse {
                    success: true,
                    data: Some(df),
                    ..
                }) => {
                    let meta = UnitMetadata {
                        endpoint: Some(path),
                        params: Some(params),
                        attempt: Some(number),
                        rows: Some(df.height()),
                        ..UnitMetadata::now()
                    };
                    return UnitResult::success(df, meta);
                }
                Err(FetchError::UnexpectedPayload(desc)) => {
                    warn!(endpoint = %path, %desc, "unstructured response");
                    let meta = UnitMetadata {
                        endpoint: Some(path),
                        params: Some(params),
                        attempt: Some(number),
                        ..UnitMetadata::now()
                    };
                    return UnitResult::failure(DispatchError::InvalidResponseType(desc), meta);
                }
                Err(e) => {
                    if !exhausted {
                        self.back_off(attempt, &path, &e.to_string()).await;
                        continue;
                    }
                    let meta = UnitMetadata {
                        endpoint: Some(endpoint_id.to_string()),
                        attempt: Some(number),
                        error_type: Some(e.error_type().to_string()),
                        ..UnitMetadata::now()
                    };
                    let error = DispatchError::Processing {
                        message: e.to_string(),
                        error_type: e.error_type().to_string(),
                    };
                    return UnitResult::failure(error, meta);
                }
                Ok(reply) => {
                    if !exhausted {
                        let reason = reply.error.as_deref().unwrap_or("no data");
                        self.back_off(attempt, &path, reason).await;
                        continue;
                    }
                    let meta = UnitMetadata {
                        endpoint: Some(path),
                        params: Some(params),
                        attempt: Some(number),
                        ..UnitMetadata::now()
                    };
                    return UnitResult::failure(DispatchError::no_data(reply.error), meta);
                }
            }
        }

        // only reachable with a zero attempt cap
        let meta = UnitMetadata {
            endpoint: Some(endpoint_id.to_string()),
            max_retries: Some(max_attempts),
            ..UnitMetadata::now()
        };
        UnitResult::failure(DispatchError::MaxRetriesExceeded, meta)
    }

    async fn back_off(&self, attempt: u32, path: &str, reason: &str) {
        let delay = self.retry.delay_for(attempt);
        warn!(
            endpoint = path,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            reason,
            "fetch failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
