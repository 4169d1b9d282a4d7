//! In-memory provider with scripted replies.
//!
//! Serves canned replies per endpoint path for offline runs and tests. A
//! route's script is consumed in order and its last reply repeats. The
//! provider records every call and the peak number of fetches in flight,
//! which is how batch admission is observed.

use super::provider::{FetchError, FetchResponse, StatsProvider};
use crate::params::Params;
use async_trait::async_trait;
use polars::prelude::DataFrame;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum FixtureReply {
    /// Success with a dataset.
    Rows(DataFrame),
    /// Success with a zero-row dataset.
    Empty,
    /// Reported success but no dataset attached.
    NoData,
    /// Provider-reported failure with an optional message.
    Failure(Option<String>),
    /// The fetch raises a transport error.
    Transport(String),
    /// The fetch returns something that is not a structured mapping.
    Unstructured(String),
    /// The fetch panics, simulating a defect inside the provider.
    Panic(String),
}

pub struct FixtureProvider {
    routes: Mutex<HashMap<String, VecDeque<FixtureReply>>>,
    fallback: FixtureReply,
    latency: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for FixtureProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureProvider {
    /// Provider whose unrouted endpoints report a failure.
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            fallback: FixtureReply::Failure(None),
            latency: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Reply used for endpoints without a route.
    pub fn with_fallback(mut self, reply: FixtureReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Delay every fetch, so concurrent fetches overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Serve `reply` for every fetch of `endpoint`.
    pub fn route(self, endpoint: impl Into<String>, reply: FixtureReply) -> Self {
        self.script(endpoint, vec![reply])
    }

    /// Serve `replies` in order for `endpoint`; the last one repeats.
    pub fn script(self, endpoint: impl Into<String>, replies: Vec<FixtureReply>) -> Self {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(endpoint.into(), replies.into());
        self
    }

    /// Endpoint paths fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| c.as_str() == endpoint)
            .count()
    }

    /// Highest number of fetches observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, endpoint: &str) -> FixtureReply {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        match routes.get_mut(endpoint) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(FixtureReply::NoData),
            Some(script) => script.front().cloned().unwrap_or(FixtureReply::NoData),
            None => self.fallback.clone(),
        }
    }
}

/// Decrements the in-flight counter on drop, including on panic.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatsProvider for FixtureProvider {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn fetch(&self, endpoint: &str, _params: &Params) -> Result<FetchResponse, FetchError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(endpoint.to_string());
        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.next_reply(endpoint) {
            FixtureReply::Rows(df) => Ok(FetchResponse::rows(df)),
            FixtureReply::Empty => Ok(FetchResponse::rows(DataFrame::empty())),
            FixtureReply::NoData => Ok(FetchResponse {
                success: true,
                data: None,
                error: None,
            }),
            FixtureReply::Failure(error) => Ok(FetchResponse {
                success: false,
                data: None,
                error,
            }),
            FixtureReply::Transport(msg) => Err(FetchError::Transport(msg)),
            FixtureReply::Unstructured(desc) => Err(FetchError::UnexpectedPayload(desc)),
            FixtureReply::Panic(msg) => panic!("{msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[tokio::test]
    async fn scripts_replay_in_order_then_repeat_last() {
        let provider = FixtureProvider::new().script(
            "/x",
            vec![
                FixtureReply::Transport("reset".into()),
                FixtureReply::Rows(df!("a" => &[1i64]).unwrap()),
            ],
        );
        let params = Params::new();

        assert!(provider.fetch("/x", &params).await.is_err());
        assert!(provider.fetch("/x", &params).await.unwrap().success);
        assert!(provider.fetch("/x", &params).await.unwrap().success);
        assert_eq!(provider.call_count("/x"), 3);
    }

    #[tokio::test]
    async fn unrouted_endpoints_use_fallback() {
        let provider = FixtureProvider::new();
        let reply = provider.fetch("/missing", &Params::new()).await.unwrap();
        assert!(!reply.success);
        assert_eq!(provider.calls(), vec!["/missing".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn tracks_peak_concurrency() {
        let provider = FixtureProvider::new()
            .with_fallback(FixtureReply::Empty)
            .with_latency(Duration::from_millis(50));
        let params = Params::new();

        let fetches = (0..3).map(|_| provider.fetch("/y", &params));
        futures::future::join_all(fetches).await;

        assert_eq!(provider.peak_in_flight(), 3);
    }
}
