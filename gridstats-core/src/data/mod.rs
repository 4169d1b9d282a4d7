//! Upstream collaborators: endpoint resolution and statistics providers

pub mod endpoints;
pub mod ergast;
pub mod fixture;
pub mod provider;

pub use endpoints::{EndpointBuilder, EndpointCatalog, EndpointSpec};
pub use ergast::{ErgastConfig, ErgastProvider};
pub use fixture::{FixtureProvider, FixtureReply};
pub use provider::{FetchError, FetchResponse, StatsProvider};
