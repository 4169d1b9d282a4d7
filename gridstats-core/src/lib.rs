//! GridStats Core: request model, normalization, classification and splitting.
//!
//! This crate holds everything that decides what to fetch:
//! - Parameter values and the `Requirements` request record
//! - Param normalizer (aliases, trimming, driver id casing)
//! - Query classifier (historical, career, multi-entity, single)
//! - Requirements splitter with an injected clock
//! - DataFrame helpers for tagging and row concatenation
//! - Upstream collaborators: endpoint catalog, HTTP provider, fixtures

pub mod classify;
pub mod clock;
pub mod data;
pub mod dataset;
pub mod normalize;
pub mod params;
pub mod requirements;
pub mod split;

pub use classify::{classify, QueryType};
pub use clock::{Clock, FixedClock, SystemClock};
pub use normalize::normalize;
pub use params::{ParamValue, Params, Scalar};
pub use requirements::{EntityType, Requirements, RequirementsError, SplitUnit, Tag};
pub use split::{CareerMetric, SplitError, Splitter};
