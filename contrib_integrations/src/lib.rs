//! Upstream adapters for the contribution aggregator.

pub mod http;
pub mod registry;
pub mod sources;

mod test_support;

pub use http::{DEFAULT_TIMEOUT, Fetch, HttpFetch};
pub use registry::sources_from_config;
