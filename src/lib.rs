//! Qualified audience segment resolution against the ODP GraphQL API, with a
//! bounded expiring cache keyed by user identity.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod odp;
pub mod segments;
pub mod utils;

pub use odp::{FetchError, FetchRequest, OdpClient, SegmentFetcher};
pub use segments::{SegmentOptions, SegmentResolver};
