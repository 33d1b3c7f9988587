//! Orchestration over the upstream client.

pub mod dashboard;

pub use dashboard::{DashboardAggregator, SecondaryTier};
