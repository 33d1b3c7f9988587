//! Edumate core: loads a student's academic dashboard from the institutional
//! API, classifies attendance, and drives report generation.
//!
//! Nothing here reads session state from ambient storage. Every operation
//! takes the `StudentIdentity` it acts for.

pub mod attendance;
pub mod config;
pub mod error;
pub mod generation;
pub mod photo;
pub mod reports;
pub mod services;
pub mod types;
pub mod upstream;

pub use config::{load_config, Config, ConfigError};
pub use error::{DashboardError, PageError};
pub use photo::{PhotoSlot, ProfileImage, ProfileImageResolver};
pub use reports::{ReportSessionController, ReportState, ReportType};
pub use services::DashboardAggregator;
pub use types::ProfileView;
pub use upstream::{Fetch, Institution, StudentIdentity, UpstreamClient, UpstreamError};
