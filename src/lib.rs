//! Last-mile logistics auditor.
//!
//! Loads the pre-computed order snapshot once per process, applies the three
//! dashboard filters and computes the delivery KPIs and grouped aggregates the
//! presentation layer renders.

pub mod config;
pub mod data;
pub mod error;
pub mod state;

pub use config::{AuditConfig, TopN};
pub use data::aggregate::{DashboardReport, Kpis, summarize};
pub use data::filter::{FilterSelection, FilteredView, apply_filters};
pub use data::loader::load;
pub use data::model::{DeliveryStatus, OrderDataset, OrderRecord};
pub use error::PipelineError;
pub use state::SessionState;
