//! Data layer: core types, loading, filtering and aggregation.
//!
//! Architecture:
//! ```text
//!  veridi_master_clean.csv / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → OrderDataset (memoized once per process)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  state ∧ status ∧ category → FilteredView (+ is_late)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌───────────┐
//!   │ aggregate │  KPIs and grouped tables → DashboardReport
//!   └───────────┘
//! ```

pub mod aggregate;
pub mod filter;
pub mod loader;
pub mod model;
