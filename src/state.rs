use std::collections::BTreeSet;

use crate::config::{AuditConfig, TopN};
use crate::data::aggregate::{DashboardReport, summarize};
use crate::data::filter::{FilterSelection, FilteredView, apply_selection};
use crate::data::model::{DeliveryStatus, OrderDataset};
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// One of the three multi-select filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDimension {
    State,
    Status,
    Category,
}

/// Everything a dashboard session needs, independent of rendering.
///
/// Every control change triggers a full recomputation from the shared,
/// read-only base table.
pub struct SessionState<'a> {
    /// Base table shared by all sessions.
    pub dataset: &'a OrderDataset,

    pub config: AuditConfig,

    /// Current multi-select values.
    pub filters: FilterSelection,

    /// Scope of the category ranking.
    pub top_n: TopN,

    /// Number of orders passing the current filters (cached).
    pub visible_orders: usize,

    /// Aggregates of the current view; `None` when the view is empty.
    pub report: Option<DashboardReport>,

    /// Warning shown instead of the report.
    pub status_message: Option<String>,
}

impl<'a> SessionState<'a> {
    /// Start a session with the default selections and compute the report.
    pub fn new(dataset: &'a OrderDataset, config: AuditConfig) -> Self {
        let filters = FilterSelection::initial(dataset, config.default_category_selection);
        let mut state = Self {
            dataset,
            config,
            filters,
            top_n: TopN::default(),
            visible_orders: 0,
            report: None,
            status_message: None,
        };
        state.refresh();
        state
    }

    /// The filtered view for the current selection.
    pub fn view(&self) -> FilteredView<'a> {
        apply_selection(self.dataset, &self.filters)
    }

    /// Recompute the view and every aggregate after a control change.
    pub fn refresh(&mut self) {
        let view = self.view();
        self.visible_orders = view.len();

        match summarize(&view, &self.config, self.top_n) {
            Ok(report) => {
                self.report = Some(report);
                self.status_message = None;
            }
            Err(e) => {
                log::warn!("{e}");
                self.report = None;
                self.status_message = Some(e.to_string());
            }
        }
    }

    /// Move the Top-N control. Out-of-range values leave the state untouched.
    pub fn set_top_n(&mut self, value: u32) -> Result<(), PipelineError> {
        self.top_n = TopN::new(value)?;
        self.refresh();
        Ok(())
    }

    pub fn toggle_state(&mut self, state: &str) {
        toggle(&mut self.filters.states, state.to_string());
        self.refresh();
    }

    pub fn toggle_status(&mut self, status: DeliveryStatus) {
        toggle(&mut self.filters.statuses, status);
        self.refresh();
    }

    pub fn toggle_category(&mut self, category: &str) {
        toggle(&mut self.filters.categories, category.to_string());
        self.refresh();
    }

    /// Select all values of a filter.
    pub fn select_all(&mut self, dimension: FilterDimension) {
        match dimension {
            FilterDimension::State => self.filters.states = self.dataset.states.clone(),
            FilterDimension::Status => self.filters.statuses = self.dataset.statuses.clone(),
            FilterDimension::Category => {
                self.filters.categories = self.dataset.categories.clone()
            }
        }
        self.refresh();
    }

    /// Deselect all values of a filter.
    pub fn select_none(&mut self, dimension: FilterDimension) {
        match dimension {
            FilterDimension::State => self.filters.states.clear(),
            FilterDimension::Status => self.filters.statuses.clear(),
            FilterDimension::Category => self.filters.categories.clear(),
        }
        self.refresh();
    }
}

fn toggle<T: Ord>(selected: &mut BTreeSet<T>, value: T) {
    if !selected.remove(&value) {
        selected.insert(value);
    }
}
