use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::color::ColorMap;
use crate::data::aggregate::Dashboard;
use crate::data::filter::{filtered_indices, Selection};
use crate::data::model::{Dimension, SalesDataset, SalesRecord};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
#[derive(Default)]
pub struct AppState {
    /// Loaded dataset (None until a load succeeds).
    pub dataset: Option<Arc<SalesDataset>>,

    /// Active filters; present whenever `dataset` is.
    pub selection: Option<Selection>,

    /// Indices of records passing the current filters (cached).
    pub visible_indices: Vec<usize>,

    /// Aggregates over the visible records (cached).
    pub dashboard: Dashboard,

    /// Stable colours for the categorical series.
    pub gender_colors: ColorMap,
    pub customer_colors: ColorMap,
    pub payment_colors: ColorMap,

    /// A failed startup load. While set, nothing but the error is shown.
    pub load_error: Option<String>,

    /// Non-fatal status / error message shown in the top bar.
    pub status_message: Option<String>,
}

impl AppState {
    /// Ingest a newly loaded dataset and reset filters to "everything".
    pub fn set_dataset(&mut self, dataset: Arc<SalesDataset>) {
        self.selection = Some(Selection::all(&dataset));
        self.gender_colors = ColorMap::new(dataset.values(Dimension::Gender));
        self.customer_colors = ColorMap::new(dataset.values(Dimension::CustomerType));
        self.payment_colors = ColorMap::new(&payment_methods(&dataset));
        self.dataset = Some(dataset);
        self.load_error = None;
        self.status_message = None;
        self.refilter();
    }

    /// Record a fatal load failure.
    pub fn set_load_error(&mut self, message: String) {
        self.dataset = None;
        self.selection = None;
        self.visible_indices.clear();
        self.dashboard = Dashboard::default();
        self.load_error = Some(message);
    }

    /// Recompute `visible_indices` and the aggregates after a filter change.
    pub fn refilter(&mut self) {
        let (Some(ds), Some(sel)) = (&self.dataset, &self.selection) else {
            return;
        };
        let indices = filtered_indices(ds, sel);
        let subset: Vec<&SalesRecord> = indices.iter().map(|&i| &ds.records[i]).collect();
        let dashboard = Dashboard::compute(&subset);
        log::debug!("Filter matched {} of {} records", indices.len(), ds.len());

        self.visible_indices = indices;
        self.dashboard = dashboard;
    }

    pub fn set_dates(&mut self, start: NaiveDate, end: NaiveDate) {
        if let Some(sel) = &mut self.selection {
            sel.set_dates(start, end);
            self.refilter();
        }
    }

    /// Toggle a single value in a dimension's filter.
    pub fn toggle_filter_value(&mut self, dim: Dimension, value: &str) {
        if let Some(sel) = &mut self.selection {
            sel.toggle(dim, value);
            self.refilter();
        }
    }

    /// Select all values in a dimension.
    pub fn select_all(&mut self, dim: Dimension) {
        if let (Some(ds), Some(sel)) = (&self.dataset, &mut self.selection) {
            sel.select_all(ds, dim);
            self.refilter();
        }
    }

    /// Deselect all values in a dimension.
    pub fn select_none(&mut self, dim: Dimension) {
        if let Some(sel) = &mut self.selection {
            sel.select_none(dim);
            self.refilter();
        }
    }

    /// Back to the full date range and every value.
    pub fn reset_filters(&mut self) {
        if let Some(ds) = &self.dataset {
            self.selection = Some(Selection::all(ds));
            self.refilter();
        }
    }
}

fn payment_methods(dataset: &SalesDataset) -> BTreeSet<String> {
    dataset.records.iter().map(|r| r.payment.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::fixtures::*;

    fn loaded() -> AppState {
        let mut state = AppState::default();
        state.set_dataset(Arc::new(two_rows()));
        state
    }

    #[test]
    fn test_set_dataset_shows_everything() {
        let state = loaded();
        assert_eq!(state.visible_indices, vec![0, 1]);
        assert_eq!(state.dashboard.subset_len, 2);
        assert_eq!(state.dashboard.summary.distinct_invoices, 2);
    }

    #[test]
    fn test_filter_changes_recompute_dashboard() {
        let mut state = loaded();
        state.toggle_filter_value(Dimension::City, "Mandalay");
        assert_eq!(state.visible_indices, vec![0]);
        assert_eq!(state.dashboard.summary.total_revenue, 10.0);

        state.select_none(Dimension::Branch);
        assert!(state.visible_indices.is_empty());
        assert_eq!(state.dashboard.summary.mean_rating, None);

        state.reset_filters();
        assert_eq!(state.visible_indices, vec![0, 1]);
    }

    #[test]
    fn test_date_change() {
        let mut state = loaded();
        state.set_dates(date(2019, 1, 6), date(2019, 1, 31));
        assert_eq!(state.visible_indices, vec![1]);
        assert_eq!(state.dashboard.daily_revenue.len(), 1);
    }

    #[test]
    fn test_load_error_clears_dashboard() {
        let mut state = loaded();
        state.set_load_error("boom".into());
        assert!(state.dataset.is_none());
        assert_eq!(state.dashboard, Dashboard::default());
        assert_eq!(state.load_error.as_deref(), Some("boom"));
    }
}
