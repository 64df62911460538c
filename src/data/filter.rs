use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use super::model::{Dimension, SalesDataset, SalesRecord};

// ---------------------------------------------------------------------------
// Selection: the active filter values
// ---------------------------------------------------------------------------

/// Current filter selection: an inclusive date range plus, per dimension,
/// the set of selected values.
///
/// A record passes when its date is within `[start, end]` and its value for
/// every dimension is in that dimension's set. An empty set selects nothing;
/// there is no "empty means all" fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub values: BTreeMap<Dimension, BTreeSet<String>>,
}

impl Selection {
    /// Full date range and every observed value: the dashboard's default.
    pub fn all(dataset: &SalesDataset) -> Self {
        let (start, end) = dataset
            .date_bounds
            .unwrap_or((NaiveDate::MIN, NaiveDate::MAX));
        Self {
            start,
            end,
            values: dataset.unique_values.clone(),
        }
    }

    /// Selected values for one dimension.
    pub fn selected(&self, dim: Dimension) -> Option<&BTreeSet<String>> {
        self.values.get(&dim)
    }

    pub fn is_selected(&self, dim: Dimension, value: &str) -> bool {
        self.values.get(&dim).is_some_and(|set| set.contains(value))
    }

    /// Set the date range. Reversed bounds are swapped.
    pub fn set_dates(&mut self, start: NaiveDate, end: NaiveDate) {
        self.start = start.min(end);
        self.end = start.max(end);
    }

    pub fn select_all(&mut self, dataset: &SalesDataset, dim: Dimension) {
        self.values.insert(dim, dataset.values(dim).clone());
    }

    pub fn select_none(&mut self, dim: Dimension) {
        self.values.insert(dim, BTreeSet::new());
    }

    /// Add `value` to the selection if absent, remove it otherwise.
    pub fn toggle(&mut self, dim: Dimension, value: &str) {
        let selected = self.values.entry(dim).or_default();
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
    }

    /// Replace a dimension's selection with exactly `values`.
    pub fn restrict<I, S>(&mut self, dim: Dimension, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .insert(dim, values.into_iter().map(Into::into).collect());
    }

    /// Whether a single record passes every filter.
    pub fn matches(&self, record: &SalesRecord) -> bool {
        if record.date < self.start || record.date > self.end {
            return false;
        }
        Dimension::ALL
            .iter()
            .all(|&dim| self.is_selected(dim, record.dimension(dim)))
    }
}

/// Order-preserving subset of `records` that passes `selection`.
pub fn filter<'a>(records: &'a [SalesRecord], selection: &Selection) -> Vec<&'a SalesRecord> {
    records.iter().filter(|r| selection.matches(r)).collect()
}

/// Return indices of records that pass all active filters.
pub fn filtered_indices(dataset: &SalesDataset, selection: &Selection) -> Vec<usize> {
    dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| selection.matches(rec))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::fixtures::*;

    #[test]
    fn test_default_selection_keeps_everything() {
        let ds = two_rows();
        let sel = Selection::all(&ds);
        assert_eq!(filtered_indices(&ds, &sel), vec![0, 1]);
    }

    #[test]
    fn test_city_filter() {
        let ds = two_rows();
        let mut sel = Selection::all(&ds);
        sel.restrict(Dimension::City, ["Yangon"]);

        let subset = filter(&ds.records, &sel);
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].city, "Yangon");
    }

    #[test]
    fn test_empty_set_selects_nothing() {
        let ds = two_rows();
        let mut sel = Selection::all(&ds);
        sel.select_none(Dimension::Gender);
        assert!(filter(&ds.records, &sel).is_empty());

        sel.select_all(&ds, Dimension::Gender);
        assert_eq!(filter(&ds.records, &sel).len(), 2);
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let ds = two_rows();
        let mut sel = Selection::all(&ds);

        sel.set_dates(date(2019, 1, 6), date(2019, 1, 6));
        assert_eq!(filtered_indices(&ds, &sel), vec![1]);

        sel.set_dates(date(2019, 1, 6), date(2019, 1, 5));
        assert_eq!((sel.start, sel.end), (date(2019, 1, 5), date(2019, 1, 6)));
        assert_eq!(filtered_indices(&ds, &sel), vec![0, 1]);

        sel.set_dates(date(2020, 1, 1), date(2020, 12, 31));
        assert!(filtered_indices(&ds, &sel).is_empty());
    }

    #[test]
    fn test_toggle() {
        let ds = two_rows();
        let mut sel = Selection::all(&ds);
        sel.toggle(Dimension::CustomerType, "Member");
        assert!(!sel.is_selected(Dimension::CustomerType, "Member"));
        assert_eq!(filtered_indices(&ds, &sel), vec![1]);

        sel.toggle(Dimension::CustomerType, "Member");
        assert_eq!(filtered_indices(&ds, &sel), vec![0, 1]);
    }

    #[test]
    fn test_every_kept_record_matches_all_predicates() {
        let ds = two_rows();
        let mut sel = Selection::all(&ds);
        sel.restrict(Dimension::Branch, ["B"]);
        sel.restrict(Dimension::Gender, ["Male", "Female"]);

        let subset = filter(&ds.records, &sel);
        assert!(subset.len() <= ds.len());
        for rec in subset {
            assert_eq!(rec.branch, "B");
            assert!(rec.date >= sel.start && rec.date <= sel.end);
            for dim in Dimension::ALL {
                assert!(sel.is_selected(dim, rec.dimension(dim)));
            }
        }
    }
}
