use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Dimension – the categorical columns the user can filter on
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    City,
    Branch,
    CustomerType,
    Gender,
}

impl Dimension {
    /// Filter panel order.
    pub const ALL: [Dimension; 4] = [
        Dimension::City,
        Dimension::Branch,
        Dimension::CustomerType,
        Dimension::Gender,
    ];

    /// Column name in the source file.
    pub fn column(self) -> &'static str {
        match self {
            Dimension::City => "City",
            Dimension::Branch => "Branch",
            Dimension::CustomerType => "Customer type",
            Dimension::Gender => "Gender",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ---------------------------------------------------------------------------
// SalesRecord – one row of the dataset
// ---------------------------------------------------------------------------

/// One transaction. Numeric columns are `None` when the cell was empty or
/// `NaN` in the source; the aggregator skips them in sums and means.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRecord {
    pub invoice_id: String,
    pub branch: String,
    pub city: String,
    pub customer_type: String,
    pub gender: String,
    pub product_line: String,
    pub unit_price: Option<f64>,
    pub quantity: Option<f64>,
    pub tax: Option<f64>,
    pub total: Option<f64>,
    pub date: NaiveDate,
    pub payment: String,
    pub cogs: Option<f64>,
    pub gross_margin_pct: Option<f64>,
    pub gross_income: Option<f64>,
    pub rating: Option<f64>,
}

impl SalesRecord {
    /// Value of a filterable column.
    pub fn dimension(&self, dim: Dimension) -> &str {
        match dim {
            Dimension::City => &self.city,
            Dimension::Branch => &self.branch,
            Dimension::CustomerType => &self.customer_type,
            Dimension::Gender => &self.gender,
        }
    }
}

// ---------------------------------------------------------------------------
// SalesDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed dataset with pre-computed filter domains. Immutable once
/// built.
#[derive(Debug, Clone)]
pub struct SalesDataset {
    /// All records, in source order.
    pub records: Vec<SalesRecord>,
    /// For each filter dimension the sorted set of observed values.
    pub unique_values: BTreeMap<Dimension, BTreeSet<String>>,
    /// Earliest and latest transaction date, `None` when empty.
    pub date_bounds: Option<(NaiveDate, NaiveDate)>,
}

impl SalesDataset {
    /// Build filter domains from the loaded records.
    pub fn from_records(records: Vec<SalesRecord>) -> Self {
        let mut unique_values: BTreeMap<Dimension, BTreeSet<String>> = Dimension::ALL
            .iter()
            .map(|&dim| (dim, BTreeSet::new()))
            .collect();
        let mut date_bounds: Option<(NaiveDate, NaiveDate)> = None;

        for rec in &records {
            for dim in Dimension::ALL {
                unique_values
                    .entry(dim)
                    .or_default()
                    .insert(rec.dimension(dim).to_string());
            }
            date_bounds = Some(match date_bounds {
                None => (rec.date, rec.date),
                Some((lo, hi)) => (lo.min(rec.date), hi.max(rec.date)),
            });
        }

        SalesDataset {
            records,
            unique_values,
            date_bounds,
        }
    }

    /// Observed values of one dimension.
    pub fn values(&self, dim: Dimension) -> &BTreeSet<String> {
        // Every dimension is seeded in `from_records`.
        &self.unique_values[&dim]
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_unique_values_and_bounds() {
        let ds = two_rows();
        assert_eq!(ds.len(), 2);
        let cities: Vec<&str> = ds.values(Dimension::City).iter().map(String::as_str).collect();
        assert_eq!(cities, vec!["Mandalay", "Yangon"]);
        assert_eq!(ds.values(Dimension::Branch).len(), 2);
        assert_eq!(ds.date_bounds, Some((date(2019, 1, 5), date(2019, 1, 6))));
    }

    #[test]
    fn test_empty_dataset_has_no_bounds() {
        let ds = SalesDataset::from_records(Vec::new());
        assert!(ds.is_empty());
        assert!(ds.date_bounds.is_none());
        for dim in Dimension::ALL {
            assert!(ds.values(dim).is_empty());
        }
    }
}
