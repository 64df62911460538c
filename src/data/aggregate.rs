use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use super::model::SalesRecord;

// ---------------------------------------------------------------------------
// Aggregate views
// ---------------------------------------------------------------------------
//
// Every function below is pure over a filtered subset. Missing numeric values
// are skipped in sums and means; row counts never look at numeric columns.

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRevenue {
    pub product_line: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGenderCount {
    pub product_line: String,
    pub gender: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentCount {
    pub method: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SummaryMetrics {
    pub total_revenue: f64,
    pub distinct_invoices: usize,
    pub gross_income: f64,
    /// `None` when no record in the subset has a rating.
    pub mean_rating: Option<f64>,
}

/// Five-number summary in the usual box-plot convention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub mean: f64,
    /// Points beyond the whiskers, ascending.
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSpend {
    pub customer_type: String,
    pub stats: BoxStats,
}

/// Revenue per day, ascending by date.
pub fn daily_revenue(subset: &[&SalesRecord]) -> Vec<DailyRevenue> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for rec in subset {
        *by_date.entry(rec.date).or_default() += rec.total.unwrap_or(0.0);
    }
    by_date
        .into_iter()
        .map(|(date, total)| DailyRevenue { date, total })
        .collect()
}

/// Revenue per product line, lowest first.
pub fn revenue_by_category(subset: &[&SalesRecord]) -> Vec<CategoryRevenue> {
    let mut by_line: BTreeMap<&str, f64> = BTreeMap::new();
    for rec in subset {
        *by_line.entry(rec.product_line.as_str()).or_default() += rec.total.unwrap_or(0.0);
    }
    let mut rows: Vec<CategoryRevenue> = by_line
        .into_iter()
        .map(|(line, total)| CategoryRevenue {
            product_line: line.to_string(),
            total,
        })
        .collect();
    // Stable: equal totals keep name order.
    rows.sort_by(|a, b| a.total.total_cmp(&b.total));
    rows
}

/// Row count per (product line, gender) pair that occurs in the subset.
pub fn counts_by_category_and_gender(subset: &[&SalesRecord]) -> Vec<CategoryGenderCount> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for rec in subset {
        *counts
            .entry((rec.product_line.as_str(), rec.gender.as_str()))
            .or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((line, gender), count)| CategoryGenderCount {
            product_line: line.to_string(),
            gender: gender.to_string(),
            count,
        })
        .collect()
}

/// Row count per payment method, most used first.
pub fn payment_method_counts(subset: &[&SalesRecord]) -> Vec<PaymentCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for rec in subset {
        *counts.entry(rec.payment.as_str()).or_default() += 1;
    }
    let mut rows: Vec<PaymentCount> = counts
        .into_iter()
        .map(|(method, count)| PaymentCount {
            method: method.to_string(),
            count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

pub fn summary_metrics(subset: &[&SalesRecord]) -> SummaryMetrics {
    let total_revenue: f64 = subset.iter().filter_map(|r| r.total).sum();
    let gross_income: f64 = subset.iter().filter_map(|r| r.gross_income).sum();
    let distinct_invoices = subset
        .iter()
        .map(|r| r.invoice_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    let ratings: Vec<f64> = subset.iter().filter_map(|r| r.rating).collect();

    SummaryMetrics {
        total_revenue,
        distinct_invoices,
        gross_income,
        mean_rating: mean(&ratings),
    }
}

/// Distribution of `Total` per customer type. Customer types whose totals
/// are all missing are left out.
pub fn spending_by_customer_type(subset: &[&SalesRecord]) -> Vec<CustomerSpend> {
    let mut by_type: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for rec in subset {
        if let Some(total) = rec.total {
            by_type
                .entry(rec.customer_type.as_str())
                .or_default()
                .push(total);
        }
    }
    by_type
        .into_iter()
        .filter_map(|(customer_type, values)| {
            box_stats(values).map(|stats| CustomerSpend {
                customer_type: customer_type.to_string(),
                stats,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Quantile of sorted data by linear interpolation between closest ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Box statistics with whiskers at the furthest points within 1.5×IQR.
pub fn box_stats(mut values: Vec<f64>) -> Option<BoxStats> {
    values.retain(|v| !v.is_nan());
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let q1 = quantile(&values, 0.25);
    let median = quantile(&values, 0.5);
    let q3 = quantile(&values, 0.75);
    let iqr = q3 - q1;
    let low_fence = q1 - 1.5 * iqr;
    let high_fence = q3 + 1.5 * iqr;

    let inside = || values.iter().copied().filter(|&v| v >= low_fence && v <= high_fence);
    // The quartiles lie between min and max, so `inside` is never empty.
    let lower_whisker = inside().min_by(f64::total_cmp).unwrap_or(q1);
    let upper_whisker = inside().max_by(f64::total_cmp).unwrap_or(q3);
    let outliers = values
        .iter()
        .copied()
        .filter(|&v| v < low_fence || v > high_fence)
        .collect();

    Some(BoxStats {
        lower_whisker,
        q1,
        median,
        q3,
        upper_whisker,
        mean: mean(&values).unwrap_or(median),
        outliers,
    })
}

// ---------------------------------------------------------------------------
// Dashboard – every view from one pass over the subset
// ---------------------------------------------------------------------------

/// All aggregates the dashboard shows, recomputed together on each filter
/// change.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Dashboard {
    pub subset_len: usize,
    pub daily_revenue: Vec<DailyRevenue>,
    pub revenue_by_category: Vec<CategoryRevenue>,
    pub category_gender_counts: Vec<CategoryGenderCount>,
    pub payment_counts: Vec<PaymentCount>,
    pub spending_by_customer_type: Vec<CustomerSpend>,
    pub summary: SummaryMetrics,
}

impl Dashboard {
    pub fn compute(subset: &[&SalesRecord]) -> Self {
        Self {
            subset_len: subset.len(),
            daily_revenue: daily_revenue(subset),
            revenue_by_category: revenue_by_category(subset),
            category_gender_counts: counts_by_category_and_gender(subset),
            payment_counts: payment_method_counts(subset),
            spending_by_customer_type: spending_by_customer_type(subset),
            summary: summary_metrics(subset),
        }
    }
}
