use chrono::NaiveDate;
use comfy_table::{Cell, CellAlignment, Table};
use serde::Serialize;

use crate::data::aggregate::Dashboard;
use crate::data::filter::{filter, Selection};
use crate::data::model::{Dimension, SalesDataset};
use crate::fmt::{money, rating};

// ---------------------------------------------------------------------------
// Headless report: the dashboard as plain-text tables
// ---------------------------------------------------------------------------

/// Filter, aggregate, and render everything the dashboard shows.
pub fn render(dataset: &SalesDataset, selection: &Selection) -> String {
    let subset = filter(&dataset.records, selection);
    let dash = Dashboard::compute(&subset);

    let range = match dataset.date_bounds {
        Some(_) => format!("{} to {}", selection.start, selection.end),
        None => "no dates".to_string(),
    };
    let mut out = format!(
        "Sales Dashboard: {} of {} records, {range}\n",
        dash.subset_len,
        dataset.len(),
    );
    for dim in Dimension::ALL {
        let values = selection
            .selected(dim)
            .map(|set| set.iter().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        out.push_str(&format!("  {dim}: {values}\n"));
    }
    out.push('\n');

    out.push_str(&format_summary(&dash));
    if dash.subset_len == 0 {
        out.push_str("\nNo records match the current filters.\n");
        return out;
    }
    out.push_str(&format_daily(&dash));
    out.push_str(&format_categories(&dash));
    out.push_str(&format_customer_spend(&dash));
    out.push_str(&format_payments(&dash));
    out
}

/// Machine-readable form of [`render`].
#[derive(Serialize)]
struct JsonReport<'a> {
    records: usize,
    matched: usize,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    filters: Vec<(String, Vec<&'a str>)>,
    dashboard: Dashboard,
}

/// The same content as [`render`], as pretty-printed JSON. Dates are `null`
/// when the dataset has none.
pub fn render_json(dataset: &SalesDataset, selection: &Selection) -> serde_json::Result<String> {
    let subset = filter(&dataset.records, selection);
    let has_dates = dataset.date_bounds.is_some();
    let report = JsonReport {
        records: dataset.len(),
        matched: subset.len(),
        start: has_dates.then_some(selection.start),
        end: has_dates.then_some(selection.end),
        filters: Dimension::ALL
            .iter()
            .map(|dim| {
                let values = selection
                    .selected(*dim)
                    .map(|set| set.iter().map(String::as_str).collect())
                    .unwrap_or_default();
                (dim.to_string(), values)
            })
            .collect(),
        dashboard: Dashboard::compute(&subset),
    };
    serde_json::to_string_pretty(&report)
}

fn right(text: impl ToString) -> Cell {
    Cell::new(text.to_string()).set_alignment(CellAlignment::Right)
}

fn format_summary(dash: &Dashboard) -> String {
    let s = &dash.summary;
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![Cell::new("Total sales"), right(money(s.total_revenue))]);
    table.add_row(vec![Cell::new("Unique invoices"), right(s.distinct_invoices)]);
    table.add_row(vec![Cell::new("Gross income"), right(money(s.gross_income))]);
    table.add_row(vec![Cell::new("Mean rating"), right(rating(s.mean_rating))]);
    format!("Summary\n{table}\n")
}

fn format_daily(dash: &Dashboard) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Date", "Total"]);
    for day in &dash.daily_revenue {
        table.add_row(vec![Cell::new(day.date), right(money(day.total))]);
    }
    format!("\nDaily sales\n{table}\n")
}

fn format_categories(dash: &Dashboard) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Product line", "Total"]);
    for row in &dash.revenue_by_category {
        table.add_row(vec![Cell::new(&row.product_line), right(money(row.total))]);
    }

    let mut gender_table = Table::new();
    gender_table.set_header(vec!["Product line", "Gender", "Count"]);
    for row in &dash.category_gender_counts {
        gender_table.add_row(vec![
            Cell::new(&row.product_line),
            Cell::new(&row.gender),
            right(row.count),
        ]);
    }
    format!("\nRevenue by product line\n{table}\n\nProduct line by gender\n{gender_table}\n")
}

fn format_customer_spend(dash: &Dashboard) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Customer type", "Min", "Q1", "Median", "Q3", "Max", "Outliers"]);
    for row in &dash.spending_by_customer_type {
        let s = &row.stats;
        table.add_row(vec![
            Cell::new(&row.customer_type),
            right(money(s.lower_whisker)),
            right(money(s.q1)),
            right(money(s.median)),
            right(money(s.q3)),
            right(money(s.upper_whisker)),
            right(s.outliers.len()),
        ]);
    }
    format!("\nSpend per customer type\n{table}\n")
}

fn format_payments(dash: &Dashboard) -> String {
    let total = dash.subset_len.max(1) as f64;
    let mut table = Table::new();
    table.set_header(vec!["Payment", "Count", "%"]);
    for row in &dash.payment_counts {
        table.add_row(vec![
            Cell::new(&row.method),
            right(row.count),
            right(format!("{:.1}%", row.count as f64 * 100.0 / total)),
        ]);
    }
    format!("\nPayment methods\n{table}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::fixtures::*;

    #[test]
    fn test_render_full_selection() {
        let ds = two_rows();
        let out = render(&ds, &Selection::all(&ds));
        assert!(out.contains("2 of 2 records"));
        assert!(out.contains("$30.00"));
        assert!(out.contains("8.00"));
        assert!(out.contains("Electronic accessories"));
        assert!(out.contains("Payment methods"));
    }

    #[test]
    fn test_render_empty_selection() {
        let ds = two_rows();
        let mut sel = Selection::all(&ds);
        sel.set_dates(date(2020, 1, 1), date(2020, 1, 2));
        let out = render(&ds, &sel);
        assert!(out.contains("0 of 2 records"));
        assert!(out.contains("$0.00"));
        assert!(out.contains("no data"));
        assert!(out.contains("No records match"));
        assert!(!out.contains("Daily sales"));
    }

    #[test]
    fn test_render_dataset_without_dates() {
        let ds = SalesDataset::from_records(Vec::new());
        let out = render(&ds, &Selection::all(&ds));
        assert!(out.starts_with("Sales Dashboard: 0 of 0 records, no dates\n"));

        let json: serde_json::Value =
            serde_json::from_str(&render_json(&ds, &Selection::all(&ds)).unwrap()).unwrap();
        assert!(json["start"].is_null());
        assert_eq!(json["matched"], 0);
    }

    #[test]
    fn test_render_json_matches_text() {
        let ds = two_rows();
        let mut sel = Selection::all(&ds);
        sel.restrict(Dimension::City, ["Mandalay"]);
        let text = render_json(&ds, &sel).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["records"], 2);
        assert_eq!(json["matched"], 1);
        assert_eq!(json["start"], "2019-01-05");
        assert_eq!(json["dashboard"]["summary"]["total_revenue"], 20.0);
        assert_eq!(json["dashboard"]["summary"]["mean_rating"], 9.0);
        assert_eq!(json["filters"][0][1][0], "Mandalay");
    }
}
