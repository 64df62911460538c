use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use eframe::egui::{self, Color32, RichText, ScrollArea, Stroke, Ui};
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, GridMark, Legend, Line, Plot, PlotPoints, Points,
};

use crate::data::aggregate::Dashboard;
use crate::fmt::{money, rating};
use crate::state::AppState;

const CHART_HEIGHT: f32 = 260.0;
const REVENUE_COLOR: Color32 = Color32::from_rgb(70, 90, 170);

// ---------------------------------------------------------------------------
// Dashboard (central panel)
// ---------------------------------------------------------------------------

/// Render summary metrics and every chart in the central panel.
pub fn dashboard(ui: &mut Ui, state: &AppState) {
    if state.dataset.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to view sales  (File → Open…)");
        });
        return;
    }

    let dash = &state.dashboard;
    metric_cards(ui, dash);
    ui.add_space(8.0);

    if dash.subset_len == 0 {
        ui.label(RichText::new("No records match the current filters.").italics());
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("Daily sales");
            daily_revenue_chart(ui, dash);
            ui.add_space(12.0);

            ui.columns(2, |cols: &mut [Ui]| {
                cols[0].heading("Revenue by product line");
                revenue_by_category_chart(&mut cols[0], dash);
                cols[1].heading("Product line by gender");
                gender_chart(&mut cols[1], state);
            });
            ui.add_space(12.0);

            ui.columns(2, |cols: &mut [Ui]| {
                cols[0].heading("Spend per customer type");
                customer_spend_chart(&mut cols[0], state);
                cols[1].heading("Payment methods");
                payment_chart(&mut cols[1], state);
            });
        });
}

fn metric_cards(ui: &mut Ui, dash: &Dashboard) {
    let s = &dash.summary;
    let cards = [
        ("Total sales", money(s.total_revenue)),
        ("Unique invoices", s.distinct_invoices.to_string()),
        ("Gross income", money(s.gross_income)),
        ("Mean rating", rating(s.mean_rating)),
    ];
    ui.columns(cards.len(), |cols: &mut [Ui]| {
        for (col, (title, value)) in cols.iter_mut().zip(cards) {
            egui::Frame::group(col.style()).show(col, |ui: &mut Ui| {
                ui.set_min_width(ui.available_width());
                ui.label(title);
                ui.heading(RichText::new(value).strong());
            });
        }
    });
}

// ---------------------------------------------------------------------------
// Axis helpers
// ---------------------------------------------------------------------------

fn day_number(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

fn date_formatter(mark: GridMark, _range: &RangeInclusive<f64>) -> String {
    NaiveDate::from_num_days_from_ce_opt(mark.value.round() as i32)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Axis labels for categorical charts: bar `i` sits at coordinate `i`.
fn category_formatter(labels: Vec<String>) -> impl Fn(GridMark, &RangeInclusive<f64>) -> String {
    move |mark: GridMark, _range: &RangeInclusive<f64>| {
        let idx = mark.value.round();
        if idx < 0.0 || (mark.value - idx).abs() > 1e-6 {
            return String::new();
        }
        labels.get(idx as usize).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

fn daily_revenue_chart(ui: &mut Ui, dash: &Dashboard) {
    let points: PlotPoints = dash
        .daily_revenue
        .iter()
        .map(|d| [day_number(d.date), d.total])
        .collect();

    Plot::new("daily_revenue")
        .height(CHART_HEIGHT)
        .x_axis_label("Date")
        .y_axis_label("Total sales ($)")
        .x_axis_formatter(date_formatter)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(points).name("Total").color(REVENUE_COLOR).width(1.5));
        });
}

fn revenue_by_category_chart(ui: &mut Ui, dash: &Dashboard) {
    let labels: Vec<String> = dash
        .revenue_by_category
        .iter()
        .map(|r| r.product_line.clone())
        .collect();
    let bars: Vec<Bar> = dash
        .revenue_by_category
        .iter()
        .enumerate()
        .map(|(i, r)| Bar::new(i as f64, r.total).name(&r.product_line).width(0.6))
        .collect();

    Plot::new("revenue_by_category")
        .height(CHART_HEIGHT)
        .x_axis_label("Total sales ($)")
        .y_axis_formatter(category_formatter(labels))
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).horizontal().color(REVENUE_COLOR));
        });
}

fn gender_chart(ui: &mut Ui, state: &AppState) {
    let counts = &state.dashboard.category_gender_counts;
    let mut lines: Vec<String> = counts.iter().map(|c| c.product_line.clone()).collect();
    lines.dedup();
    let mut genders: Vec<&str> = counts.iter().map(|c| c.gender.as_str()).collect();
    genders.sort_unstable();
    genders.dedup();

    let width = 0.8 / genders.len().max(1) as f64;
    let charts: Vec<BarChart> = genders
        .iter()
        .enumerate()
        .map(|(g, &gender)| {
            let offset = (g as f64 - (genders.len() as f64 - 1.0) / 2.0) * width;
            let bars = counts
                .iter()
                .filter(|c| c.gender == gender)
                .filter_map(|c| {
                    let row = lines.iter().position(|l| *l == c.product_line)?;
                    Some(Bar::new(row as f64 + offset, c.count as f64).width(width))
                })
                .collect();
            BarChart::new(bars)
                .horizontal()
                .name(gender)
                .color(state.gender_colors.color_for(gender))
        })
        .collect();

    Plot::new("category_gender")
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .x_axis_label("Customers")
        .y_axis_formatter(category_formatter(lines))
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for chart in charts {
                plot_ui.bar_chart(chart);
            }
        });
}

fn customer_spend_chart(ui: &mut Ui, state: &AppState) {
    let rows = &state.dashboard.spending_by_customer_type;
    let labels: Vec<String> = rows.iter().map(|r| r.customer_type.clone()).collect();

    Plot::new("customer_spend")
        .height(CHART_HEIGHT)
        .y_axis_label("Total ($)")
        .x_axis_formatter(category_formatter(labels))
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for (i, row) in rows.iter().enumerate() {
                let s = &row.stats;
                let color = state.customer_colors.color_for(&row.customer_type);
                let elem = BoxElem::new(
                    i as f64,
                    BoxSpread::new(s.lower_whisker, s.q1, s.median, s.q3, s.upper_whisker),
                )
                .name(&row.customer_type)
                .box_width(0.5)
                .whisker_width(0.3)
                .stroke(Stroke::new(1.5, color))
                .fill(color.linear_multiply(0.3));
                plot_ui.box_plot(BoxPlot::new(vec![elem]).name(&row.customer_type));

                if !s.outliers.is_empty() {
                    let outliers: PlotPoints = s.outliers.iter().map(|&v| [i as f64, v]).collect();
                    plot_ui.points(Points::new(outliers).radius(2.5).color(color));
                }
            }
        });
}

fn payment_chart(ui: &mut Ui, state: &AppState) {
    let rows = &state.dashboard.payment_counts;
    let total = state.dashboard.subset_len.max(1) as f64;
    let labels: Vec<String> = rows
        .iter()
        .map(|r| format!("{} ({:.1}%)", r.method, r.count as f64 * 100.0 / total))
        .collect();
    let bars: Vec<Bar> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            Bar::new(i as f64, r.count as f64)
                .name(&r.method)
                .width(0.6)
                .fill(state.payment_colors.color_for(&r.method))
        })
        .collect();

    Plot::new("payment_methods")
        .height(CHART_HEIGHT)
        .y_axis_label("Transactions")
        .x_axis_formatter(category_formatter(labels))
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(value: f64) -> GridMark {
        GridMark { value, step_size: 1.0 }
    }

    #[test]
    fn test_date_axis_round_trips_day_numbers() {
        let date = NaiveDate::from_ymd_opt(2019, 1, 5).unwrap();
        assert_eq!(date_formatter(mark(day_number(date)), &(0.0..=1.0)), "2019-01-05");
    }

    #[test]
    fn test_category_axis_labels_only_whole_positions() {
        let fmt = category_formatter(vec!["Cash".into(), "Ewallet".into()]);
        assert_eq!(fmt(mark(1.0), &(0.0..=1.0)), "Ewallet");
        assert_eq!(fmt(mark(0.5), &(0.0..=1.0)), "");
        assert_eq!(fmt(mark(2.0), &(0.0..=1.0)), "");
        assert_eq!(fmt(mark(-1.0), &(0.0..=1.0)), "");
    }
}
