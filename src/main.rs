mod app;
mod color;
mod data;
mod fmt;
mod report;
mod state;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use app::SalesDashboardApp;
use chrono::NaiveDate;
use clap::Parser;
use data::filter::Selection;
use data::loader::{DataSource, DATE_FORMAT};
use data::model::{Dimension, SalesDataset};
use eframe::egui;
use state::AppState;

#[derive(Parser)]
#[command(name = "sales-dashboard", about = "Retail sales dashboard with interactive filters.")]
struct Cli {
    /// Sales dataset (.csv, .json or .parquet)
    #[arg(long, default_value = "data/data.csv")]
    data: PathBuf,

    /// Print the dashboard as text tables instead of opening a window
    #[arg(long)]
    report: bool,

    /// With --report, print the dashboard as JSON
    #[arg(long, requires = "report")]
    json: bool,

    /// First day to include (MM/DD/YYYY or YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Last day to include (MM/DD/YYYY or YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,

    /// Only these cities (repeatable)
    #[arg(long = "city")]
    cities: Vec<String>,

    /// Only these branches (repeatable)
    #[arg(long = "branch")]
    branches: Vec<String>,

    /// Only these customer types (repeatable)
    #[arg(long = "customer-type")]
    customer_types: Vec<String>,

    /// Only these genders (repeatable)
    #[arg(long = "gender")]
    genders: Vec<String>,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| format!("'{s}' is not a date (expected MM/DD/YYYY or YYYY-MM-DD)"))
}

impl Cli {
    /// Start from "everything" and narrow by whichever flags were given.
    fn selection(&self, dataset: &SalesDataset) -> Selection {
        let mut selection = Selection::all(dataset);
        match (self.from, self.to) {
            (Some(from), Some(to)) => selection.set_dates(from, to),
            // A single bound only narrows; the other stays at the data's edge.
            (from, to) => {
                selection.start = from.unwrap_or(selection.start);
                selection.end = to.unwrap_or(selection.end);
            }
        }
        let restrictions = [
            (Dimension::City, &self.cities),
            (Dimension::Branch, &self.branches),
            (Dimension::CustomerType, &self.customer_types),
            (Dimension::Gender, &self.genders),
        ];
        for (dim, values) in restrictions {
            if !values.is_empty() {
                selection.restrict(dim, values.iter().cloned());
            }
        }
        selection
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let source = DataSource::new(&cli.data);

    if cli.report {
        let dataset = source
            .load()
            .with_context(|| format!("loading {}", source.path().display()))?;
        let selection = cli.selection(&dataset);
        if cli.json {
            println!("{}", report::render_json(&dataset, &selection)?);
        } else {
            print!("{}", report::render(&dataset, &selection));
        }
        return Ok(());
    }

    let mut state = AppState::default();
    match source.load() {
        Ok(dataset) => {
            let selection = cli.selection(&dataset);
            state.set_dataset(Arc::clone(&dataset));
            state.selection = Some(selection);
            state.refilter();
        }
        Err(e) => {
            log::error!("Failed to load {}: {e}", source.path().display());
            state.set_load_error(format!("Cannot load {}: {e}", source.path().display()));
        }
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Sales Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(SalesDashboardApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("running the dashboard window: {e}"))
}
