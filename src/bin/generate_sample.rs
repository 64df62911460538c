use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate};
use parquet::arrow::ArrowWriter;

const ROWS: usize = 1000;
const GROSS_MARGIN_PCT: f64 = 4.761904762;

const BRANCHES: [(&str, &str); 3] = [("A", "Yangon"), ("B", "Mandalay"), ("C", "Naypyitaw")];
const CUSTOMER_TYPES: [&str; 2] = ["Member", "Normal"];
const GENDERS: [&str; 2] = ["Female", "Male"];
const PRODUCT_LINES: [&str; 6] = [
    "Electronic accessories",
    "Fashion accessories",
    "Food and beverages",
    "Health and beauty",
    "Home and lifestyle",
    "Sports and travel",
];
const PAYMENTS: [&str; 3] = ["Ewallet", "Cash", "Credit card"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len())]
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

struct Row {
    invoice_id: String,
    branch: &'static str,
    city: &'static str,
    customer_type: &'static str,
    gender: &'static str,
    product_line: &'static str,
    unit_price: f64,
    quantity: i64,
    tax: f64,
    total: f64,
    date: String,
    time: String,
    payment: &'static str,
    cogs: f64,
    gross_income: f64,
    rating: f64,
}

fn generate(rng: &mut SimpleRng, first_day: NaiveDate) -> Vec<Row> {
    (0..ROWS)
        .map(|i| {
            let (branch, city) = BRANCHES[rng.below(BRANCHES.len())];
            let unit_price = round2(10.0 + rng.next_f64() * 90.0);
            let quantity = 1 + rng.below(10) as i64;
            let cogs = round2(unit_price * quantity as f64);
            let tax = round2(cogs * 0.05);
            let date = first_day + Duration::days(rng.below(89) as i64);
            Row {
                // Sequence-derived digits keep ids unique.
                invoice_id: format!("{:03}-{:02}-{:04}", 100 + i % 900, rng.below(100), i),
                branch,
                city,
                customer_type: rng.pick(&CUSTOMER_TYPES),
                gender: rng.pick(&GENDERS),
                product_line: rng.pick(&PRODUCT_LINES),
                unit_price,
                quantity,
                tax,
                total: round2(cogs + tax),
                date: date.format("%-m/%-d/%Y").to_string(),
                time: format!("{:02}:{:02}", 10 + rng.below(11), rng.below(60)),
                payment: rng.pick(&PAYMENTS),
                cogs,
                gross_income: tax,
                rating: (40.0 + rng.below(61) as f64) / 10.0,
            }
        })
        .collect()
}

const HEADER: [&str; 17] = [
    "Invoice ID",
    "Branch",
    "City",
    "Customer type",
    "Gender",
    "Product line",
    "Unit price",
    "Quantity",
    "Tax 5%",
    "Total",
    "Date",
    "Time",
    "Payment",
    "cogs",
    "gross margin percentage",
    "gross income",
    "Rating",
];

fn write_csv(path: &Path, rows: &[Row]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV file")?;
    writer.write_record(HEADER)?;
    for r in rows {
        writer.write_record([
            r.invoice_id.clone(),
            r.branch.to_string(),
            r.city.to_string(),
            r.customer_type.to_string(),
            r.gender.to_string(),
            r.product_line.to_string(),
            format!("{:.2}", r.unit_price),
            r.quantity.to_string(),
            format!("{:.4}", r.tax),
            format!("{:.4}", r.total),
            r.date.clone(),
            r.time.clone(),
            r.payment.to_string(),
            format!("{:.2}", r.cogs),
            format!("{GROSS_MARGIN_PCT}"),
            format!("{:.4}", r.gross_income),
            format!("{:.1}", r.rating),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, rows: &[Row]) -> Result<()> {
    let text = |f: fn(&Row) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let num = |f: fn(&Row) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };

    let columns: Vec<ArrayRef> = vec![
        text(|r| r.invoice_id.as_str()),
        text(|r| r.branch),
        text(|r| r.city),
        text(|r| r.customer_type),
        text(|r| r.gender),
        text(|r| r.product_line),
        num(|r| r.unit_price),
        Arc::new(Int64Array::from(rows.iter().map(|r| r.quantity).collect::<Vec<_>>())),
        num(|r| r.tax),
        num(|r| r.total),
        text(|r| r.date.as_str()),
        text(|r| r.time.as_str()),
        text(|r| r.payment),
        num(|r| r.cogs),
        num(|_| GROSS_MARGIN_PCT),
        num(|r| r.gross_income),
        num(|r| r.rating),
    ];

    let schema = Arc::new(Schema::new(
        HEADER
            .iter()
            .zip(&columns)
            .map(|(name, col)| Field::new(*name, col.data_type().clone(), false))
            .collect::<Vec<_>>(),
    ));

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let first_day = NaiveDate::from_ymd_opt(2019, 1, 1).context("invalid start date")?;
    let rows = generate(&mut rng, first_day);

    let out_dir = Path::new("data");
    std::fs::create_dir_all(out_dir).context("creating data directory")?;

    let csv_path = out_dir.join("data.csv");
    write_csv(&csv_path, &rows)?;
    let parquet_path = out_dir.join("data.parquet");
    write_parquet(&parquet_path, &rows)?;

    println!(
        "Wrote {} sales records to {} and {}",
        rows.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
