use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray, TimestampSecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use parquet::arrow::ArrowWriter;

const ORDERS: usize = 20_000;

const STATES: [(&str, f64); 10] = [
    ("SP", 0.42),
    ("RJ", 0.13),
    ("MG", 0.12),
    ("RS", 0.06),
    ("PR", 0.05),
    ("SC", 0.04),
    ("BA", 0.04),
    ("ES", 0.03),
    ("AL", 0.06),
    ("MA", 0.05),
];

const CATEGORIES: [&str; 24] = [
    "bed_bath_table",
    "health_beauty",
    "sports_leisure",
    "furniture_decor",
    "computers_accessories",
    "housewares",
    "watches_gifts",
    "telephony",
    "garden_tools",
    "auto",
    "toys",
    "cool_stuff",
    "perfumery",
    "baby",
    "electronics",
    "stationery",
    "fashion_bags_accessories",
    "pet_shop",
    "office_furniture",
    "consoles_games",
    "luggage_accessories",
    "construction_tools_construction",
    "home_appliances",
    "audio",
];

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
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
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
        (self.next_f64() * n as f64) as usize % n
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn weighted<'a>(&mut self, table: &[(&'a str, f64)]) -> &'a str {
        let total: f64 = table.iter().map(|(_, w)| w).sum();
        let mut pick = self.next_f64() * total;
        for &(value, weight) in table {
            if pick < weight {
                return value;
            }
            pick -= weight;
        }
        table[table.len() - 1].0
    }
}

struct SampleOrder {
    order_id: String,
    customer_state: &'static str,
    product_category_en: Option<&'static str>,
    delivery_status: &'static str,
    review_score: i64,
    days_difference: f64,
    purchase: NaiveDateTime,
    estimated: NaiveDateTime,
    delivered: Option<NaiveDateTime>,
    purchase_month: String,
}

fn generate_order(id: usize, rng: &mut SimpleRng, start: NaiveDateTime) -> SampleOrder {
    let customer_state = rng.weighted(&STATES);
    // Far-away states wait longer.
    let remote = matches!(customer_state, "AL" | "MA" | "BA");
    let product_category_en = if rng.next_f64() < 0.02 {
        None
    } else {
        Some(CATEGORIES[rng.below(CATEGORIES.len())])
    };

    let purchase = start
        + Duration::days(rng.below(600) as i64)
        + Duration::seconds(rng.below(86_400) as i64);
    let estimated = (purchase + Duration::days(15 + rng.below(16) as i64))
        .date()
        .and_hms_opt(0, 0, 0)
        .unwrap_or(purchase);

    let mean_delay = if remote { -7.0 } else { -12.0 };
    let days_difference = rng.gauss(mean_delay, 8.0).round();
    let delivery_status = match days_difference {
        d if d <= 0.0 => "On Time",
        d if d <= 5.0 => "Late",
        _ => "Super Late",
    };

    let base_score = match delivery_status {
        "On Time" => 4.4,
        "Late" => 3.2,
        _ => 1.9,
    };
    let review_score = rng.gauss(base_score, 1.0).round().clamp(1.0, 5.0) as i64;

    let delivered = if rng.next_f64() < 0.01 {
        None
    } else {
        Some(
            estimated
                + Duration::days(days_difference as i64)
                + Duration::seconds(rng.below(86_400) as i64),
        )
    };

    SampleOrder {
        order_id: format!("{:032x}", (id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        customer_state,
        product_category_en,
        delivery_status,
        review_score,
        days_difference,
        purchase,
        estimated,
        delivered,
        purchase_month: purchase.format("%Y-%m").to_string(),
    }
}

fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn write_csv(path: &str, orders: &[SampleOrder]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer.write_record([
        "order_id",
        "customer_state",
        "product_category_en",
        "delivery_status",
        "review_score",
        "days_difference",
        "order_purchase_timestamp",
        "order_estimated_delivery_date",
        "order_delivered_customer_date",
        "purchase_month",
    ])?;
    for o in orders {
        writer.write_record([
            o.order_id.clone(),
            o.customer_state.to_string(),
            o.product_category_en.unwrap_or("").to_string(),
            o.delivery_status.to_string(),
            o.review_score.to_string(),
            format!("{:.1}", o.days_difference),
            fmt_ts(&o.purchase),
            fmt_ts(&o.estimated),
            o.delivered.as_ref().map(fmt_ts).unwrap_or_default(),
            o.purchase_month.clone(),
        ])?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_parquet(path: &str, orders: &[SampleOrder]) -> Result<()> {
    let ts = |t: &NaiveDateTime| t.and_utc().timestamp();

    let schema = Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Utf8, false),
        Field::new("customer_state", DataType::Utf8, false),
        Field::new("product_category_en", DataType::Utf8, true),
        Field::new("delivery_status", DataType::Utf8, false),
        Field::new("review_score", DataType::Int64, false),
        Field::new("days_difference", DataType::Float64, false),
        Field::new(
            "order_purchase_timestamp",
            DataType::Timestamp(TimeUnit::Second, None),
            false,
        ),
        Field::new(
            "order_estimated_delivery_date",
            DataType::Timestamp(TimeUnit::Second, None),
            false,
        ),
        Field::new(
            "order_delivered_customer_date",
            DataType::Timestamp(TimeUnit::Second, None),
            true,
        ),
        Field::new("purchase_month", DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(orders.iter().map(|o| o.order_id.as_str()))),
            Arc::new(StringArray::from_iter_values(orders.iter().map(|o| o.customer_state))),
            Arc::new(orders.iter().map(|o| o.product_category_en).collect::<StringArray>()),
            Arc::new(StringArray::from_iter_values(orders.iter().map(|o| o.delivery_status))),
            Arc::new(Int64Array::from_iter_values(orders.iter().map(|o| o.review_score))),
            Arc::new(Float64Array::from_iter_values(orders.iter().map(|o| o.days_difference))),
            Arc::new(TimestampSecondArray::from_iter_values(orders.iter().map(|o| ts(&o.purchase)))),
            Arc::new(TimestampSecondArray::from_iter_values(
                orders.iter().map(|o| ts(&o.estimated)),
            )),
            Arc::new(
                orders
                    .iter()
                    .map(|o| o.delivered.as_ref().map(ts))
                    .collect::<TimestampSecondArray>(),
            ),
            Arc::new(StringArray::from_iter_values(
                orders.iter().map(|o| o.purchase_month.as_str()),
            )),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut rng = SimpleRng::new(42);
    let start = NaiveDate::from_ymd_opt(2017, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("sample start date")?;

    let orders: Vec<SampleOrder> = (0..ORDERS)
        .map(|id| generate_order(id, &mut rng, start))
        .collect();

    let csv_path = "veridi_master_clean.csv";
    let parquet_path = "veridi_master_clean.parquet";
    write_csv(csv_path, &orders)?;
    write_parquet(parquet_path, &orders)?;

    log::info!("Wrote {} orders to {csv_path} and {parquet_path}", orders.len());
    Ok(())
}
