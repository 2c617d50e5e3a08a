use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DeliveryStatus – the fixed, ordered outcome buckets
// ---------------------------------------------------------------------------

/// Delivery outcome of an order. The variant order is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    #[serde(rename = "On Time")]
    OnTime,
    #[serde(rename = "Late")]
    Late,
    #[serde(rename = "Super Late")]
    SuperLate,
}

impl DeliveryStatus {
    /// All statuses in display order.
    pub const ALL: [DeliveryStatus; 3] = [
        DeliveryStatus::OnTime,
        DeliveryStatus::Late,
        DeliveryStatus::SuperLate,
    ];

    /// The literal used in the source file.
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::OnTime => "On Time",
            DeliveryStatus::Late => "Late",
            DeliveryStatus::SuperLate => "Super Late",
        }
    }

    /// Late and Super Late both count as late.
    pub fn is_late(self) -> bool {
        matches!(self, DeliveryStatus::Late | DeliveryStatus::SuperLate)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeliveryStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| anyhow::anyhow!("unknown delivery status '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// OrderRecord – one row of the snapshot
// ---------------------------------------------------------------------------

/// A single order (one row of the source table).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub customer_state: String,
    /// Missing for orders whose product has no translated category.
    pub product_category_en: Option<String>,
    pub delivery_status: DeliveryStatus,
    /// 1..=5
    pub review_score: u8,
    /// Actual minus estimated delivery, in days. Positive means late.
    pub days_difference: f64,
    pub order_purchase_timestamp: NaiveDateTime,
    pub order_estimated_delivery_date: NaiveDateTime,
    pub order_delivered_customer_date: Option<NaiveDateTime>,
    /// Grouping key computed upstream, e.g. `2017-10`.
    pub purchase_month: Option<String>,
}

// ---------------------------------------------------------------------------
// OrderDataset – the complete loaded snapshot
// ---------------------------------------------------------------------------

/// The full parsed snapshot with the option lists for each filter.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDataset {
    /// All orders, in file order.
    pub records: Vec<OrderRecord>,
    /// Sorted distinct `customer_state` values.
    pub states: BTreeSet<String>,
    /// Distinct `delivery_status` values, display order.
    pub statuses: BTreeSet<DeliveryStatus>,
    /// Sorted distinct non-null `product_category_en` values.
    pub categories: BTreeSet<String>,
}

impl OrderDataset {
    /// Build the filter option lists from the loaded records.
    pub fn from_records(records: Vec<OrderRecord>) -> Self {
        let mut states = BTreeSet::new();
        let mut statuses = BTreeSet::new();
        let mut categories = BTreeSet::new();

        for rec in &records {
            states.insert(rec.customer_state.clone());
            statuses.insert(rec.delivery_status);
            if let Some(cat) = &rec.product_category_en {
                categories.insert(cat.clone());
            }
        }

        OrderDataset {
            records,
            states,
            statuses,
            categories,
        }
    }

    /// Number of orders.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot has no orders.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
