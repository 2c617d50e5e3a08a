use std::collections::BTreeMap;

use serde::Serialize;

use super::filter::FilteredView;
use super::model::{DeliveryStatus, OrderRecord};
use crate::config::{AuditConfig, DelayBins, TopN};
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Running means and rates
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Mean of the pushed values; 0 when nothing was pushed.
    fn value(self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Late rate and volume of one group while it is being accumulated.
#[derive(Debug, Default, Clone, Copy)]
struct GroupTally {
    orders: usize,
    late: usize,
    review: Mean,
}

impl GroupTally {
    fn push(&mut self, is_late: bool, review_score: u8) {
        self.orders += 1;
        self.late += usize::from(is_late);
        self.review.push(f64::from(review_score));
    }

    fn late_rate(self) -> f64 {
        percent(self.late, self.orders)
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Scalar KPIs
// ---------------------------------------------------------------------------

/// Headline numbers of the current view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_orders: usize,
    pub late_orders: usize,
    pub super_late_orders: usize,
    pub pct_late: f64,
    pub pct_super_late: f64,
    pub avg_review: f64,
    /// Mean `days_difference` over rows that arrived after the estimate.
    pub avg_days_late: f64,
    /// Share of rows with `is_late`, the reference line of the state chart.
    pub national_late_rate: f64,
}

impl Kpis {
    pub fn from_view(view: &FilteredView<'_>) -> Self {
        let mut late_orders = 0;
        let mut super_late_orders = 0;
        let mut flagged = 0;
        let mut review = Mean::default();
        let mut days_late = Mean::default();

        for row in view.iter() {
            match row.order.delivery_status {
                DeliveryStatus::Late => late_orders += 1,
                DeliveryStatus::SuperLate => super_late_orders += 1,
                DeliveryStatus::OnTime => {}
            }
            flagged += usize::from(row.is_late);
            review.push(f64::from(row.order.review_score));
            if row.order.days_difference > 0.0 {
                days_late.push(row.order.days_difference);
            }
        }

        let total_orders = view.len();
        Kpis {
            total_orders,
            late_orders,
            super_late_orders,
            pct_late: percent(late_orders, total_orders),
            pct_super_late: percent(super_late_orders, total_orders),
            avg_review: review.value(),
            avg_days_late: days_late.value(),
            national_late_rate: percent(flagged, total_orders),
        }
    }
}

// ---------------------------------------------------------------------------
// Grouped aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: DeliveryStatus,
    pub orders: usize,
}

/// Order count per status, in status order.
pub fn status_distribution(view: &FilteredView<'_>) -> Vec<StatusCount> {
    let mut counts: BTreeMap<DeliveryStatus, usize> = BTreeMap::new();
    for row in view.iter() {
        *counts.entry(row.order.delivery_status).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(status, orders)| StatusCount { status, orders })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayByScore {
    pub review_score: u8,
    pub avg_days_difference: f64,
}

/// Mean delay for each review score present, ascending score.
pub fn delay_by_review_score(view: &FilteredView<'_>) -> Vec<DelayByScore> {
    let mut groups: BTreeMap<u8, Mean> = BTreeMap::new();
    for row in view.iter() {
        groups
            .entry(row.order.review_score)
            .or_default()
            .push(row.order.days_difference);
    }
    groups
        .into_iter()
        .map(|(review_score, mean)| DelayByScore {
            review_score,
            avg_days_difference: mean.value(),
        })
        .collect()
}

/// Late rate (%) and volume of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupLateRate {
    pub key: String,
    pub late_rate: f64,
    pub total_orders: usize,
}

fn tally_by<'v, F>(view: &'v FilteredView<'_>, key: F) -> BTreeMap<&'v str, GroupTally>
where
    F: Fn(&'v OrderRecord) -> Option<&'v str>,
{
    let mut groups: BTreeMap<&str, GroupTally> = BTreeMap::new();
    for row in view.iter() {
        if let Some(k) = key(row.order) {
            groups
                .entry(k)
                .or_default()
                .push(row.is_late, row.order.review_score);
        }
    }
    groups
}

fn by_late_rate(a: &GroupLateRate, b: &GroupLateRate) -> std::cmp::Ordering {
    a.late_rate
        .total_cmp(&b.late_rate)
        .then_with(|| a.key.cmp(&b.key))
}

/// Late rate and volume per customer state, ascending late rate.
pub fn state_performance(view: &FilteredView<'_>) -> Vec<GroupLateRate> {
    let mut rows: Vec<GroupLateRate> = tally_by(view, |o| Some(o.customer_state.as_str()))
        .into_iter()
        .map(|(key, tally)| GroupLateRate {
            key: key.to_string(),
            late_rate: tally.late_rate(),
            total_orders: tally.orders,
        })
        .collect();
    rows.sort_by(by_late_rate);
    rows
}

/// The `top_n` categories with the highest late rate, among categories with
/// at least `min_orders` orders. Descending late rate, ties by name.
pub fn category_performance(
    view: &FilteredView<'_>,
    min_orders: usize,
    top_n: TopN,
) -> Vec<GroupLateRate> {
    let mut rows: Vec<GroupLateRate> = tally_by(view, |o| o.product_category_en.as_deref())
        .into_iter()
        .filter(|(_, tally)| tally.orders >= min_orders)
        .map(|(key, tally)| GroupLateRate {
            key: key.to_string(),
            late_rate: tally.late_rate(),
            total_orders: tally.orders,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.late_rate
            .total_cmp(&a.late_rate)
            .then_with(|| a.key.cmp(&b.key))
    });
    rows.truncate(top_n.get());
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    pub purchase_month: String,
    pub late_rate: f64,
    pub avg_score: f64,
    pub order_count: usize,
}

/// Late rate, mean review and volume per purchase month, for months with
/// more than `min_orders` orders. Ascending month.
pub fn monthly_trends(view: &FilteredView<'_>, min_orders: usize) -> Vec<MonthlyTrend> {
    tally_by(view, |o| o.purchase_month.as_deref())
        .into_iter()
        .filter(|(_, tally)| tally.orders > min_orders)
        .map(|(month, tally)| MonthlyTrend {
            purchase_month: month.to_string(),
            late_rate: tally.late_rate(),
            avg_score: tally.review.value(),
            order_count: tally.orders,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewByStatus {
    pub status: DeliveryStatus,
    pub avg_review: f64,
}

/// Mean review score per status present in the view, in status order.
pub fn review_by_status(view: &FilteredView<'_>) -> Vec<ReviewByStatus> {
    let mut groups: BTreeMap<DeliveryStatus, Mean> = BTreeMap::new();
    for row in view.iter() {
        groups
            .entry(row.order.delivery_status)
            .or_default()
            .push(f64::from(row.order.review_score));
    }
    groups
        .into_iter()
        .map(|(status, mean)| ReviewByStatus {
            status,
            avg_review: mean.value(),
        })
        .collect()
}

/// Row of the status × score heatmap. `shares[i]` is the percentage of the
/// status's orders that scored `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDistribution {
    pub status: DeliveryStatus,
    pub shares: [f64; 5],
}

pub fn score_distribution_by_status(view: &FilteredView<'_>) -> Vec<ScoreDistribution> {
    let mut counts: BTreeMap<DeliveryStatus, [usize; 5]> = BTreeMap::new();
    for row in view.iter() {
        let score = usize::from(row.order.review_score);
        if (1..=5).contains(&score) {
            counts.entry(row.order.delivery_status).or_default()[score - 1] += 1;
        }
    }
    counts
        .into_iter()
        .map(|(status, per_score)| {
            let total: usize = per_score.iter().sum();
            ScoreDistribution {
                status,
                shares: per_score.map(|n| percent(n, total)),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayBinReview {
    pub lower: i32,
    pub upper: i32,
    pub midpoint: f64,
    pub avg_review: f64,
    pub orders: usize,
}

/// Mean review per non-empty delay bin, ascending.
pub fn review_by_delay_bin(view: &FilteredView<'_>, bins: DelayBins) -> Vec<DelayBinReview> {
    let mut groups: BTreeMap<usize, Mean> = BTreeMap::new();
    for row in view.iter() {
        if let Some(idx) = bins.index_of(row.order.days_difference) {
            groups
                .entry(idx)
                .or_default()
                .push(f64::from(row.order.review_score));
        }
    }
    groups
        .into_iter()
        .map(|(idx, mean)| {
            let (lower, upper) = bins.bounds(idx);
            DelayBinReview {
                lower,
                upper,
                midpoint: (f64::from(lower) + f64::from(upper)) / 2.0,
                avg_review: mean.value(),
                orders: mean.count,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayHistogramBin {
    pub lower: i32,
    pub upper: i32,
    pub orders: usize,
}

/// Order counts of `days_difference` per bin, empty bins included so the
/// spread keeps its gaps. Rows outside the bin range are not counted.
pub fn delay_histogram(view: &FilteredView<'_>, bins: DelayBins) -> Vec<DelayHistogramBin> {
    let mut counts = vec![0usize; bins.len()];
    for row in view.iter() {
        if let Some(slot) = bins
            .index_of(row.order.days_difference)
            .and_then(|idx| counts.get_mut(idx))
        {
            *slot += 1;
        }
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(idx, orders)| {
            let (lower, upper) = bins.bounds(idx);
            DelayHistogramBin {
                lower,
                upper,
                orders,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Full report
// ---------------------------------------------------------------------------

/// Everything the dashboard renders for one filter combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub kpis: Kpis,
    pub status_distribution: Vec<StatusCount>,
    pub delay_histogram: Vec<DelayHistogramBin>,
    pub delay_by_review_score: Vec<DelayByScore>,
    pub state_performance: Vec<GroupLateRate>,
    pub review_by_status: Vec<ReviewByStatus>,
    pub score_distribution: Vec<ScoreDistribution>,
    pub review_by_delay_bin: Vec<DelayBinReview>,
    pub top_categories: Vec<GroupLateRate>,
    pub monthly_trends: Vec<MonthlyTrend>,
}

/// Compute every aggregate of a non-empty view.
pub fn summarize(
    view: &FilteredView<'_>,
    config: &AuditConfig,
    top_n: TopN,
) -> Result<DashboardReport, PipelineError> {
    if view.is_empty() {
        return Err(PipelineError::EmptyView);
    }

    Ok(DashboardReport {
        kpis: Kpis::from_view(view),
        status_distribution: status_distribution(view),
        delay_histogram: delay_histogram(view, config.histogram_bins),
        delay_by_review_score: delay_by_review_score(view),
        state_performance: state_performance(view),
        review_by_status: review_by_status(view),
        score_distribution: score_distribution_by_status(view),
        review_by_delay_bin: review_by_delay_bin(view, config.delay_bins),
        top_categories: category_performance(view, config.min_category_orders, top_n),
        monthly_trends: monthly_trends(view, config.min_monthly_orders),
    })
}
