use std::collections::BTreeSet;

use serde::Serialize;

use super::model::{DeliveryStatus, OrderDataset, OrderRecord};

// ---------------------------------------------------------------------------
// Filter selection: which values are allowed per dimension
// ---------------------------------------------------------------------------

/// The three multi-select filters. A row passes when its value is a member of
/// every set; an empty set therefore hides everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub states: BTreeSet<String>,
    pub statuses: BTreeSet<DeliveryStatus>,
    pub categories: BTreeSet<String>,
}

impl FilterSelection {
    /// The initial selection: every state and status, and the first
    /// `category_limit` categories in sorted order.
    pub fn initial(dataset: &OrderDataset, category_limit: usize) -> Self {
        FilterSelection {
            states: dataset.states.clone(),
            statuses: dataset.statuses.clone(),
            categories: dataset.categories.iter().take(category_limit).cloned().collect(),
        }
    }

    /// Select every value in every dimension.
    pub fn everything(dataset: &OrderDataset) -> Self {
        FilterSelection {
            states: dataset.states.clone(),
            statuses: dataset.statuses.clone(),
            categories: dataset.categories.clone(),
        }
    }

    fn admits(&self, order: &OrderRecord) -> bool {
        self.states.contains(&order.customer_state)
            && self.statuses.contains(&order.delivery_status)
            && order
                .product_category_en
                .as_ref()
                .is_some_and(|cat| self.categories.contains(cat))
    }
}

// ---------------------------------------------------------------------------
// Filtered view
// ---------------------------------------------------------------------------

/// One order that passed the filters, with its derived lateness flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilteredOrder<'a> {
    #[serde(flatten)]
    pub order: &'a OrderRecord,
    pub is_late: bool,
}

/// Rows of the base table that pass the current filters, in table order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilteredView<'a> {
    pub rows: Vec<FilteredOrder<'a>>,
}

impl<'a> FilteredView<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilteredOrder<'a>> + '_ {
        self.rows.iter()
    }
}

/// Keep the orders whose state, status and category are all selected.
///
/// A missing category never matches. `is_late` is derived afresh for every
/// kept row.
pub fn apply_filters<'a>(
    dataset: &'a OrderDataset,
    states: &BTreeSet<String>,
    statuses: &BTreeSet<DeliveryStatus>,
    categories: &BTreeSet<String>,
) -> FilteredView<'a> {
    let selection = FilterSelection {
        states: states.clone(),
        statuses: statuses.clone(),
        categories: categories.clone(),
    };
    apply_selection(dataset, &selection)
}

/// [`apply_filters`] taking the three sets bundled.
pub fn apply_selection<'a>(dataset: &'a OrderDataset, selection: &FilterSelection) -> FilteredView<'a> {
    let rows: Vec<FilteredOrder<'a>> = dataset
        .records
        .iter()
        .filter(|order| selection.admits(order))
        .map(|order| FilteredOrder {
            order,
            is_late: order.delivery_status.is_late(),
        })
        .collect();

    log::debug!("Filter kept {} of {} orders", rows.len(), dataset.len());
    FilteredView { rows }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::data::model::fixtures::order;

    const STATES: [&str; 4] = ["BA", "MG", "RJ", "SP"];
    const CATEGORIES: [&str; 3] = ["electronics", "toys", "watches_gifts"];

    fn sample() -> OrderDataset {
        OrderDataset::from_records(vec![
            order(1, "SP", Some("toys"), DeliveryStatus::OnTime, 5, -4.0, Some("2017-10")),
            order(2, "RJ", Some("toys"), DeliveryStatus::Late, 3, 2.0, Some("2017-10")),
            order(3, "SP", None, DeliveryStatus::SuperLate, 1, 9.0, Some("2017-11")),
            order(4, "MG", Some("electronics"), DeliveryStatus::SuperLate, 2, 7.0, None),
            order(5, "SP", Some("electronics"), DeliveryStatus::OnTime, 4, -1.0, Some("2017-11")),
        ])
    }

    fn set<T: Ord + Clone>(values: &[T]) -> BTreeSet<T> {
        values.iter().cloned().collect()
    }

    #[test]
    fn rows_must_match_all_three_filters() {
        let ds = sample();
        let view = apply_filters(
            &ds,
            &set(&["SP".to_string()]),
            &set(&[DeliveryStatus::OnTime, DeliveryStatus::SuperLate]),
            &set(&["toys".to_string(), "electronics".to_string()]),
        );
        let ids: Vec<&str> = view.iter().map(|r| r.order.order_id.as_str()).collect();
        assert_eq!(ids, ["order-00001", "order-00005"]);
    }

    #[test]
    fn null_category_never_passes() {
        let ds = sample();
        let view = apply_selection(&ds, &FilterSelection::everything(&ds));
        assert_eq!(view.len(), 4);
        assert!(view.iter().all(|r| r.order.product_category_en.is_some()));
    }

    #[test]
    fn is_late_flags_late_and_super_late() {
        let ds = sample();
        let view = apply_selection(&ds, &FilterSelection::everything(&ds));
        let flags: Vec<bool> = view.iter().map(|r| r.is_late).collect();
        assert_eq!(flags, [false, true, true, false]);
    }

    #[test]
    fn empty_selection_yields_empty_view() {
        let ds = sample();
        let mut selection = FilterSelection::everything(&ds);
        selection.states = set(&["AC".to_string()]);
        assert!(apply_selection(&ds, &selection).is_empty());
    }

    #[test]
    fn initial_selection_caps_categories() {
        let ds = sample();
        let selection = FilterSelection::initial(&ds, 1);
        assert_eq!(selection.categories, set(&["electronics".to_string()]));
        assert_eq!(selection.states, ds.states);
        assert_eq!(selection.statuses, ds.statuses);
    }

    fn arb_order() -> impl Strategy<Value = OrderRecord> {
        (
            0..STATES.len(),
            proptest::option::of(0..CATEGORIES.len()),
            0..3usize,
            1u8..=5,
            -30.0f64..30.0,
        )
            .prop_map(|(s, c, st, score, days)| {
                order(
                    0,
                    STATES[s],
                    c.map(|i| CATEGORIES[i]),
                    DeliveryStatus::ALL[st],
                    score,
                    days,
                    Some("2018-01"),
                )
            })
    }

    fn arb_subset<T: Ord + Clone + std::fmt::Debug + 'static>(
        values: Vec<T>,
    ) -> impl Strategy<Value = BTreeSet<T>> {
        proptest::sample::subsequence(values.clone(), 0..=values.len())
            .prop_map(|picked| picked.into_iter().collect())
    }

    proptest! {
        #[test]
        fn every_kept_row_satisfies_the_filters(
            records in proptest::collection::vec(arb_order(), 0..60),
            states in arb_subset(STATES.iter().map(|s| s.to_string()).collect()),
            statuses in arb_subset(DeliveryStatus::ALL.to_vec()),
            categories in arb_subset(CATEGORIES.iter().map(|s| s.to_string()).collect()),
        ) {
            let ds = OrderDataset::from_records(records);
            let view = apply_filters(&ds, &states, &statuses, &categories);

            let expected = ds.records.iter().filter(|o| {
                states.contains(&o.customer_state)
                    && statuses.contains(&o.delivery_status)
                    && o.product_category_en.as_ref().is_some_and(|c| categories.contains(c))
            }).count();
            prop_assert_eq!(view.len(), expected);

            for row in view.iter() {
                prop_assert!(states.contains(&row.order.customer_state));
                prop_assert!(statuses.contains(&row.order.delivery_status));
                let cat = row.order.product_category_en.as_ref().unwrap();
                prop_assert!(categories.contains(cat));
                prop_assert_eq!(
                    row.is_late,
                    matches!(row.order.delivery_status, DeliveryStatus::Late | DeliveryStatus::SuperLate)
                );
            }

            let again = apply_filters(&ds, &states, &statuses, &categories);
            prop_assert_eq!(&view, &again);
        }

        #[test]
        fn single_value_filter_makes_column_constant(
            records in proptest::collection::vec(arb_order(), 1..60),
            state_idx in 0..STATES.len(),
            status_idx in 0..3usize,
        ) {
            let ds = OrderDataset::from_records(records);
            let mut selection = FilterSelection::everything(&ds);
            selection.states = set(&[STATES[state_idx].to_string()]);
            selection.statuses = set(&[DeliveryStatus::ALL[status_idx]]);

            let view = apply_selection(&ds, &selection);
            prop_assert!(view.iter().all(|r| r.order.customer_state == STATES[state_idx]));
            prop_assert!(view.iter().all(|r| r.order.delivery_status == DeliveryStatus::ALL[status_idx]));
        }
    }
}
