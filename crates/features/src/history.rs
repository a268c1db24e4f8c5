//! Causal per-customer history features.
//!
//! Each customer's usable orders form a timeline sorted by order time (ties
//! broken by InvoiceNo, then input position). Features for the i-th order
//! only read orders before it on the timeline. The single exception is the
//! Recency fallback for first orders, which uses the median of all defined
//! recencies across the dataset.

use returns_core::{BasketRow, BasketTable, CustomerHistory, Timestamp};
use statrs::statistics::{Data, Median};
use std::cmp::Ordering;
use tracing::{debug, info};

/// One step on a customer timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEvent {
    pub invoice_date: Timestamp,
    pub is_return: bool,
}

/// A customer's usable orders in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerTimeline<'a> {
    pub customer_id: &'a str,
    /// Row indices into the basket table, oldest first.
    pub rows: Vec<usize>,
}

/// Group usable rows into per-customer timelines.
///
/// Rows without an order time or a label are left out entirely: they neither
/// receive history features nor count as history for later orders.
pub fn customer_timelines(rows: &[BasketRow]) -> Vec<CustomerTimeline<'_>> {
    let mut order: Vec<usize> = (0..rows.len()).filter(|&i| rows[i].is_usable()).collect();
    order.sort_by(|&a, &b| timeline_cmp(&rows[a], &rows[b]));

    let mut timelines: Vec<CustomerTimeline<'_>> = Vec::new();
    for idx in order {
        let customer_id = rows[idx].order.key.customer_id.as_str();
        match timelines.last_mut() {
            Some(timeline) if timeline.customer_id == customer_id => timeline.rows.push(idx),
            _ => timelines.push(CustomerTimeline {
                customer_id,
                rows: vec![idx],
            }),
        }
    }
    timelines
}

/// Sort key: (CustomerID, InvoiceDate, InvoiceNo, first_seen).
fn timeline_cmp(a: &BasketRow, b: &BasketRow) -> Ordering {
    a.order
        .key
        .customer_id
        .cmp(&b.order.key.customer_id)
        .then_with(|| a.order.invoice_date.cmp(&b.order.invoice_date))
        .then_with(|| a.order.key.invoice_no.cmp(&b.order.key.invoice_no))
        .then_with(|| a.order.first_seen.cmp(&b.order.first_seen))
}

/// Cumulative statistics along one timeline, before imputation.
///
/// The i-th entry only depends on events `0..i`.
pub fn timeline_history(events: &[TimelineEvent]) -> Vec<CustomerHistory> {
    let mut history = Vec::with_capacity(events.len());
    let mut past_orders = 0u32;
    let mut past_returns = 0u32;
    let mut prev_date: Option<Timestamp> = None;

    for event in events {
        let return_rate = (past_orders > 0).then(|| past_returns as f64 / past_orders as f64);
        let recency_days = prev_date.map(|prev| (event.invoice_date - prev).num_days() as f64);

        history.push(CustomerHistory {
            past_orders,
            past_returns,
            return_rate,
            prev_date,
            recency_days,
            recency_imputed: false,
        });

        past_orders += 1;
        if event.is_return {
            past_returns += 1;
        }
        prev_date = Some(event.invoice_date);
    }

    history
}

/// Median of the defined values, `None` when there are none.
pub fn median(values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(Data::new(values).median())
}

/// Computes PastOrders, PastReturns, ReturnRate and Recency per order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerHistoryBuilder;

impl CustomerHistoryBuilder {
    /// Attach history features to every usable row. Row order is unchanged.
    pub fn apply(&self, mut table: BasketTable) -> BasketTable {
        let mut computed: Vec<(usize, CustomerHistory)> = Vec::with_capacity(table.len());
        let timelines = customer_timelines(&table.rows);
        let customers = timelines.len();

        for timeline in &timelines {
            let events: Vec<TimelineEvent> = timeline
                .rows
                .iter()
                .filter_map(|&idx| {
                    let order = &table.rows[idx].order;
                    Some(TimelineEvent {
                        invoice_date: order.invoice_date?,
                        is_return: order.is_return?,
                    })
                })
                .collect();

            computed.extend(timeline.rows.iter().copied().zip(timeline_history(&events)));
        }
        drop(timelines);

        let defined: Vec<f64> = computed.iter().filter_map(|(_, h)| h.recency_days).collect();
        let fallback = median(defined);

        let mut imputed = 0usize;
        for (idx, mut history) in computed {
            if history.recency_days.is_none() {
                if let Some(value) = fallback {
                    history.recency_days = Some(value);
                    history.recency_imputed = true;
                    imputed += 1;
                }
            }
            table.rows[idx].history = Some(history);
        }

        info!(
            customers,
            imputed_recency = imputed,
            recency_median = ?fallback,
            "Customer history features computed"
        );
        debug!(skipped = table.unusable_count(), "Rows without history (unusable)");
        table
    }
}
