//! Derived presentation metrics.
//!
//! Pure functions of the latest snapshot, recomputed on every render.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Position, WalletDetail};

/// Default number of chart buckets.
pub const MAX_BUCKETS: usize = 5;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PerformanceMetrics {
    pub position_count: usize,
    pub win_count: usize,
    /// Percentage of positions with positive unrealized P&L.
    pub win_rate: Decimal,
    /// Total P&L as a percentage of total value.
    pub avg_return: Decimal,
    pub best_trade: Decimal,
    pub worst_trade: Decimal,
}

/// Compute metrics over a set of positions against the given totals.
pub fn performance<'a, I>(positions: I, total_value: Decimal, total_pnl: Decimal) -> PerformanceMetrics
where
    I: IntoIterator<Item = &'a Position>,
{
    let mut position_count = 0usize;
    let mut win_count = 0usize;
    let mut best: Option<Decimal> = None;
    let mut worst: Option<Decimal> = None;

    for p in positions {
        position_count += 1;
        if p.is_winning() {
            win_count += 1;
        }
        best = Some(best.map_or(p.unrealized_pnl, |b| b.max(p.unrealized_pnl)));
        worst = Some(worst.map_or(p.unrealized_pnl, |w| w.min(p.unrealized_pnl)));
    }

    let win_rate = percentage(Decimal::from(win_count), Decimal::from(position_count));
    let avg_return = percentage(total_pnl, total_value);

    PerformanceMetrics {
        position_count,
        win_count,
        win_rate,
        avg_return,
        best_trade: best.unwrap_or(Decimal::ZERO),
        worst_trade: worst.unwrap_or(Decimal::ZERO),
    }
}

/// Metrics for a tracked wallet's detail snapshot.
pub fn wallet_performance(detail: &WalletDetail) -> PerformanceMetrics {
    performance(detail.all_positions(), detail.total_value, detail.total_pnl)
}

/// Metrics for the trading account, where totals are summed from the positions.
pub fn account_performance(positions: &[Position]) -> PerformanceMetrics {
    let total_value = sum_or_zero(positions.iter().map(|p| p.current_value));
    let total_pnl = sum_or_zero(positions.iter().map(|p| p.unrealized_pnl));
    performance(positions, total_value, total_pnl)
}

/// `part / whole * 100`, or zero when `whole` is zero or the result does not
/// fit in a `Decimal`.
fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

/// Sum of `values`, or zero if it overflows.
fn sum_or_zero(mut values: impl Iterator<Item = Decimal>) -> Decimal {
    values
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
        .unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Chart series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartBucket {
    pub name: String,
    pub value: Decimal,
}

/// Largest positions by absolute current value.
pub fn value_distribution<'a, I>(positions: I, limit: usize) -> Vec<ChartBucket>
where
    I: IntoIterator<Item = &'a Position>,
{
    let buckets = positions
        .into_iter()
        .map(|p| ChartBucket {
            name: bucket_name(p),
            value: p.current_value.abs(),
        })
        .collect();
    top_by_magnitude(buckets, limit)
}

/// Signed unrealized P&L per position, largest magnitude first.
pub fn pnl_series<'a, I>(positions: I, limit: usize) -> Vec<ChartBucket>
where
    I: IntoIterator<Item = &'a Position>,
{
    let buckets = positions
        .into_iter()
        .map(|p| ChartBucket {
            name: bucket_name(p),
            value: p.unrealized_pnl,
        })
        .collect();
    top_by_magnitude(buckets, limit)
}

/// Total absolute value held on each side.
pub fn buy_sell_comparison(detail: &WalletDetail) -> [ChartBucket; 2] {
    let side_total = |positions: &[Position]| -> Decimal {
        sum_or_zero(positions.iter().map(|p| p.current_value.abs()))
    };
    [
        ChartBucket {
            name: "Buying".into(),
            value: side_total(&detail.buying_positions),
        },
        ChartBucket {
            name: "Selling".into(),
            value: side_total(&detail.selling_positions),
        },
    ]
}

fn bucket_name(p: &Position) -> String {
    let market = if p.market.is_empty() { "Unknown market" } else { p.market.as_str() };
    if p.outcome.is_empty() {
        market.to_string()
    } else {
        format!("{market} ({})", p.outcome)
    }
}

fn top_by_magnitude(mut buckets: Vec<ChartBucket>, limit: usize) -> Vec<ChartBucket> {
    // Stable sort keeps server order among equal magnitudes.
    buckets.sort_by(|a, b| b.value.abs().cmp(&a.value.abs()));
    buckets.truncate(limit);
    buckets
}
