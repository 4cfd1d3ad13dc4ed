//! Tiered cost calculation
//!
//! The price of processing a batch is a pure function of its row count.
//! The figure is contractual and regulator-facing, so it must match the
//! billing backend exactly; all arithmetic is in integer cents.
//!
//! Tiers: first 1,000 rows at $1.00 each; rows 1,001-5,000 at $0.75 each;
//! rows beyond 5,000 at $0.50 each.

use lavado_common::Cents;
use serde::{Deserialize, Serialize};

/// Upper bound (inclusive) of tier 1, in rows.
pub const TIER1_LIMIT: u64 = 1_000;
/// Upper bound (inclusive) of tier 2, in rows.
pub const TIER2_LIMIT: u64 = 5_000;

/// Per-row price of tier 1.
pub const TIER1_UNIT_PRICE: Cents = Cents(100);
/// Per-row price of tier 2.
pub const TIER2_UNIT_PRICE: Cents = Cents(75);
/// Per-row price of tier 3.
pub const TIER3_UNIT_PRICE: Cents = Cents(50);

/// One row of the tier breakdown shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierLine {
    pub label: String,
    pub unit_price: Cents,
    pub unit_count: u64,
    pub subtotal: Cents,
}

/// Deterministic price for processing a batch. Recomputed whenever the row
/// count changes; never mutated in place. The total is never set directly
/// by any component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimate {
    pub transaction_count: u64,
    pub total_cost: Cents,
    /// Occupied tiers, in tier order
    pub tier_breakdown: Vec<TierLine>,
}

/// Compute the tiered price for `row_count` transactions.
pub fn estimate(row_count: u64) -> CostEstimate {
    let tier1_rows = row_count.min(TIER1_LIMIT);
    let tier2_rows = row_count.min(TIER2_LIMIT).saturating_sub(TIER1_LIMIT);
    let tier3_rows = row_count.saturating_sub(TIER2_LIMIT);

    let tiers = [
        ("First 1,000 rows", TIER1_UNIT_PRICE, tier1_rows),
        ("Rows 1,001-5,000", TIER2_UNIT_PRICE, tier2_rows),
        ("Rows beyond 5,000", TIER3_UNIT_PRICE, tier3_rows),
    ];

    let tier_breakdown: Vec<TierLine> = tiers
        .into_iter()
        .filter(|(_, _, count)| *count > 0)
        .map(|(label, unit_price, unit_count)| TierLine {
            label: label.to_string(),
            unit_price,
            unit_count,
            subtotal: Cents(unit_price.0 * unit_count as i64),
        })
        .collect();

    let total_cost = tier_breakdown.iter().map(|line| line.subtotal).sum();

    CostEstimate {
        transaction_count: row_count,
        total_cost,
        tier_breakdown,
    }
}
