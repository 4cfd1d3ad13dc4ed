//! Affordability guard
//!
//! Pure comparison of the computed cost against the account balance.
//! Re-evaluated whenever either value changes (e.g. after the balance is
//! refreshed following a completed analysis).

use lavado_common::Cents;

/// Outcome of comparing a cost estimate against the current balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffordabilityCheck {
    pub affordable: bool,
    /// `max(0, cost - balance)`, for user messaging
    pub shortfall: Cents,
}

/// `cost <= balance`, with the shortfall for messaging when it is not.
pub fn check_affordability(cost: Cents, balance: Cents) -> AffordabilityCheck {
    AffordabilityCheck {
        affordable: cost <= balance,
        shortfall: cost.saturating_deficit(balance),
    }
}
