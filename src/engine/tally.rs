//! Running totals over order outcomes.
//!
//! `Tally` is a commutative monoid: `Tally::default()` is the identity and
//! `+` is associative, so per-driver totals can be reduced in any grouping.

use rust_decimal::Decimal;
use std::iter::Sum;
use std::ops::Add;

use super::rules::{DeliveryStatus, OrderOutcome};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub profit: Decimal,
    pub bonus: Decimal,
    pub penalties: Decimal,
    pub fuel_cost: Decimal,
    pub on_time: u32,
    pub late: u32,
}

impl Tally {
    /// Totals contributed by a single outcome.
    pub fn of(outcome: &OrderOutcome) -> Self {
        match outcome {
            OrderOutcome::Delivered(d) => {
                let (on_time, late) = match d.status {
                    DeliveryStatus::OnTime => (1, 0),
                    DeliveryStatus::Late => (0, 1),
                };
                Self {
                    profit: d.profit,
                    bonus: d.bonus,
                    penalties: d.penalty,
                    fuel_cost: d.fuel_cost,
                    on_time,
                    late,
                }
            }
            OrderOutcome::SkippedOverCapacity { fuel_cost, .. } => Self {
                fuel_cost: *fuel_cost,
                ..Self::default()
            },
            OrderOutcome::SkippedMissingRoute { .. } => Self::default(),
        }
    }

    pub fn deliveries(&self) -> u32 {
        self.on_time.saturating_add(self.late)
    }

    /// On-time share as a percentage, 0 when nothing was delivered.
    pub fn efficiency_score(&self) -> f64 {
        let total = self.deliveries();
        if total == 0 {
            0.0
        } else {
            f64::from(self.on_time) / f64::from(total) * 100.0
        }
    }
}

impl Add for Tally {
    type Output = Tally;

    fn add(self, rhs: Tally) -> Tally {
        Tally {
            profit: self.profit.saturating_add(rhs.profit),
            bonus: self.bonus.saturating_add(rhs.bonus),
            penalties: self.penalties.saturating_add(rhs.penalties),
            fuel_cost: self.fuel_cost.saturating_add(rhs.fuel_cost),
            on_time: self.on_time.saturating_add(rhs.on_time),
            late: self.late.saturating_add(rhs.late),
        }
    }
}

impl Sum for Tally {
    fn sum<I: Iterator<Item = Tally>>(iter: I) -> Tally {
        iter.fold(Tally::default(), |acc, t| acc + t)
    }
}

impl<'a> Sum<&'a OrderOutcome> for Tally {
    fn sum<I: Iterator<Item = &'a OrderOutcome>>(iter: I) -> Tally {
        iter.map(Tally::of).sum()
    }
}
