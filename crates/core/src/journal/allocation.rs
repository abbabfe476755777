//! Weighted allocation using the Largest Remainder Method.
//!
//! Splits an amount across lines so the parts sum exactly to the total:
//! 1. Calculate exact shares
//! 2. Truncate each share to the precision
//! 3. Distribute the leftover units to the largest fractional parts

use monthend_shared::types::Precision;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

/// Allocation utility for split journal lines.
pub struct AllocationUtil;

impl AllocationUtil {
    /// Allocates `total` proportionally to `weights`.
    ///
    /// Ties in the fractional remainder go to the earlier line, so the result
    /// is deterministic.
    ///
    /// # Arguments
    ///
    /// * `total` - Amount to allocate, already at `precision`
    /// * `weights` - Positive relative weights
    /// * `precision` - Precision of each allocated part
    ///
    /// # Returns
    ///
    /// One part per weight, summing exactly to `total`. Empty when there are
    /// no weights or they sum to zero.
    #[must_use]
    pub fn allocate_by_weights(total: Decimal, weights: &[Decimal], precision: Precision) -> Vec<Decimal> {
        let weight_sum: Decimal = weights.iter().copied().sum();
        if weights.is_empty() || weight_sum <= Decimal::ZERO {
            return vec![];
        }

        let digits = precision.digits();
        let unit = precision.unit();

        let exact: Vec<Decimal> = weights.iter().map(|w| total * *w / weight_sum).collect();

        let mut rounded: Vec<Decimal> = exact
            .iter()
            .map(|a| a.round_dp_with_strategy(digits, RoundingStrategy::ToZero))
            .collect();

        let sum_rounded: Decimal = rounded.iter().copied().sum();
        let remainder = total - sum_rounded;

        let units_to_distribute = (remainder / unit)
            .round_dp_with_strategy(0, RoundingStrategy::ToZero)
            .to_usize()
            .unwrap_or(0);

        if units_to_distribute > 0 {
            let mut remainders: Vec<(usize, Decimal)> = exact
                .iter()
                .zip(rounded.iter())
                .enumerate()
                .map(|(i, (e, r))| (i, *e - *r))
                .collect();

            // Stable sort keeps earlier lines first among equal remainders
            remainders.sort_by(|a, b| b.1.cmp(&a.1));

            for (idx, _) in remainders.iter().take(units_to_distribute) {
                rounded[*idx] += unit;
            }
        }

        for part in &mut rounded {
            part.rescale(digits);
        }
        rounded
    }
}
