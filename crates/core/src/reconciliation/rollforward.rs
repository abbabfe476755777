//! Roll-forward evaluation against a single snapshot.

use monthend_shared::types::SourceSystem;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::DiscrepancyStatus;
use crate::policy::RollForwardRule;
use crate::records::{MetricName, PortfolioId, PortfolioSnapshot};

/// Outcome of one roll-forward rule for one portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollForwardResult {
    /// Rule name.
    pub name: String,
    /// The portfolio.
    pub portfolio: PortfolioId,
    /// Source of the snapshot.
    pub source: SourceSystem,
    /// Beginning balance used.
    pub beginning: Decimal,
    /// Sum of addition metrics.
    pub additions: Decimal,
    /// Sum of subtraction metrics.
    pub subtractions: Decimal,
    /// Beginning + additions - subtractions.
    pub calculated_ending: Decimal,
    /// Ending balance as reported.
    pub reported_ending: Option<Decimal>,
    /// Reported minus calculated.
    pub difference: Option<Decimal>,
    /// Matched within the rule's tolerance, flagged beyond it, unmatched
    /// without a reported ending.
    pub status: DiscrepancyStatus,
}

/// Evaluates `rule` against `snapshot`.
///
/// Component metrics missing from the snapshot count as zero.
#[must_use]
pub fn evaluate(rule: &RollForwardRule, snapshot: &PortfolioSnapshot) -> RollForwardResult {
    let value = |metric: &MetricName| snapshot.get(metric).unwrap_or(Decimal::ZERO);

    let beginning = rule.beginning.as_ref().map_or(Decimal::ZERO, value);
    let additions: Decimal = rule.additions.iter().map(value).sum();
    let subtractions: Decimal = rule.subtractions.iter().map(value).sum();
    let calculated_ending = beginning + additions - subtractions;

    let reported_ending = snapshot.get(&rule.ending);
    let difference = reported_ending.map(|reported| reported - calculated_ending);
    let status = match difference {
        None => DiscrepancyStatus::Unmatched,
        Some(diff) if diff.abs() <= rule.tolerance => DiscrepancyStatus::Matched,
        Some(_) => DiscrepancyStatus::Flagged,
    };

    RollForwardResult {
        name: rule.name.clone(),
        portfolio: snapshot.portfolio.clone(),
        source: snapshot.source,
        beginning,
        additions,
        subtractions,
        calculated_ending,
        reported_ending,
        difference,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monthend_shared::types::AccountingPeriod;
    use rust_decimal_macros::dec;

    fn rule() -> RollForwardRule {
        RollForwardRule {
            name: "allowance_for_credit_losses".to_string(),
            source: SourceSystem::LedgerActuals,
            beginning: Some(MetricName::from("allowance_beginning")),
            additions: vec![MetricName::from("provision"), MetricName::from("recoveries")],
            subtractions: vec![MetricName::from("charge_off_total")],
            ending: MetricName::from("allowance_ending"),
            tolerance: dec!(0.01),
        }
    }

    fn snapshot(values: &[(&str, Decimal)]) -> PortfolioSnapshot {
        let mut snapshot = PortfolioSnapshot::new(
            PortfolioId::from("P1"),
            SourceSystem::LedgerActuals,
            AccountingPeriod::new(2026, 1).unwrap(),
        );
        for (metric, amount) in values {
            snapshot.values.insert(MetricName::from(*metric), *amount);
        }
        snapshot
    }

    #[test]
    fn test_roll_forward_matches() {
        let snap = snapshot(&[
            ("allowance_beginning", dec!(1000.00)),
            ("provision", dec!(250.00)),
            ("recoveries", dec!(10.00)),
            ("charge_off_total", dec!(300.00)),
            ("allowance_ending", dec!(960.01)),
        ]);
        let result = evaluate(&rule(), &snap);
        assert_eq!(result.calculated_ending, dec!(960.00));
        assert_eq!(result.difference, Some(dec!(0.01)));
        assert_eq!(result.status, DiscrepancyStatus::Matched);
    }

    #[test]
    fn test_roll_forward_flags_break() {
        let snap = snapshot(&[
            ("allowance_beginning", dec!(1000.00)),
            ("charge_off_total", dec!(300.00)),
            ("allowance_ending", dec!(800.00)),
        ]);
        let result = evaluate(&rule(), &snap);
        assert_eq!(result.calculated_ending, dec!(700.00));
        assert_eq!(result.difference, Some(dec!(100.00)));
        assert_eq!(result.status, DiscrepancyStatus::Flagged);
    }

    #[test]
    fn test_roll_forward_without_ending_is_unmatched() {
        let snap = snapshot(&[("allowance_beginning", dec!(1000.00))]);
        let result = evaluate(&rule(), &snap);
        assert_eq!(result.reported_ending, None);
        assert_eq!(result.status, DiscrepancyStatus::Unmatched);
    }
}
