//! Property-based tests for the period state machine.

use proptest::prelude::*;

use crate::close::machine::CloseTransitions;
use crate::close::types::CloseStatus;

/// Strategy for generating random CloseStatus values.
fn arb_status() -> impl Strategy<Value = CloseStatus> {
    prop_oneof![
        Just(CloseStatus::Open),
        Just(CloseStatus::Parsing),
        Just(CloseStatus::Reconciling),
        Just(CloseStatus::AwaitingReview),
        Just(CloseStatus::Generating),
        Just(CloseStatus::Posted),
        Just(CloseStatus::Closed),
        Just(CloseStatus::Failed),
    ]
}

fn rank(status: CloseStatus) -> u8 {
    match status {
        CloseStatus::Open => 0,
        CloseStatus::Parsing => 1,
        CloseStatus::Reconciling => 2,
        CloseStatus::AwaitingReview => 3,
        CloseStatus::Generating => 4,
        CloseStatus::Posted => 5,
        CloseStatus::Closed => 6,
        CloseStatus::Failed => 7,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Closed is terminal: nothing leaves it.
    #[test]
    fn prop_closed_is_terminal(to in arb_status()) {
        prop_assert!(!CloseTransitions::is_valid_transition(CloseStatus::Closed, to));
    }

    /// Failed is reachable from every non-terminal, non-failed status.
    #[test]
    fn prop_failed_reachable(from in arb_status()) {
        let expected = !matches!(from, CloseStatus::Closed | CloseStatus::Failed);
        prop_assert_eq!(
            CloseTransitions::is_valid_transition(from, CloseStatus::Failed),
            expected
        );
    }

    /// Apart from Failed and the restart, every transition moves forward.
    #[test]
    fn prop_transitions_move_forward(from in arb_status(), to in arb_status()) {
        if CloseTransitions::is_valid_transition(from, to)
            && to != CloseStatus::Failed
            && from != CloseStatus::Failed
        {
            prop_assert!(rank(to) > rank(from));
        }
    }

    /// No status transitions to itself.
    #[test]
    fn prop_no_self_transitions(status in arb_status()) {
        prop_assert!(!CloseTransitions::is_valid_transition(status, status));
    }
}
