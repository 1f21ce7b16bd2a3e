//! Overage decision

/// Whether a notice with `current_cost` against `budget` warrants mitigation.
///
/// The budget is an inclusive ceiling: spending exactly the budget is fine.
pub fn should_mitigate(current_cost: f64, budget: f64) -> bool {
    current_cost > budget
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_over_budget() {
        assert!(should_mitigate(150.0, 100.0));
        assert!(should_mitigate(0.01, 0.0));
    }

    #[test]
    fn test_under_budget() {
        assert!(!should_mitigate(50.0, 100.0));
        assert!(!should_mitigate(0.0, 0.0));
    }

    #[test]
    fn test_equal_is_not_overage() {
        assert!(!should_mitigate(100.0, 100.0));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_mitigates_within_budget(budget in 0.0f64..1e9, frac in 0.0f64..=1.0) {
                prop_assert!(!should_mitigate(budget * frac, budget));
            }

            #[test]
            fn always_mitigates_over_budget(budget in 0.0f64..1e9, excess in 1e-3f64..1e9) {
                prop_assert!(should_mitigate(budget + excess, budget));
            }

            #[test]
            fn equality_never_mitigates(amount in 0.0f64..1e12) {
                prop_assert!(!should_mitigate(amount, amount));
            }
        }
    }
}
