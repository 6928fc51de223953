//! Property-based tests for deposit and prize splitting.
//!
//! Decimal division is exact to 28 significant digits, so an uneven split can
//! leave a residue far below any meaningful amount. The properties below check
//! that shares add back up to the split amount within that residue.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tourney_ledger::ledger::split_evenly;
use tourney_ledger::{EngineConfig, SettlementEngine, TournamentOutcome};

/// Largest rounding residue tolerated when shares are summed back up
fn residue() -> Decimal {
    Decimal::new(1, 15)
}

// Amounts between 0.01 and 1,000,000.00 with cent precision
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=100_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    #[test]
    fn split_shares_add_up_to_amount(amount in amount_strategy(), backers in 0usize..20) {
        let share = split_evenly(amount, backers);
        let total = share * Decimal::from(backers + 1);
        prop_assert!((total - amount).abs() <= residue(), "{amount} split {} ways summed to {total}", backers + 1);
    }

    #[test]
    fn split_is_exact_when_divisible(units in 1i64..1_000_000, backers in 0usize..20) {
        let holders = Decimal::from(backers + 1);
        let amount = Decimal::from(units) * holders;
        prop_assert_eq!(split_evenly(amount, backers), Decimal::from(units));
    }

    #[test]
    fn split_never_exceeds_amount(amount in amount_strategy(), backers in 0usize..20) {
        let share = split_evenly(amount, backers);
        prop_assert!(share > Decimal::ZERO);
        prop_assert!(share <= amount);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn join_debits_deposit_and_resolve_credits_prize(
        deposit in amount_strategy(),
        prize in amount_strategy(),
        backer_count in 0usize..6,
    ) {
        let start = dec!(10000000);
        let backers: Vec<String> = (0..backer_count).map(|i| format!("backer{i}")).collect();
        let mut everyone = vec!["player".to_string()];
        everyone.extend(backers.iter().cloned());

        let (after_join, after_resolve) = block_on(async {
            let engine = SettlementEngine::in_memory(EngineConfig::default());
            for name in &everyone {
                engine.fund(name, start).await.unwrap();
            }
            engine.announce_tournament(1, deposit).await.unwrap();
            engine.join_tournament("player", 1, &backers).await.unwrap();

            let mut after_join = Vec::new();
            for name in &everyone {
                after_join.push(engine.balance(name).await.unwrap());
            }

            engine
                .resolve_tournament(1, &[TournamentOutcome::new("player", prize)])
                .await
                .unwrap();

            let mut after_resolve = Vec::new();
            for name in &everyone {
                after_resolve.push(engine.balance(name).await.unwrap());
            }
            (after_join, after_resolve)
        });

        let holders = Decimal::from(everyone.len());
        let debited: Decimal = after_join.iter().map(|b| start - b).sum();
        prop_assert!((debited - deposit).abs() <= residue());

        let credited: Decimal = after_resolve
            .iter()
            .zip(&after_join)
            .map(|(after, before)| after - before)
            .sum();
        prop_assert!((credited - prize).abs() <= residue());

        // Every stake holder is charged and paid the same amount
        for (joined, resolved) in after_join.iter().zip(&after_resolve) {
            prop_assert_eq!(*joined, after_join[0]);
            prop_assert!(((*resolved - *joined) - prize / holders).abs() <= residue());
        }
    }
}
