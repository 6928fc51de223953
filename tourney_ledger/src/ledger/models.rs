//! Ledger data models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tournament ID type
pub type TournamentId = i64;

/// Player with a cash balance, keyed by unique name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub balance: Decimal,
}

impl Player {
    pub fn new(name: impl Into<String>, balance: Decimal) -> Self {
        Self {
            name: name.into(),
            balance,
        }
    }
}

/// Announced tournament and its entry deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub deposit: Decimal,
}

/// A player's entry into a tournament together with the players backing it
///
/// Backer order is kept for display only; payouts do not depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentMembership {
    pub tournament_id: TournamentId,
    pub player: String,
    pub backers: Vec<String>,
}

impl TournamentMembership {
    /// Number of people sharing the entry (the player plus every backer)
    pub fn stake_holders(&self) -> usize {
        self.backers.len() + 1
    }
}

/// Prize awarded to a winner when a tournament resolves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentOutcome {
    pub winner: String,
    pub prize: Decimal,
}

impl TournamentOutcome {
    pub fn new(winner: impl Into<String>, prize: Decimal) -> Self {
        Self {
            winner: winner.into(),
            prize,
        }
    }
}

/// Splits `amount` evenly between a player and `backers` co-funders.
///
/// Uses exact decimal division; with no backers the player carries the whole amount.
pub fn split_evenly(amount: Decimal, backers: usize) -> Decimal {
    amount / Decimal::from(backers + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_without_backers_is_whole_amount() {
        assert_eq!(split_evenly(dec!(300), 0), dec!(300));
    }

    #[test]
    fn test_split_between_backers() {
        assert_eq!(split_evenly(dec!(300), 2), dec!(100));
        assert_eq!(split_evenly(dec!(90), 2), dec!(30));
        assert_eq!(split_evenly(dec!(25), 3), dec!(6.25));
    }

    #[test]
    fn test_stake_holders_counts_player() {
        let membership = TournamentMembership {
            tournament_id: 1,
            player: "A".to_string(),
            backers: vec!["B".to_string(), "C".to_string()],
        };
        assert_eq!(membership.stake_holders(), 3);
    }

    #[test]
    fn test_membership_serialization_keeps_backer_order() {
        let membership = TournamentMembership {
            tournament_id: 4,
            player: "A".to_string(),
            backers: vec!["C".to_string(), "B".to_string()],
        };

        let json = serde_json::to_string(&membership).unwrap();
        let restored: TournamentMembership = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.backers, vec!["C", "B"]);
        assert_eq!(restored, membership);
    }
}
