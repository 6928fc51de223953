//! In-process repository implementations.
//!
//! These keep the same per-call atomicity as the PostgreSQL repositories (each
//! method holds one lock for its whole read-modify-write) and the same key
//! uniqueness rules. They back the test suites and embedded use of the engine.
//!
//! Each repository can be told to fail specific writes with a storage error,
//! which is how partial-failure paths of the settlement engine are exercised.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::repository::{MembershipRepository, PlayerRepository, TournamentRepository};
use crate::ledger::{
    Entity, LedgerError, LedgerResult, Player, Tournament, TournamentId, TournamentMembership,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected_failure(entity: Entity, key: impl ToString) -> LedgerError {
    let key = key.to_string();
    let source = sqlx::Error::Protocol(format!("injected failure on {entity} {key}"));
    LedgerError::Storage {
        entity,
        key,
        source,
    }
}

fn apply_delta(balance: &mut Decimal, name: &str, delta: Decimal) -> LedgerResult<Decimal> {
    *balance = balance
        .checked_add(delta)
        .ok_or_else(|| LedgerError::BalanceOutOfRange {
            player: name.to_string(),
        })?;
    Ok(*balance)
}

/// In-memory `PlayerRepository`
#[derive(Clone, Default)]
pub struct MemoryPlayerRepository {
    balances: Arc<Mutex<HashMap<String, Decimal>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MemoryPlayerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a player directly
    pub fn with_player(self, name: &str, balance: Decimal) -> Self {
        lock(&self.balances).insert(name.to_string(), balance);
        self
    }

    /// Make every balance update of `name` fail with a storage error
    pub fn fail_updates_for(&self, name: &str) {
        lock(&self.failing).insert(name.to_string());
    }

    /// Number of stored players
    pub fn len(&self) -> usize {
        lock(&self.balances).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failure(&self, name: &str) -> LedgerResult<()> {
        if lock(&self.failing).contains(name) {
            return Err(injected_failure(Entity::Player, name));
        }
        Ok(())
    }
}

#[async_trait]
impl PlayerRepository for MemoryPlayerRepository {
    async fn find(&self, name: &str) -> LedgerResult<Player> {
        lock(&self.balances)
            .get(name)
            .map(|balance| Player::new(name, *balance))
            .ok_or_else(|| LedgerError::not_found(Entity::Player, name))
    }

    async fn insert(&self, player: &Player) -> LedgerResult<()> {
        let mut balances = lock(&self.balances);
        if balances.contains_key(&player.name) {
            return Err(LedgerError::conflict(Entity::Player, &player.name));
        }
        balances.insert(player.name.clone(), player.balance);
        Ok(())
    }

    async fn increment(&self, name: &str, delta: Decimal) -> LedgerResult<Decimal> {
        self.check_failure(name)?;
        let mut balances = lock(&self.balances);
        let balance = balances
            .get_mut(name)
            .ok_or_else(|| LedgerError::not_found(Entity::Player, name))?;
        apply_delta(balance, name, delta)
    }

    async fn upsert_increment(&self, name: &str, delta: Decimal) -> LedgerResult<Decimal> {
        self.check_failure(name)?;
        let mut balances = lock(&self.balances);
        let balance = balances.entry(name.to_string()).or_insert(Decimal::ZERO);
        apply_delta(balance, name, delta)
    }

    async fn drop_all(&self) -> LedgerResult<()> {
        lock(&self.balances).clear();
        Ok(())
    }

    async fn ensure_unique_index(&self) -> LedgerResult<()> {
        Ok(())
    }
}

/// In-memory `TournamentRepository`
#[derive(Clone, Default)]
pub struct MemoryTournamentRepository {
    deposits: Arc<Mutex<HashMap<TournamentId, Decimal>>>,
    fail_removals: Arc<Mutex<bool>>,
}

impl MemoryTournamentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `remove` fail with a storage error
    pub fn fail_removals(&self) {
        *lock(&self.fail_removals) = true;
    }

    /// Number of stored tournaments
    pub fn len(&self) -> usize {
        lock(&self.deposits).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TournamentRepository for MemoryTournamentRepository {
    async fn find(&self, id: TournamentId) -> LedgerResult<Tournament> {
        lock(&self.deposits)
            .get(&id)
            .map(|deposit| Tournament {
                id,
                deposit: *deposit,
            })
            .ok_or_else(|| LedgerError::not_found(Entity::Tournament, id))
    }

    async fn insert(&self, tournament: &Tournament) -> LedgerResult<()> {
        let mut deposits = lock(&self.deposits);
        if deposits.contains_key(&tournament.id) {
            return Err(LedgerError::conflict(Entity::Tournament, tournament.id));
        }
        deposits.insert(tournament.id, tournament.deposit);
        Ok(())
    }

    async fn remove(&self, id: TournamentId) -> LedgerResult<()> {
        if *lock(&self.fail_removals) {
            return Err(injected_failure(Entity::Tournament, id));
        }
        lock(&self.deposits).remove(&id);
        Ok(())
    }

    async fn drop_all(&self) -> LedgerResult<()> {
        lock(&self.deposits).clear();
        Ok(())
    }

    async fn ensure_unique_index(&self) -> LedgerResult<()> {
        Ok(())
    }
}

/// In-memory `MembershipRepository`
///
/// Memberships are kept in insertion order so that lookups by player alone
/// return the oldest entry, as the PostgreSQL repository does.
#[derive(Clone, Default)]
pub struct MemoryMembershipRepository {
    memberships: Arc<Mutex<Vec<TournamentMembership>>>,
    fail_removals: Arc<Mutex<bool>>,
}

impl MemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `remove_all` fail with a storage error
    pub fn fail_removals(&self) {
        *lock(&self.fail_removals) = true;
    }

    /// Memberships currently recorded for a tournament
    pub fn members_of(&self, tournament_id: TournamentId) -> Vec<TournamentMembership> {
        lock(&self.memberships)
            .iter()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect()
    }

    /// Number of stored memberships
    pub fn len(&self) -> usize {
        lock(&self.memberships).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MembershipRepository for MemoryMembershipRepository {
    async fn insert(&self, membership: &TournamentMembership) -> LedgerResult<()> {
        let mut memberships = lock(&self.memberships);
        let duplicate = memberships.iter().any(|m| {
            m.tournament_id == membership.tournament_id && m.player == membership.player
        });
        if duplicate {
            return Err(LedgerError::conflict(
                Entity::Membership,
                format!("{}/{}", membership.tournament_id, membership.player),
            ));
        }
        memberships.push(membership.clone());
        Ok(())
    }

    async fn find_by_player(&self, player: &str) -> LedgerResult<TournamentMembership> {
        lock(&self.memberships)
            .iter()
            .find(|m| m.player == player)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(Entity::Membership, player))
    }

    async fn find(
        &self,
        tournament_id: TournamentId,
        player: &str,
    ) -> LedgerResult<TournamentMembership> {
        lock(&self.memberships)
            .iter()
            .find(|m| m.tournament_id == tournament_id && m.player == player)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(Entity::Membership, player))
    }

    async fn remove_all(&self, tournament_id: TournamentId) -> LedgerResult<u64> {
        if *lock(&self.fail_removals) {
            return Err(injected_failure(Entity::Membership, tournament_id));
        }
        let mut memberships = lock(&self.memberships);
        let before = memberships.len();
        memberships.retain(|m| m.tournament_id != tournament_id);
        Ok((before - memberships.len()) as u64)
    }

    async fn drop_all(&self) -> LedgerResult<()> {
        lock(&self.memberships).clear();
        Ok(())
    }

    async fn ensure_unique_index(&self) -> LedgerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_increment_requires_existing_player() {
        let repo = MemoryPlayerRepository::new();
        let err = repo.increment("ghost", dec!(10)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound {
                entity: Entity::Player,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_upsert_increment_creates_player() {
        let repo = MemoryPlayerRepository::new();
        assert_eq!(repo.upsert_increment("new", dec!(15)).await.unwrap(), dec!(15));
        assert_eq!(repo.upsert_increment("new", dec!(5)).await.unwrap(), dec!(20));
        assert_eq!(repo.find("new").await.unwrap().balance, dec!(20));
    }

    #[tokio::test]
    async fn test_duplicate_player_conflicts() {
        let repo = MemoryPlayerRepository::new().with_player("P0", dec!(1000));
        let err = repo.insert(&Player::new("P0", dec!(1))).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_injected_update_failure() {
        let repo = MemoryPlayerRepository::new().with_player("flaky", dec!(100));
        repo.fail_updates_for("flaky");
        let err = repo.increment("flaky", dec!(-1)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Storage {
                entity: Entity::Player,
                ..
            }
        ));
        assert_eq!(err.player(), Some("flaky"));
        // Reads keep working
        assert_eq!(repo.find("flaky").await.unwrap().balance, dec!(100));
    }

    #[tokio::test]
    async fn test_overflowing_delta_leaves_balance_untouched() {
        let repo = MemoryPlayerRepository::new().with_player("rich", Decimal::MAX);
        let err = repo.increment("rich", dec!(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::BalanceOutOfRange { .. }));
        assert_eq!(repo.find("rich").await.unwrap().balance, Decimal::MAX);

        let err = repo.upsert_increment("rich", Decimal::MAX).await.unwrap_err();
        assert_eq!(err.player(), Some("rich"));
        assert_eq!(repo.find("rich").await.unwrap().balance, Decimal::MAX);

        let repo = MemoryPlayerRepository::new().with_player("broke", Decimal::MIN);
        let err = repo.increment("broke", dec!(-1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::BalanceOutOfRange { .. }));
        assert_eq!(repo.find("broke").await.unwrap().balance, Decimal::MIN);
    }

    #[tokio::test]
    async fn test_tournament_remove_is_idempotent() {
        let repo = MemoryTournamentRepository::new();
        repo.insert(&Tournament {
            id: 3,
            deposit: dec!(50),
        })
        .await
        .unwrap();
        repo.remove(3).await.unwrap();
        repo.remove(3).await.unwrap();
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_membership_unique_per_tournament_and_player() {
        let repo = MemoryMembershipRepository::new();
        let membership = TournamentMembership {
            tournament_id: 1,
            player: "A".to_string(),
            backers: vec![],
        };
        repo.insert(&membership).await.unwrap();
        assert!(matches!(
            repo.insert(&membership).await.unwrap_err(),
            LedgerError::Conflict { .. }
        ));

        // Same player, other tournament is fine
        repo.insert(&TournamentMembership {
            tournament_id: 2,
            ..membership.clone()
        })
        .await
        .unwrap();
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn test_find_by_player_returns_oldest_membership() {
        let repo = MemoryMembershipRepository::new();
        for tournament_id in [5, 2] {
            repo.insert(&TournamentMembership {
                tournament_id,
                player: "A".to_string(),
                backers: vec![],
            })
            .await
            .unwrap();
        }
        assert_eq!(repo.find_by_player("A").await.unwrap().tournament_id, 5);
        assert_eq!(repo.find(2, "A").await.unwrap().tournament_id, 2);
    }

    #[tokio::test]
    async fn test_remove_all_counts_removed() {
        let repo = MemoryMembershipRepository::new();
        for player in ["A", "B"] {
            repo.insert(&TournamentMembership {
                tournament_id: 9,
                player: player.to_string(),
                backers: vec![],
            })
            .await
            .unwrap();
        }
        assert_eq!(repo.remove_all(9).await.unwrap(), 2);
        assert_eq!(repo.remove_all(9).await.unwrap(), 0);
    }
}
