//! Settlement engine: tournament entry, prize distribution and balance primitives.
//!
//! Every store call is atomic on its own, but join and resolve are sequences of
//! such calls with no transaction around them. A failure midway returns the
//! error and leaves the steps already applied in place; the applied steps are
//! logged so the ledger can be reconciled by hand.

use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::iter;
use std::sync::Arc;

use super::config::{CleanupPolicy, EngineConfig, JoinGuard, MembershipLookup};
use super::guard::PlayerLocks;
use crate::db::{
    MembershipRepository, MemoryMembershipRepository, MemoryPlayerRepository,
    MemoryTournamentRepository, PgMembershipRepository, PgPlayerRepository,
    PgTournamentRepository, PlayerRepository, TournamentRepository,
};
use crate::ledger::{
    LedgerError, LedgerResult, Player, Tournament, TournamentId, TournamentMembership,
    TournamentOutcome, split_evenly,
};

/// Settlement engine
#[derive(Clone)]
pub struct SettlementEngine {
    players: Arc<dyn PlayerRepository>,
    tournaments: Arc<dyn TournamentRepository>,
    memberships: Arc<dyn MembershipRepository>,
    locks: PlayerLocks,
    config: EngineConfig,
}

impl SettlementEngine {
    /// Create an engine over explicit repositories
    pub fn new(
        players: Arc<dyn PlayerRepository>,
        tournaments: Arc<dyn TournamentRepository>,
        memberships: Arc<dyn MembershipRepository>,
        config: EngineConfig,
    ) -> Self {
        Self {
            players,
            tournaments,
            memberships,
            locks: PlayerLocks::new(),
            config,
        }
    }

    /// Create an engine backed by PostgreSQL
    pub fn postgres(pool: PgPool, config: EngineConfig) -> Self {
        Self::new(
            Arc::new(PgPlayerRepository::new(pool.clone())),
            Arc::new(PgTournamentRepository::new(pool.clone())),
            Arc::new(PgMembershipRepository::new(pool)),
            config,
        )
    }

    /// Create an engine backed by fresh in-memory repositories
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(MemoryPlayerRepository::new()),
            Arc::new(MemoryTournamentRepository::new()),
            Arc::new(MemoryMembershipRepository::new()),
            config,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create missing storage and the uniqueness constraints of all three stores
    pub async fn ensure_schema(&self) -> LedgerResult<()> {
        self.players.ensure_unique_index().await?;
        self.memberships.ensure_unique_index().await?;
        self.tournaments.ensure_unique_index().await?;
        Ok(())
    }

    /// Announce a tournament with its entry deposit
    ///
    /// # Errors
    ///
    /// * `LedgerError::Conflict` - A tournament with this ID already exists
    pub async fn announce_tournament(
        &self,
        tournament_id: TournamentId,
        deposit: Decimal,
    ) -> LedgerResult<()> {
        self.tournaments
            .insert(&Tournament {
                id: tournament_id,
                deposit,
            })
            .await?;
        info!("Announced tournament {tournament_id} with deposit {deposit}");
        Ok(())
    }

    /// Enter `player` into a tournament, splitting the deposit with `backers`
    ///
    /// The deposit is divided evenly between the player and each backer. All
    /// participants are checked before anyone is charged; a balance equal to
    /// the share counts as insufficient.
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - Tournament or a participant does not exist
    /// * `LedgerError::InsufficientFunds` - A participant cannot cover the share
    /// * `LedgerError::Conflict` - The player already joined this tournament
    ///
    /// A storage failure while charging leaves earlier charges applied.
    pub async fn join_tournament(
        &self,
        player: &str,
        tournament_id: TournamentId,
        backers: &[String],
    ) -> LedgerResult<()> {
        let tournament = self.tournaments.find(tournament_id).await?;
        let share = split_evenly(tournament.deposit, backers.len());
        let participants: Vec<&str> = iter::once(player)
            .chain(backers.iter().map(String::as_str))
            .collect();

        let _guard = match self.config.join_guard {
            JoinGuard::PerPlayer => Some(self.locks.acquire(participants.iter().copied()).await),
            JoinGuard::Unguarded => None,
        };

        for name in &participants {
            let participant = self.players.find(name).await?;
            if participant.balance <= share {
                debug!(
                    "Join of {player} to tournament {tournament_id} refused: {name} has {} for share {share}",
                    participant.balance
                );
                return Err(LedgerError::InsufficientFunds {
                    player: (*name).to_string(),
                });
            }
        }

        let mut charged: Vec<&str> = Vec::with_capacity(participants.len());
        for name in &participants {
            if let Err(e) = self.players.increment(name, -share).await {
                if !charged.is_empty() {
                    error!(
                        "Join of {player} to tournament {tournament_id} stopped at {name}: {e}; \
                         already charged {share} each: {charged:?}"
                    );
                }
                return Err(e);
            }
            charged.push(*name);
        }

        let membership = TournamentMembership {
            tournament_id,
            player: player.to_string(),
            backers: backers.to_vec(),
        };
        if let Err(e) = self.memberships.insert(&membership).await {
            error!(
                "Membership of {player} in tournament {tournament_id} not recorded: {e}; \
                 already charged {share} each: {charged:?}"
            );
            return Err(e);
        }

        info!(
            "{player} joined tournament {tournament_id} with {} backer(s), share {share}",
            backers.len()
        );
        Ok(())
    }

    /// Pay out tournament results and clear the tournament
    ///
    /// Each prize is split evenly between the winner and the backers recorded
    /// at join time. Once every result is paid, the tournament and its
    /// memberships are removed according to the cleanup policy.
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - Tournament, a winner's membership, or a
    ///   credited player does not exist
    ///
    /// The first failure aborts the payout; earlier credits stay applied and the
    /// tournament is left in place.
    pub async fn resolve_tournament(
        &self,
        tournament_id: TournamentId,
        results: &[TournamentOutcome],
    ) -> LedgerResult<()> {
        self.tournaments.find(tournament_id).await?;

        for (paid, outcome) in results.iter().enumerate() {
            let membership = match self.config.membership_lookup {
                MembershipLookup::ByPlayer => {
                    self.memberships.find_by_player(&outcome.winner).await
                }
                MembershipLookup::ByTournament => {
                    self.memberships.find(tournament_id, &outcome.winner).await
                }
            };

            let result = match membership {
                Ok(membership) => self.pay_out(&membership, outcome.prize).await,
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                if paid > 0 {
                    error!(
                        "Resolve of tournament {tournament_id} stopped at result {} ({}): {e}; \
                         {paid} earlier result(s) already paid",
                        paid + 1,
                        outcome.winner
                    );
                }
                return Err(e);
            }
        }

        self.purge_tournament(tournament_id).await?;
        info!(
            "Resolved tournament {tournament_id} with {} result(s)",
            results.len()
        );
        Ok(())
    }

    /// Credit one prize through a membership: backers first, then the player
    async fn pay_out(&self, membership: &TournamentMembership, prize: Decimal) -> LedgerResult<()> {
        let bonus = split_evenly(prize, membership.backers.len());

        let recipients = membership
            .backers
            .iter()
            .chain(iter::once(&membership.player));
        for (credited, name) in recipients.enumerate() {
            if let Err(e) = self.players.increment(name, bonus).await {
                if credited > 0 {
                    error!(
                        "Payout to {} in tournament {} stopped at {name}: {e}; \
                         {credited} recipient(s) already credited {bonus}",
                        membership.player, membership.tournament_id
                    );
                }
                return Err(e);
            }
        }

        debug!(
            "Paid {prize} through {} in tournament {}: {bonus} to each of {} holder(s)",
            membership.player,
            membership.tournament_id,
            membership.stake_holders()
        );
        Ok(())
    }

    /// Remove a resolved tournament and its memberships
    async fn purge_tournament(&self, tournament_id: TournamentId) -> LedgerResult<()> {
        let memberships = self.memberships.remove_all(tournament_id).await.map(|_| ());
        let tournament = self.tournaments.remove(tournament_id).await;

        for (what, result) in [("memberships", memberships), ("tournament", tournament)] {
            if let Err(e) = result {
                match self.config.cleanup_policy {
                    CleanupPolicy::Warn => {
                        warn!("Cleanup of {what} for tournament {tournament_id} failed: {e}")
                    }
                    CleanupPolicy::Strict => return Err(e),
                }
            }
        }
        Ok(())
    }

    /// Current balance of a player
    pub async fn balance(&self, player: &str) -> LedgerResult<Decimal> {
        Ok(self.players.find(player).await?.balance)
    }

    /// Debit a player unconditionally
    ///
    /// This is a forced debit: there is no funds check and the balance may go
    /// negative. Returns the new balance.
    pub async fn take(&self, player: &str, amount: Decimal) -> LedgerResult<Decimal> {
        let balance = self.players.increment(player, -amount).await?;
        debug!("Took {amount} from {player}, balance now {balance}");
        Ok(balance)
    }

    /// Credit a player, creating them if absent. Returns the new balance.
    pub async fn fund(&self, player: &str, amount: Decimal) -> LedgerResult<Decimal> {
        let balance = self.players.upsert_increment(player, amount).await?;
        debug!("Funded {player} with {amount}, balance now {balance}");
        Ok(balance)
    }

    /// Drop all players, tournaments and memberships and recreate the stores
    ///
    /// When `seed` is set, the configured default players are created. This is
    /// an administrative operation for fixtures and test environments; it is
    /// not part of settlement.
    pub async fn reset(&self, seed: bool) -> LedgerResult<()> {
        warn!("Resetting ledger (seed: {seed})");

        self.players.drop_all().await?;
        self.tournaments.drop_all().await?;
        self.memberships.drop_all().await?;
        self.ensure_schema().await?;

        if seed {
            for name in self.config.seed_names() {
                self.players
                    .insert(&Player::new(name, self.config.seed_balance))
                    .await?;
            }
            info!(
                "Seeded {} player(s) with balance {}",
                self.config.seed_players, self.config.seed_balance
            );
        }
        Ok(())
    }
}
