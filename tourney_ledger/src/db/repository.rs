//! Repository trait definitions and their PostgreSQL implementations.
//!
//! Each repository owns one record type. Every method is a single storage
//! statement, so each call is atomic on its own; nothing here spans records.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use crate::ledger::{
    Entity, LedgerError, LedgerResult, Player, Tournament, TournamentId, TournamentMembership,
};

/// Trait for player balance storage
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Find a player by name
    async fn find(&self, name: &str) -> LedgerResult<Player>;

    /// Insert a new player, failing with `Conflict` if the name is taken
    async fn insert(&self, player: &Player) -> LedgerResult<()>;

    /// Add `delta` to an existing player's balance and return the new balance
    async fn increment(&self, name: &str, delta: Decimal) -> LedgerResult<Decimal>;

    /// Add `delta` to a player's balance, creating the player when absent
    async fn upsert_increment(&self, name: &str, delta: Decimal) -> LedgerResult<Decimal>;

    /// Remove every player and the backing storage
    async fn drop_all(&self) -> LedgerResult<()>;

    /// Create storage if needed and enforce unique player names
    async fn ensure_unique_index(&self) -> LedgerResult<()>;
}

/// Trait for tournament storage
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// Find a tournament by its numeric ID
    async fn find(&self, id: TournamentId) -> LedgerResult<Tournament>;

    /// Insert a tournament, failing with `Conflict` if the ID is taken
    async fn insert(&self, tournament: &Tournament) -> LedgerResult<()>;

    /// Remove a tournament; removing an absent tournament is not an error
    async fn remove(&self, id: TournamentId) -> LedgerResult<()>;

    /// Remove every tournament and the backing storage
    async fn drop_all(&self) -> LedgerResult<()>;

    /// Create storage if needed and enforce unique tournament IDs
    async fn ensure_unique_index(&self) -> LedgerResult<()>;
}

/// Trait for tournament membership storage
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert a membership, failing with `Conflict` if the player already joined
    async fn insert(&self, membership: &TournamentMembership) -> LedgerResult<()>;

    /// Find the first membership recorded for `player`, in any tournament
    async fn find_by_player(&self, player: &str) -> LedgerResult<TournamentMembership>;

    /// Find the membership of `player` in one tournament
    async fn find(
        &self,
        tournament_id: TournamentId,
        player: &str,
    ) -> LedgerResult<TournamentMembership>;

    /// Remove all memberships of a tournament, returning how many were removed
    async fn remove_all(&self, tournament_id: TournamentId) -> LedgerResult<u64>;

    /// Remove every membership and the backing storage
    async fn drop_all(&self) -> LedgerResult<()>;

    /// Create storage if needed and enforce one membership per (tournament, player)
    async fn ensure_unique_index(&self) -> LedgerResult<()>;
}

/// Largest balance magnitude `Decimal` can hold, enforced by the players table
const BALANCE_LIMIT: &str = "79228162514264337593543950335";

/// Reads the balance column without panicking on values `Decimal` cannot hold
fn balance_column(row: &sqlx::postgres::PgRow, name: &str) -> LedgerResult<Decimal> {
    row.try_get("balance")
        .map_err(LedgerError::storage(Entity::Player, name))
}

/// Maps a failed balance update, turning the range check into `BalanceOutOfRange`
fn numeric_failure(err: sqlx::Error, name: &str) -> LedgerError {
    match &err {
        sqlx::Error::Database(db) if db.is_check_violation() => LedgerError::BalanceOutOfRange {
            player: name.to_string(),
        },
        _ => LedgerError::storage(Entity::Player, name)(err),
    }
}

/// PostgreSQL implementation of `PlayerRepository`
pub struct PgPlayerRepository {
    pool: PgPool,
}

impl PgPlayerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlayerRepository for PgPlayerRepository {
    async fn find(&self, name: &str) -> LedgerResult<Player> {
        let row = sqlx::query("SELECT name, balance FROM players WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(LedgerError::storage(Entity::Player, name))?
            .ok_or_else(|| LedgerError::not_found(Entity::Player, name))?;

        Ok(Player {
            name: row.get("name"),
            balance: balance_column(&row, name)?,
        })
    }

    async fn insert(&self, player: &Player) -> LedgerResult<()> {
        sqlx::query("INSERT INTO players (name, balance) VALUES ($1, $2)")
            .bind(&player.name)
            .bind(player.balance)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::from_insert(e, Entity::Player, &player.name))?;
        Ok(())
    }

    async fn increment(&self, name: &str, delta: Decimal) -> LedgerResult<Decimal> {
        let row = sqlx::query(
            "UPDATE players SET balance = balance + $1 WHERE name = $2 RETURNING balance",
        )
        .bind(delta)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| numeric_failure(e, name))?
        .ok_or_else(|| LedgerError::not_found(Entity::Player, name))?;

        balance_column(&row, name)
    }

    async fn upsert_increment(&self, name: &str, delta: Decimal) -> LedgerResult<Decimal> {
        let row = sqlx::query(
            "INSERT INTO players (name, balance)
             VALUES ($1, $2)
             ON CONFLICT (name)
             DO UPDATE SET balance = players.balance + EXCLUDED.balance
             RETURNING balance",
        )
        .bind(name)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| numeric_failure(e, name))?
        .ok_or_else(|| LedgerError::UpdateFailed {
            entity: Entity::Player,
            key: name.to_string(),
        })?;

        balance_column(&row, name)
    }

    async fn drop_all(&self) -> LedgerResult<()> {
        sqlx::query("DROP TABLE IF EXISTS players")
            .execute(&self.pool)
            .await
            .map_err(LedgerError::storage(Entity::Player, "players"))?;
        Ok(())
    }

    async fn ensure_unique_index(&self) -> LedgerResult<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS players (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                balance NUMERIC NOT NULL DEFAULT 0 CHECK (abs(balance) <= {BALANCE_LIMIT})
            )"
        ))
        .execute(&self.pool)
        .await
        .map_err(LedgerError::storage(Entity::Player, "players"))?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS players_name_key ON players (name)")
            .execute(&self.pool)
            .await
            .map_err(LedgerError::storage(Entity::Player, "players"))?;
        Ok(())
    }
}

/// PostgreSQL implementation of `TournamentRepository`
pub struct PgTournamentRepository {
    pool: PgPool,
}

impl PgTournamentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TournamentRepository for PgTournamentRepository {
    async fn find(&self, id: TournamentId) -> LedgerResult<Tournament> {
        let row =
            sqlx::query("SELECT numerical_id, deposit FROM tournaments WHERE numerical_id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(LedgerError::storage(Entity::Tournament, id))?
                .ok_or_else(|| LedgerError::not_found(Entity::Tournament, id))?;

        Ok(Tournament {
            id: row.get("numerical_id"),
            deposit: row.get("deposit"),
        })
    }

    async fn insert(&self, tournament: &Tournament) -> LedgerResult<()> {
        sqlx::query("INSERT INTO tournaments (numerical_id, deposit) VALUES ($1, $2)")
            .bind(tournament.id)
            .bind(tournament.deposit)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::from_insert(e, Entity::Tournament, tournament.id))?;
        Ok(())
    }

    async fn remove(&self, id: TournamentId) -> LedgerResult<()> {
        sqlx::query("DELETE FROM tournaments WHERE numerical_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(LedgerError::storage(Entity::Tournament, id))?;
        Ok(())
    }

    async fn drop_all(&self) -> LedgerResult<()> {
        sqlx::query("DROP TABLE IF EXISTS tournaments")
            .execute(&self.pool)
            .await
            .map_err(LedgerError::storage(Entity::Tournament, "tournaments"))?;
        Ok(())
    }

    async fn ensure_unique_index(&self) -> LedgerResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tournaments (
                id BIGSERIAL PRIMARY KEY,
                numerical_id BIGINT NOT NULL,
                deposit NUMERIC NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(LedgerError::storage(Entity::Tournament, "tournaments"))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS tournaments_numerical_id_key
             ON tournaments (numerical_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(LedgerError::storage(Entity::Tournament, "tournaments"))?;
        Ok(())
    }
}

/// PostgreSQL implementation of `MembershipRepository`
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn membership_from_row(row: &sqlx::postgres::PgRow) -> TournamentMembership {
    TournamentMembership {
        tournament_id: row.get("tournament_id"),
        player: row.get("player"),
        backers: row.get("backers"),
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn insert(&self, membership: &TournamentMembership) -> LedgerResult<()> {
        sqlx::query(
            "INSERT INTO tournament_members (tournament_id, player, backers) VALUES ($1, $2, $3)",
        )
        .bind(membership.tournament_id)
        .bind(&membership.player)
        .bind(membership.backers.as_slice())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            LedgerError::from_insert(
                e,
                Entity::Membership,
                format!("{}/{}", membership.tournament_id, membership.player),
            )
        })?;
        Ok(())
    }

    async fn find_by_player(&self, player: &str) -> LedgerResult<TournamentMembership> {
        let row = sqlx::query(
            "SELECT tournament_id, player, backers
             FROM tournament_members
             WHERE player = $1
             ORDER BY id
             LIMIT 1",
        )
        .bind(player)
        .fetch_optional(&self.pool)
        .await
        .map_err(LedgerError::storage(Entity::Membership, player))?
        .ok_or_else(|| LedgerError::not_found(Entity::Membership, player))?;

        Ok(membership_from_row(&row))
    }

    async fn find(
        &self,
        tournament_id: TournamentId,
        player: &str,
    ) -> LedgerResult<TournamentMembership> {
        let row = sqlx::query(
            "SELECT tournament_id, player, backers
             FROM tournament_members
             WHERE tournament_id = $1 AND player = $2",
        )
        .bind(tournament_id)
        .bind(player)
        .fetch_optional(&self.pool)
        .await
        .map_err(LedgerError::storage(Entity::Membership, player))?
        .ok_or_else(|| LedgerError::not_found(Entity::Membership, player))?;

        Ok(membership_from_row(&row))
    }

    async fn remove_all(&self, tournament_id: TournamentId) -> LedgerResult<u64> {
        let result = sqlx::query("DELETE FROM tournament_members WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&self.pool)
            .await
            .map_err(LedgerError::storage(Entity::Membership, tournament_id))?;
        Ok(result.rows_affected())
    }

    async fn drop_all(&self) -> LedgerResult<()> {
        sqlx::query("DROP TABLE IF EXISTS tournament_members")
            .execute(&self.pool)
            .await
            .map_err(LedgerError::storage(Entity::Membership, "tournament_members"))?;
        Ok(())
    }

    async fn ensure_unique_index(&self) -> LedgerResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tournament_members (
                id BIGSERIAL PRIMARY KEY,
                tournament_id BIGINT NOT NULL,
                player TEXT NOT NULL,
                backers TEXT[] NOT NULL DEFAULT '{}'
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(LedgerError::storage(Entity::Membership, "tournament_members"))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS tournament_members_tournament_player_key
             ON tournament_members (tournament_id, player)",
        )
        .execute(&self.pool)
        .await
        .map_err(LedgerError::storage(Entity::Membership, "tournament_members"))?;
        Ok(())
    }
}
