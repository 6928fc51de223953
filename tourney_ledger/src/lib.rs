//! # Tourney Ledger
//!
//! Player balances and backed tournament entry, with settlement of prizes
//! through the same backer shares.
//!
//! A player joins a tournament either alone or backed by other players, who
//! split the deposit evenly with them. When the tournament resolves, every
//! prize is split the same way between the winner and their backers.
//!
//! Storage gives per-record atomicity only. Join and resolve are multi-step
//! sequences over separate records and are not transactional: a failure
//! midway returns an error with earlier steps still applied, and the engine
//! logs what was applied.
//!
//! ## Core Modules
//!
//! - [`ledger`]: Records (player, tournament, membership) and the error taxonomy
//! - [`db`]: Connection pooling and the player/tournament/membership repositories
//! - [`settlement`]: The settlement engine and its configuration
//!
//! ## Example
//!
//! ```
//! use tourney_ledger::{EngineConfig, SettlementEngine};
//! use rust_decimal::Decimal;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tourney_ledger::LedgerError> {
//! let engine = SettlementEngine::in_memory(EngineConfig::default());
//! engine.fund("alice", Decimal::from(250)).await?;
//! engine.take("alice", Decimal::from(300)).await?;
//! assert_eq!(engine.balance("alice").await?, Decimal::from(-50));
//! # Ok(())
//! # }
//! ```

/// Database pool and repositories.
pub mod db;

/// Ledger records and errors.
pub mod ledger;

/// Settlement engine.
pub mod settlement;

pub use ledger::{
    Entity, LedgerError, LedgerResult, Player, Tournament, TournamentId, TournamentMembership,
    TournamentOutcome,
};
pub use settlement::{CleanupPolicy, EngineConfig, JoinGuard, MembershipLookup, SettlementEngine};
