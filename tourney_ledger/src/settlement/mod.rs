//! Settlement engine module.
//!
//! This module implements:
//! - Tournament announcement
//! - Backed tournament entry (deposit split between a player and their backers)
//! - Prize distribution through the recorded backer shares
//! - Balance query, forced debit and funding primitives
//! - Administrative reset with optional seeding
//!
//! ## Example
//!
//! ```
//! use tourney_ledger::settlement::{EngineConfig, SettlementEngine};
//! use tourney_ledger::ledger::TournamentOutcome;
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SettlementEngine::in_memory(EngineConfig::default());
//!     engine.reset(true).await?;
//!
//!     engine.announce_tournament(1, Decimal::from(300)).await?;
//!     engine
//!         .join_tournament("P0", 1, &["P1".to_string(), "P2".to_string()])
//!         .await?;
//!     assert_eq!(engine.balance("P1").await?, Decimal::from(900));
//!
//!     engine
//!         .resolve_tournament(1, &[TournamentOutcome::new("P0", Decimal::from(90))])
//!         .await?;
//!     assert_eq!(engine.balance("P1").await?, Decimal::from(930));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod guard;

pub use config::{CleanupPolicy, EngineConfig, JoinGuard, MembershipLookup, UnknownOption};
pub use engine::SettlementEngine;
pub use guard::{PlayerLocks, PlayerLocksGuard};
