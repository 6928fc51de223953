//! Ledger records and the error taxonomy shared by stores and the settlement engine.

pub mod errors;
pub mod models;

pub use errors::{Entity, LedgerError, LedgerResult};
pub use models::{
    Player, Tournament, TournamentId, TournamentMembership, TournamentOutcome, split_evenly,
};
