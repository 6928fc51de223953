//! Settlement engine configuration.

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::db::config::parse_env_or;

/// Number of players created by a seeding reset
pub const DEFAULT_SEED_PLAYERS: usize = 5;

/// Balance given to each seeded player
pub const DEFAULT_SEED_BALANCE: i64 = 1000;

/// Name prefix of seeded players (`P0`, `P1`, ...)
pub const DEFAULT_SEED_PREFIX: &str = "P";

/// Error returned when a configuration value names no known option
#[derive(Debug, Error)]
#[error("Unknown {setting} option: {value}")]
pub struct UnknownOption {
    pub setting: &'static str,
    pub value: String,
}

/// How concurrent joins touching the same player are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinGuard {
    /// Funds checks and deductions of concurrent joins may interleave
    #[default]
    Unguarded,
    /// Every participant is locked for the whole check-then-deduct sequence
    PerPlayer,
}

impl FromStr for JoinGuard {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "unguarded" => Ok(JoinGuard::Unguarded),
            "per_player" | "player" => Ok(JoinGuard::PerPlayer),
            _ => Err(UnknownOption {
                setting: "join guard",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for JoinGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinGuard::Unguarded => write!(f, "none"),
            JoinGuard::PerPlayer => write!(f, "per_player"),
        }
    }
}

/// How resolve finds the membership of a winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MembershipLookup {
    /// First membership of the winner in any tournament
    #[default]
    ByPlayer,
    /// Membership of the winner in the tournament being resolved
    ByTournament,
}

impl FromStr for MembershipLookup {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "player" => Ok(MembershipLookup::ByPlayer),
            "tournament" => Ok(MembershipLookup::ByTournament),
            _ => Err(UnknownOption {
                setting: "membership lookup",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MembershipLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipLookup::ByPlayer => write!(f, "player"),
            MembershipLookup::ByTournament => write!(f, "tournament"),
        }
    }
}

/// What happens when purging a resolved tournament fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Log a warning and report success
    #[default]
    Warn,
    /// Return the first cleanup failure
    Strict,
}

impl FromStr for CleanupPolicy {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warn" => Ok(CleanupPolicy::Warn),
            "strict" => Ok(CleanupPolicy::Strict),
            _ => Err(UnknownOption {
                setting: "cleanup policy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupPolicy::Warn => write!(f, "warn"),
            CleanupPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Settlement engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Serialization of concurrent joins
    pub join_guard: JoinGuard,
    /// Membership lookup used by resolve
    pub membership_lookup: MembershipLookup,
    /// Handling of cleanup failures after resolve
    pub cleanup_policy: CleanupPolicy,
    /// Players created by a seeding reset
    pub seed_players: usize,
    /// Starting balance of seeded players
    pub seed_balance: Decimal,
    /// Name prefix of seeded players
    pub seed_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            join_guard: JoinGuard::default(),
            membership_lookup: MembershipLookup::default(),
            cleanup_policy: CleanupPolicy::default(),
            seed_players: DEFAULT_SEED_PLAYERS,
            seed_balance: Decimal::from(DEFAULT_SEED_BALANCE),
            seed_prefix: DEFAULT_SEED_PREFIX.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `LEDGER_JOIN_GUARD`: `none` or `per_player` (default: none)
    /// - `LEDGER_MEMBERSHIP_LOOKUP`: `player` or `tournament` (default: player)
    /// - `LEDGER_CLEANUP_POLICY`: `warn` or `strict` (default: warn)
    /// - `LEDGER_SEED_PLAYERS`: players created by reset (default: 5)
    /// - `LEDGER_SEED_BALANCE`: balance of seeded players (default: 1000)
    /// - `LEDGER_SEED_PREFIX`: seeded player name prefix (default: P)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            join_guard: parse_env_or("LEDGER_JOIN_GUARD", defaults.join_guard),
            membership_lookup: parse_env_or("LEDGER_MEMBERSHIP_LOOKUP", defaults.membership_lookup),
            cleanup_policy: parse_env_or("LEDGER_CLEANUP_POLICY", defaults.cleanup_policy),
            seed_players: parse_env_or("LEDGER_SEED_PLAYERS", defaults.seed_players),
            seed_balance: parse_env_or("LEDGER_SEED_BALANCE", defaults.seed_balance),
            seed_prefix: parse_env_or("LEDGER_SEED_PREFIX", defaults.seed_prefix),
        }
    }

    pub fn with_join_guard(mut self, join_guard: JoinGuard) -> Self {
        self.join_guard = join_guard;
        self
    }

    pub fn with_membership_lookup(mut self, membership_lookup: MembershipLookup) -> Self {
        self.membership_lookup = membership_lookup;
        self
    }

    pub fn with_cleanup_policy(mut self, cleanup_policy: CleanupPolicy) -> Self {
        self.cleanup_policy = cleanup_policy;
        self
    }

    /// Names of the players a seeding reset creates
    pub fn seed_names(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.seed_players).map(|i| format!("{}{}", self.seed_prefix, i))
    }
}
