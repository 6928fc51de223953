//! Ledger error types.

use std::fmt;
use thiserror::Error;

/// Kind of record an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Player,
    Tournament,
    Membership,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Player => write!(f, "player"),
            Entity::Tournament => write!(f, "tournament"),
            Entity::Membership => write!(f, "tournament membership"),
        }
    }
}

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Record does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: Entity, key: String },

    /// Unique-key violation reported by storage
    #[error("{entity} already exists: {key}")]
    Conflict { entity: Entity, key: String },

    /// Participant balance does not cover the share
    #[error("Insufficient funds: {player}")]
    InsufficientFunds { player: String },

    /// Storage reported zero records affected
    #[error("Nothing was updated for {entity} {key}")]
    UpdateFailed { entity: Entity, key: String },

    /// Balance would leave the representable decimal range
    #[error("Balance out of range: {player}")]
    BalanceOutOfRange { player: String },

    /// Storage failure while touching a record
    #[error("Storage error on {entity} {key}: {source}")]
    Storage {
        entity: Entity,
        key: String,
        #[source]
        source: sqlx::Error,
    },
}

impl LedgerError {
    pub(crate) fn not_found(entity: Entity, key: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn conflict(entity: Entity, key: impl ToString) -> Self {
        LedgerError::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    /// Wraps a storage failure with the record it was touching
    pub(crate) fn storage(entity: Entity, key: impl ToString) -> impl FnOnce(sqlx::Error) -> Self {
        let key = key.to_string();
        move |source| LedgerError::Storage {
            entity,
            key,
            source,
        }
    }

    /// Maps a failed insert, turning unique violations into [`LedgerError::Conflict`].
    pub(crate) fn from_insert(err: sqlx::Error, entity: Entity, key: impl ToString) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::conflict(entity, key),
            _ => Self::storage(entity, key)(err),
        }
    }

    /// Name of the player this error implicates, if any
    pub fn player(&self) -> Option<&str> {
        match self {
            LedgerError::InsufficientFunds { player }
            | LedgerError::BalanceOutOfRange { player } => Some(player.as_str()),
            LedgerError::NotFound {
                entity: Entity::Player | Entity::Membership,
                key,
            }
            | LedgerError::UpdateFailed {
                entity: Entity::Player,
                key,
            }
            | LedgerError::Storage {
                entity: Entity::Player,
                key,
                ..
            } => Some(key.as_str()),
            _ => None,
        }
    }

    /// Get a client-safe error message that doesn't leak storage internals
    pub fn client_message(&self) -> String {
        match self {
            // Sanitize storage errors - don't expose SQL details
            LedgerError::Storage { entity, key, .. } => {
                format!("Internal storage error on {entity} {key}")
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_key() {
        let err = LedgerError::not_found(Entity::Player, "alice");
        assert_eq!(err.to_string(), "player not found: alice");

        let err = LedgerError::conflict(Entity::Tournament, 7);
        assert_eq!(err.to_string(), "tournament already exists: 7");

        let err = LedgerError::InsufficientFunds {
            player: "bob".to_string(),
        };
        assert_eq!(err.to_string(), "Insufficient funds: bob");
    }

    #[test]
    fn test_player_tag() {
        assert_eq!(
            LedgerError::not_found(Entity::Player, "carol").player(),
            Some("carol")
        );
        assert_eq!(
            LedgerError::not_found(Entity::Membership, "dave").player(),
            Some("dave")
        );
        assert_eq!(LedgerError::not_found(Entity::Tournament, 1).player(), None);

        let err = LedgerError::storage(Entity::Player, "gina")(sqlx::Error::PoolTimedOut);
        assert_eq!(err.player(), Some("gina"));
        let err = LedgerError::storage(Entity::Tournament, 4)(sqlx::Error::PoolTimedOut);
        assert_eq!(err.player(), None);

        let err = LedgerError::BalanceOutOfRange {
            player: "hal".to_string(),
        };
        assert_eq!(err.player(), Some("hal"));
    }

    #[test]
    fn test_client_message_hides_storage_details() {
        let err = LedgerError::storage(Entity::Player, "frank")(sqlx::Error::Protocol(
            "relation players does not exist".to_string(),
        ));
        assert_eq!(err.client_message(), "Internal storage error on player frank");
        assert!(err.to_string().contains("relation players"));

        let err = LedgerError::InsufficientFunds {
            player: "erin".to_string(),
        };
        assert_eq!(err.client_message(), "Insufficient funds: erin");
    }
}
