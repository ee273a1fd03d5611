//! Session error types.
//!
//! Every session operation returns [`ServiceError`]. Transport failures keep
//! the operation and the characteristic they happened on, so a log line or
//! an event alone is enough to tell what went wrong where.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use gattlink_domain::codec::DomainValue;
use gattlink_domain::error::{DecodeError, EncodeError};
use gattlink_domain::gatt::CharacteristicId;

use crate::ports::TransportError;
use crate::sessions::ServiceKind;

/// GATT operation a session was performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Discover,
    Subscribe,
    Unsubscribe,
    Read,
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discover => "discover",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// Errors returned by sessions and the registry.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("characteristic discovery failed")]
    DiscoveryFailed(#[source] TransportError),

    #[error("mandatory characteristic {characteristic} was not discovered")]
    CharacteristicNotFound { characteristic: Uuid },

    #[error("session is not ready, call start first")]
    NotReady,

    #[error("characteristic {characteristic} is not present on this peripheral")]
    NotPresent { characteristic: Uuid },

    #[error("characteristic {characteristic} does not support {operation}")]
    NotSupported {
        characteristic: Uuid,
        operation: Operation,
    },

    #[error("discovery is already in progress")]
    DiscoveryInProgress,

    #[error("session was already started")]
    AlreadyStarted,

    #[error("a {0} session is already active")]
    AlreadyActive(ServiceKind),

    #[error("session is stopped")]
    Stopped,

    #[error("{operation} on {characteristic} failed")]
    Transport {
        operation: Operation,
        characteristic: CharacteristicId,
        #[source]
        source: TransportError,
    },

    #[error("{characteristic} decoded to an unexpected {value:?}")]
    UnexpectedValue {
        characteristic: CharacteristicId,
        value: DomainValue,
    },

    #[error("invalid command")]
    Encode(#[from] EncodeError),

    #[error("invalid payload")]
    Decode(#[from] DecodeError),
}

impl ServiceError {
    pub(crate) fn transport(
        operation: Operation,
        characteristic: CharacteristicId,
        source: TransportError,
    ) -> Self {
        Self::Transport {
            operation,
            characteristic,
            source,
        }
    }
}
