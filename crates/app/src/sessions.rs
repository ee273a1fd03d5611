//! Service sessions: one per supported GATT service.
//!
//! A session owns the discovered characteristics of its service, the
//! service's typed state, and the lifecycle that guards both. All sessions
//! share the machinery in [`session_core`]; the per-service modules only
//! describe which characteristics matter and how decoded values land in the
//! state.
//!
//! ```text
//! Idle ──start──▶ Discovering ──ok──▶ Ready ──subscribe──▶ Subscribed
//!                      │                 │                     │
//!                      └──fail──▶ Stopped ◀──────stop──────────┘
//! ```

use std::fmt;

use serde::{Serialize, Serializer};

use gattlink_domain::codec::DomainValue;
use gattlink_domain::error::DecodeError;
use gattlink_domain::gatt::CharacteristicId;

use crate::ports::TransportError;

pub mod battery_session;
pub mod find_me_session;
pub mod health_thermometer_session;
pub mod rgb_session;
pub mod session_core;
pub mod thermometer_session;

pub use battery_session::BatterySession;
pub use find_me_session::FindMeSession;
pub use health_thermometer_session::HealthThermometerSession;
pub use rgb_session::RgbLightSession;
pub use thermometer_session::ThermometerSession;

/// Supported GATT services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Battery,
    FindMe,
    Thermometer,
    HealthThermometer,
    RgbLight,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Battery => "battery",
            Self::FindMe => "find me",
            Self::Thermometer => "thermometer",
            Self::HealthThermometer => "health thermometer",
            Self::RgbLight => "RGB light",
        })
    }
}

/// Observable lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Discovering,
    Ready,
    /// Ready with at least one characteristic notifying.
    Subscribed,
    Stopped,
}

/// Emitted by sessions whenever their state changes or an update is dropped.
///
/// Events are never emitted after the emitting session has stopped.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A value was decoded and merged into the session state.
    Updated {
        service: ServiceKind,
        characteristic: CharacteristicId,
        value: DomainValue,
    },
    /// A payload could not be decoded; the previous value was kept.
    DecodeFailed {
        service: ServiceKind,
        characteristic: CharacteristicId,
        #[serde(serialize_with = "serialize_display")]
        error: DecodeError,
    },
    /// The transport reported a failure for a subscribed characteristic.
    UpdateFailed {
        service: ServiceKind,
        characteristic: CharacteristicId,
        #[serde(serialize_with = "serialize_display")]
        error: TransportError,
    },
}

impl SessionEvent {
    #[must_use]
    pub const fn service(&self) -> ServiceKind {
        match self {
            Self::Updated { service, .. }
            | Self::DecodeFailed { service, .. }
            | Self::UpdateFailed { service, .. } => *service,
        }
    }
}

fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
