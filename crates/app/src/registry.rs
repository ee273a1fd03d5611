//! Session registry: the active sessions of one connection, keyed by
//! service kind.
//!
//! The driver owns the registry and feeds it every [`ValueUpdate`] the
//! adapter produces; [`SessionRegistry::route`] hands each one to the
//! session that enabled notifications on that characteristic.

use std::collections::BTreeMap;

use crate::error::ServiceError;
use crate::ports::{Transport, ValueUpdate};
use crate::sessions::{
    BatterySession, FindMeSession, HealthThermometerSession, RgbLightSession, ServiceKind,
    SessionPhase, ThermometerSession,
};

/// Any session, tagged by service.
pub enum ActiveSession<T> {
    Battery(BatterySession<T>),
    FindMe(FindMeSession<T>),
    Thermometer(ThermometerSession<T>),
    HealthThermometer(HealthThermometerSession<T>),
    RgbLight(RgbLightSession<T>),
}

impl<T: Transport> ActiveSession<T> {
    #[must_use]
    pub fn kind(&self) -> ServiceKind {
        match self {
            Self::Battery(_) => ServiceKind::Battery,
            Self::FindMe(_) => ServiceKind::FindMe,
            Self::Thermometer(_) => ServiceKind::Thermometer,
            Self::HealthThermometer(_) => ServiceKind::HealthThermometer,
            Self::RgbLight(_) => ServiceKind::RgbLight,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Battery(s) => s.phase(),
            Self::FindMe(s) => s.phase(),
            Self::Thermometer(s) => s.phase(),
            Self::HealthThermometer(s) => s.phase(),
            Self::RgbLight(s) => s.phase(),
        }
    }

    /// # Errors
    ///
    /// Returns the session's start error.
    pub async fn start(&self) -> Result<(), ServiceError> {
        match self {
            Self::Battery(s) => s.start().await,
            Self::FindMe(s) => s.start().await,
            Self::Thermometer(s) => s.start().await,
            Self::HealthThermometer(s) => s.start().await,
            Self::RgbLight(s) => s.start().await,
        }
    }

    /// # Errors
    ///
    /// Returns the session's subscribe error.
    pub async fn subscribe(&self) -> Result<(), ServiceError> {
        match self {
            Self::Battery(s) => s.subscribe().await,
            Self::FindMe(s) => s.subscribe().await,
            Self::Thermometer(s) => s.subscribe().await,
            Self::HealthThermometer(s) => s.subscribe().await,
            Self::RgbLight(s) => s.subscribe().await,
        }
    }

    /// # Errors
    ///
    /// Returns the session's stop error.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        match self {
            Self::Battery(s) => s.stop().await,
            Self::FindMe(s) => s.stop().await,
            Self::Thermometer(s) => s.stop().await,
            Self::HealthThermometer(s) => s.stop().await,
            Self::RgbLight(s) => s.stop().await,
        }
    }

    pub fn on_value_update(&self, update: &ValueUpdate) -> bool {
        match self {
            Self::Battery(s) => s.on_value_update(update),
            Self::FindMe(s) => s.on_value_update(update),
            Self::Thermometer(s) => s.on_value_update(update),
            Self::HealthThermometer(s) => s.on_value_update(update),
            Self::RgbLight(s) => s.on_value_update(update),
        }
    }
}

impl<T> From<BatterySession<T>> for ActiveSession<T> {
    fn from(session: BatterySession<T>) -> Self {
        Self::Battery(session)
    }
}

impl<T> From<FindMeSession<T>> for ActiveSession<T> {
    fn from(session: FindMeSession<T>) -> Self {
        Self::FindMe(session)
    }
}

impl<T> From<ThermometerSession<T>> for ActiveSession<T> {
    fn from(session: ThermometerSession<T>) -> Self {
        Self::Thermometer(session)
    }
}

impl<T> From<HealthThermometerSession<T>> for ActiveSession<T> {
    fn from(session: HealthThermometerSession<T>) -> Self {
        Self::HealthThermometer(session)
    }
}

impl<T> From<RgbLightSession<T>> for ActiveSession<T> {
    fn from(session: RgbLightSession<T>) -> Self {
        Self::RgbLight(session)
    }
}

/// At most one session per [`ServiceKind`].
pub struct SessionRegistry<T> {
    sessions: BTreeMap<ServiceKind, ActiveSession<T>>,
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self {
            sessions: BTreeMap::new(),
        }
    }
}

impl<T: Transport> SessionRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::AlreadyActive`] when a session of the same
    /// kind is registered; the new session is dropped.
    pub fn insert(&mut self, session: impl Into<ActiveSession<T>>) -> Result<(), ServiceError> {
        let session = session.into();
        let kind = session.kind();
        if self.sessions.contains_key(&kind) {
            return Err(ServiceError::AlreadyActive(kind));
        }
        self.sessions.insert(kind, session);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, kind: ServiceKind) -> Option<&ActiveSession<T>> {
        self.sessions.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveSession<T>> {
        self.sessions.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[must_use]
    pub fn battery(&self) -> Option<&BatterySession<T>> {
        match self.sessions.get(&ServiceKind::Battery) {
            Some(ActiveSession::Battery(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn find_me(&self) -> Option<&FindMeSession<T>> {
        match self.sessions.get(&ServiceKind::FindMe) {
            Some(ActiveSession::FindMe(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn thermometer(&self) -> Option<&ThermometerSession<T>> {
        match self.sessions.get(&ServiceKind::Thermometer) {
            Some(ActiveSession::Thermometer(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn health_thermometer(&self) -> Option<&HealthThermometerSession<T>> {
        match self.sessions.get(&ServiceKind::HealthThermometer) {
            Some(ActiveSession::HealthThermometer(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn rgb_light(&self) -> Option<&RgbLightSession<T>> {
        match self.sessions.get(&ServiceKind::RgbLight) {
            Some(ActiveSession::RgbLight(s)) => Some(s),
            _ => None,
        }
    }

    /// Deliver `update` to the session that owns its characteristic.
    ///
    /// Returns `false` when no session accepted it.
    pub fn route(&self, update: &ValueUpdate) -> bool {
        let accepted = self
            .sessions
            .values()
            .any(|session| session.on_value_update(update));
        if !accepted {
            tracing::trace!(characteristic = %update.characteristic, "value update without owner");
        }
        accepted
    }

    /// Stop and drop the session of `kind`, if any.
    ///
    /// # Errors
    ///
    /// Returns the session's stop error; the session is dropped anyway.
    pub async fn remove(&mut self, kind: ServiceKind) -> Result<(), ServiceError> {
        match self.sessions.remove(&kind) {
            Some(session) => session.stop().await,
            None => Ok(()),
        }
    }

    /// Stop and drop every session.
    ///
    /// # Errors
    ///
    /// Returns the first stop error; every session is stopped regardless.
    pub async fn stop_all(&mut self) -> Result<(), ServiceError> {
        let mut result = Ok(());
        for (kind, session) in std::mem::take(&mut self.sessions) {
            if let Err(err) = session.stop().await {
                tracing::warn!(service = %kind, %err, "failed to stop session cleanly");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }
}
