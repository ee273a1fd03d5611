//! Lifecycle, characteristic bookkeeping and update handling shared by every
//! session.
//!
//! Mutable session data lives behind one `std::sync::Mutex` that is never
//! held across an `.await`. Every asynchronous operation checks the phase
//! again once its transport call completes, so a completion that arrives
//! after [`SessionCore::stop`] is discarded instead of touching the state.
//!
//! Operations on the same characteristic are serialized through a
//! per-characteristic `tokio::sync::Mutex` gate; operations on different
//! characteristics run concurrently.
//!
//! [`SessionCore::stop`] takes a gate only when it is free. A read or write
//! still waiting on the transport keeps its gate, and stop disables
//! notifications on that characteristic without waiting for it. The late
//! completion then resolves to [`ServiceError::Stopped`].

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use gattlink_domain::codec::{self, CharacteristicKind, DomainValue};
use gattlink_domain::error::DecodeError;
use gattlink_domain::gatt::{self, CharacteristicHandle, CharacteristicId};

use super::{ServiceKind, SessionEvent, SessionPhase};
use crate::error::{Operation, ServiceError};
use crate::ports::{Transport, TransportError, ValueUpdate};

/// What a characteristic is used for inside its session.
///
/// The Alert Level characteristic appears under two services, so the role
/// (not the characteristic UUID) decides where a decoded value lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacteristicRole {
    BatteryLevel,
    TxPowerLevel,
    LinkLossAlertLevel,
    ImmediateAlertLevel,
    RgbColor,
    TemperatureReading,
    TemperatureSensorType,
    TemperatureScanInterval,
    HealthTemperatureMeasurement,
    HealthTemperatureType,
}

impl CharacteristicRole {
    /// UUID of the service the characteristic belongs to.
    #[must_use]
    pub const fn service(self) -> Uuid {
        match self {
            Self::BatteryLevel => gatt::BATTERY_SERVICE,
            Self::TxPowerLevel => gatt::TX_POWER_SERVICE,
            Self::LinkLossAlertLevel => gatt::LINK_LOSS_SERVICE,
            Self::ImmediateAlertLevel => gatt::IMMEDIATE_ALERT_SERVICE,
            Self::RgbColor => gatt::RGB_SERVICE,
            Self::TemperatureReading
            | Self::TemperatureSensorType
            | Self::TemperatureScanInterval => gatt::THERMOMETER_SERVICE,
            Self::HealthTemperatureMeasurement | Self::HealthTemperatureType => {
                gatt::HEALTH_THERMOMETER_SERVICE
            }
        }
    }

    /// Payload layout of the characteristic.
    #[must_use]
    pub const fn kind(self) -> CharacteristicKind {
        match self {
            Self::BatteryLevel => CharacteristicKind::BatteryLevel,
            Self::TxPowerLevel => CharacteristicKind::TxPowerLevel,
            Self::LinkLossAlertLevel | Self::ImmediateAlertLevel => CharacteristicKind::AlertLevel,
            Self::RgbColor => CharacteristicKind::RgbColor,
            Self::TemperatureReading => CharacteristicKind::TemperatureReading,
            Self::TemperatureSensorType => CharacteristicKind::TemperatureSensorType,
            Self::TemperatureScanInterval => CharacteristicKind::TemperatureScanInterval,
            Self::HealthTemperatureMeasurement => CharacteristicKind::HealthTemperatureMeasurement,
            Self::HealthTemperatureType => CharacteristicKind::HealthTemperatureType,
        }
    }

    /// UUID of the characteristic itself.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        self.kind().uuid()
    }

    fn matches(self, id: &CharacteristicId) -> bool {
        id.service.uuid == self.service() && id.uuid == self.uuid()
    }
}

/// A discovered characteristic bound to its role.
#[derive(Debug)]
pub struct BoundCharacteristic {
    pub role: CharacteristicRole,
    pub handle: CharacteristicHandle,
    gate: tokio::sync::Mutex<()>,
}

impl BoundCharacteristic {
    #[must_use]
    pub fn id(&self) -> CharacteristicId {
        self.handle.id
    }
}

/// Characteristics discovered by one session, in discovery order.
///
/// Immutable once discovery completes; sessions share it through an `Arc`.
#[derive(Debug, Default)]
pub struct CharacteristicMap {
    entries: Vec<BoundCharacteristic>,
}

impl CharacteristicMap {
    fn insert(&mut self, role: CharacteristicRole, handle: CharacteristicHandle) {
        if self.find(&handle.id).is_some() {
            return;
        }
        self.entries.push(BoundCharacteristic {
            role,
            handle,
            gate: tokio::sync::Mutex::new(()),
        });
    }

    /// First instance discovered for `role`.
    #[must_use]
    pub fn first(&self, role: CharacteristicRole) -> Option<&BoundCharacteristic> {
        self.entries.iter().find(|bound| bound.role == role)
    }

    /// Every instance discovered for `role`.
    pub fn all(&self, role: CharacteristicRole) -> impl Iterator<Item = &BoundCharacteristic> {
        self.entries.iter().filter(move |bound| bound.role == role)
    }

    #[must_use]
    pub fn contains(&self, role: CharacteristicRole) -> bool {
        self.first(role).is_some()
    }

    /// Look up a characteristic by identity.
    #[must_use]
    pub fn find(&self, id: &CharacteristicId) -> Option<&BoundCharacteristic> {
        self.entries.iter().find(|bound| bound.handle.id == *id)
    }

    /// First instance for a mandatory `role`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::CharacteristicNotFound`] when nothing was
    /// discovered for `role`.
    pub fn require(&self, role: CharacteristicRole) -> Result<&BoundCharacteristic, ServiceError> {
        self.first(role)
            .ok_or(ServiceError::CharacteristicNotFound {
                characteristic: role.uuid(),
            })
    }

    /// First instance for an optional `role`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotPresent`] when the peripheral does not
    /// expose the characteristic.
    pub fn optional(&self, role: CharacteristicRole) -> Result<&BoundCharacteristic, ServiceError> {
        self.first(role).ok_or(ServiceError::NotPresent {
            characteristic: role.uuid(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Typed state a session keeps for its service.
pub trait SessionState: Clone + Default + Send + 'static {
    /// Called once, when discovery succeeds.
    fn discovered(&mut self, _characteristics: &CharacteristicMap) {}

    /// Merge a decoded value.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the value violates an invariant of the
    /// state; the state must be left unchanged in that case.
    fn apply(
        &mut self,
        role: CharacteristicRole,
        characteristic: &CharacteristicId,
        value: &DomainValue,
    ) -> Result<(), DecodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Discovering,
    Ready,
    Stopped,
}

struct Inner<S> {
    phase: Phase,
    characteristics: Option<Arc<CharacteristicMap>>,
    notifying: BTreeSet<CharacteristicId>,
    state: S,
}

/// The lifecycle and state machine every session delegates to.
pub struct SessionCore<T, S> {
    kind: ServiceKind,
    transport: Arc<T>,
    events: mpsc::UnboundedSender<SessionEvent>,
    inner: Mutex<Inner<S>>,
}

impl<T: Transport, S: SessionState> SessionCore<T, S> {
    pub fn new(
        kind: ServiceKind,
        transport: Arc<T>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            kind,
            transport,
            events,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                characteristics: None,
                notifying: BTreeSet::new(),
                state: S::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        let inner = self.lock();
        match inner.phase {
            Phase::Idle => SessionPhase::Idle,
            Phase::Discovering => SessionPhase::Discovering,
            Phase::Ready if inner.notifying.is_empty() => SessionPhase::Ready,
            Phase::Ready => SessionPhase::Subscribed,
            Phase::Stopped => SessionPhase::Stopped,
        }
    }

    /// Snapshot of the typed state.
    #[must_use]
    pub fn state(&self) -> S {
        self.lock().state.clone()
    }

    /// Characteristics bound during discovery.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotReady`] before discovery has completed and
    /// [`ServiceError::Stopped`] once the session is stopped.
    pub fn characteristics(&self) -> Result<Arc<CharacteristicMap>, ServiceError> {
        let inner = self.lock();
        match inner.phase {
            Phase::Idle | Phase::Discovering => Err(ServiceError::NotReady),
            Phase::Stopped => Err(ServiceError::Stopped),
            Phase::Ready => inner
                .characteristics
                .clone()
                .ok_or(ServiceError::NotReady),
        }
    }

    fn ensure_ready(&self) -> Result<(), ServiceError> {
        match self.lock().phase {
            Phase::Ready => Ok(()),
            Phase::Stopped => Err(ServiceError::Stopped),
            Phase::Idle | Phase::Discovering => Err(ServiceError::NotReady),
        }
    }

    /// Discover `roles` and bind whatever the peripheral exposes.
    ///
    /// `validate` decides whether the discovered set is usable (mandatory
    /// characteristics present). A failed discovery or validation leaves the
    /// session stopped.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::DiscoveryInProgress`], [`ServiceError::AlreadyStarted`]
    /// or [`ServiceError::Stopped`] when called in the wrong phase, the
    /// transport failure wrapped in [`ServiceError::DiscoveryFailed`], or the
    /// error returned by `validate`.
    pub async fn start<F>(&self, roles: &[CharacteristicRole], validate: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&CharacteristicMap) -> Result<(), ServiceError> + Send,
    {
        {
            let mut inner = self.lock();
            match inner.phase {
                Phase::Idle => inner.phase = Phase::Discovering,
                Phase::Discovering => return Err(ServiceError::DiscoveryInProgress),
                Phase::Ready => return Err(ServiceError::AlreadyStarted),
                Phase::Stopped => return Err(ServiceError::Stopped),
            }
        }

        let outcome = match self.discover(roles).await {
            Ok(map) => validate(&map).map(|()| map),
            Err(err) => Err(err),
        };

        let mut inner = self.lock();
        if inner.phase != Phase::Discovering {
            tracing::debug!(service = %self.kind, "discovery finished after stop, result dropped");
            return Err(ServiceError::Stopped);
        }
        match outcome {
            Ok(map) => {
                inner.state.discovered(&map);
                tracing::info!(
                    service = %self.kind,
                    characteristics = map.len(),
                    "session ready"
                );
                inner.characteristics = Some(Arc::new(map));
                inner.phase = Phase::Ready;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(service = %self.kind, %err, "session failed to start");
                inner.phase = Phase::Stopped;
                Err(err)
            }
        }
    }

    async fn discover(&self, roles: &[CharacteristicRole]) -> Result<CharacteristicMap, ServiceError> {
        let mut services: Vec<Uuid> = Vec::new();
        for role in roles {
            if !services.contains(&role.service()) {
                services.push(role.service());
            }
        }

        let mut map = CharacteristicMap::default();
        for service in services {
            let wanted: Vec<Uuid> = roles
                .iter()
                .filter(|role| role.service() == service)
                .map(|role| role.uuid())
                .collect();
            let handles = self
                .transport
                .discover_characteristics(service, &wanted)
                .await
                .map_err(ServiceError::DiscoveryFailed)?;

            for handle in handles {
                match roles.iter().copied().find(|role| role.matches(&handle.id)) {
                    Some(role) => map.insert(role, handle),
                    None => tracing::debug!(
                        service = %self.kind,
                        characteristic = %handle.id,
                        "ignoring unexpected characteristic"
                    ),
                }
            }
        }
        Ok(map)
    }

    /// Enable notifications or indications on every bound characteristic
    /// with one of `roles` that supports them.
    ///
    /// Characteristics that already notify are skipped, so calling this
    /// twice is harmless. An instance the transport reports as
    /// [`TransportError::AmbiguousNotification`] is left without
    /// notifications. Returns how many characteristics were enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotSupported`] when no matching characteristic
    /// can notify, the first transport failure, or [`ServiceError::Stopped`]
    /// when the session stops while subscribing.
    pub async fn subscribe(&self, roles: &[CharacteristicRole]) -> Result<usize, ServiceError> {
        let map = self.characteristics()?;
        let mut candidates = 0;
        let mut enabled = 0;

        for bound in map.entries.iter().filter(|bound| roles.contains(&bound.role)) {
            if !bound.handle.properties.can_subscribe() {
                continue;
            }
            candidates += 1;

            let _gate = bound.gate.lock().await;
            self.ensure_ready()?;
            let already = self.lock().notifying.contains(&bound.id());
            if already {
                continue;
            }

            match self.transport.set_notify(&bound.handle, true).await {
                Ok(()) => {}
                Err(TransportError::AmbiguousNotification(id)) => {
                    // refreshed through reads instead
                    tracing::info!(service = %self.kind, characteristic = %id, "instance left without notifications");
                    continue;
                }
                Err(source) => {
                    return Err(ServiceError::transport(Operation::Subscribe, bound.id(), source));
                }
            }

            let accepted = {
                let mut inner = self.lock();
                inner.phase == Phase::Ready && inner.notifying.insert(bound.id())
            };
            if !accepted {
                // stopped while enabling: stop() did not see this one
                if let Err(err) = self.transport.set_notify(&bound.handle, false).await {
                    tracing::warn!(service = %self.kind, characteristic = %bound.id(), %err, "failed to undo late subscription");
                }
                return Err(ServiceError::Stopped);
            }
            tracing::debug!(service = %self.kind, characteristic = %bound.id(), "notifications enabled");
            enabled += 1;
        }

        if candidates == 0 {
            return Err(ServiceError::NotSupported {
                characteristic: roles.first().map_or(Uuid::nil(), |role| role.uuid()),
                operation: Operation::Subscribe,
            });
        }
        Ok(enabled)
    }

    /// Read `bound`, decode it, merge it into the state and emit an update.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotSupported`] for non-readable
    /// characteristics, the transport failure, a decode error (state left
    /// unchanged, nothing emitted), or [`ServiceError::Stopped`] when the
    /// session stopped while the read was in flight.
    pub async fn read(&self, bound: &BoundCharacteristic) -> Result<DomainValue, ServiceError> {
        if !bound.handle.properties.read {
            return Err(ServiceError::NotSupported {
                characteristic: bound.handle.id.uuid,
                operation: Operation::Read,
            });
        }

        let _gate = bound.gate.lock().await;
        self.ensure_ready()?;
        let bytes = self
            .transport
            .read(&bound.handle)
            .await
            .map_err(|source| ServiceError::transport(Operation::Read, bound.id(), source))?;
        self.ensure_ready()?;

        let value = codec::decode(bound.role.kind(), &bytes)?;

        let mut inner = self.lock();
        if inner.phase != Phase::Ready {
            return Err(ServiceError::Stopped);
        }
        inner.state.apply(bound.role, &bound.handle.id, &value)?;
        self.emit(SessionEvent::Updated {
            service: self.kind,
            characteristic: bound.id(),
            value,
        });
        Ok(value)
    }

    /// [`Self::read`], then narrow the value to the type `extract` accepts.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read`], plus [`ServiceError::UnexpectedValue`] when
    /// `extract` rejects the decoded value.
    pub async fn read_as<V>(
        &self,
        bound: &BoundCharacteristic,
        extract: impl FnOnce(DomainValue) -> Option<V> + Send,
    ) -> Result<V, ServiceError> {
        let value = self.read(bound).await?;
        extract(value).ok_or(ServiceError::UnexpectedValue {
            characteristic: bound.id(),
            value,
        })
    }

    /// Write `payload` to `bound`; on success `on_success` records the
    /// written value in the state.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotSupported`] for non-writable
    /// characteristics, the transport failure, or [`ServiceError::Stopped`]
    /// when the session stopped while the write was in flight.
    pub async fn write<F>(
        &self,
        bound: &BoundCharacteristic,
        payload: &[u8],
        on_success: F,
    ) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut S) + Send,
    {
        if !bound.handle.properties.can_write() {
            return Err(ServiceError::NotSupported {
                characteristic: bound.handle.id.uuid,
                operation: Operation::Write,
            });
        }

        let _gate = bound.gate.lock().await;
        self.ensure_ready()?;
        self.transport
            .write(&bound.handle, payload)
            .await
            .map_err(|source| ServiceError::transport(Operation::Write, bound.id(), source))?;

        let mut inner = self.lock();
        if inner.phase != Phase::Ready {
            return Err(ServiceError::Stopped);
        }
        on_success(&mut inner.state);
        tracing::debug!(service = %self.kind, characteristic = %bound.id(), "write acknowledged");
        Ok(())
    }

    /// Handle a value pushed by the transport.
    ///
    /// Returns `false` when the update does not belong to this session (not
    /// a notifying characteristic of ours, or the session is not running).
    pub fn on_value_update(&self, update: &ValueUpdate) -> bool {
        let mut inner = self.lock();
        if inner.phase != Phase::Ready || !inner.notifying.contains(&update.characteristic) {
            return false;
        }
        let Some(map) = inner.characteristics.clone() else {
            return false;
        };
        let Some(bound) = map.find(&update.characteristic) else {
            return false;
        };

        let event = match &update.value {
            Err(error) => {
                tracing::warn!(service = %self.kind, characteristic = %bound.id(), %error, "value update failed");
                SessionEvent::UpdateFailed {
                    service: self.kind,
                    characteristic: bound.id(),
                    error: error.clone(),
                }
            }
            Ok(bytes) => {
                let merged = codec::decode(bound.role.kind(), bytes).and_then(|value| {
                    inner
                        .state
                        .apply(bound.role, &bound.handle.id, &value)
                        .map(|()| value)
                });
                match merged {
                    Ok(value) => SessionEvent::Updated {
                        service: self.kind,
                        characteristic: bound.id(),
                        value,
                    },
                    Err(error) => {
                        tracing::warn!(service = %self.kind, characteristic = %bound.id(), %error, "dropping undecodable value");
                        SessionEvent::DecodeFailed {
                            service: self.kind,
                            characteristic: bound.id(),
                            error,
                        }
                    }
                }
            }
        };
        self.emit(event);
        true
    }

    /// Stop the session: disable every notification it enabled and discard
    /// its characteristics. Idempotent.
    ///
    /// The session ends up stopped even when a disable fails.
    ///
    /// # Errors
    ///
    /// Returns the first transport failure while disabling notifications.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        let (map, notifying) = {
            let mut inner = self.lock();
            if inner.phase == Phase::Stopped {
                return Ok(());
            }
            inner.phase = Phase::Stopped;
            (
                inner.characteristics.take(),
                std::mem::take(&mut inner.notifying),
            )
        };

        let mut result = Ok(());
        if let Some(map) = map {
            for id in notifying {
                let Some(bound) = map.find(&id) else {
                    continue;
                };
                let _gate = bound.gate.try_lock().ok();
                if let Err(source) = self.transport.set_notify(&bound.handle, false).await {
                    tracing::warn!(service = %self.kind, characteristic = %id, err = %source, "failed to disable notifications");
                    if result.is_ok() {
                        result = Err(ServiceError::transport(Operation::Unsubscribe, id, source));
                    }
                }
            }
        }

        tracing::info!(service = %self.kind, "session stopped");
        result
    }

    fn emit(&self, event: SessionEvent) {
        // the receiver going away only means nobody listens anymore
        let _ = self.events.send(event);
    }
}
