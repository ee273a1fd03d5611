//! Battery session: battery level of every Battery service instance.

use std::sync::Arc;

use tokio::sync::mpsc;

use gattlink_domain::battery::BatteryState;
use gattlink_domain::codec::DomainValue;
use gattlink_domain::error::DecodeError;
use gattlink_domain::gatt::CharacteristicId;

use super::session_core::{CharacteristicRole, SessionCore, SessionState};
use super::{ServiceKind, SessionEvent, SessionPhase};
use crate::error::ServiceError;
use crate::ports::{Transport, ValueUpdate};

const ROLES: &[CharacteristicRole] = &[CharacteristicRole::BatteryLevel];

impl SessionState for BatteryState {
    fn apply(
        &mut self,
        _role: CharacteristicRole,
        characteristic: &CharacteristicId,
        value: &DomainValue,
    ) -> Result<(), DecodeError> {
        if let DomainValue::BatteryLevel(level) = value {
            self.record(characteristic.service, *level)?;
        }
        Ok(())
    }
}

/// Session over the Battery service.
///
/// Peripherals with several batteries expose several Battery service
/// instances; levels are tracked per instance.
pub struct BatterySession<T> {
    core: SessionCore<T, BatteryState>,
}

impl<T: Transport> BatterySession<T> {
    pub fn new(transport: Arc<T>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            core: SessionCore::new(ServiceKind::Battery, transport, events),
        }
    }

    /// Discover the Battery Level characteristic of every instance.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::CharacteristicNotFound`] when no instance
    /// exposes Battery Level, or a lifecycle/transport error.
    #[tracing::instrument(skip(self), fields(service = %ServiceKind::Battery))]
    pub async fn start(&self) -> Result<(), ServiceError> {
        self.core
            .start(ROLES, |characteristics| {
                characteristics
                    .require(CharacteristicRole::BatteryLevel)
                    .map(|_| ())
            })
            .await
    }

    /// Enable battery level notifications on every instance that supports
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotSupported`] when no instance notifies, or
    /// the first transport failure.
    pub async fn subscribe(&self) -> Result<(), ServiceError> {
        self.core.subscribe(ROLES).await.map(|_| ())
    }

    /// Read the level of every instance and return the merged state.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotReady`] before `start`, the first transport
    /// or decode failure, or [`ServiceError::Stopped`].
    pub async fn read_battery_level(&self) -> Result<BatteryState, ServiceError> {
        let characteristics = self.core.characteristics()?;
        for bound in characteristics.all(CharacteristicRole::BatteryLevel) {
            self.core.read(bound).await?;
        }
        Ok(self.core.state())
    }

    /// # Errors
    ///
    /// Returns the first failure while disabling notifications.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        self.core.stop().await
    }

    pub fn on_value_update(&self, update: &ValueUpdate) -> bool {
        self.core.on_value_update(update)
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.core.phase()
    }

    #[must_use]
    pub fn state(&self) -> BatteryState {
        self.core.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeTransport, handle, read_notify, update};
    use gattlink_domain::gatt::{self, CharacteristicHandle, ServiceId};

    fn level(instance: u16) -> CharacteristicHandle {
        handle(gatt::BATTERY_SERVICE, instance, gatt::BATTERY_LEVEL, read_notify())
    }

    fn session_with(
        transport: FakeTransport,
    ) -> (
        Arc<FakeTransport>,
        BatterySession<FakeTransport>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let transport = Arc::new(transport);
        let (tx, rx) = mpsc::unbounded_channel();
        let session = BatterySession::new(Arc::clone(&transport), tx);
        (transport, session, rx)
    }

    async fn subscribed(
        transport: FakeTransport,
    ) -> (
        Arc<FakeTransport>,
        BatterySession<FakeTransport>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (transport, session, rx) = session_with(transport);
        session.start().await.unwrap();
        session.subscribe().await.unwrap();
        (transport, session, rx)
    }

    #[tokio::test]
    async fn should_fail_to_start_without_battery_level() {
        let (_transport, session, _rx) = session_with(FakeTransport::default());

        let err = session.start().await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::CharacteristicNotFound { characteristic } if characteristic == gatt::BATTERY_LEVEL
        ));
        assert_eq!(session.phase(), SessionPhase::Stopped);
    }

    #[tokio::test]
    async fn should_record_notified_level_and_emit_update() {
        let (_transport, session, mut rx) = subscribed(FakeTransport::default().with(level(0))).await;

        assert!(session.on_value_update(&update(level(0).id, &[0x55])));

        assert_eq!(session.state().level(ServiceId::primary(gatt::BATTERY_SERVICE)), Some(85));
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionEvent::Updated {
                value: DomainValue::BatteryLevel(85),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn should_keep_previous_level_when_value_exceeds_hundred() {
        let (_transport, session, mut rx) = subscribed(FakeTransport::default().with(level(0))).await;
        session.on_value_update(&update(level(0).id, &[40]));
        let _ = rx.try_recv();

        assert!(session.on_value_update(&update(level(0).id, &[101])));

        assert_eq!(session.state().level(ServiceId::primary(gatt::BATTERY_SERVICE)), Some(40));
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionEvent::DecodeFailed {
                error: DecodeError::OutOfRange { value: 101, .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn should_keep_subscription_after_decode_failure() {
        let (transport, session, mut rx) = subscribed(FakeTransport::default().with(level(0))).await;

        session.on_value_update(&update(level(0).id, &[]));
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::DecodeFailed { .. }));

        session.on_value_update(&update(level(0).id, &[77]));
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Updated { .. }));
        assert_eq!(session.phase(), SessionPhase::Subscribed);
        assert_eq!(transport.notify_calls(), vec![(level(0).id, true)]);
    }

    #[tokio::test]
    async fn should_track_levels_per_service_instance() {
        let transport = FakeTransport::default().with(level(0)).with(level(1));
        transport.set_value(level(0).id, &[20]);
        transport.set_value(level(1).id, &[90]);
        let (_transport, session, _rx) = session_with(transport);
        session.start().await.unwrap();

        let state = session.read_battery_level().await.unwrap();

        let levels: Vec<(u16, u8)> = state.iter().map(|(s, l)| (s.instance, l)).collect();
        assert_eq!(levels, vec![(0, 20), (1, 90)]);
    }

    #[tokio::test]
    async fn should_refresh_instances_that_cannot_notify_through_reads() {
        let transport = FakeTransport::default()
            .with(level(0))
            .with(level(1))
            .one_notifying_per_uuid();
        transport.set_value(level(0).id, &[20]);
        transport.set_value(level(1).id, &[90]);
        let (transport, session, mut rx) = subscribed(transport).await;

        assert_eq!(
            transport.notify_calls(),
            vec![(level(0).id, true), (level(1).id, true)]
        );
        assert_eq!(session.phase(), SessionPhase::Subscribed);
        assert!(!session.on_value_update(&update(level(1).id, &[55])));
        assert!(rx.try_recv().is_err());

        let state = session.read_battery_level().await.unwrap();

        let levels: Vec<(u16, u8)> = state.iter().map(|(s, l)| (s.instance, l)).collect();
        assert_eq!(levels, vec![(0, 20), (1, 90)]);

        session.stop().await.unwrap();
        assert_eq!(
            transport.notify_calls()[2..],
            [(level(0).id, false)]
        );
    }

    #[tokio::test]
    async fn should_reject_read_before_start() {
        let (transport, session, _rx) = session_with(FakeTransport::default().with(level(0)));

        let err = session.read_battery_level().await.unwrap_err();

        assert!(matches!(err, ServiceError::NotReady));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn should_unsubscribe_once_when_stopped_twice() {
        let (transport, session, _rx) = subscribed(FakeTransport::default().with(level(0))).await;

        session.stop().await.unwrap();
        session.stop().await.unwrap();

        assert_eq!(
            transport.notify_calls(),
            vec![(level(0).id, true), (level(0).id, false)]
        );
        assert_eq!(session.phase(), SessionPhase::Stopped);
    }

    #[tokio::test]
    async fn should_ignore_notification_after_stop() {
        let (_transport, session, mut rx) = subscribed(FakeTransport::default().with(level(0))).await;
        session.on_value_update(&update(level(0).id, &[10]));
        let _ = rx.try_recv();
        session.stop().await.unwrap();

        assert!(!session.on_value_update(&update(level(0).id, &[99])));

        assert!(rx.try_recv().is_err());
        assert_eq!(session.state().level(ServiceId::primary(gatt::BATTERY_SERVICE)), Some(10));
    }

    #[tokio::test]
    async fn should_discard_read_completing_after_stop() {
        let transport = FakeTransport::default().with(level(0));
        transport.set_value(level(0).id, &[60]);
        let release = transport.hold_reads();
        let (transport, session, mut rx) = session_with(transport);
        session.start().await.unwrap();

        let (read, stopped) = tokio::join!(session.read_battery_level(), async {
            tokio::task::yield_now().await;
            let stopped = session.stop().await;
            release.notify_one();
            stopped
        });

        assert!(stopped.is_ok());
        assert!(matches!(read, Err(ServiceError::Stopped)));
        assert!(session.state().is_empty());
        assert!(rx.try_recv().is_err());
        assert!(transport.calls().contains(&Call::Read(level(0).id)));
    }

    #[tokio::test]
    async fn should_serialize_reads_of_the_same_characteristic() {
        let transport = FakeTransport::default().with(level(0));
        transport.set_value(level(0).id, &[30]);
        let release = transport.hold_reads();
        let (transport, session, _rx) = session_with(transport);
        session.start().await.unwrap();

        let (first, second, ()) = tokio::join!(
            session.read_battery_level(),
            session.read_battery_level(),
            async {
                tokio::task::yield_now().await;
                // only the first read reached the transport
                assert_eq!(transport.calls().len(), 2);
                release.notify_one();
                tokio::task::yield_now().await;
                release.notify_one();
            }
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        let reads = transport
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Read(_)))
            .count();
        assert_eq!(reads, 2);
    }
}
