//! # gattlink
//!
//! Composition root that wires the BLE adapter to the service sessions.
//!
//! ## Responsibilities
//! - Load configuration (`gattlink.toml`, env vars) and install logging
//! - Scan for and connect to the configured peripheral
//! - Construct the enabled sessions over one shared transport
//! - Perform the configured one-shot writes and initial reads
//! - Route value updates to sessions and print every `SessionEvent` as a
//!   JSON line on stdout until Ctrl-C or until the peripheral disconnects
//! - Stop all sessions and disconnect on shutdown
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! No GATT logic belongs here.

mod config;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use gattlink_adapter_ble::BleTransport;
use gattlink_app::error::ServiceError;
use gattlink_app::ports::{Transport, ValueUpdate};
use gattlink_app::registry::SessionRegistry;
use gattlink_app::sessions::{
    BatterySession, FindMeSession, HealthThermometerSession, RgbLightSession, SessionEvent,
    ThermometerSession,
};

use crate::config::{ActionsConfig, Config, ServicesConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();

    let transport = Arc::new(
        BleTransport::connect(&config.ble)
            .await
            .context("failed to connect to peripheral")?,
    );
    let mut updates = transport
        .value_updates()
        .await
        .context("failed to open the notification stream")?;

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut registry = build_registry(&config.services, &transport, &events_tx)?;
    drop(events_tx);

    start_sessions(&mut registry).await;
    run_actions(&registry, &config.actions).await?;
    read_initial_values(&registry).await;

    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for Ctrl-C");
        }
    };
    let exit = run(&registry, &mut updates, &mut events, ctrl_c, print_event).await;
    tracing::debug!(?exit, "event loop finished");

    if let Err(err) = registry.stop_all().await {
        tracing::warn!(%err, "sessions did not stop cleanly");
    }
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
    transport.disconnect().await;

    Ok(())
}

/// Why the event loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Shutdown,
    Disconnected,
}

/// Route updates to the sessions and hand every event to `on_event` until
/// `shutdown` resolves or the update stream closes.
async fn run<T: Transport>(
    registry: &SessionRegistry<T>,
    updates: &mut mpsc::UnboundedReceiver<ValueUpdate>,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    shutdown: impl Future<Output = ()>,
    mut on_event: impl FnMut(&SessionEvent),
) -> Exit {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => on_event(&event),
            update = updates.recv() => match update {
                Some(update) => {
                    registry.route(&update);
                }
                None => {
                    tracing::warn!("peripheral disconnected");
                    return Exit::Disconnected;
                }
            },
            () = &mut shutdown => {
                tracing::info!("shutting down");
                return Exit::Shutdown;
            }
        }
    }
}

fn build_registry(
    services: &ServicesConfig,
    transport: &Arc<BleTransport>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> Result<SessionRegistry<BleTransport>, ServiceError> {
    let mut registry = SessionRegistry::new();
    if services.battery {
        registry.insert(BatterySession::new(Arc::clone(transport), events.clone()))?;
    }
    if services.find_me {
        registry.insert(FindMeSession::new(Arc::clone(transport), events.clone()))?;
    }
    if services.thermometer {
        registry.insert(ThermometerSession::new(Arc::clone(transport), events.clone()))?;
    }
    if services.health_thermometer {
        registry.insert(HealthThermometerSession::new(
            Arc::clone(transport),
            events.clone(),
        ))?;
    }
    if services.rgb_light {
        registry.insert(RgbLightSession::new(Arc::clone(transport), events.clone()))?;
    }
    Ok(registry)
}

/// Start and subscribe every session; drop the ones the peripheral cannot serve.
async fn start_sessions(registry: &mut SessionRegistry<BleTransport>) {
    let mut failed = Vec::new();
    for session in registry.iter() {
        let kind = session.kind();
        if let Err(err) = session.start().await {
            tracing::warn!(service = %kind, %err, "service unavailable on this peripheral");
            failed.push(kind);
            continue;
        }
        match session.subscribe().await {
            Ok(()) => tracing::info!(service = %kind, "subscribed"),
            Err(err @ (ServiceError::NotSupported { .. } | ServiceError::NotPresent { .. })) => {
                tracing::info!(service = %kind, %err, "running without notifications");
            }
            Err(err) => tracing::warn!(service = %kind, %err, "failed to subscribe"),
        }
    }
    for kind in failed {
        if let Err(err) = registry.remove(kind).await {
            tracing::debug!(service = %kind, %err, "failed to stop unavailable session");
        }
    }
}

async fn run_actions(
    registry: &SessionRegistry<BleTransport>,
    actions: &ActionsConfig,
) -> anyhow::Result<()> {
    if let Some(find_me) = registry.find_me() {
        if let Some(option) = actions.link_loss_alert {
            log_outcome("link loss alert", find_me.write_link_loss_alert(option).await);
        }
        if let Some(option) = actions.immediate_alert {
            log_outcome("immediate alert", find_me.write_immediate_alert(option).await);
        }
    }
    if let (Some(rgb), Some(color)) = (registry.rgb_light(), actions.rgb_color) {
        let color = color.to_color()?;
        log_outcome(
            "RGB color",
            rgb.write_color(
                i64::from(color.red),
                i64::from(color.green),
                i64::from(color.blue),
                i64::from(color.intensity),
            )
            .await,
        );
    }
    Ok(())
}

/// One-shot reads; each successful read is also reported as an event.
async fn read_initial_values(registry: &SessionRegistry<BleTransport>) {
    if let Some(battery) = registry.battery() {
        log_read("battery level", battery.read_battery_level().await);
    }
    if let Some(find_me) = registry.find_me() {
        log_read("tx power", find_me.read_tx_power().await);
        log_read("link loss alert", find_me.read_link_loss_alert().await);
    }
    if let Some(thermometer) = registry.thermometer() {
        log_read("temperature", thermometer.read_temperature().await);
        log_read("sensor details", thermometer.read_sensor_details().await);
    }
    if let Some(health) = registry.health_thermometer() {
        log_read("temperature type", health.read_temperature_type().await);
    }
    if let Some(rgb) = registry.rgb_light() {
        log_read("RGB color", rgb.read_color().await);
    }
}

fn log_outcome(action: &str, result: Result<(), ServiceError>) {
    match result {
        Ok(()) => tracing::info!(action, "written"),
        Err(err) => tracing::warn!(action, %err, "write failed"),
    }
}

fn log_read<V: std::fmt::Debug>(what: &str, result: Result<V, ServiceError>) {
    match result {
        Ok(value) => tracing::debug!(what, ?value, "read"),
        Err(err @ ServiceError::NotPresent { .. }) => tracing::debug!(what, %err, "skipped"),
        Err(err) => tracing::warn!(what, %err, "read failed"),
    }
}

fn print_event(event: &SessionEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(err) => tracing::error!(%err, service = %event.service(), "failed to serialize event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gattlink_app::ports::TransportError;
    use gattlink_app::sessions::SessionPhase;
    use gattlink_domain::codec::DomainValue;
    use gattlink_domain::gatt::{
        self, CharacteristicHandle, CharacteristicId, CharacteristicProperties, ServiceId,
    };
    use uuid::Uuid;

    fn battery_level() -> CharacteristicHandle {
        CharacteristicHandle::new(
            CharacteristicId::new(ServiceId::primary(gatt::BATTERY_SERVICE), gatt::BATTERY_LEVEL),
            CharacteristicProperties {
                read: true,
                notify: true,
                ..CharacteristicProperties::default()
            },
        )
    }

    /// A peripheral exposing a single notifying battery level.
    struct Battery;

    impl Transport for Battery {
        async fn discover_characteristics(
            &self,
            service: Uuid,
            _characteristics: &[Uuid],
        ) -> Result<Vec<CharacteristicHandle>, TransportError> {
            if service == gatt::BATTERY_SERVICE {
                Ok(vec![battery_level()])
            } else {
                Ok(Vec::new())
            }
        }

        async fn set_notify(
            &self,
            _handle: &CharacteristicHandle,
            _enabled: bool,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn read(&self, handle: &CharacteristicHandle) -> Result<Vec<u8>, TransportError> {
            Err(TransportError::CharacteristicNotFound(handle.id))
        }

        async fn write(
            &self,
            _handle: &CharacteristicHandle,
            _payload: &[u8],
        ) -> Result<(), TransportError> {
            Ok(())
        }
    }

    async fn subscribed_registry() -> (
        SessionRegistry<Battery>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (tx, events) = mpsc::unbounded_channel();
        let mut registry = SessionRegistry::new();
        registry
            .insert(BatterySession::new(Arc::new(Battery), tx))
            .unwrap();
        let battery = registry.battery().unwrap();
        battery.start().await.unwrap();
        battery.subscribe().await.unwrap();
        (registry, events)
    }

    #[tokio::test]
    async fn should_exit_when_update_stream_closes() {
        let (registry, mut events) = subscribed_registry().await;
        let (updates_tx, mut updates) = mpsc::unbounded_channel();
        updates_tx
            .send(ValueUpdate::value(battery_level().id, vec![42]))
            .unwrap();
        drop(updates_tx);

        let mut seen = Vec::new();
        let exit = run(
            &registry,
            &mut updates,
            &mut events,
            std::future::pending(),
            |event| seen.push(event.clone()),
        )
        .await;

        assert_eq!(exit, Exit::Disconnected);
        let seen: Vec<_> = seen
            .into_iter()
            .chain(std::iter::from_fn(|| events.try_recv().ok()))
            .collect();
        assert!(matches!(
            seen.as_slice(),
            [SessionEvent::Updated {
                value: DomainValue::BatteryLevel(42),
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn should_exit_on_shutdown_while_peripheral_is_connected() {
        let (registry, mut events) = subscribed_registry().await;
        let (_updates_tx, mut updates) = mpsc::unbounded_channel();

        let exit = run(&registry, &mut updates, &mut events, async {}, |_| {}).await;

        assert_eq!(exit, Exit::Shutdown);
        assert_eq!(
            registry.battery().unwrap().phase(),
            SessionPhase::Subscribed
        );
    }
}
