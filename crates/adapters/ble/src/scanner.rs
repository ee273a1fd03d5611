//! Peripheral discovery: scan until a peripheral matches the configured
//! filters, then connect to it.

use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use gattlink_domain::gatt;

use crate::config::BleConfig;
use crate::error::BleError;

/// Services a peripheral must advertise to be picked without any filter.
const SUPPORTED_SERVICES: &[Uuid] = &[
    gatt::BATTERY_SERVICE,
    gatt::IMMEDIATE_ALERT_SERVICE,
    gatt::LINK_LOSS_SERVICE,
    gatt::TX_POWER_SERVICE,
    gatt::HEALTH_THERMOMETER_SERVICE,
    gatt::RGB_SERVICE,
    gatt::THERMOMETER_SERVICE,
];

/// Decide whether an advertising peripheral is the one to connect to.
///
/// With a name filter and/or an address allowlist, every configured filter
/// must match. Without any, the peripheral must advertise a supported
/// service.
pub(crate) fn matches(
    config: &BleConfig,
    local_name: Option<&str>,
    address: &str,
    services: &[Uuid],
) -> bool {
    let name_ok = config.name_filter.as_deref().is_none_or(|filter| {
        local_name.is_some_and(|name| name.to_lowercase().contains(&filter.to_lowercase()))
    });
    let address_ok = config.address_filter.is_empty()
        || config
            .address_filter
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(address));

    if config.name_filter.is_none() && config.address_filter.is_empty() {
        return services.iter().any(|uuid| SUPPORTED_SERVICES.contains(uuid));
    }
    name_ok && address_ok
}

/// Find the first BLE adapter on the host.
///
/// # Errors
///
/// Returns [`BleError::NotAvailable`] when the host has none.
pub(crate) async fn first_adapter() -> Result<Adapter, BleError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(BleError::NotAvailable)
}

/// Scan until a peripheral matches `config` or the scan duration elapses.
///
/// # Errors
///
/// Returns [`BleError::DeviceNotFound`] when nothing matched in time, or
/// [`BleError::Scan`] when the scan cannot be started.
pub(crate) async fn find_peripheral(
    central: &Adapter,
    config: &BleConfig,
) -> Result<Peripheral, BleError> {
    let mut events = central.events().await?;
    central.start_scan(ScanFilter::default()).await?;

    let scan_duration = Duration::from_secs(u64::from(config.scan_duration_secs));
    let deadline = tokio::time::Instant::now() + scan_duration;
    let mut found = None;

    while tokio::time::Instant::now() < deadline {
        let remaining = deadline - tokio::time::Instant::now();
        match tokio::time::timeout(remaining, events.next()).await {
            Ok(Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id))) => {
                let Ok(peripheral) = central.peripheral(&id).await else {
                    continue;
                };
                let Ok(Some(props)) = peripheral.properties().await else {
                    continue;
                };
                let address = props.address.to_string();
                tracing::trace!(%address, name = ?props.local_name, "BLE device detected");
                if matches(config, props.local_name.as_deref(), &address, &props.services) {
                    tracing::info!(%address, name = ?props.local_name, "peripheral found");
                    found = Some(peripheral);
                    break;
                }
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }

    if let Err(err) = central.stop_scan().await {
        tracing::warn!(%err, "failed to stop BLE scan");
    }

    found.ok_or(BleError::DeviceNotFound {
        scan_secs: config.scan_duration_secs,
    })
}

/// Connect to `peripheral` within the configured timeout.
///
/// # Errors
///
/// Returns [`BleError::ConnectTimeout`] when the timeout elapses, or
/// [`BleError::Scan`] when the connection is refused.
pub(crate) async fn connect(peripheral: &Peripheral, config: &BleConfig) -> Result<(), BleError> {
    let timeout = Duration::from_secs(u64::from(config.connect_timeout_secs));
    match tokio::time::timeout(timeout, peripheral.connect()).await {
        Ok(result) => result.map_err(BleError::from),
        Err(_) => Err(BleError::ConnectTimeout {
            address: peripheral.address().to_string(),
        }),
    }
}
