//! GATT transport over a connected `btleplug` peripheral.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _, Service, WriteType};
use btleplug::platform::Peripheral;
use tokio::sync::{OnceCell, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use gattlink_app::ports::{Transport, TransportError, ValueUpdate};
use gattlink_domain::gatt::{
    CharacteristicHandle, CharacteristicId, CharacteristicProperties, ServiceId,
};

use crate::config::BleConfig;
use crate::error::{BleError, to_transport_error};
use crate::scanner;

/// Ids currently notifying, shared with the notification pump.
type Notifying = Arc<Mutex<BTreeSet<CharacteristicId>>>;

/// A connected peripheral exposed through the [`Transport`] port.
pub struct BleTransport {
    peripheral: Peripheral,
    services: OnceCell<BTreeSet<Service>>,
    characteristics: Mutex<HashMap<CharacteristicId, Characteristic>>,
    notifying: Notifying,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl BleTransport {
    /// Scan for a peripheral matching `config` and connect to it.
    ///
    /// # Errors
    ///
    /// Returns a [`BleError`] when no adapter is available, nothing matches
    /// within the scan window, or the connection fails.
    pub async fn connect(config: &BleConfig) -> Result<Self, BleError> {
        tracing::info!(
            scan_secs = config.scan_duration_secs,
            name_filter = ?config.name_filter,
            address_filter = ?config.address_filter,
            "scanning for peripheral"
        );
        let central = scanner::first_adapter().await?;
        let peripheral = scanner::find_peripheral(&central, config).await?;
        scanner::connect(&peripheral, config).await?;
        tracing::info!(address = %peripheral.address(), "peripheral connected");

        Ok(Self {
            peripheral,
            services: OnceCell::new(),
            characteristics: Mutex::new(HashMap::new()),
            notifying: Arc::default(),
            pump: Mutex::new(None),
        })
    }

    /// Address of the connected peripheral.
    #[must_use]
    pub fn address(&self) -> String {
        self.peripheral.address().to_string()
    }

    /// Start forwarding notifications and indications as [`ValueUpdate`]s.
    ///
    /// When the peripheral's notification stream ends, every characteristic
    /// still notifying receives a [`TransportError::ConnectionLost`] failure.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::Scan`] when the notification stream cannot be
    /// opened.
    pub async fn value_updates(&self) -> Result<mpsc::UnboundedReceiver<ValueUpdate>, BleError> {
        let mut stream = self.peripheral.notifications().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let notifying = Arc::clone(&self.notifying);

        let handle = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                let Some(id) = resolve(&notifying, notification.uuid) else {
                    tracing::trace!(uuid = %notification.uuid, "notification for an unknown characteristic");
                    continue;
                };
                if tx.send(ValueUpdate::value(id, notification.value)).is_err() {
                    return;
                }
            }

            tracing::warn!("notification stream ended");
            let lost: Vec<_> = notifying
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .copied()
                .collect();
            for id in lost {
                let _ = tx.send(ValueUpdate::failure(id, TransportError::ConnectionLost));
            }
        });

        let previous = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(rx)
    }

    /// Stop the notification pump and disconnect from the peripheral.
    pub async fn disconnect(&self) {
        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump {
            pump.abort();
        }
        if let Err(err) = self.peripheral.disconnect().await {
            tracing::warn!(%err, "failed to disconnect from peripheral");
        }
    }

    fn characteristic(&self, id: &CharacteristicId) -> Result<Characteristic, TransportError> {
        self.characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or(TransportError::CharacteristicNotFound(*id))
    }
}

impl Transport for BleTransport {
    async fn discover_characteristics(
        &self,
        service: Uuid,
        characteristics: &[Uuid],
    ) -> Result<Vec<CharacteristicHandle>, TransportError> {
        let services = self
            .services
            .get_or_try_init(|| async {
                self.peripheral
                    .discover_services()
                    .await
                    .map_err(to_transport_error)?;
                let services = self.peripheral.services();
                tracing::debug!(count = services.len(), "services discovered");
                Ok::<_, TransportError>(services)
            })
            .await?;

        let matching = matching_characteristics(services, service, characteristics);
        let mut known = self
            .characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let found = matching
            .into_iter()
            .map(|(id, characteristic)| {
                let handle = CharacteristicHandle::new(id, properties(characteristic.properties));
                known.insert(id, characteristic);
                handle
            })
            .collect::<Vec<_>>();
        tracing::debug!(%service, count = found.len(), "characteristics discovered");
        Ok(found)
    }

    async fn set_notify(
        &self,
        handle: &CharacteristicHandle,
        enabled: bool,
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(&handle.id)?;
        if enabled {
            claim(&self.notifying, handle.id)?;
            if let Err(err) = self.peripheral.subscribe(&characteristic).await {
                self.notifying
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&handle.id);
                return Err(to_transport_error(err));
            }
        } else {
            self.notifying
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&handle.id);
            self.peripheral
                .unsubscribe(&characteristic)
                .await
                .map_err(to_transport_error)?;
        }
        Ok(())
    }

    async fn read(&self, handle: &CharacteristicHandle) -> Result<Vec<u8>, TransportError> {
        let characteristic = self.characteristic(&handle.id)?;
        self.peripheral
            .read(&characteristic)
            .await
            .map_err(to_transport_error)
    }

    async fn write(
        &self,
        handle: &CharacteristicHandle,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(&handle.id)?;
        self.peripheral
            .write(&characteristic, payload, write_type(handle.properties))
            .await
            .map_err(to_transport_error)
    }
}

/// Instances of `wanted` characteristics in every `service` instance, in
/// the order the peripheral lists them.
fn matching_characteristics(
    services: &BTreeSet<Service>,
    service: Uuid,
    wanted: &[Uuid],
) -> Vec<(CharacteristicId, Characteristic)> {
    let instances = services.iter().filter(|s| s.uuid == service);
    (0_u16..)
        .zip(instances)
        .flat_map(|(instance, gatt_service)| {
            let service_id = ServiceId {
                uuid: service,
                instance,
            };
            gatt_service
                .characteristics
                .iter()
                .filter(|c| wanted.contains(&c.uuid))
                .map(move |c| (CharacteristicId::new(service_id, c.uuid), c.clone()))
        })
        .collect()
}

/// Mark `id` as notifying.
///
/// Notifications only carry the characteristic UUID, so a second instance
/// of the same UUID cannot notify alongside the first.
fn claim(
    notifying: &Mutex<BTreeSet<CharacteristicId>>,
    id: CharacteristicId,
) -> Result<(), TransportError> {
    let mut notifying = notifying.lock().unwrap_or_else(PoisonError::into_inner);
    if notifying.iter().any(|other| other.uuid == id.uuid && *other != id) {
        return Err(TransportError::AmbiguousNotification(id));
    }
    notifying.insert(id);
    Ok(())
}

/// Resolve a notification by characteristic UUID among the notifying set.
fn resolve(notifying: &Mutex<BTreeSet<CharacteristicId>>, uuid: Uuid) -> Option<CharacteristicId> {
    notifying
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .find(|id| id.uuid == uuid)
        .copied()
}

fn properties(flags: CharPropFlags) -> CharacteristicProperties {
    CharacteristicProperties {
        read: flags.contains(CharPropFlags::READ),
        write: flags.contains(CharPropFlags::WRITE),
        write_without_response: flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        notify: flags.contains(CharPropFlags::NOTIFY),
        indicate: flags.contains(CharPropFlags::INDICATE),
    }
}

/// Prefer acknowledged writes when the characteristic supports them.
fn write_type(properties: CharacteristicProperties) -> WriteType {
    if properties.write {
        WriteType::WithResponse
    } else {
        WriteType::WithoutResponse
    }
}
