//! In-memory transport used by the session tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use uuid::Uuid;

use gattlink_domain::gatt::{
    CharacteristicHandle, CharacteristicId, CharacteristicProperties, ServiceId,
};

use crate::ports::{Transport, TransportError, ValueUpdate};

/// One transport call, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Discover(Uuid),
    SetNotify(CharacteristicId, bool),
    Read(CharacteristicId),
    Write(CharacteristicId, Vec<u8>),
}

/// Records every call and answers from canned values.
#[derive(Default)]
pub(crate) struct FakeTransport {
    handles: Vec<CharacteristicHandle>,
    values: Mutex<HashMap<CharacteristicId, Vec<u8>>>,
    calls: Mutex<Vec<Call>>,
    discovery_error: Mutex<Option<TransportError>>,
    notify_error: Mutex<Option<TransportError>>,
    write_error: Mutex<Option<TransportError>>,
    discovery_gate: Mutex<Option<Arc<Notify>>>,
    read_gate: Mutex<Option<Arc<Notify>>>,
    one_notifying_per_uuid: bool,
    notifying: Mutex<Vec<CharacteristicId>>,
}

impl FakeTransport {
    /// Expose `handle` to discovery.
    pub(crate) fn with(mut self, handle: CharacteristicHandle) -> Self {
        self.handles.push(handle);
        self
    }

    /// Refuse notifications on a second instance of an already notifying
    /// characteristic UUID, like the BLE adapter does.
    pub(crate) fn one_notifying_per_uuid(mut self) -> Self {
        self.one_notifying_per_uuid = true;
        self
    }

    /// Value returned by reads of `id`.
    pub(crate) fn set_value(&self, id: CharacteristicId, bytes: &[u8]) {
        self.values.lock().unwrap().insert(id, bytes.to_vec());
    }

    pub(crate) fn fail_discovery(&self, err: TransportError) {
        *self.discovery_error.lock().unwrap() = Some(err);
    }

    pub(crate) fn fail_notify(&self, err: TransportError) {
        *self.notify_error.lock().unwrap() = Some(err);
    }

    pub(crate) fn fail_writes(&self, err: TransportError) {
        *self.write_error.lock().unwrap() = Some(err);
    }

    /// Park every discovery until the returned [`Notify`] fires.
    pub(crate) fn hold_discovery(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.discovery_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Park every read until the returned [`Notify`] fires.
    pub(crate) fn hold_reads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.read_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn notify_calls(&self) -> Vec<(CharacteristicId, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetNotify(id, enabled) => Some((id, enabled)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn writes(&self) -> Vec<(CharacteristicId, Vec<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write(id, payload) => Some((id, payload)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Transport for FakeTransport {
    fn discover_characteristics(
        &self,
        service: Uuid,
        characteristics: &[Uuid],
    ) -> impl Future<Output = Result<Vec<CharacteristicHandle>, TransportError>> + Send {
        self.record(Call::Discover(service));
        let gate = self.discovery_gate.lock().unwrap().clone();
        let error = self.discovery_error.lock().unwrap().clone();
        let found: Vec<CharacteristicHandle> = self
            .handles
            .iter()
            .filter(|h| h.id.service.uuid == service && characteristics.contains(&h.id.uuid))
            .copied()
            .collect();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            match error {
                Some(err) => Err(err),
                None => Ok(found),
            }
        }
    }

    fn set_notify(
        &self,
        handle: &CharacteristicHandle,
        enabled: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        self.record(Call::SetNotify(handle.id, enabled));
        let result = match self.notify_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => {
                let mut notifying = self.notifying.lock().unwrap();
                if !enabled {
                    notifying.retain(|id| *id != handle.id);
                    Ok(())
                } else if self.one_notifying_per_uuid
                    && notifying
                        .iter()
                        .any(|id| id.uuid == handle.id.uuid && *id != handle.id)
                {
                    Err(TransportError::AmbiguousNotification(handle.id))
                } else {
                    if !notifying.contains(&handle.id) {
                        notifying.push(handle.id);
                    }
                    Ok(())
                }
            }
        };
        async { result }
    }

    fn read(
        &self,
        handle: &CharacteristicHandle,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send {
        self.record(Call::Read(handle.id));
        let gate = self.read_gate.lock().unwrap().clone();
        let id = handle.id;
        let value = self.values.lock().unwrap().get(&id).cloned();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            value.ok_or(TransportError::CharacteristicNotFound(id))
        }
    }

    fn write(
        &self,
        handle: &CharacteristicHandle,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        self.record(Call::Write(handle.id, payload.to_vec()));
        let result = match self.write_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        };
        async { result }
    }
}

pub(crate) fn handle(
    service: Uuid,
    instance: u16,
    uuid: Uuid,
    properties: CharacteristicProperties,
) -> CharacteristicHandle {
    CharacteristicHandle::new(
        CharacteristicId::new(ServiceId { uuid: service, instance }, uuid),
        properties,
    )
}

pub(crate) fn read_only() -> CharacteristicProperties {
    CharacteristicProperties {
        read: true,
        ..CharacteristicProperties::default()
    }
}

pub(crate) fn notify_only() -> CharacteristicProperties {
    CharacteristicProperties {
        notify: true,
        ..CharacteristicProperties::default()
    }
}

pub(crate) fn read_notify() -> CharacteristicProperties {
    CharacteristicProperties {
        read: true,
        notify: true,
        ..CharacteristicProperties::default()
    }
}

pub(crate) fn read_write() -> CharacteristicProperties {
    CharacteristicProperties {
        read: true,
        write: true,
        ..CharacteristicProperties::default()
    }
}

pub(crate) fn write_only() -> CharacteristicProperties {
    CharacteristicProperties {
        write_without_response: true,
        ..CharacteristicProperties::default()
    }
}

pub(crate) fn indicate_only() -> CharacteristicProperties {
    CharacteristicProperties {
        indicate: true,
        ..CharacteristicProperties::default()
    }
}

pub(crate) fn update(id: CharacteristicId, bytes: &[u8]) -> ValueUpdate {
    ValueUpdate::value(id, bytes.to_vec())
}
