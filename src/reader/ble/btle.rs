//! btleplug-backed implementation of the GATT link.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::reader::error::ReaderError;

use super::link::{COMMAND_UUID, DATA_UUID, GattLink, LinkConnector, LinkEvent, STATUS_UUID, SERVICE_UUID};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Scans the first local adapter for a bridge advertising the reader
/// service and connects to it.
#[derive(Debug, Clone)]
pub struct BtleConnector {
    scan_window: Duration,
    device_name: Option<String>,
}

impl BtleConnector {
    pub fn new(scan_window: Duration, device_name: Option<String>) -> Self {
        Self {
            scan_window,
            device_name,
        }
    }

    async fn pick_peripheral(&self, adapter: &Adapter) -> Result<Peripheral, ReaderError> {
        adapter
            .start_scan(ScanFilter {
                services: vec![SERVICE_UUID],
            })
            .await
            .map_err(connect_err)?;
        tokio::time::sleep(self.scan_window).await;
        let peripherals = adapter.peripherals().await.map_err(connect_err)?;
        let _ = adapter.stop_scan().await;

        for peripheral in peripherals {
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };
            if !props.services.contains(&SERVICE_UUID) {
                continue;
            }
            if let Some(wanted) = &self.device_name {
                if props.local_name.as_deref() != Some(wanted.as_str()) {
                    continue;
                }
            }
            return Ok(peripheral);
        }
        Err(ReaderError::Connect(
            "no card reader bridge found in range".to_owned(),
        ))
    }
}

#[async_trait]
impl LinkConnector for BtleConnector {
    async fn connect(&self) -> Result<Box<dyn GattLink>, ReaderError> {
        let manager = Manager::new().await.map_err(connect_err)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(connect_err)?
            .into_iter()
            .next()
            .ok_or_else(|| ReaderError::Connect("no Bluetooth adapter found".to_owned()))?;

        let peripheral = self.pick_peripheral(&adapter).await?;
        if !peripheral.is_connected().await.map_err(connect_err)? {
            peripheral.connect().await.map_err(connect_err)?;
        }
        peripheral.discover_services().await.map_err(connect_err)?;

        let data_char = resolve_char(&peripheral, DATA_UUID)?;
        let command_char = resolve_char(&peripheral, COMMAND_UUID)?;
        let status_char = resolve_char(&peripheral, STATUS_UUID)?;

        // Notifications on data and status, matching the bridge firmware.
        peripheral.subscribe(&data_char).await.map_err(connect_err)?;
        peripheral
            .subscribe(&status_char)
            .await
            .map_err(connect_err)?;

        let name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name)
            .unwrap_or_else(|| "BLE card reader".to_owned());

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        spawn_event_pump(adapter, peripheral.clone(), events.clone()).await?;

        Ok(Box::new(BtleLink {
            peripheral,
            command_char,
            data_char,
            name,
            events,
        }))
    }
}

/// Forwards status notifications and the disconnect event into the
/// broadcast channel the client listens on.
async fn spawn_event_pump(
    adapter: Adapter,
    peripheral: Peripheral,
    events: broadcast::Sender<LinkEvent>,
) -> Result<(), ReaderError> {
    let mut notifications = peripheral.notifications().await.map_err(connect_err)?;
    let mut central_events = adapter.events().await.map_err(connect_err)?;
    let id = peripheral.id();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                notification = notifications.next() => {
                    match notification {
                        Some(n) if n.uuid == STATUS_UUID => {
                            let _ = events.send(LinkEvent::Status(n.value));
                        }
                        Some(_) => {}
                        None => {
                            let _ = events.send(LinkEvent::Disconnected);
                            break;
                        }
                    }
                }
                event = central_events.next() => {
                    match event {
                        Some(CentralEvent::DeviceDisconnected(dropped)) if dropped == id => {
                            let _ = events.send(LinkEvent::Disconnected);
                            break;
                        }
                        Some(_) => {}
                        None => {
                            let _ = events.send(LinkEvent::Disconnected);
                            break;
                        }
                    }
                }
            }
        }
        tracing::debug!("BLE event pump stopped");
    });
    Ok(())
}

struct BtleLink {
    peripheral: Peripheral,
    command_char: Characteristic,
    data_char: Characteristic,
    name: String,
    events: broadcast::Sender<LinkEvent>,
}

#[async_trait]
impl GattLink for BtleLink {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    async fn write_command(&self, payload: &[u8]) -> Result<(), ReaderError> {
        self.peripheral
            .write(&self.command_char, payload, WriteType::WithResponse)
            .await
            .map_err(|_| ReaderError::ConnectionLost)
    }

    async fn read_data(&self) -> Result<Vec<u8>, ReaderError> {
        self.peripheral
            .read(&self.data_char)
            .await
            .map_err(|_| ReaderError::ConnectionLost)
    }

    async fn close(&self) {
        let _ = self.peripheral.disconnect().await;
    }
}

fn resolve_char(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic, ReaderError> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or_else(|| {
            ReaderError::Connect(format!("bridge is missing GATT characteristic {uuid}"))
        })
}

fn connect_err(e: btleplug::Error) -> ReaderError {
    ReaderError::Connect(e.to_string())
}
