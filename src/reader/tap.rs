//! Transport selector and tap control.
//!
//! The rest of the console only ever sees one logical operation, a tap,
//! regardless of transport. The control dispatches on the operator's
//! persisted transport preference, owns the single BLE session, and
//! serializes tap gestures so the mode cannot flip mid-operation.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::card::CardId;
use crate::prefs::{PreferenceStore, PrefsError};

use super::ble::{BleReader, LinkConnector, SessionInfo};
use super::error::ReaderError;
use super::local::{LocalReader, LocalStatus};
use super::{CardReader, TapReading};

/// Preference key the chosen transport is stored under.
const MODE_KEY: &str = "reader.mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Local,
    Bluetooth,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Bluetooth => "bluetooth",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "bluetooth" => Ok(Self::Bluetooth),
            _ => Err(()),
        }
    }
}

pub struct TapControl {
    local: LocalReader,
    ble: BleReader,
    connector: Arc<dyn LinkConnector>,
    prefs: Arc<dyn PreferenceStore>,
    mode: RwLock<TransportMode>,
    // One tap gesture at a time, across both transports. Also blocks a
    // mode switch while an operation is outstanding.
    gesture: tokio::sync::Mutex<()>,
}

impl TapControl {
    /// Builds the control, re-reading the persisted transport mode. An
    /// unknown or missing stored value falls back to the local reader.
    pub async fn new(
        local: LocalReader,
        ble: BleReader,
        connector: Arc<dyn LinkConnector>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Result<Self, PrefsError> {
        let mode = prefs
            .get(MODE_KEY)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(TransportMode::Local);
        Ok(Self {
            local,
            ble,
            connector,
            prefs,
            mode: RwLock::new(mode),
            gesture: tokio::sync::Mutex::new(()),
        })
    }

    pub fn mode(&self) -> TransportMode {
        *self.mode.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Switches transport and persists the choice. Refused while a tap is
    /// outstanding.
    pub async fn set_mode(&self, mode: TransportMode) -> Result<(), ReaderError> {
        let _guard = self.gesture.try_lock().map_err(|_| ReaderError::Busy)?;
        *self.mode.write().unwrap_or_else(|e| e.into_inner()) = mode;
        self.prefs
            .set(MODE_KEY, mode.as_str())
            .await
            .map_err(|e| ReaderError::Prefs(e.to_string()))?;
        tracing::info!(mode = %mode, "reader transport mode changed");
        Ok(())
    }

    /// Explicit operator action: scan for and pair with the BLE bridge.
    pub async fn connect_ble(&self) -> Result<String, ReaderError> {
        self.ble.connect(self.connector.as_ref()).await
    }

    pub async fn disconnect_ble(&self) {
        self.ble.disconnect().await;
    }

    pub fn ble_session(&self) -> SessionInfo {
        self.ble.session_info()
    }

    pub async fn local_status(&self) -> Result<LocalStatus, ReaderError> {
        self.local.status().await
    }

    pub async fn format_card(&self, timeout_secs: Option<u64>) -> Result<(), ReaderError> {
        let _guard = self.gesture.try_lock().map_err(|_| ReaderError::Busy)?;
        match self.mode() {
            TransportMode::Local => self.local.format(timeout_secs).await,
            TransportMode::Bluetooth => self.ble.format(timeout_secs).await,
        }
    }
}

#[async_trait]
impl CardReader for TapControl {
    async fn tap(&self, timeout_secs: Option<u64>) -> Result<TapReading, ReaderError> {
        let _guard = self.gesture.try_lock().map_err(|_| ReaderError::Busy)?;
        match self.mode() {
            TransportMode::Local => self.local.read(timeout_secs).await,
            TransportMode::Bluetooth => self.ble.read(timeout_secs).await,
        }
    }

    async fn write_card(
        &self,
        card: &CardId,
        timeout_secs: Option<u64>,
    ) -> Result<(), ReaderError> {
        let _guard = self.gesture.try_lock().map_err(|_| ReaderError::Busy)?;
        match self.mode() {
            TransportMode::Local => self.local.write(card, timeout_secs).await,
            TransportMode::Bluetooth => self.ble.write(card, timeout_secs).await,
        }
    }
}
