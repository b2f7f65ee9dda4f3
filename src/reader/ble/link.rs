//! Transport seam between the correlation protocol and the GATT stack.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::{Uuid, uuid};

use crate::reader::error::ReaderError;

/// GATT profile of the bridge. The UUIDs are the device contract and must
/// match the firmware exactly.
pub const SERVICE_UUID: Uuid = uuid!("12345678-1234-5678-1234-56789abcdef0");
/// Readable, notifies. Holds the last-read card payload as NUL-padded UTF-8.
pub const DATA_UUID: Uuid = uuid!("12345678-1234-5678-1234-56789abcdef1");
/// Writable. Accepts `READ`, `WRITE:<identifier>`, `FORMAT`.
pub const COMMAND_UUID: Uuid = uuid!("12345678-1234-5678-1234-56789abcdef2");
/// Readable, notifies. Holds `waiting`, `success`, or `error:<reason>`.
pub const STATUS_UUID: Uuid = uuid!("12345678-1234-5678-1234-56789abcdef3");

/// Something the link pushed at us.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// New raw value of the status characteristic.
    Status(Vec<u8>),
    /// The GATT link dropped (remote powered off, out of range, or a local
    /// disconnect call).
    Disconnected,
}

/// One established GATT connection to a bridge, with the three
/// characteristics resolved and notifications enabled.
#[async_trait]
pub trait GattLink: Send + Sync + 'static {
    /// Advertised name of the connected bridge.
    fn device_name(&self) -> &str;

    /// Subscribes to link events. The receiver must be obtained *before*
    /// the command is written, otherwise a fast reply can slip past the
    /// listener. Dropping the receiver releases the subscription.
    fn events(&self) -> broadcast::Receiver<LinkEvent>;

    /// Writes a raw command payload to the command characteristic.
    async fn write_command(&self, payload: &[u8]) -> Result<(), ReaderError>;

    /// Reads the current value of the data characteristic.
    async fn read_data(&self) -> Result<Vec<u8>, ReaderError>;

    /// Severs the GATT connection. Best effort.
    async fn close(&self);
}

/// Establishes a new [`GattLink`]. Connecting scans for hardware and is
/// only ever triggered by an explicit operator action.
#[async_trait]
pub trait LinkConnector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn GattLink>, ReaderError>;
}
