//! Dual-transport NFC card reader.
//!
//! A card tap at a hospital desk reaches the server through one of two
//! transports: the local USB/serial reader service on the same machine
//! (`local`), or a battery-powered Bluetooth Low-Energy bridge (`ble`).
//! `tap` composes the two behind a single control that dispatches on the
//! operator's persisted transport preference.

pub mod ble;
pub mod error;
pub mod local;
pub mod protocol;
pub mod tap;

use async_trait::async_trait;

use crate::card::CardId;

pub use error::ReaderError;
pub use protocol::{ReaderCommand, ReaderStatus};
pub use tap::{TapControl, TransportMode};

/// Outcome of one successful tap gesture.
///
/// A blank card is a valid reading, not a failure; callers that conflate
/// the two break the registration flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapReading {
    /// The card carries this identifier.
    Card(CardId),
    /// The card is formatted but carries no identifier yet.
    Blank,
}

/// Port the patient resolution flow drives. Implemented by [`TapControl`]
/// and by scripted readers in tests.
#[async_trait]
pub trait CardReader: Send + Sync + 'static {
    /// Reads the card presented to the active transport.
    async fn tap(&self, timeout_secs: Option<u64>) -> Result<TapReading, ReaderError>;

    /// Writes an identifier onto the card presented to the active transport.
    async fn write_card(
        &self,
        card: &CardId,
        timeout_secs: Option<u64>,
    ) -> Result<(), ReaderError>;
}
