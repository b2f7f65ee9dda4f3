//! Client for the Bluetooth Low-Energy NFC bridge.
//!
//! The bridge is a battery-powered remote reader exposing a three-
//! characteristic GATT profile: a data mailbox, a command inbox, and a
//! status mailbox driven by notifications. `link` defines the transport
//! seam, `btle` backs it with btleplug, and `client` runs the
//! command/status correlation protocol over it.

mod btle;
mod client;
mod link;

pub use btle::BtleConnector;
pub use client::{BleReader, ConnectionState, SessionInfo};
pub use link::{
    COMMAND_UUID, DATA_UUID, GattLink, LinkConnector, LinkEvent, SERVICE_UUID, STATUS_UUID,
};
