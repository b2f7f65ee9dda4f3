pub mod card;
pub mod config;
pub mod gateway;
pub mod otp;
pub mod prefs;
pub mod reader;
pub mod registry;
pub mod resolve;
pub mod server;
pub mod telemetry;
