use std::collections::HashMap;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub reader: ReaderConfig,
    pub ble: BleConfig,
    pub prefs: PrefsConfig,
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Local USB/serial reader service on this machine.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    pub base_url: String,
    /// Scan window passed to the reader service, in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BleConfig {
    /// How long one command may wait for a status notification. Longer than
    /// the local timeout because the bridge has its own scan window on top
    /// of BLE latency.
    pub operation_timeout_secs: u64,
    /// How long a connect attempt scans before picking a device.
    pub scan_secs: u64,
    /// If set, only a bridge advertising this local name is accepted.
    #[serde(default)]
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrefsConfig {
    /// File backing the operator preferences (transport mode).
    pub path: String,
}

/// PostgREST-dialect patient registry. When absent the server runs on the
/// in-memory registry, which is only useful for development and tests.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub base_url: String,
    pub api_key: SecretString,
}

/// wppconnect-style messaging gateway plus the plain OTP relay service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub session: String,
    pub secret_key: SecretString,
    pub otp_relay_url: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("server.host", "localhost")?
            .set_default("server.port", 3000)?
            .set_default("reader.base_url", "http://localhost:5532")?
            .set_default("reader.timeout_secs", 30)?
            .set_default("ble.operation_timeout_secs", 35)?
            .set_default("ble.scan_secs", 5)?
            .set_default("prefs.path", "config/prefs.json")?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Use system environment variables
            // Should be in the format APP_SERVER__HOST or APP_GATEWAY__SECRET_KEY
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
