use std::sync::Arc;
use std::time::Duration;

use hospital_os::{
    config::Config,
    gateway::{MessagingGateway, OtpRelay},
    otp::OtpService,
    prefs::FilePrefs,
    reader::{
        TapControl,
        ble::{BleReader, BtleConnector},
        local::LocalReader,
    },
    registry::{AdminDirectory, MemoryRegistry, PatientDirectory, RestRegistry},
    resolve::ResolutionFlow,
    server::{AppState, Server, ServerConfig},
    telemetry,
};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let http = reqwest::Client::new();

    let local = LocalReader::new(
        http.clone(),
        config.reader.base_url.clone(),
        config.reader.timeout_secs,
    );
    let ble = BleReader::new(Duration::from_secs(config.ble.operation_timeout_secs));
    let connector = Arc::new(BtleConnector::new(
        Duration::from_secs(config.ble.scan_secs),
        config.ble.device_name.clone(),
    ));
    let prefs = Arc::new(FilePrefs::new(&config.prefs.path));

    let tap = Arc::new(TapControl::new(local, ble, connector, prefs).await?);

    let (patients, admins): (Arc<dyn PatientDirectory>, Arc<dyn AdminDirectory>) =
        match &config.registry {
            Some(registry) => {
                let rest = Arc::new(RestRegistry::new(
                    http.clone(),
                    registry.base_url.clone(),
                    registry.api_key.clone(),
                ));
                (Arc::clone(&rest) as _, rest as _)
            }
            None => {
                tracing::warn!("no registry configured, using the in-memory registry");
                let memory = Arc::new(MemoryRegistry::default());
                (Arc::clone(&memory) as _, memory as _)
            }
        };

    let flow = Arc::new(ResolutionFlow::new(
        Arc::clone(&tap) as _,
        Arc::clone(&patients),
    ));

    let (otp, gateway) = match &config.gateway {
        Some(gw) => {
            let relay = Arc::new(OtpRelay::new(http.clone(), gw.otp_relay_url.clone()));
            let otp = Arc::new(OtpService::new(relay as _, Arc::clone(&admins)));
            let gateway = Arc::new(MessagingGateway::new(
                http.clone(),
                gw.base_url.clone(),
                gw.session.clone(),
                gw.secret_key.clone(),
            ));
            (Some(otp), Some(gateway))
        }
        None => {
            tracing::warn!("no messaging gateway configured, OTP login disabled");
            (None, None)
        }
    };

    let state = AppState {
        tap,
        flow,
        patients,
        otp,
        gateway,
    };

    let server_config = ServerConfig {
        host: &config.server.host,
        port: config.server.port,
    };
    let server = Server::new(state, server_config).await?;
    server.run().await
}
