use std::net::TcpListener;

use auth_service::configuration::get_configuration;
use auth_service::startup::{build_from_settings, run};
use auth_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!(
                environment = ?config.application.environment,
                backend = ?config.database.backend,
                "Configuration loaded successfully"
            );
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let service = build_from_settings(&configuration).await.map_err(|e| {
        tracing::error!("Failed to initialise auth service: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Startup error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, service)?.await
}
