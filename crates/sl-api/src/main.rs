use sl_api::server::{ApiServer, ApiServerConfig};
use sl_api::state::AppState;
use sl_core::telemetry::{init_telemetry_with_config, TelemetryConfig};
use sl_core::{is_production_environment, LogConfig};

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let telemetry = if is_production_environment() {
        TelemetryConfig::production()
    } else {
        TelemetryConfig::development()
    };
    init_telemetry_with_config(telemetry);

    let state = AppState::new(LogConfig::from_env());
    let server = ApiServer::new(state, ApiServerConfig::from_env());
    server.run().await
}
