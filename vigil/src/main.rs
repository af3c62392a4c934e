use std::{path::PathBuf, sync::Arc};
use tracing::info;
use vigil::{
    config::{BackendConfig, Config},
    service::RiskService,
};
use vigil_broker::rest::{RestGateway, RestGatewayConfig};
use vigil_risk::{engine::RiskEngine, fx::FxCache};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("VIGIL_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("vigil.json"));

    let config = Config::load(&config_path)?;
    info!(path = %config_path.display(), accounts = config.accounts.len(), "configuration loaded");

    let fx = Arc::new(FxCache::new(config.base_currency.clone(), config.fx_url.clone()));
    let engine = RiskEngine::new(
        config.base_currency.clone(),
        config.unprotected_loss_percentage,
        fx,
    );

    match config.backend {
        BackendConfig::Rest {
            base_url,
            session_cookie,
        } => {
            let gateway = RestGateway::new(RestGatewayConfig::new(
                base_url,
                session_cookie,
                config.accounts.clone(),
            ))?;
            let service = RiskService::new(gateway, engine);

            let report = service.calculate_worst_case().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        BackendConfig::Socket { host, port, .. } => {
            // The socket wire codec is an embedding concern; this binary only ships
            // the REST wiring. See vigil_broker::socket::TwsGateway for the library
            // entry point a codec plugs into.
            Err(format!(
                "socket backend ({host}:{port}) is library-only; embed vigil_broker::socket::TwsGateway with a wire codec"
            )
            .into())
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
}
