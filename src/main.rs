use bridge_gateway::config::config_search_paths;
use bridge_gateway::{build_router, AppState, GatewayConfig, SharedLogger};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "bridge-gateway",
    about = "OpenAI-compatible gateway in front of the bridge completions backend",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Exchange log file path
    #[arg(long, default_value = "bridge-gateway.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bridge_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = GatewayConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env()?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }

    let logger = SharedLogger::new(&cli.log_file)?;

    info!("bridge-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("  Bridge:        {}", config.completions_url());
    info!("  Bridge model:  {}", config.bridge.model);
    info!("  Public model:  {}", config.model_name);
    info!(
        "  Default key:   {}",
        if config.default_api_key().is_some() { "configured" } else { "none" }
    );
    info!("  Log file:      {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting bridge-gateway bridge={} port={}",
            config.completions_url(),
            config.port
        ),
    );

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, logger)?);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
