use std::{path::Path, sync::Arc, time::Duration};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use flareproxy::{
    HttpClientAdapter, HttpHandler, HttpSolverAdapter, ProxyService,
    config::{ServerConfig, ServerConfigValidator, load_config},
    ports::{http_client::HttpClient, solver::SolveDelegate},
    tracing_setup,
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Configuration file; defaults and FLAREPROXY_* variables apply without one
    #[clap(short, long)]
    config: Option<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration
    Validate {
        /// Configuration file to validate
        #[clap(short, long)]
        config: Option<String>,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Start the proxy server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(config.as_deref()).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve(config.as_deref()).await,
        None => serve(args.config.as_deref()).await,
    }
}

async fn serve(config_path: Option<&str>) -> Result<()> {
    let config: ServerConfig = load_config(config_path).await.with_context(|| {
        format!(
            "Failed to load configuration from {}",
            config_path.unwrap_or("defaults and environment")
        )
    })?;
    ServerConfigValidator::validate(&config).map_err(|e| eyre!("Invalid configuration: {e}"))?;

    tracing_setup::init_tracing_with_config(&config.logging.level, config.logging.json)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    let provider = rustls::crypto::aws_lc_rs::default_provider();
    if let Err(e) = rustls::crypto::CryptoProvider::install_default(provider) {
        tracing::warn!(
            "CryptoProvider::install_default for aws-lc-rs reported an error: {:?}. \
            A provider was probably installed already.",
            e
        );
    }

    tracing::info!("Upstream: {}", config.proxy.upstream);

    let http_client: Arc<dyn HttpClient> = Arc::new(
        HttpClientAdapter::new(Duration::from_millis(config.proxy.max_timeout_ms))
            .context("Failed to create HTTP client adapter")?,
    );
    let solver: Arc<dyn SolveDelegate> = Arc::new(
        HttpSolverAdapter::new(&config.solver).context("Failed to create solver adapter")?,
    );

    let proxy_service = Arc::new(ProxyService::new(
        Arc::new(config.proxy.clone()),
        http_client,
        solver.clone(),
    ));
    let app = Arc::new(HttpHandler::new(proxy_service, solver)).router();

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        signal_handler_shutdown.run_signal_handler().await;
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;
    tracing::info!("flareproxy server starting on {}", config.listen_addr);

    let shutdown = graceful_shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.wait_for_shutdown_signal().await;
        })
        .await
        .context("Server error")?;

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

async fn validate_config_command(config_path: Option<&str>) -> Result<()> {
    let source = config_path.unwrap_or("defaults and environment");
    println!("🔍 Validating configuration: {source}");

    if let Some(path) = config_path.filter(|path| !Path::new(path).exists()) {
        eprintln!("❌ Error: Configuration file '{path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Proxy Prefix: {}", config.proxy.prefix);
            println!("   • Upstream: {}", config.proxy.upstream);
            println!("   • Solver: {}", config.solver.url);
            println!("   • Max Timeout: {} ms", config.proxy.max_timeout_ms);
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure upstream and solver URLs start with http:// or https://");
            println!("   • Start the prefix with '/' and drop any trailing '/'");
            println!("   • Verify listen address format (e.g., '0.0.0.0:8080')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# flareproxy configuration
# Every key may be overridden from the environment, e.g.
#   FLAREPROXY_LISTEN_ADDR=127.0.0.1:9000
#   FLAREPROXY_PROXY__UPSTREAM=https://example.com/api

# The address to listen on
listen_addr = "0.0.0.0:8080"

[proxy]
# Requests under this prefix are proxied; the rest of the path is appended to upstream
prefix = "/backend-api"
upstream = "https://chat.openai.com/backend-api"
# Upstream request timeout, also sent to the solver as maxTimeout
max_timeout_ms = 30000

[solver]
# FlareSolverr-compatible endpoint used when the upstream answers 403
url = "http://127.0.0.1:8191/v1"
# Extra time granted to the solver call on top of max_timeout_ms
timeout_grace_ms = 10000

[logging]
level = "info"
json = true
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'flareproxy serve --config {config_path}' to start the server");
    Ok(())
}
