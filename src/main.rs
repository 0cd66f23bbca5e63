use anyhow::{Context, Result};
use soap_note_server::{config, server};
use tracing::info;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Builds the log filter from `RUST_LOG` when set, else from the configured level.
///
/// Whichever source wins is validated; a malformed value is an error rather
/// than a silent fallback.
fn log_filter(configured_level: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    match rust_log {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid RUST_LOG filter: '{}'", directives)),
        None => {
            let level = configured_level.parse::<LevelFilter>().map_err(|_| {
                anyhow::anyhow!(
                    "Invalid log level: '{}'. Valid levels: error, warn, info, debug, trace",
                    configured_level
                )
            })?;
            Ok(EnvFilter::default().add_directive(level.into()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging is configured from the loaded file, so errors here go to stderr
    let config = match config::load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = match log_filter(&config.server.logs.level, rust_log.as_deref()) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!(
        "Starting SOAP note server with model '{}' (adapter: {}), log filter from {}",
        config.model.base_model,
        config.model.adapter.as_deref().unwrap_or("none"),
        if rust_log.is_some() { "RUST_LOG" } else { "config" }
    );

    if let Err(e) = server::run(config).await {
        tracing::error!("Server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
