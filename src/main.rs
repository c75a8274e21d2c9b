use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use company_logo_cache::{
    client::{HttpSettingsClient, StaticTokenProvider, StoredTokenProvider, TokenProvider},
    utils::UrlUtils,
    config::Config,
    models::{CachedLogoRecord, LogoState},
    services::logo_cache::{ImageReencoder, LogoCacheController},
    storage::{FileKeyValueStore, KeyValueStore, PersistentLogoStore},
};

#[derive(Parser)]
#[command(name = "logo-cache")]
#[command(version)]
#[command(about = "Persistent company logo cache")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "logo-cache.toml")]
    config: String,

    /// Bearer token; falls back to the stored `auth_token` key
    #[arg(short, long, env = "LOGO_CACHE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve from cache when valid, otherwise fetch; prints the settled state
    Show,
    /// Fetch settings and logo from the server and update the cache
    Refresh,
    /// Delete the cached record
    Clear,
    /// Print the stored record without touching the network
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("company_logo_cache={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    let backend: Arc<dyn KeyValueStore> =
        Arc::new(FileKeyValueStore::new(config.storage.path.clone()));
    let tokens: Arc<dyn TokenProvider> = match cli.token {
        Some(token) => Arc::new(StaticTokenProvider::new(token)),
        None => Arc::new(StoredTokenProvider::new(backend.clone())),
    };

    let cache_config = config.cache.to_cache_config();
    let store = PersistentLogoStore::new(backend, cache_config.storage_key.clone());
    let client = Arc::new(
        HttpSettingsClient::new(&config.api, tokens)?
            .with_max_body_bytes(config.reencode.max_input_bytes),
    );
    info!(
        "Using settings API: {}",
        UrlUtils::obfuscate_credentials(client.api_base())
    );

    let controller = LogoCacheController::builder(client.clone(), client, store)
        .reencoder(ImageReencoder::new(config.reencode.to_reencode_config()))
        .config(cache_config)
        .build();

    let output = match cli.command {
        Command::Show => {
            controller.initialize().await;
            // A background verification may still replace the cached logo
            controller.join_background_tasks().await;
            let state = controller.state();
            json!({
                "state": describe_state(&state),
                "record": controller.stored_record().await.as_ref().map(describe_record),
            })
        }
        Command::Refresh => {
            let state = controller.refetch_logo().await;
            json!({ "state": describe_state(&state) })
        }
        Command::Clear => {
            let state = controller.clear_cache().await;
            info!("Logo cache cleared");
            json!({ "state": describe_state(&state) })
        }
        Command::Status => json!({
            "record": controller.stored_record().await.as_ref().map(describe_record),
        }),
    };

    controller.dispose();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn describe_state(state: &LogoState) -> serde_json::Value {
    json!({
        "phase": format!("{:?}", state.phase()),
        "loading": state.loading,
        "error": state.error,
        "mimeType": state.logo_url.as_ref().map(|image| image.mime_type().to_string()),
        "encodedLength": state.logo_url.as_ref().map(|image| image.encoded_len()),
    })
}

fn describe_record(record: &CachedLogoRecord) -> serde_json::Value {
    json!({
        "contentFingerprint": record.content_fingerprint,
        "fetchedAtMillis": record.fetched_at_millis,
        "settingsSnapshot": record.settings_snapshot,
        "hasImage": record.encoded_image.is_some(),
        "encodedLength": record.encoded_image.as_ref().map(|image| image.encoded_len()),
    })
}
