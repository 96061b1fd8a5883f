//! wxcache CLI entry point.

mod cli;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use cli::{Cli, Commands};
use wxcache_core::config::API_KEY_ENV;
use wxcache_core::Config;
use wxcache_weather::{
    CacheEvent, FilePreferences, FileStore, FreshnessCache, OpenWeatherMapProvider, ResolvedFrom,
    TcpProbe, WeatherDocument, WeatherError,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    wxcache_core::init();

    let cache = match build_cache(cli.config.as_deref()) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    match run(&cache, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Command failed: {}", e);
            eprintln!("{}", e.user_message());
            ExitCode::from(report::exit_code(&e))
        }
    }
}

/// Wire the cache to the configured directories, provider and probe.
fn build_cache(config_path: Option<&Path>) -> Result<FreshnessCache> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    let (config, _) = Config::load_validated(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    let api_key = config.weather.resolved_api_key().unwrap_or_else(|| {
        tracing::warn!(
            "No API key configured; set weather.api_key in {} or {}",
            path.display(),
            API_KEY_ENV
        );
        String::new()
    });

    let provider = OpenWeatherMapProvider::new(
        config.weather.api_base_url.as_str(),
        api_key,
        Duration::from_secs(config.weather.request_timeout_secs),
    )
    .context("Failed to create HTTP client")?;

    let probe = TcpProbe::new(
        config.network.probe_address.as_str(),
        Duration::from_millis(config.network.probe_timeout_ms),
    );

    Ok(FreshnessCache::new(
        Arc::new(FileStore::new(config.storage.cache_dir.clone())),
        Arc::new(FilePreferences::new(config.storage.preferences_path.clone())),
        Arc::new(provider),
        Arc::new(probe),
    )
    .with_freshness(Duration::from_secs(config.weather.freshness_secs)))
}

async fn run(cache: &FreshnessCache, command: Commands) -> Result<(), WeatherError> {
    let mut events = cache.subscribe();

    match command {
        Commands::Show { query, refresh } => {
            let document = match query {
                Some(query) => Some(cache.resolve(&query, refresh).await?),
                None if refresh => cache.refresh_current().await?,
                None => cache.resolve_current().await?,
            };
            match document {
                Some(document) => print_document(cache, &document, &mut events)?,
                None => println!("No current location. Run `wxcache show <CITY>` first."),
            }
        }
        Commands::Units { value } => {
            let refreshed = cache.change_units(&value).await?;
            println!("Units set to {}", cache.units().get()?);
            if let Some(document) = refreshed {
                print_document(cache, &document, &mut events)?;
            }
        }
        Commands::Clear => {
            let deleted = cache.clear_local_data().await?;
            println!("Deleted {} stored forecasts", deleted);
        }
    }

    Ok(())
}

fn print_document(
    cache: &FreshnessCache,
    document: &WeatherDocument,
    events: &mut tokio::sync::broadcast::Receiver<CacheEvent>,
) -> Result<(), WeatherError> {
    let offline = std::iter::from_fn(|| events.try_recv().ok()).any(|event| {
        matches!(
            event,
            CacheEvent::Resolved {
                source: ResolvedFrom::StaleOffline,
                ..
            }
        )
    });

    println!("{}", report::summary(document, cache.units().get()?));
    if offline {
        println!("(no network connection, showing a saved forecast)");
    }
    Ok(())
}
