// ChoirLoop - choir practice backend
// Main library entry point

pub mod api;
pub mod config;
pub mod deeplink;
pub mod midi;
pub mod playback;
pub mod song;
pub mod voices;

use std::path::PathBuf;

/// Command-line overrides for the config file
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl CliArgs {
    /// Accepts `--config <path>` and `--data-dir <path>`; anything else is ignored
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Self {
        let mut out = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => out.config_path = args.next().map(PathBuf::from),
                "--data-dir" => out.data_dir = args.next().map(PathBuf::from),
                _ => {}
            }
        }
        out
    }
}

/// Load config, open the song store and serve the HTTP API until shutdown
pub fn run(args: CliArgs) -> anyhow::Result<()> {
    env_logger::init();

    let config_path = args.config_path.unwrap_or_else(config::get_config_path);
    let mut config = config::Config::load_or_default(&config_path);
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    log::info!("Using data folder {:?}", config.data_dir);

    let store = song::SongStore::open(&config.data_dir)?;
    // The index is derived data; rebuild it in case folders changed while offline
    if let Err(e) = store.rescan() {
        log::warn!("Failed to rescan songs: {}", e);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config, store))
}

async fn serve(config: config::Config, store: song::SongStore) -> anyhow::Result<()> {
    let addr = config.listen_addr();
    let app = api::router(api::AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("ChoirLoop API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
            log::info!("Shutting down");
        })
        .await?;
    Ok(())
}
