mod app;

use app::StockUploader;
use eframe::CreationContext;
use stock_uploader::config::{ConfigError, Settings};
use stock_uploader::logging::init_tracing;
use tracing::{info, warn};

fn load_settings() -> (Settings, Option<ConfigError>) {
    let loaded = match Settings::default_path() {
        Some(path) => Settings::load_or_create(&path),
        None => Ok(Settings::default()),
    };
    let (mut settings, err) = match loaded {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };
    settings.apply_env_overrides();
    (settings, err)
}

fn main() -> eframe::Result<()> {
    let (settings, config_error) = load_settings();
    init_tracing(&settings.logging.level);
    if let Some(e) = config_error {
        warn!(error = %e, "Using default settings");
    }
    info!(api = %settings.api.base_url, "Starting Stock Uploader");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([760.0, 720.0])
            .with_min_inner_size([560.0, 520.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Stock Uploader",
        options,
        Box::new(move |cc: &CreationContext| Box::new(StockUploader::new(cc, settings))),
    )
}
