mod api;
mod app;
mod config;
mod model;
mod util;

use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use tracing::{Level, info};

use crate::api::{GraphApi, HttpApi};
use crate::config::{AppConfig, Args};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(false)
        .init();

    let config = AppConfig::from_args(&args);
    info!(api = %config.api.base_url, "starting knowledge mapper");
    let api: Arc<dyn GraphApi> = Arc::new(HttpApi::new(&config.api));

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "SECI Knowledge Mapper",
        options,
        Box::new(move |cc| Ok(Box::new(app::MapperApp::new(cc, config, api)))),
    )
    .map_err(|error| anyhow!("window closed with an error: {error}"))
}
