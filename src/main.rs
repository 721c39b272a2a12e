// Declare the modules
mod annotate;
mod command;
mod config;
mod detection;
mod model;
mod pipeline;
mod scheduler;
mod session;
mod source;
mod surface;
mod ui;
mod video_reader;

use clap::Parser;
use eframe::egui;
use session::Session;
use ui::DetectionApp;
use video_reader::OpenCvOpener;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match config::Args::parse().into_config() {
        Ok(config) => config,
        Err(msg) => {
            log::error!("Invalid configuration: {}", msg);
            std::process::exit(2);
        }
    };
    log::info!(
        "Loading models from {}, stream URL {}",
        config.detector.model_dir.display(),
        config.session.stream_url
    );

    let session = Session::new(
        config.session,
        Box::new(OpenCvOpener),
        Box::new(config.detector),
    );

    // Configure the application's native options, like window size
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Object Detection Demo",
        options,
        Box::new(|_cc| Ok(Box::new(DetectionApp::new(session)))),
    )
}
