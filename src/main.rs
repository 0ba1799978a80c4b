mod app;
mod config;
mod error;
mod event;
mod gemini;
mod imaging;
mod studio;
mod theme;

use app::HomeCanvasApp;
use eframe::egui;
use gemini::GeminiClient;
use std::sync::mpsc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("homecanvas-runtime")
        .build()?;

    let gemini = GeminiClient::new(runtime.handle().clone(), tx.clone());
    gemini.start();

    let app = HomeCanvasApp::new(rx, gemini);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([1024.0, 640.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "HomeCanvas",
        native_options,
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            app.theme().apply_visuals(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}
