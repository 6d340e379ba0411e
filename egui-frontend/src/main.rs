use eframe::egui;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod ui;

use ui::{BackendMode, ChargeSlotApp};

fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mode = if std::env::args().skip(1).any(|arg| arg == "--offline") {
        BackendMode::Offline
    } else {
        BackendMode::Remote
    };
    info!("Starting charge slot calendar ({:?} backend)", mode);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 520.0])
            .with_min_inner_size([760.0, 400.0])
            .with_title("Evening Charging Reservations")
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "Evening Charging Reservations",
        options,
        Box::new(move |cc| match ChargeSlotApp::new(cc, mode) {
            Ok(app) => {
                info!("Charge slot calendar initialized");
                Ok(Box::new(app))
            }
            Err(e) => {
                error!("Failed to initialize app: {:#}", e);
                Err(format!("Failed to initialize app: {:#}", e).into())
            }
        }),
    )
}
