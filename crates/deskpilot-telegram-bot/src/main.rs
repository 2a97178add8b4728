mod desktop;
mod logging;

use deskpilot_core::commands::CommandContext;
use deskpilot_core::dispatcher::Dispatcher;
use deskpilot_transport_telegram::config::BotSettings;
use deskpilot_transport_telegram::runner::run_bot;
use desktop::X11Desktop;
use dotenvy::dotenv;
use logging::{init_logging, TokenRedactor};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // The redactor must exist before the first log line
    let redactor = Arc::new(TokenRedactor::new().map_err(|e| {
        eprintln!("Failed to compile token pattern: {e}");
        e
    })?);
    init_logging(redactor);

    info!("Starting Deskpilot...");

    let settings = init_settings();
    let controller = Arc::new(init_controller(&settings));

    run_bot(settings, controller).await;

    info!("Deskpilot stopped.");
    Ok(())
}

fn init_settings() -> Arc<BotSettings> {
    let settings = match BotSettings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if settings.controller.allowed_user_id == 0 {
        warn!("ALLOWED_USER_ID is not set; every request will be denied");
    }
    info!(
        git_dir = %settings.controller.initial_git_dir().display(),
        project_dir = ?settings.controller.project_dir,
        "Configuration loaded successfully."
    );
    Arc::new(settings)
}

fn init_controller(settings: &BotSettings) -> Dispatcher {
    let desktop = Arc::new(X11Desktop::new(&settings.controller));
    let context = CommandContext::new(
        Arc::clone(&settings.controller),
        desktop.clone(),
        desktop.clone(),
        desktop,
    );
    Dispatcher::from_context(context)
}
