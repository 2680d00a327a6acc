//! Pine: select a screen region, get its text on the clipboard. Recognition runs locally
//! with Tesseract; the only network access is a one-time trained-data download.

mod action_socket;
pub mod actions;
pub mod config;
pub mod delivery;
pub mod models;
mod paths;
pub mod pipeline;
pub mod preprocess;
pub mod system;

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

pub use action_socket::send_action_to_running_instance;
pub use pipeline::{PipelineController, PipelineState, RunOutcome};

use crate::models::LanguageModelProvider;

/// `RUST_LOG` wins; otherwise the log level from the config file.
fn init_logging() {
    let level = config::load_log_level();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter())),
        )
        .init();
}

fn build_controller() -> PipelineController {
    let config = match config::load_pipeline_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to resolve configuration");
            std::process::exit(1);
        }
    };

    match PipelineController::with_system(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!(error = %e, "Failed to set up the capture pipeline");
            std::process::exit(1);
        }
    }
}

/// Starts the resident instance: waits on the action socket and runs the pipeline for
/// every `select-text` action.
pub fn run() {
    init_logging();
    let controller = Arc::new(build_controller());
    info!(language = %controller.config().language, "Pine started");

    if let Err(e) = action_socket::serve_action_socket(controller) {
        error!(error = %e, "Action socket stopped");
        std::process::exit(1);
    }
}

/// Runs a single capture in this process and returns when it has been delivered.
///
/// The action socket is held for the whole run, so a trigger that arrives from another
/// process meanwhile is dropped like any busy trigger.
pub fn run_once() -> RunOutcome {
    init_logging();
    let _claim = match action_socket::claim_action_socket() {
        Ok(claim) => Some(claim),
        Err(action_socket::SocketError::InUse(path)) => {
            info!(path = %path.display(), "Another Pine process is running, ignoring trigger");
            return RunOutcome::Ignored;
        }
        Err(action_socket::SocketError::Unsupported) => {
            debug!("No action socket on this platform, running unguarded");
            None
        }
        Err(e) => {
            warn!(error = %e, "Could not claim action socket, running unguarded");
            None
        }
    };

    let controller = build_controller();
    let outcome = controller.run();
    info!(?outcome, "Select Text finished");
    outcome
}

/// Performs `action` in this process; used when no resident instance is listening.
pub fn run_action_locally(action: &str) -> Result<RunOutcome, String> {
    match actions::parse_app_action(action) {
        Some(actions::AppAction::SelectText) => Ok(run_once()),
        None => Err(format!("unknown action: {}", action.trim())),
    }
}

/// Language codes with trained data installed in the configured model directory.
pub fn installed_languages() -> Result<Vec<String>, String> {
    let config = config::load_pipeline_config().map_err(|e| e.to_string())?;
    let provider = LanguageModelProvider::new(&config).map_err(|e| e.to_string())?;
    Ok(provider.installed_languages())
}
