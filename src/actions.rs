//! User-triggered actions.
//!
//! Invoked by the action socket (desktop hotkeys bound to `pine action select-text`) and by
//! the command line. "Select Text" runs the pipeline on its own thread so the caller returns
//! at once; a second trigger while a run is in flight reaches the controller and is ignored.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::pipeline::{PipelineController, RunOutcome};

/// Action that can be triggered from outside the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    SelectText,
}

/// Parses the action names accepted on the socket and command line.
pub fn parse_app_action(raw: &str) -> Option<AppAction> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "select-text" | "select_text" | "select" => Some(AppAction::SelectText),
        _ => None,
    }
}

/// Runs the given action in the background. `source` is only used for logging.
pub fn execute_action(
    controller: &Arc<PipelineController>,
    action: AppAction,
    source: &'static str,
) -> Option<std::thread::JoinHandle<RunOutcome>> {
    match action {
        AppAction::SelectText => {
            let controller = Arc::clone(controller);
            let spawned = std::thread::Builder::new()
                .name("pine-pipeline".to_string())
                .spawn(move || {
                    let outcome = controller.run();
                    debug!(source, ?outcome, "Select Text finished");
                    outcome
                });

            match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(source, error = %e, "Select Text: failed to spawn pipeline thread");
                    None
                }
            }
        }
    }
}
