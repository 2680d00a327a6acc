//! Unix domain socket used for single-instance action dispatch.
//!
//! A desktop hotkey bound to `pine action select-text` starts a short-lived process that
//! connects to the resident instance through this socket and sends the action string instead
//! of capturing on its own. The path is chosen in order: `XDG_RUNTIME_DIR`, then
//! `/run/user/{uid}`, then `/tmp/pine-{uid}.sock`. On non-Unix platforms the socket is not
//! used and the caller falls back to running the action in-process.
//!
//! Binding the socket doubles as the cross-process run guard: a one-shot `pine select`
//! claims it for the length of its run, so a second process finds it in use and backs off.

#[cfg(unix)]
use std::io::{Read, Write};
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
#[cfg(unix)]
use tracing::{debug, info, warn};

use crate::pipeline::PipelineController;

#[cfg(unix)]
const SOCKET_FILE_NAME: &str = "pine.sock";

#[derive(Error, Debug)]
pub enum SocketError {
    #[error("action socket {0} already in use by another instance")]
    InUse(PathBuf),
    #[error("failed to bind {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("action bridge is not supported on this platform")]
    Unsupported,
}

/// Owner of the home directory, which is the invoking user on every Unix we run on
/// (`/proc` does not exist on macOS).
#[cfg(unix)]
fn current_uid() -> u32 {
    use std::os::unix::fs::MetadataExt;

    dirs::home_dir()
        .and_then(|home| std::fs::metadata(home).ok())
        .or_else(|| std::fs::metadata("/proc/self").ok())
        .map(|meta| meta.uid())
        .unwrap_or(0)
}

/// Candidate socket paths, most preferred first.
#[cfg(unix)]
fn socket_candidates() -> Vec<PathBuf> {
    let uid = current_uid();
    let mut candidates = Vec::new();
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        candidates.push(PathBuf::from(runtime_dir).join(SOCKET_FILE_NAME));
    }
    candidates.push(PathBuf::from(format!("/run/user/{uid}")).join(SOCKET_FILE_NAME));
    candidates.push(PathBuf::from(format!("/tmp/pine-{uid}.sock")));
    candidates
}

/// Returns the path where the action socket is bound: the first candidate whose
/// directory exists.
#[cfg(unix)]
pub fn action_socket_path() -> PathBuf {
    let candidates = socket_candidates();
    for candidate in &candidates {
        if candidate.parent().is_some_and(|dir| dir.exists()) {
            return candidate.clone();
        }
    }
    PathBuf::from(format!("/tmp/pine-{}.sock", current_uid()))
}

// --- Sending an action to the resident instance (used by main.rs) ---

#[cfg(unix)]
pub fn send_action_to_running_instance(action: &str) -> Result<(), String> {
    let mut candidates = socket_candidates();
    candidates.dedup();

    for path in candidates {
        let mut stream = match UnixStream::connect(&path) {
            Ok(stream) => stream,
            Err(_) => continue,
        };

        stream
            .write_all(action.trim().as_bytes())
            .map_err(|e| format!("failed to send action to running instance: {e}"))?;
        return Ok(());
    }

    Err("could not connect to a running instance action socket".to_string())
}

#[cfg(not(unix))]
pub fn send_action_to_running_instance(_action: &str) -> Result<(), String> {
    Err("action bridge is not supported on this platform".to_string())
}

// --- Listener: owned by the resident instance or a one-shot run ---

/// A bound action socket. The socket file is removed when the claim is dropped.
#[cfg(unix)]
pub struct SocketClaim {
    listener: UnixListener,
    path: PathBuf,
}

#[cfg(unix)]
impl SocketClaim {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
impl Drop for SocketClaim {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        debug!(path = %self.path.display(), "Action socket released");
    }
}

#[cfg(not(unix))]
pub struct SocketClaim;

#[cfg(unix)]
fn claim_socket_at(path: &Path) -> Result<SocketClaim, SocketError> {
    let bind_error = |source| SocketError::Bind {
        path: path.to_path_buf(),
        source,
    };

    let listener = match UnixListener::bind(path) {
        Ok(listener) => listener,
        Err(bind_err) => {
            if !path.exists() {
                return Err(bind_error(bind_err));
            }
            if UnixStream::connect(path).is_ok() {
                return Err(SocketError::InUse(path.to_path_buf()));
            }
            // Stale socket left behind by a crashed instance.
            let _ = std::fs::remove_file(path);
            UnixListener::bind(path).map_err(bind_error)?
        }
    };

    Ok(SocketClaim {
        listener,
        path: path.to_path_buf(),
    })
}

/// Binds the action socket at [`action_socket_path`]. Fails with [`SocketError::InUse`]
/// while another Pine process holds it.
#[cfg(unix)]
pub fn claim_action_socket() -> Result<SocketClaim, SocketError> {
    claim_socket_at(&action_socket_path())
}

#[cfg(not(unix))]
pub fn claim_action_socket() -> Result<SocketClaim, SocketError> {
    Err(SocketError::Unsupported)
}

/// Binds the action socket and dispatches incoming actions until the listener fails.
/// Blocks the calling thread; each action runs on its own pipeline thread.
#[cfg(unix)]
pub fn serve_action_socket(controller: Arc<PipelineController>) -> Result<(), SocketError> {
    let claim = claim_action_socket()?;
    info!(path = %claim.path().display(), "Listening for actions");

    for stream_result in claim.listener.incoming() {
        let mut stream = match stream_result {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Action socket accept failed");
                continue;
            }
        };

        let mut payload = String::new();
        if let Err(e) = stream.read_to_string(&mut payload) {
            warn!(error = %e, "Action socket read failed");
            continue;
        }

        let action_raw = payload.trim();
        match crate::actions::parse_app_action(action_raw) {
            Some(action) => {
                crate::actions::execute_action(&controller, action, "socket");
            }
            None => warn!(action = %action_raw, "Unknown action command"),
        }
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn serve_action_socket(_controller: Arc<PipelineController>) -> Result<(), SocketError> {
    Err(SocketError::Unsupported)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_socket_candidates_end_with_tmp_fallback() {
        let candidates = socket_candidates();
        let last = candidates.last().unwrap();
        assert!(last.starts_with("/tmp"));
        assert!(last.to_string_lossy().ends_with(".sock"));
    }

    #[test]
    fn test_current_uid_owns_home() {
        use std::os::unix::fs::MetadataExt;

        let home = dirs::home_dir().unwrap();
        assert_eq!(current_uid(), std::fs::metadata(home).unwrap().uid());
    }

    #[test]
    fn test_claim_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pine.sock");
        drop(UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        assert!(claim_socket_at(&path).is_ok());
    }

    #[test]
    fn test_claim_refuses_live_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pine.sock");
        let _live = UnixListener::bind(&path).unwrap();

        assert!(matches!(claim_socket_at(&path), Err(SocketError::InUse(_))));
    }

    #[test]
    fn test_second_claim_waits_for_first_to_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pine.sock");

        let first = claim_socket_at(&path).unwrap();
        assert!(matches!(claim_socket_at(&path), Err(SocketError::InUse(_))));

        drop(first);
        assert!(!path.exists());
        let second = claim_socket_at(&path).unwrap();
        assert_eq!(second.path(), path.as_path());
    }

    #[test]
    fn test_missing_directory_is_a_bind_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("pine.sock");

        assert!(matches!(claim_socket_at(&path), Err(SocketError::Bind { .. })));
    }
}
