//! Path utilities for cross-platform home directory resolution.

use std::env;
use std::path::PathBuf;

/// Gets the user's home directory.
///
/// On Unix-like systems (macOS, Linux), uses the `HOME` environment variable.
/// On Windows, tries `HOME` first (available on Windows 10+), then falls back to `USERPROFILE`.
///
/// # Returns
/// `Ok(PathBuf)` with the home directory path, or `Err(String)` if neither variable is set.
pub fn get_home_dir() -> Result<PathBuf, String> {
    if let Ok(home) = env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(profile) = env::var("USERPROFILE") {
            return Ok(PathBuf::from(profile));
        }
    }

    Err("Could not determine home directory: HOME and USERPROFILE are not set".to_string())
}

/// Gets the base application data directory: `${HOME}/.pine`
pub fn get_app_data_dir() -> Result<PathBuf, String> {
    Ok(get_home_dir()?.join(".pine"))
}

/// Gets the scratch directory for images handed to the OCR engine: `${HOME}/.pine/cache`
pub fn get_cache_dir() -> Result<PathBuf, String> {
    Ok(get_app_data_dir()?.join("cache"))
}

/// Gets the default trained-data directory: `${HOME}/.pine/tessdata`
pub fn get_models_dir() -> Result<PathBuf, String> {
    Ok(get_app_data_dir()?.join("tessdata"))
}

/// Builds a file name unique to this process and moment: `<prefix>-<pid>-<nanos>.<ext>`,
/// e.g. `pine-screenshot-4242-1700000000000000000.png`.
pub fn timestamped_file_name(prefix: &str, extension: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{}-{}-{}.{}", prefix, std::process::id(), nanos, extension)
}
