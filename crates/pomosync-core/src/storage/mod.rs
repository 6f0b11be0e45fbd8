mod config;
mod document;
mod store;
mod sync_config;

pub use config::{Config, ScheduleConfig, StorageConfig, TimerConfig};
pub use document::{Document, TimerSnapshot, DOCUMENT_VERSION};
pub use store::{DocumentStore, JsonFileStore, MemoryStore};
pub use sync_config::SyncConfig;

use std::path::PathBuf;

/// Returns the directory holding the document and config files.
///
/// `POMOSYNC_DATA_DIR` wins when set. Otherwise `~/.config/pomosync/`, or
/// `~/.config/pomosync-dev/` when `POMOSYNC_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("POMOSYNC_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("POMOSYNC_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomosync-dev")
            } else {
                base_dir.join("pomosync")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
