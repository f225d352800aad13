// logsieve - app/store.rs
//
// Filter document persistence: the file I/O side of the manager's
// save/load. The document itself is produced and consumed by
// `FilterManager::save_to_string` / `load_from_str`; this module only
// moves bytes.
//
// Saves are atomic (write temp → rename) so a crash mid-save never
// corrupts the previous good document. Load failures of any kind leave
// the manager's in-memory rule set untouched.

use crate::core::manager::FilterManager;
use crate::util::constants;
use crate::util::error::{Result, StoreError};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Default location for the filter document, platform-appropriate
/// (XDG on Linux, AppData on Windows, Library on macOS). `None` when the
/// platform config directory cannot be determined.
pub fn default_store_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", constants::CRATE_ID)?;
    Some(dirs.config_dir().join(constants::CONFIG_FILE_NAME))
}

/// Save the manager's persistent filters to `path` atomically.
///
/// The parent directory is created on first save.
pub fn save(manager: &FilterManager, path: &Path) -> Result<()> {
    let json = manager.save_to_string()?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                operation: "create directory",
                source: e,
            })?;
        }
    }

    // Write to a sibling temp file then rename. A crash between the two
    // loses the new document but never corrupts the previous one.
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json.as_bytes()).map_err(|e| StoreError::Io {
        path: tmp.clone(),
        operation: "write",
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        StoreError::Io {
            path: path.to_path_buf(),
            operation: "rename",
            source: e,
        }
    })?;

    tracing::info!(path = %path.display(), "Saved filter document");
    Ok(())
}

/// Load a filter document from `path` into the manager.
///
/// Returns `Ok(false)` when no document exists at `path` (a fresh
/// install is not an error). The size cap is checked before reading so a
/// runaway file is rejected without being pulled into memory.
pub fn load(manager: &FilterManager, path: &Path) -> Result<bool> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                operation: "stat",
                source: e,
            }
            .into())
        }
    };
    if metadata.len() > constants::MAX_CONFIG_FILE_SIZE {
        return Err(StoreError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size: constants::MAX_CONFIG_FILE_SIZE,
        }
        .into());
    }

    let text = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        operation: "read",
        source: e,
    })?;
    manager.load_from_str(&text)?;
    tracing::info!(path = %path.display(), "Loaded filter document");
    Ok(true)
}

// =============================================================================
// Tests
// =============================================================================
