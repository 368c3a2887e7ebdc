// Remote delete handling

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;
use log::{info, warn};
use crate::protocol::control::DeleteStatus;

/// Remove a regular file, reporting the tri-state outcome.
///
/// Missing files yield `NotFound`. Files that exist but are read-only,
/// unreadable, not regular files, or that the OS refuses to remove yield
/// `NoPermission` and are left untouched.
pub fn delete_file(path: &Path) -> DeleteStatus {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return DeleteStatus::NotFound,
        Err(e) => {
            warn!("Cannot stat {:?}: {}", path, e);
            return DeleteStatus::NoPermission;
        }
    };

    if metadata.is_dir() || metadata.permissions().readonly() {
        return DeleteStatus::NoPermission;
    }
    if metadata.is_file() {
        if let Err(e) = File::open(path) {
            warn!("Cannot read {:?}: {}", path, e);
            return DeleteStatus::NoPermission;
        }
    }

    match fs::remove_file(path) {
        Ok(()) => {
            info!("Deleted {:?}", path);
            DeleteStatus::Deleted
        }
        Err(e) if e.kind() == ErrorKind::NotFound => DeleteStatus::NotFound,
        Err(e) => {
            warn!("Cannot remove {:?}: {}", path, e);
            DeleteStatus::NoPermission
        }
    }
}
