//! Locating external executables.

use std::collections::HashSet;
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Candidate paths for `binary`.
///
/// A value with a path separator is returned as-is. A bare name is expanded
/// across the directories on `PATH`, in order, without duplicates.
#[must_use]
pub fn binary_candidates(binary: &OsStr) -> Vec<PathBuf> {
    let direct = Path::new(binary);
    if direct.components().count() > 1 || direct.is_absolute() {
        return vec![direct.to_path_buf()];
    }

    let Some(path_env) = env::var_os("PATH") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    env::split_paths(&path_env)
        .map(|dir| {
            if dir.as_os_str().is_empty() {
                direct.to_path_buf()
            } else {
                dir.join(direct)
            }
        })
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}

/// First candidate for `binary` that exists and is executable.
#[must_use]
pub fn resolve_binary(binary: &Path) -> Option<PathBuf> {
    binary_candidates(binary.as_os_str())
        .into_iter()
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
