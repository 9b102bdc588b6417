//! Path guard — confines file operations to a base directory.
//!
//! Every path handed to the guard is checked twice: textually for `..`
//! segments, and again after symlinks are resolved, so a link inside the
//! base that points elsewhere cannot be used to escape it.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use keyward_core::PathError;
use tempfile::NamedTempFile;
use tracing::debug;

/// Mode for directories created on behalf of [`PathGuard::safe_write`].
pub const DIR_MODE: u32 = 0o700;

/// Upper bound on dangling-symlink hops followed while resolving a path.
const MAX_LINK_HOPS: usize = 40;

/// Resolves caller-supplied relative paths against a fixed base directory.
#[derive(Debug, Clone)]
pub struct PathGuard {
    base: PathBuf,
}

impl PathGuard {
    /// Create a guard rooted at `base`, which must be absolute.
    ///
    /// The base does not have to exist yet.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, PathError> {
        let base = base.into();
        if !base.is_absolute() {
            return Err(PathError::InvalidPath {
                reason: format!("base directory '{}' is not absolute", base.display()),
            });
        }
        Ok(Self {
            base: normalize(&base),
        })
    }

    /// The (lexically normalized) base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve `rel_path` inside the base directory.
    ///
    /// See [`sanitize`].
    pub fn sanitize(&self, rel_path: &str) -> Result<PathBuf, PathError> {
        sanitize(&self.base, rel_path)
    }

    /// Read a file inside the base directory.
    pub fn safe_read(&self, rel_path: &str) -> Result<Vec<u8>, PathError> {
        let path = self.sanitize(rel_path)?;
        fs::read(&path).map_err(|source| PathError::Io { path, source })
    }

    /// Read a UTF-8 file inside the base directory.
    pub fn safe_read_to_string(&self, rel_path: &str) -> Result<String, PathError> {
        let path = self.sanitize(rel_path)?;
        fs::read_to_string(&path).map_err(|source| PathError::Io { path, source })
    }

    /// Replace a file inside the base directory with `data`.
    ///
    /// The bytes are staged in a temporary file next to the target, synced,
    /// and renamed over it, so readers see either the old contents or the
    /// new ones. Missing parent directories are created with mode `0700`.
    /// On non-Unix targets `mode` is ignored.
    pub fn safe_write(&self, rel_path: &str, data: &[u8], mode: u32) -> Result<(), PathError> {
        let path = self.sanitize(rel_path)?;
        let staged = stage(&path, data, mode)?;
        staged.persist(&path).map_err(|e| PathError::Io {
            path,
            source: e.error,
        })?;
        Ok(())
    }

    /// Create a file inside the base directory unless one already exists.
    ///
    /// Returns `false` and leaves the existing file untouched when the
    /// target is present. The new file appears with its full contents.
    pub fn safe_write_new(
        &self,
        rel_path: &str,
        data: &[u8],
        mode: u32,
    ) -> Result<bool, PathError> {
        let path = self.sanitize(rel_path)?;
        let staged = stage(&path, data, mode)?;
        match staged.persist_noclobber(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(PathError::Io {
                path,
                source: e.error,
            }),
        }
    }

    /// Remove a file inside the base directory.
    pub fn safe_remove(&self, rel_path: &str) -> Result<(), PathError> {
        let path = self.sanitize(rel_path)?;
        fs::remove_file(&path).map_err(|source| PathError::Io { path, source })
    }

    /// Create a uniquely named temporary file next to `rel_path`.
    ///
    /// The final component of `rel_path` is used as the file-name prefix;
    /// a random suffix is appended. The parent directory must already exist.
    /// The file is deleted when the returned handle is dropped unless it is
    /// persisted.
    pub fn safe_create_temp(&self, rel_path: &str) -> Result<NamedTempFile, PathError> {
        let path = self.sanitize(rel_path)?;
        let dir = path.parent().unwrap_or(&self.base).to_path_buf();
        let prefix = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("tmp"));

        tempfile::Builder::new()
            .prefix(&prefix)
            .tempfile_in(&dir)
            .map_err(|source| PathError::Io { path: dir, source })
    }
}

/// Resolve `rel_path` against `base_dir`, refusing anything that would land
/// outside it.
///
/// Checks, in order:
/// 1. `rel_path` is non-empty (`InvalidPath`)
/// 2. no `..` segment appears in the raw input (`PathTraversal`)
/// 3. after resolving symlinks on the base and on the deepest existing
///    ancestor of the target, the target is still under the base, compared
///    component by component (`PathTraversal`)
///
/// Returns the joined path *before* symlink resolution so callers can create
/// files that do not exist yet.
pub fn sanitize(base_dir: &Path, rel_path: &str) -> Result<PathBuf, PathError> {
    if rel_path.is_empty() {
        return Err(PathError::InvalidPath {
            reason: "file path cannot be empty".into(),
        });
    }

    if has_parent_segment(rel_path) {
        debug!(path = rel_path, "rejected parent-directory segment");
        return Err(PathError::PathTraversal {
            path: rel_path.into(),
        });
    }

    let base = normalize(base_dir);
    let joined = normalize(&base.join(rel_path));

    let resolved_base = base.canonicalize().unwrap_or_else(|_| base.clone());
    let resolved = resolve_existing(&joined, &base).ok_or_else(|| PathError::PathTraversal {
        path: rel_path.into(),
    })?;

    if !resolved.starts_with(&resolved_base) {
        debug!(
            path = rel_path,
            resolved = %resolved.display(),
            "rejected path outside base directory"
        );
        return Err(PathError::PathTraversal {
            path: rel_path.into(),
        });
    }

    Ok(joined)
}

/// True if any `/`- or `\`-separated segment of `raw` is exactly `..`.
fn has_parent_segment(raw: &str) -> bool {
    raw.split(['/', '\\']).any(|seg| seg == "..")
}

/// Lexically clean a path: drop `.` components and redundant separators,
/// and fold `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve symlinks on the deepest existing ancestor of `path` and re-append
/// the components that do not exist yet.
///
/// The walk stops at `stop` (the base directory); if nothing up to there
/// exists the path is returned unresolved. Dangling symlinks are followed by
/// reading their target. Returns `None` when the link chain is too long.
fn resolve_existing(path: &Path, stop: &Path) -> Option<PathBuf> {
    let mut current = path.to_path_buf();
    let mut tail: Vec<OsString> = Vec::new();
    let mut hops = 0;

    loop {
        if let Ok(real) = current.canonicalize() {
            return Some(tail.iter().rev().fold(real, |acc, c| acc.join(c)));
        }

        if let Ok(meta) = fs::symlink_metadata(&current)
            && meta.file_type().is_symlink()
        {
            hops += 1;
            if hops > MAX_LINK_HOPS {
                return None;
            }
            let target = fs::read_link(&current).ok()?;
            let parent = current.parent().unwrap_or(Path::new("/"));
            current = normalize(&parent.join(target));
            continue;
        }

        if current == stop {
            break;
        }

        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                current = parent.to_path_buf();
            }
            _ => break,
        }
    }

    Some(path.to_path_buf())
}

#[cfg(unix)]
fn create_dir_all(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(dir)
}

#[cfg(not(unix))]
fn create_dir_all(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Write `data` to a synced temporary file in the target's directory.
fn stage(path: &Path, data: &[u8], mode: u32) -> Result<NamedTempFile, PathError> {
    let dir = path.parent().ok_or_else(|| PathError::InvalidPath {
        reason: format!("'{}' has no parent directory", path.display()),
    })?;
    create_dir_all(dir).map_err(|source| PathError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut prefix = OsString::from(".");
    if let Some(name) = path.file_name() {
        prefix.push(name);
    }
    prefix.push(".");

    let io_err = |source: io::Error| PathError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut staged = tempfile::Builder::new()
        .prefix(&prefix)
        .tempfile_in(dir)
        .map_err(io_err)?;
    set_mode(staged.as_file(), mode).map_err(io_err)?;
    staged.write_all(data).map_err(io_err)?;
    staged.as_file().sync_all().map_err(io_err)?;
    Ok(staged)
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}
