//! Atomic file-artifact writer.
//!
//! Every listener that renders a file on disk goes through [`FileArtifact`]:
//! write to a temp file in the same directory, set mode and ownership, and
//! only replace the real target if the content actually changed. This is
//! what lets a listener's `notify` be idempotent and lets callers (like the
//! gateway listener, which runs an `exec` command on change) know whether
//! anything needs reloading.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::unistd::{chown, Group, User};
use sha2::{Digest, Sha256};

use crate::error::ListenerError;

/// A file to be rendered atomically, with a fixed mode and owner.
pub struct FileArtifact {
    path: PathBuf,
    mode: u32,
    user: String,
    group: String,
}

impl FileArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: 0o644,
            user: "root".to_string(),
            group: "root".to_string(),
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn owner(mut self, user: impl Into<String>, group: impl Into<String>) -> Self {
        self.user = user.into();
        self.group = group.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renders the file content via `write_fn` into a temp file, then
    /// replaces the target only if the content differs. Returns `true` if
    /// the target changed.
    pub fn write(
        &self,
        write_fn: impl FnOnce(&mut dyn io::Write) -> io::Result<()>,
    ) -> Result<bool, ListenerError> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".catalogd-")
            .tempfile_in(dir)
            .map_err(|source| self.io_error(source))?;

        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(self.mode))
            .map_err(|source| self.io_error(source))?;
        self.chown(tmp.path())?;

        write_fn(tmp.as_file_mut()).map_err(|source| self.io_error(source))?;
        tmp.as_file_mut().sync_all().map_err(|source| self.io_error(source))?;

        let changed = !self.path.exists() || Self::hash_file(tmp.path())? != Self::hash_file(&self.path)?;
        if changed {
            tmp.persist(&self.path)
                .map_err(|err| self.io_error(err.error))?;
        }
        Ok(changed)
    }

    fn chown(&self, path: &Path) -> Result<(), ListenerError> {
        let uid = User::from_name(&self.user)
            .map_err(io::Error::from)
            .map_err(|source| self.owner_error(source))?
            .map(|u| u.uid);
        let gid = Group::from_name(&self.group)
            .map_err(io::Error::from)
            .map_err(|source| self.owner_error(source))?
            .map(|g| g.gid);
        chown(path, uid, gid)
            .map_err(io::Error::from)
            .map_err(|source| self.owner_error(source))
    }

    fn hash_file(path: &Path) -> Result<[u8; 32], ListenerError> {
        let mut file =
            fs::File::open(path).map_err(|source| ListenerError::Io { path: path.to_path_buf(), source })?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)
            .map_err(|source| ListenerError::Io { path: path.to_path_buf(), source })?;
        Ok(hasher.finalize().into())
    }

    fn io_error(&self, source: io::Error) -> ListenerError {
        ListenerError::Io { path: self.path.clone(), source }
    }

    fn owner_error(&self, source: io::Error) -> ListenerError {
        ListenerError::Owner {
            path: self.path.clone(),
            user: self.user.clone(),
            group: self.group.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_changes_and_creates_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let artifact = FileArtifact::new(&target);

        let changed = artifact.write(|w| w.write_all(b"hello")).unwrap();
        assert!(changed);
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
    }

    #[test]
    fn rewriting_identical_content_reports_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let artifact = FileArtifact::new(&target);

        artifact.write(|w| w.write_all(b"hello")).unwrap();
        let changed = artifact.write(|w| w.write_all(b"hello")).unwrap();
        assert!(!changed);
    }

    #[test]
    fn rewriting_different_content_reports_changed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let artifact = FileArtifact::new(&target);

        artifact.write(|w| w.write_all(b"hello")).unwrap();
        let changed = artifact.write(|w| w.write_all(b"world")).unwrap();
        assert!(changed);
        assert_eq!(fs::read_to_string(&target).unwrap(), "world");
    }

    #[test]
    fn mode_is_applied_to_the_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let artifact = FileArtifact::new(&target).mode(0o640);

        artifact.write(|w| w.write_all(b"x")).unwrap();
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }
}
