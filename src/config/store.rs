//! Durable storage for [`Document`]s with atomic replacement.
//!
//! Writes go to a temporary file in the target's directory which is then
//! renamed over the target, so a concurrent reader sees either the old or the
//! new document, never a partial one. There is no cross-process locking: two
//! writers racing on the same file resolve as last-write-wins.
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::document::{Document, Flavor};
use crate::error::ProfileError;

/// Permission policy applied to the file being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Keep the target's current permissions (or the process default for new files).
    Preserve,
    /// Owner read/write only (`0o600`). Used for anything holding secrets.
    OwnerOnly,
}

impl FileMode {
    /// The mode used for documents of the given flavour.
    #[must_use]
    pub const fn for_flavor(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Config => Self::Preserve,
            Flavor::Credentials => Self::OwnerOnly,
        }
    }
}

/// Read and parse the document at `path`.
///
/// A missing file is an empty document, not an error.
///
/// # Errors
///
/// Returns [`ProfileError::Io`] if the file exists but cannot be read, or
/// [`ProfileError::Parse`] if its content is malformed.
pub fn load(path: &Path, flavor: Flavor) -> Result<Document, ProfileError> {
    match fs::read_to_string(path) {
        Ok(text) => Document::parse(&text, flavor),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::empty(flavor)),
        Err(e) => Err(ProfileError::io(path, e)),
    }
}

/// Atomically write `document` to `path`.
///
/// A symlinked `path` stays a symlink; the file it points to is replaced.
///
/// # Errors
///
/// Returns [`ProfileError::Io`] if the temporary file cannot be created,
/// written, or renamed. The target is untouched on failure.
pub fn save(path: &Path, document: &Document) -> Result<(), ProfileError> {
    save_text(
        path,
        &document.serialize(),
        FileMode::for_flavor(document.flavor()),
    )
}

/// Atomically write arbitrary text to `path` with the given permission policy.
///
/// # Errors
///
/// Returns [`ProfileError::Io`] on any filesystem failure.
pub fn save_text(path: &Path, text: &str, mode: FileMode) -> Result<(), ProfileError> {
    StagedWrite::stage(path, text, mode)?.commit()
}

/// A fully written temporary file waiting to replace its target.
///
/// Dropping a staged write without calling [`commit`](Self::commit) deletes
/// the temporary file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Write `text` to a temporary sibling of `target` and flush it to disk.
    ///
    /// When `target` is a symlink the write is staged next to, and later
    /// replaces, the file the link resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Io`] if the directory or temporary file cannot
    /// be created, or the content cannot be written.
    pub fn stage(target: &Path, text: &str, mode: FileMode) -> Result<Self, ProfileError> {
        let target = &resolve_target(target);
        let dir = parent_dir(target);
        fs::create_dir_all(&dir).map_err(|e| ProfileError::io(&dir, e))?;

        let prefix = format!(
            ".{}.",
            target
                .file_name()
                .map_or_else(|| "document".into(), |n| n.to_string_lossy())
        );
        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| ProfileError::io(&dir, e))?;

        apply_mode(temp.as_file(), target, mode).map_err(|e| ProfileError::io(temp.path(), e))?;

        temp.write_all(text.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| ProfileError::io(temp.path(), e))?;

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Path of the temporary file.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Rename the temporary file over the target.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Io`] if the rename fails; the temporary file is
    /// removed and the target is untouched.
    pub fn commit(self) -> Result<(), ProfileError> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| ProfileError::io(&target, e.error))?;
        Ok(())
    }
}

/// The file a write to `path` should replace: `path` itself, or the end of
/// its symlink chain. A dangling link resolves to the path it names.
fn resolve_target(path: &Path) -> PathBuf {
    let is_link = fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink());
    if !is_link {
        return path.to_path_buf();
    }
    if let Ok(real) = dunce::canonicalize(path) {
        return real;
    }
    match fs::read_link(path) {
        Ok(link) => parent_dir(path).join(link),
        Err(_) => path.to_path_buf(),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => dunce::simplified(parent).to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(unix)]
fn apply_mode(file: &fs::File, target: &Path, mode: FileMode) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;

    let permissions = match mode {
        FileMode::OwnerOnly => fs::Permissions::from_mode(0o600),
        FileMode::Preserve => match fs::metadata(target) {
            Ok(meta) => meta.permissions(),
            // New file: tempfile creates 0o600; widen to the usual config default.
            Err(_) => fs::Permissions::from_mode(0o644),
        },
    };
    file.set_permissions(permissions)
}

#[cfg(not(unix))]
fn apply_mode(file: &fs::File, target: &Path, mode: FileMode) -> std::io::Result<()> {
    if mode == FileMode::Preserve
        && let Ok(meta) = fs::metadata(target)
    {
        file.set_permissions(meta.permissions())?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::document::{Body, Category, Section};

    #[test]
    fn missing_file_is_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let doc = load(&dir.path().join("config"), Flavor::Config).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "[profile broken\n").unwrap();
        assert!(matches!(
            load(&path, Flavor::Config),
            Err(ProfileError::Parse { .. })
        ));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        let doc = Document::empty(Flavor::Config)
            .append_section(Section::new(
                Category::Profile,
                "dev",
                Body::new().with("region", "eu-west-1"),
            ))
            .unwrap();
        save(&path, &doc).unwrap();
        let loaded = load(&path, Flavor::Config).unwrap();
        assert_eq!(loaded.serialize(), doc.serialize());
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(".aws").join("config");
        save(&path, &Document::empty(Flavor::Config)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn uncommitted_write_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        let original = "[dev]\naws_access_key_id = OLD\n";
        fs::write(&path, original).unwrap();

        let staged =
            StagedWrite::stage(&path, "[dev]\naws_access_key_id = NEW\n", FileMode::OwnerOnly)
                .unwrap();
        let temp_path = staged.temp_path().to_path_buf();
        assert!(temp_path.exists(), "temporary file should be written");
        assert_eq!(temp_path.parent(), path.parent());

        // Simulate a crash between write and rename.
        drop(staged);

        assert_eq!(fs::read_to_string(&path).unwrap(), original);
        assert!(!temp_path.exists(), "temporary file should be cleaned up");
    }

    #[test]
    fn commit_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "old").unwrap();
        StagedWrite::stage(&path, "new", FileMode::Preserve)
            .unwrap()
            .commit()
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_target_keeps_its_link() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("dotfiles").join("aws-config");
        fs::create_dir_all(real.parent().unwrap()).unwrap();
        fs::write(&real, "old").unwrap();
        let link = dir.path().join("config");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        save_text(&link, "new", FileMode::Preserve).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "new");
        assert_eq!(fs::read_to_string(&link).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_creates_its_target() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("credentials");
        std::os::unix::fs::symlink("store/credentials", &link).unwrap();

        save_text(&link, "[dev]\n", FileMode::OwnerOnly).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(
            fs::read_to_string(dir.path().join("store").join("credentials")).unwrap(),
            "[dev]\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn credentials_are_owner_only() {
        use std::os::unix::fs::PermissionsExt as _;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        save(&path, &Document::empty(Flavor::Credentials)).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn config_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt as _;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        save(&path, &Document::empty(Flavor::Config)).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }
}
