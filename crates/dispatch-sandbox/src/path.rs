//! Admitted paths
//!
//! Provides [`SandboxedPath`], the only path type operation handlers accept.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Canonical path known to lie inside a sandbox root
///
/// Only [`crate::PathSandbox`] can construct one, so holding a value is
/// evidence that containment was checked.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SandboxedPath {
    absolute: PathBuf,
    relative: PathBuf,
}

impl SandboxedPath {
    pub(crate) fn new(absolute: PathBuf, relative: PathBuf) -> Self {
        Self { absolute, relative }
    }

    /// Absolute canonical path
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// Path relative to the data root (empty for the root itself)
    #[inline]
    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Check if something exists at this path
    #[inline]
    #[must_use]
    pub fn exists(&self) -> bool {
        self.absolute.exists()
    }

    /// Check if this path is an existing directory
    #[inline]
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.absolute.is_dir()
    }

    /// Last component, if any
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.absolute.file_name().and_then(|n| n.to_str())
    }

    /// Lowercased extension, if any
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.absolute
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Relative path rendered with `/` separators
    #[must_use]
    pub fn relative_display(&self) -> String {
        self.relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Consume into the absolute path
    #[inline]
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.absolute
    }
}

impl AsRef<Path> for SandboxedPath {
    fn as_ref(&self) -> &Path {
        &self.absolute
    }
}

impl Display for SandboxedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.absolute.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_display_uses_forward_slashes() {
        let path = SandboxedPath::new(
            PathBuf::from("/root/docs/a/b.md"),
            PathBuf::from("docs").join("a").join("b.md"),
        );
        assert_eq!(path.relative_display(), "docs/a/b.md");
    }

    #[test]
    fn extension_is_lowercased() {
        let path = SandboxedPath::new(PathBuf::from("/root/CARD.PNG"), PathBuf::from("CARD.PNG"));
        assert_eq!(path.extension().as_deref(), Some("png"));
        assert_eq!(path.file_name(), Some("CARD.PNG"));
    }

    #[test]
    fn display_shows_absolute() {
        let path = SandboxedPath::new(PathBuf::from("/root/x.txt"), PathBuf::from("x.txt"));
        assert_eq!(path.to_string(), "/root/x.txt");
        assert_eq!(path.as_path(), Path::new("/root/x.txt"));
    }
}
