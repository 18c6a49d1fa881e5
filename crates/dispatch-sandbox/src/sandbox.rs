//! Path sandbox
//!
//! Every file argument is canonicalized (symlinks, `..`, relative segments)
//! and must remain a descendant of the configured data root.

use crate::error::SandboxError;
use crate::path::SandboxedPath;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Sandbox rooted at a single data directory
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
    virtual_root: Option<PathBuf>,
}

impl PathSandbox {
    /// Create a sandbox over an existing directory
    ///
    /// # Errors
    /// Returns `InvalidRoot` if the root is missing or not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let configured = root.as_ref();
        let root = configured
            .canonicalize()
            .map_err(|e| SandboxError::InvalidRoot {
                root: configured.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !root.is_dir() {
            return Err(SandboxError::InvalidRoot {
                root: configured.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        Ok(Self {
            root,
            virtual_root: None,
        })
    }

    /// Treat an absolute prefix (e.g. `/data`) as an alias of the root
    #[inline]
    #[must_use]
    pub fn with_virtual_root(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.virtual_root = Some(prefix.into());
        self
    }

    /// Canonical data root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Virtual alias of the root, if configured
    #[inline]
    #[must_use]
    pub fn virtual_root(&self) -> Option<&Path> {
        self.virtual_root.as_deref()
    }

    /// Resolve a raw path to a canonical path inside the root
    ///
    /// The target need not exist (output files are resolved before they are
    /// written); its nearest existing ancestor is canonicalized and the
    /// remaining components are applied lexically.
    ///
    /// # Errors
    /// - `PathEscape` if the canonical path leaves the root
    /// - `InvalidPath` for empty input or NUL bytes
    pub fn resolve(&self, raw: &str) -> Result<SandboxedPath, SandboxError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains('\0') {
            return Err(SandboxError::InvalidPath(raw.to_string()));
        }

        let candidate = self.anchor(Path::new(trimmed));
        let canonical = canonicalize_lenient(&candidate)?;

        self.contain(trimmed, canonical)
    }

    /// Resolve a raw path and require that it exists
    ///
    /// # Errors
    /// Same as [`Self::resolve`], plus `NotFound` when absent.
    pub fn resolve_existing(&self, raw: &str) -> Result<SandboxedPath, SandboxError> {
        let path = self.resolve(raw)?;
        self.require_exists(&path)?;
        Ok(path)
    }

    /// Fail with `NotFound` when nothing exists at `path`
    ///
    /// # Errors
    /// Returns `NotFound` if the path is absent.
    pub fn require_exists(&self, path: &SandboxedPath) -> Result<(), SandboxError> {
        if path.exists() {
            Ok(())
        } else {
            Err(SandboxError::NotFound(path.as_path().to_path_buf()))
        }
    }

    /// Re-admit a path discovered on disk (directory entries, walk results)
    ///
    /// Entries reached through a symlink are canonicalized again, so a link
    /// pointing outside the root is rejected like any other escape.
    ///
    /// # Errors
    /// Returns `PathEscape` if the entry resolves outside the root.
    pub fn admit(&self, discovered: &Path) -> Result<SandboxedPath, SandboxError> {
        let canonical = canonicalize_lenient(&self.anchor(discovered))?;
        self.contain(&discovered.to_string_lossy(), canonical)
    }

    /// Map raw input onto an absolute candidate path
    fn anchor(&self, raw: &Path) -> PathBuf {
        if raw.is_absolute() {
            if let Some(alias) = &self.virtual_root {
                if let Ok(rest) = raw.strip_prefix(alias) {
                    return self.root.join(rest);
                }
            }
            raw.to_path_buf()
        } else {
            self.root.join(raw)
        }
    }

    fn contain(&self, raw: &str, canonical: PathBuf) -> Result<SandboxedPath, SandboxError> {
        match canonical.strip_prefix(&self.root) {
            Ok(relative) => {
                let relative = relative.to_path_buf();
                Ok(SandboxedPath::new(canonical, relative))
            }
            Err(_) => {
                tracing::warn!(path = raw, root = %self.root.display(), "path escapes data root");
                Err(SandboxError::escape(raw, self.root.clone()))
            }
        }
    }
}

/// Canonicalize component by component, following links while they exist
///
/// Once a component is missing, later components are held lexically. A `..`
/// that climbs back out of the missing part lands on an existing canonical
/// directory again, and every component after it is canonicalized anew, so
/// links beneath that point are still followed. A dangling link is refused.
fn canonicalize_lenient(path: &Path) -> Result<PathBuf, SandboxError> {
    let mut base = PathBuf::new();
    let mut missing: Vec<OsString> = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => base.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if missing.pop().is_none() {
                    base.pop();
                }
            }
            Component::Normal(segment) if missing.is_empty() => {
                let candidate = base.join(segment);
                match candidate.canonicalize() {
                    Ok(canonical) => base = canonical,
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        if candidate.symlink_metadata().is_ok() {
                            return Err(SandboxError::InvalidPath(format!(
                                "{} is a dangling link",
                                candidate.display()
                            )));
                        }
                        missing.push(segment.to_os_string());
                    }
                    Err(e) => return Err(SandboxError::io_error(candidate, e)),
                }
            }
            Component::Normal(segment) => missing.push(segment.to_os_string()),
        }
    }

    if !base.is_absolute() {
        return Err(SandboxError::InvalidPath(path.display().to_string()));
    }
    base.extend(missing);
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathSandbox) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        fs::write(dir.path().join("dates.txt"), "2024-01-03\n").unwrap();
        let sandbox = PathSandbox::new(dir.path()).unwrap().with_virtual_root("/data");
        (dir, sandbox)
    }

    #[test]
    fn new_rejects_missing_root() {
        let result = PathSandbox::new("/definitely/not/a/real/root");
        assert!(matches!(result, Err(SandboxError::InvalidRoot { .. })));
    }

    #[test]
    fn new_rejects_file_root() {
        let (dir, _) = setup();
        let result = PathSandbox::new(dir.path().join("dates.txt"));
        assert!(matches!(result, Err(SandboxError::InvalidRoot { .. })));
    }

    #[test]
    fn resolve_relative_inside_root() {
        let (_dir, sandbox) = setup();
        let path = sandbox.resolve("dates.txt").unwrap();
        assert_eq!(path.relative(), Path::new("dates.txt"));
        assert!(path.as_path().starts_with(sandbox.root()));
    }

    #[test]
    fn resolve_virtual_root_alias() {
        let (_dir, sandbox) = setup();
        let path = sandbox.resolve("/data/dates.txt").unwrap();
        assert_eq!(path.as_path(), sandbox.root().join("dates.txt"));

        let root = sandbox.resolve("/data").unwrap();
        assert_eq!(root.as_path(), sandbox.root());
        assert!(root.relative().as_os_str().is_empty());
    }

    #[test]
    fn resolve_alias_is_component_wise() {
        let (_dir, sandbox) = setup();
        // "/database" is not under "/data"
        let result = sandbox.resolve("/database/x.txt");
        assert!(matches!(result, Err(SandboxError::PathEscape { .. })));
    }

    #[test]
    fn resolve_absolute_inside_root() {
        let (_dir, sandbox) = setup();
        let raw = sandbox.root().join("logs").display().to_string();
        let path = sandbox.resolve(&raw).unwrap();
        assert_eq!(path.relative(), Path::new("logs"));
    }

    #[test]
    fn resolve_rejects_absolute_outside() {
        let (_dir, sandbox) = setup();
        let result = sandbox.resolve("/etc/passwd");
        assert!(matches!(result, Err(SandboxError::PathEscape { .. })));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let (_dir, sandbox) = setup();
        assert!(sandbox.resolve("../outside.txt").unwrap_err().is_escape());
        assert!(sandbox.resolve("/data/../outside.txt").unwrap_err().is_escape());
        assert!(sandbox.resolve("logs/../../outside.txt").unwrap_err().is_escape());
    }

    #[test]
    fn resolve_allows_traversal_that_stays_inside() {
        let (_dir, sandbox) = setup();
        let path = sandbox.resolve("logs/../dates.txt").unwrap();
        assert_eq!(path.relative(), Path::new("dates.txt"));
    }

    #[test]
    fn resolve_nonexistent_output() {
        let (_dir, sandbox) = setup();
        let path = sandbox.resolve("/data/out/new/result.txt").unwrap();
        assert!(!path.exists());
        assert_eq!(path.relative_display(), "out/new/result.txt");
    }

    #[test]
    fn resolve_rejects_empty() {
        let (_dir, sandbox) = setup();
        assert!(matches!(sandbox.resolve("  "), Err(SandboxError::InvalidPath(_))));
    }

    #[test]
    fn resolve_existing_reports_missing() {
        let (_dir, sandbox) = setup();
        let result = sandbox.resolve_existing("/data/missing.txt");
        assert!(matches!(result, Err(SandboxError::NotFound(_))));
        assert!(sandbox.resolve_existing("/data/dates.txt").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlink_escape() {
        let (dir, sandbox) = setup();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let result = sandbox.resolve("link/secret.txt");
        assert!(matches!(result, Err(SandboxError::PathEscape { .. })));

        let admitted = sandbox.admit(&dir.path().join("link").join("secret.txt"));
        assert!(admitted.unwrap_err().is_escape());
    }

    #[cfg(unix)]
    #[test]
    fn resolve_follows_link_reached_through_missing_dir() {
        let (dir, sandbox) = setup();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        for raw in [
            "nope/../link/secret.txt",
            "/data/nope/../link/secret.txt",
            "nope/deeper/../../link/secret.txt",
            "logs/nope/../../link/new.txt",
        ] {
            let result = sandbox.resolve(raw);
            assert!(result.as_ref().is_err_and(SandboxError::is_escape), "{raw}: {result:?}");
        }
        assert!(sandbox
            .resolve_existing("/data/nope/../link/secret.txt")
            .unwrap_err()
            .is_escape());
    }

    #[test]
    fn missing_dir_then_parent_stays_inside() {
        let (dir, sandbox) = setup();
        let path = sandbox.resolve("nope/../logs/today.log").unwrap();
        assert_eq!(path.as_path(), sandbox.root().join("logs").join("today.log"));
        assert!(path.as_path().starts_with(dir.path().canonicalize().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_refuses_dangling_link() {
        let (dir, sandbox) = setup();
        std::os::unix::fs::symlink("/definitely/not/here", dir.path().join("dangling")).unwrap();

        let result = sandbox.resolve("/data/dangling");
        assert!(matches!(result, Err(SandboxError::InvalidPath(_))));
        assert!(sandbox.resolve("/data/dangling/child.txt").is_err());
    }

    proptest! {
        #[test]
        fn prop_traversal_past_root_is_rejected(
            inside in prop::collection::vec("[a-z]{1,8}", 0..4),
            extra in 1usize..4,
            tail in "[a-z]{1,8}",
            via_alias in any::<bool>(),
        ) {
            let (_dir, sandbox) = setup();

            let mut parts: Vec<String> = inside.clone();
            parts.extend(std::iter::repeat("..".to_string()).take(inside.len() + extra));
            parts.push(tail);
            let relative = parts.join("/");
            let raw = if via_alias { format!("/data/{relative}") } else { relative };

            let result = sandbox.resolve(&raw);
            prop_assert!(result.as_ref().is_err_and(SandboxError::is_escape));
        }

        #[test]
        fn prop_resolved_paths_stay_under_root(
            parts in prop::collection::vec(prop_oneof![Just("..".to_string()), "[a-z]{1,6}"], 1..6),
        ) {
            let (_dir, sandbox) = setup();
            if let Ok(path) = sandbox.resolve(&parts.join("/")) {
                prop_assert!(path.as_path().starts_with(sandbox.root()));
            }
        }
    }
}
