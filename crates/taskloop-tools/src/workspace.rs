use std::path::{Component, Path, PathBuf};

use crate::ToolError;

/// Directories holding build output or vendored code. Never listed,
/// searched, or scanned for project descriptors.
pub const SKIPPED_DIRS: &[&str] = &[
    ".git",
    "target",
    "bin",
    "obj",
    "node_modules",
    "dist",
    "build",
    "__pycache__",
    ".venv",
];

/// The directory all tools operate in.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path against the root. `..` may not climb
    /// above the root, and the deepest existing ancestor must not leave it
    /// through a symlink.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let resolved = self.resolve_lexically(path)?;
        self.check_links(&resolved, path)?;
        Ok(resolved)
    }

    fn resolve_lexically(&self, path: &str) -> Result<PathBuf, ToolError> {
        let requested = Path::new(path);
        let relative = if requested.is_absolute() {
            requested
                .strip_prefix(&self.root)
                .map_err(|_| ToolError::PathEscape(path.to_string()))?
        } else {
            requested
        };

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in relative.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(ToolError::PathEscape(path.to_string()));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::PathEscape(path.to_string()));
                }
            }
        }
        Ok(resolved)
    }

    fn check_links(&self, resolved: &Path, path: &str) -> Result<(), ToolError> {
        // A root that does not exist yet has nothing to follow.
        let Ok(root) = self.root.canonicalize() else {
            return Ok(());
        };
        for ancestor in resolved.ancestors() {
            match ancestor.canonicalize() {
                Ok(real) if real.starts_with(&root) => return Ok(()),
                Ok(_) => return Err(ToolError::PathEscape(path.to_string())),
                // dangling symlink
                Err(_) if ancestor.symlink_metadata().is_ok() => {
                    return Err(ToolError::PathEscape(path.to_string()))
                }
                Err(_) => {}
            }
        }
        Ok(())
    }

    /// Path relative to the root, for display.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

pub(crate) fn is_skipped_dir(name: &str) -> bool {
    SKIPPED_DIRS.contains(&name)
}
