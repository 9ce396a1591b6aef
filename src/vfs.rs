//! Resettable in-memory filesystem.
//!
//! [`FileSystem`] carries the operations a build needs. [`Reset`] is kept
//! apart so a build can be handed a filesystem it cannot blank out.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::errors::{unsourced, ErrorKind, SpecError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    #[error("no such file or directory: {}", .0.display())]
    NotFound(PathBuf),
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("is a directory: {}", .0.display())]
    IsADirectory(PathBuf),
    #[error("path escapes the filesystem root: {}", .0.display())]
    OutsideRoot(PathBuf),
}

impl From<VfsError> for SpecError {
    fn from(error: VfsError) -> Self {
        unsourced(
            "io",
            ErrorKind::Io {
                message: error.to_string(),
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    File { len: usize },
    Dir,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        matches!(self, Stat::Dir)
    }
}

/// Paths are absolute under the root, or relative to it.
pub trait FileSystem {
    fn read(&self, path: &Path) -> Result<String, VfsError>;
    /// Creates missing parent directories.
    fn write(&mut self, path: &Path, contents: &str) -> Result<(), VfsError>;
    fn stat(&self, path: &Path) -> Result<Stat, VfsError>;
    fn create_dir_all(&mut self, path: &Path) -> Result<(), VfsError>;
    fn remove(&mut self, path: &Path) -> Result<(), VfsError>;
}

pub trait Reset {
    /// Replace every file with `files` (relative paths). Returns the absolute
    /// paths of the previous files and of the new ones, sorted.
    fn reset(&mut self, files: &BTreeMap<String, String>) -> Result<Vec<PathBuf>, VfsError>;
}

#[derive(Debug, Clone)]
pub struct MemoryFs {
    root: PathBuf,
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
}

impl MemoryFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut dirs = BTreeSet::new();
        dirs.insert(root.clone());
        Self {
            root,
            files: BTreeMap::new(),
            dirs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files.iter().map(|(p, c)| (p.as_path(), c.as_str()))
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, VfsError> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other),
            }
        }
        if !normalized.starts_with(&self.root) {
            return Err(VfsError::OutsideRoot(path.to_path_buf()));
        }
        Ok(normalized)
    }

    fn mkdirp(&mut self, dir: &Path) -> Result<(), VfsError> {
        for ancestor in dir.ancestors() {
            if !ancestor.starts_with(&self.root) {
                break;
            }
            if self.files.contains_key(ancestor) {
                return Err(VfsError::NotADirectory(ancestor.to_path_buf()));
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }
}

impl FileSystem for MemoryFs {
    fn read(&self, path: &Path) -> Result<String, VfsError> {
        let path = self.resolve(path)?;
        if self.dirs.contains(&path) {
            return Err(VfsError::IsADirectory(path));
        }
        self.files.get(&path).cloned().ok_or(VfsError::NotFound(path))
    }

    fn write(&mut self, path: &Path, contents: &str) -> Result<(), VfsError> {
        let path = self.resolve(path)?;
        if self.dirs.contains(&path) {
            return Err(VfsError::IsADirectory(path));
        }
        if let Some(parent) = path.parent() {
            self.mkdirp(parent)?;
        }
        self.files.insert(path, contents.to_string());
        Ok(())
    }

    fn stat(&self, path: &Path) -> Result<Stat, VfsError> {
        let path = self.resolve(path)?;
        if self.dirs.contains(&path) {
            return Ok(Stat::Dir);
        }
        match self.files.get(&path) {
            Some(contents) => Ok(Stat::File {
                len: contents.len(),
            }),
            None => Err(VfsError::NotFound(path)),
        }
    }

    fn create_dir_all(&mut self, path: &Path) -> Result<(), VfsError> {
        let path = self.resolve(path)?;
        self.mkdirp(&path)
    }

    fn remove(&mut self, path: &Path) -> Result<(), VfsError> {
        let path = self.resolve(path)?;
        match self.files.remove(&path) {
            Some(_) => Ok(()),
            None => Err(VfsError::NotFound(path)),
        }
    }
}

impl Reset for MemoryFs {
    fn reset(&mut self, files: &BTreeMap<String, String>) -> Result<Vec<PathBuf>, VfsError> {
        let mut changed: BTreeSet<PathBuf> = self.files.keys().cloned().collect();
        self.files.clear();
        self.dirs.clear();
        self.dirs.insert(self.root.clone());
        for (path, contents) in files {
            self.write(Path::new(path), contents)?;
            changed.insert(self.resolve(Path::new(path))?);
        }
        Ok(changed.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    #[test]
    fn write_creates_parents() {
        let mut fs = MemoryFs::new("/app/src");
        fs.write(Path::new("components/App.svelte"), "<h1/>").unwrap();
        assert!(fs.stat(Path::new("components")).unwrap().is_dir());
        assert_eq!(fs.read(Path::new("/app/src/components/App.svelte")).unwrap(), "<h1/>");
        assert_eq!(
            fs.stat(Path::new("components/App.svelte")).unwrap(),
            Stat::File { len: 5 }
        );
    }

    #[test]
    fn reset_reports_old_and_new_paths() {
        let mut fs = MemoryFs::new("/app/src");
        fs.write(Path::new("old.js"), "old").unwrap();
        let changed = fs.reset(&files(&[("main.js", "main")])).unwrap();
        assert_eq!(
            changed,
            vec![PathBuf::from("/app/src/main.js"), PathBuf::from("/app/src/old.js")]
        );
        assert!(matches!(fs.read(Path::new("old.js")), Err(VfsError::NotFound(_))));
        assert_eq!(fs.read(Path::new("main.js")).unwrap(), "main");
    }

    #[test]
    fn refuses_paths_outside_root() {
        let mut fs = MemoryFs::new("/app/src");
        let err = fs.write(Path::new("../../etc/passwd"), "x").unwrap_err();
        assert!(matches!(err, VfsError::OutsideRoot(_)));
    }

    #[test]
    fn file_in_the_way_of_a_directory() {
        let mut fs = MemoryFs::new("/r");
        fs.write(Path::new("a"), "file").unwrap();
        assert!(matches!(
            fs.create_dir_all(Path::new("a/b")),
            Err(VfsError::NotADirectory(_))
        ));
        let err: SpecError = fs.remove(Path::new("missing")).unwrap_err().into();
        assert!(matches!(err.kind, ErrorKind::Io { .. }));
    }
}
