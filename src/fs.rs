use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::error::InputError;
use crate::extractors::ExtractorRegistry;

/// Abstraction over file system operations for testing
pub trait FileSystem: Send + Sync {
    /// Read raw file contents
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Read file contents as a string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if a path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// All files below a directory, recursively, in sorted order
    fn walk_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Expand a glob pattern to the matching paths, in sorted order
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>>;
}

/// Real file system implementation using std::fs
#[derive(Debug, Default, Clone)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn walk_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in glob::glob(pattern)? {
            paths.push(entry?);
        }
        paths.sort();
        Ok(paths)
    }
}

fn has_glob_magic(name: &str) -> bool {
    name.contains(['*', '?', '['])
}

/// Read a `--files-from` list: one name per line, blank lines ignored.
pub fn read_file_list(fs: &dyn FileSystem, path: &Path) -> Result<Vec<String>, InputError> {
    let content = fs
        .read_to_string(path)
        .map_err(|err| InputError::Unreadable {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Locate `name` as given, then below each search directory in turn.
pub fn find_file(fs: &dyn FileSystem, name: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    let candidate = PathBuf::from(name);
    if fs.exists(&candidate) {
        return Some(candidate);
    }
    if candidate.is_absolute() {
        return None;
    }
    search_paths
        .iter()
        .map(|dir| dir.join(name))
        .find(|path| fs.exists(path))
}

/// Turn the command line names into the list of files to scan.
///
/// Names are deduplicated, glob patterns expanded and directories walked
/// for files with a registered extension. Every named file must exist and
/// have an extractor.
pub fn resolve_inputs(
    fs: &dyn FileSystem,
    names: &[String],
    search_paths: &[PathBuf],
    registry: &ExtractorRegistry,
) -> Result<Vec<PathBuf>, InputError> {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut push = |path: PathBuf| {
        if !files.contains(&path) {
            files.push(path);
        }
    };

    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if seen.contains(&name.as_str()) {
            continue;
        }
        seen.push(name);

        let matches = if has_glob_magic(name) {
            let matches = fs.glob(name).map_err(|err| InputError::Unreadable {
                path: name.clone(),
                message: err.to_string(),
            })?;
            if matches.is_empty() {
                return Err(InputError::NotFound(name.clone()));
            }
            matches
        } else {
            let path = find_file(fs, name, search_paths)
                .ok_or_else(|| InputError::NotFound(name.clone()))?;
            vec![path]
        };

        for path in matches {
            if fs.is_dir(&path) {
                let walked = fs.walk_files(&path).map_err(|err| InputError::Unreadable {
                    path: path.display().to_string(),
                    message: err.to_string(),
                })?;
                walked
                    .into_iter()
                    .filter(|file| registry.supports(&file.to_string_lossy()))
                    .for_each(&mut push);
            } else if registry.supports(&path.to_string_lossy()) {
                push(path);
            } else {
                return Err(InputError::NoExtractor(name.clone()));
            }
        }
    }
    Ok(files)
}

/// In-memory file system for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::{Arc, RwLock};

    #[derive(Debug, Default, Clone)]
    pub struct InMemoryFileSystem {
        files: Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>,
        directories: Arc<RwLock<BTreeSet<PathBuf>>>,
    }

    impl InMemoryFileSystem {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a file to the mock file system
        pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
            let path = path.as_ref().to_path_buf();
            // Add all parent directories
            if let Some(parent) = path.parent() {
                let mut current = PathBuf::new();
                for component in parent.components() {
                    current.push(component);
                    self.directories.write().unwrap().insert(current.clone());
                }
            }
            self.files.write().unwrap().insert(path, contents.into());
        }
    }

    impl FileSystem for InMemoryFileSystem {
        fn read(&self, path: &Path) -> Result<Vec<u8>> {
            self.files
                .read()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("File not found: {}", path.display()))
        }

        fn read_to_string(&self, path: &Path) -> Result<String> {
            Ok(String::from_utf8(self.read(path)?)?)
        }

        fn exists(&self, path: &Path) -> bool {
            self.is_file(path) || self.is_dir(path)
        }

        fn is_file(&self, path: &Path) -> bool {
            self.files.read().unwrap().contains_key(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.directories.read().unwrap().contains(path)
        }

        fn walk_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
            Ok(self
                .files
                .read()
                .unwrap()
                .keys()
                .filter(|path| path.starts_with(dir))
                .cloned()
                .collect())
        }

        fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
            let pattern = glob::Pattern::new(pattern)?;
            Ok(self
                .files
                .read()
                .unwrap()
                .keys()
                .filter(|path| pattern.matches_path(path))
                .cloned()
                .collect())
        }
    }
}
