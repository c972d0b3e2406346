// ABOUTME: Filesystem capability used by the export writers
// ABOUTME: Real disk with atomic writes, plus an in-memory tree for tests

use filetime::FileTime;
use rand::Rng;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Every storage operation the sync engine performs.
pub trait FileSystem {
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Removes an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Modification time of a file, or `None` if it does not exist.
    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>>;

    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()>;

    fn is_dir(&self, path: &Path) -> bool;

    /// All regular files below `root`, recursively, in sorted order.
    fn files_under(&self, root: &Path) -> io::Result<Vec<PathBuf>>;

    /// All directories strictly below `root`, deepest first.
    fn dirs_under(&self, root: &Path) -> io::Result<Vec<PathBuf>>;

    fn is_empty_dir(&self, path: &Path) -> io::Result<bool>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        write_atomic(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>> {
        match fs::metadata(path) {
            Ok(meta) => meta.modified().map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        filetime::set_file_mtime(path, FileTime::from_system_time(modified))
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn files_under(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn dirs_under(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .contents_first(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }
        Ok(dirs)
    }

    fn is_empty_dir(&self, path: &Path) -> io::Result<bool> {
        Ok(fs::read_dir(path)?.next().is_none())
    }
}

/// Temp files left behind by an interrupted `write_atomic`.
pub fn is_partial_write(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(".part")
}

/// Writes through a randomly named `.part` sibling and renames it into place,
/// so readers never observe a half-written file.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;

    let random: u32 = rand::thread_rng().gen();
    let tmp_path = parent.join(format!(
        ".{}.{:x}.part",
        file_name.to_string_lossy(),
        random
    ));

    fs::write(&tmp_path, content)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    Ok(())
}

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct MemoryTree {
    files: BTreeMap<PathBuf, MemoryFile>,
    dirs: BTreeSet<PathBuf>,
}

impl MemoryTree {
    fn has_children(&self, dir: &Path) -> bool {
        self.files.keys().any(|p| p.parent() == Some(dir))
            || self.dirs.iter().any(|p| p.parent() == Some(dir))
    }
}

/// In-memory filesystem. Writes stamp the current time unless a test
/// overrides it with [`FileSystem::set_modified`].
#[derive(Debug, Default)]
pub struct MemoryFs {
    tree: RefCell<MemoryTree>,
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(ErrorKind::NotFound, format!("{} not found", path.display()))
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, path: &Path) -> bool {
        let tree = self.tree.borrow();
        tree.files.contains_key(path) || tree.dirs.contains(path)
    }
}

impl FileSystem for MemoryFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.tree.borrow_mut();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            if tree.files.contains_key(ancestor) {
                return Err(io::Error::new(
                    ErrorKind::AlreadyExists,
                    format!("{} is a file", ancestor.display()),
                ));
            }
            tree.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut tree = self.tree.borrow_mut();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !tree.dirs.contains(parent) {
                return Err(not_found(parent));
            }
        }
        if tree.dirs.contains(path) {
            return Err(io::Error::new(
                ErrorKind::Other,
                format!("{} is a directory", path.display()),
            ));
        }
        tree.files.insert(
            path.to_path_buf(),
            MemoryFile {
                contents: contents.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let tree = self.tree.borrow();
        let file = tree.files.get(path).ok_or_else(|| not_found(path))?;
        String::from_utf8(file.contents.clone())
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.tree
            .borrow_mut()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.tree.borrow_mut();
        if !tree.dirs.contains(path) {
            return Err(not_found(path));
        }
        if tree.has_children(path) {
            return Err(io::Error::new(
                ErrorKind::Other,
                format!("{} is not empty", path.display()),
            ));
        }
        tree.dirs.remove(path);
        Ok(())
    }

    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>> {
        Ok(self.tree.borrow().files.get(path).map(|f| f.modified))
    }

    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        let mut tree = self.tree.borrow_mut();
        let file = tree.files.get_mut(path).ok_or_else(|| not_found(path))?;
        file.modified = modified;
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.tree.borrow().dirs.contains(path)
    }

    fn files_under(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .tree
            .borrow()
            .files
            .keys()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect())
    }

    fn dirs_under(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs: Vec<PathBuf> = self
            .tree
            .borrow()
            .dirs
            .iter()
            .filter(|p| p.starts_with(root) && p.as_path() != root)
            .cloned()
            .collect();
        dirs.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        Ok(dirs)
    }

    fn is_empty_dir(&self, path: &Path) -> io::Result<bool> {
        let tree = self.tree.borrow();
        if !tree.dirs.contains(path) {
            return Err(not_found(path));
        }
        Ok(!tree.has_children(path))
    }
}

#[cfg(test)]
mod os_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("test.txt");
        write_atomic(&target, b"hello").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_partial_write_names() {
        assert!(is_partial_write(".Standup_aaa11111.txt.1f2e.part"));
        assert!(!is_partial_write("Standup_aaa11111.txt"));
        assert!(!is_partial_write("notes.part"));
    }

    #[test]
    fn test_write_atomic_missing_parent_fails() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("missing").join("test.txt");
        assert!(write_atomic(&target, b"hello").is_err());
    }

    #[test]
    fn test_os_modified_missing_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(OsFs.modified(&temp.path().join("nope")).unwrap().is_none());
    }

    #[test]
    fn test_os_set_modified() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("old.txt");
        fs::write(&target, "x").unwrap();

        let past = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        OsFs.set_modified(&target, past).unwrap();
        assert_eq!(OsFs.modified(&target).unwrap(), Some(past));
    }

    #[test]
    fn test_os_dirs_under_deepest_first() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b/c")).unwrap();
        fs::create_dir_all(temp.path().join("d")).unwrap();

        let dirs = OsFs.dirs_under(temp.path()).unwrap();
        let pos = |rel: &str| dirs.iter().position(|d| d == &temp.path().join(rel)).unwrap();
        assert_eq!(dirs.len(), 4);
        assert!(pos("a/b/c") < pos("a/b"));
        assert!(pos("a/b") < pos("a"));
    }

    #[test]
    fn test_os_files_under_recurses() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::write(temp.path().join("root.txt"), "r").unwrap();
        fs::write(temp.path().join("a/inner.txt"), "i").unwrap();

        let files = OsFs.files_under(temp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.contains(&temp.path().join("a/inner.txt")));
    }
}
