// Backing storage of a mod: a plain directory or a zip archive (.smod).
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{Error, Result};

/// Minimal file access a mod needs. Paths are rootless and `/`-separated.
pub trait FileSystem {
    fn exists(&self, path: &str) -> bool;

    fn open(&self, path: &str) -> Result<Box<dyn Read + '_>>;

    /// Identifies `path` for humans (absolute path or `archive/entry`).
    fn full_name(&self, path: &str) -> PathBuf;

    /// Whether entries can be opened with an external file browser.
    fn is_accessible(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::NotADirectory(root));
        }
        // Surface permission problems at discovery time rather than on first lookup.
        fs::read_dir(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSystem for DirFs {
    fn exists(&self, path: &str) -> bool {
        self.full_name(path).is_file()
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + '_>> {
        let file = fs::File::open(self.full_name(path))?;
        Ok(Box::new(file))
    }

    fn full_name(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn is_accessible(&self) -> bool {
        true
    }
}

pub struct ArchiveFs {
    archive_path: PathBuf,
    root_folder: String,
    entries: HashSet<String>,
    archive: RefCell<ZipArchive<fs::File>>,
}

impl ArchiveFs {
    pub fn open(archive_path: impl Into<PathBuf>) -> Result<Self> {
        let archive_path = archive_path.into();
        let root_folder = archive_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let file = fs::File::open(&archive_path)?;
        let archive = ZipArchive::new(file)?;
        let entries = archive.file_names().map(str::to_string).collect();
        Ok(Self {
            archive_path,
            root_folder,
            entries,
            archive: RefCell::new(archive),
        })
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    // Entries live under `<stem>/`; archives built on Windows use `\`.
    fn entry_name(&self, path: &str) -> Option<String> {
        let joined = format!("{}/{}", self.root_folder, path);
        let backslashed = joined.replace('/', "\\");
        if self.entries.contains(&backslashed) {
            return Some(backslashed);
        }
        let slashed = joined.replace('\\', "/");
        self.entries.contains(&slashed).then_some(slashed)
    }
}

impl FileSystem for ArchiveFs {
    fn exists(&self, path: &str) -> bool {
        self.entry_name(path).is_some()
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + '_>> {
        let name = self
            .entry_name(path)
            .ok_or_else(|| Error::NotFound(format!("{}/{}", self.archive_path.display(), path)))?;
        let mut archive = self.archive.borrow_mut();
        let mut entry = archive.by_name(&name)?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn full_name(&self, path: &str) -> PathBuf {
        self.archive_path.join(path)
    }

    fn is_accessible(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for ArchiveFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFs")
            .field("archive_path", &self.archive_path)
            .field("entries", &self.entries.len())
            .finish()
    }
}
