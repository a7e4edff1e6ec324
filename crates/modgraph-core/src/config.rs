use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Identifiers shown as present-but-broken when nothing backs them.
pub const DEFAULT_FAKE_RESOURCES: &[&str] = &["stonehearth:customization_variants"];

#[derive(Debug, Clone)]
pub struct Config {
    pub mods_root: PathBuf,
    /// Extension (without dot) of archive mods.
    pub archive_extension: String,
    /// `mod:name` identifiers that resolve to a shared placeholder without content.
    pub virtual_resources: HashSet<String>,
    pub fake_resources: HashSet<String>,
    /// Also treat object keys of content JSON as identifiers during discovery.
    pub scan_object_keys: bool,
}

impl Config {
    pub fn new(mods_root: impl Into<PathBuf>) -> Self {
        Self {
            mods_root: mods_root.into(),
            ..Self::default()
        }
    }

    pub fn with_virtual_resources(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.virtual_resources.extend(ids);
        self
    }

    pub fn with_fake_resources(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.fake_resources = ids.into_iter().collect();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mods_root: PathBuf::from("."),
            archive_extension: "smod".to_string(),
            virtual_resources: HashSet::new(),
            fake_resources: DEFAULT_FAKE_RESOURCES.iter().map(|s| s.to_string()).collect(),
            scan_object_keys: false,
        }
    }
}

/// Reads the virtual-resource allow-list: a JSON array of `mod:name` strings.
pub fn load_virtual_resources(path: &Path) -> Result<HashSet<String>> {
    let data = fs::read(path)?;
    let ids: Vec<String> = serde_json::from_slice(&data)?;
    Ok(ids.into_iter().collect())
}
