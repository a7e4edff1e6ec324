//! Resolution engine: mod table, resource interning, JSON parse cache and the
//! deferred discovery queue.
//!
//! A [`Registry`] is built in one go by [`Registry::build`]:
//! 1. discover mods under the configured root,
//! 2. load every manifest (aliases first, then overrides/mixintos/ui/...),
//! 3. walk every queued JSON resource and turn identifier-looking strings into edges.
//!
//! Nothing is ever removed; a new build replaces the whole registry.
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Error;
use crate::fs::{ArchiveFs, DirFs, FileSystem};
use crate::merge::Views;
use crate::model::{
    Mod, ModId, Problem, ProblemKind, RefKind, Reference, ReferenceId, Resource, ResourceId,
    ResourceKind,
};
use crate::pather::{Pather, without_root};
use crate::walker::{self, Visit};
use crate::json;

pub const MANIFEST_FILE: &str = "manifest.json";

const CONTENT_EXTENSIONS: &[&str] = &[
    ".qb", ".json", ".png", ".jpg", ".html", ".js", ".css", ".less", ".lua", ".cur", ".luac",
];

/// Outcome of looking up an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(ResourceId),
    /// Well-formed and owned by a known mod, but nothing backs it.
    Missing(ResourceId),
    /// Unknown mod or not an identifier at all.
    Unresolvable,
}

impl Lookup {
    pub fn resource(self) -> Option<ResourceId> {
        match self {
            Lookup::Found(id) | Lookup::Missing(id) => Some(id),
            Lookup::Unresolvable => None,
        }
    }

    pub fn is_found(self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

pub fn is_file_reference(text: &str) -> bool {
    text.len() >= 6 && text.starts_with("file(") && text.ends_with(')')
}

fn file_reference_inner(text: &str) -> Option<&str> {
    if is_file_reference(text) {
        Some(&text[5..text.len() - 1])
    } else {
        None
    }
}

pub fn has_content_extension(text: &str) -> bool {
    match text.rfind('.') {
        Some(idx) => CONTENT_EXTENSIONS.contains(&&text[idx..]),
        None => false,
    }
}

/// Whether a string found in content could name another resource.
pub fn is_identifier(text: &str) -> bool {
    is_file_reference(text) || text.contains(['/', ':']) || has_content_extension(text)
}

pub struct Registry {
    virtual_resources: HashSet<String>,
    fake_resources: HashSet<String>,
    scan_object_keys: bool,
    pub(crate) mods: Vec<Mod>,
    mod_index: HashMap<String, ModId>,
    pub(crate) resources: Vec<Resource>,
    interned: HashMap<String, ResourceId>,
    pub(crate) references: Vec<Reference>,
    json_cache: HashMap<ResourceId, Option<Value>>,
    queue: VecDeque<ResourceId>,
    global_errors: Vec<Problem>,
    pub(crate) views: Views,
}

impl Registry {
    /// Empty registry; add mods with [`Registry::add_mod`] and call [`Registry::load`].
    pub fn new(config: &Config) -> Self {
        Self {
            virtual_resources: config.virtual_resources.clone(),
            fake_resources: config.fake_resources.clone(),
            scan_object_keys: config.scan_object_keys,
            mods: Vec::new(),
            mod_index: HashMap::new(),
            resources: Vec::new(),
            interned: HashMap::new(),
            references: Vec::new(),
            json_cache: HashMap::new(),
            queue: VecDeque::new(),
            global_errors: Vec::new(),
            views: Views::default(),
        }
    }

    /// Discovers every mod under `config.mods_root` and builds the full graph.
    pub fn build(config: &Config) -> Self {
        let started = Instant::now();
        let mut registry = Self::new(config);
        registry.discover_mods(&config.mods_root, &config.archive_extension);
        registry.load();
        info!(
            mods = registry.mods.len(),
            resources = registry.resources.len(),
            references = registry.references.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "mod graph built"
        );
        registry
    }

    pub fn discover_mods(&mut self, root: &Path, archive_extension: &str) {
        if !root.is_dir() {
            self.report_global(ProblemKind::ModOpen, format!("Mods root {} is not a directory", root.display()));
            return;
        }
        let mut archives = Vec::new();
        let mut directories = Vec::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.report_global(ProblemKind::ModOpen, Error::from(e).to_string());
                    continue;
                }
            };
            let path = entry.path().to_path_buf();
            if entry.file_type().is_dir() {
                directories.push(path);
            } else if path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(archive_extension))
            {
                archives.push(path);
            }
        }

        for path in archives {
            let name = mod_name_of(&path, true);
            match ArchiveFs::open(&path) {
                Ok(fs) => {
                    self.add_mod(&name, Box::new(fs));
                }
                Err(e) => self.report_global(
                    ProblemKind::ModOpen,
                    format!("Cannot open mod archive {}: {}", name, e),
                ),
            }
        }
        for path in directories {
            let name = mod_name_of(&path, false);
            match DirFs::open(&path) {
                Ok(fs) => {
                    self.add_mod(&name, Box::new(fs));
                }
                Err(e) => self.report_global(
                    ProblemKind::ModOpen,
                    format!("Cannot open mod object {}: {}", name, e),
                ),
            }
        }
    }

    /// Registers a mod. A second mod with an already known name is dropped.
    pub fn add_mod(&mut self, name: &str, fs: Box<dyn FileSystem>) -> Option<ModId> {
        if self.mod_index.contains_key(name) {
            debug!(name, "duplicate mod name, ignoring");
            return None;
        }
        let id = ModId(self.mods.len());
        let manifest_exists = fs.exists(MANIFEST_FILE);
        let manifest = ResourceId(self.resources.len());
        self.mods.push(Mod {
            name: name.to_string(),
            fs,
            manifest,
            resources: Vec::new(),
            aliases: Vec::new(),
            overrides: Vec::new(),
            mixintos: Vec::new(),
            errors: Vec::new(),
            valid: manifest_exists,
            invalid_resource: None,
            virtual_resource: None,
        });
        self.mod_index.insert(name.to_string(), id);

        let location = format!("{}/{}", name, MANIFEST_FILE);
        let created = self.create_resource(id, location.clone(), ResourceKind::Manifest, manifest_exists);
        debug_assert_eq!(created, manifest);
        self.interned.insert(location, manifest);
        if !manifest_exists {
            self.report(id, Some(manifest), ProblemKind::MissingManifest, "Manifest missing.".to_string());
        }
        debug!(name, manifest = manifest_exists, "mod added");
        Some(id)
    }

    /// Runs both resolution passes over the registered mods.
    pub fn load(&mut self) {
        let ids: Vec<ModId> = (0..self.mods.len()).map(ModId).collect();
        // Every alias of every mod has to exist before content is walked.
        for &id in &ids {
            self.load_manifest(id);
        }
        for &id in &ids {
            self.load_magic(id);
        }
        self.process_queue();
        for &id in &ids {
            self.check_validity(id);
        }
    }

    // ---- queries ----

    pub fn mods(&self) -> impl Iterator<Item = (ModId, &Mod)> {
        self.mods.iter().enumerate().map(|(i, m)| (ModId(i), m))
    }

    pub fn get_mod(&self, id: ModId) -> &Mod {
        &self.mods[id.0]
    }

    pub fn mod_by_name(&self, name: &str) -> Option<ModId> {
        self.mod_index.get(name).copied()
    }

    pub fn resources(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
        self.resources.iter().enumerate().map(|(i, r)| (ResourceId(i), r))
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0]
    }

    pub fn resource_by_location(&self, location: &str) -> Option<ResourceId> {
        self.interned.get(location).copied()
    }

    pub fn reference(&self, id: ReferenceId) -> &Reference {
        &self.references[id.0]
    }

    pub fn references(&self) -> impl Iterator<Item = (ReferenceId, &Reference)> {
        self.references.iter().enumerate().map(|(i, r)| (ReferenceId(i), r))
    }

    pub fn global_errors(&self) -> &[Problem] {
        &self.global_errors
    }

    pub fn reference_valid(&self, id: ReferenceId) -> bool {
        let r = &self.references[id.0];
        self.resources[r.origin.0].exists && self.resources[r.target.0].exists
    }

    /// `mod:name` of an alias reference.
    pub fn alias_full_name(&self, id: ReferenceId) -> Option<String> {
        let r = &self.references[id.0];
        let name = r.alias_name()?;
        let owner = self.resources[r.definition.0].owner;
        Some(format!("{}:{}", self.mods[owner.0].name, name))
    }

    /// Path of the backing file, as the owning file system names it.
    pub fn full_location(&self, id: ResourceId) -> PathBuf {
        let res = &self.resources[id.0];
        self.mods[res.owner.0].fs.full_name(without_root(&res.location))
    }

    pub fn is_accessible(&self, id: ResourceId) -> bool {
        self.mods[self.resources[id.0].owner.0].fs.is_accessible()
    }

    /// Parsed content of a JSON resource, as written on disk.
    pub fn original_json(&self, id: ResourceId) -> Option<&Value> {
        self.json_cache.get(&id).and_then(Option::as_ref)
    }

    // ---- identifier resolution ----

    /// Finds the declared alias for `mod:name`.
    pub fn parse_alias(&self, name: &str) -> Option<ReferenceId> {
        let (mod_name, alias_name) = name.split_once(':')?;
        let mod_id = self.mod_index.get(mod_name)?;
        self.mods[mod_id.0]
            .aliases
            .iter()
            .copied()
            .find(|a| self.references[a.0].alias_name() == Some(alias_name))
    }

    fn construct_pather(&self, name: &str, context: &str) -> Option<(ModId, Pather)> {
        let pather = match file_reference_inner(name) {
            Some(inner) => {
                let mut p = Pather::parse(context);
                let inner = match inner.strip_prefix('/') {
                    Some(rest) => {
                        p.to_root();
                        rest
                    }
                    None => inner,
                };
                p.apply_str(inner);
                p
            }
            None => Pather::parse(name),
        };
        let mod_id = *self.mod_index.get(pather.root()?)?;
        Some((mod_id, pather))
    }

    /// Whether `name` names something real, seen from the folder `context`.
    pub fn exists(&self, name: &str, context: &str) -> bool {
        match self.construct_pather(name, context) {
            Some((mod_id, mut pather)) => self.probe(mod_id, &mut pather),
            None => self.parse_alias(name).is_some(),
        }
    }

    /// Extension-guessing existence check. May rewrite `pather` to the file found.
    fn probe(&self, mod_id: ModId, pather: &mut Pather) -> bool {
        let fs = self.mods[mod_id.0].fs.as_ref();
        if fs.exists(&pather.rootless()) || self.parse_alias(&pather.to_string()).is_some() {
            return true;
        }
        let Some(last) = pather.last().map(str::to_string) else {
            return false;
        };

        // folder/folder.json
        pather.add(format!("{}.json", last));
        if fs.exists(&pather.rootless()) {
            return true;
        }
        pather.pop();

        let path = pather.rootless();
        let candidates: &[&str] = if last.ends_with(".lua") { &["c"] } else { &[".lua", ".luac"] };
        for suffix in candidates {
            if fs.exists(&format!("{}{}", path, suffix)) {
                pather.pop();
                pather.add(format!("{}{}", last, suffix));
                return true;
            }
        }
        false
    }

    /// Get-or-create the resource `name` refers to, seen from the folder `context`.
    pub fn lookup(&mut self, name: &str, context: &str) -> Lookup {
        if let Some(alias) = self.parse_alias(name) {
            return Lookup::Found(self.references[alias.0].target);
        }
        let Some((mod_id, mut pather)) = self.construct_pather(name, context) else {
            return Lookup::Unresolvable;
        };
        if let Some(&id) = self.interned.get(&pather.to_string()) {
            return self.lookup_of(id);
        }

        let found = self.probe(mod_id, &mut pather);
        let location = pather.to_string();
        if let Some(&id) = self.interned.get(&location) {
            return self.lookup_of(id);
        }

        let kind = if Path::new(&location).extension().and_then(|s| s.to_str()) == Some("json") {
            ResourceKind::Json
        } else {
            ResourceKind::Plain
        };
        let id = self.create_resource(mod_id, location.clone(), kind, found);
        self.interned.insert(location, id);
        if found && kind == ResourceKind::Json {
            self.queue.push_back(id);
        }
        self.lookup_of(id)
    }

    /// Like [`Registry::lookup`], but only finds resources that are already interned.
    pub fn find(&self, name: &str, context: &str) -> Option<ResourceId> {
        if let Some(alias) = self.parse_alias(name) {
            return Some(self.references[alias.0].target);
        }
        let (mod_id, mut pather) = self.construct_pather(name, context)?;
        if let Some(&id) = self.interned.get(&pather.to_string()) {
            return Some(id);
        }
        self.probe(mod_id, &mut pather);
        self.interned.get(&pather.to_string()).copied()
    }

    fn lookup_of(&self, id: ResourceId) -> Lookup {
        if self.resources[id.0].exists {
            Lookup::Found(id)
        } else {
            Lookup::Missing(id)
        }
    }

    /// Resolves a string found inside `context`'s content. With `create`, missing
    /// edges are added to the graph; otherwise only existing edges are returned.
    pub(crate) fn resolve(&mut self, context: ResourceId, value: &str, create: bool) -> Option<ReferenceId> {
        if !is_identifier(value) {
            return None;
        }
        let folder = {
            let mut p = Pather::parse(&self.resources[context.0].location);
            p.pop();
            p.to_string()
        };

        if !create {
            let target = self.find(value, &folder)?;
            return self.resources[context.0]
                .references
                .iter()
                .copied()
                .find(|r| self.references[r.0].target == target);
        }

        if self.exists(value, &folder) || is_file_reference(value) {
            let lookup = self.lookup(value, &folder);
            let target = lookup.resource()?;
            let existing = self.resources[context.0]
                .references
                .iter()
                .copied()
                .find(|r| self.references[r.0].target == target);
            if existing.is_some() {
                return existing;
            }
            if let Some(alias) = self.parse_alias(value) {
                self.link_reference(context, alias);
                return Some(alias);
            }
            if !lookup.is_found() {
                let owner = self.resources[context.0].owner;
                let message = format!("Missing file {} referenced from {}", value, self.resources[context.0].location);
                self.report(owner, Some(context), ProblemKind::UnresolvedReference, message);
            }
            return Some(self.add_reference(context, context, target, RefKind::Plain));
        }

        // `mod:name` of a known mod that declares no such alias.
        let (mod_name, name) = value.split_once(':')?;
        let mod_id = *self.mod_index.get(mod_name)?;
        if name.is_empty() {
            return None;
        }
        let target = if self.virtual_resources.contains(value) {
            self.virtual_resource(mod_id)
        } else if self.fake_resources.contains(value) {
            self.fake_resource(mod_id, value)
        } else {
            let owner = self.resources[context.0].owner;
            let message = format!("Unresolved reference {} in {}", value, self.resources[context.0].location);
            self.report(owner, Some(context), ProblemKind::UnresolvedReference, message);
            self.invalid_resource(mod_id)
        };
        let manifest = self.mods[mod_id.0].manifest;
        let alias = self.add_alias(mod_id, name, manifest, target);
        self.link_reference(context, alias);
        Some(alias)
    }

    fn process_queue(&mut self) {
        while let Some(id) = self.queue.pop_front() {
            let Some(root) = self.load_json(id).cloned() else {
                continue;
            };
            let mut strings = Vec::new();
            let scan_keys = self.scan_object_keys;
            walker::walk(&root, |visit| match visit {
                Visit::Key(key) if scan_keys => strings.push(key.to_string()),
                Visit::Leaf(Value::String(s)) => strings.push(s.clone()),
                _ => {}
            });
            for value in strings {
                self.resolve(id, &value, true);
            }
        }
    }

    // ---- entity construction ----

    fn create_resource(&mut self, owner: ModId, location: String, kind: ResourceKind, exists: bool) -> ResourceId {
        let (exists, valid) = if !exists && self.fake_resources.contains(&location) {
            (true, false)
        } else {
            (exists, exists)
        };
        let id = ResourceId(self.resources.len());
        self.resources.push(Resource {
            location,
            owner,
            kind,
            exists,
            valid,
            references: Vec::new(),
            referred_by: Vec::new(),
        });
        self.mods[owner.0].resources.push(id);

        let json = matches!(kind, ResourceKind::Json | ResourceKind::Manifest);
        if json && exists && self.load_json(id).is_none() {
            self.invalidate(id);
        }
        id
    }

    pub(crate) fn invalid_resource(&mut self, mod_id: ModId) -> ResourceId {
        if let Some(id) = self.mods[mod_id.0].invalid_resource {
            return id;
        }
        let location = format!("{}:<invalid>", self.mods[mod_id.0].name);
        let id = self.create_resource(mod_id, location, ResourceKind::Sentinel, false);
        self.mods[mod_id.0].invalid_resource = Some(id);
        id
    }

    fn virtual_resource(&mut self, mod_id: ModId) -> ResourceId {
        if let Some(id) = self.mods[mod_id.0].virtual_resource {
            return id;
        }
        let location = format!("{}:<virtual>", self.mods[mod_id.0].name);
        let id = self.create_resource(mod_id, location, ResourceKind::Sentinel, true);
        self.mods[mod_id.0].virtual_resource = Some(id);
        id
    }

    fn fake_resource(&mut self, mod_id: ModId, identifier: &str) -> ResourceId {
        if let Some(&id) = self.interned.get(identifier) {
            return id;
        }
        let id = self.create_resource(mod_id, identifier.to_string(), ResourceKind::Plain, false);
        self.interned.insert(identifier.to_string(), id);
        id
    }

    pub(crate) fn add_reference(
        &mut self,
        definition: ResourceId,
        origin: ResourceId,
        target: ResourceId,
        kind: RefKind,
    ) -> ReferenceId {
        let id = ReferenceId(self.references.len());
        self.references.push(Reference { definition, origin, target, kind });
        self.link_reference(definition, id);
        if origin != definition {
            self.link_reference(origin, id);
        }
        self.resources[target.0].referred_by.push(id);
        id
    }

    pub(crate) fn add_alias(&mut self, mod_id: ModId, name: &str, definition: ResourceId, target: ResourceId) -> ReferenceId {
        let id = self.add_reference(definition, definition, target, RefKind::Alias { name: name.to_string() });
        self.mods[mod_id.0].aliases.push(id);
        id
    }

    fn link_reference(&mut self, resource: ResourceId, reference: ReferenceId) {
        self.resources[resource.0].references.push(reference);
        if !self.reference_valid(reference) {
            self.invalidate(resource);
        }
    }

    // ---- validity & problems ----

    /// Marks a resource invalid. One way only.
    pub(crate) fn invalidate(&mut self, id: ResourceId) {
        let res = &mut self.resources[id.0];
        if !res.valid {
            return;
        }
        res.valid = false;
        let owner = res.owner;
        self.check_validity(owner);
    }

    /// Narrows the mod's validity to its errors and owned entities.
    pub fn check_validity(&mut self, id: ModId) {
        let m = &self.mods[id.0];
        if !m.valid {
            return;
        }
        let valid = m.errors.is_empty()
            && m.resources.iter().all(|r| self.resources[r.0].valid)
            && m.aliases.iter().all(|a| self.reference_valid(*a))
            && m.overrides.iter().all(|o| self.reference_valid(*o));
        self.mods[id.0].valid = valid;
    }

    pub(crate) fn report(&mut self, mod_id: ModId, resource: Option<ResourceId>, kind: ProblemKind, message: String) {
        let problem = Problem { kind, resource, message };
        let m = &mut self.mods[mod_id.0];
        if m.errors.contains(&problem) {
            return;
        }
        debug!(module = %m.name, "{}", problem);
        m.errors.push(problem);
        self.check_validity(mod_id);
    }

    fn report_global(&mut self, kind: ProblemKind, message: String) {
        let problem = Problem { kind, resource: None, message };
        warn!("{}", problem);
        self.global_errors.push(problem);
    }

    // ---- JSON ----

    /// Parses a resource's JSON once; failures are cached as `None`.
    pub(crate) fn load_json(&mut self, id: ResourceId) -> Option<&Value> {
        if !self.json_cache.contains_key(&id) {
            let parsed = self.parse_json(id);
            self.json_cache.insert(id, parsed);
        }
        self.json_cache.get(&id).and_then(Option::as_ref)
    }

    fn parse_json(&mut self, id: ResourceId) -> Option<Value> {
        let res = &self.resources[id.0];
        let (owner, location) = (res.owner, res.location.clone());
        let fs = self.mods[owner.0].fs.as_ref();
        let read = fs.open(without_root(&location)).and_then(|mut reader| {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            Ok(data)
        });
        let message = match read {
            Ok(data) => match json::parse_bytes(&data) {
                Ok(value) => return Some(value),
                Err(e) => format!("Parsing json {} failed: {}", location, e),
            },
            Err(e) => format!("Opening {} to parse json failed: {}", location, e),
        };
        self.report(owner, Some(id), ProblemKind::JsonParse, message);
        None
    }
}

fn mod_name_of(path: &Path, strip_extension: bool) -> String {
    let name = if strip_extension { path.file_stem() } else { path.file_name() };
    name.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}
