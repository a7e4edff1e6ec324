use std::fmt;

use crate::fs::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Plain,
    Json,
    Manifest,
    /// Shared per-mod placeholder target (invalid or virtual).
    Sentinel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCategory {
    Html,
    Js,
    Less,
}

impl UiCategory {
    pub const ALL: [UiCategory; 3] = [UiCategory::Html, UiCategory::Js, UiCategory::Less];

    pub fn key(self) -> &'static str {
        match self {
            UiCategory::Html => "html",
            UiCategory::Js => "js",
            UiCategory::Less => "less",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefKind {
    Plain,
    Override,
    Mixinto,
    Alias { name: String },
    Ui(UiCategory),
}

impl RefKind {
    /// Label shown in front of the reference; empty for plain edges.
    pub fn prefix(&self) -> &str {
        match self {
            RefKind::Plain => "",
            RefKind::Override => "override",
            RefKind::Mixinto => "mixinto",
            RefKind::Alias { .. } => "alias",
            RefKind::Ui(cat) => cat.key(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    MissingManifest,
    StructuralManifest,
    UnresolvedReference,
    JsonParse,
    MixintoTypeConflict,
    MixintoInvalid,
    ModOpen,
}

/// A problem found while building the graph. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub kind: ProblemKind,
    pub resource: Option<ResourceId>,
    pub message: String,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

pub struct Mod {
    pub(crate) name: String,
    pub(crate) fs: Box<dyn FileSystem>,
    pub(crate) manifest: ResourceId,
    pub(crate) resources: Vec<ResourceId>,
    pub(crate) aliases: Vec<ReferenceId>,
    pub(crate) overrides: Vec<ReferenceId>,
    pub(crate) mixintos: Vec<ReferenceId>,
    pub(crate) errors: Vec<Problem>,
    pub(crate) valid: bool,
    pub(crate) invalid_resource: Option<ResourceId>,
    pub(crate) virtual_resource: Option<ResourceId>,
}

impl Mod {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn file_system(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }
    pub fn manifest(&self) -> ResourceId {
        self.manifest
    }
    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }
    pub fn aliases(&self) -> &[ReferenceId] {
        &self.aliases
    }
    pub fn overrides(&self) -> &[ReferenceId] {
        &self.overrides
    }
    pub fn mixintos(&self) -> &[ReferenceId] {
        &self.mixintos
    }
    pub fn errors(&self) -> &[Problem] {
        &self.errors
    }
    pub fn is_valid(&self) -> bool {
        self.valid
    }
    /// Declares nothing and owns nothing besides its manifest.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
            && self.overrides.is_empty()
            && self.mixintos.is_empty()
            && self.resources.iter().all(|&r| r == self.manifest)
    }
}

impl fmt::Debug for Mod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mod")
            .field("name", &self.name)
            .field("resources", &self.resources.len())
            .field("aliases", &self.aliases.len())
            .field("errors", &self.errors.len())
            .field("valid", &self.valid)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub(crate) location: String,
    pub(crate) owner: ModId,
    pub(crate) kind: ResourceKind,
    pub(crate) exists: bool,
    pub(crate) valid: bool,
    pub(crate) references: Vec<ReferenceId>,
    pub(crate) referred_by: Vec<ReferenceId>,
}

impl Resource {
    pub fn location(&self) -> &str {
        &self.location
    }
    pub fn owner(&self) -> ModId {
        self.owner
    }
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
    pub fn is_json(&self) -> bool {
        matches!(self.kind, ResourceKind::Json | ResourceKind::Manifest)
    }
    pub fn is_manifest(&self) -> bool {
        self.kind == ResourceKind::Manifest
    }
    pub fn exists(&self) -> bool {
        self.exists
    }
    pub fn is_valid(&self) -> bool {
        self.valid
    }
    /// Outgoing edges.
    pub fn references(&self) -> &[ReferenceId] {
        &self.references
    }
    /// Incoming edges.
    pub fn referred_by(&self) -> &[ReferenceId] {
        &self.referred_by
    }
}

/// Directed edge: `definition` declared it, `origin` owns the content, `target` is
/// what it points at.
#[derive(Debug, Clone)]
pub struct Reference {
    pub(crate) definition: ResourceId,
    pub(crate) origin: ResourceId,
    pub(crate) target: ResourceId,
    pub(crate) kind: RefKind,
}

impl Reference {
    pub fn definition(&self) -> ResourceId {
        self.definition
    }
    pub fn origin(&self) -> ResourceId {
        self.origin
    }
    pub fn target(&self) -> ResourceId {
        self.target
    }
    pub fn kind(&self) -> &RefKind {
        &self.kind
    }
    pub fn alias_name(&self) -> Option<&str> {
        match &self.kind {
            RefKind::Alias { name } => Some(name),
            _ => None,
        }
    }
}
