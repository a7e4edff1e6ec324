//! modgraph-core: cross-mod reference graph for game-content mods
//!
//! This crate focuses on a small, well-factored surface:
//! - File access for directory and archive (.smod) mods
//! - Identifier resolution with path algebra, aliases and extension guessing
//! - Graph of mods, resources and references with monotonic validity
//! - Mixinto merging and the merged/resolved JSON views of every content file
//!
pub mod config;
pub mod error;
pub mod fs;
pub mod json;
mod manifest;
pub mod merge;
pub mod model;
pub mod pather;
pub mod registry;
pub mod report;
pub mod session;
pub mod walker;

pub use config::{Config, load_virtual_resources};
pub use error::{Error, Result};
pub use fs::{ArchiveFs, DirFs, FileSystem};
pub use merge::{MergeConflict, View, merge};
pub use model::{
    Mod, ModId, Problem, ProblemKind, RefKind, Reference, ReferenceId, Resource, ResourceId,
    ResourceKind, UiCategory,
};
pub use pather::Pather;
pub use registry::{Lookup, Registry, is_identifier};
pub use session::Session;
