use chrono::{DateTime, Local};
use tracing::info;

use crate::config::Config;
use crate::registry::Registry;

type RebuildListener = Box<dyn FnMut(&Registry, u64)>;

/// Owns the current graph. Rebuilding replaces it wholesale; ids from an older
/// generation must not be used with the new registry.
pub struct Session {
    config: Config,
    registry: Registry,
    generation: u64,
    built_at: DateTime<Local>,
    listeners: Vec<RebuildListener>,
}

impl Session {
    pub fn open(config: Config) -> Self {
        let registry = Registry::build(&config);
        Self {
            config,
            registry,
            generation: 1,
            built_at: Local::now(),
            listeners: Vec::new(),
        }
    }

    /// Discards the graph and builds a new one from disk, then notifies listeners.
    pub fn rebuild(&mut self) {
        info!(root = %self.config.mods_root.display(), "rebuilding mod graph");
        self.registry = Registry::build(&self.config);
        self.generation += 1;
        self.built_at = Local::now();
        for listener in &mut self.listeners {
            listener(&self.registry, self.generation);
        }
    }

    /// Called with the new registry and its generation after every rebuild.
    pub fn on_rebuild(&mut self, listener: impl FnMut(&Registry, u64) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Takes effect on the next rebuild.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access for the lazily computed JSON views.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Local> {
        self.built_at
    }
}
