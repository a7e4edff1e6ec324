// Manifest loading: turns the declarations of a mod's manifest.json into graph edges.
// Every field is read independently; a field with the wrong shape is reported and
// skipped. Every declared edge gets a target object, even when it cannot be resolved.
use serde_json::{Map, Value};

use crate::json::JsonKind;
use crate::model::{ModId, ProblemKind, RefKind, ResourceId, UiCategory};
use crate::registry::{Lookup, Registry};

const INIT_SCRIPTS: [&str; 2] = ["server_init_script", "client_init_script"];

impl Registry {
    fn manifest_root(&self, mod_id: ModId) -> Option<Value> {
        let manifest = self.mods[mod_id.0].manifest;
        if !self.resources[manifest.0].exists() {
            return None;
        }
        self.original_json(manifest).cloned()
    }

    /// First pass: the `aliases` table.
    pub(crate) fn load_manifest(&mut self, mod_id: ModId) {
        let Some(root) = self.manifest_root(mod_id) else {
            return;
        };
        let Some(aliases) = self.expect_object(mod_id, root.get("aliases"), "aliases") else {
            return;
        };
        let manifest = self.mods[mod_id.0].manifest;
        let mod_name = self.mods[mod_id.0].name.clone();
        for (name, value) in aliases {
            let target = match value.as_str() {
                Some(identifier) => match self.lookup(identifier, &mod_name) {
                    Lookup::Found(id) => id,
                    Lookup::Missing(id) => {
                        let message = format!(
                            "Missing alias resource for {}:{}: {} not found",
                            mod_name,
                            name,
                            self.resources[id.0].location()
                        );
                        self.report(mod_id, Some(manifest), ProblemKind::UnresolvedReference, message);
                        id
                    }
                    Lookup::Unresolvable => {
                        let message = format!(
                            "Invalid alias value for {}:{}: unknown string {}",
                            mod_name, name, identifier
                        );
                        self.report(mod_id, Some(manifest), ProblemKind::UnresolvedReference, message);
                        self.invalid_resource(mod_id)
                    }
                },
                None => {
                    let message = format!(
                        "Invalid alias value for {}:{}: expected string, got {}",
                        mod_name,
                        name,
                        JsonKind::of(value)
                    );
                    self.report(mod_id, Some(manifest), ProblemKind::StructuralManifest, message);
                    self.invalid_resource(mod_id)
                }
            };
            self.add_alias(mod_id, name, manifest, target);
        }
    }

    /// Second pass: overrides, mixintos, ui, functions, components and init scripts.
    pub(crate) fn load_magic(&mut self, mod_id: ModId) {
        let Some(root) = self.manifest_root(mod_id) else {
            self.check_validity(mod_id);
            return;
        };
        let manifest = self.mods[mod_id.0].manifest;

        if let Some(overrides) = self.expect_object(mod_id, root.get("overrides"), "overrides") {
            self.load_pairs(mod_id, overrides, RefKind::Override);
        }
        if let Some(mixintos) = self.expect_object(mod_id, root.get("mixintos"), "mixintos") {
            self.load_pairs(mod_id, mixintos, RefKind::Mixinto);
        }

        if let Some(ui) = self.expect_object(mod_id, root.get("ui"), "ui") {
            for category in UiCategory::ALL {
                let what = format!("ui.{}", category.key());
                let Some(items) = self.expect_array(mod_id, ui.get(category.key()), &what) else {
                    continue;
                };
                for item in items {
                    match item.as_str() {
                        Some(identifier) => {
                            let target = self.resolve_declared(mod_id, identifier, &what);
                            self.add_reference(manifest, manifest, target, RefKind::Ui(category));
                        }
                        None => self.structural(
                            mod_id,
                            format!("Invalid {} element of type {}", what, JsonKind::of(item)),
                        ),
                    }
                }
            }
        }

        for (field, label) in [("functions", "Function"), ("components", "Component")] {
            let Some(entries) = self.expect_object(mod_id, root.get(field), field) else {
                continue;
            };
            for (key, value) in entries {
                let identifier = match value {
                    Value::String(s) => s.as_str(),
                    Value::Object(def) => match def.get("controller") {
                        Some(Value::String(s)) => s.as_str(),
                        Some(other) => {
                            let message = format!(
                                "{} controller {} has invalid type {}",
                                label,
                                key,
                                JsonKind::of(other)
                            );
                            self.structural(mod_id, message);
                            continue;
                        }
                        None => {
                            self.structural(mod_id, format!("{} {} has no controller", label, key));
                            continue;
                        }
                    },
                    other => {
                        let message = format!("{} {} has invalid type {}", label, key, JsonKind::of(other));
                        self.structural(mod_id, message);
                        continue;
                    }
                };
                let target = self.resolve_declared(mod_id, identifier, &format!("{} {}", label, key));
                self.add_alias(mod_id, key, manifest, target);
            }
        }

        for script in INIT_SCRIPTS {
            let value = match root.get(script) {
                None => continue,
                Some(Value::String(s)) => s,
                Some(other) => {
                    self.structural(mod_id, format!("{} has invalid type {}", script, JsonKind::of(other)));
                    continue;
                }
            };
            let target = self.resolve_declared(mod_id, value, script);
            self.add_reference(manifest, manifest, target, RefKind::Plain);
        }

        self.check_validity(mod_id);
    }

    // `target -> source | [source, ...]` tables.
    fn load_pairs(&mut self, mod_id: ModId, table: &Map<String, Value>, kind: RefKind) {
        let manifest = self.mods[mod_id.0].manifest;
        let label = kind.prefix().to_string();
        for (key, value) in table {
            let sources: Vec<&str> = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => {
                    let mut sources = Vec::with_capacity(items.len());
                    for item in items {
                        match item.as_str() {
                            Some(s) => sources.push(s),
                            None => self.structural(
                                mod_id,
                                format!(
                                    "Invalid reference value type {} in array of {}",
                                    JsonKind::of(item),
                                    key
                                ),
                            ),
                        }
                    }
                    sources
                }
                other => {
                    let message = format!("Invalid reference value type {} for {}", JsonKind::of(other), key);
                    self.structural(mod_id, message);
                    continue;
                }
            };

            let target = self.resolve_declared(mod_id, key, &format!("{} key", label));
            for source in sources {
                let origin = self.resolve_declared(mod_id, source, &format!("{} of {}", label, key));
                let id = self.add_reference(manifest, origin, target, kind.clone());
                match kind {
                    RefKind::Override => self.mods[mod_id.0].overrides.push(id),
                    RefKind::Mixinto => self.mods[mod_id.0].mixintos.push(id),
                    _ => {}
                }
            }
        }
    }

    /// Looks up an identifier declared by the manifest. Missing targets are kept,
    /// unresolvable ones become the mod's invalid sentinel; both are reported.
    fn resolve_declared(&mut self, mod_id: ModId, identifier: &str, what: &str) -> ResourceId {
        let manifest = self.mods[mod_id.0].manifest;
        let mod_name = self.mods[mod_id.0].name.clone();
        match self.lookup(identifier, &mod_name) {
            Lookup::Found(id) => id,
            Lookup::Missing(id) => {
                let message = format!(
                    "Missing resource for {} ({}): {} not found",
                    what,
                    identifier,
                    self.resources[id.0].location()
                );
                self.report(mod_id, Some(manifest), ProblemKind::UnresolvedReference, message);
                id
            }
            Lookup::Unresolvable => {
                let message = format!("Invalid reference for {}: unknown identifier {}", what, identifier);
                self.report(mod_id, Some(manifest), ProblemKind::UnresolvedReference, message);
                self.invalid_resource(mod_id)
            }
        }
    }

    fn structural(&mut self, mod_id: ModId, message: String) {
        let manifest = self.mods[mod_id.0].manifest;
        self.report(mod_id, Some(manifest), ProblemKind::StructuralManifest, message);
    }

    fn expect_object<'v>(&mut self, mod_id: ModId, value: Option<&'v Value>, what: &str) -> Option<&'v Map<String, Value>> {
        match value? {
            Value::Object(map) => Some(map),
            other => {
                self.structural(mod_id, format!("{} has invalid type {}", what, JsonKind::of(other)));
                None
            }
        }
    }

    fn expect_array<'v>(&mut self, mod_id: ModId, value: Option<&'v Value>, what: &str) -> Option<&'v Vec<Value>> {
        match value? {
            Value::Array(items) => Some(items),
            other => {
                self.structural(mod_id, format!("{} has invalid type {}", what, JsonKind::of(other)));
                None
            }
        }
    }
}
