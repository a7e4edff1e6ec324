// Mixinto merging and the derived JSON views of a resource.
// - `merge` overlays one JSON tree onto another (objects recurse, arrays prepend,
//   scalars replace).
// - `Registry::token` is the raw content with every mixinto applied.
// - `Registry::final_token` is the same with identifiers rewritten to locations first.
// Views are computed on first request and memoized per registry.
use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::json::{JsonKind, child_pointer};
use crate::model::{ProblemKind, RefKind, ReferenceId, ResourceId};
use crate::registry::Registry;
use crate::walker;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeConflict {
    #[error("types for {pointer} differ (original: {base}; mixinto: {overlay})")]
    TypeConflict {
        pointer: String,
        base: JsonKind,
        overlay: JsonKind,
    },
    #[error("invalid mixinto type {kind} at {pointer}")]
    UnsupportedKind { pointer: String, kind: JsonKind },
}

/// Overlays `overlay` onto `base` in place. Conflicting subtrees keep the base value;
/// all conflicts are returned.
pub fn merge(base: &mut Value, overlay: &Value) -> Result<(), Vec<MergeConflict>> {
    let mut conflicts = Vec::new();
    merge_at(base, overlay, "/", &mut conflicts);
    if conflicts.is_empty() { Ok(()) } else { Err(conflicts) }
}

fn merge_at(base: &mut Value, overlay: &Value, pointer: &str, conflicts: &mut Vec<MergeConflict>) {
    let (base_kind, overlay_kind) = (JsonKind::of(base), JsonKind::of(overlay));
    match (base_kind, overlay_kind) {
        (JsonKind::Object, JsonKind::Object) => {
            if let (Value::Object(base_map), Value::Object(overlay_map)) = (base, overlay) {
                for (key, value) in overlay_map {
                    match base_map.get_mut(key) {
                        Some(slot) => merge_at(slot, value, &child_pointer(pointer, key), conflicts),
                        None => {
                            base_map.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
        }
        (JsonKind::Array, JsonKind::Array) => {
            if let (Value::Array(base_items), Value::Array(overlay_items)) = (base, overlay) {
                let tail = std::mem::take(base_items);
                base_items.extend(overlay_items.iter().cloned());
                base_items.extend(tail);
            }
        }
        (a, b) if a.is_number() && b.is_number() => *base = overlay.clone(),
        (JsonKind::String, JsonKind::String) => *base = overlay.clone(),
        (a, b) if a == b => conflicts.push(MergeConflict::UnsupportedKind {
            pointer: pointer.to_string(),
            kind: b,
        }),
        (JsonKind::Null, _) | (_, JsonKind::Null) => *base = overlay.clone(),
        (a, b) => conflicts.push(MergeConflict::TypeConflict {
            pointer: pointer.to_string(),
            base: a,
            overlay: b,
        }),
    }
}

/// Which rendition of a JSON resource to read.
///
/// Merged and final views are memoized. Inside a mixinto cycle the edge that closes
/// the cycle is skipped, so a view computed while the cycle was open stays partial:
/// it lacks the overlay of the resource that started the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// As parsed from disk.
    Raw,
    /// With mixintos applied.
    Merged,
    /// Identifiers resolved, then mixintos applied.
    Final,
}

#[derive(Debug, Default)]
pub(crate) struct Views {
    merged: HashMap<ResourceId, Option<Value>>,
    resolved: HashMap<ResourceId, Option<Value>>,
    in_progress: HashSet<(ResourceId, View)>,
}

impl Registry {
    pub fn view(&mut self, id: ResourceId, view: View) -> Option<&Value> {
        match view {
            View::Raw => self.original_json(id),
            View::Merged => self.token(id),
            View::Final => self.final_token(id),
        }
    }

    /// Raw content with every mixinto applied, or `None` for non-JSON or unparsable
    /// resources. Problems found on the way are reported against the overlay's mod.
    /// A resource on a mixinto cycle gets a partial view, see [`View`].
    pub fn token(&mut self, id: ResourceId) -> Option<&Value> {
        if !self.views.merged.contains_key(&id) {
            let value = self.compute_view(id, View::Merged);
            self.views.merged.insert(id, value);
        }
        self.views.merged.get(&id).and_then(Option::as_ref)
    }

    pub fn final_token(&mut self, id: ResourceId) -> Option<&Value> {
        if !self.views.resolved.contains_key(&id) {
            let value = self.compute_view(id, View::Final);
            self.views.resolved.insert(id, value);
        }
        self.views.resolved.get(&id).and_then(Option::as_ref)
    }

    /// Content with every identifier that has an edge rewritten to its target's location.
    pub fn resolved_json(&mut self, id: ResourceId) -> Option<Value> {
        let mut root = self.original_json(id)?.clone();
        walker::walk_leaves_mut(&mut root, |leaf| {
            if let Value::String(s) = leaf
                && let Some(reference) = self.resolve(id, s, false)
            {
                let target = self.references[reference.0].target();
                *leaf = Value::String(self.resources[target.0].location().to_string());
            }
        });
        Some(root)
    }

    fn compute_view(&mut self, id: ResourceId, view: View) -> Option<Value> {
        if !self.resources[id.0].is_json() {
            return None;
        }
        let mut root = match view {
            View::Final => self.resolved_json(id)?,
            _ => self.original_json(id)?.clone(),
        };

        self.views.in_progress.insert((id, view));
        let incoming: Vec<ReferenceId> = self.resources[id.0]
            .referred_by()
            .iter()
            .copied()
            .filter(|r| *self.references[r.0].kind() == RefKind::Mixinto)
            .collect();
        for reference in incoming {
            let (definition, origin) = {
                let r = &self.references[reference.0];
                (r.definition(), r.origin())
            };
            let source = &self.resources[origin.0];
            if source.is_manifest() {
                continue;
            }
            let (source_json, source_owner) = (source.is_json(), source.owner());
            let pair = format!("{} into {}", source.location(), self.resources[id.0].location());
            if !source_json {
                let owner = self.resources[definition.0].owner();
                let message = format!("Invalid mixinto {}: origin is not a json file", pair);
                self.report(owner, Some(definition), ProblemKind::MixintoInvalid, message);
                continue;
            }
            if self.views.in_progress.contains(&(origin, view)) {
                let message = format!("Cannot mixinto {}: mixinto cycle", pair);
                self.report(source_owner, Some(origin), ProblemKind::MixintoInvalid, message);
                continue;
            }
            let overlay = match view {
                View::Final => self.final_token(origin).cloned(),
                _ => self.token(origin).cloned(),
            };
            self.apply_overlay(id, origin, &mut root, overlay);
        }
        self.views.in_progress.remove(&(id, view));
        Some(root)
    }

    fn apply_overlay(&mut self, target: ResourceId, source: ResourceId, base: &mut Value, overlay: Option<Value>) {
        let owner = self.resources[source.0].owner();
        let describe = format!(
            "Cannot mixinto {} into {}",
            self.resources[source.0].location(),
            self.resources[target.0].location()
        );
        let Some(overlay) = overlay else {
            let message = format!("{}: mixinto has invalid JSON", describe);
            self.report(owner, Some(source), ProblemKind::MixintoInvalid, message);
            return;
        };
        let Err(conflicts) = merge(base, &overlay) else {
            return;
        };
        let mut type_conflict = false;
        for conflict in conflicts {
            let kind = match conflict {
                MergeConflict::TypeConflict { .. } => {
                    type_conflict = true;
                    ProblemKind::MixintoTypeConflict
                }
                MergeConflict::UnsupportedKind { .. } => ProblemKind::MixintoInvalid,
            };
            self.report(owner, Some(source), kind, format!("{}: {}", describe, conflict));
        }
        if type_conflict {
            self.invalidate(source);
        }
    }
}
