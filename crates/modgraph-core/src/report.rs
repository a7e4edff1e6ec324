// Human-readable reference labels and a whole-graph JSON dump.
use chrono::{DateTime, Local};
use serde_json::{Map, Value, json};

use crate::model::{Problem, RefKind, ReferenceId, ResourceId};
use crate::registry::Registry;

fn label_prefix(reg: &Registry, id: ReferenceId, add_mod: bool, out: &mut String) {
    let r = reg.reference(id);
    let prefix = r.kind().prefix();
    if !add_mod && prefix.is_empty() {
        return;
    }
    out.push('[');
    if add_mod {
        let owner = reg.resource(r.definition()).owner();
        out.push_str(reg.get_mod(owner).name());
        if !prefix.is_empty() {
            out.push(' ');
        }
    }
    out.push_str(prefix);
    out.push_str("] ");
}

/// Outgoing form: `[mod kind] origin\n\t->\n\ttarget`, the origin only shown when it
/// differs from both the definition and `context`.
pub fn describe_reference(reg: &Registry, id: ReferenceId, add_mod: bool, context: Option<ResourceId>) -> String {
    if let Some(full) = reg.alias_full_name(id) {
        return format!("[alias] {}", full);
    }
    let r = reg.reference(id);
    let mut out = String::new();
    label_prefix(reg, id, add_mod, &mut out);
    if r.origin() != r.definition() && Some(r.origin()) != context {
        out.push_str(reg.resource(r.origin()).location());
        out.push_str("\n\t->\n\t");
    }
    out.push_str(reg.resource(r.target()).location());
    out
}

/// Incoming form: names the other end as seen from `context`, plus where it was declared.
pub fn describe_reference_sourced(reg: &Registry, id: ReferenceId, add_mod: bool, context: Option<ResourceId>) -> String {
    if let Some(full) = reg.alias_full_name(id) {
        return format!("[alias] {}", full);
    }
    let r = reg.reference(id);
    let mut out = String::new();
    label_prefix(reg, id, add_mod, &mut out);
    let shown = if context == Some(r.origin()) { r.target() } else { r.origin() };
    out.push_str(reg.resource(shown).location());
    if r.definition() != r.origin() {
        out.push_str("\n\t(@ ");
        out.push_str(reg.resource(r.definition()).location());
        out.push(')');
    }
    out
}

fn problem_json(reg: &Registry, p: &Problem) -> Value {
    json!({
        "kind": format!("{:?}", p.kind),
        "resource": p.resource.map(|r| reg.resource(r).location().to_string()),
        "message": p.message,
    })
}

fn reference_json(reg: &Registry, id: ReferenceId) -> Value {
    let r = reg.reference(id);
    let mut map = Map::new();
    map.insert("kind".to_string(), json!(r.kind().prefix()));
    if let RefKind::Alias { .. } = r.kind() {
        map.insert("alias".to_string(), json!(reg.alias_full_name(id)));
    }
    map.insert("definition".to_string(), json!(reg.resource(r.definition()).location()));
    map.insert("origin".to_string(), json!(reg.resource(r.origin()).location()));
    map.insert("target".to_string(), json!(reg.resource(r.target()).location()));
    map.insert("valid".to_string(), json!(reg.reference_valid(id)));
    Value::Object(map)
}

/// The whole graph as one JSON document.
pub fn graph_report(reg: &Registry, built_at: DateTime<Local>) -> Value {
    let mods: Vec<Value> = reg
        .mods()
        .map(|(_, m)| {
            let resources: Vec<Value> = m
                .resources()
                .iter()
                .map(|&id| {
                    let res = reg.resource(id);
                    json!({
                        "location": res.location(),
                        "kind": format!("{:?}", res.kind()),
                        "exists": res.exists(),
                        "valid": res.is_valid(),
                        "references": res.references().iter().map(|&r| reference_json(reg, r)).collect::<Vec<_>>(),
                        "referredBy": res.referred_by().len(),
                    })
                })
                .collect();
            json!({
                "name": m.name(),
                "valid": m.is_valid(),
                "accessible": m.file_system().is_accessible(),
                "errors": m.errors().iter().map(|p| problem_json(reg, p)).collect::<Vec<_>>(),
                "aliases": m.aliases().iter().map(|&a| reference_json(reg, a)).collect::<Vec<_>>(),
                "resources": resources,
            })
        })
        .collect();

    json!({
        "builtAt": built_at.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        "globalErrors": reg.global_errors().iter().map(|p| problem_json(reg, p)).collect::<Vec<_>>(),
        "mods": mods,
    })
}
