use std::cell::Cell;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::rc::Rc;

use modgraph_core::{
    Config, DirFs, Lookup, Pather, ProblemKind, RefKind, Registry, ResourceKind, Session,
    is_identifier,
};

fn write(root: &Path, rel: &str, content: &str) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, content).unwrap();
}

fn build(root: &Path) -> Registry {
    Registry::build(&Config::new(root))
}

fn location(reg: &Registry, lookup: Lookup) -> String {
    reg.resource(lookup.resource().unwrap()).location().to_string()
}

#[test]
fn pather_algebra() {
    let mut p = Pather::parse("a/b/c");
    p.apply_str("../../d");
    assert_eq!(p, Pather::parse("a/d"));
    assert_eq!(Pather::parse("a/b").rootless(), "b");
    assert_eq!(Pather::parse("/a/b").root(), Some("a"));

    let mut p = Pather::parse("m/x");
    p.apply_str("./y/../../../z");
    assert_eq!(p.to_string(), "m/z");
}

#[test]
fn identifier_heuristics() {
    assert!(is_identifier("file(foo)"));
    assert!(is_identifier("stonehearth:foo"));
    assert!(is_identifier("a/b"));
    assert!(is_identifier("icon.png"));
    assert!(is_identifier("script.luac"));
    assert!(!is_identifier("hello world"));
    assert!(!is_identifier("file.txt"));
}

#[test]
fn interning_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "m/manifest.json", "{}");
    write(dir.path(), "m/entities/foo/foo.json", "{}");
    let mut reg = build(dir.path());

    let first = reg.lookup("m/entities/foo", "m");
    let second = reg.lookup("m/entities/foo", "m");
    assert!(first.is_found());
    assert_eq!(first, second);
    assert_eq!(location(&reg, first), "m/entities/foo/foo.json");
    assert_eq!(reg.lookup("file(foo.json)", "m/entities/foo"), first);
    assert_eq!(reg.lookup("file(/entities/foo/foo.json)", "m/entities/foo"), first);
    assert_eq!(reg.resource(first.resource().unwrap()).kind(), ResourceKind::Json);
}

#[test]
fn probe_guesses_script_extensions() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/manifest.json", "{}");
    write(dir.path(), "src/scripts/foo.lua", "return {}");
    write(dir.path(), "bin/manifest.json", "{}");
    write(dir.path(), "bin/scripts/foo.luac", "\x1bLua");
    let mut reg = build(dir.path());

    let lua = reg.lookup("src/scripts/foo", "src");
    assert!(lua.is_found());
    assert_eq!(location(&reg, lua), "src/scripts/foo.lua");

    let compiled = reg.lookup("bin/scripts/foo", "bin");
    assert!(compiled.is_found());
    assert_eq!(location(&reg, compiled), "bin/scripts/foo.luac");
    assert_eq!(reg.lookup("bin/scripts/foo.lua", "bin"), compiled);

    let missing = reg.lookup("bin/scripts/nothing", "bin");
    assert!(matches!(missing, Lookup::Missing(_)));
    assert_eq!(reg.lookup("nomod/scripts/foo", "bin"), Lookup::Unresolvable);
}

#[test]
fn alias_wins_over_literal_path() {
    let real = tempfile::tempdir().unwrap();
    write(real.path(), "manifest.json", r#"{"aliases":{"foo":"file(real.json)"}}"#);
    write(real.path(), "real.json", "{}");
    let literal = tempfile::tempdir().unwrap();
    write(literal.path(), "m:foo.json", "{}");

    // Without aliases loaded the identifier is a plain path into mod `m:foo`.
    let mut plain = Registry::new(&Config::default());
    plain.add_mod("m", Box::new(DirFs::open(real.path()).unwrap()));
    plain.add_mod("m:foo", Box::new(DirFs::open(literal.path()).unwrap()));
    let found = plain.lookup("m:foo", "m");
    assert_eq!(location(&plain, found), "m:foo/m:foo.json");

    let mut reg = Registry::new(&Config::default());
    reg.add_mod("m", Box::new(DirFs::open(real.path()).unwrap()));
    reg.add_mod("m:foo", Box::new(DirFs::open(literal.path()).unwrap()));
    reg.load();
    let found = reg.lookup("m:foo", "m");
    assert_eq!(location(&reg, found), "m/real.json");
}

#[test]
fn duplicate_mod_names_are_ignored() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let mut reg = Registry::new(&Config::default());
    assert!(reg.add_mod("m", Box::new(DirFs::open(a.path()).unwrap())).is_some());
    assert!(reg.add_mod("m", Box::new(DirFs::open(b.path()).unwrap())).is_none());
    assert_eq!(reg.mods().count(), 1);
    reg.load();
    assert!(reg.get_mod(reg.mod_by_name("m").unwrap()).is_empty());
}

#[test]
fn aliases_of_later_mods_resolve_in_content() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "alpha/manifest.json", r#"{"aliases":{"data":"file(data.json)"}}"#);
    write(dir.path(), "alpha/data.json", r#"{"ref":"zeta:thing"}"#);
    write(dir.path(), "zeta/manifest.json", r#"{"aliases":{"thing":"file(thing.json)"}}"#);
    write(dir.path(), "zeta/thing.json", "{}");
    let reg = build(dir.path());

    let alpha = reg.get_mod(reg.mod_by_name("alpha").unwrap());
    assert!(alpha.errors().is_empty(), "{:?}", alpha.errors());
    assert!(alpha.is_valid());
    assert!(!alpha.is_empty());

    let data = reg.resource_by_location("alpha/data.json").unwrap();
    let refs = reg.resource(data).references();
    assert_eq!(refs.len(), 1);
    let r = reg.reference(refs[0]);
    assert_eq!(r.alias_name(), Some("thing"));
    assert_eq!(reg.alias_full_name(refs[0]).unwrap(), "zeta:thing");
    assert_eq!(reg.resource(r.target()).location(), "zeta/thing.json");
}

#[test]
fn virtual_resources_share_one_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "base/manifest.json", "{}");
    write(dir.path(), "user/manifest.json", r#"{"aliases":{"data":"file(data.json)"}}"#);
    write(dir.path(), "user/data.json", r#"{"one":"base:virt_a","two":["base:virt_b"]}"#);
    let config = Config::new(dir.path())
        .with_virtual_resources(["base:virt_a".to_string(), "base:virt_b".to_string()]);
    let mut reg = Registry::build(&config);

    let user = reg.get_mod(reg.mod_by_name("user").unwrap());
    assert!(user.errors().is_empty(), "{:?}", user.errors());
    assert!(user.is_valid());

    let a = reg.lookup("base:virt_a", "user");
    let b = reg.lookup("base:virt_b", "user");
    assert!(a.is_found());
    assert_eq!(a, b);
    assert_eq!(reg.resource(a.resource().unwrap()).kind(), ResourceKind::Sentinel);
    assert!(reg.get_mod(reg.mod_by_name("base").unwrap()).is_valid());
}

#[test]
fn unknown_aliases_converge_on_invalid_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "base/manifest.json", "{}");
    write(dir.path(), "user/manifest.json", r#"{"aliases":{"data":"file(data.json)"}}"#);
    write(dir.path(), "user/data.json", r#"{"one":"base:nope","two":"base:nope2","three":"other:x"}"#);
    let reg = build(dir.path());

    let user = reg.get_mod(reg.mod_by_name("user").unwrap());
    let unresolved: Vec<_> = user
        .errors()
        .iter()
        .filter(|p| p.kind == ProblemKind::UnresolvedReference)
        .collect();
    assert_eq!(unresolved.len(), 2);
    assert!(!user.is_valid());

    let data = reg.resource_by_location("user/data.json").unwrap();
    assert!(!reg.resource(data).is_valid());
    let targets: Vec<_> = reg
        .resource(data)
        .references()
        .iter()
        .map(|&r| reg.reference(r).target())
        .collect();
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0], targets[1]);
    assert!(!reg.resource(targets[0]).exists());

    let base = reg.get_mod(reg.mod_by_name("base").unwrap());
    assert_eq!(base.aliases().len(), 2);
    assert!(!base.is_valid());
}

#[test]
fn fake_resources_exist_but_are_broken() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "stonehearth/manifest.json", "{}");
    write(dir.path(), "user/manifest.json", r#"{"aliases":{"data":"file(data.json)"}}"#);
    write(dir.path(), "user/data.json", r#"{"v":"stonehearth:customization_variants"}"#);
    let reg = build(dir.path());

    let fake = reg.resource_by_location("stonehearth:customization_variants").unwrap();
    assert!(reg.resource(fake).exists());
    assert!(!reg.resource(fake).is_valid());
    let user = reg.get_mod(reg.mod_by_name("user").unwrap());
    assert!(user.errors().is_empty(), "{:?}", user.errors());
}

#[test]
fn manifest_fields_fail_independently() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "m/manifest.json",
        r#"{
            "aliases": {"ok": "file(a.json)", "num": 5},
            "overrides": ["nope"],
            "ui": {"js": "file(x.js)", "html": ["file(page.html)"]},
            "functions": {"f": {"controller": "file(ctrl.lua)"}, "g": 3},
            "components": {"c": "file(a.json)"},
            "server_init_script": "file(init.lua)",
            "client_init_script": 7
        }"#,
    );
    write(dir.path(), "m/a.json", "{}");
    write(dir.path(), "m/page.html", "<html/>");
    write(dir.path(), "m/ctrl.lua", "return {}");
    write(dir.path(), "m/init.lua", "return {}");
    let reg = build(dir.path());

    let id = reg.mod_by_name("m").unwrap();
    let m = reg.get_mod(id);
    let structural = m
        .errors()
        .iter()
        .filter(|p| p.kind == ProblemKind::StructuralManifest)
        .count();
    assert_eq!(structural, 5, "{:?}", m.errors());
    assert!(!m.is_valid());

    let names: Vec<_> = m
        .aliases()
        .iter()
        .map(|&a| reg.reference(a).alias_name().unwrap().to_string())
        .collect();
    assert_eq!(names, ["ok", "num", "f", "c"]);

    let num = reg.reference(m.aliases()[1]);
    assert_eq!(reg.resource(num.target()).kind(), ResourceKind::Sentinel);
    let f = reg.reference(m.aliases()[2]);
    assert_eq!(reg.resource(f.target()).location(), "m/ctrl.lua");

    let manifest = reg.resource(m.manifest());
    let kinds: Vec<_> = manifest
        .references()
        .iter()
        .map(|&r| reg.reference(r).kind().clone())
        .collect();
    assert!(kinds.contains(&RefKind::Ui(modgraph_core::UiCategory::Html)));
    assert!(kinds.contains(&RefKind::Plain));
}

#[test]
fn overrides_point_from_source_to_target() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "base/manifest.json", "{}");
    write(dir.path(), "base/ui/page.html", "<html/>");
    write(
        dir.path(),
        "ext/manifest.json",
        r#"{"overrides":{"base/ui/page.html":["file(page.html)","file(gone.html)"]}}"#,
    );
    write(dir.path(), "ext/page.html", "<html/>");
    let reg = build(dir.path());

    let ext = reg.get_mod(reg.mod_by_name("ext").unwrap());
    assert_eq!(ext.overrides().len(), 2);
    let first = reg.reference(ext.overrides()[0]);
    assert_eq!(*first.kind(), RefKind::Override);
    assert_eq!(reg.resource(first.origin()).location(), "ext/page.html");
    assert_eq!(reg.resource(first.target()).location(), "base/ui/page.html");
    assert!(reg.reference_valid(ext.overrides()[0]));
    assert!(!reg.reference_valid(ext.overrides()[1]));
    assert!(!ext.is_valid());
    assert!(reg.get_mod(reg.mod_by_name("base").unwrap()).is_valid());
}

#[test]
fn missing_manifest_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("empty")).unwrap();
    let reg = build(dir.path());

    let m = reg.get_mod(reg.mod_by_name("empty").unwrap());
    assert!(!m.is_valid());
    assert_eq!(m.errors()[0].kind, ProblemKind::MissingManifest);
    assert!(!reg.resource(m.manifest()).exists());
}

#[test]
fn broken_json_is_parsed_once() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "m/manifest.json", r#"{"aliases":{"bad":"file(bad.json)","again":"m/bad.json"}}"#);
    write(dir.path(), "m/bad.json", "{ nope");
    let mut reg = build(dir.path());

    let m = reg.get_mod(reg.mod_by_name("m").unwrap());
    let parse_errors = m.errors().iter().filter(|p| p.kind == ProblemKind::JsonParse).count();
    assert_eq!(parse_errors, 1);
    assert!(!m.is_valid());

    let bad = reg.resource_by_location("m/bad.json").unwrap();
    assert!(reg.resource(bad).exists());
    assert!(!reg.resource(bad).is_valid());
    assert!(reg.token(bad).is_none());
}

#[test]
fn missing_mods_root_is_a_global_error() {
    let dir = tempfile::tempdir().unwrap();
    let reg = build(&dir.path().join("nope"));
    assert_eq!(reg.mods().count(), 0);
    assert_eq!(reg.global_errors()[0].kind, ProblemKind::ModOpen);
}

#[test]
fn archive_mods_are_read_through_zip() {
    use zip::write::FileOptions;
    let dir = tempfile::tempdir().unwrap();
    let file = fs::File::create(dir.path().join("arch.smod")).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default();
    let entries = [
        ("arch/manifest.json", r#"{"aliases":{"a":"file(data/a.json)","b":"arch/data/b"}}"#),
        ("arch/data/a.json", r#"{"x":1}"#),
        ("arch\\data\\b\\b.json", "{}"),
    ];
    for (name, content) in entries {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    write(dir.path(), "plain/manifest.json", "{}");

    let mut reg = build(dir.path());
    let id = reg.mod_by_name("arch").unwrap();
    let m = reg.get_mod(id);
    assert!(m.errors().is_empty(), "{:?}", m.errors());
    assert!(m.is_valid());
    assert!(!m.file_system().is_accessible());

    let a = reg.lookup("arch:a", "arch").resource().unwrap();
    assert_eq!(reg.original_json(a), Some(&serde_json::json!({"x": 1})));
    assert!(!reg.is_accessible(a));
    assert_eq!(reg.full_location(a), dir.path().join("arch.smod").join("data/a.json"));
    let b = reg.lookup("arch:b", "arch");
    assert!(b.is_found());
    assert_eq!(location(&reg, b), "arch/data/b/b.json");

    let plain = reg.resource_by_location("plain/manifest.json").unwrap();
    assert!(reg.is_accessible(plain));
}

#[test]
fn object_keys_are_scanned_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "m/manifest.json", r#"{"aliases":{"data":"file(data.json)"}}"#);
    write(dir.path(), "m/data.json", r#"{"file(other.json)": 1}"#);
    write(dir.path(), "m/other.json", "{}");

    let reg = build(dir.path());
    assert!(reg.resource_by_location("m/other.json").is_none());

    let mut config = Config::new(dir.path());
    config.scan_object_keys = true;
    let reg = Registry::build(&config);
    let other = reg.resource_by_location("m/other.json").unwrap();
    assert_eq!(reg.resource(other).referred_by().len(), 1);
}

#[test]
fn rebuild_replaces_the_graph_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a/manifest.json", "{}");
    let mut session = Session::open(Config::new(dir.path()));
    assert_eq!(session.generation(), 1);
    assert_eq!(session.registry().mods().count(), 1);

    let seen = Rc::new(Cell::new(0u64));
    let seen_in = Rc::clone(&seen);
    session.on_rebuild(move |reg, generation| {
        assert_eq!(reg.mods().count(), 2);
        seen_in.set(generation);
    });

    write(dir.path(), "b/manifest.json", "{}");
    session.rebuild();
    assert_eq!(seen.get(), 2);
    assert_eq!(session.generation(), 2);
    assert!(session.registry().mod_by_name("b").is_some());
}

#[test]
fn virtual_resource_list_is_read_from_json() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "modgraph.json", r#"["stonehearth:a", "stonehearth:b"]"#);
    let ids = modgraph_core::load_virtual_resources(&dir.path().join("modgraph.json")).unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains("stonehearth:a"));
    assert!(modgraph_core::load_virtual_resources(&dir.path().join("missing.json")).is_err());
}
