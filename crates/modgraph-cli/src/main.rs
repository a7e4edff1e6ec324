use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use modgraph_core::report::{describe_reference, describe_reference_sourced, graph_report};
use modgraph_core::{Config, ModId, Registry, Session, View};

#[derive(Parser, Debug)]
#[command(
    name = "modgraph",
    about = "Audit cross-mod references and inspect merged JSON of a mods directory",
    version
)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,
    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(ClapArgs, Debug)]
struct SourceArgs {
    /// Mods directory (folders and .smod archives)
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// JSON array of `mod:name` identifiers that may exist without content
    #[arg(long = "virtual", global = true, default_value = "modgraph.json")]
    virtual_list: PathBuf,
    /// Archive extension (without dot)
    #[arg(long, global = true, default_value = "smod")]
    archive_ext: String,
    /// Also treat object keys in content JSON as identifiers
    #[arg(long, global = true, default_value_t = false)]
    scan_keys: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List mods with validity and counts
    Mods,
    /// List resources of a mod, broken ones first
    Resources(ModArgs),
    /// Show outgoing and incoming references of a resource
    Refs(LocationArgs),
    /// Show reported problems, globally or for one mod
    Errors(ErrorsArgs),
    /// Print a JSON view of a resource
    Json(JsonArgs),
    /// Dump the whole graph as JSON
    Report(ReportArgs),
}

#[derive(ClapArgs, Debug)]
struct ModArgs {
    /// Mod name
    name: String,
}

#[derive(ClapArgs, Debug)]
struct LocationArgs {
    /// Resource location, e.g. stonehearth/entities/foo/foo.json
    location: String,
}

#[derive(ClapArgs, Debug)]
struct ErrorsArgs {
    /// Limit to one mod
    name: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ViewArg {
    Raw,
    Merged,
    Final,
}

#[derive(ClapArgs, Debug)]
struct JsonArgs {
    /// Resource location
    location: String,
    #[arg(long, value_enum, default_value_t = ViewArg::Merged)]
    view: ViewArg,
}

#[derive(ClapArgs, Debug)]
struct ReportArgs {
    /// Optional output .json path; otherwise prints to stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("modgraph_core=info".parse().expect("valid tracing directive")),
        )
        .init();

    let cli = Cli::parse();
    let mut session = Session::open(build_config(&cli.source));
    match cli.cmd.unwrap_or(Cmd::Mods) {
        Cmd::Mods => cmd_mods(session.registry()),
        Cmd::Resources(a) => cmd_resources(session.registry(), a),
        Cmd::Refs(a) => cmd_refs(session.registry(), a),
        Cmd::Errors(a) => cmd_errors(session.registry(), a),
        Cmd::Json(a) => cmd_json(session.registry_mut(), a),
        Cmd::Report(a) => cmd_report(&session, a),
    }
}

fn build_config(args: &SourceArgs) -> Config {
    let mut config = Config::new(&args.root);
    config.archive_extension = args.archive_ext.clone();
    config.scan_object_keys = args.scan_keys;
    match modgraph_core::load_virtual_resources(&args.virtual_list) {
        Ok(ids) => config.with_virtual_resources(ids),
        Err(e) => {
            tracing::debug!(path = %args.virtual_list.display(), "no virtual resources: {}", e);
            config
        }
    }
}

fn find_mod(reg: &Registry, name: &str) -> ModId {
    reg.mod_by_name(name).unwrap_or_else(|| {
        eprintln!("unknown mod: {}", name);
        std::process::exit(3);
    })
}

fn mark(valid: bool) -> &'static str {
    if valid { "ok" } else { "BROKEN" }
}

fn cmd_mods(reg: &Registry) {
    for (_, m) in reg.mods() {
        println!(
            "{}\t{}{}\tresources={}\taliases={}\toverrides={}\tmixintos={}\terrors={}",
            m.name(),
            mark(m.is_valid()),
            if m.is_empty() { " (empty)" } else { "" },
            m.resources().len(),
            m.aliases().len(),
            m.overrides().len(),
            m.mixintos().len(),
            m.errors().len()
        );
    }
    if !reg.global_errors().is_empty() {
        println!("({} global errors)", reg.global_errors().len());
    }
}

fn cmd_resources(reg: &Registry, args: ModArgs) {
    let m = reg.get_mod(find_mod(reg, &args.name));
    let mut ids = m.resources().to_vec();
    ids.sort_by(|a, b| {
        let (ra, rb) = (reg.resource(*a), reg.resource(*b));
        (ra.is_valid(), ra.location()).cmp(&(rb.is_valid(), rb.location()))
    });
    for id in ids {
        let res = reg.resource(id);
        println!(
            "{}\t{}\t{}",
            mark(res.is_valid()),
            if res.exists() { "exists" } else { "missing" },
            res.location()
        );
    }
}

fn cmd_refs(reg: &Registry, args: LocationArgs) {
    let Some(id) = reg.resource_by_location(&args.location) else {
        eprintln!("not found: {}", args.location);
        std::process::exit(3);
    };
    let res = reg.resource(id);
    println!("{} ({})", res.location(), reg.full_location(id).display());
    println!("outgoing:");
    for &r in res.references() {
        println!("  {}\t{}", mark(reg.reference_valid(r)), describe_reference(reg, r, false, Some(id)));
    }
    println!("incoming:");
    for &r in res.referred_by() {
        println!("  {}\t{}", mark(reg.reference_valid(r)), describe_reference_sourced(reg, r, true, Some(id)));
    }
}

fn cmd_errors(reg: &Registry, args: ErrorsArgs) {
    if let Some(name) = args.name {
        let m = reg.get_mod(find_mod(reg, &name));
        for p in m.errors() {
            println!("{}", p);
        }
        return;
    }
    for p in reg.global_errors() {
        println!("[global] {}", p);
    }
    for (_, m) in reg.mods() {
        for p in m.errors() {
            println!("[{}] {}", m.name(), p);
        }
    }
}

fn cmd_json(reg: &mut Registry, args: JsonArgs) {
    let Some(id) = reg.resource_by_location(&args.location) else {
        eprintln!("not found: {}", args.location);
        std::process::exit(3);
    };
    let view = match args.view {
        ViewArg::Raw => View::Raw,
        ViewArg::Merged => View::Merged,
        ViewArg::Final => View::Final,
    };
    match reg.view(id, view) {
        Some(v) => println!("{}", serde_json::to_string_pretty(v).unwrap()),
        None => {
            eprintln!("no JSON content: {}", args.location);
            std::process::exit(4);
        }
    }
}

fn cmd_report(session: &Session, args: ReportArgs) {
    let report = graph_report(session.registry(), session.built_at());
    let text = serde_json::to_string_pretty(&report).unwrap();
    if let Some(out) = args.out {
        std::fs::write(&out, text).unwrap_or_else(|e| {
            eprintln!("error writing: {}", e);
            std::process::exit(5);
        });
    } else {
        println!("{}", text);
    }
}
